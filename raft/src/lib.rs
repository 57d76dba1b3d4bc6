//! A replicated, fault-tolerant key-value store's consensus core, in the
//! style of Raft.
//!
//! A fixed set of replicas cooperates over an externally-provided message
//! channel to present a single logical key-value store. This crate is the
//! engine that runs inside each replica: leader election, log replication
//! with quorum commit, follower/candidate/leader state management,
//! heartbeat-driven liveness, and retry of uncommitted proposals. It has no
//! networking, no JSON framing, and no threads of its own — [`state::Replica`]
//! is pure and synchronous, driven entirely by [`state::Replica::receive`]
//! and [`state::Replica::tick`].
//!
//! # Example
//!
//! ```
//! use raft::config::Config;
//! use raft::log::MemoryLog;
//! use raft::state::Replica;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use std::collections::BTreeSet;
//! use std::time::Instant;
//!
//! let peers: BTreeSet<String> = ["0002".into(), "0003".into()].into_iter().collect();
//! let mut rng = ChaCha8Rng::seed_from_u64(0);
//! let mut replica = Replica::new("0001".into(), peers, Config::default(), MemoryLog::new(), &mut rng);
//!
//! // Drive election timers and inbound messages by calling `tick`/`receive`
//! // with the wall-clock time of each event loop iteration.
//! let outbound = replica.tick(Instant::now());
//! assert!(outbound.is_empty() || replica.is_leader());
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod election;
pub mod log;
pub mod message;
pub mod replication;
pub mod state;
