//! The `replica` process: the part of the key-value store that isn't the
//! consensus engine itself — argument parsing, the connection to the
//! network substrate, the newline-JSON codec, and the event loop that
//! drives [`raft::state::Replica`].
//!
//! The consensus logic itself (election, replication, commit) lives in the
//! `raft` crate and is exercised there without any networking. This crate
//! is the thin process shell around it, mirroring the vendored crate's
//! split between its `raft` library and its own server/cluster code.

#![warn(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod transport;
