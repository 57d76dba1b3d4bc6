//! Role state and election-timer bookkeeping.
//!
//! `Role` is a tagged variant the way the vendored crate's `LeadershipState`
//! is: logic that branches on it should exhaustively cover all three cases,
//! never collapse it into an integer (design note).

use std::collections::BTreeSet;
use std::time::Instant;

use rand::Rng;

use crate::message::NodeId;

/// The role a replica is currently playing.
#[derive(Debug)]
pub enum Role {
    /// Not currently leading or campaigning.
    Follower(FollowerState),
    /// Campaigning for leadership in the current term.
    Candidate(CandidateState),
    /// Leading the current term.
    Leader(LeaderState),
}

/// State specific to the follower role.
#[derive(Debug)]
pub struct FollowerState {
    /// When the last append-entries (heartbeat or otherwise) was received.
    pub last_heartbeat_received: Instant,
}

/// State specific to the candidate role.
#[derive(Debug)]
pub struct CandidateState {
    /// When this election began.
    pub election_start: Instant,
    /// The set of peers (plus self) that have granted a vote this term.
    pub votes_granted: BTreeSet<NodeId>,
}

/// State specific to the leader role.
#[derive(Debug)]
pub struct LeaderState {
    /// When the last heartbeat was broadcast.
    pub last_heartbeat_sent: Instant,
    /// Whether this leader still needs to replay its own log into the state
    /// machine before serving traffic (spec §4.3/§4.5 "leader catch-up").
    pub catch_up_pending: bool,
}

impl Role {
    /// Returns whether this role is `Leader`.
    pub fn is_leader(&self) -> bool {
        matches!(self, Role::Leader(_))
    }

    /// Returns whether this role is `Candidate`.
    pub fn is_candidate(&self) -> bool {
        matches!(self, Role::Candidate(_))
    }
}

/// Computes the minimum number of replicas, out of a group with
/// `peer_count` peers (i.e. `peer_count + 1` total replicas), that
/// constitute a strict majority.
pub fn quorum_size(peer_count: usize) -> usize {
    (peer_count + 1) / 2 + 1
}

/// Samples a single duration from `[low, high)`, used once per replica at
/// construction to pick its election timeout and election window (spec
/// §4.3: "sampled once per replica").
pub fn sample_range(rng: &mut impl Rng, low: std::time::Duration, high: std::time::Duration) -> std::time::Duration {
    if high <= low {
        return low;
    }
    let span = high - low;
    let jitter_nanos = rng.gen_range(0..span.as_nanos());
    low + std::time::Duration::from_nanos(jitter_nanos as u64)
}
