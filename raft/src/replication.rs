//! Leader-side bookkeeping for in-flight log proposals.
//!
//! The pending-proposal table is an arena keyed by proposal id the way the
//! vendored crate's design notes recommend (design note: "Pending proposal
//! table as arena"): a `HashMap` from id to a mutable record, which both the
//! retry walker and the quorum counter can reach without ownership
//! ambiguity.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Instant;

use crate::message::{ClientId, Envelope, LogEntry, MessageId};

/// Correlates a leader's append-entries broadcast with the quorum it is
/// accumulating, stable across retransmissions of the same content (spec
/// §4.4: "a hash of the newest log entry").
pub type ProposalId = u64;

/// Computes the [`ProposalId`] for a proposal whose newest entry is `entry`.
pub fn proposal_id(entry: &LogEntry) -> ProposalId {
    let mut hasher = DefaultHasher::new();
    entry.key.hash(&mut hasher);
    entry.value.hash(&mut hasher);
    entry.term.hash(&mut hasher);
    hasher.finish()
}

/// One leader-side in-flight proposal: a log append awaiting quorum commit.
pub struct PendingProposal {
    /// Votes toward quorum, 1 for the leader's own implicit vote plus one per
    /// `append_okay` received. `None` means "reset after a retry": the next
    /// `append_okay` should be treated as the first one seen since the
    /// retransmission (spec §4.4).
    pub tally: Option<usize>,
    /// The entry this proposal would commit, applied to the state machine on
    /// quorum.
    pub entry: LogEntry,
    /// The client that issued the originating `put`.
    pub client_id: ClientId,
    /// The client's correlation id for the originating `put`.
    pub client_mid: MessageId,
    /// The raw outbound envelope used for retransmission.
    pub outbound: Envelope,
    /// When this proposal (or its last retransmission) was issued.
    pub issued_at: Instant,
}

impl PendingProposal {
    /// Records an `append_okay` toward this proposal's quorum, returning the
    /// new tally.
    pub fn record_ack(&mut self) -> usize {
        let new_tally = self.tally.unwrap_or(1) + 1;
        self.tally = Some(new_tally);
        new_tally
    }

    /// Marks this proposal as retransmitted, resetting its tally and issue
    /// time.
    pub fn mark_retransmitted(&mut self, now: Instant) {
        self.tally = None;
        self.issued_at = now;
    }
}
