//! Timer configuration for the consensus engine.
//!
//! Mirrors the role the vendored crate's `node::Config` played: the single
//! place timer tuning lives, threaded through to [`crate::state::Replica`] at
//! construction.

use std::time::Duration;

/// Timer parameters driving election, heartbeat, and retry behavior.
///
/// The defaults match spec §4.3/§4.4/§4.6 exactly. `election_timeout` and
/// `election_window` are *ranges*; a concrete value is sampled once per
/// replica at construction (see [`crate::state::Replica::new`]), not
/// resampled on every timeout.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Range an individual replica's election timeout is sampled from once,
    /// at construction. A follower silent for this long starts an election.
    pub election_timeout_range: (Duration, Duration),

    /// Range an individual replica's election window is sampled from once,
    /// at construction. A candidate whose election has run this long without
    /// resolving starts a fresh one.
    pub election_window_range: (Duration, Duration),

    /// How often a leader sends a heartbeat to suppress followers' election
    /// timeouts. Must be strictly less than the minimum of
    /// `election_timeout_range`.
    pub heartbeat_interval: Duration,

    /// How long a leader waits for a pending proposal's quorum before
    /// retransmitting it.
    pub consensus_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            election_timeout_range: (Duration::from_millis(1000), Duration::from_millis(1200)),
            election_window_range: (Duration::from_millis(200), Duration::from_millis(1200)),
            heartbeat_interval: Duration::from_millis(300),
            consensus_timeout: Duration::from_millis(400),
        }
    }
}

impl Config {
    /// Checks the invariant from spec §4.6/§8: heartbeats must fire well
    /// inside the shortest possible election timeout, or a healthy leader
    /// could still be deposed by its own followers.
    pub fn heartbeat_faster_than_election(&self) -> bool {
        self.heartbeat_interval < self.election_timeout_range.0
    }
}
