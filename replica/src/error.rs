//! Process-level errors: bad arguments and connection failure (spec §7
//! "Internal").

use thiserror::Error;

/// Errors raised while starting or running the `replica` process.
#[derive(Debug, Error)]
pub enum ReplicaError {
    /// `argv` didn't supply a replica id.
    #[error("missing replica id: usage is `replica <id> [peer_id ...]`")]
    MissingOwnId,

    /// Failed to resolve or establish the connection to the network
    /// substrate.
    #[error("failed to connect to the network substrate: {0}")]
    Connect(#[source] std::io::Error),

    /// The connection to the network substrate failed or closed mid-run. A
    /// zero-byte read terminates the event loop (spec §7).
    #[error("lost connection to the network substrate: {0}")]
    Io(#[from] std::io::Error),
}
