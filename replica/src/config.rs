//! Process inputs (spec §6 "Process inputs") and the event loop's timer
//! constants (spec §4.6).

use std::collections::BTreeSet;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use raft::message::NodeId;

use crate::error::ReplicaError;

/// The I/O poll quantum the event loop blocks on each iteration (spec §4.6
/// step 2: "Poll the socket with a 10 ms timeout").
pub const IO_POLL_QUANTUM: Duration = Duration::from_millis(10);

/// Base TCP port the network substrate is assumed to listen on; a
/// replica's own endpoint is this port offset by its id. The substrate that
/// actually assigns endpoints to ids is an external collaborator (spec §1);
/// this mapping is a standalone-deployment convention, not part of the
/// protocol.
const BASE_PORT: u16 = 24000;

/// Parsed process inputs: this replica's own id and its peers.
pub struct ReplicaConfig {
    /// This replica's own id.
    pub node_id: NodeId,
    /// The ids of every other replica in the cluster.
    pub peers: BTreeSet<NodeId>,
}

impl ReplicaConfig {
    /// Parses `argv[1]` as the own id and the remaining arguments as peer
    /// ids.
    pub fn from_args(mut args: impl Iterator<Item = String>) -> Result<Self, ReplicaError> {
        args.next(); // argv[0], the binary path
        let node_id = args.next().ok_or(ReplicaError::MissingOwnId)?;
        let peers = args.collect();
        Ok(Self { node_id, peers })
    }

    /// The socket address this replica's transport connects to, derived
    /// from its own id.
    pub fn own_endpoint(&self) -> Result<SocketAddr, ReplicaError> {
        endpoint_for(&self.node_id)
    }
}

fn endpoint_for(id: &str) -> Result<SocketAddr, ReplicaError> {
    let offset: u16 = id.parse().unwrap_or_else(|_| id.bytes().fold(0u16, |acc, b| acc.wrapping_add(b as u16)));
    format!("127.0.0.1:{}", BASE_PORT.wrapping_add(offset))
        .to_socket_addrs()
        .map_err(ReplicaError::Connect)?
        .next()
        .ok_or(ReplicaError::MissingOwnId)
}
