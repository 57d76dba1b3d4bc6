#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use raft::message::{Envelope, NodeId, BROADCAST};
use replica::transport::Transport;

/// A [`Transport`] backed by in-process channels, standing in for the
/// socket connection to the network substrate (spec §1: the substrate
/// itself is an external collaborator, out of scope for these tests).
pub struct ChannelTransport {
    node_id: NodeId,
    inbox: Receiver<Envelope>,
    routes: Arc<Mutex<HashMap<NodeId, Sender<Envelope>>>>,
}

impl Transport for ChannelTransport {
    fn poll(&mut self, timeout: Duration) -> io::Result<Vec<Envelope>> {
        match self.inbox.recv_timeout(timeout) {
            Ok(first) => {
                let mut out = vec![first];
                while let Ok(next) = self.inbox.try_recv() {
                    out.push(next);
                }
                Ok(out)
            }
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(Vec::new()),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(io::Error::new(io::ErrorKind::UnexpectedEof, "switchboard dropped"))
            }
        }
    }

    fn send(&mut self, envelope: &Envelope) -> io::Result<()> {
        let routes = self.routes.lock().unwrap();
        if envelope.dst == BROADCAST {
            for (id, tx) in routes.iter() {
                if *id != self.node_id {
                    let _ = tx.send(envelope.clone());
                }
            }
        } else if let Some(tx) = routes.get(&envelope.dst) {
            let _ = tx.send(envelope.clone());
        }
        Ok(())
    }
}

/// A shared switchboard wiring a fixed set of [`ChannelTransport`]s
/// together, the way a real network substrate would.
#[derive(Default)]
pub struct Switchboard {
    routes: Arc<Mutex<HashMap<NodeId, Sender<Envelope>>>>,
}

impl Switchboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `node_id` and returns the [`ChannelTransport`] its
    /// [`replica::engine::Engine`] should be built with.
    pub fn join(&self, node_id: &str) -> ChannelTransport {
        let (tx, rx) = mpsc::channel();
        self.routes.lock().unwrap().insert(node_id.to_string(), tx);
        ChannelTransport { node_id: node_id.to_string(), inbox: rx, routes: self.routes.clone() }
    }

    /// Registers a client id and returns a raw receiver for its mailbox, so
    /// a test can both address messages to it and read its replies without
    /// going through a full [`Transport`].
    pub fn join_client(&self, client_id: &str) -> Receiver<Envelope> {
        let (tx, rx) = mpsc::channel();
        self.routes.lock().unwrap().insert(client_id.to_string(), tx);
        rx
    }

    /// Delivers `envelope` directly into `to`'s mailbox, standing in for a
    /// client's request arriving over the wire.
    pub fn send_to(&self, to: &str, envelope: Envelope) {
        if let Some(tx) = self.routes.lock().unwrap().get(to) {
            let _ = tx.send(envelope);
        }
    }
}
