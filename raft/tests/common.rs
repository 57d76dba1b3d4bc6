#![allow(dead_code)]

use std::collections::{BTreeSet, VecDeque};
use std::time::{Duration, Instant};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use raft::config::Config;
use raft::log::MemoryLog;
use raft::message::{Body, Envelope, BROADCAST};
use raft::state::Replica;

const RANDOM_SEED: u64 = 0;
const MAX_ITERATIONS: u32 = 100_000;
pub const TICK_STEP: Duration = Duration::from_millis(10);

pub fn node_id(n: u64) -> String {
    format!("{:04}", n)
}

pub fn client_get(key: &str, mid: &str) -> Envelope {
    Envelope {
        src: "client".into(),
        dst: String::new(),
        leader: BROADCAST.into(),
        mid: mid.into(),
        body: Body::Get { key: key.into() },
    }
}

/// Builds one [`Replica`] in isolation, for tests that drive `receive`/`tick`
/// directly rather than through a [`TestGroup`].
pub fn solo(id: &str, peers: &[&str]) -> Replica<MemoryLog> {
    let peer_set: BTreeSet<String> = peers.iter().map(|p| p.to_string()).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(RANDOM_SEED);
    Replica::new(id.to_string(), peer_set, Config::default(), MemoryLog::new(), &mut rng)
}

pub fn client_put(key: &str, value: &str, mid: &str) -> Envelope {
    Envelope {
        src: "client".into(),
        dst: String::new(),
        leader: BROADCAST.into(),
        mid: mid.into(),
        body: Body::Put { key: key.into(), value: value.into() },
    }
}

/// An in-memory cluster of [`Replica`]s wired together by a message queue,
/// standing in for the socket-based network substrate the real `replica`
/// binary talks to.
pub struct TestGroup {
    pub replicas: Vec<Replica<MemoryLog>>,
    pub now: Instant,
    pub config: TestGroupConfig,
    /// Messages that reached a non-replica destination (i.e. a client).
    pub delivered: Vec<Envelope>,
}

#[derive(Clone, Default)]
pub struct TestGroupConfig {
    drops: BTreeSet<(Option<String>, Option<String>)>,
    down: BTreeSet<String>,
    drop_once: BTreeSet<(String, String)>,
}

impl TestGroup {
    pub fn new(size: u64) -> Self {
        let ids: Vec<String> = (1..=size).map(node_id).collect();
        let mut seed_rng = ChaCha8Rng::seed_from_u64(RANDOM_SEED);
        let replicas = ids
            .iter()
            .map(|id| {
                let peers: BTreeSet<String> = ids.iter().filter(|p| *p != id).cloned().collect();
                let mut rng = ChaCha8Rng::seed_from_u64(seed_rng.next_u64());
                Replica::new(id.clone(), peers, Config::default(), MemoryLog::new(), &mut rng)
            })
            .collect();
        Self {
            replicas,
            now: Instant::now(),
            config: TestGroupConfig::default(),
            delivered: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: TestGroupConfig) -> Self {
        self.config = config;
        self
    }

    fn route(&mut self, mut queue: VecDeque<Envelope>) -> Vec<Envelope> {
        let mut to_clients = Vec::new();
        while let Some(msg) = queue.pop_front() {
            let is_broadcast = msg.dst == BROADCAST;
            let targets: Vec<usize> = self
                .replicas
                .iter()
                .enumerate()
                .filter(|(_, r)| if is_broadcast { r.node_id() != msg.src } else { r.node_id() == msg.dst })
                .map(|(i, _)| i)
                .collect();
            if targets.is_empty() && !is_broadcast {
                to_clients.push(msg);
                continue;
            }
            for idx in targets {
                let to_id = self.replicas[idx].node_id().to_string();
                if self.config.is_down(&to_id) || self.config.should_drop(&msg.src, &to_id) {
                    continue;
                }
                let out = self.replicas[idx].receive(msg.clone(), self.now);
                queue.extend(out);
            }
        }
        to_clients
    }

    /// Advances the virtual clock by `iterations * TICK_STEP`, ticking every
    /// live replica and routing whatever it emits each step.
    pub fn run_for(&mut self, iterations: u32) -> &mut Self {
        for _ in 0..iterations {
            self.now += TICK_STEP;
            let mut queue = VecDeque::new();
            for idx in 0..self.replicas.len() {
                let id = self.replicas[idx].node_id().to_string();
                if self.config.is_down(&id) {
                    continue;
                }
                queue.extend(self.replicas[idx].tick(self.now));
            }
            let to_clients = self.route(queue);
            self.delivered.extend(to_clients);
        }
        self
    }

    pub fn run_until(&mut self, mut until_fn: impl FnMut(&mut Self) -> bool) -> &mut Self {
        let mut remaining = MAX_ITERATIONS;
        while !until_fn(self) {
            remaining = remaining.checked_sub(1).expect("condition never held within simulation bound");
            self.run_for(1);
        }
        self
    }

    /// Injects a client message addressed to replica `to_idx`, routing
    /// whatever cascades from it and recording client-bound replies.
    pub fn send_client(&mut self, to_idx: usize, body_envelope: Envelope) -> &mut Self {
        let dst = self.replicas[to_idx].node_id().to_string();
        let mut envelope = body_envelope;
        envelope.dst = dst;
        let mut queue = VecDeque::new();
        queue.push_back(envelope);
        let to_clients = self.route(queue);
        self.delivered.extend(to_clients);
        self
    }

    pub fn take_delivered(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.delivered)
    }

    pub fn leader_index(&self) -> Option<usize> {
        self.replicas.iter().position(|r| r.is_leader())
    }

    pub fn has_leader(&self) -> bool {
        self.leader_index().is_some()
    }
}

impl TestGroupConfig {
    pub fn node_down(mut self, id: &str) -> Self {
        self.down.insert(id.to_string());
        self
    }

    pub fn isolate(mut self, id: &str) -> Self {
        self.drops.insert((Some(id.to_string()), None));
        self.drops.insert((None, Some(id.to_string())));
        self
    }

    pub fn drop_between(mut self, a: &str, b: &str) -> Self {
        self.drops.insert((Some(a.to_string()), Some(b.to_string())));
        self.drops.insert((Some(b.to_string()), Some(a.to_string())));
        self
    }

    /// Drops exactly the next message sent from `from` to `to`, then lets
    /// the link behave normally again.
    pub fn drop_next(mut self, from: &str, to: &str) -> Self {
        self.drop_once.insert((from.to_string(), to.to_string()));
        self
    }

    fn is_down(&self, id: &str) -> bool {
        self.down.contains(id)
    }

    fn should_drop(&mut self, from: &str, to: &str) -> bool {
        if self.drop_once.remove(&(from.to_string(), to.to_string())) {
            return true;
        }
        self.drops.contains(&(Some(from.to_string()), Some(to.to_string())))
            || self.drops.contains(&(Some(from.to_string()), None))
            || self.drops.contains(&(None, Some(to.to_string())))
            || self.down.contains(from)
            || self.down.contains(to)
    }
}
