//! The consensus engine: the single type that owns a replica's term, role,
//! log, state machine, and pending-proposal table, and turns inbound
//! [`Envelope`]s and wall-clock ticks into outbound ones.
//!
//! This plays the role the vendored crate's `State<L, Random, NodeId>` god
//! object played, but implements the spec's naive full-log-broadcast
//! replication (§4.4/§4.5) rather than the vendored crate's
//! `nextIndex`/`matchIndex` probing.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Instant;

use rand::Rng;

use crate::config::Config;
use crate::election::{sample_range, quorum_size, CandidateState, FollowerState, LeaderState, Role};
use crate::log::Log;
use crate::message::{Body, ClientId, Envelope, LogEntry, MessageId, NodeId, BROADCAST};
use crate::replication::{proposal_id, PendingProposal, ProposalId};

/// A single replica's consensus state.
///
/// Generic over the log storage backend the way the vendored `State` was
/// generic over `L: Log`; `replica` wires this up with [`crate::log::MemoryLog`].
pub struct Replica<L: Log> {
    node_id: NodeId,
    peers: BTreeSet<NodeId>,
    config: Config,

    current_term: u64,
    role: Role,
    voted_terms: HashSet<u64>,
    leader_hint: NodeId,

    log: L,
    commit_index: i64,
    state_machine: HashMap<String, String>,

    pending: HashMap<ProposalId, PendingProposal>,

    election_timeout: std::time::Duration,
    election_window: std::time::Duration,

    mid_counter: u64,
}

impl<L: Log> Replica<L> {
    /// Constructs a fresh follower. `peers` must not include `node_id`
    /// itself. Samples `election_timeout` and `election_window` once, for
    /// the lifetime of this replica (spec §4.3: "sampled once per replica"),
    /// rather than resampling at the start of every election.
    pub fn new(node_id: NodeId, peers: BTreeSet<NodeId>, config: Config, log: L, rng: &mut impl Rng) -> Self {
        let election_timeout = sample_range(rng, config.election_timeout_range.0, config.election_timeout_range.1);
        let election_window = sample_range(rng, config.election_window_range.0, config.election_window_range.1);
        let now = Instant::now();
        Self {
            node_id,
            peers,
            config,
            current_term: 0,
            role: Role::Follower(FollowerState { last_heartbeat_received: now }),
            voted_terms: HashSet::new(),
            leader_hint: BROADCAST.to_string(),
            log,
            commit_index: -1,
            state_machine: HashMap::new(),
            pending: HashMap::new(),
            election_timeout,
            election_window,
            mid_counter: 0,
        }
    }

    /// This replica's own id.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Whether this replica currently believes itself to be the leader.
    pub fn is_leader(&self) -> bool {
        self.role.is_leader()
    }

    /// The replica this node currently believes leads, or [`BROADCAST`] if
    /// unknown.
    pub fn leader_hint(&self) -> &str {
        &self.leader_hint
    }

    /// The current term.
    pub fn current_term(&self) -> u64 {
        self.current_term
    }

    /// The highest committed log index, or -1 if nothing is committed.
    pub fn commit_index(&self) -> i64 {
        self.commit_index
    }

    /// The number of entries in the local log.
    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    /// The locally applied value for `key`, if any. Reads are served from
    /// this map with no coordination; see [`Self::receive`]'s handling of
    /// `get` for the linearizability caveat (spec §9).
    pub fn applied_value(&self, key: &str) -> Option<&str> {
        self.state_machine.get(key).map(String::as_str)
    }

    fn reply(&self, to: &NodeId, mid: &str, body: Body) -> Envelope {
        Envelope {
            src: self.node_id.clone(),
            dst: to.clone(),
            leader: self.leader_hint.clone(),
            mid: mid.to_string(),
            body,
        }
    }

    fn broadcast(&self, mid: String, body: Body) -> Envelope {
        Envelope {
            src: self.node_id.clone(),
            dst: BROADCAST.to_string(),
            leader: self.leader_hint.clone(),
            mid,
            body,
        }
    }

    fn fresh_mid(&mut self) -> String {
        self.mid_counter += 1;
        format!("{}-{}", self.node_id, self.mid_counter)
    }

    /// Dispatches one inbound message, returning zero or more outbound
    /// replies/broadcasts. `now` drives every timestamp this call touches.
    pub fn receive(&mut self, envelope: Envelope, now: Instant) -> Vec<Envelope> {
        match envelope.body.clone() {
            Body::Get { key } => vec![self.handle_get(&envelope, key)],
            Body::Put { key, value } => match self.handle_put(&envelope, key, value, now) {
                Ok(out) => out,
                Err(err) => {
                    log::error!("{} failed to append proposal to its log: {:?}", self.node_id, err);
                    Vec::new()
                }
            },
            Body::RequestVote { term, length, last_entry } => {
                self.handle_request_vote(&envelope, term, length, last_entry, now).into_iter().collect()
            }
            Body::Vote {} => self.handle_vote(&envelope, now),
            Body::AppendEntries { updates, commit, client_id, client_mid, term } => {
                match self.handle_append_entries(&envelope, updates, commit, client_id, client_mid, term, now) {
                    Ok(reply) => reply.into_iter().collect(),
                    Err(err) => {
                        log::error!("{} failed to append entry to its log: {:?}", self.node_id, err);
                        Vec::new()
                    }
                }
            }
            Body::AppendOkay { .. } => self.handle_append_okay(&envelope),
            Body::Ok { .. } | Body::Fail {} | Body::Redirect {} => {
                log::warn!("{} received a reply-only message type, dropping: {}", self.node_id, envelope);
                Vec::new()
            }
        }
    }

    /// Client `get` (spec §4.2). Leader-only; non-leaders redirect.
    fn handle_get(&self, req: &Envelope, key: String) -> Envelope {
        if !self.is_leader() {
            return self.reply(&req.src, &req.mid, Body::Redirect {});
        }
        let value = self.state_machine.get(&key).cloned().unwrap_or_default();
        self.reply(&req.src, &req.mid, Body::Ok { value: Some(value) })
    }

    /// Client `put` (spec §4.2/§4.4). Leader-only; non-leaders redirect.
    /// A leader with no peers commits its own proposal immediately, since
    /// its lone vote already constitutes a quorum.
    fn handle_put(&mut self, req: &Envelope, key: String, value: String, now: Instant) -> Result<Vec<Envelope>, L::Error> {
        if !self.is_leader() {
            return Ok(vec![self.reply(&req.src, &req.mid, Body::Redirect {})]);
        }
        let entry = LogEntry { key, value, term: self.current_term };
        self.log.append(entry.clone())?;
        let pid = proposal_id(&entry);
        let mid = pid.to_string();
        let outbound = self.broadcast(
            mid,
            Body::AppendEntries {
                updates: self.log.entries().to_vec(),
                commit: self.commit_index,
                client_id: req.src.clone(),
                client_mid: req.mid.clone(),
                term: self.current_term,
            },
        );
        self.pending.insert(
            pid,
            PendingProposal {
                tally: Some(1),
                entry,
                client_id: req.src.clone(),
                client_mid: req.mid.clone(),
                outbound: outbound.clone(),
                issued_at: now,
            },
        );
        let mut out = vec![outbound];
        out.extend(self.try_commit(pid));
        Ok(out)
    }

    /// Commits `pid` if its tally has reached quorum, returning the client
    /// `ok` reply. Spec §4.4 steps 1-4.
    fn try_commit(&mut self, pid: ProposalId) -> Option<Envelope> {
        let tally = self.pending.get(&pid)?.tally.unwrap_or(0);
        if tally < quorum_size(self.peers.len()) {
            return None;
        }
        let proposal = self.pending.remove(&pid)?;
        self.state_machine.insert(proposal.entry.key.clone(), proposal.entry.value.clone());
        self.commit_index += 1;
        Some(self.reply(&proposal.client_id, &proposal.client_mid, Body::Ok { value: None }))
    }

    /// Leader-side handling of a follower's `append_okay` (spec §4.4).
    fn handle_append_okay(&mut self, req: &Envelope) -> Vec<Envelope> {
        if !self.is_leader() {
            return Vec::new();
        }
        let pid: ProposalId = match req.mid.parse() {
            Ok(pid) => pid,
            Err(_) => return Vec::new(),
        };
        match self.pending.get_mut(&pid) {
            Some(proposal) => {
                proposal.record_ack();
            }
            None => return Vec::new(),
        }
        self.try_commit(pid).into_iter().collect()
    }

    /// Vote granting (spec §4.3). Denial is silent: returns `None`.
    fn handle_request_vote(
        &mut self,
        req: &Envelope,
        term: u64,
        length: u64,
        last_entry: Option<LogEntry>,
        now: Instant,
    ) -> Option<Envelope> {
        if term > self.current_term {
            self.current_term = term;
            self.role = Role::Follower(FollowerState { last_heartbeat_received: now });
        }
        if term < self.current_term {
            return None;
        }
        let already_voted = self.voted_terms.contains(&term);
        let candidate_up_to_date = self.candidate_log_at_least_as_up_to_date(length, last_entry.as_ref());
        if already_voted || !candidate_up_to_date {
            return None;
        }
        self.voted_terms.insert(term);
        Some(self.reply(&req.src, &req.mid, Body::Vote {}))
    }

    /// Spec §4.3's ordered rules (a)-(e) for "at least as up-to-date".
    fn candidate_log_at_least_as_up_to_date(&self, candidate_len: u64, candidate_last: Option<&LogEntry>) -> bool {
        if self.log.is_empty() {
            return true; // (a)
        }
        let our_last = self.log.last().expect("log is non-empty");
        match candidate_last {
            None => true, // (b)
            Some(candidate_last) => {
                if candidate_last.term > our_last.term {
                    true // (c)
                } else if candidate_last.term < our_last.term {
                    false // (d)
                } else {
                    (self.log.len() as u64) <= candidate_len // (e)
                }
            }
        }
    }

    /// Candidate-side handling of a granted vote (spec §4.3 "Winning").
    fn handle_vote(&mut self, req: &Envelope, now: Instant) -> Vec<Envelope> {
        let won = match &mut self.role {
            Role::Candidate(state) => {
                state.votes_granted.insert(req.src.clone());
                state.votes_granted.len() >= quorum_size(self.peers.len())
            }
            _ => false,
        };
        if won {
            vec![self.become_leader(now)]
        } else {
            Vec::new()
        }
    }

    /// Transitions to leader, emitting the immediate heartbeat spec §4.3
    /// requires and arming the catch-up flag for the next tick.
    fn become_leader(&mut self, now: Instant) -> Envelope {
        self.role = Role::Leader(LeaderState { last_heartbeat_sent: now, catch_up_pending: true });
        self.leader_hint = self.node_id.clone();
        self.heartbeat_envelope()
    }

    fn heartbeat_envelope(&mut self) -> Envelope {
        let mid = self.fresh_mid();
        self.broadcast(
            mid,
            Body::AppendEntries {
                updates: Vec::new(),
                commit: self.commit_index,
                client_id: BROADCAST.to_string(),
                client_mid: BROADCAST.to_string(),
                term: self.current_term,
            },
        )
    }

    /// Follower-side handling of an append-entries (spec §4.5).
    fn handle_append_entries(
        &mut self,
        req: &Envelope,
        updates: Vec<LogEntry>,
        commit: i64,
        client_id: ClientId,
        client_mid: MessageId,
        term: u64,
        now: Instant,
    ) -> Result<Option<Envelope>, L::Error> {
        let leader_was_stepping_down = self.role.is_leader() && term > self.current_term;
        if term > self.current_term {
            self.current_term = term;
        }
        if self.role.is_candidate() {
            self.role = Role::Follower(FollowerState { last_heartbeat_received: now });
        }
        if leader_was_stepping_down {
            self.role = Role::Follower(FollowerState { last_heartbeat_received: now });
            return Ok(None);
        }
        if term < self.current_term {
            return Ok(None);
        }
        if self.role.is_leader() {
            // A same-term append-entries from someone else while we still
            // believe ourselves leader: not a case spec.md models (two
            // leaders in one term should not coexist); drop defensively.
            return Ok(None);
        }
        match &mut self.role {
            Role::Follower(state) => state.last_heartbeat_received = now,
            Role::Candidate(_) | Role::Leader(_) => unreachable!("stepped down above"),
        }

        self.leader_hint = req.src.clone();

        if commit > self.commit_index {
            let upper = commit.min(self.log.len() as i64 - 1);
            let mut i = self.commit_index + 1;
            while i <= upper {
                if let Some(entry) = self.log.get(i as usize) {
                    self.state_machine.insert(entry.key.clone(), entry.value.clone());
                }
                i += 1;
            }
            self.commit_index = commit;
        }

        if updates.is_empty() {
            return Ok(None);
        }
        // Idempotent append (spec §9): only accept when this is exactly the
        // one new tail entry the leader is proposing this round.
        if updates.len() == self.log.len() + 1 {
            let new_entry = updates.last().expect("non-empty").clone();
            self.log.append(new_entry)?;
        }
        Ok(Some(self.reply(&req.src, &req.mid, Body::AppendOkay { updates, client_id, client_mid })))
    }

    /// Advances wall-clock-driven state: leader catch-up, proposal retry,
    /// election timers, and heartbeats (spec §4.6). Returns any resulting
    /// outbound messages.
    pub fn tick(&mut self, now: Instant) -> Vec<Envelope> {
        let mut out = Vec::new();

        if let Role::Leader(state) = &mut self.role {
            if state.catch_up_pending {
                state.catch_up_pending = false;
                for entry in self.log.entries().to_vec() {
                    self.state_machine.insert(entry.key, entry.value);
                }
            }
        }

        if self.role.is_leader() {
            let consensus_timeout = self.config.consensus_timeout;
            let stale: Vec<ProposalId> = self
                .pending
                .iter()
                .filter(|(_, p)| now.duration_since(p.issued_at) > consensus_timeout)
                .map(|(id, _)| *id)
                .collect();
            for id in stale {
                if let Some(proposal) = self.pending.get_mut(&id) {
                    out.push(proposal.outbound.clone());
                    proposal.mark_retransmitted(now);
                }
            }
        }

        let should_start_election = match &self.role {
            Role::Follower(state) => now.duration_since(state.last_heartbeat_received) > self.election_timeout,
            Role::Candidate(state) => now.duration_since(state.election_start) > self.election_window,
            Role::Leader(_) => false,
        };
        if should_start_election {
            out.extend(self.start_election(now));
        }

        let should_heartbeat = match &mut self.role {
            Role::Leader(state) if now.duration_since(state.last_heartbeat_sent) > self.config.heartbeat_interval => {
                state.last_heartbeat_sent = now;
                true
            }
            _ => false,
        };
        if should_heartbeat {
            out.push(self.heartbeat_envelope());
        }

        out
    }

    /// Begins a fresh election (spec §4.3 "Triggering"). A lone replica with
    /// no peers wins its own election immediately.
    fn start_election(&mut self, now: Instant) -> Vec<Envelope> {
        self.current_term += 1;
        self.voted_terms.insert(self.current_term);
        let mut votes_granted = BTreeSet::new();
        votes_granted.insert(self.node_id.clone());
        let won_immediately = votes_granted.len() >= quorum_size(self.peers.len());
        self.role = Role::Candidate(CandidateState { election_start: now, votes_granted });
        if won_immediately {
            vec![self.become_leader(now)]
        } else {
            let length = self.log.len() as u64;
            let last_entry = self.log.last().cloned();
            let mid = self.fresh_mid();
            vec![self.broadcast(mid, Body::RequestVote { term: self.current_term, length, last_entry })]
        }
    }
}
