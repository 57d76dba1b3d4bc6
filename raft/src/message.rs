//! Wire message types exchanged between replicas and clients.
//!
//! Every message on the wire is a single JSON object carrying five mandatory
//! fields (`src`, `dst`, `leader`, `type`, `MID`) plus whatever additional
//! fields its `type` requires. [`Envelope`] models the mandatory fields;
//! [`Body`] is the `type`-tagged payload, serialized flattened into the same
//! JSON object by `serde`'s `#[serde(tag = "type")]`.
//!
//! The broadcast destination id and the "leader unknown" sentinel are both
//! the same four-character string, [`BROADCAST`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// A replica or client id, carried as an opaque string on the wire.
pub type NodeId = String;

/// A client id, carried as an opaque string on the wire. Distinct alias from
/// [`NodeId`] only for readability; both are plain strings over JSON.
pub type ClientId = String;

/// A correlation id supplied by the sender of a request, echoed in the reply.
pub type MessageId = String;

/// The well-known broadcast destination id, and the "leader unknown" sentinel.
pub const BROADCAST: &str = "FFFF";

/// A complete message read from or written to the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The id of the replica or client that sent this message.
    pub src: NodeId,
    /// The id of the intended recipient, or [`BROADCAST`] for "all peers".
    pub dst: NodeId,
    /// The sender's current belief about who the leader is, or [`BROADCAST`]
    /// if unknown.
    pub leader: NodeId,
    /// A correlation id, echoed by replies to allow the sender to match a
    /// response to its request.
    #[serde(rename = "MID")]
    pub mid: MessageId,
    /// The type-tagged payload.
    #[serde(flatten)]
    pub body: Body,
}

/// The type-tagged payload of an [`Envelope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Body {
    /// Client request to read a key from the state machine.
    #[serde(rename = "get")]
    Get {
        /// The key to look up.
        key: String,
    },

    /// Client request to set a key to a value.
    #[serde(rename = "put")]
    Put {
        /// The key to set.
        key: String,
        /// The value to associate with `key`.
        value: String,
    },

    /// Successful reply to a client `get` or `put`.
    #[serde(rename = "ok")]
    Ok {
        /// The looked-up value, present for `get` replies.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },

    /// Failure reply to a client request. This core never emits `fail` (see
    /// spec §7); the variant exists because it is a reachable wire type.
    #[serde(rename = "fail")]
    Fail {},

    /// Reply telling a client the contacted replica is not the leader; retry
    /// against the `leader` field of the envelope.
    #[serde(rename = "redirect")]
    Redirect {},

    /// Candidate's request for a vote.
    #[serde(rename = "requestVote")]
    RequestVote {
        /// The candidate's current term.
        term: u64,
        /// The length of the candidate's log.
        length: u64,
        /// The candidate's last log entry, or `None` if its log is empty.
        last_entry: Option<LastEntry>,
    },

    /// Vote granted in response to a `requestVote`. Denial is silent (see
    /// spec §4.3); there is no `vote_granted` field because this variant is
    /// only ever sent to grant.
    #[serde(rename = "vote")]
    Vote {},

    /// Leader's proposal/heartbeat broadcast carrying the full log.
    #[serde(rename = "append_entries_rpc")]
    AppendEntries {
        /// The leader's full log.
        updates: Vec<LogEntry>,
        /// The leader's commit index, or -1 if nothing is committed.
        commit: i64,
        /// The id of the client whose `put` this proposal serves, if any.
        client_id: ClientId,
        /// The correlation id of the client's original `put`, if any.
        client_mid: MessageId,
        /// The leader's current term.
        term: u64,
    },

    /// Follower's acknowledgement of an `append_entries_rpc`.
    #[serde(rename = "append_okay")]
    AppendOkay {
        /// Echoes the `updates` the follower just appended to its log.
        updates: Vec<LogEntry>,
        /// Echoed from the triggering `append_entries_rpc`.
        client_id: ClientId,
        /// Echoed from the triggering `append_entries_rpc`.
        client_mid: MessageId,
    },
}

/// An entry in the replicated log: a key/value write accepted in a given term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// The key being written.
    pub key: String,
    /// The value being written.
    pub value: String,
    /// The term of the leader that accepted this entry.
    pub term: u64,
}

/// A candidate's last log entry, as carried in a `requestVote`.
pub type LastEntry = LogEntry;

impl Envelope {
    /// Returns the `type` tag this envelope's body would serialize with.
    pub fn type_tag(&self) -> &'static str {
        self.body.type_tag()
    }
}

impl Body {
    /// Returns the `type` tag this body serializes with.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Body::Get { .. } => "get",
            Body::Put { .. } => "put",
            Body::Ok { .. } => "ok",
            Body::Fail {} => "fail",
            Body::Redirect {} => "redirect",
            Body::RequestVote { .. } => "requestVote",
            Body::Vote {} => "vote",
            Body::AppendEntries { .. } => "append_entries_rpc",
            Body::AppendOkay { .. } => "append_okay",
        }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            fmt,
            "{} -> {} [{}] {}",
            self.src,
            self.dst,
            self.type_tag(),
            self.mid
        )
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "({}={}@{})", self.key, self.value, self.term)
    }
}
