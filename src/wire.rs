//! src/wire.rs
//!
//! The on-the-wire envelope shared by every UDP datagram. All messages are
//! plain JSON objects with a mandatory `command` field; everything else is
//! command-specific. There is no encryption, signing, or framing beyond a
//! single JSON value per datagram.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// No message this node sends or expects to receive may exceed this many
/// bytes, matching the practical ceiling for an unfragmented UDP datagram.
pub const MAX_DATAGRAM: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GossipPayload {
    pub originator: String,
    pub host: String,
    pub port: u16,
    pub message_id: Uuid,
}

/// Bootstrap request. The sender is identified by the datagram's source
/// address; no payload fields are needed beyond the command tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPayload {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryReplyPayload {
    pub words: Vec<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusPayload {
    pub message_id: Uuid,
    /// Oral-Messages recursion level remaining. Zero means "don't recurse,
    /// just answer with what you have."
    pub om: usize,
    pub index: usize,
    /// The value the sender is proposing for this index. Absent on the
    /// root call, where each node just contributes its own stored word.
    pub value: Option<String>,
    /// The full peer set the sender knew of when it started this round, as
    /// `"host:port"` strings; recipients recurse to this same set. Peer
    /// identity isn't needed here, only the address to recurse to.
    pub peers: Vec<String>,
    /// Unix timestamp (seconds, fractional) by which the recipient must
    /// reply. Absolute, not relative, so clock skew aside every hop agrees
    /// on the same deadline.
    pub due: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusReplyPayload {
    pub reply_to: Uuid,
    pub value: Option<String>,
}

/// An unconditional, un-consensused write broadcast by the operator
/// console to every known peer. Applied as-is by every recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPayload {
    pub index: usize,
    pub word: Option<String>,
}

/// Every inbound datagram, decoded and tagged by its `command` field.
#[derive(Debug, Clone)]
pub enum Inbound {
    Gossip(GossipPayload),
    GossipReply(GossipPayload),
    Query(QueryPayload),
    QueryReply(QueryReplyPayload),
    Consensus(ConsensusPayload),
    ConsensusReply(ConsensusReplyPayload),
    Set(SetPayload),
}

#[derive(Debug, Deserialize)]
struct Tagged {
    command: String,
}

pub fn decode(bytes: &[u8]) -> Result<Inbound, DecodeError> {
    let tagged: Tagged = serde_json::from_slice(bytes)?;
    match tagged.command.as_str() {
        "GOSSIP" => Ok(Inbound::Gossip(serde_json::from_slice(bytes)?)),
        "GOSSIP_REPLY" => Ok(Inbound::GossipReply(serde_json::from_slice(bytes)?)),
        "QUERY" => Ok(Inbound::Query(serde_json::from_slice(bytes)?)),
        "QUERY-REPLY" => Ok(Inbound::QueryReply(serde_json::from_slice(bytes)?)),
        "CONSENSUS" => Ok(Inbound::Consensus(serde_json::from_slice(bytes)?)),
        "CONSENSUS-REPLY" => Ok(Inbound::ConsensusReply(serde_json::from_slice(bytes)?)),
        "SET" => Ok(Inbound::Set(serde_json::from_slice(bytes)?)),
        other => Err(DecodeError::UnknownCommand(other.to_string())),
    }
}

/// Wraps a command-specific payload with its `command` tag and serializes
/// it. Panics only on a serde bug (these payload types always serialize).
fn wrap<T: Serialize>(command: &str, payload: &T) -> Vec<u8> {
    let mut value = serde_json::to_value(payload).expect("payload always serializes");
    value
        .as_object_mut()
        .expect("payload is always a JSON object")
        .insert("command".to_string(), command.into());
    serde_json::to_vec(&value).expect("value always serializes")
}

pub fn encode_gossip(payload: &GossipPayload) -> Vec<u8> {
    wrap("GOSSIP", payload)
}

pub fn encode_gossip_reply(payload: &GossipPayload) -> Vec<u8> {
    wrap("GOSSIP_REPLY", payload)
}

pub fn encode_query(payload: &QueryPayload) -> Vec<u8> {
    wrap("QUERY", payload)
}

pub fn encode_query_reply(payload: &QueryReplyPayload) -> Vec<u8> {
    wrap("QUERY-REPLY", payload)
}

pub fn encode_consensus(payload: &ConsensusPayload) -> Vec<u8> {
    wrap("CONSENSUS", payload)
}

pub fn encode_consensus_reply(payload: &ConsensusReplyPayload) -> Vec<u8> {
    wrap("CONSENSUS-REPLY", payload)
}

pub fn encode_set(payload: &SetPayload) -> Vec<u8> {
    wrap("SET", payload)
}
