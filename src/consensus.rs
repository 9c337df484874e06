//! src/consensus.rs
//!
//! Recursive Byzantine Oral-Messages consensus (OM(m)) over a single
//! database index. A node starts a round with OM level `floor(peer_count /
//! 3)`; every CONSENSUS it receives recurses one level lower until OM
//! reaches zero, at which point the recipient just answers with its own
//! word. A lying node never recurses regardless of the level it was handed.
//!
//! Each in-flight round is tracked in a [`ConsensusRegistry`] keyed by a
//! fresh `message_id`, so replies can be routed back to the waiter that
//! started them.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::Notify;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{Database, PeerTable, CONSENSUS_WAIT_FOR};
use crate::sync::Locked;
use crate::transport::Socket;
use crate::wire::{self, ConsensusPayload, ConsensusReplyPayload};

/// Splits a wire `"host:port"` address into its parts, tolerating hosts
/// that are themselves IPv6 literals with embedded colons by splitting on
/// the last one.
fn parse_peer_addr(addr: &str) -> Option<(&str, u16)> {
    let (host, port) = addr.rsplit_once(':')?;
    let port = port.parse().ok()?;
    Some((host, port))
}

/// A single in-flight consensus round this node originated (either as the
/// root caller or as a recursive sub-call triggered by an inbound CONSENSUS).
struct Instance {
    /// The value the caller who started this round is proposing, seeded
    /// into the plurality tally alongside whatever replies come back.
    received: Option<String>,
    peer_count: usize,
    replies: Locked<Vec<Option<String>>>,
    notify: Notify,
}

/// All consensus rounds this node currently has outstanding, keyed by the
/// `message_id` it generated when it sent out the CONSENSUS requests.
#[derive(Default)]
pub struct ConsensusRegistry {
    instances: Locked<HashMap<Uuid, std::sync::Arc<Instance>>>,
}

impl ConsensusRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

fn now_unix() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Tallies `replies` (plus the node's own `received` value) and returns the
/// plurality winner, breaking ties in favor of whichever distinct value was
/// seen first. `Vec::iter().max_by_key` would instead favor the last value
/// seen on a tie, which is not deterministic across differently-ordered
/// reply arrivals.
fn plurality(received: &Option<String>, replies: &[Option<String>]) -> Option<String> {
    let mut order: Vec<Option<String>> = Vec::new();
    let mut counts: HashMap<Option<String>, usize> = HashMap::new();

    for value in std::iter::once(received.clone()).chain(replies.iter().cloned()) {
        if !counts.contains_key(&value) {
            order.push(value.clone());
        }
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut best: Option<(Option<String>, usize)> = None;
    for value in order {
        let count = counts[&value];
        match &best {
            Some((_, best_count)) if count <= *best_count => {}
            _ => best = Some((value, count)),
        }
    }
    best.map(|(value, _)| value).flatten()
}

/// Runs a (sub-)consensus round: sends CONSENSUS to every peer in `peers`,
/// waits until `due` (scaled by [`CONSENSUS_WAIT_FOR`]) for replies, then
/// resolves via plurality against `received` (the value the caller who
/// invoked us is proposing, or `None` at the root).
pub async fn do_consensus(
    socket: &Socket,
    registry: &ConsensusRegistry,
    om: usize,
    index: usize,
    own_value: Option<String>,
    received: Option<String>,
    peers: Vec<String>,
    due: f64,
) -> Option<String> {
    let message_id = Uuid::new_v4();
    let instance = std::sync::Arc::new(Instance {
        received: received.clone(),
        peer_count: peers.len(),
        replies: Locked::new(Vec::new()),
        notify: Notify::new(),
    });

    registry
        .instances
        .lock()
        .insert(message_id, instance.clone());

    let payload = ConsensusPayload {
        message_id,
        om,
        index,
        value: own_value,
        peers: peers.clone(),
        due,
    };
    let bytes = wire::encode_consensus(&payload);
    for addr in &peers {
        if let Some((host, port)) = parse_peer_addr(addr) {
            socket.send_to(&bytes, (host, port)).await;
        } else {
            warn!(%addr, "skipping malformed peer address in consensus round");
        }
    }

    let wait_for = ((due - now_unix()) * CONSENSUS_WAIT_FOR).max(0.0);
    let deadline = Duration::from_secs_f64(wait_for);
    let _ = tokio::time::timeout(deadline, instance.notify.notified()).await;

    registry.instances.lock().remove(&message_id);

    let replies = instance.replies.lock().clone();
    if replies.is_empty() {
        warn!(%message_id, "nobody replied to consensus round");
    }
    plurality(&instance.received, &replies)
}

/// Starts a brand-new top-level consensus round on `index`, persisting the
/// winner back into the database before returning the truthful word.
pub async fn start_consensus(
    socket: &Socket,
    registry: &ConsensusRegistry,
    peer_table: &PeerTable,
    database: &Database,
    consensus_time: Duration,
    index: usize,
) -> Option<String> {
    let om = peer_table.len() / 3;
    let peers: Vec<String> = peer_table
        .list()
        .into_iter()
        .map(|p| p.address())
        .collect();
    let own_value = database.get_truthful(index);
    let due = now_unix() + consensus_time.as_secs_f64();

    let winner = do_consensus(socket, registry, om, index, own_value, None, peers, due).await;
    database.set(index, winner);
    database.get_truthful(index)
}

/// Handles an inbound CONSENSUS request: recurse one OM level lower unless
/// we're out of levels or lying, then reply with our resolved word.
pub async fn on_consensus(
    socket: &Socket,
    registry: &ConsensusRegistry,
    database: &Database,
    payload: ConsensusPayload,
    from: std::net::SocketAddr,
) {
    let word = if payload.om == 0 || database.is_lying() {
        database.get(payload.index)
    } else {
        do_consensus(
            socket,
            registry,
            payload.om - 1,
            payload.index,
            database.get(payload.index),
            payload.value,
            payload.peers,
            payload.due,
        )
        .await
    };

    let reply = ConsensusReplyPayload {
        reply_to: payload.message_id,
        value: word,
    };
    socket.send_to(&wire::encode_consensus_reply(&reply), from).await;
}

/// Handles an inbound CONSENSUS-REPLY, routing it to the matching waiter if
/// one is still registered (it may have already timed out and been evicted,
/// in which case the reply is simply dropped).
pub async fn on_consensus_reply(
    registry: &ConsensusRegistry,
    peer_table: &PeerTable,
    payload: ConsensusReplyPayload,
    from: std::net::SocketAddr,
) {
    let instance = registry.instances.lock().get(&payload.reply_to).cloned();
    if let Some(instance) = instance {
        let mut replies = instance.replies.lock();
        replies.push(payload.value.clone());
        let done = replies.len() >= instance.peer_count;
        drop(replies);
        if done {
            instance.notify.notify_one();
        }
    } else {
        debug!(reply_to = %payload.reply_to, "consensus reply arrived after round closed");
    }

    peer_table.record_last_word(&from.ip().to_string(), from.port(), payload.value);
}
