//! src/bootstrap.rs
//!
//! One-shot database initialization: on startup, repeatedly pick a random
//! known peer and ask it for its database with QUERY, until one replies
//! with a well-formed database or we give up. The `QueryReplyPayload`
//! arrives on the main socket like any other message, so it's funneled to
//! this task through a queue rather than read directly off the wire here.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::Peer;
use crate::node::Node;
use crate::wire::{self, QueryPayload};

const MAX_ATTEMPTS: usize = 10;
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Delivers inbound QUERY-REPLY payloads to whichever bootstrap attempt is
/// currently waiting. A reply that arrives with nobody waiting (because the
/// previous attempt already timed out) is simply dropped.
pub type ReplyQueue = mpsc::UnboundedSender<Vec<Option<String>>>;

pub fn channel() -> (ReplyQueue, mpsc::UnboundedReceiver<Vec<Option<String>>>) {
    mpsc::unbounded_channel()
}

fn is_well_formed(words: &[Option<String>], expected_size: usize) -> bool {
    words.len() == expected_size
}

pub async fn run(
    node: Arc<Node>,
    mut replies: mpsc::UnboundedReceiver<Vec<Option<String>>>,
) {
    let request = wire::encode_query(&QueryPayload {});
    let mut bad_peers: HashSet<String> = HashSet::new();
    let mut attempts = 0usize;

    loop {
        let candidates: Vec<Peer> = node
            .peers
            .list()
            .into_iter()
            .filter(|p| !bad_peers.contains(&p.name))
            .collect();

        let Some(peer) = candidates.choose(&mut rand::thread_rng()).cloned() else {
            attempts += 1;
            if bad_peers.len() >= node.peers.len() || attempts >= MAX_ATTEMPTS {
                debug!("abandoning database initialization");
                return;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
            continue;
        };

        // Drain any stale replies left over from a prior, abandoned attempt.
        while replies.try_recv().is_ok() {}

        node.socket
            .send_to(&request, (peer.host.as_str(), peer.port))
            .await;

        match tokio::time::timeout(REPLY_TIMEOUT, replies.recv()).await {
            Ok(Some(words)) if is_well_formed(&words, node.database.size()) => {
                if node.database.is_all_absent() {
                    debug!(peer = %peer.name, "initializing database from peer");
                    node.database.reset(words);
                }
                return;
            }
            Ok(Some(words)) => {
                debug!(peer = %peer.name, ?words, "peer sent malformed database");
                bad_peers.insert(peer.name);
            }
            Ok(None) => return,
            Err(_) => {
                debug!(peer = %peer.name, "peer didn't reply to query");
                bad_peers.insert(peer.name);
            }
        }
    }
}

pub async fn on_query(node: &Node, from: std::net::SocketAddr) {
    let reply = wire::QueryReplyPayload {
        words: node.database.snapshot(),
    };
    node.socket
        .send_to(&wire::encode_query_reply(&reply), from)
        .await;
}

pub fn on_query_reply(replies: &ReplyQueue, payload: wire::QueryReplyPayload) {
    let _ = replies.send(payload.words);
}
