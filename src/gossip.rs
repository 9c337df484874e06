//! src/gossip.rs
//!
//! Epidemic membership gossip: a periodic task announces this node to
//! everyone it knows, inbound GOSSIP is deduplicated and forwarded to a
//! bounded random sample, and GOSSIP_REPLY lets the node that just
//! gossiped learn about us without waiting for our own gossip to reach it.

use std::sync::Arc;

use rand::seq::SliceRandom;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::node::Node;
use crate::wire::{self, GossipPayload};

/// Sends a fresh GOSSIP announcing this node to every peer in `targets`.
async fn gossip_to(node: &Node, targets: &[(String, u16)]) {
    let payload = GossipPayload {
        originator: node.name.clone(),
        host: node.advertise_host.clone(),
        port: node.advertise_port,
        message_id: Uuid::new_v4(),
    };
    let bytes = wire::encode_gossip(&payload);
    for (host, port) in targets {
        node.socket.send_to(&bytes, (host.as_str(), *port)).await;
    }
}

/// Gossips to the hard-coded well-known peers once at startup, then
/// repeatedly to whichever peers are currently known, forever until
/// `shutdown` fires.
pub async fn run(node: Arc<Node>, shutdown: CancellationToken) {
    tokio::select! {
        _ = shutdown.cancelled() => return,
        _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
    }

    debug!("gossiping to well-known peers");
    let well_known: Vec<(String, u16)> = node
        .well_known_peers
        .iter()
        .map(|p| (p.host.clone(), p.port))
        .collect();
    gossip_to(&node, &well_known).await;

    tokio::select! {
        _ = shutdown.cancelled() => return,
        _ = tokio::time::sleep(std::time::Duration::from_secs(3)) => {}
    }

    loop {
        let targets: Vec<(String, u16)> = node
            .peers
            .list()
            .into_iter()
            .map(|p| (p.host, p.port))
            .collect();
        trace!(count = targets.len(), "gossiping to known peers");
        gossip_to(&node, &targets).await;

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(node.gossip_interval) => {}
        }
    }
}

/// Handles an inbound GOSSIP: admits it into the cache (which, per its own
/// contract, first updates the peer table and only commits/forwards if that
/// update didn't turn out to be a self-echo), then forwards to a random
/// sample of peers and replies directly to the sender so it learns about us
/// without waiting for our own periodic gossip round.
pub async fn on_gossip(node: &Node, payload: GossipPayload, raw: Vec<u8>) {
    let originator = payload.originator.clone();
    let message_id = payload.message_id;
    let host = payload.host.clone();
    let port = payload.port;

    let forwarded = node
        .gossip_cache
        .admit(&originator, message_id, raw, || {
            node.peers.update(&originator, &host, port).is_some()
        });

    if !forwarded {
        return;
    }

    debug!(peer = %originator, "gossip admitted, forwarding");

    let mut peers = node.peers.list();
    peers.retain(|p| p.name != originator);
    {
        let mut rng = rand::thread_rng();
        peers.shuffle(&mut rng);
    }
    peers.truncate(node.forward_amount);

    let forward_bytes = wire::encode_gossip(&GossipPayload {
        originator: originator.clone(),
        host: host.clone(),
        port,
        message_id,
    });
    for peer in &peers {
        node.socket
            .send_to(&forward_bytes, (peer.host.as_str(), peer.port))
            .await;
    }

    let reply = GossipPayload {
        originator: node.name.clone(),
        host: node.advertise_host.clone(),
        port: node.advertise_port,
        message_id: Uuid::new_v4(),
    };
    node.socket
        .send_to(&wire::encode_gossip_reply(&reply), (host.as_str(), port))
        .await;
}

/// Handles an inbound GOSSIP_REPLY: just teaches us about the replier, no
/// forwarding and no reply-to-the-reply.
pub async fn on_gossip_reply(node: &Node, payload: GossipPayload) {
    node.peers
        .update(&payload.originator, &payload.host, payload.port);
}
