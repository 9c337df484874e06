//! tests/component/gossip.rs
//!
//! Exercises gossip admission and forwarding directly against a `Node`,
//! without going through `App` or a full socket receive loop.

use std::net::SocketAddr;
use std::time::Duration;

use gossip_node::config::Config;
use gossip_node::node::Node;
use gossip_node::transport::Socket;
use gossip_node::wire::{self, GossipPayload, Inbound};
use gossip_node::{dispatch::handle, gossip};
use tokio::sync::mpsc;
use uuid::Uuid;

async fn node_at(name: &str) -> (std::sync::Arc<Node>, SocketAddr) {
    let socket = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let addr = socket.local_addr().unwrap();
    let config = Config {
        name: name.to_string(),
        bind_host: "127.0.0.1".to_string(),
        bind_port: addr.port(),
        advertise_host: "127.0.0.1".to_string(),
        advertise_port: Some(addr.port()),
        console_host: "127.0.0.1".to_string(),
        console_port: 0,
        well_known_peers: vec![],
        db_size: 5,
        forward_amount: 3,
        gossip_interval_ms: 10_000,
        prune_interval_ms: 10_000,
        prune_timeout_ms: 10_000,
        consensus_time_ms: 1000,
    };
    let node = Node::new(&config, socket, addr.port());
    (node, addr)
}

#[tokio::test]
async fn duplicate_gossip_is_not_forwarded_twice() {
    let (node, _addr) = node_at("under-test").await;
    let (replies_tx, _replies_rx) = mpsc::unbounded_channel();

    let payload = GossipPayload {
        originator: "alice".to_string(),
        host: "127.0.0.1".to_string(),
        port: 9999,
        message_id: Uuid::new_v4(),
    };
    let raw = wire::encode_gossip(&payload);
    let from: SocketAddr = "127.0.0.1:9999".parse().unwrap();

    handle(node.clone(), replies_tx.clone(), raw.clone(), from).await;
    assert_eq!(node.peers.len(), 1);

    handle(node.clone(), replies_tx, raw, from).await;
    assert_eq!(node.peers.len(), 1, "duplicate gossip must not be re-admitted");
}

#[tokio::test]
async fn self_echo_is_never_admitted() {
    let (node, addr) = node_at("me").await;
    let payload = GossipPayload {
        originator: "me".to_string(),
        host: "127.0.0.1".to_string(),
        port: addr.port(),
        message_id: Uuid::new_v4(),
    };
    let raw = wire::encode_gossip(&payload);

    match wire::decode(&raw).unwrap() {
        Inbound::Gossip(p) => gossip::on_gossip(&node, p, raw.clone()).await,
        _ => unreachable!(),
    }

    assert_eq!(node.peers.len(), 0);
    assert_eq!(node.gossip_cache.len(), 0);
}

#[tokio::test]
async fn gossip_reply_updates_peer_table_without_forwarding() {
    let (node, _addr) = node_at("under-test").await;
    let payload = GossipPayload {
        originator: "bob".to_string(),
        host: "127.0.0.1".to_string(),
        port: 8000,
        message_id: Uuid::new_v4(),
    };
    gossip::on_gossip_reply(&node, payload).await;

    assert_eq!(node.peers.len(), 1);
    assert_eq!(node.gossip_cache.len(), 0, "replies never touch the gossip cache");
}

#[tokio::test]
async fn fresh_gossip_from_known_peer_replaces_cached_record() {
    let (node, _addr) = node_at("under-test").await;
    let (replies_tx, _replies_rx) = mpsc::unbounded_channel();
    let from: SocketAddr = "127.0.0.1:9999".parse().unwrap();

    let first = GossipPayload {
        originator: "alice".to_string(),
        host: "127.0.0.1".to_string(),
        port: 9999,
        message_id: Uuid::new_v4(),
    };
    handle(node.clone(), replies_tx.clone(), wire::encode_gossip(&first), from).await;

    let second = GossipPayload {
        originator: "alice".to_string(),
        host: "127.0.0.1".to_string(),
        port: 9999,
        message_id: Uuid::new_v4(),
    };
    handle(node.clone(), replies_tx, wire::encode_gossip(&second), from).await;

    assert_eq!(node.gossip_cache.len(), 1);
    assert_eq!(node.peers.len(), 1);
    tokio::time::sleep(Duration::from_millis(1)).await;
}
