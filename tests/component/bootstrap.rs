//! tests/component/bootstrap.rs
//!
//! Exercises the one-shot database bootstrap against a real peer reachable
//! over loopback UDP, driving datagrams through the same decode path the
//! socket receive loop uses.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gossip_node::bootstrap;
use gossip_node::config::Config;
use gossip_node::domain::WellKnownPeer;
use gossip_node::node::Node;
use gossip_node::transport::{decode_logged, Socket};
use gossip_node::wire::{Inbound, MAX_DATAGRAM};

async fn spawn_node(name: &str, well_known: Vec<WellKnownPeer>) -> (Arc<Node>, SocketAddr) {
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
        well_known_peers: well_known,
        db_size: 3,
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
async fn bootstrap_initializes_database_from_a_peer() {
    let (server, server_addr) = spawn_node("server", vec![]).await;
    server
        .database
        .reset(vec![Some("a".into()), None, Some("c".into())]);

    let seed = WellKnownPeer {
        name: "server".to_string(),
        host: "127.0.0.1".to_string(),
        port: server_addr.port(),
    };
    let (client, _client_addr) = spawn_node("client", vec![seed]).await;
    client.peers.update("server", "127.0.0.1", server_addr.port());

    let server_task = tokio::spawn({
        let server = server.clone();
        async move {
            let mut buf = vec![0u8; MAX_DATAGRAM];
            loop {
                match tokio::time::timeout(Duration::from_secs(3), server.socket.recv_from(&mut buf)).await {
                    Ok(Ok((len, from))) => {
                        if let Some(Inbound::Query(_)) = decode_logged(&buf[..len], from) {
                            bootstrap::on_query(&server, from).await;
                        }
                    }
                    _ => break,
                }
            }
        }
    });

    let (replies_tx, replies_rx) = bootstrap::channel();
    let client_recv_task = tokio::spawn({
        let client = client.clone();
        let replies_tx = replies_tx.clone();
        async move {
            let mut buf = vec![0u8; MAX_DATAGRAM];
            loop {
                match tokio::time::timeout(Duration::from_secs(3), client.socket.recv_from(&mut buf)).await {
                    Ok(Ok((len, from))) => {
                        if let Some(Inbound::QueryReply(payload)) = decode_logged(&buf[..len], from) {
                            bootstrap::on_query_reply(&replies_tx, payload);
                        }
                    }
                    _ => break,
                }
            }
        }
    });

    bootstrap::run(client.clone(), replies_rx).await;

    assert_eq!(
        client.database.snapshot(),
        vec![Some("a".to_string()), None, Some("c".to_string())]
    );

    server_task.abort();
    client_recv_task.abort();
}

#[tokio::test]
async fn bootstrap_gives_up_with_no_known_peers() {
    let (client, _addr) = spawn_node("lonely", vec![]).await;
    let (_replies_tx, replies_rx) = bootstrap::channel();

    // With zero peers, `run` must return promptly rather than looping forever.
    tokio::time::timeout(Duration::from_secs(2), bootstrap::run(client.clone(), replies_rx))
        .await
        .expect("bootstrap must give up instead of hanging with no peers");

    assert!(client.database.is_all_absent());
}
