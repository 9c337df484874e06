//! tests/integration/adversarial.rs
//!
//! E2E tests for Byzantine fault tolerance: a lying node must not be able
//! to corrupt the consensus result the honest majority converges on, and
//! its own `get` reads must be visibly tainted while `set` stays truthful.

use std::time::Duration;

use test_log::test;

use gossip_node::domain::WellKnownPeer;

use crate::common::harness::TestNode;

fn seed_from(node: &TestNode) -> WellKnownPeer {
    WellKnownPeer {
        name: node.config.name.clone(),
        host: "127.0.0.1".to_string(),
        port: node.gossip_addr.port(),
    }
}

async fn peers_know(node: &TestNode, other_name: &str) -> bool {
    let mut console = node.console().await.unwrap();
    let peers = console.send("peers").await.unwrap();
    peers.contains(&format!("name={other_name}"))
}

#[test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn one_lying_node_does_not_corrupt_consensus_majority() {
    let test_timeout = Duration::from_secs(20);
    let result = tokio::time::timeout(test_timeout, async {
        let a = TestNode::spawn("a", vec![]).await.expect("spawn a");
        let b = TestNode::spawn("b", vec![seed_from(&a)]).await.expect("spawn b");
        let liar = TestNode::spawn("liar", vec![seed_from(&b)])
            .await
            .expect("spawn liar");

        // Wait for full mesh: each of a/b/liar knows about the other two.
        loop {
            if peers_know(&a, "b").await
                && peers_know(&a, "liar").await
                && peers_know(&b, "a").await
                && peers_know(&b, "liar").await
                && peers_know(&liar, "a").await
                && peers_know(&liar, "b").await
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }

        // All three agree on the same truthful value for index 0.
        let mut a_console = a.console().await.unwrap();
        a_console.send("set 0 truth").await.unwrap();
        loop {
            let mut b_console = b.console().await.unwrap();
            let mut liar_console = liar.console().await.unwrap();
            let b_current = b_console.send("current").await.unwrap();
            let liar_current = liar_console.send("current").await.unwrap();
            if b_current.contains("truth") && liar_current.contains("truth") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let mut liar_console = liar.console().await.unwrap();
        liar_console.send("lie").await.unwrap();

        let mut b_console = b.console().await.unwrap();
        b_console.send("consensus 0").await.unwrap();

        // Give the consensus round time to finish, then check b's view,
        // which must have converged on the honest majority value despite
        // the liar's tainted reply.
        tokio::time::sleep(Duration::from_secs(3)).await;
        let mut b_console = b.console().await.unwrap();
        let b_current = b_console.send("current").await.unwrap();
        assert!(
            b_current.contains("truth") && !b_current.contains("lie"),
            "honest node's database should hold the majority value, got: {b_current}"
        );

        a.shutdown();
        b.shutdown();
        liar.shutdown();
    })
    .await;

    assert!(result.is_ok(), "adversarial consensus test timed out");
}

#[test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn lying_node_taints_its_own_reads_but_not_its_writes() {
    let test_timeout = Duration::from_secs(10);
    let result = tokio::time::timeout(test_timeout, async {
        let node = TestNode::spawn("liar", vec![]).await.expect("spawn liar");
        let mut console = node.console().await.unwrap();

        console.send("set 0 hello").await.unwrap();
        console.send("lie").await.unwrap();

        let current = console.send("current").await.unwrap();
        assert!(
            current.contains("hello lie"),
            "lying node's reads should be suffixed, got: {current}"
        );

        console.send("truth").await.unwrap();
        let current = console.send("current").await.unwrap();
        assert!(
            current.contains("hello") && !current.contains("lie"),
            "truthful node's reads should not be tainted, got: {current}"
        );

        node.shutdown();
    })
    .await;

    assert!(result.is_ok(), "lying taint test timed out");
}
