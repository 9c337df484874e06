//! src/pruner.rs
//!
//! Periodically evicts peers we haven't heard from in a while. Gossip
//! cache entries are never pruned this way: a dead peer's last gossip stays
//! cached so a late duplicate of it is still recognized and dropped.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::node::Node;

pub async fn run(node: Arc<Node>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(node.prune_interval) => {}
        }

        let evicted = node.peers.prune(node.prune_timeout);
        if !evicted.is_empty() {
            debug!(?evicted, "pruned stale peers");
        }
    }
}
