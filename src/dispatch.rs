//! src/dispatch.rs
//!
//! The single entry point every inbound datagram passes through: decode,
//! then route to the handler for whichever command it carried. Decoding
//! failures are logged and dropped here, before any handler ever sees them.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::bootstrap::ReplyQueue;
use crate::node::Node;
use crate::transport::decode_logged;
use crate::wire::Inbound;
use crate::{consensus, gossip};

pub async fn handle(node: Arc<Node>, bootstrap_replies: ReplyQueue, datagram: Vec<u8>, from: SocketAddr) {
    let Some(inbound) = decode_logged(&datagram, from) else {
        return;
    };

    match inbound {
        Inbound::Gossip(payload) => gossip::on_gossip(&node, payload, datagram).await,
        Inbound::GossipReply(payload) => gossip::on_gossip_reply(&node, payload).await,
        Inbound::Query(_) => crate::bootstrap::on_query(&node, from).await,
        Inbound::QueryReply(payload) => crate::bootstrap::on_query_reply(&bootstrap_replies, payload),
        Inbound::Consensus(payload) => {
            consensus::on_consensus(&node.socket, &node.consensus, &node.database, payload, from).await
        }
        Inbound::ConsensusReply(payload) => {
            consensus::on_consensus_reply(&node.consensus, &node.peers, payload, from).await
        }
        Inbound::Set(payload) => node.database.set(payload.index, payload.word),
    }
}
