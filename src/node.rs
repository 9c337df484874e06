//! src/node.rs
//!
//! `Node` bundles every piece of shared state a running instance needs:
//! its own identity, the socket it sends and receives on, the resolved
//! timing parameters, and the four independently-locked resources
//! described in `domain`. It is built once in `App::run` and handed out as
//! an `Arc` to every task and per-datagram handler, so cloning it is cheap
//! and never touches a lock.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::consensus::ConsensusRegistry;
use crate::domain::{Database, GossipCache, PeerTable, WellKnownPeer};
use crate::transport::Socket;

pub struct Node {
    pub name: String,
    pub advertise_host: String,
    pub advertise_port: u16,
    pub socket: Socket,
    pub peers: PeerTable,
    pub gossip_cache: GossipCache,
    pub database: Database,
    pub consensus: ConsensusRegistry,
    pub well_known_peers: Vec<WellKnownPeer>,
    pub forward_amount: usize,
    pub gossip_interval: Duration,
    pub prune_interval: Duration,
    pub prune_timeout: Duration,
    pub consensus_time: Duration,
}

impl Node {
    pub fn new(config: &Config, socket: Socket, advertise_port: u16) -> Arc<Self> {
        Arc::new(Self {
            name: config.name.clone(),
            advertise_host: config.advertise_host.clone(),
            advertise_port,
            socket,
            peers: PeerTable::new(config.name.clone()),
            gossip_cache: GossipCache::new(),
            database: Database::new(config.db_size),
            consensus: ConsensusRegistry::new(),
            well_known_peers: config.well_known_peers.clone(),
            forward_amount: config.forward_amount,
            gossip_interval: config.gossip_interval(),
            prune_interval: config.prune_interval(),
            prune_timeout: config.prune_timeout(),
            consensus_time: config.consensus_time(),
        })
    }
}
