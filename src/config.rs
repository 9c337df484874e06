//! src/config.rs
//!
//! Defines the strongly-typed `Config` struct for all runtime parameters,
//! loaded from defaults, then `config.toml`, then `GOSSIP_`-prefixed
//! environment variables, then (for the UDP port only) a CLI positional
//! argument — each layer overriding the one before it.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::domain::{
    default_well_known_peers, WellKnownPeer, DEFAULT_CONSENSUS_TIME, DEFAULT_DB_SIZE,
    DEFAULT_FORWARD_AMOUNT, DEFAULT_GOSSIP_INTERVAL, DEFAULT_PRUNE_INTERVAL,
    DEFAULT_PRUNE_TIMEOUT,
};

/// Top-level struct holding all application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// This node's gossip identity. Defaults to `peer-<pid>`, mirroring a
    /// process-per-node deployment where the pid is a convenient handle.
    pub name: String,
    /// Host the UDP gossip socket binds to.
    pub bind_host: String,
    /// Port the UDP gossip socket binds to. `0` means an OS-assigned
    /// ephemeral port, read back after binding.
    pub bind_port: u16,
    /// Host advertised to peers in GOSSIP/GOSSIP_REPLY messages. Usually
    /// the same as `bind_host` but distinct when bound to `0.0.0.0` behind
    /// a NAT or port-forward.
    pub advertise_host: String,
    /// Port advertised to peers. Defaults to the actual bound port when
    /// `bind_port` is `0`.
    pub advertise_port: Option<u16>,
    /// Host the TCP operator console binds to.
    pub console_host: String,
    /// Port the TCP operator console binds to. `0` for an ephemeral port.
    pub console_port: u16,
    pub well_known_peers: Vec<WellKnownPeer>,
    pub db_size: usize,
    pub forward_amount: usize,
    pub gossip_interval_ms: u64,
    pub prune_interval_ms: u64,
    pub prune_timeout_ms: u64,
    pub consensus_time_ms: u64,
}

impl Config {
    /// Loads configuration from `config.toml`, environment variables, and
    /// finally an optional CLI port override (`argv[1]`, matching the
    /// original single-positional-argument invocation).
    pub fn load(cli_port: Option<u16>) -> Result<Self, figment::Error> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("GOSSIP_"));

        if let Some(port) = cli_port {
            figment = figment.merge(Serialized::default("bind_port", port));
        }

        figment.extract()
    }

    pub fn gossip_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.gossip_interval_ms)
    }

    pub fn prune_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.prune_interval_ms)
    }

    pub fn prune_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.prune_timeout_ms)
    }

    pub fn consensus_time(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.consensus_time_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: format!("peer-{}", std::process::id()),
            bind_host: "0.0.0.0".to_string(),
            bind_port: 0,
            advertise_host: "localhost".to_string(),
            advertise_port: None,
            console_host: "0.0.0.0".to_string(),
            console_port: 0,
            well_known_peers: default_well_known_peers(),
            db_size: DEFAULT_DB_SIZE,
            forward_amount: DEFAULT_FORWARD_AMOUNT,
            gossip_interval_ms: DEFAULT_GOSSIP_INTERVAL.as_millis() as u64,
            prune_interval_ms: DEFAULT_PRUNE_INTERVAL.as_millis() as u64,
            prune_timeout_ms: DEFAULT_PRUNE_TIMEOUT.as_millis() as u64,
            consensus_time_ms: DEFAULT_CONSENSUS_TIME.as_millis() as u64,
        }
    }
}
