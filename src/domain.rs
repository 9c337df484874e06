//! src/domain.rs
//!
//! Consolidates the core data structures of a node: the peer a gossip message
//! came from, the table of peers currently believed live, the cache used to
//! suppress duplicate gossip, and the tiny indexed word database that
//! consensus operates over. This is the single source of truth for the
//! application's domain model.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sync::Locked;

pub const DEFAULT_DB_SIZE: usize = 5;
pub const DEFAULT_FORWARD_AMOUNT: usize = 3;
pub const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_PRUNE_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_GOSSIP_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_CONSENSUS_TIME: Duration = Duration::from_secs(10);
/// Fraction of the remaining time-to-deadline a consensus round actually
/// waits for replies. Not exposed as a config knob: it's an algorithmic
/// constant of the Oral-Messages protocol, not a deployment tuning value.
pub const CONSENSUS_WAIT_FOR: f64 = 0.8;

/// A hard-coded bootstrap entry, contacted once at startup regardless of
/// whether it is actually reachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellKnownPeer {
    pub name: String,
    pub host: String,
    pub port: u16,
}

pub fn default_well_known_peers() -> Vec<WellKnownPeer> {
    vec![
        WellKnownPeer {
            name: "well-known 1".into(),
            host: "localhost".into(),
            port: 8411,
        },
        WellKnownPeer {
            name: "well-known 2".into(),
            host: "localhost".into(),
            port: 8412,
        },
        WellKnownPeer {
            name: "well-known 3".into(),
            host: "localhost".into(),
            port: 8413,
        },
    ]
}

/// A self-conscious peer: who they are, where to reach them, when we last
/// heard from them, and the last word they told us during a consensus round.
#[derive(Debug, Clone)]
pub struct Peer {
    pub name: String,
    pub host: String,
    pub port: u16,
    last_seen: Instant,
    pub last_word: Option<String>,
}

impl Peer {
    fn new(name: String, host: String, port: u16) -> Self {
        Self {
            name,
            host,
            port,
            last_seen: Instant::now(),
            last_word: None,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Peer name={}, host={}, port={}>, Last word: {}",
            self.name,
            self.host,
            self.port,
            self.last_word.as_deref().unwrap_or("None")
        )
    }
}

/// Live membership. Keyed by `name`; `(host, port)` is advisory only since
/// addresses can alias (e.g. `localhost` vs `127.0.0.1`).
pub struct PeerTable {
    self_name: String,
    peers: Locked<HashMap<String, Peer>>,
}

impl PeerTable {
    pub fn new(self_name: String) -> Self {
        Self {
            self_name,
            peers: Locked::new(HashMap::new()),
        }
    }

    /// Shallow copy so callers never iterate while holding the lock.
    pub fn list(&self) -> Vec<Peer> {
        self.peers.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    /// A gossip or gossip-reply taught us about `name`. Returns `None` if
    /// `name` is our own name (self-echo) without touching the table.
    pub fn update(&self, name: &str, host: &str, port: u16) -> Option<Peer> {
        if name == self.self_name {
            return None;
        }

        let mut guard = self.peers.lock();
        let peer = guard
            .entry(name.to_string())
            .and_modify(|p| p.last_seen = Instant::now())
            .or_insert_with(|| Peer::new(name.to_string(), host.to_string(), port));
        Some(peer.clone())
    }

    /// Best-effort lookup by address. May miss due to address aliasing;
    /// callers must tolerate `None`.
    pub fn find(&self, host: &str, port: u16) -> Option<Peer> {
        self.peers
            .lock()
            .values()
            .find(|p| p.host == host && p.port == port)
            .cloned()
    }

    /// Records the last word heard from the peer at `(host, port)`, if we
    /// can find them. Opportunistic: correctness never depends on this
    /// hitting, since the source address may alias the peer's advertised one.
    pub fn record_last_word(&self, host: &str, port: u16, word: Option<String>) {
        if let Some(peer) = self
            .peers
            .lock()
            .values_mut()
            .find(|p| p.host == host && p.port == port)
        {
            peer.last_word = word;
        }
    }

    /// Removes peers untouched for longer than `timeout`, returning their
    /// names for logging.
    pub fn prune(&self, timeout: Duration) -> Vec<String> {
        let mut guard = self.peers.lock();
        let stale: Vec<String> = guard
            .iter()
            .filter(|(_, p)| p.last_seen.elapsed() > timeout)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &stale {
            guard.remove(name);
        }
        stale
    }

    pub fn format(&self) -> String {
        let peers = self.list();
        let rendered: Vec<String> = peers.iter().map(|p| p.to_string()).collect();
        format!("[{}]", rendered.join(", "))
    }
}

/// The most recent gossip we've admitted from a given originator, kept only
/// to suppress replays and to forward the exact bytes we received.
#[derive(Clone)]
pub struct GossipRecord {
    pub message_id: Uuid,
    pub raw: Vec<u8>,
}

/// At most one record per originator.
pub struct GossipCache {
    records: Locked<HashMap<String, GossipRecord>>,
}

impl GossipCache {
    pub fn new() -> Self {
        Self {
            records: Locked::new(HashMap::new()),
        }
    }

    /// Admits a gossip from `originator` if its `message_id` is new. If so,
    /// `on_fresh` is invoked while the cache is still locked (it must be
    /// synchronous and non-blocking: typically a peer-table update) and its
    /// result decides whether the record is actually committed. This lets a
    /// self-echoed gossip (peer-table update returns nothing) fail to
    /// displace the still-valid cached record for that originator.
    ///
    /// Returns `true` only if the record was fresh and `on_fresh` accepted
    /// it, which is also exactly when the gossip should be forwarded.
    pub fn admit(
        &self,
        originator: &str,
        message_id: Uuid,
        raw: Vec<u8>,
        on_fresh: impl FnOnce() -> bool,
    ) -> bool {
        let mut guard = self.records.lock();
        let is_duplicate =
            matches!(guard.get(originator), Some(rec) if rec.message_id == message_id);
        if is_duplicate {
            return false;
        }
        if !on_fresh() {
            return false;
        }
        guard.insert(originator.to_string(), GossipRecord { message_id, raw });
        true
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }
}

impl Default for GossipCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-length indexed word store. `lying` taints every `get` but never
/// `set`, modeling a node that misreports its own state during consensus.
pub struct Database {
    words: Locked<Vec<Option<String>>>,
    lying: std::sync::atomic::AtomicBool,
    size: usize,
}

impl Database {
    pub fn new(size: usize) -> Self {
        Self {
            words: Locked::new(vec![None; size]),
            lying: std::sync::atomic::AtomicBool::new(false),
            size,
        }
    }

    /// The word at `index`, tainted with a `" lie"` suffix if lying.
    pub fn get(&self, index: usize) -> Option<String> {
        let word = self.words.lock()[index].clone();
        if self.is_lying() {
            Some(format!("{} lie", word.unwrap_or_default()))
        } else {
            word
        }
    }

    /// The raw word at `index`, unaffected by lying. Used for the `QUERY`
    /// reply and for applying a consensus result back into storage.
    pub fn get_truthful(&self, index: usize) -> Option<String> {
        self.words.lock()[index].clone()
    }

    pub fn set(&self, index: usize, value: Option<String>) {
        self.words.lock()[index] = value;
    }

    pub fn snapshot(&self) -> Vec<Option<String>> {
        self.words.lock().clone()
    }

    pub fn reset(&self, words: Vec<Option<String>>) {
        *self.words.lock() = words;
    }

    pub fn is_all_absent(&self) -> bool {
        self.words.lock().iter().all(Option::is_none)
    }

    pub fn lie(&self) {
        self.lying
            .store(true, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn truth(&self) {
        self.lying
            .store(false, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn is_lying(&self) -> bool {
        self.lying.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn size(&self) -> usize {
        self.size
    }
}
