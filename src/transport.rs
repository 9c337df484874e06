//! src/transport.rs
//!
//! The UDP socket every inbound datagram arrives on and every outbound
//! message leaves through. Wrapped in an `Arc` and shared directly between
//! the receive loop and every handler it spawns, rather than guarded by an
//! explicit mutex: `tokio::net::UdpSocket` already supports concurrent
//! sends and receives from multiple tasks, and serializing access behind a
//! lock would mean a long-idle `recv_from` blocking every outbound send
//! until the next datagram arrived.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{ToSocketAddrs, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::wire::{self, MAX_DATAGRAM};

#[derive(Clone)]
pub struct Socket {
    inner: Arc<UdpSocket>,
}

impl Socket {
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let inner = UdpSocket::bind(addr).await?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Receives a single datagram. Exposed alongside `run` so tests can
    /// drive a node's socket one datagram at a time without the full
    /// spawn-per-datagram receive loop.
    pub async fn recv_from(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }

    /// Sends `bytes` to `addr`, logging and swallowing any failure. Peer
    /// addresses come from gossip and can go stale or fail to resolve; a
    /// single bad send must never take down the caller.
    pub async fn send_to(&self, bytes: &[u8], addr: impl ToSocketAddrs) {
        match self.inner.send_to(bytes, addr).await {
            Ok(sent) => trace!(sent, "datagram sent"),
            Err(error) => warn!(%error, "failed to send datagram"),
        }
    }

    /// Receives datagrams until `shutdown` fires, invoking `handle` for
    /// each one on its own spawned task so a slow handler never delays the
    /// next `recv_from`.
    pub async fn run<F, Fut>(self, shutdown: CancellationToken, handle: F)
    where
        F: Fn(Vec<u8>, SocketAddr) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = Arc::new(handle);
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("socket receive loop shutting down");
                    return;
                }
                result = self.inner.recv_from(&mut buf) => {
                    match result {
                        Ok((len, from)) => {
                            let datagram = buf[..len].to_vec();
                            let handle = handle.clone();
                            tokio::spawn(async move { handle(datagram, from).await });
                        }
                        Err(error) => warn!(%error, "failed to receive datagram"),
                    }
                }
            }
        }
    }
}

/// Decodes `datagram` and logs, rather than propagates, any failure:
/// per the wire protocol an unknown command is logged and dropped, while a
/// malformed envelope is dropped silently.
pub fn decode_logged(datagram: &[u8], from: SocketAddr) -> Option<wire::Inbound> {
    match wire::decode(datagram) {
        Ok(inbound) => Some(inbound),
        Err(wire::DecodeError::UnknownCommand(cmd)) => {
            warn!(%from, command = %cmd, "dropping datagram with unknown command");
            None
        }
        Err(wire::DecodeError::Malformed(_)) => {
            trace!(%from, "dropping malformed datagram");
            None
        }
    }
}
