//! src/app.rs
//!
//! Defines the main `App` struct, which encapsulates the application's state
//! and manages the lifecycle of all its concurrent services.

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Result;
use crate::node::Node;
use crate::transport::Socket;
use crate::{bootstrap, console, dispatch, gossip, pruner};

/// The addresses a running node actually bound to, useful to tests that ask
/// for an ephemeral port and need to learn what the OS picked.
#[derive(Debug, Clone, Copy)]
pub struct BoundAddrs {
    pub gossip: std::net::SocketAddr,
    pub console: std::net::SocketAddr,
}

/// Encapsulates the entire application, including its configuration and the
/// lifecycle management of its concurrent services.
pub struct App {
    config: Config,
    shutdown_token: CancellationToken,
    ready_tx: Option<oneshot::Sender<BoundAddrs>>,
}

impl App {
    /// Creates a new `App` from the given configuration.
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            config,
            shutdown_token: CancellationToken::new(),
            ready_tx: None,
        })
    }

    /// Registers a channel that receives the node's actual bound addresses
    /// once sockets are up, before the background services start. Tests
    /// use this to learn an OS-assigned ephemeral port.
    pub fn on_ready(mut self, tx: oneshot::Sender<BoundAddrs>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    pub fn shutdown_handle(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// The main run loop for the application.
    ///
    /// This function performs the following steps:
    ///   1. Binds the UDP gossip socket and the TCP console listener.
    ///   2. Builds the shared `Node` state.
    ///   3. Spawns the gossiper, pruner, bootstrap, and console tasks.
    ///   4. Runs the UDP receive loop, dispatching each datagram to its own
    ///      task, until a shutdown signal (Ctrl+C or an external cancel)
    ///      arrives.
    pub async fn run(self) -> Result<()> {
        let bind_addr: std::net::SocketAddr =
            format!("{}:{}", self.config.bind_host, self.config.bind_port).parse().map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid bind address")
            })?;
        let socket = Socket::bind(bind_addr).await?;
        let gossip_addr = socket.local_addr()?;

        let console_addr: std::net::SocketAddr =
            format!("{}:{}", self.config.console_host, self.config.console_port)
                .parse()
                .map_err(|_| {
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid console address")
                })?;
        let console_listener = TcpListener::bind(console_addr).await?;
        let console_bound = console_listener.local_addr()?;

        let advertise_port = self.config.advertise_port.unwrap_or(gossip_addr.port());

        tracing::info!(
            name = %self.config.name,
            gossip_addr = %gossip_addr,
            console_addr = %console_bound,
            advertise_port,
            "starting node"
        );

        let node = Node::new(&self.config, socket.clone(), advertise_port);

        if let Some(ready_tx) = self.ready_tx {
            let _ = ready_tx.send(BoundAddrs {
                gossip: gossip_addr,
                console: console_bound,
            });
        }

        let (bootstrap_tx, bootstrap_rx) = bootstrap::channel();

        let mut tasks = Vec::new();
        tasks.push(tokio::spawn(gossip::run(node.clone(), self.shutdown_token.clone())));
        tasks.push(tokio::spawn(pruner::run(node.clone(), self.shutdown_token.clone())));
        tasks.push(tokio::spawn(bootstrap::run(node.clone(), bootstrap_rx)));
        tasks.push(tokio::spawn(console::run(
            node.clone(),
            console_listener,
            self.shutdown_token.clone(),
        )));

        let dispatch_node = node.clone();
        let dispatch_shutdown = self.shutdown_token.clone();
        let receive_task = tokio::spawn(socket.run(dispatch_shutdown, move |datagram, from| {
            let node = dispatch_node.clone();
            let bootstrap_tx = bootstrap_tx.clone();
            async move { dispatch::handle(node, bootstrap_tx, datagram, from).await }
        }));

        let shutdown_token = self.shutdown_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("ctrl-c received, shutting down");
                shutdown_token.cancel();
            }
        });

        self.shutdown_token.cancelled().await;

        let _ = receive_task.await;
        for task in tasks {
            let _ = task.await;
        }

        tracing::info!("node has shut down");
        Ok(())
    }
}
