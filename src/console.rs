//! src/console.rs
//!
//! A plain-text TCP operator console. Each connection gets its own line
//! loop: commands are a verb plus optional arguments separated by spaces,
//! one per line, with a free-text reply written back before the next
//! command is read, and a `>>> ` prompt before the first read and after
//! every reply. `exit` closes the one connection that sent it; other
//! connections and the node itself are unaffected.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::consensus;
use crate::node::Node;

const PROMPT: &str = ">>> ";

type Writer = Arc<AsyncMutex<OwnedWriteHalf>>;

pub async fn run(node: Arc<Node>, listener: TcpListener, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        debug!(%addr, "console client connected");
                        let node = node.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move { handle_connection(node, stream, shutdown).await });
                    }
                    Err(error) => warn!(%error, "failed to accept console connection"),
                }
            }
        }
    }
}

async fn write_line(writer: &Writer, bytes: &[u8]) -> std::io::Result<()> {
    writer.lock().await.write_all(bytes).await
}

async fn handle_connection(node: Arc<Node>, stream: TcpStream, shutdown: CancellationToken) {
    let (read_half, write_half) = stream.into_split();
    let writer: Writer = Arc::new(AsyncMutex::new(write_half));
    let mut lines = BufReader::new(read_half).lines();

    if write_line(&writer, PROMPT.as_bytes()).await.is_err() {
        return;
    }

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => return,
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(error) => {
                warn!(%error, "console read failed");
                return;
            }
        };

        let mut parts = line.trim().split_whitespace();
        let command = parts.next().unwrap_or("");
        let args: Vec<&str> = parts.collect();

        let reply = match dispatch(&node, &writer, command, &args).await {
            Dispatch::Reply(text) => text,
            Dispatch::Close(text) => {
                let _ = write_line(&writer, text.as_bytes()).await;
                return;
            }
        };

        if write_line(&writer, reply.as_bytes()).await.is_err() {
            return;
        }
        if write_line(&writer, PROMPT.as_bytes()).await.is_err() {
            return;
        }
    }
}

enum Dispatch {
    Reply(String),
    Close(String),
}

async fn dispatch(node: &Arc<Node>, writer: &Writer, command: &str, args: &[&str]) -> Dispatch {
    match command {
        "" => Dispatch::Reply(String::new()),
        "peers" => Dispatch::Reply(format!("{}\n", node.peers.format())),
        "current" => Dispatch::Reply(format!("{:?}\n", node.database.snapshot())),
        "lie" => {
            node.database.lie();
            Dispatch::Reply("I'd never lie to you, of course :)\n".to_string())
        }
        "truth" => {
            node.database.truth();
            Dispatch::Reply("You got it, boss.\n".to_string())
        }
        "set" => match (args.first(), args.get(1)) {
            (Some(index), Some(word)) => match index.parse::<usize>() {
                Ok(index) if index < node.database.size() => {
                    cli_set(node, index, word.to_string()).await;
                    Dispatch::Reply("Done!\n".to_string())
                }
                _ => Dispatch::Reply(format!("Bad index: {index}\n")),
            },
            _ => Dispatch::Reply("usage: set <index> <word>\n".to_string()),
        },
        "consensus" => match args.first().and_then(|i| i.parse::<usize>().ok()) {
            Some(index) if index < node.database.size() => {
                let node = node.clone();
                let writer = writer.clone();
                tokio::spawn(async move {
                    let word = consensus::start_consensus(
                        &node.socket,
                        &node.consensus,
                        &node.peers,
                        &node.database,
                        node.consensus_time,
                        index,
                    )
                    .await;
                    debug!(index, ?word, "consensus finished");
                    let message = format!(
                        "\nConsensus done!\nWord at index {index} is {}\n{PROMPT}",
                        word.as_deref().unwrap_or("None")
                    );
                    let _ = write_line(&writer, message.as_bytes()).await;
                });
                Dispatch::Reply(format!(
                    "Running consensus on index {}. Give it a minute..\n",
                    args[0]
                ))
            }
            _ => Dispatch::Reply("usage: consensus <index>\n".to_string()),
        },
        "exit" => {
            info!("console client disconnected");
            Dispatch::Close("Later, loser!\n".to_string())
        }
        other => Dispatch::Reply(format!("I don't seem to implement that command: {other}\n")),
    }
}

/// Sets the word locally and broadcasts a SET to every known peer so they
/// converge without waiting for a consensus round. This is a plain
/// announcement, not a sub-protocol of its own: peers apply it unconditionally.
async fn cli_set(node: &Node, index: usize, word: String) {
    node.database.set(index, Some(word.clone()));
    let bytes = crate::wire::encode_set(&crate::wire::SetPayload {
        index,
        word: Some(word),
    });
    for peer in node.peers.list() {
        node.socket
            .send_to(&bytes, (peer.host.as_str(), peer.port))
            .await;
    }
}
