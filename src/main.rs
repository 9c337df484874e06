//! src/main.rs
//!
//! Binary entry point. Responsible for initializing tracing, loading
//! configuration, instantiating the main `App`, and running it. Accepts a
//! single optional positional argument: a UDP port to bind to, overriding
//! whatever `config.toml`/environment chose.

use anyhow::Context;
use gossip_node::{App, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli_port = std::env::args()
        .nth(1)
        .map(|arg| arg.parse::<u16>())
        .transpose()
        .context("port argument must be a valid u16")?;

    let config = Config::load(cli_port).context("failed to load configuration")?;

    if let Err(e) = App::new(config)?.run().await {
        tracing::error!(error = %e, "node failed");
        std::process::exit(1);
    }

    Ok(())
}
