//! src/lib.rs
//!
//! Main library crate for the gossip/consensus node.
//! This file declares the module hierarchy and exports the primary public
//! interface for the library, allowing it to be used by other crates or for
//! integration testing.

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod consensus;
pub mod console;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod gossip;
pub mod node;
pub mod pruner;
pub mod sync;
pub mod transport;
pub mod wire;

pub use app::App;
pub use config::Config;
pub use error::Error;
