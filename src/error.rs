//! src/error.rs
//!
//! Defines the library's custom, comprehensive `Error` enum using `thiserror`.
//! Only startup failures are represented here: once a node is running,
//! every per-message and per-connection failure is logged and swallowed by
//! its handler rather than propagated, so the node stays up.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tokio task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
