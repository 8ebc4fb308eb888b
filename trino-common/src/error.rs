//! Errors produced by the shared layer

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Faults the shared layer can raise: database access, filesystem I/O,
/// and configuration loading. Service crates define their own error types
/// on top of these.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
