//! Error types for module-gate.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by module-gate.
///
/// None of these reach the end user directly: the presence cache degrades
/// lookup and persistence failures to "no record known", and the gate only
/// fails on malformed prices.
#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded or saved.
    #[error("configuration error: {0}")]
    Config(String),

    /// The record-lookup backend failed or answered garbage.
    #[error("record lookup failed: {0}")]
    Lookup(String),

    /// The snapshot store is unavailable.
    #[error("snapshot storage error: {0}")]
    Storage(String),

    /// A snapshot could not be encoded or decoded.
    #[error("snapshot encoding error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// A module price was negative, non-finite or unparseable.
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    /// No tokio runtime was available to run lookups on.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// The operation needs an authenticated user.
    #[error("no authenticated user")]
    NotAuthenticated,
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Lookup(e.to_string())
    }
}
