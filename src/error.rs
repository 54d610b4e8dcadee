//! Error types for telebuf

use thiserror::Error;

/// Main error type for the telebuf library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A topic subscriber failed while handling a published event
    #[error("subscriber error: {0}")]
    Subscriber(String),

    /// Delivery/transport error
    #[error("transport error: {0}")]
    Transport(String),
}

/// Result type alias for telebuf
pub type Result<T> = std::result::Result<T, Error>;
