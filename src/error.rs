//! Error types for the `coinfeed-rs` crate.
//!
//! All fallible operations in this crate return [`Result<T>`], which is an
//! alias for `std::result::Result<T, FeedError>`.
//!
//! [`FeedError`] covers:
//! - **Invalid symbols** — empty input rejected at the API boundary
//! - **Retry exhaustion** — the bounded reconnect policy gave up
//! - **Session errors** — writes to a session whose transport has gone away
//! - **JSON errors** — frame encoding and decoding failures
//! - **WebSocket errors** — connection and protocol errors
//! - **URL errors** — malformed endpoint construction

/// All possible errors produced by the `coinfeed-rs` client.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The symbol was empty after trimming.
    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),

    /// The retry counter reached its limit and has not been reset.
    #[error("maximum reconnection attempts ({0}) exceeded")]
    MaxRetriesExceeded(u32),

    /// The transport session is no longer accepting frames.
    #[error("session closed")]
    SessionClosed,

    /// Failed to encode or decode a JSON frame.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A WebSocket-level error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// An error building or parsing a URL.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// The caller provided an invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FeedError>;
