//! Shared enum types for connection status and observer notifications.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Connection State
// ---------------------------------------------------------------------------

/// Lifecycle state of the single feed connection.
///
/// ```text
/// Disconnected → Connecting → Connected → Disconnected → Reconnecting
///                    ↑                                        │
///                    └────────────────────────────────────────┘
///                                        … → Failed (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No session and no attempt in flight.
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// The session is open and subscriptions have been replayed.
    Connected,
    /// Waiting out the fixed delay before the next automatic attempt.
    Reconnecting,
    /// Retries exhausted. Requires an explicit reset before `connect()`.
    Failed,
}

impl ConnectionState {
    /// Whether `connect()` is a no-op in this state.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connected | Self::Connecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Notice Kind
// ---------------------------------------------------------------------------

/// Category of a [`FeedNotice`](crate::types::FeedNotice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoticeKind {
    /// A session opened and subscriptions were replayed.
    Connected,
    /// The session closed; the message says whether a retry is scheduled.
    Disconnected,
    /// Retries are exhausted. The client is in [`ConnectionState::Failed`].
    ConnectionFailed,
    /// A transport error that did not close the session (including failed sends).
    TransportError,
    /// An inbound payload did not decode.
    ParseError,
    /// A well-formed payload of a type the client does not handle.
    Unrecognized,
}

impl NoticeKind {
    /// Fatal notices end automatic recovery.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::ConnectionFailed)
    }

    /// Whether this notice should be recorded as the client's last error.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed | Self::TransportError | Self::ParseError
        )
    }
}
