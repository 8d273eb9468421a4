//! Constants for the live trade feed.
//!
//! Contains the feed endpoint, symbol normalization defaults, and the
//! connection policy values. These are used internally by
//! [`FeedConfig`](crate::ws::manager::FeedConfig) and the symbol type, but are also
//! exported for advanced usage.

use std::time::Duration;

// ---------------------------------------------------------------------------
// WebSocket URLs
// ---------------------------------------------------------------------------

/// WebSocket endpoint for the live trade feed (JSON frames).
///
/// The API token is passed as the `token` query parameter.
pub const WS_TRADE_FEED_URL: &str = "wss://ws.finnhub.io";

/// Name of the query parameter carrying the API token.
pub const TOKEN_QUERY_PARAM: &str = "token";

// ---------------------------------------------------------------------------
// Symbol normalization
// ---------------------------------------------------------------------------

/// Separator between the exchange and the pair in a canonical symbol.
pub const EXCHANGE_DELIMITER: char = ':';

/// Exchange assumed when user input names only a base asset.
pub const DEFAULT_EXCHANGE: &str = "BINANCE";

/// Quote asset appended when user input names only a base asset.
pub const DEFAULT_QUOTE: &str = "USDT";

// ---------------------------------------------------------------------------
// Connection policy
// ---------------------------------------------------------------------------

/// Connection policy defaults.
pub mod policy {
    use super::Duration;

    /// Deadline for a single connection attempt, measured from `connect()`.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Fixed delay between a close and the next automatic attempt.
    pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

    /// Consecutive closes (without an intervening open) before giving up.
    pub const MAX_RETRIES: u32 = 5;

    /// Capacity of the notification broadcast channel.
    pub const NOTICE_CHANNEL_CAPACITY: usize = 256;
}
