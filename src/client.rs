//! The live trade-feed client.
//!
//! [`FeedClient`] is the only type a UI layer needs. It wraps the
//! [`ConnectionManager`], the subscription registry, and the
//! [`TradeStore`](crate::store::TradeStore) behind a small synchronous API;
//! all network work happens on a background Tokio task.
//!
//! # Example
//!
//! ```no_run
//! use coinfeed_rs::client::FeedClientBuilder;
//!
//! # #[tokio::main]
//! # async fn main() -> coinfeed_rs::Result<()> {
//! let client = FeedClientBuilder::new("your-api-token").build()?;
//!
//! // Subscriptions made before connecting are replayed once the session opens
//! client.subscribe("btc")?;
//! client.subscribe("BINANCE:ETHUSDT")?;
//! client.connect()?;
//!
//! let mut state = client.state_changes();
//! while state.changed().await.is_ok() {
//!     println!("state: {}", *state.borrow());
//!     for (symbol, trade) in client.trades() {
//!         println!("{symbol}: {} @ {}", trade.price, trade.observed_at);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};

use crate::error::Result;
use crate::store::TradeSnapshot;
use crate::types::{ConnectionState, FeedNotice, Symbol, TradeRecord};
use crate::ws::manager::{ConnectionManager, FeedConfig};
use crate::ws::transport::{Transport, WsTransport};

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`FeedClient`] with custom configuration.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use coinfeed_rs::client::FeedClientBuilder;
///
/// # #[tokio::main]
/// # async fn main() -> coinfeed_rs::Result<()> {
/// let client = FeedClientBuilder::new("api-token")
///     .connect_timeout(Duration::from_secs(5))
///     .reconnect_delay(Duration::from_secs(1))
///     .max_retries(3)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct FeedClientBuilder {
    config: FeedConfig,
}

impl FeedClientBuilder {
    /// Create a builder for the default endpoint with the given API token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            config: FeedConfig {
                token: Some(token.into()),
                ..FeedConfig::default()
            },
        }
    }

    /// Point at a different endpoint. Default: `wss://ws.finnhub.io`.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    /// Set the per-attempt connection deadline. Default: 10 s.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the fixed delay between reconnect attempts. Default: 2 s.
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    /// Set how many consecutive closes are tolerated. Default: 5.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    /// Set the notification channel capacity. Default: 256.
    pub fn notice_channel_capacity(mut self, cap: usize) -> Self {
        self.config.notice_channel_capacity = cap;
        self
    }

    /// Build a client over the WebSocket transport.
    pub fn build(self) -> Result<FeedClient> {
        FeedClient::new(self.config)
    }

    /// Build a client over a custom transport.
    pub fn build_with_transport(self, transport: impl Transport) -> Result<FeedClient> {
        FeedClient::with_transport(self.config, transport)
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Everything a UI renders, read at one moment.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    /// Connection state.
    pub state: ConnectionState,
    /// Desired symbols, sorted.
    pub subscriptions: Vec<Symbol>,
    /// Latest trade per symbol.
    pub trades: TradeSnapshot,
    /// Most recent error notice, if not cleared.
    pub last_error: Option<FeedNotice>,
}

// ---------------------------------------------------------------------------
// FeedClient
// ---------------------------------------------------------------------------

/// Live trade-feed client.
///
/// Construction spawns the connection driver and fails with
/// [`FeedError::InvalidArgument`](crate::FeedError::InvalidArgument) outside a
/// Tokio runtime. Every method is non-blocking and callable from any thread.
pub struct FeedClient {
    manager: ConnectionManager,
}

impl FeedClient {
    /// Create a client over the WebSocket transport.
    pub fn new(config: FeedConfig) -> Result<Self> {
        Self::with_transport(config, WsTransport)
    }

    /// Create a client over a custom transport.
    pub fn with_transport(config: FeedConfig, transport: impl Transport) -> Result<Self> {
        let manager = ConnectionManager::spawn(&config, Arc::new(transport))?;
        Ok(Self { manager })
    }

    /// Shorthand for [`FeedClientBuilder::new`].
    pub fn builder(token: impl Into<String>) -> FeedClientBuilder {
        FeedClientBuilder::new(token)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start connecting. See [`ConnectionManager::connect`].
    pub fn connect(&self) -> Result<()> {
        self.manager.connect()
    }

    /// Close the connection and stop automatic retries. Idempotent.
    pub fn close(&self) {
        self.manager.close();
    }

    /// Clear retry exhaustion so [`connect`](Self::connect) is allowed again.
    pub fn reset_retries(&self) {
        self.manager.reset_retries();
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Subscribe to a symbol and return its normalized form.
    ///
    /// When connected the subscribe frame is sent immediately; otherwise it
    /// is sent when the next session opens.
    pub fn subscribe(&self, symbol: &str) -> Result<Symbol> {
        let shared = self.manager.shared();
        let mut ctl = shared.control.lock();
        let connected = ctl.state == ConnectionState::Connected;
        let change = ctl.registry.add(symbol, connected)?;
        if let Some(frame) = change.frame {
            self.manager.send(&ctl, frame);
        }
        Ok(change.symbol)
    }

    /// Unsubscribe from a symbol and drop its cached trade.
    pub fn unsubscribe(&self, symbol: &str) -> Result<Symbol> {
        let shared = self.manager.shared();
        let mut ctl = shared.control.lock();
        let connected = ctl.state == ConnectionState::Connected;
        let change = ctl.registry.remove(symbol, connected)?;
        if let Some(frame) = change.frame {
            self.manager.send(&ctl, frame);
        }
        Ok(change.symbol)
    }

    /// Desired symbols, sorted.
    pub fn subscriptions(&self) -> Vec<Symbol> {
        self.manager.shared().control.lock().registry.desired()
    }

    // -----------------------------------------------------------------------
    // Read model
    // -----------------------------------------------------------------------

    /// Current connection state.
    pub fn current_state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Consecutive closes since the last successful open.
    pub fn retry_count(&self) -> u32 {
        self.manager.retry_count()
    }

    /// Copy of the latest trade per symbol.
    pub fn trades(&self) -> TradeSnapshot {
        self.manager.shared().store.snapshot()
    }

    /// Latest trade for one symbol. Accepts raw input such as `"eth"`.
    pub fn trade(&self, symbol: &str) -> Option<Arc<TradeRecord>> {
        let symbol = Symbol::normalize(symbol).ok()?;
        self.manager.shared().store.get(symbol.as_str())
    }

    /// Receiver for connection/diagnostic notifications.
    pub fn notices(&self) -> broadcast::Receiver<FeedNotice> {
        self.manager.shared().subscribe_notices()
    }

    /// Receiver that is notified on every connection state change.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.manager.shared().watch_state()
    }

    /// Most recent error notice.
    pub fn last_error(&self) -> Option<FeedNotice> {
        self.manager.shared().last_error()
    }

    /// Forget the last error.
    pub fn clear_error(&self) {
        self.manager.shared().clear_error();
    }

    /// State, subscriptions, trades, and last error in one read.
    pub fn snapshot(&self) -> FeedSnapshot {
        let shared = self.manager.shared();
        let (state, subscriptions) = {
            let ctl = shared.control.lock();
            (ctl.state, ctl.registry.desired())
        };
        FeedSnapshot {
            state,
            subscriptions,
            trades: shared.store.snapshot(),
            last_error: shared.last_error(),
        }
    }
}
