//! # coinfeed-rs
//!
//! A live crypto trade-feed client: one resilient WebSocket session to a
//! [Finnhub](https://finnhub.io/docs/api/websocket-trades)-style trade feed,
//! symbol subscriptions that survive reconnects, and a latest-trade cache a
//! UI can read at any time.
//!
//! ## Quick Start
//!
//! ```no_run
//! use coinfeed_rs::FeedClient;
//!
//! #[tokio::main]
//! async fn main() -> coinfeed_rs::Result<()> {
//!     let client = FeedClient::builder("your-api-token").build()?;
//!     client.subscribe("btc")?; // → BINANCE:BTCUSDT
//!     client.connect()?;
//!     // Read client.trades(), client.current_state(), client.notices() ...
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod constants;
pub mod error;
pub mod store;
pub mod subscription;
pub mod types;
pub mod ws;

/// Re-export the main client type at crate root for convenience.
pub use client::FeedClient;
/// Re-export the error type and Result alias.
pub use error::{FeedError, Result};
