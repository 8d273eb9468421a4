//! Domain types shared across the feed client.
//!
//! ## Organization
//!
//! - [`enums`] — Connection states and notification kinds
//! - [`symbol`] — Normalized trading-pair identifiers
//! - [`trade`] — Trade records and observer notifications
//!
//! Everything is re-exported at the module root.

pub mod enums;
pub mod symbol;
pub mod trade;

pub use enums::*;
pub use symbol::Symbol;
pub use trade::{FeedNotice, TradeRecord};
