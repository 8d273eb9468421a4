//! Trade records and observer notifications.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::NoticeKind;
use super::symbol::Symbol;

/// The latest trade seen for a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Symbol the trade belongs to.
    pub symbol: Symbol,
    /// Last traded price (never negative).
    pub price: Decimal,
    /// Traded volume (never negative, `0` when the feed omits it).
    pub volume: Decimal,
    /// Trade time in unix milliseconds.
    pub observed_at: i64,
}

impl TradeRecord {
    /// The trade time as a UTC timestamp, if it is in chrono's range.
    pub fn observed_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.observed_at)
    }
}

/// A notification delivered to UI observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedNotice {
    /// Category of the notification.
    pub kind: NoticeKind,
    /// Human-readable description.
    pub message: String,
}

impl FeedNotice {
    /// Create a notice.
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
