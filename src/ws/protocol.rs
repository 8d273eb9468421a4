//! JSON wire frames for the trade feed.
//!
//! Inbound frames are decoded into the tagged [`InboundMessage`]; anything
//! that is valid JSON with an unknown `type` lands in
//! [`InboundMessage::Unrecognized`] instead of failing the decode.
//!
//! ```text
//! ← {"type":"trade","data":[{"s":"BINANCE:BTCUSDT","p":7296.89,"v":0.011,"t":1575526691}]}
//! ← {"type":"ping"}
//! → {"type":"subscribe","symbol":"BINANCE:BTCUSDT"}
//! → {"type":"unsubscribe","symbol":"BINANCE:BTCUSDT"}
//! → {"type":"pong"}
//! ```

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::Symbol;

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// A frame the client writes to the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundFrame {
    /// Start streaming trades for a symbol.
    Subscribe { symbol: Symbol },
    /// Stop streaming trades for a symbol.
    Unsubscribe { symbol: Symbol },
    /// Keepalive reply to a server `ping`.
    Pong,
}

impl OutboundFrame {
    /// Encode as the JSON text sent on the wire.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A decoded inbound frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundMessage {
    /// One or more trade prints. Entries are validated one by one.
    Trade {
        data: Vec<serde_json::Value>,
    },
    /// Server keepalive probe.
    Ping,
    /// Any other message type.
    #[serde(other)]
    Unrecognized,
}

impl InboundMessage {
    /// Decode a text payload.
    pub fn parse(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// A single trade entry as the feed sends it. Every field may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawTrade {
    #[serde(default)]
    pub s: Option<String>,
    #[serde(default)]
    pub p: Option<Numeric>,
    #[serde(default)]
    pub v: Option<Numeric>,
    #[serde(default)]
    pub t: Option<Numeric>,
}

/// A number the feed may encode either as a JSON number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Numeric {
    Number(serde_json::Number),
    Text(String),
}

impl Numeric {
    pub fn to_decimal(&self) -> Option<Decimal> {
        let text = match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_owned(),
        };
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .ok()
    }
}
