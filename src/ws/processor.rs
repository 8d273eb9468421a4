//! Inbound frame dispatch.
//!
//! [`MessageProcessor`] decodes one payload at a time, writes valid trades
//! into the [`TradeStore`], and tells the caller what (if anything) must be
//! written back on the session. It never touches the session itself.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::Result;
use crate::store::TradeStore;
use crate::types::{Symbol, TradeRecord};
use crate::ws::protocol::{InboundMessage, OutboundFrame, RawTrade};

/// What a processed payload amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// A trade frame. `applied` entries reached the store; `dropped` did not.
    Trades { applied: usize, dropped: usize },
    /// The payload requires a reply on the same session.
    Reply(OutboundFrame),
    /// A well-formed frame of a type the client does not handle.
    Unrecognized,
}

/// Decodes inbound payloads and applies trades to the store.
#[derive(Debug, Clone)]
pub struct MessageProcessor {
    store: Arc<TradeStore>,
}

impl MessageProcessor {
    /// Create a processor writing into `store`.
    pub fn new(store: Arc<TradeStore>) -> Self {
        Self { store }
    }

    /// Process one text payload.
    ///
    /// `is_desired` filters trade entries: prints for symbols that are no
    /// longer subscribed are dropped so the store stays bounded by the
    /// desired set. A structurally invalid payload returns an error and
    /// changes nothing.
    pub fn process<F>(&self, payload: &str, is_desired: F) -> Result<Dispatch>
    where
        F: Fn(&Symbol) -> bool,
    {
        match InboundMessage::parse(payload)? {
            InboundMessage::Trade { data } => {
                let mut applied = 0;
                let mut dropped = 0;
                for entry in data {
                    match self.to_record(entry) {
                        Some(record) if is_desired(&record.symbol) => {
                            self.store.put(record);
                            applied += 1;
                        }
                        Some(record) => {
                            tracing::debug!(symbol = %record.symbol, "Trade for unsubscribed symbol");
                            dropped += 1;
                        }
                        None => dropped += 1,
                    }
                }
                Ok(Dispatch::Trades { applied, dropped })
            }
            InboundMessage::Ping => Ok(Dispatch::Reply(OutboundFrame::Pong)),
            InboundMessage::Unrecognized => Ok(Dispatch::Unrecognized),
        }
    }

    /// Validate one entry. Missing symbol or price drops it; missing volume
    /// defaults to zero and missing time to now.
    fn to_record(&self, entry: serde_json::Value) -> Option<TradeRecord> {
        let raw: RawTrade = match serde_json::from_value(entry) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed trade entry");
                return None;
            }
        };

        let symbol = raw.s.as_deref().map(Symbol::from_feed);
        let Some(symbol) = symbol.filter(|s| !s.as_str().is_empty()) else {
            tracing::warn!("Dropping trade entry without symbol");
            return None;
        };
        let Some(price) = raw.p.as_ref().and_then(|p| p.to_decimal()) else {
            tracing::warn!(symbol = %symbol, "Dropping trade entry without a usable price");
            return None;
        };
        let volume = match raw.v.as_ref() {
            None => Decimal::ZERO,
            Some(v) => match v.to_decimal() {
                Some(v) => v,
                None => {
                    tracing::warn!(symbol = %symbol, "Dropping trade entry with unparseable volume");
                    return None;
                }
            },
        };
        if price.is_sign_negative() || volume.is_sign_negative() {
            tracing::warn!(symbol = %symbol, %price, %volume, "Dropping trade entry with negative value");
            return None;
        }
        let observed_at = match raw.t.as_ref() {
            None => chrono::Utc::now().timestamp_millis(),
            Some(t) => match t
                .to_decimal()
                .and_then(|secs| secs.checked_mul(Decimal::ONE_THOUSAND))
                .and_then(|ms| ms.trunc().to_i64())
            {
                Some(ms) => ms,
                None => {
                    tracing::warn!(symbol = %symbol, "Dropping trade entry with unparseable time");
                    return None;
                }
            },
        };

        Some(TradeRecord {
            symbol,
            price,
            volume,
            observed_at,
        })
    }
}
