//! Desired and active subscription tracking.
//!
//! The *desired* set is what the caller asked for and survives reconnects.
//! The *active* set is what has been written on the current session; it is
//! always a subset of desired, is cleared when the session ends, and is
//! rebuilt by [`replay_all`](SubscriptionRegistry::replay_all).
//!
//! The registry never writes to a session. It returns the frames that need
//! sending and leaves delivery to the connection manager.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::store::TradeStore;
use crate::types::Symbol;
use crate::ws::protocol::OutboundFrame;

/// Result of a registry mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// The normalized symbol the call resolved to.
    pub symbol: Symbol,
    /// Frame to write on the current session, if any.
    pub frame: Option<OutboundFrame>,
}

/// Tracks which symbols the caller wants and which are live on the wire.
#[derive(Debug)]
pub struct SubscriptionRegistry {
    desired: HashSet<Symbol>,
    active: HashSet<Symbol>,
    store: Arc<TradeStore>,
}

impl SubscriptionRegistry {
    /// Create an empty registry that evicts from `store` on removal.
    pub fn new(store: Arc<TradeStore>) -> Self {
        Self {
            desired: HashSet::new(),
            active: HashSet::new(),
            store,
        }
    }

    /// Add a symbol to the desired set.
    ///
    /// Idempotent: a symbol that is already desired yields no frame. When
    /// `connected`, a new symbol is marked active and a `subscribe` frame is
    /// returned; otherwise it waits for the next replay.
    pub fn add(&mut self, input: &str, connected: bool) -> Result<Change> {
        let symbol = Symbol::normalize(input)?;
        if !self.desired.insert(symbol.clone()) {
            return Ok(Change {
                symbol,
                frame: None,
            });
        }

        let frame = connected.then(|| {
            self.active.insert(symbol.clone());
            OutboundFrame::Subscribe {
                symbol: symbol.clone(),
            }
        });
        tracing::debug!(symbol = %symbol, connected, "Added subscription");
        Ok(Change { symbol, frame })
    }

    /// Remove a symbol from the desired set and evict its trade.
    ///
    /// Removing an absent symbol changes nothing and yields no frame. The
    /// store entry is evicted regardless of connection state.
    pub fn remove(&mut self, input: &str, connected: bool) -> Result<Change> {
        let symbol = Symbol::normalize(input)?;
        self.store.evict(symbol.as_str());

        if !self.desired.remove(&symbol) {
            return Ok(Change {
                symbol,
                frame: None,
            });
        }
        self.active.remove(&symbol);

        let frame = connected.then(|| OutboundFrame::Unsubscribe {
            symbol: symbol.clone(),
        });
        tracing::debug!(symbol = %symbol, connected, "Removed subscription");
        Ok(Change { symbol, frame })
    }

    /// One `subscribe` frame per desired symbol; afterwards active equals desired.
    ///
    /// Called once per successful connection. Order is unspecified.
    pub fn replay_all(&mut self) -> Vec<OutboundFrame> {
        self.active = self.desired.clone();
        self.desired
            .iter()
            .map(|symbol| OutboundFrame::Subscribe {
                symbol: symbol.clone(),
            })
            .collect()
    }

    /// Forget what was live on the wire. Called when a session ends.
    pub fn clear_active(&mut self) {
        self.active.clear();
    }

    /// Whether `symbol` is in the desired set.
    pub fn is_desired(&self, symbol: &str) -> bool {
        self.desired.contains(symbol)
    }

    /// Whether `symbol` has been subscribed on the current session.
    pub fn is_active(&self, symbol: &str) -> bool {
        self.active.contains(symbol)
    }

    /// Desired symbols, sorted.
    pub fn desired(&self) -> Vec<Symbol> {
        let mut out: Vec<_> = self.desired.iter().cloned().collect();
        out.sort();
        out
    }

    /// Active symbols, sorted.
    pub fn active(&self) -> Vec<Symbol> {
        let mut out: Vec<_> = self.active.iter().cloned().collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::types::TradeRecord;

    fn registry() -> (SubscriptionRegistry, Arc<TradeStore>) {
        let store = Arc::new(TradeStore::new());
        (SubscriptionRegistry::new(store.clone()), store)
    }

    #[test]
    fn spellings_of_one_symbol_collapse_to_one_entry() {
        let (mut reg, _) = registry();
        reg.add("btc", false).unwrap();
        reg.add("BTC", false).unwrap();
        reg.add(" btc ", false).unwrap();

        assert_eq!(reg.desired(), vec![Symbol::normalize("btc").unwrap()]);
    }

    #[test]
    fn add_is_idempotent_and_only_frames_once() {
        let (mut reg, _) = registry();
        let first = reg.add("eth", true).unwrap();
        let second = reg.add("ETH", true).unwrap();

        assert_eq!(
            first.frame,
            Some(OutboundFrame::Subscribe {
                symbol: first.symbol.clone()
            })
        );
        assert_eq!(second.frame, None);
        assert_eq!(reg.desired().len(), 1);
        assert!(reg.is_active("BINANCE:ETHUSDT"));
    }

    #[test]
    fn add_while_disconnected_defers_the_frame() {
        let (mut reg, _) = registry();
        let change = reg.add("eth", false).unwrap();

        assert_eq!(change.frame, None);
        assert!(reg.is_desired("BINANCE:ETHUSDT"));
        assert!(!reg.is_active("BINANCE:ETHUSDT"));
    }

    #[test]
    fn remove_absent_is_a_no_op() {
        let (mut reg, _) = registry();
        reg.add("btc", true).unwrap();
        let change = reg.remove("doge", true).unwrap();

        assert_eq!(change.frame, None);
        assert_eq!(reg.desired().len(), 1);
    }

    #[test]
    fn remove_evicts_trade_in_any_state() {
        for connected in [true, false] {
            let (mut reg, store) = registry();
            reg.add("eth", connected).unwrap();
            store.put(TradeRecord {
                symbol: Symbol::normalize("eth").unwrap(),
                price: dec!(2500),
                volume: dec!(1),
                observed_at: 1,
            });

            let change = reg.remove(" Eth ", connected).unwrap();
            assert_eq!(change.frame.is_some(), connected);
            assert!(store.get("BINANCE:ETHUSDT").is_none());
            assert!(!reg.is_desired("BINANCE:ETHUSDT"));
            assert!(!reg.is_active("BINANCE:ETHUSDT"));
        }
    }

    #[test]
    fn replay_covers_exactly_the_desired_set() {
        let (mut reg, _) = registry();
        for s in ["btc", "eth", "BTC", "sol", "kraken:xbtusd"] {
            reg.add(s, false).unwrap();
        }

        let mut replayed: Vec<String> = reg
            .replay_all()
            .into_iter()
            .map(|f| match f {
                OutboundFrame::Subscribe { symbol } => symbol.into_string(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        replayed.sort();

        assert_eq!(
            replayed,
            vec![
                "BINANCE:BTCUSDT",
                "BINANCE:ETHUSDT",
                "BINANCE:SOLUSDT",
                "KRAKEN:XBTUSD"
            ]
        );
        assert_eq!(reg.active(), reg.desired());
    }

    #[test]
    fn clear_active_keeps_desired() {
        let (mut reg, _) = registry();
        reg.add("btc", true).unwrap();
        reg.clear_active();

        assert!(reg.active().is_empty());
        assert_eq!(reg.desired().len(), 1);
    }

    #[test]
    fn empty_symbol_is_rejected_without_mutation() {
        let (mut reg, _) = registry();
        assert!(reg.add("  ", true).is_err());
        assert!(reg.remove("", true).is_err());
        assert!(reg.desired().is_empty());
    }
}
