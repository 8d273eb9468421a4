//! Latest-trade-per-symbol cache.
//!
//! Entries are held behind [`Arc`] so a [`snapshot`](TradeStore::snapshot)
//! copies only pointers while holding the read lock. Writes overwrite
//! unconditionally: the most recently *received* trade wins, even when its
//! timestamp is older than the one it replaces.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::{Symbol, TradeRecord};

/// Immutable copy of the store at one point in time.
pub type TradeSnapshot = HashMap<Symbol, Arc<TradeRecord>>;

/// Thread-safe map of symbol to its latest [`TradeRecord`].
#[derive(Debug, Default)]
pub struct TradeStore {
    trades: RwLock<HashMap<Symbol, Arc<TradeRecord>>>,
}

impl TradeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `record`, replacing any previous record for its symbol.
    pub fn put(&self, record: TradeRecord) {
        let symbol = record.symbol.clone();
        self.trades.write().insert(symbol, Arc::new(record));
    }

    /// The current record for `symbol`, if any.
    pub fn get(&self, symbol: &str) -> Option<Arc<TradeRecord>> {
        self.trades.read().get(symbol).cloned()
    }

    /// Remove the record for `symbol`. Returns whether one was present.
    pub fn evict(&self, symbol: &str) -> bool {
        self.trades.write().remove(symbol).is_some()
    }

    /// Copy of the full mapping.
    pub fn snapshot(&self) -> TradeSnapshot {
        self.trades.read().clone()
    }

    /// Number of symbols with a record.
    pub fn len(&self) -> usize {
        self.trades.read().len()
    }

    /// Whether the store has no records.
    pub fn is_empty(&self) -> bool {
        self.trades.read().is_empty()
    }
}
