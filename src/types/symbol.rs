//! Normalized trading-pair identifiers.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_EXCHANGE, DEFAULT_QUOTE, EXCHANGE_DELIMITER};
use crate::error::{FeedError, Result};

/// A trading pair in canonical `EXCHANGE:BASEQUOTE` form, e.g. `BINANCE:BTCUSDT`.
///
/// Two symbols are the same subscription exactly when their strings are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Normalize user input into a canonical symbol.
    ///
    /// Input is trimmed and upper-cased. Input without an exchange delimiter
    /// is treated as a base asset and rewritten to `BINANCE:<BASE>USDT`.
    ///
    /// ```
    /// use coinfeed_rs::types::Symbol;
    ///
    /// assert_eq!(Symbol::normalize(" btc ").unwrap().as_str(), "BINANCE:BTCUSDT");
    /// assert_eq!(Symbol::normalize("kraken:ethusd").unwrap().as_str(), "KRAKEN:ETHUSD");
    /// assert!(Symbol::normalize("   ").is_err());
    /// ```
    pub fn normalize(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(FeedError::InvalidSymbol(input.to_owned()));
        }
        let upper = trimmed.to_uppercase();
        if upper.contains(EXCHANGE_DELIMITER) {
            Ok(Self(upper))
        } else {
            Ok(Self(format!(
                "{DEFAULT_EXCHANGE}{EXCHANGE_DELIMITER}{upper}{DEFAULT_QUOTE}"
            )))
        }
    }

    /// Wrap a symbol exactly as the feed reports it (trimmed, otherwise verbatim).
    pub(crate) fn from_feed(raw: &str) -> Self {
        Self(raw.trim().to_owned())
    }

    /// The canonical string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the symbol and return the canonical string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_asset_is_expanded_to_default_pair() {
        for input in ["btc", "BTC", " btc ", "\tBtC\n"] {
            assert_eq!(Symbol::normalize(input).unwrap().as_str(), "BINANCE:BTCUSDT");
        }
    }

    #[test]
    fn qualified_symbol_is_only_upper_cased() {
        let s = Symbol::normalize(" coinbase:btc-usd ").unwrap();
        assert_eq!(s.as_str(), "COINBASE:BTC-USD");
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            Symbol::normalize(""),
            Err(FeedError::InvalidSymbol(_))
        ));
        assert!(matches!(
            Symbol::normalize("  \t "),
            Err(FeedError::InvalidSymbol(_))
        ));
    }

    #[test]
    fn feed_symbols_are_not_rewritten() {
        assert_eq!(Symbol::from_feed(" AAPL ").as_str(), "AAPL");
        assert_eq!(
            Symbol::from_feed("BINANCE:ETHUSDT").as_str(),
            "BINANCE:ETHUSDT"
        );
    }

    #[test]
    fn serializes_as_plain_string() {
        let s = Symbol::normalize("sol").unwrap();
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"BINANCE:SOLUSDT\"");
    }
}
