use std::{fmt, str::FromStr};

use crate::errors::{Error, Result};

/// Quote coin used when only the base coin is given.
pub const DEFAULT_QUOTE: &str = "USDT";

/// Traded pair: base coin priced in quote coin (e.g. `BTC-USDT`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoinPair {
    base: String,
    quote: String,
}

impl CoinPair {
    /// Creates a pair from its two tickers.
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Returns the base coin ticker.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Returns the quote coin ticker.
    pub fn quote(&self) -> &str {
        &self.quote
    }
}

impl FromStr for CoinPair {
    type Err = Error;

    /// Parses `BTC`, `BTC-USDT` or `BTC/USDT`.
    fn from_str(value: &str) -> Result<Self> {
        let coins: Vec<&str> = value.split(['-', '/']).map(str::trim).collect();

        match coins.as_slice() {
            [base] if !base.is_empty() => Ok(Self::new(*base, DEFAULT_QUOTE)),
            [base, quote] if !base.is_empty() && !quote.is_empty() => Ok(Self::new(*base, *quote)),
            _ => Err(Error::InvalidCoinPair(value.to_string())),
        }
    }
}

impl fmt::Display for CoinPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.quote)
    }
}
