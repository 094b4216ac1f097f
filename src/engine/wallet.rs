use std::collections::BTreeMap;

use crate::errors::{Error, Result};

/// Residue below which a debit empties the ticker.
pub const BALANCE_EPSILON: f64 = 0.0001;

/// Represents the coins held by the simulated account, per ticker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Balance {
    coins: BTreeMap<String, f64>,
}

impl<S: Into<String>> FromIterator<(S, f64)> for Balance {
    fn from_iter<T: IntoIterator<Item = (S, f64)>>(iter: T) -> Self {
        Self {
            coins: iter.into_iter().map(|(ticker, count)| (ticker.into(), count)).collect(),
        }
    }
}

impl Balance {
    /// Creates an empty balance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the quantity held for `ticker`, 0 when unknown.
    pub fn get(&self, ticker: &str) -> f64 {
        self.coins.get(ticker).copied().unwrap_or_default()
    }

    /// Iterates over every ticker and its quantity.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.coins.iter().map(|(ticker, count)| (ticker.as_str(), *count))
    }

    /// Removes `count` coins of `ticker`.
    ///
    /// When the remaining quantity would be within [`BALANCE_EPSILON`] of zero the ticker is
    /// emptied, absorbing floating point residue.
    ///
    /// ### Returns
    /// The quantity actually removed.
    pub fn take(&mut self, ticker: &str, count: f64) -> Result<f64> {
        if count < 0.0 {
            return Err(Error::NegativeAmount(count));
        }

        let available = self.get(ticker);
        if available == 0.0 {
            return Err(Error::InsufficientFunds(ticker.to_string(), count, 0.0));
        }

        if (available - count).abs() < BALANCE_EPSILON {
            self.coins.insert(ticker.to_string(), 0.0);
            return Ok(available);
        }

        if available < count {
            return Err(Error::InsufficientFunds(ticker.to_string(), count, available));
        }

        self.coins.insert(ticker.to_string(), available - count);
        Ok(count)
    }

    /// Adds `count` coins of `ticker`.
    pub fn put(&mut self, ticker: &str, count: f64) -> Result<()> {
        if count < 0.0 {
            return Err(Error::NegativeAmount(count));
        }

        *self.coins.entry(ticker.to_string()).or_default() += count;
        Ok(())
    }
}

#[cfg(test)]
#[test]
fn put_and_get() {
    let mut balance = Balance::new();
    balance.put("USDT", 100.0).unwrap();
    balance.put("USDT", 50.0).unwrap();

    assert_eq!(balance.get("USDT"), 150.0);
    assert_eq!(balance.get("BTC"), 0.0);
}

#[cfg(test)]
#[test]
fn put_negative_amount() {
    let mut balance = Balance::new();
    assert!(matches!(balance.put("USDT", -1.0), Err(Error::NegativeAmount(_))));
}

#[cfg(test)]
#[test]
fn take_available_funds() {
    let mut balance = Balance::from_iter([("USDT", 100.0)]);
    assert_eq!(balance.take("USDT", 40.0).unwrap(), 40.0);
    assert_eq!(balance.get("USDT"), 60.0);
}

#[cfg(test)]
#[test]
fn take_absorbs_residue() {
    let mut balance = Balance::from_iter([("BTC", 1.00005)]);
    assert_eq!(balance.take("BTC", 1.0).unwrap(), 1.00005);
    assert_eq!(balance.get("BTC"), 0.0);

    let mut balance = Balance::from_iter([("BTC", 0.99995)]);
    assert_eq!(balance.take("BTC", 1.0).unwrap(), 0.99995);
    assert_eq!(balance.get("BTC"), 0.0);
}

#[cfg(test)]
#[test]
fn take_insufficient_funds() {
    let mut balance = Balance::from_iter([("USDT", 10.0)]);
    assert!(matches!(
        balance.take("USDT", 20.0),
        Err(Error::InsufficientFunds(ticker, requested, available))
            if ticker == "USDT" && requested == 20.0 && available == 10.0
    ));
    assert!(matches!(balance.take("BTC", 1.0), Err(Error::InsufficientFunds(..))));
    assert!(matches!(balance.take("USDT", -1.0), Err(Error::NegativeAmount(_))));
    assert_eq!(balance.get("USDT"), 10.0);
}
