use std::fmt;

use serde::Serialize;

use crate::errors::{Error, Result};

/// Represents the side of an order (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderKind {
    /// Spends quote coins to receive base coins.
    Buy,
    /// Spends base coins to receive quote coins.
    Sell,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "Buy"),
            Self::Sell => write!(f, "Sell"),
        }
    }
}

/// Plain limit order. Fields are fixed once the order exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Order {
    kind: OrderKind,
    price: f64,
    count: f64,
}

impl TryFrom<(OrderKind, f64, f64)> for Order {
    type Error = Error;

    fn try_from((kind, price, count): (OrderKind, f64, f64)) -> Result<Self> {
        Self::new(kind, price, count)
    }
}

impl Order {
    /// Creates a limit order.
    ///
    /// ### Arguments
    /// * `kind` - Buy or sell.
    /// * `price` - Limit price, strictly positive.
    /// * `count` - Number of base coins, strictly positive.
    ///
    /// ### Returns
    /// The order, or [`Error::InvalidOrder`] when the price or the count is not positive.
    pub fn new(kind: OrderKind, price: f64, count: f64) -> Result<Self> {
        // `!(x > 0.0)` also rejects NaN
        if !(price > 0.0) || !(count > 0.0) {
            return Err(Error::InvalidOrder(price, count));
        }

        Ok(Self { kind, price, count })
    }

    /// Shortcut for a buy order.
    pub fn buy(price: f64, count: f64) -> Result<Self> {
        Self::new(OrderKind::Buy, price, count)
    }

    /// Shortcut for a sell order.
    pub fn sell(price: f64, count: f64) -> Result<Self> {
        Self::new(OrderKind::Sell, price, count)
    }

    /// Returns the side of the order.
    pub fn kind(&self) -> OrderKind {
        self.kind
    }

    /// Returns the limit price.
    pub fn price(&self) -> f64 {
        self.price
    }

    /// Returns the number of base coins.
    pub fn count(&self) -> f64 {
        self.count
    }

    /// Returns the value of the order in quote coins (price * count).
    pub fn cost(&self) -> f64 {
        self.price * self.count
    }
}

#[cfg(test)]
#[test]
fn create_buy_order() {
    let order = Order::buy(100.0, 2.0).unwrap();

    assert_eq!(order.kind(), OrderKind::Buy);
    assert_eq!(order.price(), 100.0);
    assert_eq!(order.count(), 2.0);
    assert_eq!(order.cost(), 200.0);
}

#[cfg(test)]
#[test]
fn create_order_from_tuple() {
    let order: Order = (OrderKind::Sell, 50.0, 0.5).try_into().unwrap();
    assert_eq!(order.kind(), OrderKind::Sell);
    assert_eq!(order.cost(), 25.0);
}

#[cfg(test)]
#[test]
fn reject_non_positive_values() {
    assert!(matches!(Order::buy(0.0, 1.0), Err(Error::InvalidOrder(..))));
    assert!(matches!(Order::sell(10.0, -1.0), Err(Error::InvalidOrder(..))));
    assert!(matches!(Order::sell(f64::NAN, 1.0), Err(Error::InvalidOrder(..))));
}
