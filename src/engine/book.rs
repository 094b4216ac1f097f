use std::collections::{VecDeque, vec_deque::Iter};

use crate::{
    engine::{Candle, Order, OrderKind},
    errors::{Error, Result},
};

/// Resting (placed but unfilled) limit orders of a single pair.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    orders: VecDeque<Order>,
}

impl OrderBook {
    /// Creates an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of resting orders.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Returns `true` if no order is resting.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Iterates over the resting orders in placement order.
    pub fn iter(&self) -> Iter<'_, Order> {
        self.orders.iter()
    }

    /// Fails if `order` would cross a resting order of the opposite side.
    ///
    /// A buy must stay strictly below every resting sell, a sell strictly above every
    /// resting buy.
    pub fn check_crossing(&self, order: &Order) -> Result<()> {
        let crossed = self.orders.iter().find(|resting| match (order.kind(), resting.kind()) {
            (OrderKind::Buy, OrderKind::Sell) => resting.price() <= order.price(),
            (OrderKind::Sell, OrderKind::Buy) => resting.price() >= order.price(),
            _ => false,
        });

        match crossed {
            Some(resting) => Err(Error::CrossingOrder(order.kind(), order.price(), resting.price())),
            None => Ok(()),
        }
    }

    /// Adds an order. The caller runs [`OrderBook::check_crossing`] first.
    pub fn insert(&mut self, order: Order) {
        self.orders.push_back(order);
    }

    /// Removes and returns every order the candle range reaches, in placement order.
    ///
    /// A buy fills when its price is above the candle low, a sell when its price is below
    /// the candle high.
    pub fn take_fillable(&mut self, candle: &Candle) -> Vec<Order> {
        let mut filled = Vec::new();
        let mut resting = VecDeque::with_capacity(self.orders.len());

        while let Some(order) = self.orders.pop_front() {
            let reached = match order.kind() {
                OrderKind::Buy => order.price() > candle.low(),
                OrderKind::Sell => order.price() < candle.high(),
            };

            if reached {
                filled.push(order);
            } else {
                resting.push_back(order);
            }
        }

        self.orders = resting;
        filled
    }

    /// Removes every order, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = Order> + '_ {
        self.orders.drain(..)
    }

    /// Base coins escrowed by resting sells.
    pub fn escrowed_base(&self) -> f64 {
        self.orders
            .iter()
            .filter(|order| order.kind() == OrderKind::Sell)
            .map(Order::count)
            .sum()
    }

    /// Quote coins escrowed by resting buys.
    pub fn escrowed_quote(&self) -> f64 {
        self.orders
            .iter()
            .filter(|order| order.kind() == OrderKind::Buy)
            .map(Order::cost)
            .sum()
    }
}
