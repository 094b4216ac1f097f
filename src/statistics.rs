//! Run-wide aggregates collected while a strategy trades.

use std::cell::OnceCell;

use chrono::{DateTime, Utc};

use crate::{
    engine::CoinPair,
    errors::{Error, Result},
};

/// Smallest and largest observed values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumberRange {
    min: Option<f64>,
    max: Option<f64>,
}

impl NumberRange {
    /// Widens the range to include `value`.
    pub fn update(&mut self, value: f64) {
        if self.min.is_none_or(|min| value < min) {
            self.min = Some(value);
        }
        if self.max.is_none_or(|max| value > max) {
            self.max = Some(value);
        }
    }

    /// Returns the smallest value, if any.
    pub fn min(&self) -> Option<f64> {
        self.min
    }

    /// Returns the largest value, if any.
    pub fn max(&self) -> Option<f64> {
        self.max
    }

    /// Returns the smallest value, 0 when empty.
    pub fn min_or_default(&self) -> f64 {
        self.min.unwrap_or_default()
    }

    /// Returns the largest value, 0 when empty.
    pub fn max_or_default(&self) -> f64 {
        self.max.unwrap_or_default()
    }
}

/// Figures collected by a strategy during a run.
#[derive(Debug, Clone)]
pub struct TradingStatistic {
    pair: CoinPair,
    started_at: OnceCell<DateTime<Utc>>,
    first_processed_price: OnceCell<f64>,
    last_processed_date: Option<DateTime<Utc>>,
    last_processed_price: Option<f64>,
    executed_orders_count: usize,
    assets_net_worth_range: NumberRange,
    base_coin_balance_range: NumberRange,
    quoted_coin_balance_range: NumberRange,
    final_base_coins_balance: f64,
    final_quoted_coins_balance: f64,
}

impl TradingStatistic {
    /// Creates an empty statistic for `pair`.
    pub fn new(pair: CoinPair) -> Self {
        Self {
            pair,
            started_at: OnceCell::new(),
            first_processed_price: OnceCell::new(),
            last_processed_date: None,
            last_processed_price: None,
            executed_orders_count: 0,
            assets_net_worth_range: NumberRange::default(),
            base_coin_balance_range: NumberRange::default(),
            quoted_coin_balance_range: NumberRange::default(),
            final_base_coins_balance: 0.0,
            final_quoted_coins_balance: 0.0,
        }
    }

    /// Returns the traded pair.
    pub fn pair(&self) -> &CoinPair {
        &self.pair
    }

    /// Open time of the first processed candle.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at.get().copied()
    }

    /// Records the first processed date. Fails if already recorded.
    pub fn set_started_at(&mut self, date: DateTime<Utc>) -> Result<()> {
        self.started_at
            .set(date)
            .map_err(|_| Error::StatisticAlreadySet("started_at"))
    }

    /// Open price of the first processed candle.
    pub fn first_processed_price(&self) -> Option<f64> {
        self.first_processed_price.get().copied()
    }

    /// Records the first processed price. Fails if already recorded.
    pub fn set_first_processed_price(&mut self, price: f64) -> Result<()> {
        self.first_processed_price
            .set(price)
            .map_err(|_| Error::StatisticAlreadySet("first_processed_price"))
    }

    /// Open time of the last processed candle.
    pub fn last_processed_date(&self) -> Option<DateTime<Utc>> {
        self.last_processed_date
    }

    /// Open price of the last processed candle.
    pub fn last_processed_price(&self) -> Option<f64> {
        self.last_processed_price
    }

    pub(crate) fn set_last_processed(&mut self, date: DateTime<Utc>, price: f64) {
        self.last_processed_date = Some(date);
        self.last_processed_price = Some(price);
    }

    /// Number of filled orders.
    pub fn executed_orders_count(&self) -> usize {
        self.executed_orders_count
    }

    pub(crate) fn add_executed_orders(&mut self, count: usize) {
        self.executed_orders_count += count;
    }

    /// Net worth in quote coins, sampled at every close.
    pub fn assets_net_worth_range(&self) -> &NumberRange {
        &self.assets_net_worth_range
    }

    pub(crate) fn update_net_worth(&mut self, net_worth: f64) {
        self.assets_net_worth_range.update(net_worth);
    }

    /// Base coins held, sampled after every fill.
    pub fn base_coin_balance_range(&self) -> &NumberRange {
        &self.base_coin_balance_range
    }

    /// Quote coins held, sampled after every fill.
    pub fn quoted_coin_balance_range(&self) -> &NumberRange {
        &self.quoted_coin_balance_range
    }

    pub(crate) fn update_balances(&mut self, base: f64, quoted: f64) {
        self.base_coin_balance_range.update(base);
        self.quoted_coin_balance_range.update(quoted);
    }

    /// Base coins held at the end of the run.
    pub fn final_base_coins_balance(&self) -> f64 {
        self.final_base_coins_balance
    }

    /// Quote coins held at the end of the run.
    pub fn final_quoted_coins_balance(&self) -> f64 {
        self.final_quoted_coins_balance
    }

    pub(crate) fn set_final_balances(&mut self, base: f64, quoted: f64) {
        self.final_base_coins_balance = base;
        self.final_quoted_coins_balance = quoted;
    }
}

#[cfg(test)]
#[test]
fn empty_range_reads_zero() {
    let range = NumberRange::default();
    assert_eq!(range.min(), None);
    assert_eq!(range.min_or_default(), 0.0);
    assert_eq!(range.max_or_default(), 0.0);
}

#[cfg(test)]
#[test]
fn range_widens() {
    let mut range = NumberRange::default();
    for value in [5.0, 3.0, 8.0, 4.0] {
        range.update(value);
    }
    assert_eq!(range.min(), Some(3.0));
    assert_eq!(range.max(), Some(8.0));
}

#[cfg(test)]
#[test]
fn range_keeps_zero() {
    let mut range = NumberRange::default();
    range.update(0.0);
    range.update(2.0);
    assert_eq!(range.min(), Some(0.0));
}

#[cfg(test)]
#[test]
fn one_shot_fields() {
    let mut statistic = TradingStatistic::new(CoinPair::new("BTC", "USDT"));
    let now = DateTime::from_timestamp_secs(1515151515).unwrap();

    statistic.set_started_at(now).unwrap();
    statistic.set_first_processed_price(100.0).unwrap();

    assert!(matches!(
        statistic.set_started_at(now),
        Err(Error::StatisticAlreadySet("started_at"))
    ));
    assert!(matches!(
        statistic.set_first_processed_price(1.0),
        Err(Error::StatisticAlreadySet("first_processed_price"))
    ));
    assert_eq!(statistic.first_processed_price(), Some(100.0));
}
