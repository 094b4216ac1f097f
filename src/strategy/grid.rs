use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    PercentCalculus,
    engine::{Exchange, Order, OrderKind},
    errors::{Error, Result},
    strategy::{ActivityWindow, Context, Policy},
};

/// Settings of the [`GridPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSettings {
    /// Activity dates.
    #[serde(flatten)]
    pub window: ActivityWindow,
    /// Lowest level.
    pub min_price: f64,
    /// Highest level.
    pub max_price: f64,
    /// Number of levels, bounds included.
    pub grid_size: usize,
}

impl GridSettings {
    /// Distance between two levels.
    pub fn price_step(&self) -> f64 {
        (self.max_price - self.min_price) / (self.grid_size as f64 - 1.0)
    }

    /// Price of every level, from the lowest.
    pub fn levels(&self) -> Vec<f64> {
        let step = self.price_step();
        (0..self.grid_size).map(|level| self.min_price + step * level as f64).collect()
    }

    fn validate(&self) -> Result<()> {
        if !(self.min_price > 0.0) || !(self.min_price < self.max_price) {
            return Err(Error::InvalidSettings(format!(
                "grid needs 0 < min price < max price (got: {} and {})",
                self.min_price, self.max_price
            )));
        }
        if self.grid_size < 2 {
            return Err(Error::InvalidSettings(format!(
                "grid needs at least 2 levels (got: {})",
                self.grid_size
            )));
        }
        Ok(())
    }
}

/// Ladder of buy orders under the price and sell orders above it.
#[derive(Debug, Clone)]
pub struct GridPolicy {
    settings: GridSettings,
    price_step: f64,
    any_executed: bool,
}

impl GridPolicy {
    /// Creates the policy.
    ///
    /// ### Returns
    /// [`Error::InvalidSettings`] unless `0 < min_price < max_price` and `grid_size >= 2`.
    pub fn new(settings: GridSettings) -> Result<Self> {
        settings.validate()?;

        Ok(Self {
            price_step: settings.price_step(),
            settings,
            any_executed: false,
        })
    }

    /// Returns the settings.
    pub fn settings(&self) -> &GridSettings {
        &self.settings
    }

    /// Splits the net worth by the position of the price in the range.
    fn rebalance(&self, exchange: &mut Exchange, open_price: f64) -> Result<()> {
        exchange.cancel_all_orders()?;

        let GridSettings { min_price, max_price, .. } = self.settings;
        if open_price < min_price || open_price > max_price {
            return Ok(());
        }

        let total_base = exchange.total_base_coins();
        let base_cost = total_base * open_price;
        let net_worth = exchange.total_quoted_coins() + base_cost;
        let base_percent = base_cost / net_worth * 100.0;
        let target_percent = 100.0 - (open_price - min_price) / (max_price - min_price) * 100.0;
        let target_count = net_worth.how_many(target_percent) / open_price;

        let (kind, count) = if base_percent < target_percent {
            (OrderKind::Buy, target_count - total_base)
        } else {
            (OrderKind::Sell, total_base - target_count)
        };
        if !(count > 0.0) {
            return Ok(());
        }

        info!(price = open_price, target_percent, "Grid balance");
        exchange.add_order(Order::new(kind, open_price, count)?)
    }

    /// Replaces the ladder around the level closest to `price`.
    fn recreate_orders_grid(&mut self, exchange: &mut Exchange, price: f64) -> Result<()> {
        exchange.cancel_all_orders()?;

        let GridSettings { min_price, grid_size, .. } = self.settings;
        let size = grid_size as i64;
        let closest_level = ((price - min_price) / self.price_step).round() as i64;

        if exchange.quoted_coins_on_balance() > 0.0 {
            for level in (0..closest_level.min(size)).rev() {
                let buy_price = min_price + self.price_step * level as f64;
                let count = exchange.quoted_coins_on_balance() / (level + 1) as f64 / buy_price;
                exchange.add_order(Order::buy(buy_price, count)?)?;
            }
        }

        if exchange.base_coins_on_balance() > 0.0 {
            for level in (closest_level + 1).max(0)..size {
                let sell_price = min_price + self.price_step * level as f64;
                let count = exchange.base_coins_on_balance() / (size - level) as f64;
                exchange.add_order(Order::sell(sell_price, count)?)?;
            }
        }

        debug!(price, closest_level, orders = exchange.orders().len(), "Grid recreated");
        self.any_executed = false;
        Ok(())
    }
}

impl Policy for GridPolicy {
    fn name(&self) -> &'static str {
        "Grid"
    }

    fn activity_window(&self) -> ActivityWindow {
        self.settings.window
    }

    fn on_new_hour_started(&mut self, ctx: &mut Context<'_>, open_price: f64, _: DateTime<Utc>) -> Result<()> {
        if ctx.statistic.executed_orders_count() == 0 {
            self.rebalance(ctx.exchange, open_price)
        } else if self.any_executed {
            self.recreate_orders_grid(ctx.exchange, open_price)
        } else {
            Ok(())
        }
    }

    fn on_orders_executed(&mut self, _: &mut Context<'_>, _: &[Order]) -> Result<()> {
        self.any_executed = true;
        Ok(())
    }
}
