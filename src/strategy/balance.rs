use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    engine::{Order, OrderKind},
    errors::{Error, Result},
    strategy::{ActivityWindow, Context, Policy},
    utils::calendar_months_between,
};

/// Settings of the [`BalancePolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceSettings {
    /// Activity dates.
    #[serde(flatten)]
    pub window: ActivityWindow,
    /// Imbalance, in percent of the net worth, tolerated before rebalancing.
    pub max_permissible_imbalance_percent: f64,
    /// Minimum number of calendar months between two rebalances.
    #[serde(default)]
    pub rebalance_frequency_in_month: Option<u32>,
}

/// Keeps the value of the base coins at half of the net worth.
#[derive(Debug, Clone)]
pub struct BalancePolicy {
    settings: BalanceSettings,
    last_rebalance_date: Option<DateTime<Utc>>,
}

impl BalancePolicy {
    /// Creates the policy.
    pub fn new(settings: BalanceSettings) -> Result<Self> {
        if !(settings.max_permissible_imbalance_percent >= 0.0) {
            return Err(Error::InvalidSettings(format!(
                "max permissible imbalance must not be negative (got: {})",
                settings.max_permissible_imbalance_percent
            )));
        }

        Ok(Self {
            settings,
            last_rebalance_date: None,
        })
    }

    /// Returns the settings.
    pub fn settings(&self) -> &BalanceSettings {
        &self.settings
    }

    /// Date of the last rebalance, if any.
    pub fn last_rebalance_date(&self) -> Option<DateTime<Utc>> {
        self.last_rebalance_date
    }

    fn too_early(&self, open_time: DateTime<Utc>) -> bool {
        match (self.settings.rebalance_frequency_in_month, self.last_rebalance_date) {
            (Some(frequency), Some(last)) if frequency > 0 => {
                calendar_months_between(last, open_time) < frequency as i32
            }
            _ => false,
        }
    }
}

impl Policy for BalancePolicy {
    fn name(&self) -> &'static str {
        "Balance"
    }

    fn activity_window(&self) -> ActivityWindow {
        self.settings.window
    }

    fn on_new_hour_started(&mut self, ctx: &mut Context<'_>, open_price: f64, open_time: DateTime<Utc>) -> Result<()> {
        let exchange = &mut *ctx.exchange;

        let base_cost = exchange.total_base_coins() * open_price;
        let quoted = exchange.total_quoted_coins();
        let base_percent = base_cost / (quoted + base_cost) * 100.0;

        if (base_percent - 50.0).abs() * 2.0 < self.settings.max_permissible_imbalance_percent
            || self.too_early(open_time)
        {
            return Ok(());
        }

        let (kind, count) = if base_percent < 50.0 {
            (OrderKind::Buy, (quoted - base_cost) / 2.0 / open_price)
        } else {
            (OrderKind::Sell, (base_cost - quoted) / 2.0 / open_price)
        };
        // a perfect split leaves nothing to trade
        if !(count > 0.0) {
            return Ok(());
        }

        exchange.cancel_all_orders()?;

        let order = Order::new(kind, open_price, count)?;
        info!(
            time = %open_time,
            kind = %order.kind(),
            count = order.count(),
            base_percent,
            "Rebalancing"
        );
        exchange.add_order(order)?;

        self.last_rebalance_date = Some(open_time);
        Ok(())
    }
}
