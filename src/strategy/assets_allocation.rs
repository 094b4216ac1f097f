use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    PercentCalculus,
    engine::{Candle, Exchange, Order, OrderKind},
    errors::{Error, Result},
    indicators::{Indicator, MovingAverage, MovingAverageKind, MovingAverageSettings},
    strategy::{ActivityWindow, Context, Policy},
};

/// One row of the allocation table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllocationSetting {
    /// Deviation of the price from the moving average, in percent.
    pub deviation_from_ma_percent: f64,
    /// Share of the net worth to hold in base coins at that deviation, in percent.
    pub target_base_coins_percent: f64,
}

/// Settings of the [`AssetsAllocationPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetsAllocationSettings {
    /// Activity dates.
    #[serde(flatten)]
    pub window: ActivityWindow,
    /// Compare the price with the highest moving average seen instead of the latest one.
    #[serde(default)]
    pub use_max_ma_value: bool,
    /// Flavour of the moving average.
    pub moving_average_kind: MovingAverageKind,
    /// Window of the moving average.
    pub moving_average_settings: MovingAverageSettings,
    /// Allocation table.
    pub allocation_settings: Vec<AllocationSetting>,
}

/// Holds a share of base coins picked from an allocation table, by how far the price is
/// from its moving average.
#[derive(Debug, Clone)]
pub struct AssetsAllocationPolicy {
    settings: AssetsAllocationSettings,
    moving_average: Indicator<MovingAverage>,
    max_ma_value: Option<f64>,
    current_allocation: Option<AllocationSetting>,
}

impl AssetsAllocationPolicy {
    /// Creates the policy and its moving average.
    ///
    /// ### Returns
    /// [`Error::InvalidSettings`] for an empty table, a target outside `0..=100` or an
    /// invalid moving average window.
    pub fn new(settings: AssetsAllocationSettings) -> Result<Self> {
        if settings.allocation_settings.is_empty() {
            return Err(Error::InvalidSettings("allocation table is empty".to_string()));
        }
        if let Some(row) = settings
            .allocation_settings
            .iter()
            .find(|row| !(0.0..=100.0).contains(&row.target_base_coins_percent))
        {
            return Err(Error::InvalidSettings(format!(
                "target allocation must be within 0..=100 (got: {})",
                row.target_base_coins_percent
            )));
        }

        let moving_average = settings
            .moving_average_kind
            .indicator(settings.moving_average_settings.into())?;

        Ok(Self {
            settings,
            moving_average,
            max_ma_value: None,
            current_allocation: None,
        })
    }

    /// Returns the settings.
    pub fn settings(&self) -> &AssetsAllocationSettings {
        &self.settings
    }

    /// Allocation currently held, once the first rebalance happened.
    pub fn current_allocation(&self) -> Option<&AllocationSetting> {
        self.current_allocation.as_ref()
    }

    /// Moving average value the price is compared with.
    pub fn ma_value(&self) -> Option<f64> {
        if self.settings.use_max_ma_value {
            self.max_ma_value
        } else {
            self.moving_average.current_value().copied()
        }
    }

    /// Row whose deviation is the closest to `deviation`.
    ///
    /// On a tie the later row wins when its target is positive.
    pub fn closest_allocation(&self, deviation: f64) -> Option<AllocationSetting> {
        self.settings.allocation_settings.iter().copied().reduce(|previous, current| {
            let to_previous = (previous.deviation_from_ma_percent - deviation).abs();
            let to_current = (current.deviation_from_ma_percent - deviation).abs();

            if to_current < to_previous || (to_current == to_previous && current.target_base_coins_percent > 0.0) {
                current
            } else {
                previous
            }
        })
    }

    fn feed(&mut self, candle: &Candle) -> Result<()> {
        if let Some(value) = self.moving_average.process(candle)? {
            if value != 0.0 {
                self.max_ma_value = Some(self.max_ma_value.map_or(value, |max| max.max(value)));
            }
            debug!(time = %candle.open_time(), value, "Moving average updated");
        }
        Ok(())
    }
}

fn place(exchange: &mut Exchange, kind: OrderKind, price: f64, count: f64) -> Result<()> {
    if count > 0.0 {
        exchange.add_order(Order::new(kind, price, count)?)?;
    }
    Ok(())
}

impl Policy for AssetsAllocationPolicy {
    fn name(&self) -> &'static str {
        "Assets Allocation"
    }

    fn activity_window(&self) -> ActivityWindow {
        self.settings.window
    }

    fn on_new_hour_started(&mut self, ctx: &mut Context<'_>, open_price: f64, _: DateTime<Utc>) -> Result<()> {
        let ma = match self.ma_value() {
            Some(ma) if ma != 0.0 => ma,
            _ => return Ok(()),
        };

        let exchange = &mut *ctx.exchange;
        exchange.cancel_all_orders()?;

        let deviation = (open_price - ma) * 100.0 / ma;
        if deviation == 0.0 {
            return Ok(());
        }

        let Some(target) = self.closest_allocation(deviation) else {
            return Ok(());
        };

        let total_base = exchange.total_base_coins();
        let base_cost = total_base * open_price;
        let net_worth = exchange.total_quoted_coins() + base_cost;
        let base_percent = base_cost / net_worth * 100.0;
        let target_count = net_worth.how_many(target.target_base_coins_percent) / open_price;

        let Some(current) = self.current_allocation else {
            if base_percent < target.target_base_coins_percent {
                place(exchange, OrderKind::Buy, open_price, target_count - total_base)?;
            } else if base_percent > target.target_base_coins_percent {
                place(exchange, OrderKind::Sell, open_price, total_base - target_count)?;
            }

            info!(deviation, target = target.target_base_coins_percent, "Initial allocation");
            self.current_allocation = Some(target);
            return Ok(());
        };

        if current.deviation_from_ma_percent == target.deviation_from_ma_percent {
            return Ok(());
        }

        // only moves further away from the average trade
        if target.deviation_from_ma_percent > current.deviation_from_ma_percent && target.deviation_from_ma_percent >= 0.0
        {
            if total_base > target_count {
                place(exchange, OrderKind::Sell, open_price, total_base - target_count)?;
            }
            self.current_allocation = Some(target);
        } else if target.deviation_from_ma_percent < current.deviation_from_ma_percent
            && target.deviation_from_ma_percent <= 0.0
        {
            if total_base < target_count {
                place(exchange, OrderKind::Buy, open_price, target_count - total_base)?;
            }
            self.current_allocation = Some(target);
        }

        Ok(())
    }

    fn on_orders_executed(&mut self, _: &mut Context<'_>, _: &[Order]) -> Result<()> {
        if let Some(current) = &self.current_allocation {
            info!(deviation = current.deviation_from_ma_percent, "Deviation from MA settings");
        }
        Ok(())
    }

    fn on_current_hour_ended(&mut self, _: &mut Context<'_>, candle: &Candle) -> Result<()> {
        self.feed(candle)
    }

    fn warm_up(&mut self, candle: &Candle) -> Result<()> {
        self.feed(candle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::PeriodKind;
    use crate::statistics::TradingStatistic;
    use crate::strategy::tests::{candles, exchange};

    fn settings(use_max_ma_value: bool) -> AssetsAllocationSettings {
        AssetsAllocationSettings {
            window: ActivityWindow::default(),
            use_max_ma_value,
            moving_average_kind: MovingAverageKind::Sma,
            moving_average_settings: MovingAverageSettings {
                period: 2,
                period_kind: PeriodKind::Hours,
            },
            allocation_settings: vec![
                AllocationSetting {
                    deviation_from_ma_percent: -10.0,
                    target_base_coins_percent: 100.0,
                },
                AllocationSetting {
                    deviation_from_ma_percent: 0.0,
                    target_base_coins_percent: 50.0,
                },
                AllocationSetting {
                    deviation_from_ma_percent: 10.0,
                    target_base_coins_percent: 0.0,
                },
            ],
        }
    }

    fn warmed_up(closes: &[f64], use_max_ma_value: bool) -> AssetsAllocationPolicy {
        let mut policy = AssetsAllocationPolicy::new(settings(use_max_ma_value)).unwrap();
        let bars = closes.iter().map(|close| (*close, *close, *close, *close)).collect::<Vec<_>>();
        for candle in candles(&bars) {
            policy.warm_up(&candle).unwrap();
        }
        policy
    }

    fn only_order(exchange: &Exchange) -> Order {
        let orders = exchange.orders().copied().collect::<Vec<_>>();
        assert_eq!(orders.len(), 1);
        orders[0]
    }

    #[test]
    fn closest_row() {
        let policy = AssetsAllocationPolicy::new(settings(false)).unwrap();
        let closest = |deviation| policy.closest_allocation(deviation).unwrap().deviation_from_ma_percent;

        assert_eq!(closest(-30.0), -10.0);
        assert_eq!(closest(-4.0), 0.0);
        assert_eq!(closest(7.0), 10.0);
        // halfway between -10 and 0: the later row has a positive target
        assert_eq!(closest(-5.0), 0.0);
        // halfway between 0 and 10: the later row targets nothing
        assert_eq!(closest(5.0), 0.0);
    }

    #[test]
    fn waits_for_the_moving_average() {
        let mut policy = AssetsAllocationPolicy::new(settings(false)).unwrap();
        let mut exchange = exchange(1_000.0, 0.0);
        let statistic = TradingStatistic::new(exchange.pair().clone());

        let mut ctx = Context {
            exchange: &mut exchange,
            statistic: &statistic,
        };
        policy.on_new_hour_started(&mut ctx, 90.0, DateTime::<Utc>::UNIX_EPOCH).unwrap();

        assert_eq!(exchange.orders().len(), 0);
        assert_eq!(policy.current_allocation(), None);
    }

    #[test]
    fn first_allocation_buys() {
        let mut policy = warmed_up(&[100.0, 100.0], false);
        let mut exchange = exchange(1_000.0, 0.0);
        let statistic = TradingStatistic::new(exchange.pair().clone());

        let mut ctx = Context {
            exchange: &mut exchange,
            statistic: &statistic,
        };
        policy.on_new_hour_started(&mut ctx, 90.0, DateTime::<Utc>::UNIX_EPOCH).unwrap();

        let order = only_order(&exchange);
        assert_eq!(order.kind(), OrderKind::Buy);
        assert_eq!(order.price(), 90.0);
        assert!((order.count() - 1_000.0 / 90.0).abs() < 1e-9);
        assert_eq!(policy.current_allocation().unwrap().target_base_coins_percent, 100.0);
    }

    #[test]
    fn first_allocation_sells() {
        let mut policy = warmed_up(&[100.0, 100.0], false);
        let mut exchange = exchange(500.0, 5.0);
        let statistic = TradingStatistic::new(exchange.pair().clone());

        let mut ctx = Context {
            exchange: &mut exchange,
            statistic: &statistic,
        };
        policy.on_new_hour_started(&mut ctx, 110.0, DateTime::<Utc>::UNIX_EPOCH).unwrap();

        let order = only_order(&exchange);
        assert_eq!(order.kind(), OrderKind::Sell);
        assert_eq!(order.count(), 5.0);
    }

    #[test]
    fn only_further_moves_trade() {
        let mut policy = warmed_up(&[100.0, 100.0], false);
        let mut exchange = exchange(500.0, 5.0);
        let statistic = TradingStatistic::new(exchange.pair().clone());

        let mut ctx = Context {
            exchange: &mut exchange,
            statistic: &statistic,
        };

        policy.on_new_hour_started(&mut ctx, 101.0, DateTime::<Utc>::UNIX_EPOCH).unwrap();
        assert_eq!(policy.current_allocation().unwrap().deviation_from_ma_percent, 0.0);

        // same row: the pending orders are dropped and nothing new is placed
        policy.on_new_hour_started(&mut ctx, 95.0, DateTime::<Utc>::UNIX_EPOCH).unwrap();
        assert_eq!(ctx.exchange.orders().len(), 0);

        policy.on_new_hour_started(&mut ctx, 89.0, DateTime::<Utc>::UNIX_EPOCH).unwrap();
        assert_eq!(only_order(ctx.exchange).kind(), OrderKind::Buy);
        assert_eq!(policy.current_allocation().unwrap().deviation_from_ma_percent, -10.0);
    }

    #[test]
    fn tracks_the_highest_average() {
        let policy = warmed_up(&[100.0, 120.0, 80.0, 80.0], true);
        assert_eq!(policy.ma_value(), Some(110.0));

        let policy = warmed_up(&[100.0, 120.0, 80.0, 80.0], false);
        assert_eq!(policy.ma_value(), Some(80.0));
    }

    #[test]
    fn invalid_table() {
        let mut empty = settings(false);
        empty.allocation_settings.clear();
        assert!(AssetsAllocationPolicy::new(empty).is_err());

        let mut over = settings(false);
        over.allocation_settings[0].target_base_coins_percent = 120.0;
        assert!(AssetsAllocationPolicy::new(over).is_err());
    }
}
