//! End of run summary.

use std::fmt;

use serde::Serialize;

use crate::{PercentCalculus, errors::Result, statistics::TradingStatistic};

/// Profit against a reference net worth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Profit {
    /// Difference in quote coins.
    pub value: f64,
    /// Difference in percent of the reference.
    pub percent: f64,
}

impl Profit {
    fn between(initial: f64, current: f64) -> Self {
        Self {
            value: current - initial,
            percent: initial.change(current),
        }
    }
}

/// Summary of a finished strategy run.
#[derive(Debug, Clone)]
pub struct Report {
    strategy: String,
    settings: serde_json::Value,
    statistic: TradingStatistic,
    initial_base_coins: f64,
    initial_quoted_coins: f64,
}

impl Report {
    /// Builds the report.
    ///
    /// ### Arguments
    /// * `strategy` - Display name of the strategy.
    /// * `settings` - Settings the strategy ran with.
    /// * `statistic` - Figures collected during the run.
    /// * `initial_balance` - Base and quote coins held before the run.
    pub fn new<S: Serialize>(
        strategy: impl Into<String>,
        settings: &S,
        statistic: TradingStatistic,
        (initial_base_coins, initial_quoted_coins): (f64, f64),
    ) -> Result<Self> {
        Ok(Self {
            strategy: strategy.into(),
            settings: serde_json::to_value(settings)?,
            statistic,
            initial_base_coins,
            initial_quoted_coins,
        })
    }

    /// Returns the strategy name.
    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    /// Returns the settings of the run.
    pub fn settings(&self) -> &serde_json::Value {
        &self.settings
    }

    /// Returns the collected figures.
    pub fn statistic(&self) -> &TradingStatistic {
        &self.statistic
    }

    /// Net worth at the first processed price.
    pub fn initial_net_worth(&self) -> Option<f64> {
        let price = self.statistic.first_processed_price()?;
        Some(self.initial_quoted_coins + self.initial_base_coins * price)
    }

    /// Net worth of the final balances at the last processed price.
    pub fn final_net_worth(&self) -> Option<f64> {
        let price = self.statistic.last_processed_price()?;
        Some(self.statistic.final_quoted_coins_balance() + self.statistic.final_base_coins_balance() * price)
    }

    /// Profit of the strategy.
    pub fn profit(&self) -> Option<Profit> {
        Some(Profit::between(self.initial_net_worth()?, self.final_net_worth()?))
    }

    /// Profit of buying base coins with every quote coin at the first price and holding them.
    pub fn buy_and_hold_profit(&self) -> Option<Profit> {
        let first = self.statistic.first_processed_price()?;
        let last = self.statistic.last_processed_price()?;
        let held = (self.initial_quoted_coins / first + self.initial_base_coins) * last;

        Some(Profit::between(self.initial_net_worth()?, held))
    }
}

fn write_profit(f: &mut fmt::Formatter<'_>, label: &str, profit: Profit, quote: &str) -> fmt::Result {
    let sign = if profit.value > 0.0 { "+" } else { "" };
    writeln!(
        f,
        "{label}: {sign}{:.2}%; ({sign}{:.2} {quote})",
        profit.percent, profit.value
    )
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let statistic = &self.statistic;
        let pair = statistic.pair();

        writeln!(f, "Settings: {}", self.settings)?;
        writeln!(f, "=== Report of {} trading strategy ===", self.strategy)?;

        let (Some(started), Some(last)) = (statistic.started_at(), statistic.last_processed_date()) else {
            return writeln!(f, "No candle processed");
        };
        writeln!(
            f,
            "Date range: {} -> {}",
            started.format("%Y-%m-%d %H:%M"),
            last.format("%Y-%m-%d %H:%M")
        )?;
        writeln!(f, "Executed orders count: {}", statistic.executed_orders_count())?;

        writeln!(f, "{:<8} {:>16} {:>16} {:>16} {:>16}", "Coin", "Initial", "Final", "Min", "Max")?;
        for (coin, initial, last, range) in [
            (
                pair.quote(),
                self.initial_quoted_coins,
                statistic.final_quoted_coins_balance(),
                statistic.quoted_coin_balance_range(),
            ),
            (
                pair.base(),
                self.initial_base_coins,
                statistic.final_base_coins_balance(),
                statistic.base_coin_balance_range(),
            ),
        ] {
            writeln!(
                f,
                "{coin:<8} {initial:>16.8} {last:>16.8} {:>16.8} {:>16.8}",
                range.min_or_default(),
                range.max_or_default()
            )?;
        }

        if let Some(net_worth) = self.final_net_worth() {
            writeln!(
                f,
                "Assets net worth: Final={net_worth:.2}; Min={:.2}; Max={:.2}",
                statistic.assets_net_worth_range().min_or_default(),
                statistic.assets_net_worth_range().max_or_default()
            )?;
        }
        if let Some(profit) = self.profit() {
            write_profit(f, "Profit", profit, pair.quote())?;
        }
        if let Some(profit) = self.buy_and_hold_profit() {
            write_profit(f, "Buy&Hold strategy profit", profit, pair.quote())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CoinPair;

    use chrono::DateTime;

    fn statistic() -> TradingStatistic {
        let mut statistic = TradingStatistic::new(CoinPair::new("BTC", "USDT"));
        let start = DateTime::from_timestamp_secs(1515151515).unwrap();

        statistic.set_started_at(start).unwrap();
        statistic.set_first_processed_price(100.0).unwrap();
        statistic.set_last_processed(start, 200.0);
        statistic.add_executed_orders(1);
        statistic.update_net_worth(1_000.0);
        statistic.update_net_worth(1_500.0);
        statistic.set_final_balances(5.0, 500.0);
        statistic
    }

    #[test]
    fn profits() {
        let report = Report::new("Balance", &serde_json::json!({}), statistic(), (0.0, 1_000.0)).unwrap();

        assert_eq!(report.initial_net_worth(), Some(1_000.0));
        assert_eq!(report.final_net_worth(), Some(1_500.0));
        assert_eq!(
            report.profit(),
            Some(Profit {
                value: 500.0,
                percent: 50.0
            })
        );
        // 10 coins bought at 100 are worth 2000 at 200
        assert_eq!(
            report.buy_and_hold_profit(),
            Some(Profit {
                value: 1_000.0,
                percent: 100.0
            })
        );
    }

    #[test]
    fn display() {
        let report = Report::new("Grid", &serde_json::json!({"grid_size": 5}), statistic(), (0.0, 1_000.0)).unwrap();
        let text = report.to_string();

        assert!(text.contains("=== Report of Grid trading strategy ==="));
        assert!(text.contains("Executed orders count: 1"));
        assert!(text.contains("Profit: +50.00%; (+500.00 USDT)"));
        assert!(text.contains("Buy&Hold strategy profit: +100.00%; (+1000.00 USDT)"));
    }

    #[test]
    fn nothing_processed() {
        let statistic = TradingStatistic::new(CoinPair::new("BTC", "USDT"));
        let report = Report::new("Grid", &serde_json::json!({}), statistic, (0.0, 1_000.0)).unwrap();

        assert_eq!(report.profit(), None);
        assert!(report.to_string().contains("No candle processed"));
    }
}
