//! Wires a configuration, a candle source and a strategy into one run.

use serde::Serialize;
use tracing::info;

use crate::{
    config::{AppConfig, StrategyKind},
    engine::{CandleSource, CoinPair, Exchange, RunOutcome},
    errors::Result,
    events::EventBus,
    report::Report,
    strategy::{AssetsAllocationPolicy, BalancePolicy, GridPolicy, Policy, Trader},
};

/// Runs strategies of one configuration on one coin pair.
#[derive(Debug, Clone)]
pub struct Backtest {
    config: AppConfig,
    pair: CoinPair,
}

impl Backtest {
    /// Creates a backtest of `pair` with `config`.
    pub fn new(config: AppConfig, pair: CoinPair) -> Self {
        Self { config, pair }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Returns the traded pair.
    pub fn pair(&self) -> &CoinPair {
        &self.pair
    }

    /// Runs the strategy `kind` over every candle of `source`.
    ///
    /// ### Returns
    /// The report of the run, or `None` when the source could not be initialized.
    pub fn run<S>(&self, kind: StrategyKind, source: &mut S) -> Result<Option<Report>>
    where
        S: CandleSource + ?Sized,
    {
        match kind {
            StrategyKind::Balance => {
                let settings = self.config.balance_settings()?;
                self.run_policy(BalancePolicy::new(*settings)?, settings, source)
            }
            StrategyKind::AssetsAllocation => {
                let settings = self.config.assets_allocation_settings()?;
                self.run_policy(AssetsAllocationPolicy::new(settings.clone())?, settings, source)
            }
            StrategyKind::Grid => {
                let settings = self.config.grid_settings()?;
                self.run_policy(GridPolicy::new(*settings)?, settings, source)
            }
        }
    }

    fn run_policy<P, T, S>(&self, policy: P, settings: &T, source: &mut S) -> Result<Option<Report>>
    where
        P: Policy + 'static,
        T: Serialize,
        S: CandleSource + ?Sized,
    {
        let mut exchange =
            Exchange::new(self.pair.clone(), self.config.wallet()).with_fee_percent(self.config.fee_percent)?;
        let initial_balance = (exchange.total_base_coins(), exchange.total_quoted_coins());

        let mut bus = EventBus::new();
        let name = policy.name();
        let trader = Trader::new(&exchange, policy)?.attach(&mut bus);

        info!(strategy = name, pair = %self.pair, "Backtest started");
        if let RunOutcome::Aborted = exchange.run(source, &mut bus)? {
            return Ok(None);
        }

        trader.borrow_mut().finish(&exchange);
        let statistic = trader.borrow().statistic().clone();

        Ok(Some(Report::new(name, settings, statistic, initial_balance)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{JsonFileSource, MemorySource};
    use crate::errors::Error;
    use crate::strategy::tests::candles;

    const CONFIG: &str = r#"
fee_percent = 0

[initial_balance]
USDT = 1000

[balance]
max_permissible_imbalance_percent = 10

[grid]
min_price = 50
max_price = 150
grid_size = 5
"#;

    fn backtest() -> Backtest {
        Backtest::new(CONFIG.parse().unwrap(), "BTC-USDT".parse().unwrap())
    }

    #[test]
    fn scenario_balance_run() {
        let mut source = MemorySource::from(candles(&[
            (100.0, 105.0, 95.0, 100.0),
            (100.0, 201.0, 99.0, 200.0),
            (200.0, 205.0, 195.0, 200.0),
        ]));

        let report = backtest().run(StrategyKind::Balance, &mut source).unwrap().unwrap();
        let statistic = report.statistic();

        assert_eq!(report.strategy(), "Balance");
        // bought 5 at 100, then 5 * 200 vs 500 is a 66% split: sold 1.25 at 200
        assert_eq!(statistic.executed_orders_count(), 2);
        assert!((statistic.final_base_coins_balance() - 3.75).abs() < 1e-9);
        assert!((statistic.final_quoted_coins_balance() - 750.0).abs() < 1e-9);
        assert!((report.final_net_worth().unwrap() - 1_500.0).abs() < 1e-9);
        assert_eq!(report.settings()["max_permissible_imbalance_percent"], 10.0);
    }

    #[test]
    fn scenario_missing_data() {
        let mut source = JsonFileSource::new("/nonexistent/BTC-USDT");
        assert!(backtest().run(StrategyKind::Grid, &mut source).unwrap().is_none());
    }

    #[test]
    fn scenario_unconfigured_strategy() {
        let mut source = MemorySource::from(candles(&[(100.0, 105.0, 95.0, 100.0)]));
        assert!(matches!(
            backtest().run(StrategyKind::AssetsAllocation, &mut source),
            Err(Error::InvalidSettings(_))
        ));
    }

    #[test]
    fn scenario_empty_wallet() {
        let config: AppConfig = "[initial_balance]\n[grid]\nmin_price = 1\nmax_price = 2\ngrid_size = 2".parse().unwrap();
        let backtest = Backtest::new(config, CoinPair::new("BTC", "USDT"));
        let mut source = MemorySource::from(candles(&[(1.5, 1.6, 1.4, 1.5)]));

        assert!(matches!(
            backtest.run(StrategyKind::Grid, &mut source),
            Err(Error::ZeroInitialBalance(..))
        ));
    }
}
