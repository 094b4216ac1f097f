//! # coin-bts: hourly backtests of spot trading strategies
//!
//! **coin-bts** replays hourly candles of one coin pair through a simulated spot exchange and
//! lets a strategy place limit orders on it. Each candle opens an hour, fills the resting
//! orders its price range reaches and closes the hour; strategies react to those three events
//! through an in-process [`EventBus`](events::EventBus).
//!
//! ## Core Components
//! | Component              | Description                                                              |
//! |------------------------|--------------------------------------------------------------------------|
//! | **`Candle`**           | Hourly OHLCV bar.                                                        |
//! | **`Order`**            | Limit buy or sell of base coins.                                         |
//! | **`Balance`**          | Coins held per ticker.                                                   |
//! | **`Exchange`**         | Escrows orders, fills them bar by bar and publishes the bar events.      |
//! | **`EventBus`**         | Ordered, synchronous dispatch of the bar events.                         |
//! | **`Indicator`**        | Streaming SMA, EMA, VWMA, Bollinger bands and RSI on bucketed candles.   |
//! | **`Trader`**           | Strategy runtime: activity window, statistics and bus plumbing.          |
//! | **`Report`**           | Profit, net worth and balance ranges of a finished run.                  |
//!
//! ## Strategies
//! | Strategy               | Description                                                              |
//! |------------------------|--------------------------------------------------------------------------|
//! | **Balance**            | Keeps the base coins at half of the net worth.                           |
//! | **Assets Allocation**  | Picks the base coin share by the deviation from a moving average.        |
//! | **Grid**               | Ladder of orders between a minimum and a maximum price.                  |
//!
//! ## Getting Started
//! ```rust
//! use coin_bts::prelude::*;
//!
//! let config: AppConfig = r#"
//! [initial_balance]
//! USDT = 1000
//!
//! [grid]
//! min_price = 90
//! max_price = 110
//! grid_size = 5
//! "#
//! .parse()
//! .unwrap();
//!
//! let open_time = chrono::DateTime::from_timestamp_secs(1609459200).unwrap();
//! let candle = CandleBuilder::builder()
//!     .open(100.0)
//!     .high(102.0)
//!     .low(98.0)
//!     .close(101.0)
//!     .volume(1.0)
//!     .open_time(open_time)
//!     .close_time(open_time + chrono::Duration::minutes(59))
//!     .build()
//!     .unwrap();
//!
//! let backtest = Backtest::new(config, "BTC-USDT".parse().unwrap());
//! let report = backtest
//!     .run(StrategyKind::Grid, &mut MemorySource::from(vec![candle]))
//!     .unwrap()
//!     .unwrap();
//!
//! assert_eq!(report.statistic().executed_orders_count(), 1);
//! println!("{report}");
//! ```
//!
//! ## Error Handling
//! Every failure is an [`errors::Error`]. None of them is retried: a sequence violation, an
//! invariant violation, missing funds or an empty indicator input stops the run.
#![warn(missing_docs)]

/// Candles, orders, balances and the simulated exchange.
pub mod engine;

/// Error types for the library.
pub mod errors;

/// Bar events and their bus.
pub mod events;

/// Streaming technical indicators.
pub mod indicators;

/// Figures collected during a run.
pub mod statistics;

/// Strategy runtime and policies.
pub mod strategy;

/// Run summary.
pub mod report;

/// TOML configuration.
pub mod config;

/// One configured run from source to report.
pub mod backtest;

/// Data file helpers.
mod utils;

/// Re-exports of commonly used types and traits for convenience.
pub mod prelude {
    pub use super::*;
    pub use crate::backtest::*;
    pub use crate::config::*;
    pub use crate::engine::*;
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::indicators::*;
    pub use crate::report::*;
    pub use crate::statistics::*;
    pub use crate::strategy::*;
}

use std::ops::{Div, Mul, Sub};

/// Percentage calculations used for fees, allocations and profits.
pub trait PercentCalculus<Rhs = Self> {
    /// Subtracts a percentage from the value.
    ///
    /// ### Arguments
    /// * `rhs` - The percentage to subtract (e.g., 0.1 for 0.1%).
    ///
    /// ### Returns
    /// The value decreased by the given percentage.
    fn subpercent(self, rhs: Rhs) -> Self;

    /// Calculates the given percentage of the value.
    ///
    /// ### Arguments
    /// * `percent` - The percentage to take (e.g., 50.0 for half).
    fn how_many(self, percent: Self) -> Self;

    /// Calculates the percentage change between two values.
    ///
    /// ### Arguments
    /// * `new` - The new value to compare with.
    ///
    /// ### Returns
    /// The percentage change from the original value to the new value.
    fn change(self, new: Self) -> Self;
}

impl PercentCalculus for f64 {
    fn subpercent(self, percent: Self) -> Self {
        self.sub(self.mul(percent.div(100.0)))
    }

    fn how_many(self, percent: Self) -> Self {
        percent.mul(self.div(100.0))
    }

    fn change(self, new: Self) -> Self {
        new.sub(self).div(self).mul(100.0)
    }
}
