//! Application configuration read from a TOML file.
//!
//! ```toml
//! fee_percent = 0.1
//!
//! [initial_balance]
//! USDT = 1000.0
//!
//! [grid]
//! start_date = "2021-01-01T00:00:00Z"
//! min_price = 20000.0
//! max_price = 60000.0
//! grid_size = 20
//! ```

use std::{collections::BTreeMap, fmt, fs, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    engine::{Balance, DEFAULT_FEE_PERCENT},
    errors::{Error, Result},
    strategy::{AssetsAllocationSettings, BalanceSettings, GridSettings},
};

/// Strategies shipped with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// [`BalancePolicy`](crate::strategy::BalancePolicy)
    Balance,
    /// [`AssetsAllocationPolicy`](crate::strategy::AssetsAllocationPolicy)
    AssetsAllocation,
    /// [`GridPolicy`](crate::strategy::GridPolicy)
    Grid,
}

impl StrategyKind {
    /// Name of the configuration section holding the settings.
    pub fn section(self) -> &'static str {
        match self {
            Self::Balance => "balance",
            Self::AssetsAllocation => "assets_allocation",
            Self::Grid => "grid",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Balance => write!(f, "balance"),
            Self::AssetsAllocation => write!(f, "assets-allocation"),
            Self::Grid => write!(f, "grid"),
        }
    }
}

fn default_fee_percent() -> f64 {
    DEFAULT_FEE_PERCENT
}

/// Everything a run needs besides the candles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Coins held before the run, by ticker.
    pub initial_balance: BTreeMap<String, f64>,
    /// Fee taken from every fill, in percent.
    #[serde(default = "default_fee_percent")]
    pub fee_percent: f64,
    /// Settings of the balance strategy.
    #[serde(default)]
    pub balance: Option<BalanceSettings>,
    /// Settings of the assets allocation strategy.
    #[serde(default)]
    pub assets_allocation: Option<AssetsAllocationSettings>,
    /// Settings of the grid strategy.
    #[serde(default)]
    pub grid: Option<GridSettings>,
}

impl AppConfig {
    /// Reads the configuration at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        fs::read_to_string(path)?.parse()
    }

    /// Wallet holding the initial balance.
    pub fn wallet(&self) -> Balance {
        self.initial_balance.iter().map(|(coin, count)| (coin.as_str(), *count)).collect()
    }

    /// Settings of the balance strategy.
    pub fn balance_settings(&self) -> Result<&BalanceSettings> {
        self.balance.as_ref().ok_or_else(|| missing(StrategyKind::Balance))
    }

    /// Settings of the assets allocation strategy.
    pub fn assets_allocation_settings(&self) -> Result<&AssetsAllocationSettings> {
        self.assets_allocation
            .as_ref()
            .ok_or_else(|| missing(StrategyKind::AssetsAllocation))
    }

    /// Settings of the grid strategy.
    pub fn grid_settings(&self) -> Result<&GridSettings> {
        self.grid.as_ref().ok_or_else(|| missing(StrategyKind::Grid))
    }
}

fn missing(kind: StrategyKind) -> Error {
    Error::InvalidSettings(format!("missing [{}] section for the {kind} strategy", kind.section()))
}

impl FromStr for AppConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;

        if let Some((coin, count)) = config.initial_balance.iter().find(|(_, count)| !(**count >= 0.0)) {
            return Err(Error::InvalidSettings(format!(
                "initial balance of {coin} must not be negative (got: {count})"
            )));
        }
        Ok(config)
    }
}
