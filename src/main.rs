use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use coin_bts::prelude::*;

#[derive(Parser)]
#[command(name = "coin-bts")]
#[command(about = "Backtest trading strategies on hourly coin pair candles", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Root of the candle files, one `BASE-QUOTE` directory per pair
    #[arg(long, default_value = "data")]
    data: PathBuf,

    #[command(subcommand)]
    strategy: Strategy,
}

#[derive(Subcommand)]
enum Strategy {
    /// Keep the base coins at half of the net worth
    Balance {
        /// Traded pair, e.g. BTC-USDT
        #[arg(long = "for")]
        pair: CoinPair,
    },
    /// Allocation table keyed by the deviation from a moving average
    AssetsAllocation {
        /// Traded pair, e.g. BTC-USDT
        #[arg(long = "for")]
        pair: CoinPair,
    },
    /// Ladder of orders between two prices
    Grid {
        /// Traded pair, e.g. BTC-USDT
        #[arg(long = "for")]
        pair: CoinPair,
    },
}

impl Strategy {
    fn split(self) -> (StrategyKind, CoinPair) {
        match self {
            Self::Balance { pair } => (StrategyKind::Balance, pair),
            Self::AssetsAllocation { pair } => (StrategyKind::AssetsAllocation, pair),
            Self::Grid { pair } => (StrategyKind::Grid, pair),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let (kind, pair) = cli.strategy.split();

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    let mut source = JsonFileSource::for_pair(&cli.data, &pair);

    info!(strategy = %kind, pair = %pair, "Starting backtest");
    match Backtest::new(config, pair).run(kind, &mut source)? {
        Some(report) => println!("{report}"),
        None => warn!("No candle to process"),
    }

    Ok(())
}
