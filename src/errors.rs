use chrono::{DateTime, Utc};

use crate::engine::OrderKind;

/// Result of every fallible operation of the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classes of failures. None of them is recoverable inside a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A bar arrived out of order or twice.
    SequenceViolation,
    /// A value or a state transition broke a domain rule.
    InvariantViolation,
    /// A balance could not cover a debit.
    InsufficientFunds,
    /// A calculator received too few data points.
    EmptyInput,
    /// Configuration, file or parsing failure outside the simulation.
    Environment,
}

/// Errors raised by the simulation, the indicators and the configuration.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A candle was not strictly after the previously processed one.
    #[error("Candle sequence violation: {current} does not follow {previous}")]
    SequenceViolation {
        /// Open time of the last processed candle.
        previous: DateTime<Utc>,
        /// Open time of the rejected candle.
        current: DateTime<Utc>,
    },

    /// The order price or count is not strictly positive.
    #[error("Invalid order: price {0} and count {1} must be positive")]
    InvalidOrder(f64, f64),

    /// The candle fields are inconsistent or incomplete.
    #[error("Invalid candle: {0}")]
    InvalidCandle(String),

    /// A one-shot statistic field was assigned twice.
    #[error("Statistic field `{0}` is already set")]
    StatisticAlreadySet(&'static str),

    /// Both coins of the pair have an empty balance.
    #[error("Initial balance is zero for both {0} and {1}")]
    ZeroInitialBalance(String, String),

    /// The order would cross a resting order of the opposite side.
    #[error("{0:?} order at {1} crosses a resting order at {2}")]
    CrossingOrder(OrderKind, f64, f64),

    /// A buy above or a sell below the current open price.
    #[error("{0:?} order at {1} is on the wrong side of the open price {2}")]
    OrderAgainstMarket(OrderKind, f64, f64),

    /// A negative amount was given to a balance operation.
    #[error("Amount must not be negative (got: {0})")]
    NegativeAmount(f64),

    /// The balance does not hold enough coins.
    /// Ticker, requested, available
    #[error("Insufficient {0} funds: required {1}, available {2}")]
    InsufficientFunds(String, f64, f64),

    /// A calculator received at most one data point.
    #[error("Not enough data points: got {0}, need at least 2")]
    EmptyInput(usize),

    /// Settings of an indicator or a strategy are unusable.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// The coin pair string cannot be parsed.
    #[error("Invalid coin pair: {0}")]
    InvalidCoinPair(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON deserialization error occurred.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML deserialization error occurred.
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl Error {
    /// Returns the class of the failure.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SequenceViolation { .. } => ErrorCategory::SequenceViolation,
            Self::InvalidOrder(..)
            | Self::InvalidCandle(_)
            | Self::StatisticAlreadySet(_)
            | Self::ZeroInitialBalance(..)
            | Self::CrossingOrder(..)
            | Self::OrderAgainstMarket(..)
            | Self::NegativeAmount(_)
            | Self::InvalidSettings(_) => ErrorCategory::InvariantViolation,
            Self::InsufficientFunds(..) => ErrorCategory::InsufficientFunds,
            Self::EmptyInput(_) => ErrorCategory::EmptyInput,
            Self::InvalidCoinPair(_) | Self::IoError(_) | Self::JsonError(_) | Self::TomlError(_) => {
                ErrorCategory::Environment
            }
        }
    }
}

#[cfg(test)]
#[test]
fn categories() {
    assert_eq!(Error::EmptyInput(1).category(), ErrorCategory::EmptyInput);
    assert_eq!(Error::InvalidOrder(0.0, 1.0).category(), ErrorCategory::InvariantViolation);
    assert_eq!(
        Error::InsufficientFunds("BTC".into(), 2.0, 1.0).category(),
        ErrorCategory::InsufficientFunds
    );
    let now = DateTime::from_timestamp_secs(1515151515).unwrap();
    let err = Error::SequenceViolation {
        previous: now,
        current: now,
    };
    assert_eq!(err.category(), ErrorCategory::SequenceViolation);
}
