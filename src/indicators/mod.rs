//! Streaming technical indicators.
//!
//! Every indicator consumes hourly candles one by one, groups them into buckets of its
//! [`CandlestickPeriod`], keeps the last `length` buckets and recomputes its value each time
//! the window is full.
//!
//! | Calculator           | Value                                         |
//! |----------------------|-----------------------------------------------|
//! | [`MovingAverage`]    | SMA, EMA or VWMA of the bucket closes         |
//! | [`BollingerBands`]   | Average with upper and lower bands            |
//! | [`Rsi`]              | Relative strength index (0 to 100)            |

mod bollinger;
mod moving_average;
mod rsi;
mod window;

use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    engine::Candle,
    errors::{Error, Result},
};

pub use bollinger::*;
pub use moving_average::*;
pub use rsi::*;
pub use window::*;

/// Size of the buckets an indicator works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CandlestickPeriod {
    /// One hourly candle per bucket.
    #[default]
    #[serde(rename = "1H")]
    OneHour,
    /// Two hours per bucket.
    #[serde(rename = "2H")]
    TwoHours,
    /// Four hours per bucket.
    #[serde(rename = "4H")]
    FourHours,
    /// Six hours per bucket.
    #[serde(rename = "6H")]
    SixHours,
    /// Twelve hours per bucket.
    #[serde(rename = "12H")]
    TwelveHours,
    /// One UTC day per bucket.
    #[serde(rename = "1D")]
    OneDay,
    /// One week per bucket, starting on Sunday.
    #[serde(rename = "1W")]
    OneWeek,
    /// One UTC calendar month per bucket.
    #[serde(rename = "1M")]
    OneMonth,
}

impl CandlestickPeriod {
    const NAMES: [(&'static str, CandlestickPeriod); 8] = [
        ("1H", Self::OneHour),
        ("2H", Self::TwoHours),
        ("4H", Self::FourHours),
        ("6H", Self::SixHours),
        ("12H", Self::TwelveHours),
        ("1D", Self::OneDay),
        ("1W", Self::OneWeek),
        ("1M", Self::OneMonth),
    ];

    fn hours(self) -> Option<u32> {
        match self {
            Self::OneHour => Some(1),
            Self::TwoHours => Some(2),
            Self::FourHours => Some(4),
            Self::SixHours => Some(6),
            Self::TwelveHours => Some(12),
            Self::OneDay | Self::OneWeek | Self::OneMonth => None,
        }
    }

    /// Returns `true` if `candle` belongs to the same bucket as `bucket`.
    ///
    /// Weeks use the day-of-week heuristic (a new week starts when the weekday goes down) and
    /// never span more than seven days.
    pub fn same_bucket(self, bucket: &Candle, candle: &Candle) -> bool {
        let start = bucket.open_time();
        let time = candle.open_time();

        match self {
            Self::OneDay => start.date_naive() == time.date_naive(),
            Self::OneWeek => {
                time.weekday().num_days_from_sunday() >= bucket.close_time().weekday().num_days_from_sunday()
                    && time - start < Duration::days(7)
            }
            Self::OneMonth => start.year() == time.year() && start.month() == time.month(),
            hourly => {
                let hours = hourly.hours().unwrap_or(1);
                start.date_naive() == time.date_naive() && start.hour() / hours == time.hour() / hours
            }
        }
    }
}

impl fmt::Display for CandlestickPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = Self::NAMES
            .iter()
            .find(|(_, period)| period == self)
            .map(|(name, _)| *name)
            .unwrap_or_default();
        write!(f, "{name}")
    }
}

impl FromStr for CandlestickPeriod {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(value))
            .map(|(_, period)| *period)
            .ok_or_else(|| Error::InvalidSettings(format!("unknown candlestick period `{value}`")))
    }
}

/// Window configuration of an indicator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSettings {
    /// Number of buckets in the window.
    #[serde(alias = "period")]
    pub length: usize,
    /// Bucket size.
    #[serde(default)]
    pub candlestick_period: CandlestickPeriod,
}

impl IndicatorSettings {
    /// Creates settings for `length` buckets of `candlestick_period`.
    pub fn new(length: usize, candlestick_period: CandlestickPeriod) -> Self {
        Self {
            length,
            candlestick_period,
        }
    }
}

/// Computes an indicator value from a full window of buckets.
pub trait Calculate {
    /// Produced value.
    type Output: Clone + fmt::Debug;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Computes the value from the buckets, oldest first.
    fn calculate(&self, window: &[Candle]) -> Result<Self::Output>;
}

/// Incremental indicator: a calculator fed by a [`CandleWindow`].
///
/// ### Example
/// ```rust
/// use coin_bts::prelude::*;
/// use chrono::{DateTime, Duration};
///
/// let settings = IndicatorSettings::new(3, CandlestickPeriod::OneHour);
/// let mut sma = MovingAverageKind::Sma.indicator(settings).unwrap();
/// let start = DateTime::from_timestamp_secs(1609459200).unwrap();
///
/// for (hour, close) in [10.0, 20.0, 30.0, 40.0].into_iter().enumerate() {
///     let open_time = start + Duration::hours(hour as i64);
///     let candle = CandleBuilder::builder()
///         .open(close)
///         .high(close)
///         .low(close)
///         .close(close)
///         .volume(1.0)
///         .open_time(open_time)
///         .close_time(open_time + Duration::minutes(59))
///         .build()
///         .unwrap();
///     sma.process(&candle).unwrap();
/// }
///
/// assert_eq!(sma.current_value(), Some(&30.0));
/// assert_eq!(sma.values().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Indicator<C: Calculate> {
    calculator: C,
    settings: IndicatorSettings,
    window: CandleWindow,
    history: ValueHistory<C::Output>,
}

impl<C: Calculate> Indicator<C> {
    /// Creates an indicator.
    ///
    /// ### Returns
    /// [`Error::InvalidSettings`] when the window is shorter than two buckets.
    pub fn new(calculator: C, settings: IndicatorSettings) -> Result<Self> {
        if settings.length < 2 {
            return Err(Error::InvalidSettings(format!(
                "{} needs a window of at least 2 buckets (got: {})",
                calculator.name(),
                settings.length
            )));
        }

        Ok(Self {
            calculator,
            settings,
            window: CandleWindow::new(settings.length, settings.candlestick_period),
            history: ValueHistory::default(),
        })
    }

    /// Returns the settings.
    pub fn settings(&self) -> IndicatorSettings {
        self.settings
    }

    /// Returns the calculator.
    pub fn calculator(&self) -> &C {
        &self.calculator
    }

    /// Returns the latest value.
    pub fn current_value(&self) -> Option<&C::Output> {
        self.history.last()
    }

    /// Returns the computed values with the close time of their bucket.
    pub fn values(&self) -> &ValueHistory<C::Output> {
        &self.history
    }

    /// Feeds an hourly candle.
    ///
    /// When the candle extends the last bucket, the value of that bucket is recomputed and
    /// replaces the previous one.
    ///
    /// ### Returns
    /// The new value, or `None` while the window is not full.
    pub fn process(&mut self, candle: &Candle) -> Result<Option<C::Output>> {
        if self.window.push(candle)? == Slot::Merged {
            self.history.pop_last();
        }

        if !self.window.is_full() {
            return Ok(None);
        }

        let buckets = self.window.as_slice();
        let value = self.calculator.calculate(buckets)?;
        let timestamp: DateTime<Utc> = buckets.last().map(Candle::close_time).unwrap_or(candle.close_time());

        trace!(indicator = self.calculator.name(), value = ?value, "Indicator updated");
        self.history.push(timestamp, value.clone());

        Ok(Some(value))
    }
}

/// Fails with [`Error::EmptyInput`] for less than two data points.
pub(crate) fn validate_data(data: &[f64]) -> Result<()> {
    if data.len() <= 1 {
        return Err(Error::EmptyInput(data.len()));
    }
    Ok(())
}

/// Close prices of the buckets.
pub(crate) fn closes(window: &[Candle]) -> Vec<f64> {
    window.iter().map(Candle::close).collect()
}
