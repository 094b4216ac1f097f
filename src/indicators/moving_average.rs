use serde::{Deserialize, Serialize};

use crate::{
    engine::Candle,
    errors::Result,
    indicators::{Calculate, CandlestickPeriod, Indicator, IndicatorSettings, closes, validate_data},
};

/// Arithmetic mean of `prices`.
pub fn sma(prices: &[f64]) -> Result<f64> {
    validate_data(prices)?;
    Ok(prices.iter().sum::<f64>() / prices.len() as f64)
}

/// Exponential moving average with `alpha = 2 / (n + 1)`, seeded with the first price.
pub fn ema(prices: &[f64]) -> Result<f64> {
    validate_data(prices)?;
    Ok(ema_unchecked(prices))
}

pub(crate) fn ema_unchecked(prices: &[f64]) -> f64 {
    let alpha = 2.0 / (prices.len() as f64 + 1.0);
    prices
        .iter()
        .skip(1)
        .fold(prices.first().copied().unwrap_or_default(), |ema, price| {
            alpha * price + (1.0 - alpha) * ema
        })
}

/// Volume weighted average of `prices`.
///
/// Without any volume every price weighs the same.
pub fn vwma(prices: &[f64], volumes: &[f64]) -> Result<f64> {
    validate_data(prices)?;

    let volume = volumes.iter().sum::<f64>();
    if volume == 0.0 {
        return sma(prices);
    }

    let weighted = prices.iter().zip(volumes).map(|(price, volume)| price * volume).sum::<f64>();
    Ok(weighted / volume)
}

/// Moving average flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovingAverageKind {
    /// Simple moving average.
    Sma,
    /// Exponential moving average.
    Ema,
    /// Volume weighted moving average.
    Vwma,
}

impl MovingAverageKind {
    /// Builds a moving average indicator of this kind.
    pub fn indicator(self, settings: IndicatorSettings) -> Result<Indicator<MovingAverage>> {
        Indicator::new(MovingAverage { kind: self }, settings)
    }
}

/// Moving average calculator selected by [`MovingAverageKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovingAverage {
    kind: MovingAverageKind,
}

impl MovingAverage {
    /// Returns the flavour.
    pub fn kind(&self) -> MovingAverageKind {
        self.kind
    }
}

impl Calculate for MovingAverage {
    type Output = f64;

    fn name(&self) -> &'static str {
        match self.kind {
            MovingAverageKind::Sma => "SMA",
            MovingAverageKind::Ema => "EMA",
            MovingAverageKind::Vwma => "VWMA",
        }
    }

    fn calculate(&self, window: &[Candle]) -> Result<f64> {
        let prices = closes(window);
        match self.kind {
            MovingAverageKind::Sma => sma(&prices),
            MovingAverageKind::Ema => ema(&prices),
            MovingAverageKind::Vwma => {
                let volumes = window.iter().map(Candle::volume).collect::<Vec<_>>();
                vwma(&prices, &volumes)
            }
        }
    }
}

/// Unit of a moving average period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    /// Daily buckets.
    Days,
    /// Hourly buckets.
    Hours,
}

impl From<PeriodKind> for CandlestickPeriod {
    fn from(kind: PeriodKind) -> Self {
        match kind {
            PeriodKind::Days => CandlestickPeriod::OneDay,
            PeriodKind::Hours => CandlestickPeriod::OneHour,
        }
    }
}

/// Moving average window expressed in days or hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovingAverageSettings {
    /// Number of days or hours.
    pub period: usize,
    /// Unit of `period`.
    pub period_kind: PeriodKind,
}

impl From<MovingAverageSettings> for IndicatorSettings {
    fn from(settings: MovingAverageSettings) -> Self {
        IndicatorSettings::new(settings.period, settings.period_kind.into())
    }
}
