use serde::{Deserialize, Serialize};

use crate::{
    engine::Candle,
    errors::{Error, Result},
    indicators::{Calculate, closes, sma},
};

/// Average of the window with bands at `multiplier` standard deviations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bands {
    /// Average plus `multiplier` deviations.
    pub upper: f64,
    /// Simple moving average.
    pub average: f64,
    /// Average minus `multiplier` deviations.
    pub lower: f64,
}

/// Bollinger bands calculator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    multiplier: f64,
}

impl BollingerBands {
    /// Creates the calculator, usually with a multiplier of 2.
    pub fn new(multiplier: f64) -> Result<Self> {
        if !(multiplier > 0.0) {
            return Err(Error::InvalidSettings(format!(
                "bollinger multiplier must be positive (got: {multiplier})"
            )));
        }
        Ok(Self { multiplier })
    }

    /// Computes the bands of `prices`, standard deviation with an `n - 1` denominator.
    pub fn bands(&self, prices: &[f64]) -> Result<Bands> {
        let average = sma(prices)?;
        let squares = prices.iter().map(|price| (price - average).powi(2)).sum::<f64>();
        let deviation = (squares / (prices.len() as f64 - 1.0)).sqrt();

        Ok(Bands {
            upper: average + deviation * self.multiplier,
            average,
            lower: average - deviation * self.multiplier,
        })
    }
}

impl Calculate for BollingerBands {
    type Output = Bands;

    fn name(&self) -> &'static str {
        "BB"
    }

    fn calculate(&self, window: &[Candle]) -> Result<Bands> {
        self.bands(&closes(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::tests::{assert_approx, hourly};
    use crate::indicators::{CandlestickPeriod, Indicator, IndicatorSettings};

    #[test]
    fn sample_deviation() {
        // mean 5, squares sum 32, sample variance 32 / 7
        let prices = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let bands = BollingerBands::new(2.0).unwrap().bands(&prices).unwrap();
        let deviation = (32.0_f64 / 7.0).sqrt();

        assert_approx(bands.average, 5.0);
        assert_approx(bands.upper, 5.0 + 2.0 * deviation);
        assert_approx(bands.lower, 5.0 - 2.0 * deviation);
    }

    #[test]
    fn flat_market_collapses_the_bands() {
        let settings = IndicatorSettings::new(3, CandlestickPeriod::OneHour);
        let mut indicator = Indicator::new(BollingerBands::new(2.0).unwrap(), settings).unwrap();

        let mut bands = None;
        for candle in hourly(&[10.0; 4]) {
            bands = indicator.process(&candle).unwrap();
        }

        let bands = bands.unwrap();
        assert_eq!(bands.upper, bands.lower);
        assert_approx(bands.average, 10.0);
    }

    #[test]
    fn invalid_multiplier() {
        assert!(BollingerBands::new(0.0).is_err());
    }
}
