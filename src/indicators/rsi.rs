use crate::{
    engine::Candle,
    errors::Result,
    indicators::{Calculate, closes, ema_unchecked, validate_data},
};

/// Relative strength index of `prices`, between 0 and 100.
///
/// Gains and losses between consecutive prices are smoothed with an exponential moving
/// average. Without any loss the index is 100.
pub fn rsi(prices: &[f64]) -> Result<f64> {
    validate_data(prices)?;

    let (gains, losses): (Vec<f64>, Vec<f64>) = prices
        .windows(2)
        .map(|pair| {
            let delta = pair[1] - pair[0];
            (delta.max(0.0), (-delta).max(0.0))
        })
        .unzip();

    let gain = ema_unchecked(&gains);
    let loss = ema_unchecked(&losses);

    if loss == 0.0 {
        return Ok(100.0);
    }

    Ok(100.0 - 100.0 / (1.0 + gain / loss))
}

/// RSI calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rsi;

impl Calculate for Rsi {
    type Output = f64;

    fn name(&self) -> &'static str {
        "RSI"
    }

    fn calculate(&self, window: &[Candle]) -> Result<f64> {
        rsi(&closes(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::indicators::tests::{assert_approx, hourly};
    use crate::indicators::{CandlestickPeriod, Indicator, IndicatorSettings};

    #[test]
    fn rising_market() {
        assert_eq!(rsi(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap(), 100.0);
    }

    #[test]
    fn falling_market() {
        assert_approx(rsi(&[5.0, 4.0, 3.0, 2.0, 1.0]).unwrap(), 0.0);
    }

    #[test]
    fn flat_market() {
        assert_eq!(rsi(&[3.0, 3.0, 3.0]).unwrap(), 100.0);
    }

    #[test]
    fn mixed_market() {
        // gains [2, 0], losses [0, 1], alpha 2/3: gain 2/3, loss 2/3
        assert_approx(rsi(&[1.0, 3.0, 2.0]).unwrap(), 50.0);
    }

    #[test]
    fn needs_two_prices() {
        assert!(matches!(rsi(&[1.0]), Err(Error::EmptyInput(1))));
    }

    #[test]
    fn streaming_rsi() {
        let settings = IndicatorSettings::new(3, CandlestickPeriod::OneHour);
        let mut indicator = Indicator::new(Rsi, settings).unwrap();

        let values = hourly(&[1.0, 2.0, 3.0, 2.0])
            .iter()
            .map(|candle| indicator.process(candle).unwrap())
            .collect::<Vec<_>>();

        assert_eq!(values[..2], [None, None]);
        assert_eq!(values[2], Some(100.0));
        assert!(values[3].unwrap() < 100.0);
    }
}
