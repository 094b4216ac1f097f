use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Direction of a candle body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Close is greater than or equal to open.
    Up,
    /// Close is below open.
    Down,
}

/// Raw JSON layout of a persisted hourly candle.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct CandleRecord {
    open_time: DateTime<Utc>,
    #[serde(alias = "open")]
    open_price: f64,
    #[serde(alias = "high")]
    high_price: f64,
    #[serde(alias = "low")]
    low_price: f64,
    #[serde(alias = "close")]
    close_price: f64,
    volume: f64,
    close_time: DateTime<Utc>,
}

/// OHLCV price record for one time interval.
///
/// A candle can only be obtained through [`CandleBuilder`] (or deserialization, which goes
/// through the builder), so `open_time < close_time` and `low <= high` always hold.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "CandleRecord", into = "CandleRecord")]
pub struct Candle {
    open_time: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    close_time: DateTime<Utc>,
}

impl TryFrom<CandleRecord> for Candle {
    type Error = Error;

    fn try_from(record: CandleRecord) -> Result<Self> {
        CandleBuilder::builder()
            .open(record.open_price)
            .high(record.high_price)
            .low(record.low_price)
            .close(record.close_price)
            .volume(record.volume)
            .open_time(record.open_time)
            .close_time(record.close_time)
            .build()
    }
}

impl From<Candle> for CandleRecord {
    fn from(candle: Candle) -> Self {
        Self {
            open_time: candle.open_time,
            open_price: candle.open,
            high_price: candle.high,
            low_price: candle.low,
            close_price: candle.close,
            volume: candle.volume,
            close_time: candle.close_time,
        }
    }
}

impl Candle {
    /// Returns the open price.
    pub fn open(&self) -> f64 {
        self.open
    }

    /// Returns the highest price.
    pub fn high(&self) -> f64 {
        self.high
    }

    /// Returns the lowest price.
    pub fn low(&self) -> f64 {
        self.low
    }

    /// Returns the close price.
    pub fn close(&self) -> f64 {
        self.close
    }

    /// Returns the traded volume.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Returns the open time.
    pub fn open_time(&self) -> DateTime<Utc> {
        self.open_time
    }

    /// Returns the close time.
    pub fn close_time(&self) -> DateTime<Utc> {
        self.close_time
    }

    /// Returns whether the candle closed above or below its open.
    pub fn direction(&self) -> Direction {
        if self.open <= self.close {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    /// Merges a later candle into this one.
    ///
    /// The open side comes from `self`, the close side from `next`, the extremes are combined
    /// and the volumes are summed.
    pub fn merge(&self, next: &Candle) -> Candle {
        Candle {
            open_time: self.open_time,
            open: self.open,
            high: self.high.max(next.high),
            low: self.low.min(next.low),
            close: next.close,
            volume: self.volume + next.volume,
            close_time: next.close_time,
        }
    }
}

/// Builder of [`Candle`].
#[derive(Debug, Default)]
pub struct CandleBuilder {
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
    open_time: Option<DateTime<Utc>>,
    close_time: Option<DateTime<Utc>>,
}

impl CandleBuilder {
    /// Starts an empty builder.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Sets the open price.
    pub fn open(mut self, open: f64) -> Self {
        self.open = Some(open);
        self
    }

    /// Sets the highest price.
    pub fn high(mut self, high: f64) -> Self {
        self.high = Some(high);
        self
    }

    /// Sets the lowest price.
    pub fn low(mut self, low: f64) -> Self {
        self.low = Some(low);
        self
    }

    /// Sets the close price.
    pub fn close(mut self, close: f64) -> Self {
        self.close = Some(close);
        self
    }

    /// Sets the traded volume.
    pub fn volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Sets the open time.
    pub fn open_time(mut self, open_time: DateTime<Utc>) -> Self {
        self.open_time = Some(open_time);
        self
    }

    /// Sets the close time.
    pub fn close_time(mut self, close_time: DateTime<Utc>) -> Self {
        self.close_time = Some(close_time);
        self
    }

    /// Validates the fields and returns the candle.
    ///
    /// ### Returns
    /// An error if a field is missing, if `open_time >= close_time` or if `low > high`.
    pub fn build(self) -> Result<Candle> {
        let missing = |field: &str| Error::InvalidCandle(format!("missing {field}"));

        let open = self.open.ok_or_else(|| missing("open"))?;
        let high = self.high.ok_or_else(|| missing("high"))?;
        let low = self.low.ok_or_else(|| missing("low"))?;
        let close = self.close.ok_or_else(|| missing("close"))?;
        let volume = self.volume.ok_or_else(|| missing("volume"))?;
        let open_time = self.open_time.ok_or_else(|| missing("open time"))?;
        let close_time = self.close_time.ok_or_else(|| missing("close time"))?;

        if open_time >= close_time {
            return Err(Error::InvalidCandle(format!(
                "open time {open_time} is not before close time {close_time}"
            )));
        }

        if low > high {
            return Err(Error::InvalidCandle(format!("low {low} is above high {high}")));
        }

        Ok(Candle {
            open_time,
            open,
            high,
            low,
            close,
            volume,
            close_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    fn hour(offset: i64) -> CandleBuilder {
        let open_time = DateTime::from_timestamp_secs(1515151515).unwrap() + Duration::hours(offset);
        CandleBuilder::builder()
            .open_time(open_time)
            .close_time(open_time + Duration::minutes(59))
    }

    #[test]
    fn build_valid_candle() {
        let candle = hour(0)
            .open(100.0)
            .high(110.0)
            .low(90.0)
            .close(105.0)
            .volume(3.0)
            .build()
            .unwrap();

        assert_eq!(candle.open(), 100.0);
        assert_eq!(candle.high(), 110.0);
        assert_eq!(candle.low(), 90.0);
        assert_eq!(candle.close(), 105.0);
        assert_eq!(candle.volume(), 3.0);
        assert_eq!(candle.direction(), Direction::Up);
    }

    #[test]
    fn build_rejects_missing_field() {
        let result = hour(0).open(100.0).high(110.0).low(90.0).volume(1.0).build();
        assert!(matches!(result, Err(Error::InvalidCandle(_))));
    }

    #[test]
    fn build_rejects_reversed_times() {
        let now = DateTime::from_timestamp_secs(1515151515).unwrap();
        let result = CandleBuilder::builder()
            .open(1.0)
            .high(1.0)
            .low(1.0)
            .close(1.0)
            .volume(1.0)
            .open_time(now)
            .close_time(now)
            .build();
        assert!(matches!(result, Err(Error::InvalidCandle(_))));
    }

    #[test]
    fn build_rejects_low_above_high() {
        let result = hour(0).open(1.0).high(1.0).low(2.0).close(1.0).volume(1.0).build();
        assert!(matches!(result, Err(Error::InvalidCandle(_))));
    }

    #[test]
    fn direction_down() {
        let candle = hour(0).open(105.0).high(110.0).low(90.0).close(100.0).volume(1.0).build().unwrap();
        assert_eq!(candle.direction(), Direction::Down);
    }

    #[test]
    fn merge_keeps_open_side_and_sums_volume() {
        let first = hour(0).open(100.0).high(110.0).low(95.0).close(105.0).volume(1.0).build().unwrap();
        let second = hour(1).open(105.0).high(120.0).low(99.0).close(101.0).volume(2.0).build().unwrap();
        let merged = first.merge(&second);

        assert_eq!(merged.open(), 100.0);
        assert_eq!(merged.high(), 120.0);
        assert_eq!(merged.low(), 95.0);
        assert_eq!(merged.close(), 101.0);
        assert_eq!(merged.volume(), 3.0);
        assert_eq!(merged.open_time(), first.open_time());
        assert_eq!(merged.close_time(), second.close_time());
    }

    #[test]
    fn deserialize_validates_through_builder() {
        let json = r#"{
            "openTime": "2021-01-01T00:00:00Z",
            "openPrice": 100.0,
            "highPrice": 110.0,
            "lowPrice": 90.0,
            "closePrice": 105.0,
            "volume": 12.5,
            "closeTime": "2021-01-01T00:59:59.999Z"
        }"#;
        let candle: Candle = serde_json::from_str(json).unwrap();
        assert_eq!(candle.volume(), 12.5);

        let broken = json.replace("\"lowPrice\": 90.0", "\"lowPrice\": 190.0");
        assert!(serde_json::from_str::<Candle>(&broken).is_err());
    }
}
