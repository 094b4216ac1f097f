use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::{
    engine::Candle,
    errors::{Error, Result},
    indicators::CandlestickPeriod,
    utils::hour_key,
};

/// Maximum number of values an indicator remembers.
pub const HISTORY_LIMIT: usize = 1000;

/// What [`CandleWindow::push`] did with a candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// The candle opened a new bucket.
    Appended,
    /// The candle was merged into the last bucket.
    Merged,
}

/// Rolling window of re-bucketed candles shared by every indicator.
///
/// The last entry is the bucket still being filled. At most `length` buckets are kept.
#[derive(Debug, Clone)]
pub struct CandleWindow {
    length: usize,
    period: CandlestickPeriod,
    buckets: VecDeque<Candle>,
    last_open_time: Option<DateTime<Utc>>,
}

impl CandleWindow {
    /// Creates an empty window.
    pub fn new(length: usize, period: CandlestickPeriod) -> Self {
        Self {
            length,
            period,
            buckets: VecDeque::with_capacity(length + 1),
            last_open_time: None,
        }
    }

    /// Number of buckets the window holds when full.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Returns `true` once the window holds `length` buckets.
    pub fn is_full(&self) -> bool {
        self.buckets.len() == self.length
    }

    /// Returns the bucket being filled.
    pub fn last(&self) -> Option<&Candle> {
        self.buckets.back()
    }

    /// Returns the buckets, oldest first.
    pub fn as_slice(&mut self) -> &[Candle] {
        self.buckets.make_contiguous()
    }

    /// Adds an hourly candle to the window.
    ///
    /// ### Returns
    /// Whether the candle opened or extended a bucket, or [`Error::SequenceViolation`] when the
    /// candle hour is not after the previous one.
    pub fn push(&mut self, candle: &Candle) -> Result<Slot> {
        if let Some(previous) = self.last_open_time {
            if hour_key(candle.open_time()) <= hour_key(previous) {
                return Err(Error::SequenceViolation {
                    previous,
                    current: candle.open_time(),
                });
            }
        }
        self.last_open_time = Some(candle.open_time());

        if let Some(bucket) = self.buckets.back_mut() {
            if self.period.same_bucket(bucket, candle) {
                *bucket = bucket.merge(candle);
                return Ok(Slot::Merged);
            }
        }

        self.buckets.push_back(candle.clone());
        if self.buckets.len() > self.length {
            self.buckets.pop_front();
        }

        Ok(Slot::Appended)
    }
}

/// Time-stamped values, oldest evicted first past [`HISTORY_LIMIT`].
#[derive(Debug, Clone)]
pub struct ValueHistory<T> {
    values: VecDeque<(DateTime<Utc>, T)>,
}

impl<T> Default for ValueHistory<T> {
    fn default() -> Self {
        Self {
            values: VecDeque::new(),
        }
    }
}

impl<T> ValueHistory<T> {
    pub(crate) fn push(&mut self, timestamp: DateTime<Utc>, value: T) {
        self.values.push_back((timestamp, value));
        if self.values.len() > HISTORY_LIMIT {
            self.values.pop_front();
        }
    }

    pub(crate) fn pop_last(&mut self) -> Option<(DateTime<Utc>, T)> {
        self.values.pop_back()
    }

    /// Returns the latest value.
    pub fn last(&self) -> Option<&T> {
        self.values.back().map(|(_, value)| value)
    }

    /// Returns the number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no value was computed yet.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over `(timestamp, value)` pairs, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &(DateTime<Utc>, T)> {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CandleBuilder;

    use chrono::Duration;

    fn candle_at(time: &str, close: f64) -> Candle {
        let open_time = DateTime::parse_from_rfc3339(time).unwrap().to_utc();
        CandleBuilder::builder()
            .open(close)
            .high(close)
            .low(close)
            .close(close)
            .volume(1.0)
            .open_time(open_time)
            .close_time(open_time + Duration::minutes(59))
            .build()
            .unwrap()
    }

    #[test]
    fn hourly_window_slides() {
        let mut window = CandleWindow::new(2, CandlestickPeriod::OneHour);
        assert_eq!(window.push(&candle_at("2021-01-01T00:00:00Z", 1.0)).unwrap(), Slot::Appended);
        assert!(!window.is_full());
        window.push(&candle_at("2021-01-01T01:00:00Z", 2.0)).unwrap();
        window.push(&candle_at("2021-01-01T02:00:00Z", 3.0)).unwrap();

        assert!(window.is_full());
        let closes = window.as_slice().iter().map(Candle::close).collect::<Vec<_>>();
        assert_eq!(closes, vec![2.0, 3.0]);
    }

    #[test]
    fn four_hour_buckets_merge() {
        let mut window = CandleWindow::new(3, CandlestickPeriod::FourHours);
        for hour in 0..6 {
            window
                .push(&candle_at(&format!("2021-01-01T{hour:02}:00:00Z"), hour as f64))
                .unwrap();
        }

        let buckets = window.as_slice();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].close(), 3.0);
        assert_eq!(buckets[0].volume(), 4.0);
        assert_eq!(buckets[1].open(), 4.0);
        assert_eq!(buckets[1].close(), 5.0);
    }

    #[test]
    fn daily_buckets_split_at_midnight() {
        let mut window = CandleWindow::new(2, CandlestickPeriod::OneDay);
        window.push(&candle_at("2021-01-01T22:00:00Z", 1.0)).unwrap();
        assert_eq!(window.push(&candle_at("2021-01-01T23:00:00Z", 2.0)).unwrap(), Slot::Merged);
        assert_eq!(window.push(&candle_at("2021-01-02T00:00:00Z", 3.0)).unwrap(), Slot::Appended);
    }

    #[test]
    fn duplicate_hour_is_a_sequence_violation() {
        let mut window = CandleWindow::new(2, CandlestickPeriod::OneHour);
        window.push(&candle_at("2021-01-01T05:00:00Z", 1.0)).unwrap();

        assert!(matches!(
            window.push(&candle_at("2021-01-01T05:00:00Z", 1.0)),
            Err(Error::SequenceViolation { .. })
        ));
        assert!(matches!(
            window.push(&candle_at("2021-01-01T04:00:00Z", 1.0)),
            Err(Error::SequenceViolation { .. })
        ));
    }

    #[test]
    fn history_is_bounded() {
        let mut history = ValueHistory::default();
        let start = DateTime::from_timestamp_secs(1515151515).unwrap();
        for i in 0..(HISTORY_LIMIT + 5) {
            history.push(start + Duration::hours(i as i64), i);
        }

        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history.iter().next().map(|(_, v)| *v), Some(5));
        assert_eq!(history.last(), Some(&(HISTORY_LIMIT + 4)));
    }
}
