use std::{fs::File, io::BufReader, path::Path};

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};

use crate::{engine::Candle, errors::Result};

/// Reads a JSON array of candles from `filepath`.
pub fn read_candles(filepath: &Path) -> Result<Vec<Candle>> {
    let file = File::open(filepath)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

/// Returns `true` for monthly data file names such as `2021-07.json`.
pub fn is_month_file(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".json") else {
        return false;
    };
    let Some((year, month)) = stem.split_once('-') else {
        return false;
    };

    year.len() == 4
        && year.starts_with("20")
        && year.chars().all(|c| c.is_ascii_digit())
        && month.len() == 2
        && month.parse::<u32>().is_ok_and(|m| (1..=12).contains(&m))
}

/// Key used to order hourly candles: calendar date and hour of day.
pub fn hour_key(time: DateTime<Utc>) -> (NaiveDate, u32) {
    (time.date_naive(), time.hour())
}

/// Number of calendar month boundaries between `earlier` and `later`.
pub fn calendar_months_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i32 {
    (later.year() - earlier.year()) * 12 + later.month() as i32 - earlier.month() as i32
}

#[cfg(test)]
#[test]
fn month_file_names() {
    assert!(is_month_file("2021-01.json"));
    assert!(is_month_file("2024-12.json"));
    assert!(!is_month_file("2024-13.json"));
    assert!(!is_month_file("1999-01.json"));
    assert!(!is_month_file("2021-1.json"));
    assert!(!is_month_file("2021-01.txt"));
}

#[cfg(test)]
#[test]
fn months_between() {
    let jan = DateTime::parse_from_rfc3339("2021-01-31T23:00:00Z").unwrap().to_utc();
    let feb = DateTime::parse_from_rfc3339("2021-02-01T00:00:00Z").unwrap().to_utc();
    let next_jan = DateTime::parse_from_rfc3339("2022-01-01T00:00:00Z").unwrap().to_utc();

    assert_eq!(calendar_months_between(jan, feb), 1);
    assert_eq!(calendar_months_between(jan, next_jan), 12);
    assert_eq!(calendar_months_between(feb, jan), -1);
}
