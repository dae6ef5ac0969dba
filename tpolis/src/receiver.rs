use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::bar::Bar;
use crate::constant::ProfileError;

/// Append-only, chronologically ordered bar store. The engine consumes
/// plain slices; this is the bookkeeping a replay harness or test needs to
/// simulate a live feed, including touch-ups to the still-open bar.
#[derive(Debug, Default)]
pub struct BarSeries {
    rows: Vec<Bar>,
}

impl BarSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bars(rows: Vec<Bar>) -> Self {
        Self { rows }
    }

    /// Out-of-order input is dropped with a warning; the profile
    /// algorithms are order-dependent and never reorder on behalf of the
    /// feed.
    pub fn append(&mut self, bar: Bar) {
        if let Some(last) = self.rows.last() {
            if bar.open_time <= last.open_time {
                warn!(
                    open_time = %bar.open_time,
                    "dropping out-of-order bar"
                );
                return;
            }
        }
        self.rows.push(bar);
    }

    /// Widens the open bar's range in place, as a feed does while the bar
    /// is still forming.
    pub fn update_last(&mut self, high_price: f64, low_price: f64, close_price: f64) {
        if let Some(last) = self.rows.last_mut() {
            last.high_price = last.high_price.max(high_price);
            last.low_price = last.low_price.min(low_price);
            last.close_price = close_price;
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct CsvBarRow {
    datetime: String,
    #[serde(alias = "open")]
    open_price: f64,
    #[serde(alias = "high")]
    high_price: f64,
    #[serde(alias = "low")]
    low_price: f64,
    #[serde(alias = "close")]
    close_price: f64,
}

pub fn load_bars_csv(file_path: impl AsRef<Path>) -> Result<Vec<Bar>, ProfileError> {
    let mut reader = csv::Reader::from_path(file_path)?;
    let mut out = Vec::new();

    for row in reader.deserialize::<CsvBarRow>() {
        let row = row?;
        out.push(Bar {
            open_time: parse_datetime(&row.datetime)?,
            open_price: row.open_price,
            high_price: row.high_price,
            low_price: row.low_price,
            close_price: row.close_price,
        });
    }

    Ok(out)
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>, ProfileError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    let patterns = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y/%m/%d %H:%M:%S%.f",
        "%Y%m%d%H%M%S%.f",
    ];

    for pattern in patterns {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, pattern) {
            return Ok(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
        }
    }

    Err(ProfileError::InvalidDatetime(value.to_string()))
}
