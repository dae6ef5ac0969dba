use chrono::{DateTime, Duration, Utc};

use crate::constant::Direction;

/// One OHLC observation. Bars are immutable inputs; the engine never
/// mutates them.
#[derive(Debug, Clone)]
pub struct Bar {
    pub open_time: DateTime<Utc>,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
}

impl Bar {
    pub fn direction(&self) -> Direction {
        if self.close_price > self.open_price {
            Direction::Up
        } else {
            Direction::Down
        }
    }
}

/// Smallest positive spacing between consecutive bars. The feed is
/// gap-tolerant, so the minimum delta is the actual bar width while larger
/// deltas are gaps. Falls back to one minute when the input has fewer than
/// two bars.
pub fn infer_bar_duration(bars: &[Bar]) -> Duration {
    let mut smallest: Option<Duration> = None;
    for pair in bars.windows(2) {
        let delta = pair[1].open_time - pair[0].open_time;
        if delta <= Duration::zero() {
            continue;
        }
        smallest = Some(match smallest {
            None => delta,
            Some(current) if delta < current => delta,
            Some(current) => current,
        });
    }
    smallest.unwrap_or_else(|| Duration::minutes(1))
}

pub(crate) fn session_high(bars: &[Bar]) -> f64 {
    bars.iter().map(|x| x.high_price).fold(f64::MIN, f64::max)
}

pub(crate) fn session_low(bars: &[Bar]) -> f64 {
    bars.iter().map(|x| x.low_price).fold(f64::MAX, f64::min)
}
