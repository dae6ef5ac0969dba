use chrono::{DateTime, Utc};

use crate::matrix::TpoMatrix;

/// Provisional per-bar values, keyed by the bar open time that produced
/// them. `f64::NAN` marks a column where the value was not yet defined.
#[derive(Debug, Clone, Default)]
pub struct DevelopingSeries {
    points: Vec<(DateTime<Utc>, f64)>,
}

impl DevelopingSeries {
    pub(crate) fn push(&mut self, time: DateTime<Utc>, value: f64) {
        self.points.push((time, value));
    }

    pub fn points(&self) -> &[(DateTime<Utc>, f64)] {
        &self.points
    }

    /// All points except the last one. The final entry reflects a bar that
    /// may still be changing, so exported series drop it here rather than
    /// inside the builder.
    pub fn settled(&self) -> &[(DateTime<Utc>, f64)] {
        match self.points.len() {
            0 => &[],
            n => &self.points[..n - 1],
        }
    }

    pub fn last_value(&self) -> Option<f64> {
        self.points.last().map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A maximal run of contiguous rows that each hold exactly one TPO.
#[derive(Debug, Clone)]
pub struct SinglePrintBand {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub high: f64,
    pub low: f64,
    pub top_row: usize,
    pub bottom_row: usize,
}

/// The immutable analytic snapshot of one finished (or still-open) session.
/// Recomputation replaces the whole model, it never mutates fields.
#[derive(Debug, Clone)]
pub struct ProfileModel {
    pub matrix: TpoMatrix,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub point_of_control: f64,
    pub value_area_high: f64,
    pub value_area_low: f64,
    pub median: f64,
    pub tpo_count_above: usize,
    pub tpo_count_below: usize,
    pub is_prominent: bool,
    pub single_prints: Vec<SinglePrintBand>,
    pub developing_poc: DevelopingSeries,
    pub developing_area_high: DevelopingSeries,
    pub developing_area_low: DevelopingSeries,
}
