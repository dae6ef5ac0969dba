//! Serializable payloads for offline profile exports.

use serde::Serialize;
use tpolis::{LevelKind, LevelRay, ProfileModel, ProfileSession};

#[derive(Debug, Serialize)]
pub struct ExportPayload {
    pub session_kind: String,
    pub sessions: Vec<SessionPoint>,
    pub levels: Vec<LevelPoint>,
}

#[derive(Debug, Serialize)]
pub struct SessionPoint {
    pub start: i64,
    pub end: i64,
    pub skipped: bool,
    pub point_of_control: Option<f64>,
    pub value_area_high: Option<f64>,
    pub value_area_low: Option<f64>,
    pub median: Option<f64>,
    pub tpo_count_above: Option<usize>,
    pub tpo_count_below: Option<usize>,
    pub is_prominent: Option<bool>,
    pub single_prints: Vec<SinglePrintPoint>,
    pub rows: Vec<RowPoint>,
    pub developing: Vec<DevelopingPoint>,
}

#[derive(Debug, Serialize)]
pub struct SinglePrintPoint {
    pub start: i64,
    pub end: i64,
    pub high: f64,
    pub low: f64,
}

#[derive(Debug, Serialize)]
pub struct RowPoint {
    pub bottom: f64,
    pub top: f64,
    pub tpo_count: usize,
}

#[derive(Debug, Serialize)]
pub struct DevelopingPoint {
    pub time: i64,
    pub poc: f64,
    pub vah: f64,
    pub val: f64,
}

#[derive(Debug, Serialize)]
pub struct LevelPoint {
    pub session_index: usize,
    pub kind: String,
    pub price: f64,
    pub anchor: Option<i64>,
    pub terminal: Option<i64>,
}

pub fn session_point(session: &ProfileSession) -> SessionPoint {
    let model = session.model.as_ref();
    SessionPoint {
        start: session.range.start.timestamp_millis(),
        end: session.range.end.timestamp_millis(),
        skipped: model.is_none(),
        point_of_control: model.map(|m| m.point_of_control),
        value_area_high: model.map(|m| m.value_area_high),
        value_area_low: model.map(|m| m.value_area_low),
        median: model.map(|m| m.median),
        tpo_count_above: model.map(|m| m.tpo_count_above),
        tpo_count_below: model.map(|m| m.tpo_count_below),
        is_prominent: model.map(|m| m.is_prominent),
        single_prints: model.map(single_print_points).unwrap_or_default(),
        rows: model.map(row_points).unwrap_or_default(),
        developing: model.map(developing_points).unwrap_or_default(),
    }
}

fn single_print_points(model: &ProfileModel) -> Vec<SinglePrintPoint> {
    model
        .single_prints
        .iter()
        .map(|band| SinglePrintPoint {
            start: band.start_time.timestamp_millis(),
            end: band.end_time.timestamp_millis(),
            high: band.high,
            low: band.low,
        })
        .collect()
}

fn row_points(model: &ProfileModel) -> Vec<RowPoint> {
    (0..model.matrix.rows())
        .map(|row| {
            let (bottom, top) = model.matrix.row_band(row);
            RowPoint {
                bottom,
                top,
                tpo_count: model.matrix.row_count(row),
            }
        })
        .collect()
}

/// Settled developing values only; the in-flight last entry stays out of
/// exported payloads.
fn developing_points(model: &ProfileModel) -> Vec<DevelopingPoint> {
    let poc = model.developing_poc.settled();
    let vah = model.developing_area_high.settled();
    let val = model.developing_area_low.settled();

    poc.iter()
        .zip(vah.iter())
        .zip(val.iter())
        .map(|(((time, poc), (_, vah)), (_, val))| DevelopingPoint {
            time: time.timestamp_millis(),
            poc: *poc,
            vah: *vah,
            val: *val,
        })
        .collect()
}

pub fn level_point(ray: &LevelRay) -> LevelPoint {
    LevelPoint {
        session_index: ray.session_index,
        kind: match ray.kind {
            LevelKind::PointOfControl => "poc".to_string(),
            LevelKind::ValueAreaHigh => "vah".to_string(),
            LevelKind::ValueAreaLow => "val".to_string(),
        },
        price: ray.price,
        anchor: ray.anchor_time.map(|t| t.timestamp_millis()),
        terminal: ray.terminal.map(|t| t.timestamp_millis()),
    }
}
