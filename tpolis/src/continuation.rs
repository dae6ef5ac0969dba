use chrono::{DateTime, Utc};

use crate::analytics;
use crate::constant::{ContinuationPolicy, LevelKind};
use crate::model::ProfileModel;

/// A forward-extending level emitted by one session. `terminal` is `None`
/// while the level runs unbounded.
#[derive(Debug, Clone)]
pub struct LevelRay {
    pub session_index: usize,
    pub kind: LevelKind,
    pub price: f64,
    pub anchor_time: Option<DateTime<Utc>>,
    pub terminal: Option<DateTime<Utc>>,
}

const LEVEL_KINDS: [LevelKind; 3] = [
    LevelKind::PointOfControl,
    LevelKind::ValueAreaHigh,
    LevelKind::ValueAreaLow,
];

/// Decides where each session's POC/VAH/VAL terminates against later
/// sessions. `sessions` must be ordered oldest to newest. A level hits the
/// first later session whose full matrix price extent contains its price;
/// the policy then decides whether that hit truncates the ray.
pub fn continue_levels(sessions: &[&ProfileModel], policy: ContinuationPolicy) -> Vec<LevelRay> {
    let mut rays = Vec::with_capacity(sessions.len() * LEVEL_KINDS.len());

    for (index, session) in sessions.iter().enumerate() {
        let anchor_time = analytics::poc_row_end_time(&session.matrix);
        for kind in LEVEL_KINDS {
            let price = level_price(session, kind);
            rays.push(LevelRay {
                session_index: index,
                kind,
                price,
                anchor_time,
                terminal: terminal_for(sessions, index, price, policy),
            });
        }
    }

    rays
}

fn level_price(model: &ProfileModel, kind: LevelKind) -> f64 {
    match kind {
        LevelKind::PointOfControl => model.point_of_control,
        LevelKind::ValueAreaHigh => model.value_area_high,
        LevelKind::ValueAreaLow => model.value_area_low,
    }
}

fn terminal_for(
    sessions: &[&ProfileModel],
    index: usize,
    price: f64,
    policy: ContinuationPolicy,
) -> Option<DateTime<Utc>> {
    for (next_index, next_session) in sessions.iter().enumerate().skip(index + 1) {
        let bottom = next_session.matrix.bottom_price();
        let top = next_session.matrix.top_price();
        if price < bottom || price > top {
            continue;
        }

        // First containing session decides; farther sessions are never
        // consulted.
        return match policy {
            ContinuationPolicy::StopNone => None,
            ContinuationPolicy::StopAll => Some(next_session.start_time),
            ContinuationPolicy::StopAllExceptNext => {
                if next_index == index + 1 {
                    None
                } else {
                    Some(next_session.start_time)
                }
            }
            ContinuationPolicy::StopOnlyNext => {
                if next_index == index + 1 {
                    Some(next_session.start_time)
                } else {
                    None
                }
            }
        };
    }

    None
}
