use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};

use crate::bar::{Bar, infer_bar_duration};
use crate::config::IntradayWindow;
use crate::constant::{ProfileError, SessionKind, WeekendPolicy};

/// A contiguous, chronologically ordered slice of bars belonging to one
/// session. An empty `bars` vec never reaches downstream computation.
#[derive(Debug, Clone)]
pub struct SessionRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub bars: Vec<Bar>,
}

#[derive(Debug, Clone, Copy)]
pub enum SessionRequest {
    /// The `count` most recent sessions whose key is at or before the
    /// cutoff, emitted oldest to newest.
    MostRecent {
        count: usize,
        end_at: Option<DateTime<Utc>>,
    },
    /// The `count` oldest sessions whose key is at or after `start_from`,
    /// emitted oldest to newest. Pins a historical stretch in place.
    FromDate {
        start_from: DateTime<Utc>,
        count: usize,
    },
    /// Every session intersecting the window; bars are filtered to the
    /// window before grouping.
    Window {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

/// Turns a bar stream into session ranges for one session kind. A request
/// that matches no bars returns an empty vec; callers treat that as data
/// not loaded yet, never as an error.
pub struct SessionSegmenter {
    kind: SessionKind,
    weekend_policy: WeekendPolicy,
    time_shift: Duration,
    intraday_windows: Vec<IntradayWindow>,
}

impl SessionSegmenter {
    pub fn new(
        kind: SessionKind,
        weekend_policy: WeekendPolicy,
        time_shift_minutes: i64,
        intraday_windows: Vec<IntradayWindow>,
    ) -> Self {
        Self {
            kind,
            weekend_policy,
            time_shift: Duration::minutes(time_shift_minutes),
            intraday_windows,
        }
    }

    pub fn segment(
        &self,
        bars: &[Bar],
        request: &SessionRequest,
    ) -> Result<Vec<SessionRange>, ProfileError> {
        match self.kind {
            SessionKind::Rectangle => Err(ProfileError::Configuration(
                "rectangle sessions are segmented from explicit bounds, not requests".to_string(),
            )),
            SessionKind::Intraday => {
                if self.intraday_windows.is_empty() {
                    return Err(ProfileError::Configuration(
                        "intraday segmentation requires at least one enabled window".to_string(),
                    ));
                }
                Ok(self.segment_intraday(bars, request))
            }
            _ => Ok(self.segment_calendar(bars, request)),
        }
    }

    fn segment_calendar(&self, bars: &[Bar], request: &SessionRequest) -> Vec<SessionRange> {
        let bar_duration = infer_bar_duration(bars);
        let window_request = matches!(request, SessionRequest::Window { .. });

        let mut groups: BTreeMap<NaiveDate, Vec<Bar>> = BTreeMap::new();
        for bar in self.request_scope(bars, request) {
            let shifted = bar.open_time + self.time_shift;
            if self.weekend_policy == WeekendPolicy::Ignore && is_weekend(shifted) {
                continue;
            }
            let key = self.calendar_key(shifted, window_request);
            groups.entry(key).or_default().push(bar.clone());
        }

        let selected = self.select_keys(groups.keys().copied().collect(), request);
        selected
            .into_iter()
            .filter_map(|key| groups.remove(&key))
            .map(|group| range_from_group(group, bar_duration))
            .collect()
    }

    fn segment_intraday(&self, bars: &[Bar], request: &SessionRequest) -> Vec<SessionRange> {
        let scoped: Vec<Bar> = self.request_scope(bars, request).cloned().collect();

        let mut days: BTreeSet<NaiveDate> = BTreeSet::new();
        for bar in &scoped {
            let shifted = bar.open_time + self.time_shift;
            if self.weekend_policy == WeekendPolicy::Ignore && is_weekend(shifted) {
                continue;
            }
            let mut date = shifted.date_naive();
            if self.weekend_policy == WeekendPolicy::Append && is_weekend(shifted) {
                date = next_monday(date);
            }
            days.insert(date);
        }

        let selected_days = self.select_keys(days.into_iter().collect(), request);

        let mut result = Vec::new();
        for window in &self.intraday_windows {
            let span = window_span(window);
            for &day in &selected_days {
                let start_of_day = day.and_hms_opt(0, 0, 0).expect("midnight is valid");
                let shifted_start =
                    DateTime::<Utc>::from_naive_utc_and_offset(start_of_day, Utc)
                        + signed_since_midnight(window.start);
                let shifted_end = shifted_start + span;

                let session_bars: Vec<Bar> = scoped
                    .iter()
                    .filter(|bar| {
                        let shifted = bar.open_time + self.time_shift;
                        shifted >= shifted_start && shifted < shifted_end
                    })
                    .cloned()
                    .collect();
                if session_bars.is_empty() {
                    continue;
                }

                result.push(SessionRange {
                    start: shifted_start - self.time_shift,
                    end: shifted_end - self.time_shift,
                    bars: session_bars,
                });
            }
        }

        result.sort_by_key(|range| range.start);
        result
    }

    fn request_scope<'a>(
        &self,
        bars: &'a [Bar],
        request: &SessionRequest,
    ) -> impl Iterator<Item = &'a Bar> {
        let window = match request {
            SessionRequest::Window { from, to } => Some((*from, *to)),
            SessionRequest::MostRecent { .. } | SessionRequest::FromDate { .. } => None,
        };
        bars.iter().filter(move |bar| match window {
            Some((from, to)) => bar.open_time >= from && bar.open_time <= to,
            None => true,
        })
    }

    /// Keys are emitted oldest to newest for every request form; the
    /// most-recent form trims to the newest `count` at or before the
    /// cutoff, the from-date form to the oldest `count` at or after it.
    fn select_keys(&self, keys: Vec<NaiveDate>, request: &SessionRequest) -> Vec<NaiveDate> {
        match request {
            SessionRequest::Window { .. } => keys,
            SessionRequest::MostRecent { count, end_at } => {
                let mut selected: Vec<NaiveDate> = keys
                    .into_iter()
                    .rev()
                    .filter(|key| match end_at {
                        Some(cutoff) => key_start(*key) <= *cutoff,
                        None => true,
                    })
                    .take(*count)
                    .collect();
                selected.reverse();
                selected
            }
            SessionRequest::FromDate { start_from, count } => keys
                .into_iter()
                .filter(|key| key_start(*key) >= *start_from)
                .take(*count)
                .collect(),
        }
    }

    fn calendar_key(&self, shifted: DateTime<Utc>, window_request: bool) -> NaiveDate {
        let date = shifted.date_naive();
        match self.kind {
            SessionKind::Daily | SessionKind::Intraday => {
                if self.weekend_policy == WeekendPolicy::Append && is_weekend(shifted) {
                    next_monday(date)
                } else {
                    date
                }
            }
            SessionKind::Weekly => {
                // Weeks start on Sunday, except when weekend bars are
                // ignored (nothing anchors Sunday then) and for window
                // requests, which group Monday-anchored.
                let anchor = if window_request || self.weekend_policy == WeekendPolicy::Ignore {
                    Weekday::Mon
                } else {
                    Weekday::Sun
                };
                week_start(date, anchor)
            }
            SessionKind::Monthly => date.with_day(1).expect("first of month is valid"),
            SessionKind::Quarterly => {
                let start_month = (date.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(date.year(), start_month, 1)
                    .expect("quarter start is valid")
            }
            SessionKind::Semiannual => {
                let start_month = if date.month() <= 6 { 1 } else { 7 };
                NaiveDate::from_ymd_opt(date.year(), start_month, 1)
                    .expect("half-year start is valid")
            }
            SessionKind::Annual => {
                NaiveDate::from_ymd_opt(date.year(), 1, 1).expect("year start is valid")
            }
            SessionKind::Rectangle => date,
        }
    }
}

/// Rectangle sessions take their bounds from the caller; the same call is
/// re-issued on every edit.
pub fn rectangle_range(bars: &[Bar], start: DateTime<Utc>, end: DateTime<Utc>) -> SessionRange {
    SessionRange {
        start,
        end,
        bars: bars
            .iter()
            .filter(|bar| bar.open_time >= start && bar.open_time <= end)
            .cloned()
            .collect(),
    }
}

fn range_from_group(group: Vec<Bar>, bar_duration: Duration) -> SessionRange {
    let start = group[0].open_time;
    let end = group[group.len() - 1].open_time + bar_duration;
    SessionRange {
        start,
        end,
        bars: group,
    }
}

fn key_start(key: NaiveDate) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(
        key.and_hms_opt(0, 0, 0).expect("midnight is valid"),
        Utc,
    )
}

fn is_weekend(t: DateTime<Utc>) -> bool {
    matches!(t.weekday(), Weekday::Sat | Weekday::Sun)
}

fn next_monday(date: NaiveDate) -> NaiveDate {
    let days_until_monday = (7 - date.weekday().num_days_from_monday() as i64) % 7;
    date + Duration::days(days_until_monday)
}

fn week_start(date: NaiveDate, anchor: Weekday) -> NaiveDate {
    let offset = match anchor {
        Weekday::Sun => date.weekday().num_days_from_sunday(),
        _ => date.weekday().num_days_from_monday(),
    } as i64;
    date - Duration::days(offset)
}

fn window_span(window: &IntradayWindow) -> Duration {
    let start = signed_since_midnight(window.start);
    let end = signed_since_midnight(window.end);
    if end > start {
        end - start
    } else {
        end + Duration::days(1) - start
    }
}

fn signed_since_midnight(t: chrono::NaiveTime) -> Duration {
    t.signed_duration_since(chrono::NaiveTime::MIN)
}
