use chrono::{DateTime, Datelike, Duration, Utc};
use tracing::{error, warn};

use crate::bar::{Bar, infer_bar_duration, session_high, session_low};
use crate::config::{IntradayWindow, ProfileConfig};
use crate::constant::{EventType, ProfileError, SessionKind};
use crate::continuation::{LevelRay, continue_levels};
use crate::events::{EventPayload, Observable, Subscriber};
use crate::matrix::{BuildError, TpoMatrixBuilder};
use crate::model::ProfileModel;
use crate::session::{SessionRange, SessionRequest, SessionSegmenter, rectangle_range};

/// One tracked session. `model` stays `None` when the build was skipped
/// (degenerate range) or withheld (invariant violation); consumers read
/// only the finished models.
pub struct ProfileSession {
    pub range: SessionRange,
    pub model: Option<ProfileModel>,
}

/// Caller-owned session context. The engine holds no ambient state beyond
/// what the caller constructed it with; every computation is triggered by
/// an explicit call and runs to completion before the next is accepted.
pub struct ProfileEngine {
    config: ProfileConfig,
    segmenter: SessionSegmenter,
    sessions: Vec<ProfileSession>,
    observable: Observable,
    anchored: bool,
}

impl ProfileEngine {
    pub fn new(config: ProfileConfig) -> Result<Self, ProfileError> {
        config.validate()?;
        let segmenter = SessionSegmenter::new(
            config.session_kind,
            config.weekend_policy,
            config.time_shift_minutes,
            config.intraday_windows.clone(),
        );
        Ok(Self {
            config,
            segmenter,
            sessions: Vec::new(),
            observable: Observable::default(),
            anchored: false,
        })
    }

    pub fn config(&self) -> &ProfileConfig {
        &self.config
    }

    pub fn subscribe(&mut self, event_type: Option<EventType>, subscriber: Subscriber) {
        self.observable.subscribe(event_type, subscriber);
    }

    pub fn sessions(&self) -> &[ProfileSession] {
        &self.sessions
    }

    pub fn finished_models(&self) -> Vec<&ProfileModel> {
        self.sessions
            .iter()
            .filter_map(|session| session.model.as_ref())
            .collect()
    }

    /// Drops all tracked sessions and builds the `count` most recent ones
    /// ending at or before the cutoff. An empty segmentation result means
    /// the data is not loaded yet; the engine keeps zero sessions and the
    /// caller retries on the next event.
    pub fn set_sessions(
        &mut self,
        bars: &[Bar],
        count: usize,
        end_at: Option<DateTime<Utc>>,
    ) -> Result<(), ProfileError> {
        let ranges = self
            .segmenter
            .segment(bars, &SessionRequest::MostRecent { count, end_at })?;
        self.anchored = false;
        self.replace_sessions(bars, ranges);
        Ok(())
    }

    /// Builds the `count` oldest sessions starting at or after
    /// `start_from`. The list is pinned to that historical stretch:
    /// later bar events neither extend nor rebuild it.
    pub fn set_sessions_from(
        &mut self,
        bars: &[Bar],
        start_from: DateTime<Utc>,
        count: usize,
    ) -> Result<(), ProfileError> {
        let ranges = self
            .segmenter
            .segment(bars, &SessionRequest::FromDate { start_from, count })?;
        self.anchored = true;
        self.replace_sessions(bars, ranges);
        Ok(())
    }

    fn replace_sessions(&mut self, bars: &[Bar], ranges: Vec<SessionRange>) {
        let bar_duration = infer_bar_duration(bars);
        self.sessions.clear();
        for range in ranges {
            self.attach(range, None, bar_duration, EventType::SessionCreated);
        }
    }

    /// New-bar notification from the bar source. Rolls to a new session
    /// when the newest bar left the open session, otherwise fully rebuilds
    /// the open session's model.
    pub fn on_bar_opened(&mut self, bars: &[Bar]) -> Result<(), ProfileError> {
        self.add_or_update(bars)
    }

    /// The still-open bar changed its high or low; recomputation is a full
    /// rebuild of the open session, never a delta update.
    pub fn on_last_bar_changed(&mut self, bars: &[Bar]) -> Result<(), ProfileError> {
        self.add_or_update(bars)
    }

    fn add_or_update(&mut self, bars: &[Bar]) -> Result<(), ProfileError> {
        if self.config.session_kind == SessionKind::Rectangle {
            // Rectangle sessions rebuild on explicit edits only.
            return Ok(());
        }
        if self.anchored {
            // A pinned historical stretch never follows the live edge.
            return Ok(());
        }
        let Some(last_bar) = bars.last() else {
            return Ok(());
        };

        let needs_new = match self.sessions.last() {
            None => return self.append_latest(bars),
            Some(last) => self.needs_new_session(&last.range, last_bar.open_time),
        };

        if needs_new {
            self.append_latest(bars)
        } else {
            self.update_last(bars)
        }
    }

    fn append_latest(&mut self, bars: &[Bar]) -> Result<(), ProfileError> {
        let ranges = self.segmenter.segment(
            bars,
            &SessionRequest::MostRecent {
                count: 1,
                end_at: None,
            },
        )?;
        let Some(range) = ranges.into_iter().next_back() else {
            return Ok(());
        };
        let bar_duration = infer_bar_duration(bars);
        self.attach(range, None, bar_duration, EventType::SessionCreated);
        Ok(())
    }

    fn update_last(&mut self, bars: &[Bar]) -> Result<(), ProfileError> {
        let ranges = self.segmenter.segment(
            bars,
            &SessionRequest::MostRecent {
                count: 1,
                end_at: None,
            },
        )?;
        let Some(range) = ranges.into_iter().next_back() else {
            return Ok(());
        };

        let index = self.sessions.len() - 1;
        if self.sessions[index].range.start != range.start {
            return Ok(());
        }

        let bar_duration = infer_bar_duration(bars);
        match self.build_model(&range, None, bar_duration) {
            Ok(model) => {
                let start = range.start;
                self.sessions[index] = ProfileSession {
                    range,
                    model: Some(model),
                };
                self.notify(EventType::ModelReplaced, start);
            }
            Err(e) => {
                // The range moved on but the rebuild failed; the previous
                // model stays in place.
                self.report_build_error(&range, e);
                self.sessions[index].range = range;
            }
        }
        Ok(())
    }

    /// Ad-hoc session over caller-supplied bounds. Re-issued on every
    /// move/resize; the whole session is rebuilt from scratch through the
    /// cropped builder.
    pub fn set_rectangle(
        &mut self,
        bars: &[Bar],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        crop_top: f64,
        crop_bottom: f64,
    ) -> Result<(), ProfileError> {
        if self.config.session_kind != SessionKind::Rectangle {
            return Err(ProfileError::Configuration(
                "rectangle edits require the rectangle session kind".to_string(),
            ));
        }

        let replacing = !self.sessions.is_empty();
        let range = rectangle_range(bars, start, end);
        let bar_duration = infer_bar_duration(bars);
        let event = if replacing {
            EventType::ModelReplaced
        } else {
            EventType::SessionCreated
        };

        self.sessions.clear();
        self.attach(range, Some((crop_top, crop_bottom)), bar_duration, event);
        Ok(())
    }

    /// Level continuation over the finished models, oldest to newest,
    /// under the configured policy.
    pub fn level_rays(&self) -> Vec<LevelRay> {
        let mut models = self.finished_models();
        models.sort_by_key(|model| model.start_time);
        continue_levels(&models, self.config.continuation_policy)
    }

    fn attach(
        &mut self,
        range: SessionRange,
        crop: Option<(f64, f64)>,
        bar_duration: Duration,
        success_event: EventType,
    ) {
        let start = range.start;
        match self.build_model(&range, crop, bar_duration) {
            Ok(model) => {
                self.sessions.push(ProfileSession {
                    range,
                    model: Some(model),
                });
                self.notify(success_event, start);
            }
            Err(e) => {
                self.report_build_error(&range, e);
                self.sessions.push(ProfileSession { range, model: None });
                self.notify(EventType::SessionSkipped, start);
            }
        }
    }

    fn build_model(
        &self,
        range: &SessionRange,
        crop: Option<(f64, f64)>,
        bar_duration: Duration,
    ) -> Result<ProfileModel, BuildError> {
        if range.bars.is_empty() {
            return Err(BuildError::EmptyRange);
        }
        let slices = self.slice_count(&range.bars);
        let builder = TpoMatrixBuilder::new(
            self.config.value_area_percentage,
            self.config.prominence_threshold,
            bar_duration,
        );
        match crop {
            Some((crop_top, crop_bottom)) => {
                builder.build_cropped(&range.bars, slices, crop_top, crop_bottom)
            }
            None => builder.build(&range.bars, slices),
        }
    }

    /// Vertical resolution: one row per tick of session range. Sessions
    /// narrower than one tick are degenerate and skipped downstream.
    fn slice_count(&self, bars: &[Bar]) -> usize {
        let high_minus_low = session_high(bars) - session_low(bars);
        (high_minus_low / self.config.tick_size) as usize
    }

    fn report_build_error(&self, range: &SessionRange, e: BuildError) {
        if e.is_defect() {
            error!(
                start = %range.start,
                end = %range.end,
                "withholding session: {}",
                e
            );
        } else {
            warn!(
                start = %range.start,
                end = %range.end,
                bars = range.bars.len(),
                "skipping session: {}",
                e
            );
        }
    }

    fn notify(&self, event_type: EventType, session_start: DateTime<Utc>) {
        let note = match event_type {
            EventType::SessionCreated => "session built",
            EventType::ModelReplaced => "open session rebuilt",
            EventType::SessionSkipped => "session skipped",
        };
        self.observable.notify(
            self.config.session_kind,
            event_type,
            EventPayload {
                session_start: Some(session_start),
                note: Some(note.to_string()),
            },
        );
    }

    fn needs_new_session(&self, range: &SessionRange, new_bar_time: DateTime<Utc>) -> bool {
        if new_bar_time > range.end {
            return true;
        }

        let start = range.start;
        match self.config.session_kind {
            SessionKind::Daily => start.date_naive() != new_bar_time.date_naive(),
            SessionKind::Weekly => start.iso_week().week() != new_bar_time.iso_week().week(),
            SessionKind::Monthly => {
                start.month() != new_bar_time.month() || start.year() != new_bar_time.year()
            }
            SessionKind::Quarterly => {
                quarter(start) != quarter(new_bar_time) || start.year() != new_bar_time.year()
            }
            SessionKind::Semiannual => {
                (start.month() <= 6) != (new_bar_time.month() <= 6)
                    || start.year() != new_bar_time.year()
            }
            SessionKind::Annual => start.year() != new_bar_time.year(),
            SessionKind::Intraday => !self.same_intraday_session(start, new_bar_time),
            SessionKind::Rectangle => false,
        }
    }

    fn same_intraday_session(&self, session_start: DateTime<Utc>, bar_time: DateTime<Utc>) -> bool {
        self.config.intraday_windows.iter().any(|window| {
            in_intraday_window(session_start, window) && in_intraday_window(bar_time, window)
        })
    }
}

fn in_intraday_window(t: DateTime<Utc>, window: &IntradayWindow) -> bool {
    let time_of_day = t.time();
    if window.start <= window.end {
        time_of_day >= window.start && time_of_day < window.end
    } else {
        time_of_day >= window.start || time_of_day < window.end
    }
}

fn quarter(t: DateTime<Utc>) -> u32 {
    (t.month() - 1) / 3 + 1
}
