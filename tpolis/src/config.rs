use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::NaiveTime;
use serde::Deserialize;

use crate::constant::{ContinuationPolicy, ProfileError, SessionKind, WeekendPolicy};

/// One intraday time-of-day window. The window wraps past midnight when
/// `end <= start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntradayWindow {
    pub name: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, Clone)]
pub struct ProfileConfig {
    pub session_kind: SessionKind,
    pub sessions_to_count: usize,
    pub value_area_percentage: f64,
    pub prominence_threshold: f64,
    /// Price height of one profile row.
    pub tick_size: f64,
    pub time_shift_minutes: i64,
    pub weekend_policy: WeekendPolicy,
    pub continuation_policy: ContinuationPolicy,
    pub intraday_windows: Vec<IntradayWindow>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            session_kind: SessionKind::Daily,
            sessions_to_count: 2,
            value_area_percentage: 0.70,
            prominence_threshold: 1.01,
            tick_size: 0.0001,
            time_shift_minutes: 0,
            weekend_policy: WeekendPolicy::Normal,
            continuation_policy: ContinuationPolicy::StopNone,
            intraday_windows: default_intraday_windows(),
        }
    }
}

fn default_intraday_windows() -> Vec<IntradayWindow> {
    [
        ("Intraday 1", "00:00", "06:00"),
        ("Intraday 2", "06:00", "12:00"),
        ("Intraday 3", "12:00", "18:00"),
        ("Intraday 4", "18:00", "00:00"),
    ]
    .iter()
    .map(|(name, start, end)| IntradayWindow {
        name: (*name).to_string(),
        start: parse_time_of_day(start).expect("default window time"),
        end: parse_time_of_day(end).expect("default window time"),
    })
    .collect()
}

pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, ProfileError> {
    for pattern in ["%H:%M", "%H:%M:%S"] {
        if let Ok(t) = NaiveTime::parse_from_str(value.trim(), pattern) {
            return Ok(t);
        }
    }
    Err(ProfileError::Configuration(format!(
        "invalid time of day: {value}"
    )))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntradayWindowSpec {
    pub name: Option<String>,
    pub start: String,
    pub end: String,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileConfigPatch {
    pub session_kind: Option<String>,
    pub sessions_to_count: Option<usize>,
    pub value_area_percentage: Option<f64>,
    pub prominence_threshold: Option<f64>,
    pub tick_size: Option<f64>,
    pub time_shift_minutes: Option<i64>,
    pub weekend_policy: Option<String>,
    pub continuation_policy: Option<String>,
    pub intraday_windows: Option<Vec<IntradayWindowSpec>>,
}

/// Default config plus per-session-kind overrides, loadable from YAML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileConfigSet {
    #[serde(default)]
    pub default: ProfileConfigPatch,
    #[serde(default)]
    pub kind: HashMap<String, ProfileConfigPatch>,
}

impl ProfileConfig {
    pub fn apply_patch(mut self, patch: &ProfileConfigPatch) -> Result<Self, ProfileError> {
        if let Some(v) = &patch.session_kind {
            self.session_kind = SessionKind::parse(v)?;
        }
        if let Some(v) = patch.sessions_to_count {
            self.sessions_to_count = v;
        }
        if let Some(v) = patch.value_area_percentage {
            self.value_area_percentage = v;
        }
        if let Some(v) = patch.prominence_threshold {
            self.prominence_threshold = v;
        }
        if let Some(v) = patch.tick_size {
            self.tick_size = v;
        }
        if let Some(v) = patch.time_shift_minutes {
            self.time_shift_minutes = v;
        }
        if let Some(v) = &patch.weekend_policy {
            self.weekend_policy = WeekendPolicy::parse(v)?;
        }
        if let Some(v) = &patch.continuation_policy {
            self.continuation_policy = ContinuationPolicy::parse(v)?;
        }
        if let Some(specs) = &patch.intraday_windows {
            let mut windows = Vec::new();
            for (index, spec) in specs.iter().enumerate() {
                if !spec.enabled {
                    continue;
                }
                windows.push(IntradayWindow {
                    name: spec
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("Intraday {}", index + 1)),
                    start: parse_time_of_day(&spec.start)?,
                    end: parse_time_of_day(&spec.end)?,
                });
            }
            self.intraday_windows = windows;
        }
        Ok(self)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ProfileError> {
        let patch: ProfileConfigPatch = serde_yaml::from_str(yaml)?;
        Self::default().apply_patch(&patch)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let raw = fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Intraday with no enabled windows cannot segment anything.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.session_kind == SessionKind::Intraday && self.intraday_windows.is_empty() {
            return Err(ProfileError::Configuration(
                "enable at least one intraday window for the intraday kind".to_string(),
            ));
        }
        if self.intraday_windows.len() > 4 {
            return Err(ProfileError::Configuration(
                "at most four intraday windows are supported".to_string(),
            ));
        }
        if self.tick_size <= 0.0 {
            return Err(ProfileError::Configuration(format!(
                "tick size must be positive, got {}",
                self.tick_size
            )));
        }
        if !(0.0..=1.0).contains(&self.value_area_percentage) {
            return Err(ProfileError::Configuration(format!(
                "value area percentage must be within [0, 1], got {}",
                self.value_area_percentage
            )));
        }
        Ok(())
    }
}

impl ProfileConfigSet {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ProfileError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let raw = fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn resolve_for(&self, kind: SessionKind) -> Result<ProfileConfig, ProfileError> {
        let mut config = ProfileConfig::default().apply_patch(&self.default)?;
        if let Some(patch) = find_patch(&self.kind, kind.as_str()) {
            config = config.apply_patch(patch)?;
        }
        config.session_kind = kind;
        Ok(config)
    }
}

fn find_patch<'a>(
    map: &'a HashMap<String, ProfileConfigPatch>,
    key: &str,
) -> Option<&'a ProfileConfigPatch> {
    map.iter()
        .find(|(k, _)| k.trim().eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_patch_overrides_defaults_only_where_set() {
        let yaml = r#"
value_area_percentage: 0.68
weekend_policy: ignore
"#;
        let config = ProfileConfig::from_yaml_str(yaml).expect("yaml parse should succeed");
        assert_eq!(config.value_area_percentage, 0.68);
        assert_eq!(config.weekend_policy, WeekendPolicy::Ignore);
        assert_eq!(
            config.sessions_to_count,
            ProfileConfig::default().sessions_to_count
        );
    }

    #[test]
    fn window_spec_respects_enable_flag() {
        let yaml = r#"
intraday_windows:
    - start: "00:00"
      end: "08:00"
    - start: "08:00"
      end: "16:00"
      enabled: false
"#;
        let config = ProfileConfig::from_yaml_str(yaml).expect("yaml parse should succeed");
        assert_eq!(config.intraday_windows.len(), 1);
        assert_eq!(config.intraday_windows[0].name, "Intraday 1");
    }
}
