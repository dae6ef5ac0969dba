use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
}

/// How one profile session is bounded in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Semiannual,
    Annual,
    Intraday,
    Rectangle,
}

impl SessionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Semiannual => "semiannual",
            Self::Annual => "annual",
            Self::Intraday => "intraday",
            Self::Rectangle => "rectangle",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ProfileError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "semiannual" => Ok(Self::Semiannual),
            "annual" => Ok(Self::Annual),
            "intraday" => Ok(Self::Intraday),
            "rectangle" => Ok(Self::Rectangle),
            _ => Err(ProfileError::Configuration(format!(
                "unknown session kind: {value}"
            ))),
        }
    }
}

/// What happens to Saturday/Sunday bars before grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeekendPolicy {
    Normal,
    Ignore,
    Append,
}

impl WeekendPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Ignore => "ignore",
            Self::Append => "append",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ProfileError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "ignore" => Ok(Self::Ignore),
            "append" => Ok(Self::Append),
            _ => Err(ProfileError::Configuration(format!(
                "unknown weekend policy: {value}"
            ))),
        }
    }
}

/// How far a session's forward-extending levels run against later sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContinuationPolicy {
    StopNone,
    StopAll,
    StopAllExceptNext,
    StopOnlyNext,
}

impl ContinuationPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StopNone => "stop_none",
            Self::StopAll => "stop_all",
            Self::StopAllExceptNext => "stop_all_except_next",
            Self::StopOnlyNext => "stop_only_next",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ProfileError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stop_none" => Ok(Self::StopNone),
            "stop_all" => Ok(Self::StopAll),
            "stop_all_except_next" => Ok(Self::StopAllExceptNext),
            "stop_only_next" => Ok(Self::StopOnlyNext),
            _ => Err(ProfileError::Configuration(format!(
                "unknown continuation policy: {value}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LevelKind {
    PointOfControl,
    ValueAreaHigh,
    ValueAreaLow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    SessionCreated,
    ModelReplaced,
    SessionSkipped,
}

#[derive(Debug)]
pub enum ProfileError {
    Configuration(String),
    InvalidDatetime(String),
    Io(std::io::Error),
    Csv(csv::Error),
    Yaml(serde_yaml::Error),
    Polars(polars::error::PolarsError),
}

impl Display for ProfileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(v) => write!(f, "configuration error: {v}"),
            Self::InvalidDatetime(v) => write!(f, "invalid datetime: {v}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Csv(e) => write!(f, "csv error: {e}"),
            Self::Yaml(e) => write!(f, "yaml error: {e}"),
            Self::Polars(e) => write!(f, "polars error: {e}"),
        }
    }
}

impl std::error::Error for ProfileError {}

impl From<std::io::Error> for ProfileError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<csv::Error> for ProfileError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

impl From<serde_yaml::Error> for ProfileError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Yaml(value)
    }
}

impl From<polars::error::PolarsError> for ProfileError {
    fn from(value: polars::error::PolarsError) -> Self {
        Self::Polars(value)
    }
}
