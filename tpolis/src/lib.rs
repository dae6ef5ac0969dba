pub mod analytics;
pub mod bar;
pub mod config;
pub mod constant;
pub mod continuation;
pub mod engine;
pub mod events;
pub mod export;
pub mod logging;
pub mod matrix;
pub mod model;
pub mod receiver;
pub mod session;
mod utils;

pub use bar::{Bar, infer_bar_duration};
pub use config::{IntradayWindow, ProfileConfig, ProfileConfigPatch, ProfileConfigSet};
pub use constant::{
	ContinuationPolicy, Direction, EventType, LevelKind, ProfileError, SessionKind,
	WeekendPolicy,
};
pub use continuation::{LevelRay, continue_levels};
pub use engine::{ProfileEngine, ProfileSession};
pub use events::{EventPayload, Observable, Subscriber};
pub use export::{developing_dataframe, profile_dataframe, write_parquet_snapshot};
pub use logging::init_logging;
pub use matrix::{BuildError, TpoCell, TpoMatrix, TpoMatrixBuilder};
pub use model::{DevelopingSeries, ProfileModel, SinglePrintBand};
pub use receiver::{BarSeries, load_bars_csv};
pub use session::{SessionRange, SessionRequest, SessionSegmenter, rectangle_range};
