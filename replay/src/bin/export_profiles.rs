use std::fs;
use std::path::PathBuf;

use replay::{ExportPayload, level_point, session_point};
use tpolis::{BarSeries, ProfileConfig, ProfileEngine, SessionKind, load_bars_csv};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tpolis::init_logging();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!(
            "usage: cargo run -p replay --bin export_profiles -- <csv_path> <session_kind> [sessions_to_count] [config_yaml] [output_path]"
        );
        std::process::exit(2);
    }

    let csv_path = PathBuf::from(&args[1]);
    let kind = SessionKind::parse(&args[2])?;
    let sessions_to_count: Option<usize> = if args.len() >= 4 {
        Some(args[3].parse()?)
    } else {
        None
    };

    let mut config = if args.len() >= 5 {
        ProfileConfig::from_yaml_file(&args[4])?
    } else {
        ProfileConfig::default()
    };
    config.session_kind = kind;
    if let Some(count) = sessions_to_count {
        config.sessions_to_count = count;
    }

    let output = if args.len() >= 6 {
        PathBuf::from(&args[5])
    } else {
        PathBuf::from(format!("{}_profiles.json", kind.as_str()))
    };

    let feed = BarSeries::from_bars(load_bars_csv(&csv_path)?);
    eprintln!("loaded {} bars from {}", feed.len(), csv_path.display());

    let count = config.sessions_to_count;
    let mut engine = ProfileEngine::new(config)?;
    engine.set_sessions(feed.bars(), count, None)?;

    let payload = ExportPayload {
        session_kind: kind.as_str().to_string(),
        sessions: engine.sessions().iter().map(session_point).collect(),
        levels: engine.level_rays().iter().map(level_point).collect(),
    };

    fs::write(&output, serde_json::to_string_pretty(&payload)?)?;
    eprintln!(
        "wrote {} sessions and {} levels to {}",
        payload.sessions.len(),
        payload.levels.len(),
        output.display()
    );

    Ok(())
}
