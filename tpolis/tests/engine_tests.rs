use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};

use tpolis::{
    Bar, BarSeries, EventType, ProfileConfig, ProfileConfigSet, ProfileEngine, SessionKind,
    WeekendPolicy,
};

fn t(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0)
        .single()
        .expect("valid datetime")
}

fn bar(open_time: DateTime<Utc>, low: f64, high: f64) -> Bar {
    Bar {
        open_time,
        open_price: low,
        high_price: high,
        low_price: low,
        close_price: high,
    }
}

fn day_bars(day: u32, low: f64, high: f64) -> Vec<Bar> {
    (0..4).map(|h| bar(t(day, 10 + h), low, high)).collect()
}

fn config() -> ProfileConfig {
    ProfileConfig {
        tick_size: 1.0,
        ..ProfileConfig::default()
    }
}

#[test]
fn set_sessions_builds_the_most_recent_models() {
    let mut bars = day_bars(4, 0.0, 4.0);
    bars.extend(day_bars(5, 1.0, 5.0));
    bars.extend(day_bars(6, 2.0, 6.0));

    let mut engine = ProfileEngine::new(config()).expect("valid config");
    engine.set_sessions(&bars, 2, None).expect("segmentation");

    assert_eq!(engine.sessions().len(), 2);
    assert_eq!(engine.finished_models().len(), 2);
    assert_eq!(engine.sessions()[0].range.start, t(5, 10));
    assert_eq!(engine.sessions()[1].range.start, t(6, 10));
}

#[test]
fn new_bar_in_the_same_day_rebuilds_the_open_session() {
    let mut bars = day_bars(4, 0.0, 4.0);
    bars.extend(day_bars(5, 0.0, 4.0));

    let mut engine = ProfileEngine::new(config()).expect("valid config");
    engine.set_sessions(&bars, 2, None).expect("segmentation");
    let before = engine.finished_models()[1].matrix.total_count();

    // One more bar inside day 5.
    bars.push(bar(t(5, 14), 0.0, 4.0));
    engine.on_bar_opened(&bars).expect("update");

    assert_eq!(engine.sessions().len(), 2);
    let after = engine.finished_models()[1].matrix.total_count();
    assert!(after > before);
}

#[test]
fn new_bar_in_a_new_day_rolls_a_new_session() {
    let mut bars = day_bars(4, 0.0, 4.0);
    bars.extend(day_bars(5, 0.0, 4.0));

    let mut engine = ProfileEngine::new(config()).expect("valid config");
    engine.set_sessions(&bars, 2, None).expect("segmentation");

    bars.push(bar(t(6, 10), 0.0, 4.0));
    engine.on_bar_opened(&bars).expect("roll");

    assert_eq!(engine.sessions().len(), 3);
    assert_eq!(engine.sessions()[2].range.start, t(6, 10));
}

#[test]
fn widening_the_open_bar_replaces_the_model() {
    let mut bars = day_bars(4, 0.0, 4.0);

    let mut engine = ProfileEngine::new(config()).expect("valid config");
    engine.set_sessions(&bars, 1, None).expect("segmentation");
    assert_eq!(engine.finished_models()[0].matrix.top_price(), 4.0);

    // The still-open last bar spikes; high/low changed, full rebuild.
    let last = bars.last_mut().expect("bars exist");
    last.high_price = 8.0;
    engine.on_last_bar_changed(&bars).expect("rebuild");

    let model = engine.finished_models()[0];
    assert_eq!(model.matrix.top_price(), 8.0);
    assert_eq!(engine.sessions().len(), 1);
}

#[test]
fn from_date_sessions_are_pinned_against_live_updates() {
    let mut bars = day_bars(4, 0.0, 4.0);
    bars.extend(day_bars(5, 0.0, 4.0));
    bars.extend(day_bars(6, 0.0, 4.0));

    let mut engine = ProfileEngine::new(config()).expect("valid config");
    engine
        .set_sessions_from(&bars, t(4, 0), 2)
        .expect("segmentation");

    assert_eq!(engine.sessions().len(), 2);
    assert_eq!(engine.sessions()[0].range.start, t(4, 10));
    assert_eq!(engine.sessions()[1].range.start, t(5, 10));

    // A new trading day arrives; the pinned stretch must not move.
    bars.push(bar(t(7, 10), 0.0, 4.0));
    engine.on_bar_opened(&bars).expect("no-op");
    assert_eq!(engine.sessions().len(), 2);
    assert_eq!(engine.sessions()[1].range.start, t(5, 10));
}

#[test]
fn identical_input_produces_identical_artifacts() {
    let mut bars = day_bars(4, 0.0, 4.0);
    bars.extend(day_bars(5, 1.0, 5.0));

    let run = |bars: &[Bar]| {
        let mut engine = ProfileEngine::new(config()).expect("valid config");
        engine.set_sessions(bars, 2, None).expect("segmentation");
        engine
            .finished_models()
            .iter()
            .map(|m| {
                (
                    m.point_of_control,
                    m.value_area_high,
                    m.value_area_low,
                    m.median,
                    m.matrix.total_count(),
                    m.developing_poc.points().to_vec(),
                )
            })
            .collect::<Vec<_>>()
    };

    assert_eq!(run(&bars), run(&bars));
}

#[test]
fn degenerate_session_is_skipped_and_siblings_survive() {
    let mut bars = day_bars(4, 0.0, 4.0);
    // Day 5 trades a single flat bar: zero price range, zero slices.
    bars.push(bar(t(5, 10), 2.0, 2.0));

    let mut engine = ProfileEngine::new(config()).expect("valid config");
    engine.set_sessions(&bars, 2, None).expect("segmentation");

    assert_eq!(engine.sessions().len(), 2);
    assert!(engine.sessions()[0].model.is_some());
    assert!(engine.sessions()[1].model.is_none());
    assert_eq!(engine.finished_models().len(), 1);
}

#[test]
fn intraday_without_windows_fails_construction() {
    let config = ProfileConfig {
        session_kind: SessionKind::Intraday,
        intraday_windows: vec![],
        tick_size: 1.0,
        ..ProfileConfig::default()
    };
    assert!(ProfileEngine::new(config).is_err());
}

#[test]
fn rectangle_edit_rebuilds_from_scratch() {
    let bars = day_bars(4, 0.0, 4.0);
    let config = ProfileConfig {
        session_kind: SessionKind::Rectangle,
        tick_size: 1.0,
        ..ProfileConfig::default()
    };
    let mut engine = ProfileEngine::new(config).expect("valid config");

    engine
        .set_rectangle(&bars, t(4, 10), t(4, 13), 4.0, 0.0)
        .expect("rectangle build");
    assert_eq!(engine.sessions().len(), 1);
    let full = engine.finished_models()[0].matrix.total_count();

    // Dragging the top edge down crops rows away; the session is rebuilt,
    // never patched.
    engine
        .set_rectangle(&bars, t(4, 10), t(4, 13), 2.0, 0.0)
        .expect("rectangle rebuild");
    assert_eq!(engine.sessions().len(), 1);
    let cropped = engine.finished_models()[0].matrix.total_count();
    assert!(cropped < full);
}

#[test]
fn rectangle_edits_require_the_rectangle_kind() {
    let bars = day_bars(4, 0.0, 4.0);
    let mut engine = ProfileEngine::new(config()).expect("valid config");
    assert!(
        engine
            .set_rectangle(&bars, t(4, 10), t(4, 13), 4.0, 0.0)
            .is_err()
    );
}

#[test]
fn lifecycle_events_reach_subscribers() {
    let mut bars = day_bars(4, 0.0, 4.0);
    bars.extend(day_bars(5, 0.0, 4.0));

    let seen: Arc<Mutex<Vec<EventType>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let mut engine = ProfileEngine::new(config()).expect("valid config");
    engine.subscribe(
        None,
        Arc::new(move |_, event_type, _| {
            sink.lock().expect("subscriber lock").push(event_type);
        }),
    );

    engine.set_sessions(&bars, 2, None).expect("segmentation");
    bars.push(bar(t(5, 14), 0.0, 4.0));
    engine.on_bar_opened(&bars).expect("update");

    let seen = seen.lock().expect("subscriber lock");
    assert_eq!(
        seen.as_slice(),
        &[
            EventType::SessionCreated,
            EventType::SessionCreated,
            EventType::ModelReplaced
        ]
    );
}

#[test]
fn bar_series_drives_the_engine_like_a_feed() {
    let mut feed = BarSeries::new();
    for b in day_bars(4, 0.0, 4.0) {
        feed.append(b);
    }

    let mut engine = ProfileEngine::new(config()).expect("valid config");
    engine.set_sessions(feed.bars(), 1, None).expect("segmentation");

    feed.append(bar(t(4, 14), 0.0, 4.0));
    engine.on_bar_opened(feed.bars()).expect("new bar");
    assert_eq!(engine.finished_models()[0].matrix.columns(), 5);

    // The open bar spikes; the feed touches it up in place.
    feed.update_last(9.0, 0.0, 4.0);
    engine.on_last_bar_changed(feed.bars()).expect("rebuild");
    assert_eq!(engine.finished_models()[0].matrix.top_price(), 9.0);

    // An out-of-order bar never reaches the engine.
    feed.append(bar(t(4, 9), 0.0, 4.0));
    assert_eq!(feed.len(), 5);
}

#[test]
fn config_set_resolves_per_kind_overrides() {
    let yaml = r#"
default:
    tick_size: 0.5
    weekend_policy: ignore
kind:
    weekly:
        value_area_percentage: 0.68
"#;
    let set = ProfileConfigSet::from_yaml_str(yaml).expect("yaml parse");

    let daily = set.resolve_for(SessionKind::Daily).expect("resolve");
    assert_eq!(daily.session_kind, SessionKind::Daily);
    assert_eq!(daily.tick_size, 0.5);
    assert_eq!(daily.weekend_policy, WeekendPolicy::Ignore);
    assert_eq!(
        daily.value_area_percentage,
        ProfileConfig::default().value_area_percentage
    );

    let weekly = set.resolve_for(SessionKind::Weekly).expect("resolve");
    assert_eq!(weekly.session_kind, SessionKind::Weekly);
    assert_eq!(weekly.value_area_percentage, 0.68);
    assert_eq!(weekly.tick_size, 0.5);
}

#[test]
fn dataframe_exports_settle_the_developing_series() {
    let bars = day_bars(4, 0.0, 4.0);
    let mut engine = ProfileEngine::new(config()).expect("valid config");
    engine.set_sessions(&bars, 1, None).expect("segmentation");

    let model = engine.finished_models()[0];
    let profile = tpolis::profile_dataframe(model).expect("profile dataframe");
    assert_eq!(profile.height(), model.matrix.rows());

    // The in-flight last entry stays out of the exported series.
    let developing = tpolis::developing_dataframe(model).expect("developing dataframe");
    assert_eq!(developing.height(), model.developing_poc.len() - 1);

    let out_dir = std::env::temp_dir().join("tpolis_snapshot_test");
    tpolis::write_parquet_snapshot(engine.sessions(), &out_dir).expect("parquet snapshot");
    let stamp = model.start_time.format("%Y%m%d%H%M%S");
    assert!(out_dir.join(format!("profile_{stamp}.parquet")).exists());
}

#[test]
fn level_rays_run_under_the_configured_policy() {
    let mut bars = day_bars(4, 0.0, 4.0);
    bars.extend(day_bars(5, 0.0, 4.0));

    let config = ProfileConfig {
        tick_size: 1.0,
        continuation_policy: tpolis::ContinuationPolicy::StopAll,
        ..ProfileConfig::default()
    };
    let mut engine = ProfileEngine::new(config).expect("valid config");
    engine.set_sessions(&bars, 2, None).expect("segmentation");

    let rays = engine.level_rays();
    assert_eq!(rays.len(), 6);
    let first_poc = rays
        .iter()
        .find(|ray| ray.session_index == 0 && ray.kind == tpolis::LevelKind::PointOfControl)
        .expect("ray exists");
    assert_eq!(first_poc.terminal, Some(t(5, 10)));
}
