use chrono::{DateTime, Duration, TimeZone, Utc};

use tpolis::{Bar, BuildError, ProfileModel, TpoMatrixBuilder};

fn t(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, hour, minute, 0)
        .single()
        .expect("valid datetime")
}

fn bar(open_time: DateTime<Utc>, low: f64, high: f64, up: bool) -> Bar {
    let (open, close) = if up { (low, high) } else { (high, low) };
    Bar {
        open_time,
        open_price: open,
        high_price: high,
        low_price: low,
        close_price: close,
    }
}

fn builder() -> TpoMatrixBuilder {
    TpoMatrixBuilder::new(0.7, 1.01, Duration::hours(1))
}

/// Three bars at disjoint price bands over a [0, 4] session: bar0 touches
/// only row 0, bar1 touches rows 1 and 2, bar2 touches only row 3.
fn worked_example() -> ProfileModel {
    let bars = vec![
        bar(t(10, 0), 0.0, 0.5, true),
        bar(t(11, 0), 1.5, 2.5, true),
        bar(t(12, 0), 3.5, 4.0, false),
    ];
    builder().build(&bars, 4).expect("build succeeds")
}

#[test]
fn worked_example_occupancy_and_value_area() {
    let model = worked_example();

    for row in 0..4 {
        assert_eq!(model.matrix.row_count(row), 1, "row {row}");
    }
    assert_eq!(model.matrix.total_count(), 4);

    // All rows tie at one TPO; the tie keeps the lowest row.
    assert_eq!(model.point_of_control, 0.5);
    // target = round(4 * 0.7) = 3: iteration 1 adds row 1, iteration 2
    // adds row 2; the bottom cursor never moves.
    assert_eq!(model.value_area_low, 0.5);
    assert_eq!(model.value_area_high, 2.5);
}

#[test]
fn boundary_touch_counts_as_overlap() {
    // High exactly on the row-1 boundary: both rows are touched.
    let bars = vec![
        bar(t(10, 0), 0.0, 1.0, true),
        bar(t(11, 0), 0.0, 2.0, true),
    ];
    let model = builder().build(&bars, 2).expect("build succeeds");

    assert_eq!(model.matrix.row_count(0), 2);
    assert_eq!(model.matrix.row_count(1), 2);
}

#[test]
fn occupancy_equals_sum_of_naive_per_bar_touches() {
    // Deterministic pseudo-random bars via a small LCG.
    let mut state: u64 = 42;
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((state >> 33) % 1000) as f64 / 100.0
    };

    let mut bars = Vec::new();
    for i in 0..40 {
        let a = next();
        let b = next();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        bars.push(bar(t(0, 0) + Duration::minutes(i * 5), low, high, i % 2 == 0));
    }

    let slices = 25;
    let model = builder().build(&bars, slices).expect("build succeeds");

    let session_low = bars.iter().map(|x| x.low_price).fold(f64::MAX, f64::min);
    let session_high = bars.iter().map(|x| x.high_price).fold(f64::MIN, f64::max);
    let height = (session_high - session_low) / slices as f64;

    let mut expected_total = 0;
    let mut expected_rows = vec![0usize; slices];
    for bar in &bars {
        for (row, expected) in expected_rows.iter_mut().enumerate() {
            let bottom = session_low + height * row as f64;
            let top = bottom + height;
            if top < bar.low_price || bottom > bar.high_price {
                continue;
            }
            *expected += 1;
            expected_total += 1;
        }
    }

    assert_eq!(model.matrix.total_count(), expected_total);
    for (row, expected) in expected_rows.iter().enumerate() {
        assert_eq!(model.matrix.row_count(row), *expected, "row {row}");
    }

    // The naive maximum-occupancy row matches the matrix POC; ties go to
    // the lowest-price row (strict > while scanning upward).
    let mut naive_poc = 0;
    let mut max_count = 0;
    for (row, &count) in expected_rows.iter().enumerate() {
        if count > max_count {
            max_count = count;
            naive_poc = row;
        }
    }
    let (poc_bottom, poc_top) = model.matrix.row_band(naive_poc);
    assert!(model.point_of_control >= poc_bottom && model.point_of_control <= poc_top);
}

#[test]
fn piling_rewrites_time_bands_to_the_piled_column() {
    let model = worked_example();

    // Row 3 is first touched by the third bar, but its cell lands at
    // column 0 and takes the first bar's time band.
    let cell = model.matrix.cell(3, 0).expect("row 3 is occupied");
    assert_eq!(cell.start_time, t(10, 0));
    assert_eq!(cell.end_time, t(11, 0));
    assert!(model.matrix.cell(3, 1).is_none());
}

#[test]
fn last_column_time_band_extends_one_bar_duration() {
    let bars = vec![
        bar(t(10, 0), 0.0, 2.0, true),
        bar(t(11, 0), 0.0, 2.0, true),
    ];
    let model = builder().build(&bars, 2).expect("build succeeds");

    let cell = model.matrix.cell(0, 1).expect("second column occupied");
    assert_eq!(cell.start_time, t(11, 0));
    assert_eq!(cell.end_time, t(12, 0));
}

#[test]
fn developing_series_agree_with_final_values() {
    let model = worked_example();

    assert_eq!(model.developing_poc.len(), 3);
    assert_eq!(model.developing_poc.last_value(), Some(model.point_of_control));
    assert_eq!(
        model.developing_area_high.last_value(),
        Some(model.value_area_high)
    );
    assert_eq!(
        model.developing_area_low.last_value(),
        Some(model.value_area_low)
    );

    // The settled view drops exactly the provisional last entry.
    assert_eq!(model.developing_poc.settled().len(), 2);
    assert_eq!(
        model.developing_poc.settled().last().map(|(t, _)| *t),
        Some(t(11, 0))
    );
}

#[test]
fn zero_slices_is_a_degenerate_skip() {
    let bars = vec![bar(t(10, 0), 1.0, 1.0, true)];
    let result = builder().build(&bars, 0);
    assert_eq!(result.unwrap_err(), BuildError::ZeroSlices);
    assert!(!BuildError::ZeroSlices.is_defect());
}

#[test]
fn empty_range_is_a_degenerate_skip() {
    let result = builder().build(&[], 4);
    assert_eq!(result.unwrap_err(), BuildError::EmptyRange);
}

#[test]
fn cropped_build_excludes_rows_outside_the_bound() {
    let bars = vec![
        bar(t(10, 0), 0.0, 4.0, true),
        bar(t(11, 0), 0.0, 4.0, true),
    ];
    let model = builder()
        .build_cropped(&bars, 4, 3.0, 1.0)
        .expect("build succeeds");

    // Rows [0,1] and [3,4] extend past the crop bound.
    assert_eq!(model.matrix.row_count(0), 0);
    assert_eq!(model.matrix.row_count(1), 2);
    assert_eq!(model.matrix.row_count(2), 2);
    assert_eq!(model.matrix.row_count(3), 0);
}

#[test]
fn cropped_build_records_nan_while_the_poc_row_is_outside() {
    // The first bar's whole band is cropped away, so the first developing
    // snapshot has no POC; the second bar brings rows inside the bound.
    let bars = vec![
        bar(t(10, 0), 3.5, 4.0, true),
        bar(t(11, 0), 0.0, 2.0, true),
        bar(t(12, 0), 0.0, 2.0, true),
    ];
    let model = builder()
        .build_cropped(&bars, 4, 2.0, 0.0)
        .expect("build succeeds");

    let first = model.developing_poc.points()[0].1;
    assert!(first.is_nan());
    let second = model.developing_poc.points()[1].1;
    assert!(!second.is_nan());
}

#[test]
fn developing_entries_are_keyed_by_bar_open_times_in_input_order() {
    let bars: Vec<Bar> = (0..6)
        .map(|i| bar(t(10, i * 10), i as f64 * 0.3, 2.0 + i as f64 * 0.3, true))
        .collect();

    let model = builder().build(&bars, 8).expect("build succeeds");

    let times: Vec<_> = model.developing_poc.points().iter().map(|(t, _)| *t).collect();
    let expected: Vec<_> = bars.iter().map(|b| b.open_time).collect();
    assert_eq!(times, expected);
    assert_eq!(model.developing_area_high.len(), bars.len());
    assert_eq!(model.developing_area_low.len(), bars.len());
}

#[test]
fn cell_direction_follows_the_touching_bar() {
    let bars = vec![
        bar(t(10, 0), 0.0, 0.5, true),
        bar(t(11, 0), 1.5, 2.0, false),
    ];
    let model = builder().build(&bars, 2).expect("build succeeds");

    assert_eq!(
        model.matrix.cell(0, 0).expect("occupied").direction,
        tpolis::Direction::Up
    );
    // Row 1 was touched by the down bar; the piled time band moves, the
    // direction does not.
    assert_eq!(
        model.matrix.cell(1, 0).expect("occupied").direction,
        tpolis::Direction::Down
    );
    assert_eq!(
        model.matrix.cell(1, 0).expect("occupied").start_time,
        t(10, 0)
    );
}
