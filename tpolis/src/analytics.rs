//! Pure functions over a finished (or partially built) matrix.
//! Row index 0 is always the lowest price row.

use chrono::{DateTime, Utc};

use crate::matrix::TpoMatrix;
use crate::model::SinglePrintBand;
use crate::utils::group_adjacent;

/// Row with the strictly greatest occupancy. Ties keep the first
/// (lowest-price) row found scanning upward.
pub fn point_of_control_row(matrix: &TpoMatrix) -> usize {
    let mut max_points = 0;
    let mut poc_row = 0;
    for row in 0..matrix.rows() {
        let points = matrix.row_count(row);
        if points > max_points {
            poc_row = row;
            max_points = points;
        }
    }
    poc_row
}

/// Mid price of the row's column-0 cell, `None` when the row is empty.
pub fn point_of_control_price(matrix: &TpoMatrix, row: usize) -> Option<f64> {
    matrix.cell(row, 0).map(|cell| cell.mid())
}

/// Two-sided lock-step Value Area expansion. Both cursors start at the POC
/// row; each iteration advances whichever sides still have an occupied row
/// available, accumulating both counts before re-checking the target.
pub fn value_area(matrix: &TpoMatrix, percentage: f64) -> (f64, f64) {
    let total_blocks = matrix.total_count();
    let target_blocks = (total_blocks as f64 * percentage).round() as usize;

    let poc_row = point_of_control_row(matrix);
    let mut block_counter = matrix.row_count(poc_row);
    let mut top_counter = poc_row;
    let mut bottom_counter = poc_row;

    while block_counter < target_blocks {
        let can_move_up =
            top_counter + 1 < matrix.rows() && matrix.cell(top_counter + 1, 0).is_some();
        let can_move_down = bottom_counter > 0 && matrix.cell(bottom_counter - 1, 0).is_some();

        if !can_move_up && !can_move_down {
            break;
        }

        if can_move_up {
            top_counter += 1;
            block_counter += matrix.row_count(top_counter);
        }
        if can_move_down {
            bottom_counter -= 1;
            block_counter += matrix.row_count(bottom_counter);
        }
    }

    let vah = matrix
        .cell(top_counter, 0)
        .map(|cell| cell.mid())
        .unwrap_or(f64::NAN);
    let val = matrix
        .cell(bottom_counter, 0)
        .map(|cell| cell.mid())
        .unwrap_or(f64::NAN);
    (vah, val)
}

/// Price at which the bottom-up running TPO total first reaches half of
/// the total. Scans whole rows; the reported price is the mid of the last
/// occupied cell seen.
pub fn median_price(matrix: &TpoMatrix) -> f64 {
    let half_of_blocks = matrix.total_count() / 2;
    let mut blocks = 0;
    let mut price = 0.0;

    for row in 0..matrix.rows() {
        for column in 0..matrix.columns() {
            if let Some(cell) = matrix.cell(row, column) {
                blocks += 1;
                price = cell.mid();
            }
        }
        if blocks >= half_of_blocks {
            break;
        }
    }

    price
}

/// Row at which the running total strictly exceeds half of the total.
/// Note the `>` here against the `>=` in `median_price`; the two can
/// disagree by one row on even totals.
pub fn median_row_index(matrix: &TpoMatrix) -> Option<usize> {
    let half_of_blocks = matrix.total_count() / 2;
    let mut blocks = 0;

    for row in 0..matrix.rows() {
        blocks += matrix.row_count(row);
        if blocks > half_of_blocks {
            return Some(row);
        }
    }
    None
}

/// End time of the last contiguous occupied cell in the median row.
pub fn median_row_end_time(matrix: &TpoMatrix) -> Option<DateTime<Utc>> {
    row_end_time(matrix, median_row_index(matrix)?)
}

/// End time of the last contiguous occupied cell in the POC row. Rays for
/// a session anchor here.
pub fn poc_row_end_time(matrix: &TpoMatrix) -> Option<DateTime<Utc>> {
    row_end_time(matrix, point_of_control_row(matrix))
}

fn row_end_time(matrix: &TpoMatrix, row: usize) -> Option<DateTime<Utc>> {
    let mut end_column = 0;
    for column in 0..matrix.columns() {
        if matrix.cell(row, column).is_none() {
            break;
        }
        end_column = column;
    }
    matrix.cell(row, end_column).map(|cell| cell.end_time)
}

/// TPO totals strictly above and strictly below the POC row, or `None`
/// when the POC row itself has no data. The `None` arm guards a state that
/// should not occur after a finished build.
pub fn tpo_counts_around_poc(matrix: &TpoMatrix) -> Option<(usize, usize)> {
    let poc_row = point_of_control_row(matrix);
    matrix.cell(poc_row, 0)?;

    let mut top_blocks = 0;
    let mut bottom_blocks = 0;
    for row in 0..matrix.rows() {
        if matrix.cell(row, 0).is_none() {
            continue;
        }
        let row_total = matrix.row_count(row);
        if row < poc_row {
            bottom_blocks += row_total;
        } else if row > poc_row {
            top_blocks += row_total;
        }
    }

    Some((top_blocks, bottom_blocks))
}

/// POC row share strictly above the threshold marks a prominent line.
pub fn is_prominent(matrix: &TpoMatrix, prominence_threshold: f64) -> bool {
    let target_blocks = matrix.total_count() as f64 * prominence_threshold;
    let poc_blocks = matrix.row_count(point_of_control_row(matrix));
    poc_blocks as f64 > target_blocks
}

/// Rows holding exactly one TPO, grouped into maximal contiguous bands.
/// Band times come from the lowest row's occupying cell.
pub fn single_prints(matrix: &TpoMatrix) -> Vec<SinglePrintBand> {
    let mut single_rows = Vec::new();
    for row in 0..matrix.rows() {
        let mut columns = 0;
        for column in 0..matrix.columns() {
            if matrix.cell(row, column).is_none() {
                break;
            }
            columns += 1;
        }
        if columns == 1 {
            single_rows.push(row);
        }
    }

    group_adjacent(&single_rows)
        .into_iter()
        .filter_map(|group| {
            let bottom_row = group[0];
            let top_row = group[group.len() - 1];
            let bottom_cell = matrix.cell(bottom_row, 0)?;
            let top_cell = matrix.cell(top_row, 0)?;
            Some(SinglePrintBand {
                start_time: bottom_cell.start_time,
                end_time: bottom_cell.end_time,
                high: top_cell.top,
                low: bottom_cell.bottom,
                top_row,
                bottom_row,
            })
        })
        .collect()
}
