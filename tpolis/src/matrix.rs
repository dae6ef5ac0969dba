use std::fmt::{Display, Formatter};

use chrono::{DateTime, Duration, Utc};

use crate::analytics;
use crate::bar::{Bar, session_high, session_low};
use crate::constant::Direction;
use crate::model::{DevelopingSeries, ProfileModel};

/// One occupied price-slice-at-a-bar unit. After piling, the time band
/// belongs to the bar that lives at the piled column index, not necessarily
/// the bar that originally touched the price level.
#[derive(Debug, Clone)]
pub struct TpoCell {
    pub direction: Direction,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub top: f64,
    pub bottom: f64,
}

impl TpoCell {
    pub fn mid(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }
}

/// rows x columns grid of optional cells, row 0 at the lowest price.
/// Columns are piled positions, not bar positions.
#[derive(Debug, Clone)]
pub struct TpoMatrix {
    rows: usize,
    columns: usize,
    price_floor: f64,
    slice_height: f64,
    cells: Vec<Option<TpoCell>>,
}

impl TpoMatrix {
    fn new(rows: usize, columns: usize, price_floor: f64, slice_height: f64) -> Self {
        Self {
            rows,
            columns,
            price_floor,
            slice_height,
            cells: vec![None; rows * columns],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&TpoCell> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        self.cells[row * self.columns + column].as_ref()
    }

    fn set(&mut self, row: usize, column: usize, cell: TpoCell) {
        self.cells[row * self.columns + column] = Some(cell);
    }

    /// Occupied cells in one row.
    pub fn row_count(&self, row: usize) -> usize {
        (0..self.columns)
            .filter(|&column| self.cell(row, column).is_some())
            .count()
    }

    /// Occupied cells in the whole matrix.
    pub fn total_count(&self) -> usize {
        self.cells.iter().filter(|x| x.is_some()).count()
    }

    pub fn row_band(&self, row: usize) -> (f64, f64) {
        let bottom = self.price_floor + self.slice_height * row as f64;
        (bottom, bottom + self.slice_height)
    }

    pub fn bottom_price(&self) -> f64 {
        self.price_floor
    }

    pub fn top_price(&self) -> f64 {
        self.price_floor + self.slice_height * self.rows as f64
    }

    pub fn slice_height(&self) -> f64 {
        self.slice_height
    }
}

/// Why a session build produced no model. `EmptyRange` and `ZeroSlices`
/// are degenerate-session conditions recovered by skipping; `PocRowEmpty`
/// is a defect signal for a state that should not occur after a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    EmptyRange,
    ZeroSlices,
    PocRowEmpty,
}

impl BuildError {
    pub fn is_defect(self) -> bool {
        self == Self::PocRowEmpty
    }
}

impl Display for BuildError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyRange => write!(f, "session has no bars"),
            Self::ZeroSlices => write!(f, "session price range yields zero slices"),
            Self::PocRowEmpty => write!(f, "point of control row has no cell at column 0"),
        }
    }
}

/// Builds the occupancy matrix and developing series with the
/// fill-and-pile algorithm. Columns are processed strictly in input order;
/// replaying the same bars out of order yields a different matrix, so the
/// builder never reorders anything.
pub struct TpoMatrixBuilder {
    value_area_percentage: f64,
    prominence_threshold: f64,
    bar_duration: Duration,
}

impl TpoMatrixBuilder {
    pub fn new(
        value_area_percentage: f64,
        prominence_threshold: f64,
        bar_duration: Duration,
    ) -> Self {
        Self {
            value_area_percentage,
            prominence_threshold,
            bar_duration,
        }
    }

    pub fn build(&self, bars: &[Bar], slices: usize) -> Result<ProfileModel, BuildError> {
        self.fill_and_pile(bars, slices, None)
    }

    /// Cropped variant: rows whose band extends above `crop_top` or below
    /// `crop_bottom` are never occupied. Used by the rectangle kind, where
    /// an externally supplied vertical bound excludes outside slices.
    pub fn build_cropped(
        &self,
        bars: &[Bar],
        slices: usize,
        crop_top: f64,
        crop_bottom: f64,
    ) -> Result<ProfileModel, BuildError> {
        self.fill_and_pile(bars, slices, Some((crop_top, crop_bottom)))
    }

    fn fill_and_pile(
        &self,
        bars: &[Bar],
        slices: usize,
        crop: Option<(f64, f64)>,
    ) -> Result<ProfileModel, BuildError> {
        if bars.is_empty() {
            return Err(BuildError::EmptyRange);
        }
        if slices == 0 {
            return Err(BuildError::ZeroSlices);
        }

        let rows = slices;
        let columns = bars.len();
        let bottom_of_region = session_low(bars);
        let slice_height = (session_high(bars) - bottom_of_region) / rows as f64;

        let mut matrix = TpoMatrix::new(rows, columns, bottom_of_region, slice_height);
        let mut developing_poc = DevelopingSeries::default();
        let mut developing_area_high = DevelopingSeries::default();
        let mut developing_area_low = DevelopingSeries::default();

        for (column, bar) in bars.iter().enumerate() {
            let mut points_per_column: Vec<(usize, TpoCell)> = Vec::new();

            for row in 0..rows {
                let slice_bottom = bottom_of_region + slice_height * row as f64;
                let slice_top = slice_bottom + slice_height;

                // A row is touched unless it lies entirely above the bar's
                // high or entirely below its low; boundary touch counts.
                if slice_top < bar.low_price || slice_bottom > bar.high_price {
                    continue;
                }
                if let Some((crop_top, crop_bottom)) = crop {
                    if slice_top > crop_top || slice_bottom < crop_bottom {
                        continue;
                    }
                }

                points_per_column.push((
                    row,
                    TpoCell {
                        direction: bar.direction(),
                        start_time: bar.open_time,
                        end_time: self.bar_end_time(bars, column),
                        top: slice_top,
                        bottom: slice_bottom,
                    },
                ));
            }

            // Pile each touched row to the left: the cell lands at the
            // row's current occupancy, and its time band is rewritten to
            // the bar that owns that piled column index.
            for (row, point) in points_per_column {
                let piled_column = matrix.row_count(row);
                let piled_bar = &bars[piled_column];
                matrix.set(
                    row,
                    piled_column,
                    TpoCell {
                        direction: point.direction,
                        start_time: piled_bar.open_time,
                        end_time: self.bar_end_time(bars, piled_column),
                        top: point.top,
                        bottom: point.bottom,
                    },
                );
            }

            let poc_row = analytics::point_of_control_row(&matrix);
            match analytics::point_of_control_price(&matrix, poc_row) {
                None => {
                    developing_poc.push(bar.open_time, f64::NAN);
                    developing_area_high.push(bar.open_time, f64::NAN);
                    developing_area_low.push(bar.open_time, f64::NAN);
                }
                Some(poc) => {
                    let (vah, val) = analytics::value_area(&matrix, self.value_area_percentage);
                    developing_poc.push(bar.open_time, poc);
                    developing_area_high.push(bar.open_time, vah);
                    developing_area_low.push(bar.open_time, val);
                }
            }
        }

        let poc_row = analytics::point_of_control_row(&matrix);
        let Some(point_of_control) = analytics::point_of_control_price(&matrix, poc_row) else {
            return Err(BuildError::PocRowEmpty);
        };
        let Some((tpo_count_above, tpo_count_below)) = analytics::tpo_counts_around_poc(&matrix)
        else {
            return Err(BuildError::PocRowEmpty);
        };
        let (value_area_high, value_area_low) =
            analytics::value_area(&matrix, self.value_area_percentage);
        let median = analytics::median_price(&matrix);
        let single_prints = analytics::single_prints(&matrix);
        let is_prominent = analytics::is_prominent(&matrix, self.prominence_threshold);

        Ok(ProfileModel {
            start_time: bars[0].open_time,
            end_time: bars[columns - 1].open_time,
            matrix,
            point_of_control,
            value_area_high,
            value_area_low,
            median,
            tpo_count_above,
            tpo_count_below,
            is_prominent,
            single_prints,
            developing_poc,
            developing_area_high,
            developing_area_low,
        })
    }

    fn bar_end_time(&self, bars: &[Bar], column: usize) -> DateTime<Utc> {
        if column + 1 < bars.len() {
            bars[column + 1].open_time
        } else {
            bars[column].open_time + self.bar_duration
        }
    }
}
