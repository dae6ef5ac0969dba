//! Dataframe and parquet exports of finished sessions. The developing
//! series are exported settled-only: the last entry reflects a bar that may
//! still be updating, so it is dropped at this boundary and nowhere else.

use std::fs::{File, create_dir_all};
use std::path::Path;

use polars::df;
use polars::prelude::{DataFrame, ParquetWriter};

use crate::constant::ProfileError;
use crate::engine::ProfileSession;
use crate::model::ProfileModel;

/// One dataframe row per price slice: band, TPO count, single-print flag.
pub fn profile_dataframe(model: &ProfileModel) -> Result<DataFrame, ProfileError> {
    let rows = model.matrix.rows();
    let mut row_index = Vec::with_capacity(rows);
    let mut bottom = Vec::with_capacity(rows);
    let mut top = Vec::with_capacity(rows);
    let mut count = Vec::with_capacity(rows);
    let mut single_print = Vec::with_capacity(rows);

    let single_rows: Vec<bool> = (0..rows)
        .map(|row| {
            model
                .single_prints
                .iter()
                .any(|band| band.bottom_row <= row && row <= band.top_row)
        })
        .collect();

    for row in 0..rows {
        let (band_bottom, band_top) = model.matrix.row_band(row);
        row_index.push(row as u32);
        bottom.push(band_bottom);
        top.push(band_top);
        count.push(model.matrix.row_count(row) as u32);
        single_print.push(single_rows[row]);
    }

    Ok(df!(
        "row" => row_index,
        "bottom" => bottom,
        "top" => top,
        "tpo_count" => count,
        "single_print" => single_print
    )?)
}

/// Settled developing POC/VAH/VAL, one row per closed bar.
pub fn developing_dataframe(model: &ProfileModel) -> Result<DataFrame, ProfileError> {
    let poc = model.developing_poc.settled();
    let vah = model.developing_area_high.settled();
    let val = model.developing_area_low.settled();

    let times: Vec<i64> = poc.iter().map(|(t, _)| t.timestamp_millis()).collect();
    let poc_values: Vec<f64> = poc.iter().map(|(_, v)| *v).collect();
    let vah_values: Vec<f64> = vah.iter().map(|(_, v)| *v).collect();
    let val_values: Vec<f64> = val.iter().map(|(_, v)| *v).collect();

    Ok(df!(
        "open_time" => times,
        "developing_poc" => poc_values,
        "developing_vah" => vah_values,
        "developing_val" => val_values
    )?)
}

/// Writes per-session profile and developing-series parquet files.
/// Sessions without a finished model are passed over.
pub fn write_parquet_snapshot(
    sessions: &[ProfileSession],
    output_dir: impl AsRef<Path>,
) -> Result<(), ProfileError> {
    let output_dir = output_dir.as_ref();
    create_dir_all(output_dir)?;

    for session in sessions {
        let Some(model) = &session.model else {
            continue;
        };
        let stamp = model.start_time.format("%Y%m%d%H%M%S");

        let mut profile_file = File::create(output_dir.join(format!("profile_{stamp}.parquet")))?;
        let mut profile_df = profile_dataframe(model)?;
        ParquetWriter::new(&mut profile_file).finish(&mut profile_df)?;

        let mut developing_file =
            File::create(output_dir.join(format!("developing_{stamp}.parquet")))?;
        let mut developing_df = developing_dataframe(model)?;
        ParquetWriter::new(&mut developing_file).finish(&mut developing_df)?;
    }

    Ok(())
}
