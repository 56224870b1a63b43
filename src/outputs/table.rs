//! The merged series table and its CSV form.

use crate::outputs::error::OutputError;
use crate::types::events::{ArtifactRole, OutputArtifact};
use crate::types::series::MetadataSeries;
use crate::types::variable_class::VariableClass;
use chrono::NaiveDateTime;
use log::{info, warn};
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

/// Name of the time column in the merged table.
pub const TIME_COLUMN: &str = "time";

/// Outer-joins the series on time into one frame: a `time` column followed by one
/// `{code}.{product}` column per series, grouped by variable class.
///
/// Series without a class are left out. If two series share a column name only the first
/// is kept. Missing and `NaN` values become nulls.
pub fn merge_series_into_frame(series: &[MetadataSeries]) -> Result<DataFrame, OutputError> {
    let times: BTreeSet<NaiveDateTime> = series
        .iter()
        .filter(|s| s.class().is_some())
        .flat_map(|s| s.times().iter().copied())
        .collect();
    let times: Vec<NaiveDateTime> = times.into_iter().collect();

    let millis: Vec<i64> = times
        .iter()
        .map(|t| t.and_utc().timestamp_millis())
        .collect();
    let mut columns = vec![Series::new(TIME_COLUMN.into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        .into_column()];

    let mut seen = HashSet::new();
    for class in VariableClass::ALL {
        for s in series.iter().filter(|s| s.class() == Some(class)) {
            let Some(name) = s.column_name() else {
                continue;
            };
            if !seen.insert(name.clone()) {
                warn!("Duplicate column {} in merged table, keeping the first", name);
                continue;
            }
            let by_time: BTreeMap<&NaiveDateTime, f64> = s.times().iter().zip(s.values().iter().copied()).collect();
            let values: Vec<Option<f64>> = times
                .iter()
                .map(|t| by_time.get(t).copied().filter(|v| !v.is_nan()))
                .collect();
            columns.push(Series::new(name.as_str().into(), values).into_column());
        }
    }

    let skipped = series.iter().filter(|s| s.class().is_none()).count();
    if skipped > 0 {
        info!("{} series without a variable class left out of the table", skipped);
    }
    Ok(DataFrame::new(columns)?)
}

/// Writes `frame` as CSV with a header row.
pub async fn write_csv(frame: &DataFrame, path: &Path) -> Result<OutputArtifact, OutputError> {
    let mut frame = frame.clone();
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<(), OutputError> {
        let mut file =
            std::fs::File::create(&target).map_err(|e| OutputError::Write(target.clone(), e))?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut frame)?;
        Ok(())
    })
    .await??;
    info!("Wrote merged series table to {}", path.display());
    Ok(OutputArtifact::new(
        path.to_path_buf(),
        ".csv",
        "A csv file of all data in the dashboard, one column per product variable",
        ArtifactRole::SeriesData,
    ))
}
