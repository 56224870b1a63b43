//! Turning gridded and tabular products into [`MetadataSeries`].

use crate::types::grid::GridDataset;
use crate::types::series::MetadataSeries;
use crate::types::table::TabularProduct;
use crate::types::variable_class::VariableClass;
use crate::units::{month_start, Unit, UnitError};
use chrono::NaiveDateTime;
use log::info;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One series per requested variable, each the spatial mean of the grid at every timestep.
///
/// Units and product name are carried over, and the variable name is mapped to its
/// [`VariableClass`] (unknown names get no class). The grid is not modified; every series
/// keeps a handle to it for raster snapshots.
pub fn grid_to_series(
    grid: &Arc<GridDataset>,
    variables: &[&str],
) -> Result<Vec<MetadataSeries>, UnitError> {
    info!(
        "Spatially averaged the dataset {} over {:?}",
        grid.product_name(),
        variables
    );
    variables
        .iter()
        .map(|&name| -> Result<MetadataSeries, UnitError> {
            let variable = grid.variable(name)?;
            let unit = Unit::parse(&variable.units)?;
            let series = MetadataSeries::new(
                grid.times().to_vec(),
                grid.spatial_mean(name)?,
                unit,
                VariableClass::from_variable_name(name),
                grid.product_name(),
                name,
            )?;
            Ok(series.with_source_grid(Arc::clone(grid)))
        })
        .collect()
}

/// One series per data column of a tabular product. Missing values become `NaN`.
pub fn series_from_table(table: &TabularProduct) -> Result<Vec<MetadataSeries>, UnitError> {
    let unit = Unit::parse(&table.units)?;
    table
        .columns
        .iter()
        .map(|(name, values)| -> Result<MetadataSeries, UnitError> {
            let values = values.iter().map(|v| v.unwrap_or(f64::NAN)).collect();
            Ok(MetadataSeries::new(
                table.time.clone(),
                values,
                unit.clone(),
                VariableClass::from_variable_name(name),
                &table.product_name,
                name.as_str(),
            )?)
        })
        .collect()
}

/// Moves every timestamp to midnight on the first of its month.
pub fn shift_to_month_start(series: &mut [MetadataSeries]) {
    for s in series {
        for t in s.times.iter_mut() {
            *t = month_start(t);
        }
    }
}

/// Replaces the series with its calendar-month means, labelled at the first of each
/// month. `NaN` values are skipped; a month with no values is `NaN`.
pub fn group_series_by_month(series: &mut MetadataSeries) {
    info!(
        "Grouping {} {} by month",
        series.product_name(),
        series.variable_name()
    );
    let mut groups: BTreeMap<NaiveDateTime, (f64, usize)> = BTreeMap::new();
    for (t, v) in series.times.iter().zip(&series.values) {
        let entry = groups.entry(month_start(t)).or_insert((0.0, 0));
        if !v.is_nan() {
            entry.0 += v;
            entry.1 += 1;
        }
    }
    let (times, values): (Vec<NaiveDateTime>, Vec<f64>) = groups
        .into_iter()
        .map(|(t, (sum, count))| {
            let mean = if count == 0 {
                f64::NAN
            } else {
                sum / count as f64
            };
            (t, mean)
        })
        .unzip();
    series.times = times;
    series.values = values;
}
