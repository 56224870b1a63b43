//! Interactive HTML plots of the merged table, one per variable class.

use crate::outputs::error::OutputError;
use crate::outputs::table::TIME_COLUMN;
use crate::types::events::{ArtifactRole, OutputArtifact};
use crate::types::variable_class::VariableClass;
use log::info;
use plotlars::{Plot, Text, TimeSeriesPlot};
use polars::prelude::*;
use std::path::Path;

/// Writes `<output_dir>/<lake_name>_<class>.html` for every class with at least one column
/// in `frame`.
pub fn write_class_plots(
    frame: &DataFrame,
    lake_name: &str,
    output_dir: &Path,
) -> Result<Vec<OutputArtifact>, OutputError> {
    // Plot axes read dates, not datetimes.
    let dates = frame
        .column(TIME_COLUMN)?
        .cast(&DataType::Date)?
        .with_name(TIME_COLUMN.into());

    let mut artifacts = Vec::new();
    for class in VariableClass::ALL {
        let prefix = format!("{}.", class.code());
        let columns: Vec<Column> = frame
            .get_columns()
            .iter()
            .filter(|c| c.name().starts_with(&prefix))
            .cloned()
            .collect();
        let Some(first) = columns.first().map(|c| c.name().to_string()) else {
            continue;
        };
        let additional: Vec<String> = columns.iter().skip(1).map(|c| c.name().to_string()).collect();

        let mut plot_columns = vec![dates.clone()];
        plot_columns.extend(columns);
        let data = DataFrame::new(plot_columns)?;

        let path = output_dir.join(format!("{}_{}.html", lake_name, class.display_name()));
        TimeSeriesPlot::builder()
            .data(&data)
            .x(TIME_COLUMN)
            .y(&first)
            .additional_series(additional.iter().map(String::as_str).collect())
            .plot_title(Text::from(format!("{} {}", lake_name, class.display_name())))
            .x_title("time")
            .y_title(format!("{} ({})", class.display_name(), class.canonical_unit()))
            .build()
            .write_html(path.to_string_lossy().into_owned());
        info!("Plotted {} for {} to {}", class.display_name(), lake_name, path.display());

        artifacts.push(OutputArtifact::new(
            path,
            ".html",
            format!("Plot of all {} series", class.display_name()),
            ArtifactRole::Other,
        ));
    }
    Ok(artifacts)
}
