//! The README, the product list and the dashboard configuration written at the end of a
//! run.

use crate::config::LakeContext;
use crate::outputs::error::OutputError;
use crate::types::events::{ArtifactRole, OutputArtifact, ProductRun, ProductStatus};
use log::info;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// File name of the dashboard configuration, inside the lake's output directory.
pub const DASHBOARD_CONFIG_FILE: &str = "CONFIG.json";

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), OutputError> {
    let bytes =
        serde_json::to_vec_pretty(value).map_err(|e| OutputError::Json(path.to_path_buf(), e))?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| OutputError::Write(path.to_path_buf(), e))
}

/// Renders the README: one section per product that ran, then the files of the run.
pub fn render_readme(lake_name: &str, runs: &[ProductRun], artifacts: &[OutputArtifact]) -> String {
    let mut text = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(text, "# {}\n", lake_name.replace('_', " "));
    let _ = writeln!(text, "## Data products\n");
    if runs.is_empty() {
        let _ = writeln!(text, "No data products were loaded for this lake.\n");
    }
    for run in runs {
        let _ = writeln!(text, "### {}\n\n{}\n", run.name, run.description);
    }
    let _ = writeln!(text, "## Output files\n");
    for artifact in artifacts {
        let _ = writeln!(text, "- `{}`: {}", artifact.name, artifact.description);
    }
    text
}

/// Writes `<output_dir>/<lake>_README.md`.
pub async fn write_readme(
    context: &LakeContext,
    runs: &[ProductRun],
    artifacts: &[OutputArtifact],
) -> Result<OutputArtifact, OutputError> {
    let path = context.output_file("_README.md");
    let text = render_readme(&context.lake_name, runs, artifacts);
    tokio::fs::write(&path, text)
        .await
        .map_err(|e| OutputError::Write(path.clone(), e))?;
    info!("Wrote README to {}", path.display());
    Ok(OutputArtifact::new(
        path,
        ".md",
        "Descriptions of the data products and output files",
        ArtifactRole::ReadMe,
    ))
}

/// Writes `<output_dir>/<lake>_data_products.json`, the configured products and whether
/// each produced data.
pub async fn write_product_list(
    context: &LakeContext,
    products: &[ProductStatus],
) -> Result<OutputArtifact, OutputError> {
    let path = context.output_file("_data_products.json");
    write_json(&path, products).await?;
    info!("Wrote product list to {}", path.display());
    Ok(OutputArtifact::new(
        path,
        ".json",
        "The data products considered for this lake and whether they loaded",
        ArtifactRole::ProductList,
    ))
}

/// Maps artifact roles to file paths for the dashboard.
///
/// Single-file roles map to a path; files with [`ArtifactRole::Other`] are listed.
pub fn dashboard_config(context: &LakeContext, artifacts: &[OutputArtifact]) -> Map<String, Value> {
    let mut config = Map::new();
    let mut others = Vec::new();
    for artifact in artifacts {
        let path = json!(artifact.path.to_string_lossy());
        match artifact.role {
            ArtifactRole::Other => others.push(path),
            role => {
                config.insert(role.config_key().to_string(), path);
            }
        }
    }
    config.insert(
        ArtifactRole::Other.config_key().to_string(),
        Value::Array(others),
    );
    config.insert(
        "OUTPUT_FOLDER_LOCATION".to_string(),
        json!(context.output_dir.to_string_lossy()),
    );
    config.insert("LAKE_NAME".to_string(), json!(context.lake_name));
    config
}

/// Writes `<output_dir>/CONFIG.json` and returns its path.
pub async fn write_dashboard_config(
    context: &LakeContext,
    artifacts: &[OutputArtifact],
) -> Result<PathBuf, OutputError> {
    let path = context.output_dir.join(DASHBOARD_CONFIG_FILE);
    write_json(&path, &dashboard_config(context, artifacts)).await?;
    info!("Wrote dashboard configuration to {}", path.display());
    Ok(path)
}
