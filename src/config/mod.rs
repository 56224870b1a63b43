//! Run configuration and the per-lake context derived from it.
//!
//! Nothing here is global: a [`PipelineConfig`] is built once (from a JSON file or with
//! its builder) and every stage receives the [`LakeContext`] it needs explicitly.

pub mod error;

use crate::spatial::MatchPolicy;
use crate::types::lake::Lake;
use crate::utils::{default_output_root, ensure_dir_exists};
use bon::Builder;
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use error::ConfigError;

const SAVE_FILES_DIR_NAME: &str = "save_files";

fn default_subset_pad() -> usize {
    1
}

fn default_buffer_degrees() -> f64 {
    0.5
}

fn default_snapshot_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2002, 5, 1).unwrap_or_default()
}

fn default_true() -> bool {
    true
}

/// Settings for a gridded product read from a local file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridProductSettings {
    /// Whether the product runs as part of [`crate::LakePipeline::run`].
    #[serde(default = "default_true")]
    pub run_on_start: bool,
    /// A JSON grid file (see [`crate::RawGrid`]).
    pub data_file: PathBuf,
}

/// Settings for the National Water Model lake outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NwmSettings {
    #[serde(default = "default_true")]
    pub run_on_start: bool,
    /// JSON list of `{ feature_id, lat, lon }` lake features.
    pub feature_catalog: PathBuf,
    /// Directory holding one `<feature_id>.json` table per feature.
    pub feature_dir: PathBuf,
    #[serde(default)]
    pub match_policy: MatchPolicy,
}

/// Which products to run and where their data lives. Absent products are skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductSettings {
    pub era5_land: Option<GridProductSettings>,
    pub cruts: Option<GridProductSettings>,
    pub nwm: Option<NwmSettings>,
}

/// Configuration of a pipeline run.
///
/// # Examples
///
/// ```
/// use lake_hydrology::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .lakes_geojson("data/lakes.geojson")
///     .output_root("/tmp/glhe")
///     .build();
/// assert_eq!(config.subset_pad, 1);
/// assert_eq!(config.buffer_degrees, 0.5);
/// assert!(!config.run_cleanly);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
pub struct PipelineConfig {
    /// Root under which one folder per lake is created.
    #[serde(default = "default_output_root")]
    #[builder(into, default = default_output_root())]
    pub output_root: PathBuf,

    /// GeoJSON feature collection of lake polygons with `Hylak_id` and `Lake_name` properties.
    #[builder(into)]
    pub lakes_geojson: PathBuf,

    /// Ignore cached product data and fetch everything again.
    #[serde(default)]
    #[builder(default)]
    pub run_cleanly: bool,

    /// Cells of padding around the lake bounds when subsetting grids.
    #[serde(default = "default_subset_pad")]
    #[builder(default = default_subset_pad())]
    pub subset_pad: usize,

    /// Buffer in degrees applied to the lake bounds when a grid is too coarse for them.
    #[serde(default = "default_buffer_degrees")]
    #[builder(default = default_buffer_degrees())]
    pub buffer_degrees: f64,

    /// Date of the gridded raster snapshots.
    #[serde(default = "default_snapshot_date")]
    #[builder(default = default_snapshot_date())]
    pub snapshot_date: NaiveDate,

    #[serde(default)]
    #[builder(default)]
    pub products: ProductSettings,
}

impl PipelineConfig {
    /// Reads a JSON configuration file.
    pub async fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config: PipelineConfig = serde_json::from_str(&text)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        info!("Loaded pipeline configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.buffer_degrees.is_finite() || self.buffer_degrees < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "buffer_degrees must be a non-negative number, got {}",
                self.buffer_degrees
            )));
        }
        Ok(())
    }
}

/// Per-lake output locations.
#[derive(Debug, Clone, PartialEq)]
pub struct LakeContext {
    pub lake_name: String,
    /// `<output_root>/<lake_name>`
    pub output_dir: PathBuf,
    /// `<output_dir>/save_files`, home of the product cache.
    pub save_files_dir: PathBuf,
    pub snapshot_date: NaiveDate,
}

impl LakeContext {
    /// Derives the lake's directories from `config` and creates them.
    pub async fn prepare(config: &PipelineConfig, lake: &Lake) -> Result<Self, ConfigError> {
        let output_dir = config.output_root.join(&lake.name);
        let save_files_dir = output_dir.join(SAVE_FILES_DIR_NAME);
        for dir in [&output_dir, &save_files_dir] {
            ensure_dir_exists(dir)
                .await
                .map_err(|e| ConfigError::DirCreation(dir.clone(), e))?;
        }
        info!("Output directory for {}: {}", lake.name, output_dir.display());
        Ok(Self {
            lake_name: lake.name.clone(),
            output_dir,
            save_files_dir,
            snapshot_date: config.snapshot_date,
        })
    }

    /// `<output_dir>/<lake_name><suffix>`
    pub fn output_file(&self, suffix: &str) -> PathBuf {
        self.output_dir.join(format!("{}{}", self.lake_name, suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::lake::square_lake;

    #[test]
    fn test_json_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let config: PipelineConfig = serde_json::from_str(
            r#"{
                "lakes_geojson": "lakes.geojson",
                "products": {
                    "cruts": { "data_file": "cru.json" },
                    "nwm": {
                        "run_on_start": false,
                        "feature_catalog": "nwm/features.json",
                        "feature_dir": "nwm/features",
                        "match_policy": "flag_unverified"
                    }
                }
            }"#,
        )?;
        assert_eq!(config.subset_pad, 1);
        assert_eq!(config.snapshot_date, NaiveDate::from_ymd_opt(2002, 5, 1).unwrap());
        assert!(config.output_root.ends_with("glhe_output"));
        assert!(config.products.era5_land.is_none());
        assert!(config.products.cruts.as_ref().unwrap().run_on_start);
        let nwm = config.products.nwm.as_ref().unwrap();
        assert!(!nwm.run_on_start);
        assert_eq!(nwm.match_policy, MatchPolicy::FlagUnverified);
        Ok(())
    }

    #[tokio::test]
    async fn test_from_file_validates() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, r#"{ "lakes_geojson": "l.geojson", "buffer_degrees": -1.0 }"#)
            .await?;
        assert!(matches!(
            PipelineConfig::from_file(&path).await,
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PipelineConfig::from_file(&dir.path().join("missing.json")).await,
            Err(ConfigError::Read(..))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_prepare_creates_lake_directories() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let config = PipelineConfig::builder()
            .lakes_geojson("lakes.geojson")
            .output_root(dir.path())
            .build();
        let lake = square_lake(798, 0.0, 0.0, 1.0, 1.0);
        let context = LakeContext::prepare(&config, &lake).await?;
        assert_eq!(context.output_dir, dir.path().join("Lake_798"));
        assert!(context.save_files_dir.is_dir());
        assert_eq!(
            context.output_file("_Data.csv"),
            dir.path().join("Lake_798").join("Lake_798_Data.csv")
        );
        Ok(())
    }
}
