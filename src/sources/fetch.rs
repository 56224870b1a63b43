//! Where product data comes from.
//!
//! Adapters talk to a fetcher trait object instead of a concrete archive, so the archive
//! client can be swapped (a local export, an in-memory grid in tests). Fetchers are
//! blocking; adapters call them through `spawn_blocking`.

use crate::sources::error::SourceError;
use crate::spatial::FeatureCandidate;
use crate::types::grid::{GridDataset, RawGrid};
use crate::types::lake::BoundingBox;
use crate::types::table::TabularProduct;
use log::info;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Supplies a gridded product covering at least a requested region.
pub trait GridFetcher: Send + Sync {
    /// Human-readable origin, for logs.
    fn describe(&self) -> String;

    /// Checks that the fetcher can run at all (credentials, files).
    fn verify(&self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Returns a grid covering `region`. It may cover more.
    fn fetch_grid(&self, region: &BoundingBox) -> Result<GridDataset, SourceError>;
}

/// Supplies the features of a model discretization and each feature's outputs.
pub trait FeatureFetcher: Send + Sync {
    fn describe(&self) -> String;

    fn verify(&self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Every feature the model resolves, with its location.
    fn candidates(&self) -> Result<Vec<FeatureCandidate>, SourceError>;

    /// The output table of one feature.
    fn fetch_feature(&self, feature: &FeatureCandidate) -> Result<TabularProduct, SourceError>;
}

/// A grid stored as one JSON [`RawGrid`] file.
#[derive(Debug, Clone)]
pub struct LocalGridFile {
    path: PathBuf,
}

impl LocalGridFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl GridFetcher for LocalGridFile {
    fn describe(&self) -> String {
        format!("grid file {}", self.path.display())
    }

    fn verify(&self) -> Result<(), SourceError> {
        require_exists("grid file", &self.path)
    }

    fn fetch_grid(&self, region: &BoundingBox) -> Result<GridDataset, SourceError> {
        info!(
            "Reading {} for region lon [{}, {}] lat [{}, {}]",
            self.describe(),
            region.min_lon,
            region.max_lon,
            region.min_lat,
            region.max_lat
        );
        let raw: RawGrid = read_json(&self.path)?;
        Ok(GridDataset::from_raw(raw)?)
    }
}

/// A feature catalog file plus a directory of `<feature_id>.json` tables.
#[derive(Debug, Clone)]
pub struct LocalFeatureDirectory {
    catalog: PathBuf,
    dir: PathBuf,
}

impl LocalFeatureDirectory {
    pub fn new(catalog: impl Into<PathBuf>, dir: impl Into<PathBuf>) -> Self {
        Self {
            catalog: catalog.into(),
            dir: dir.into(),
        }
    }
}

impl FeatureFetcher for LocalFeatureDirectory {
    fn describe(&self) -> String {
        format!(
            "feature catalog {} with tables in {}",
            self.catalog.display(),
            self.dir.display()
        )
    }

    fn verify(&self) -> Result<(), SourceError> {
        require_exists("feature catalog", &self.catalog)?;
        require_exists("feature directory", &self.dir)
    }

    fn candidates(&self) -> Result<Vec<FeatureCandidate>, SourceError> {
        read_json(&self.catalog)
    }

    fn fetch_feature(&self, feature: &FeatureCandidate) -> Result<TabularProduct, SourceError> {
        let path = self.dir.join(format!("{}.json", feature.feature_id));
        if !path.exists() {
            return Err(SourceError::MissingFeature {
                feature_id: feature.feature_id,
                dir: self.dir.clone(),
            });
        }
        info!("Reading outputs of feature {} from {}", feature.feature_id, path.display());
        read_json(&path)
    }
}

fn require_exists(what: &'static str, path: &Path) -> Result<(), SourceError> {
    if path.exists() {
        Ok(())
    } else {
        Err(SourceError::MissingInput(what, path.to_path_buf()))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, SourceError> {
    let bytes = std::fs::read(path).map_err(|e| SourceError::Read(path.to_path_buf(), e))?;
    serde_json::from_slice(&bytes).map_err(|e| SourceError::Parse(path.to_path_buf(), e))
}

/// Runs [`GridFetcher::fetch_grid`] on a blocking thread.
pub(crate) async fn fetch_grid_blocking(
    fetcher: &Arc<dyn GridFetcher>,
    region: BoundingBox,
) -> Result<GridDataset, SourceError> {
    let fetcher = Arc::clone(fetcher);
    tokio::task::spawn_blocking(move || fetcher.fetch_grid(&region)).await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::grid::monthly_times;
    use std::collections::BTreeMap;

    #[test]
    fn test_local_grid_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("grid.json");
        let raw = RawGrid {
            product_name: None,
            time: monthly_times(2000, 1, 1),
            coords: BTreeMap::from([
                ("latitude".to_string(), vec![0.0]),
                ("longitude".to_string(), vec![0.0]),
            ]),
            variables: BTreeMap::new(),
        };
        std::fs::write(&path, serde_json::to_vec(&raw)?)?;

        let fetcher = LocalGridFile::new(&path);
        fetcher.verify()?;
        let grid = fetcher.fetch_grid(&BoundingBox::new(0.0, 0.0, 1.0, 1.0))?;
        assert_eq!(grid.shape(), (1, 1, 1));

        let missing = LocalGridFile::new(dir.path().join("nope.json"));
        assert!(matches!(missing.verify(), Err(SourceError::MissingInput(..))));
        assert!(matches!(
            missing.fetch_grid(&BoundingBox::new(0.0, 0.0, 1.0, 1.0)),
            Err(SourceError::Read(..))
        ));
        Ok(())
    }

    #[test]
    fn test_local_feature_directory() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let catalog = dir.path().join("features.json");
        let tables = dir.path().join("features");
        std::fs::create_dir(&tables)?;
        std::fs::write(
            &catalog,
            r#"[{ "feature_id": 166899229, "lat": 38.0, "lon": -119.0 }]"#,
        )?;
        std::fs::write(
            tables.join("166899229.json"),
            r#"{ "product_name": "NWM", "units": "m3 s-1",
                 "time": ["1979-02-01T01:00:00"], "columns": { "inflow": [2.5] } }"#,
        )?;

        let fetcher = LocalFeatureDirectory::new(&catalog, &tables);
        fetcher.verify()?;
        let candidates = fetcher.candidates()?;
        assert_eq!(candidates[0].feature_id, 166899229);
        let table = fetcher.fetch_feature(&candidates[0])?;
        assert_eq!(table.columns["inflow"], vec![Some(2.5)]);

        let unknown = FeatureCandidate {
            feature_id: 1,
            lat: 0.0,
            lon: 0.0,
        };
        assert!(matches!(
            fetcher.fetch_feature(&unknown),
            Err(SourceError::MissingFeature { feature_id: 1, .. })
        ));
        Ok(())
    }
}
