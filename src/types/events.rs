//! Records of what a pipeline run produced.
//!
//! Artifact writers return an [`OutputArtifact`] and product drivers return a
//! [`ProductRun`]; the pipeline collects both and forwards them to its listeners as a
//! [`PipelineEvent`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What an output file is for, as seen by the dashboard reading `CONFIG.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArtifactRole {
    /// The merged series table.
    SeriesData,
    /// The zip of gridded raster snapshots.
    GriddedDataFolder,
    /// The README document.
    ReadMe,
    /// The point geometry of the matched model feature.
    LakePointGeometry,
    /// The list of products considered during the run.
    ProductList,
    /// Anything else (plots).
    Other,
}

impl ArtifactRole {
    /// Key under which the artifact path is stored in the dashboard config.
    pub fn config_key(&self) -> &'static str {
        match self {
            ArtifactRole::SeriesData => "SERIES_DATA",
            ArtifactRole::GriddedDataFolder => "GRIDDED_DATA_FOLDER",
            ArtifactRole::ReadMe => "README",
            ArtifactRole::LakePointGeometry => "LAKE_POINT_GEOMETRY",
            ArtifactRole::ProductList => "PRODUCT_LIST",
            ArtifactRole::Other => "OTHER",
        }
    }
}

impl fmt::Display for ArtifactRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.config_key())
    }
}

/// A file written during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputArtifact {
    /// File name, without directory.
    pub name: String,
    pub path: PathBuf,
    /// File kind as an extension, e.g. `.csv`.
    pub kind: String,
    pub description: String,
    pub role: ArtifactRole,
}

impl OutputArtifact {
    pub fn new(
        path: PathBuf,
        kind: &str,
        description: impl Into<String>,
        role: ArtifactRole,
    ) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            path,
            kind: kind.to_string(),
            description: description.into(),
            role,
        }
    }
}

/// A data product that finished running, with the note it contributes to the README.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRun {
    pub name: String,
    pub description: String,
}

/// Entry of the product list: whether a configured product was run and produced data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStatus {
    pub name: String,
    pub description: String,
    pub run_on_start: bool,
    pub loaded: bool,
}

/// Notification delivered to pipeline listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    ArtifactWritten(OutputArtifact),
    ProductFinished(ProductRun),
}
