use crate::cache::CacheError;
use crate::spatial::SpatialError;
use crate::types::error::DataError;
use crate::units::UnitError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Input file '{1}' for {0} does not exist")]
    MissingInput(&'static str, PathBuf),

    #[error("Failed to read product data '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse product data '{0}'")]
    Parse(PathBuf, #[source] serde_json::Error),

    #[error("No data for feature {feature_id} in '{dir}'")]
    MissingFeature { feature_id: i64, dir: PathBuf },

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Unit(#[from] UnitError),

    #[error(transparent)]
    Spatial(#[from] SpatialError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
