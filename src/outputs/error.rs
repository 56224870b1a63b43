use crate::types::error::DataError;
use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output file '{0}'")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Polars operation failed")]
    Polars(#[from] PolarsError),

    #[error("Failed to serialize JSON for '{0}'")]
    Json(PathBuf, #[source] serde_json::Error),

    #[error("Failed to encode GeoTIFF '{0}'")]
    Tiff(String, #[source] tiff::TiffError),

    #[error("Failed to build zip archive '{0}'")]
    Zip(PathBuf, #[source] zip::result::ZipError),

    #[error(transparent)]
    Data(#[from] DataError),

    // Covers errors joining tokio blocking tasks
    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
