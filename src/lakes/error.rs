use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LakeLookupError {
    #[error("Failed to read lake dataset '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse lake dataset '{0}' as a GeoJSON feature collection")]
    Parse(PathBuf, #[source] Box<geojson::Error>),

    #[error("Lake {0} not found in the lake dataset")]
    NotFound(u64),

    #[error("Lake {0} has no geometry")]
    MissingGeometry(u64),

    #[error("Lake {id} has a {kind} geometry, expected a Polygon or MultiPolygon")]
    UnsupportedGeometry { id: u64, kind: String },

    #[error("Failed to convert the geometry of lake {0}")]
    Geometry(u64, #[source] Box<geojson::Error>),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
