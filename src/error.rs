use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::lakes::LakeLookupError;
use crate::outputs::OutputError;
use crate::sources::SourceError;
use crate::spatial::SpatialError;
use crate::types::error::DataError;
use crate::units::UnitError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HydrologyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    LakeLookup(#[from] LakeLookupError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Spatial(#[from] SpatialError),

    #[error(transparent)]
    Unit(#[from] UnitError),

    #[error(transparent)]
    Data(#[from] DataError),
}
