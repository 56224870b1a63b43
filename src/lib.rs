pub mod cache;
pub mod config;
mod error;
pub mod lakes;
pub mod outputs;
mod pipeline;
pub mod reduction;
pub mod sources;
pub mod spatial;
pub mod types;
pub mod units;
mod utils;

pub use error::HydrologyError;
pub use pipeline::*;

pub use cache::{CacheError, ProductCache};
pub use config::{
    ConfigError, GridProductSettings, LakeContext, NwmSettings, PipelineConfig, ProductSettings,
};
pub use lakes::{LakeCatalog, LakeLookupError};
pub use outputs::OutputError;
pub use reduction::{group_series_by_month, grid_to_series, series_from_table, shift_to_month_start};
pub use sources::{
    Cruts, DataProduct, DataSource, Era5Land, FeatureFetcher, GeodataMode, GeodataPoint,
    GridFetcher, LocalFeatureDirectory, LocalGridFile, Nwm, SourceError, SubsetSettings,
};
pub use spatial::{
    match_lake_to_feature, nearest_feature, subset_box, subset_lake, FeatureCandidate,
    FeatureMatch, MatchPolicy, SpatialError,
};
pub use units::{Unit, UnitError};
pub use utils::default_output_root;

pub use types::error::DataError;
pub use types::events::{ArtifactRole, OutputArtifact, PipelineEvent, ProductRun, ProductStatus};
pub use types::grid::{GridDataset, GridVariable, MonthlyAggregation, RawGrid, RawGridVariable};
pub use types::lake::{BoundingBox, Lake};
pub use types::series::MetadataSeries;
pub use types::table::TabularProduct;
pub use types::variable_class::VariableClass;
