//! Grid subsetting by lake bounds and nearest-feature association.

pub mod error;
pub mod nearest;
pub mod subset;

pub use error::SpatialError;
pub use nearest::{
    apply_match_policy, match_lake_to_feature, nearest_feature, FeatureCandidate, FeatureMatch, MatchPolicy,
    MATCH_TOLERANCE_DEG,
};
pub use subset::{subset_box, subset_lake};
