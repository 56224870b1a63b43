use crate::spatial::error::SpatialError;
use crate::types::lake::Lake;
use haversine::{distance, Location as HaversineLocation, Units};
use log::{error, info, warn};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Distance in degrees under which a nearest feature is accepted without a containment check.
pub const MATCH_TOLERANCE_DEG: f64 = 0.001;

/// A discrete element of a model's discretization (a lake or a stream reach).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureCandidate {
    pub feature_id: i64,
    pub lat: f64,
    pub lon: f64,
}

/// The candidate closest to a target point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatch {
    pub feature: FeatureCandidate,
    /// Position of the feature in the candidate list.
    pub index: usize,
    /// Euclidean distance in lon/lat degrees, the quantity that is minimised.
    pub distance_deg: f64,
    /// Great-circle distance, for reporting.
    pub distance_km: f64,
    /// Whether the match passed the tolerance or containment check.
    pub verified: bool,
}

/// What to do with a nearest match that fails verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Fail: the lake is outside the model domain and there is no fallback.
    #[default]
    Strict,
    /// Keep the match but mark it unverified.
    FlagUnverified,
}

/// Linear scan for the candidate nearest to `(lat, lon)` in degree space.
///
/// Returns `None` when `candidates` is empty. The match is marked verified only if it is
/// within [`MATCH_TOLERANCE_DEG`].
pub fn nearest_feature(lat: f64, lon: f64, candidates: &[FeatureCandidate]) -> Option<FeatureMatch> {
    let (index, feature, distance_deg) = candidates
        .iter()
        .enumerate()
        .map(|(index, c)| (index, c, ((c.lon - lon).powi(2) + (c.lat - lat).powi(2)).sqrt()))
        .min_by_key(|(_, _, d)| OrderedFloat(*d))?;

    let distance_km = distance(
        HaversineLocation {
            latitude: lat,
            longitude: lon,
        },
        HaversineLocation {
            latitude: feature.lat,
            longitude: feature.lon,
        },
        Units::Kilometers,
    );

    Some(FeatureMatch {
        feature: *feature,
        index,
        distance_deg,
        distance_km,
        verified: distance_deg <= MATCH_TOLERANCE_DEG,
    })
}

/// Associates a lake with the model feature nearest its polygon centroid.
///
/// A match further than [`MATCH_TOLERANCE_DEG`] whose feature point lies outside the lake
/// polygon is unreliable; `policy` decides whether that is an error.
pub fn match_lake_to_feature(
    lake: &Lake,
    candidates: &[FeatureCandidate],
    policy: MatchPolicy,
) -> Result<FeatureMatch, SpatialError> {
    info!("Searching {} features for lake {}", candidates.len(), lake.name);
    let (lat, lon) = lake
        .centroid()
        .ok_or_else(|| SpatialError::EmptyGeometry(lake.name.clone()))?;
    let mut found = nearest_feature(lat, lon, candidates).ok_or(SpatialError::NoCandidates)?;
    info!(
        "Found feature {} at (lat, lon) ({}, {}), {:.3} km from the centroid of {}",
        found.feature.feature_id, found.feature.lat, found.feature.lon, found.distance_km, lake.name
    );

    found.verified = found.verified || lake.contains(found.feature.lat, found.feature.lon);
    apply_match_policy(lake, found, policy)
}

/// Accepts a verified match; an unverified one is an error under [`MatchPolicy::Strict`].
pub fn apply_match_policy(
    lake: &Lake,
    found: FeatureMatch,
    policy: MatchPolicy,
) -> Result<FeatureMatch, SpatialError> {
    if found.verified {
        return Ok(found);
    }

    match policy {
        MatchPolicy::Strict => {
            error!("Lake {} is not in the model domain", lake.name);
            Err(SpatialError::UnreliableMatch {
                lake: lake.name.clone(),
                feature_id: found.feature.feature_id,
                lat: found.feature.lat,
                lon: found.feature.lon,
                distance_deg: found.distance_deg,
            })
        }
        MatchPolicy::FlagUnverified => {
            warn!(
                "Feature {} for lake {} is unverified ({:.5} degrees away, outside the polygon)",
                found.feature.feature_id, lake.name, found.distance_deg
            );
            Ok(found)
        }
    }
}
