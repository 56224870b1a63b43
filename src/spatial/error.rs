use crate::types::error::DataError;
use crate::types::lake::BoundingBox;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpatialError {
    #[error(
        "The selection mask for '{product}' within {bounds:?} is empty. Either the polygon does not overlap \
         the grid or it is smaller than one grid cell; in the latter case retry with a buffered polygon"
    )]
    EmptySelection {
        product: String,
        bounds: BoundingBox,
    },

    #[error("Lake '{0}' has an empty geometry")]
    EmptyGeometry(String),

    #[error("No candidate features to match against")]
    NoCandidates,

    #[error(
        "Nearest feature {feature_id} at ({lat}, {lon}) is {distance_deg:.5} degrees from lake '{lake}' \
         and outside its polygon; the lake is not in the model domain"
    )]
    UnreliableMatch {
        lake: String,
        feature_id: i64,
        lat: f64,
        lon: f64,
        distance_deg: f64,
    },

    #[error(transparent)]
    Data(#[from] DataError),
}
