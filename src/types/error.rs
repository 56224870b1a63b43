use thiserror::Error;

/// Structural problems with a grid dataset or a series.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Dataset '{product}' has no {expected} coordinate (found: {found:?})")]
    MissingCoordinate {
        product: String,
        expected: &'static str,
        found: Vec<String>,
    },

    #[error("Variable '{variable}' not found in dataset '{product}'")]
    MissingVariable { product: String, variable: String },

    /// `found` is the shape of the given values; flat file values have a single axis.
    #[error("Variable '{variable}' of dataset '{product}' has shape {found:?}, expected {expected:?} (time, lat, lon)")]
    ShapeMismatch {
        product: String,
        variable: String,
        expected: (usize, usize, usize),
        found: Vec<usize>,
    },

    #[error("Series '{variable}' of '{product}' has {times} timestamps but {values} values")]
    LengthMismatch {
        product: String,
        variable: String,
        times: usize,
        values: usize,
    },
}
