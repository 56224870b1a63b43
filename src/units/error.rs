use crate::types::error::DataError;
use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UnitError {
    #[error("Unknown unit '{symbol}' in expression '{expression}'")]
    UnknownUnit { expression: String, symbol: String },

    #[error("Unit expression '{0}' could not be parsed")]
    Malformed(String),

    #[error("The denominator of '{0}' is not a single time unit")]
    NonTimeDenominator(String),

    #[error("The output unit {to} is not a rate, but the input unit {from} is a rate")]
    RateToNonRate { from: String, to: String },

    #[error("The output unit {to} is a rate, but the input unit {from} is not a rate")]
    NonRateToRate { from: String, to: String },

    #[error("Cannot convert '{from}' to '{to}': incompatible dimensions")]
    DimensionMismatch { from: String, to: String },

    #[error("No calendar month length for timestamp {0}")]
    DateOutOfRange(NaiveDateTime),

    #[error(transparent)]
    Data(#[from] DataError),
}

impl UnitError {
    /// Whether this is one of the rate/non-rate mismatches.
    pub fn is_rate_mismatch(&self) -> bool {
        matches!(
            self,
            UnitError::RateToNonRate { .. } | UnitError::NonRateToRate { .. }
        )
    }
}
