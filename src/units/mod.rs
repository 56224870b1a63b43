//! Unit parsing and month-aware unit conversion for series and grids.

pub mod calendar;
mod convert;
mod error;
mod unit;

pub use calendar::{days_in_month, month_start};
pub use convert::{
    conversion_factors, convert_all_series, convert_grid_units, convert_series_units,
    ConversionFactors,
};
pub use error::UnitError;
pub use unit::{Dimension, TimeBase, Unit};
