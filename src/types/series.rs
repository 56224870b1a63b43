//! The value-with-metadata series every product is reduced to before merging.

use crate::types::error::DataError;
use crate::types::grid::GridDataset;
use crate::types::variable_class::VariableClass;
use crate::units::Unit;
use chrono::NaiveDateTime;
use std::fmt;
use std::sync::Arc;

/// A time-indexed series with its physical unit, variable class and source product.
///
/// The unit is metadata: [`MetadataSeries::set_unit`] relabels without rescaling. Values
/// and unit only change together through [`crate::units::convert_series_units`].
#[derive(Debug, Clone)]
pub struct MetadataSeries {
    pub(crate) times: Vec<NaiveDateTime>,
    pub(crate) values: Vec<f64>,
    pub(crate) unit: Unit,
    class: Option<VariableClass>,
    product_name: String,
    variable_name: String,
    source_grid: Option<Arc<GridDataset>>,
}

impl MetadataSeries {
    /// Creates a series. Underscores in the product name become dashes so that the
    /// `{code}.{product}` column names stay unambiguous.
    pub fn new(
        times: Vec<NaiveDateTime>,
        values: Vec<f64>,
        unit: Unit,
        class: Option<VariableClass>,
        product_name: &str,
        variable_name: impl Into<String>,
    ) -> Result<Self, DataError> {
        let product_name = product_name.replace('_', "-");
        let variable_name = variable_name.into();
        if times.len() != values.len() {
            return Err(DataError::LengthMismatch {
                product: product_name,
                variable: variable_name,
                times: times.len(),
                values: values.len(),
            });
        }
        Ok(Self {
            times,
            values,
            unit,
            class,
            product_name,
            variable_name,
            source_grid: None,
        })
    }

    /// Attaches the grid dataset the series was reduced from.
    pub fn with_source_grid(mut self, grid: Arc<GridDataset>) -> Self {
        self.source_grid = Some(grid);
        self
    }

    pub fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    /// Changes the unit label only. Values are not rescaled.
    pub fn set_unit(&mut self, unit: Unit) {
        self.unit = unit;
    }

    pub fn class(&self) -> Option<VariableClass> {
        self.class
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn variable_name(&self) -> &str {
        &self.variable_name
    }

    pub fn source_grid(&self) -> Option<&Arc<GridDataset>> {
        self.source_grid.as_ref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `{code}.{product}`, or `None` for series without a variable class.
    pub fn column_name(&self) -> Option<String> {
        self.class
            .map(|class| format!("{}.{}", class.code(), self.product_name))
    }
}

impl fmt::Display for MetadataSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Product: {}, Variable Name: {}, SLC: {}, Unit: {}",
            self.product_name,
            self.variable_name,
            self.class
                .map(|class| class.code().to_string())
                .unwrap_or_else(|| "-".to_string()),
            self.unit
        )
    }
}
