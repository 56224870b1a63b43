//! Defines the closed set of variable classes used to group series in the output table,
//! and the lookup from raw product variable names to those classes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of water-balance term a series describes.
///
/// Used purely as a grouping and display key: the merged table column for a series is
/// `{code}.{product}`, and plots are drawn one panel per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VariableClass {
    /// Precipitation over the lake.
    Precipitation,
    /// Evaporation (actual or potential) from the lake surface.
    Evaporation,
    /// Water entering the lake (runoff, stream inflow).
    Inflow,
    /// Water leaving the lake.
    Outflow,
}

impl VariableClass {
    /// All classes, in the column order of the merged table.
    pub const ALL: [VariableClass; 4] = [
        VariableClass::Precipitation,
        VariableClass::Evaporation,
        VariableClass::Inflow,
        VariableClass::Outflow,
    ];

    /// Maps a raw product variable name to its class.
    ///
    /// Unrecognised names map to `None` rather than failing; such series are kept but
    /// do not appear in the merged table.
    ///
    /// # Examples
    ///
    /// ```
    /// use lake_hydrology::VariableClass;
    ///
    /// assert_eq!(VariableClass::from_variable_name("tp"), Some(VariableClass::Precipitation));
    /// assert_eq!(VariableClass::from_variable_name("pet"), Some(VariableClass::Evaporation));
    /// assert_eq!(VariableClass::from_variable_name("t2m"), None);
    /// ```
    pub fn from_variable_name(name: &str) -> Option<Self> {
        match name {
            "e" | "pet" | "evap" | "evaow" => Some(VariableClass::Evaporation),
            "p" | "tp" | "pre" | "precip" | "precipitation" => Some(VariableClass::Precipitation),
            "r" | "ro" | "runoff" | "inflow" => Some(VariableClass::Inflow),
            "outflow" => Some(VariableClass::Outflow),
            _ => None,
        }
    }

    /// The single-letter code used in column names.
    pub fn code(&self) -> char {
        match self {
            VariableClass::Precipitation => 'p',
            VariableClass::Evaporation => 'e',
            VariableClass::Inflow => 'i',
            VariableClass::Outflow => 'o',
        }
    }

    /// Parses a single-letter code back into a class.
    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.code() == code)
    }

    /// Short human-readable name, used for plot axis labels.
    pub fn display_name(&self) -> &'static str {
        match self {
            VariableClass::Precipitation => "precip",
            VariableClass::Evaporation => "evap",
            VariableClass::Inflow => "inflow",
            VariableClass::Outflow => "outflow",
        }
    }

    /// The unit every series of this class is converted to before merging.
    pub fn canonical_unit(&self) -> &'static str {
        match self {
            VariableClass::Precipitation | VariableClass::Evaporation => "mm/month",
            VariableClass::Inflow | VariableClass::Outflow => "m^3/month",
        }
    }
}

impl fmt::Display for VariableClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_table_covers_product_names() {
        assert_eq!(
            VariableClass::from_variable_name("pre"),
            Some(VariableClass::Precipitation)
        );
        assert_eq!(
            VariableClass::from_variable_name("e"),
            Some(VariableClass::Evaporation)
        );
        assert_eq!(
            VariableClass::from_variable_name("runoff"),
            Some(VariableClass::Inflow)
        );
        assert_eq!(
            VariableClass::from_variable_name("outflow"),
            Some(VariableClass::Outflow)
        );
        assert_eq!(VariableClass::from_variable_name("water_sfc_elev"), None);
    }

    #[test]
    fn test_code_roundtrip() {
        for class in VariableClass::ALL {
            assert_eq!(VariableClass::from_code(class.code()), Some(class));
        }
        assert_eq!(VariableClass::from_code('x'), None);
    }
}
