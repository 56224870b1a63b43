use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A column-oriented product sharing one time index and one unit, as delivered by
/// point-based sources (one model feature, one gauge).
///
/// ```json
/// {
///   "product_name": "NWM",
///   "units": "m3 s-1",
///   "time": ["1979-02-01T01:00:00", "1979-02-01T02:00:00"],
///   "columns": { "inflow": [1.5, 1.7], "outflow": [1.2, null] }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularProduct {
    pub product_name: String,
    pub units: String,
    pub time: Vec<NaiveDateTime>,
    pub columns: BTreeMap<String, Vec<Option<f64>>>,
}
