//! Labeled `(time, lat, lon)` grid datasets and the attribute-editing stages applied to
//! them between fetching and reduction.
//!
//! A [`GridDataset`] can only be built with a canonical `lat`/`lon` coordinate pair:
//! datasets arriving with other coordinate names (`latitude`, `longitude`) go through
//! [`GridDataset::from_raw`], which normalises them before any spatial operation can run.

use crate::types::error::DataError;
use crate::units::calendar::month_start;
use crate::units::Unit;
use chrono::NaiveDateTime;
use log::{info, warn};
use ndarray::{Array2, Array3, Axis, Zip};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const LATITUDE_NAMES: [&str; 2] = ["lat", "latitude"];
const LONGITUDE_NAMES: [&str; 2] = ["lon", "longitude"];

/// One variable of a [`RawGrid`], values flattened in `(time, lat, lon)` row-major order.
/// `null` marks a missing cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawGridVariable {
    pub units: String,
    pub values: Vec<Option<f64>>,
}

/// A grid as it is stored on disk, with whatever coordinate names the producer used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawGrid {
    #[serde(default)]
    pub product_name: Option<String>,
    pub time: Vec<NaiveDateTime>,
    pub coords: BTreeMap<String, Vec<f64>>,
    pub variables: BTreeMap<String, RawGridVariable>,
}

/// How timesteps falling in the same calendar month are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthlyAggregation {
    Sum,
    Mean,
}

/// A single gridded variable: its unit string and a `(time, lat, lon)` array.
/// Missing cells are `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridVariable {
    pub units: String,
    pub values: Array3<f64>,
}

/// A multi-variable dataset on a rectilinear lat/lon grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDataset {
    pub(crate) product_name: String,
    pub(crate) times: Vec<NaiveDateTime>,
    pub(crate) lat: Vec<f64>,
    pub(crate) lon: Vec<f64>,
    pub(crate) variables: BTreeMap<String, GridVariable>,
}

impl GridDataset {
    /// Creates an empty dataset over the given axes. Add variables with
    /// [`GridDataset::with_variable`].
    pub fn new(
        product_name: impl Into<String>,
        times: Vec<NaiveDateTime>,
        lat: Vec<f64>,
        lon: Vec<f64>,
    ) -> Self {
        Self {
            product_name: product_name.into(),
            times,
            lat,
            lon,
            variables: BTreeMap::new(),
        }
    }

    /// Adds a variable, checking that its shape matches the dataset axes.
    pub fn with_variable(
        mut self,
        name: impl Into<String>,
        units: impl Into<String>,
        values: Array3<f64>,
    ) -> Result<Self, DataError> {
        let name = name.into();
        let expected = self.shape();
        if values.dim() != expected {
            return Err(DataError::ShapeMismatch {
                product: self.product_name.clone(),
                variable: name,
                expected,
                found: vec![values.dim().0, values.dim().1, values.dim().2],
            });
        }
        self.variables.insert(
            name,
            GridVariable {
                units: units.into(),
                values,
            },
        );
        Ok(self)
    }

    /// Builds a dataset from its on-disk form, renaming the latitude/longitude
    /// coordinates to the canonical `lat`/`lon` pair.
    pub fn from_raw(raw: RawGrid) -> Result<Self, DataError> {
        let product_name = raw.product_name.unwrap_or_default();
        let (lat_name, lon_name) = normalize_coordinate_names(&product_name, &raw.coords)?;

        let mut coords = raw.coords;
        let lat = coords.remove(&lat_name).unwrap_or_default();
        let lon = coords.remove(&lon_name).unwrap_or_default();
        let mut dataset = GridDataset::new(product_name, raw.time, lat, lon);

        let shape = dataset.shape();
        for (name, variable) in raw.variables {
            let found = vec![variable.values.len()];
            let values = Array3::from_shape_vec(
                shape,
                variable
                    .values
                    .into_iter()
                    .map(|v| v.unwrap_or(f64::NAN))
                    .collect(),
            )
            .map_err(|_| DataError::ShapeMismatch {
                product: dataset.product_name.clone(),
                variable: name.clone(),
                expected: shape,
                found,
            })?;
            dataset.variables.insert(
                name,
                GridVariable {
                    units: variable.units,
                    values,
                },
            );
        }
        Ok(dataset)
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    pub fn lat(&self) -> &[f64] {
        &self.lat
    }

    pub fn lon(&self) -> &[f64] {
        &self.lon
    }

    /// `(time, lat, lon)` lengths.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.times.len(), self.lat.len(), self.lon.len())
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn variable(&self, name: &str) -> Result<&GridVariable, DataError> {
        self.variables
            .get(name)
            .ok_or_else(|| self.missing_variable(name))
    }

    pub fn variable_mut(&mut self, name: &str) -> Result<&mut GridVariable, DataError> {
        let missing = self.missing_variable(name);
        self.variables.get_mut(name).ok_or(missing)
    }

    fn missing_variable(&self, name: &str) -> DataError {
        DataError::MissingVariable {
            product: self.product_name.clone(),
            variable: name.to_string(),
        }
    }

    /// Labels the dataset with the product it came from.
    pub fn set_product_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        info!("Adding/changing product name of dataset to {}", name);
        self.product_name = name;
    }

    /// Replaces a unit descriptor the unit parser cannot read (ERA5's
    /// `m of water equivalent`) with a plain one.
    pub fn fix_unit_descriptor(&mut self, variable: &str, correct_unit: &str) -> Result<(), DataError> {
        let product = self.product_name.clone();
        let var = self.variable_mut(variable)?;
        info!(
            "Fixed unit descriptor of {} variable {} from '{}' to '{}'",
            product, variable, var.units, correct_unit
        );
        var.units = correct_unit.to_string();
        Ok(())
    }

    /// Appends `/{denominator}` to every unit that is not already a rate (`mm/day` and
    /// `m3 s-1` both are).
    ///
    /// Many files store monthly or daily accumulations with a bare `mm` or `m`; this
    /// makes the implied time base explicit so they can be converted.
    pub fn add_time_denominator(&mut self, denominator: &str) {
        info!(
            "Added the time component ({}) to the units of the dataset {}",
            denominator, self.product_name
        );
        for variable in self.variables.values_mut() {
            let is_rate = Unit::parse(&variable.units)
                .map(|unit| unit.is_rate())
                .unwrap_or_else(|_| variable.units.contains('/'));
            if !variable.units.is_empty() && !is_rate {
                variable.units = format!("{}/{}", variable.units.trim(), denominator);
            }
        }
    }

    /// Overwrites the unit label of the given variables without touching values.
    pub fn overwrite_units(&mut self, unit: &str, variables: &[&str]) -> Result<(), DataError> {
        warn!(
            "Overwriting units of {} variables {:?} with '{}', values are not rescaled",
            self.product_name, variables, unit
        );
        for name in variables {
            self.variable_mut(name)?.units = unit.to_string();
        }
        Ok(())
    }

    /// Replaces negative values by their magnitude in each listed variable that has any.
    ///
    /// Reanalysis evaporation is reported negative (downward flux convention).
    pub fn make_non_negative(&mut self, variables: &[&str]) -> Result<(), DataError> {
        let product = self.product_name.clone();
        for name in variables {
            let var = self.variable_mut(name)?;
            let min = var
                .values
                .iter()
                .copied()
                .filter(|v| !v.is_nan())
                .fold(f64::INFINITY, f64::min);
            if min < 0.0 {
                info!(
                    "The dataset ({} {}) has negative values, making it positive",
                    product, name
                );
                var.values.mapv_inplace(f64::abs);
            }
        }
        Ok(())
    }

    /// Groups the time axis into calendar months, labelled at midnight on the first of
    /// each month. Missing cells are skipped; a cell missing for the whole month stays
    /// missing.
    pub fn group_by_month(&mut self, aggregation: MonthlyAggregation) {
        info!(
            "Grouped the dataset {} to monthly values ({:?})",
            self.product_name, aggregation
        );
        let mut groups: BTreeMap<NaiveDateTime, Vec<usize>> = BTreeMap::new();
        for (index, timestamp) in self.times.iter().enumerate() {
            groups.entry(month_start(timestamp)).or_default().push(index);
        }

        for variable in self.variables.values_mut() {
            let (_, n_lat, n_lon) = variable.values.dim();
            let mut grouped = Array3::from_elem((groups.len(), n_lat, n_lon), f64::NAN);

            for (group, indices) in groups.values().enumerate() {
                let mut sum = Array2::<f64>::zeros((n_lat, n_lon));
                let mut count = Array2::<usize>::zeros((n_lat, n_lon));
                for &index in indices {
                    Zip::from(&mut sum)
                        .and(&mut count)
                        .and(&variable.values.index_axis(Axis(0), index))
                        .for_each(|s, c, &v| {
                            if !v.is_nan() {
                                *s += v;
                                *c += 1;
                            }
                        });
                }
                Zip::from(&mut grouped.index_axis_mut(Axis(0), group))
                    .and(&sum)
                    .and(&count)
                    .for_each(|out, &s, &c| {
                        if c > 0 {
                            *out = match aggregation {
                                MonthlyAggregation::Sum => s,
                                MonthlyAggregation::Mean => s / c as f64,
                            };
                        }
                    });
            }
            variable.values = grouped;
        }
        self.times = groups.into_keys().collect();
    }

    /// Mean over the spatial dimensions for each timestep, skipping missing cells.
    pub fn spatial_mean(&self, variable: &str) -> Result<Vec<f64>, DataError> {
        let var = self.variable(variable)?;
        Ok(var
            .values
            .axis_iter(Axis(0))
            .map(|layer| {
                let (sum, count) = layer
                    .iter()
                    .filter(|v| !v.is_nan())
                    .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
                if count == 0 {
                    f64::NAN
                } else {
                    sum / count as f64
                }
            })
            .collect())
    }

    /// Index of the timestep closest to `target`.
    pub fn nearest_time_index(&self, target: NaiveDateTime) -> Option<usize> {
        self.times
            .iter()
            .enumerate()
            .min_by_key(|(_, t)| (**t - target).num_seconds().abs())
            .map(|(index, _)| index)
    }
}

/// Finds the latitude and longitude coordinate names among the known variations.
fn normalize_coordinate_names(
    product: &str,
    coords: &BTreeMap<String, Vec<f64>>,
) -> Result<(String, String), DataError> {
    let find = |names: &[&str], expected: &'static str| {
        coords
            .keys()
            .find(|key| names.contains(&key.as_str()))
            .cloned()
            .ok_or_else(|| DataError::MissingCoordinate {
                product: product.to_string(),
                expected,
                found: coords.keys().cloned().collect(),
            })
    };
    let lat_name = find(&LATITUDE_NAMES, "latitude")?;
    let lon_name = find(&LONGITUDE_NAMES, "longitude")?;
    if lat_name != "lat" || lon_name != "lon" {
        info!(
            "Renamed the coordinates ({}, {}) of dataset {} to lat, lon",
            lat_name, lon_name, product
        );
    }
    Ok((lat_name, lon_name))
}

#[cfg(test)]
pub(crate) fn monthly_times(year: i32, first_month: u32, count: u32) -> Vec<NaiveDateTime> {
    use chrono::NaiveDate;
    (0..count)
        .map(|offset| {
            let month0 = first_month - 1 + offset;
            NaiveDate::from_ymd_opt(year + (month0 / 12) as i32, month0 % 12 + 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::array;

    fn raw_grid() -> RawGrid {
        RawGrid {
            product_name: Some("ERA5_Land".to_string()),
            time: monthly_times(2002, 4, 2),
            coords: BTreeMap::from([
                ("latitude".to_string(), vec![38.1, 37.9]),
                ("longitude".to_string(), vec![-119.1, -118.9]),
            ]),
            variables: BTreeMap::from([(
                "tp".to_string(),
                RawGridVariable {
                    units: "m of water equivalent".to_string(),
                    values: vec![
                        Some(1.0),
                        Some(2.0),
                        None,
                        Some(4.0),
                        Some(5.0),
                        Some(6.0),
                        Some(7.0),
                        Some(8.0),
                    ],
                },
            )]),
        }
    }

    #[test]
    fn test_from_raw_normalizes_coordinate_names() -> Result<(), Box<dyn std::error::Error>> {
        let dataset = GridDataset::from_raw(raw_grid())?;
        assert_eq!(dataset.lat(), &[38.1, 37.9]);
        assert_eq!(dataset.lon(), &[-119.1, -118.9]);
        assert_eq!(dataset.shape(), (2, 2, 2));
        let tp = dataset.variable("tp")?;
        assert!(tp.values[[0, 1, 0]].is_nan());
        assert_eq!(tp.values[[1, 1, 1]], 8.0);
        Ok(())
    }

    #[test]
    fn test_from_raw_rejects_missing_coordinates_and_bad_shapes() {
        let mut raw = raw_grid();
        raw.coords.remove("longitude");
        assert!(matches!(
            GridDataset::from_raw(raw),
            Err(DataError::MissingCoordinate { expected: "longitude", .. })
        ));

        let mut raw = raw_grid();
        raw.variables.get_mut("tp").unwrap().values.pop();
        assert!(matches!(
            GridDataset::from_raw(raw),
            Err(DataError::ShapeMismatch { found, .. }) if found == [7]
        ));

        let dataset = GridDataset::new("CRUTS", monthly_times(2001, 1, 1), vec![1.0, 2.0], vec![3.0]);
        assert!(matches!(
            dataset.with_variable("pre", "mm/month", Array3::zeros((1, 1, 2))),
            Err(DataError::ShapeMismatch { expected: (1, 2, 1), found, .. }) if found == [1, 1, 2]
        ));
    }

    #[test]
    fn test_unit_stages() -> Result<(), Box<dyn std::error::Error>> {
        let mut dataset = GridDataset::from_raw(raw_grid())?;
        dataset.fix_unit_descriptor("tp", "m")?;
        dataset.add_time_denominator("day");
        assert_eq!(dataset.variable("tp")?.units, "m/day");

        // Already a rate, left alone.
        dataset.add_time_denominator("month");
        assert_eq!(dataset.variable("tp")?.units, "m/day");

        dataset.overwrite_units("m3 s-1", &["tp"])?;
        dataset.add_time_denominator("day");
        assert_eq!(dataset.variable("tp")?.units, "m3 s-1");

        dataset.overwrite_units("mm/day", &["tp"])?;
        assert_eq!(dataset.variable("tp")?.units, "mm/day");
        assert!(dataset.overwrite_units("mm", &["pet"]).is_err());
        Ok(())
    }

    #[test]
    fn test_make_non_negative_only_touches_negative_variables() -> Result<(), Box<dyn std::error::Error>> {
        let times = monthly_times(2000, 1, 1);
        let mut dataset = GridDataset::new("ERA5_Land", times, vec![0.0], vec![0.0, 1.0])
            .with_variable("e", "m/day", array![[[-1.0, -2.0]]])?
            .with_variable("tp", "m/day", array![[[1.0, 2.0]]])?;
        dataset.make_non_negative(&["e", "tp"])?;
        assert_eq!(dataset.variable("e")?.values, array![[[1.0, 2.0]]]);
        assert_eq!(dataset.variable("tp")?.values, array![[[1.0, 2.0]]]);
        Ok(())
    }

    #[test]
    fn test_group_by_month_sum_and_mean() -> Result<(), Box<dyn std::error::Error>> {
        let day = |m, d, h| {
            NaiveDate::from_ymd_opt(1979, m, d)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap()
        };
        let times = vec![day(2, 1, 1), day(2, 15, 0), day(3, 1, 0), day(3, 2, 0)];
        let base = GridDataset::new("NWM", times, vec![38.0], vec![-119.0])
            .with_variable("inflow", "m3/s", array![[[2.0]], [[4.0]], [[f64::NAN]], [[10.0]]])?;

        let mut summed = base.clone();
        summed.group_by_month(MonthlyAggregation::Sum);
        assert_eq!(summed.times(), &[day(2, 1, 0), day(3, 1, 0)]);
        assert_eq!(summed.variable("inflow")?.values, array![[[6.0]], [[10.0]]]);

        let mut averaged = base;
        averaged.group_by_month(MonthlyAggregation::Mean);
        assert_eq!(averaged.variable("inflow")?.values, array![[[3.0]], [[10.0]]]);
        Ok(())
    }

    #[test]
    fn test_spatial_mean_skips_missing_cells() -> Result<(), Box<dyn std::error::Error>> {
        let dataset = GridDataset::from_raw(raw_grid())?;
        let means = dataset.spatial_mean("tp")?;
        assert!((means[0] - 7.0 / 3.0).abs() < 1e-12);
        assert!((means[1] - 6.5).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_nearest_time_index() -> Result<(), Box<dyn std::error::Error>> {
        let dataset = GridDataset::from_raw(raw_grid())?;
        let target = NaiveDate::from_ymd_opt(2002, 5, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(dataset.nearest_time_index(target), Some(1));
        Ok(())
    }
}
