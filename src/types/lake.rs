//! The lake polygon and the axis-aligned bounds derived from it.

use geo::{BoundingRect, Centroid, Contains, MultiPolygon, Point};
use serde::{Deserialize, Serialize};

/// An axis-aligned geographic box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Grows the box by `distance` degrees on every side.
    ///
    /// The bounds of a polygon buffered by `distance` are exactly these bounds, which is
    /// all the bounding-box subset ever looks at.
    pub fn buffered(&self, distance: f64) -> Self {
        Self {
            min_lon: self.min_lon - distance,
            min_lat: self.min_lat - distance,
            max_lon: self.max_lon + distance,
            max_lat: self.max_lat + distance,
        }
    }

    /// Inclusive containment test on both axes.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }
}

/// A lake boundary looked up by its integer id.
///
/// Created once per run and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Lake {
    /// The lake id in the source vector dataset (HydroLAKES `Hylak_id`).
    pub id: u64,
    /// Filesystem-safe lake name, e.g. `Mono_Lake`.
    pub name: String,
    /// The lake boundary in lon/lat degrees.
    pub polygon: MultiPolygon<f64>,
}

impl Lake {
    pub fn new(id: u64, name: impl Into<String>, polygon: MultiPolygon<f64>) -> Self {
        Self {
            id,
            name: name.into(),
            polygon,
        }
    }

    /// The bounds of the lake polygon, or `None` for an empty geometry.
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.polygon
            .bounding_rect()
            .map(|rect| BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }

    /// The polygon centroid as `(lat, lon)`.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        self.polygon.centroid().map(|point| (point.y(), point.x()))
    }

    /// Whether the lake polygon contains the given location.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.polygon.contains(&Point::new(lon, lat))
    }
}

#[cfg(test)]
pub(crate) fn square_lake(id: u64, min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Lake {
    use geo::{polygon, MultiPolygon};
    let poly = polygon![
        (x: min_lon, y: min_lat),
        (x: max_lon, y: min_lat),
        (x: max_lon, y: max_lat),
        (x: min_lon, y: max_lat),
        (x: min_lon, y: min_lat),
    ];
    Lake::new(id, format!("Lake_{id}"), MultiPolygon(vec![poly]))
}
