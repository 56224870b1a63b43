use crate::lakes::error::LakeLookupError;
use crate::types::lake::Lake;
use geo::{Geometry, MultiPolygon};
use geojson::{Feature, FeatureCollection};
use log::info;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const ID_PROPERTIES: [&str; 2] = ["Hylak_id", "hylak_id"];
const NAME_PROPERTIES: [&str; 2] = ["Lake_name", "lake_name"];

/// Lake polygons keyed by integer id, read from a GeoJSON export of a lakes database
/// (HydroLAKES: `Hylak_id`, `Lake_name`).
#[derive(Debug, Clone)]
pub struct LakeCatalog {
    source: PathBuf,
    features: Vec<Feature>,
}

impl LakeCatalog {
    /// Reads and parses the feature collection at `path` on a blocking thread.
    pub async fn load(path: &Path) -> Result<Self, LakeLookupError> {
        let source = path.to_path_buf();
        let text = tokio::fs::read_to_string(&source)
            .await
            .map_err(|e| LakeLookupError::Read(source.clone(), e))?;
        let features = tokio::task::spawn_blocking({
            let source = source.clone();
            move || {
                FeatureCollection::from_str(&text)
                    .map(|collection| collection.features)
                    .map_err(|e| LakeLookupError::Parse(source, Box::new(e)))
            }
        })
        .await??;
        info!("Loaded {} lakes from {}", features.len(), source.display());
        Ok(Self { source, features })
    }

    /// Builds a catalog from GeoJSON text, e.g. for tests or embedded datasets.
    pub fn from_geojson_str(text: &str) -> Result<Self, LakeLookupError> {
        let source = PathBuf::from("<memory>");
        let collection = FeatureCollection::from_str(text)
            .map_err(|e| LakeLookupError::Parse(source.clone(), Box::new(e)))?;
        Ok(Self {
            source,
            features: collection.features,
        })
    }

    /// Where the catalog was read from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Finds the lake with the given id and builds its polygon.
    pub fn lookup(&self, id: u64) -> Result<Lake, LakeLookupError> {
        let feature = self
            .features
            .iter()
            .find(|feature| feature_id(feature) == Some(id))
            .ok_or(LakeLookupError::NotFound(id))?;

        let geometry = feature
            .geometry
            .clone()
            .ok_or(LakeLookupError::MissingGeometry(id))?;
        let polygon = match Geometry::<f64>::try_from(geometry)
            .map_err(|e| LakeLookupError::Geometry(id, Box::new(e)))?
        {
            Geometry::Polygon(polygon) => MultiPolygon(vec![polygon]),
            Geometry::MultiPolygon(multi) => multi,
            other => {
                return Err(LakeLookupError::UnsupportedGeometry {
                    id,
                    kind: geometry_kind(&other).to_string(),
                })
            }
        };

        let raw_name = NAME_PROPERTIES
            .iter()
            .find_map(|key| feature.property(key).and_then(Value::as_str))
            .unwrap_or_default();
        let name = sanitize_lake_name(raw_name, id);
        info!(
            "Extracted lake {} ({}) from {}",
            id,
            name,
            self.source.display()
        );
        Ok(Lake::new(id, name, polygon))
    }
}

fn feature_id(feature: &Feature) -> Option<u64> {
    ID_PROPERTIES
        .iter()
        .find_map(|key| feature.property(key))
        .and_then(|value| {
            value
                .as_u64()
                .or_else(|| value.as_f64().filter(|v| v.fract() == 0.0 && *v >= 0.0).map(|v| v as u64))
                .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        })
}

/// `"Mono Lake"` becomes `Mono_Lake`; anything outside `[A-Za-z0-9_-]` is dropped.
/// Unnamed lakes are called `Lake_{id}`.
pub(crate) fn sanitize_lake_name(raw: &str, id: u64) -> String {
    let name = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect::<String>();
    if name.is_empty() {
        format!("Lake_{id}")
    } else {
        name
    }
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

#[cfg(test)]
pub(crate) const SAMPLE_LAKES: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "properties": { "Hylak_id": 798, "Lake_name": "Mono Lake" },
      "geometry": {
        "type": "Polygon",
        "coordinates": [[[-119.2, 37.9], [-118.9, 37.9], [-118.9, 38.1], [-119.2, 38.1], [-119.2, 37.9]]]
      }
    },
    {
      "type": "Feature",
      "properties": { "Hylak_id": 12.0, "Lake_name": "" },
      "geometry": {
        "type": "MultiPolygon",
        "coordinates": [[[[10.0, 10.0], [10.2, 10.0], [10.2, 10.2], [10.0, 10.2], [10.0, 10.0]]]]
      }
    },
    {
      "type": "Feature",
      "properties": { "Hylak_id": 13, "Lake_name": "Gauge" },
      "geometry": { "type": "Point", "coordinates": [0.0, 0.0] }
    }
  ]
}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_polygon_and_name() -> Result<(), LakeLookupError> {
        let catalog = LakeCatalog::from_geojson_str(SAMPLE_LAKES)?;
        assert_eq!(catalog.len(), 3);

        let mono = catalog.lookup(798)?;
        assert_eq!(mono.name, "Mono_Lake");
        assert_eq!(mono.polygon.0.len(), 1);
        assert!(mono.contains(38.0, -119.0));

        let unnamed = catalog.lookup(12)?;
        assert_eq!(unnamed.name, "Lake_12");
        Ok(())
    }

    #[test]
    fn test_lookup_failures() -> Result<(), LakeLookupError> {
        let catalog = LakeCatalog::from_geojson_str(SAMPLE_LAKES)?;
        assert!(matches!(catalog.lookup(1), Err(LakeLookupError::NotFound(1))));
        assert!(matches!(
            catalog.lookup(13),
            Err(LakeLookupError::UnsupportedGeometry { kind, .. }) if kind == "Point"
        ));
        Ok(())
    }

    #[test]
    fn test_sanitize_lake_name() {
        assert_eq!(sanitize_lake_name("  Lake  Titicaca ", 1), "Lake_Titicaca");
        assert_eq!(sanitize_lake_name("Lac d'Annecy", 2), "Lac_dAnnecy");
        assert_eq!(sanitize_lake_name("", 3), "Lake_3");
    }

    #[tokio::test]
    async fn test_load_from_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("lakes.geojson");
        tokio::fs::write(&path, SAMPLE_LAKES).await?;
        let catalog = LakeCatalog::load(&path).await?;
        assert_eq!(catalog.lookup(798)?.id, 798);

        let missing = LakeCatalog::load(&dir.path().join("nope.geojson")).await;
        assert!(matches!(missing, Err(LakeLookupError::Read(..))));
        Ok(())
    }
}
