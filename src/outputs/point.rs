use crate::outputs::error::OutputError;
use crate::sources::GeodataPoint;
use crate::types::events::{ArtifactRole, OutputArtifact};
use geojson::{Feature, FeatureCollection, Geometry, Value};
use log::info;
use serde_json::{json, Map};
use std::path::Path;

/// Writes the matched model feature of `product` as a one-point GeoJSON collection,
/// `<output_dir>/<lake>_<product>_lake_point.geojson`.
pub async fn write_point_geometry(
    point: &GeodataPoint,
    product: &str,
    lake_name: &str,
    output_dir: &Path,
) -> Result<OutputArtifact, OutputError> {
    let mut properties = Map::new();
    properties.insert("product".to_string(), json!(product));
    properties.insert("lake".to_string(), json!(lake_name));
    properties.insert("feature_id".to_string(), json!(point.feature_id));
    properties.insert("verified".to_string(), json!(point.verified));

    let collection = FeatureCollection {
        bbox: None,
        features: vec![Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![point.lon, point.lat]))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }],
        foreign_members: None,
    };

    let path = output_dir.join(format!("{}_{}_lake_point.geojson", lake_name, product));
    tokio::fs::write(&path, collection.to_string())
        .await
        .map_err(|e| OutputError::Write(path.clone(), e))?;
    info!(
        "Wrote {} feature {} location to {}",
        product,
        point.feature_id,
        path.display()
    );
    Ok(OutputArtifact::new(
        path,
        ".geojson",
        format!("Location of the {} model lake the {} data was taken from", product, product),
        ArtifactRole::LakePointGeometry,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_point_geometry_round_trips_through_geojson() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let point = GeodataPoint {
            feature_id: 166899229,
            lat: 38.0,
            lon: -119.0,
            verified: false,
        };
        let artifact = write_point_geometry(&point, "NWM", "Mono_Lake", dir.path()).await?;
        assert_eq!(artifact.name, "Mono_Lake_NWM_lake_point.geojson");

        let text = tokio::fs::read_to_string(&artifact.path).await?;
        let collection = FeatureCollection::from_str(&text)?;
        let feature = &collection.features[0];
        assert_eq!(
            feature.geometry.as_ref().map(|g| g.value.clone()),
            Some(Value::Point(vec![-119.0, 38.0]))
        );
        assert_eq!(feature.property("feature_id"), Some(&json!(166899229)));
        assert_eq!(feature.property("verified"), Some(&json!(false)));
        Ok(())
    }
}
