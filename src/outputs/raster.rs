//! GeoTIFF snapshots of the gridded products, bundled into one zip per lake.
//!
//! Each gridded series contributes one single-band `f64` raster: its source grid at the
//! timestep nearest the snapshot date. Rasters are georeferenced in EPSG:4326 with the
//! pixel-scale, tiepoint and geokey tags, and `NaN` declared as nodata.

use crate::outputs::error::OutputError;
use crate::types::events::{ArtifactRole, OutputArtifact};
use crate::types::series::MetadataSeries;
use chrono::NaiveDate;
use log::{info, warn};
use ndarray::{ArrayView2, Axis};
use std::io::{Cursor, Write};
use std::path::Path;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const MODEL_PIXEL_SCALE_TAG: u16 = 33550;
const MODEL_TIEPOINT_TAG: u16 = 33922;
const GEO_KEY_DIRECTORY_TAG: u16 = 34735;
const GDAL_NODATA_TAG: u16 = 42113;

/// Geographic model, pixel-is-area, EPSG:4326.
const WGS84_GEO_KEYS: [u16; 16] = [
    1, 1, 0, 3, //
    1024, 0, 1, 2, //
    1025, 0, 1, 1, //
    2048, 0, 1, 4326,
];

/// Cell size used when an axis has a single coordinate.
const FALLBACK_CELL_DEGREES: f64 = 0.1;

fn cell_size(coords: &[f64]) -> f64 {
    match coords {
        [a, b, ..] => (b - a).abs(),
        _ => FALLBACK_CELL_DEGREES,
    }
}

/// Encodes a `(lat, lon)` layer as a GeoTIFF, rows ordered north to south.
pub fn encode_geotiff(
    layer: ArrayView2<f64>,
    lat: &[f64],
    lon: &[f64],
) -> Result<Vec<u8>, tiff::TiffError> {
    let (height, width) = layer.dim();
    let south_first = lat.len() > 1 && lat[0] < lat[lat.len() - 1];
    let mut data = Vec::with_capacity(height * width);
    let rows: Vec<usize> = if south_first {
        (0..height).rev().collect()
    } else {
        (0..height).collect()
    };
    for i in rows {
        data.extend(layer.row(i).iter().copied());
    }

    let dx = cell_size(lon);
    let dy = cell_size(lat);
    let west = lon.iter().copied().fold(f64::INFINITY, f64::min) - dx / 2.0;
    let north = lat.iter().copied().fold(f64::NEG_INFINITY, f64::max) + dy / 2.0;

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buffer)?;
        let mut image = encoder.new_image::<colortype::Gray64Float>(width as u32, height as u32)?;
        let directory = image.encoder();
        directory.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE_TAG), &[dx, dy, 0.0][..])?;
        directory.write_tag(
            Tag::Unknown(MODEL_TIEPOINT_TAG),
            &[0.0, 0.0, 0.0, west, north, 0.0][..],
        )?;
        directory.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY_TAG), &WGS84_GEO_KEYS[..])?;
        directory.write_tag(Tag::Unknown(GDAL_NODATA_TAG), "nan")?;
        image.write_data(&data)?;
    }
    Ok(buffer.into_inner())
}

/// Name of the zip holding the snapshots taken on `date`.
pub fn snapshot_zip_name(lake_name: &str, date: NaiveDate) -> String {
    format!(
        "{}_gridded_data_layers_on_{}.zip",
        lake_name,
        date.format("%Y%m%d")
    )
}

/// Builds one GeoTIFF per gridded series at the timestep nearest `date` and writes them
/// into `<output_dir>/<lake>_gridded_data_layers_on_<YYYYMMDD>.zip`.
///
/// Returns `Ok(None)` when no series carries a source grid.
pub async fn write_snapshot_zip(
    series: &[MetadataSeries],
    lake_name: &str,
    date: NaiveDate,
    output_dir: &Path,
) -> Result<Option<OutputArtifact>, OutputError> {
    let target = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    let stamp = date.format("%Y%m%d").to_string();

    let mut layers = Vec::new();
    for s in series {
        let (Some(grid), Some(class)) = (s.source_grid(), s.class()) else {
            continue;
        };
        let Some(index) = grid.nearest_time_index(target) else {
            warn!("{} has no timesteps, no snapshot written", grid.product_name());
            continue;
        };
        let name = format!(
            "{}_{}_{}_{}.tif",
            class.code(),
            s.product_name(),
            lake_name,
            stamp
        );
        let variable = grid.variable(s.variable_name())?;
        let layer = variable.values.index_axis(Axis(0), index);
        let bytes = encode_geotiff(layer, grid.lat(), grid.lon())
            .map_err(|e| OutputError::Tiff(name.clone(), e))?;
        info!(
            "Snapshot of {} {} at {} as {}",
            s.product_name(),
            s.variable_name(),
            grid.times()[index],
            name
        );
        layers.push((name, bytes));
    }
    if layers.is_empty() {
        return Ok(None);
    }

    let path = output_dir.join(snapshot_zip_name(lake_name, date));
    let zip_path = path.clone();
    tokio::task::spawn_blocking(move || write_zip(&zip_path, layers)).await??;

    Ok(Some(OutputArtifact::new(
        path,
        ".zip",
        "Gridded data layers of each gridded product near the snapshot date, as GeoTIFFs",
        ArtifactRole::GriddedDataFolder,
    )))
}

fn write_zip(path: &Path, layers: Vec<(String, Vec<u8>)>) -> Result<(), OutputError> {
    let file =
        std::fs::File::create(path).map_err(|e| OutputError::Write(path.to_path_buf(), e))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in layers {
        zip.start_file(name, options)
            .map_err(|e| OutputError::Zip(path.to_path_buf(), e))?;
        zip.write_all(&bytes)
            .map_err(|e| OutputError::Write(path.to_path_buf(), e))?;
    }
    zip.finish().map_err(|e| OutputError::Zip(path.to_path_buf(), e))?;
    info!("Wrote gridded data layers to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduction::grid_to_series;
    use crate::types::grid::{monthly_times, GridDataset};
    use ndarray::array;
    use std::sync::Arc;
    use tiff::decoder::{Decoder, DecodingResult};

    #[test]
    fn test_geotiff_rows_north_first() -> Result<(), Box<dyn std::error::Error>> {
        // Latitude ascending, so the last row is the northernmost.
        let layer = array![[1.0, 2.0, 3.0], [4.0, 5.0, f64::NAN]];
        let bytes = encode_geotiff(layer.view(), &[10.0, 10.5], &[20.0, 20.5, 21.0])?;

        let mut decoder = Decoder::new(Cursor::new(bytes))?;
        assert_eq!(decoder.dimensions()?, (3, 2));
        let scale = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE_TAG))?;
        assert_eq!(scale, vec![0.5, 0.5, 0.0]);
        let tiepoint = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT_TAG))?;
        assert_eq!(tiepoint[3..5], [19.75, 10.75]);

        match decoder.read_image()? {
            DecodingResult::F64(values) => {
                assert_eq!(values[..2], [4.0, 5.0]);
                assert!(values[2].is_nan());
                assert_eq!(values[3..], [1.0, 2.0, 3.0]);
            }
            _ => panic!("expected f64 samples"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_snapshot_zip() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let grid = Arc::new(
            GridDataset::new("CRUTS", monthly_times(2002, 4, 3), vec![38.0], vec![-119.0])
                .with_variable("pre", "mm/month", array![[[1.0]], [[2.0]], [[3.0]]])?
                .with_variable("swvl1", "m3 m-3", array![[[0.1]], [[0.2]], [[0.3]]])?,
        );
        let series = grid_to_series(&grid, &["pre", "swvl1"])?;
        let date = NaiveDate::from_ymd_opt(2002, 5, 1).unwrap();

        let artifact = write_snapshot_zip(&series, "Mono_Lake", date, dir.path())
            .await?
            .unwrap();
        assert_eq!(artifact.name, "Mono_Lake_gridded_data_layers_on_20020501.zip");
        assert_eq!(artifact.role, ArtifactRole::GriddedDataFolder);

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&artifact.path)?)?;
        assert_eq!(archive.len(), 1);
        let name = archive.by_index(0)?.name().to_string();
        assert_eq!(name, "p_CRUTS_Mono_Lake_20020501.tif");

        assert!(write_snapshot_zip(&[], "Mono_Lake", date, dir.path()).await?.is_none());
        Ok(())
    }
}
