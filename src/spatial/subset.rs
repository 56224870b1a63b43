use crate::spatial::error::SpatialError;
use crate::types::grid::{GridDataset, GridVariable};
use crate::types::lake::{BoundingBox, Lake};
use log::info;
use ndarray::{Array2, Array3, Axis, Zip};

/// Cuts `dataset` down to the smallest lat/lon block holding every cell centre inside
/// `bounds`, grown by `pad` cells on each side.
///
/// The cell mask is dilated with a centred sliding-window maximum of width `2 * pad + 1`,
/// first along latitude and then along longitude, so a single selected cell becomes a
/// `(2 * pad + 1)²` block clipped at the grid edges. Rows and columns with no selected
/// cell are dropped; unselected cells inside the kept block become `NaN`.
///
/// # Errors
///
/// [`SpatialError::EmptySelection`] when no cell centre lies inside `bounds` before
/// padding. Retrying with [`BoundingBox::buffered`] is up to the caller.
pub fn subset_box(
    dataset: &GridDataset,
    bounds: &BoundingBox,
    pad: usize,
) -> Result<GridDataset, SpatialError> {
    let (_, n_lat, n_lon) = dataset.shape();
    let mut mask = Array2::from_shape_fn((n_lat, n_lon), |(i, j)| {
        bounds.contains(dataset.lat[i], dataset.lon[j])
    });

    if !mask.iter().any(|&selected| selected) {
        return Err(SpatialError::EmptySelection {
            product: dataset.product_name().to_string(),
            bounds: *bounds,
        });
    }

    if pad > 0 {
        mask = dilate(&mask, Axis(0), pad);
        mask = dilate(&mask, Axis(1), pad);
    }

    let rows: Vec<usize> = (0..n_lat)
        .filter(|&i| mask.row(i).iter().any(|&m| m))
        .collect();
    let cols: Vec<usize> = (0..n_lon)
        .filter(|&j| mask.column(j).iter().any(|&m| m))
        .collect();
    let kept_mask = mask.select(Axis(0), &rows).select(Axis(1), &cols);

    let mut subset = GridDataset::new(
        dataset.product_name(),
        dataset.times.clone(),
        rows.iter().map(|&i| dataset.lat[i]).collect(),
        cols.iter().map(|&j| dataset.lon[j]).collect(),
    );
    for (name, variable) in &dataset.variables {
        let mut values: Array3<f64> = variable.values.select(Axis(1), &rows).select(Axis(2), &cols);
        for mut layer in values.axis_iter_mut(Axis(0)) {
            Zip::from(&mut layer).and(&kept_mask).for_each(|v, &keep| {
                if !keep {
                    *v = f64::NAN;
                }
            });
        }
        subset.variables.insert(
            name.clone(),
            GridVariable {
                units: variable.units.clone(),
                values,
            },
        );
    }

    info!(
        "Subset dataset {} from {}x{} to {}x{} cells (pad {})",
        dataset.product_name(),
        n_lat,
        n_lon,
        rows.len(),
        cols.len(),
        pad
    );
    Ok(subset)
}

/// [`subset_box`] over the bounds of a lake polygon.
pub fn subset_lake(dataset: &GridDataset, lake: &Lake, pad: usize) -> Result<GridDataset, SpatialError> {
    let bounds = lake
        .bounds()
        .ok_or_else(|| SpatialError::EmptyGeometry(lake.name.clone()))?;
    subset_box(dataset, &bounds, pad)
}

/// Centred rolling maximum of width `2 * pad + 1` along `axis`, windows clipped at the edges.
fn dilate(mask: &Array2<bool>, axis: Axis, pad: usize) -> Array2<bool> {
    let len = mask.len_of(axis);
    let mut out = Array2::from_elem(mask.dim(), false);
    for index in 0..len {
        let start = index.saturating_sub(pad);
        let end = (index + pad).min(len - 1);
        let mut lane = out.index_axis_mut(axis, index);
        for source in start..=end {
            Zip::from(&mut lane)
                .and(&mask.index_axis(axis, source))
                .for_each(|o, &m| *o |= m);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::grid::monthly_times;
    use crate::types::lake::square_lake;
    use ndarray::array;

    /// A 6x6 grid with cell centres on whole degrees 0..=5 and value `10 * lat + lon`.
    fn six_by_six() -> GridDataset {
        let coords: Vec<f64> = (0..6).map(f64::from).collect();
        let values = Array3::from_shape_fn((1, 6, 6), |(_, i, j)| (10 * i + j) as f64);
        GridDataset::new("CRUTS", monthly_times(2000, 1, 1), coords.clone(), coords)
            .with_variable("pre", "mm/month", values)
            .unwrap()
    }

    #[test]
    fn test_pad_zero_keeps_only_cells_inside_bounds() -> Result<(), Box<dyn std::error::Error>> {
        let grid = six_by_six();
        let bounds = BoundingBox::new(1.5, 2.0, 3.2, 3.0);
        let subset = subset_box(&grid, &bounds, 0)?;
        assert_eq!(subset.lat(), &[2.0, 3.0]);
        assert_eq!(subset.lon(), &[2.0, 3.0]);
        let pre = &subset.variable("pre")?.values;
        assert!(pre.iter().all(|v| !v.is_nan()));
        assert_eq!(pre[[0, 0, 0]], 22.0);
        assert_eq!(pre[[0, 1, 1]], 33.0);
        Ok(())
    }

    #[test]
    fn test_padding_grows_monotonically() -> Result<(), Box<dyn std::error::Error>> {
        let grid = six_by_six();
        let bounds = BoundingBox::new(1.9, 1.9, 2.1, 2.1);

        let mut previous = subset_box(&grid, &bounds, 0)?;
        assert_eq!(previous.lat(), &[2.0]);
        for pad in 1..=4 {
            let current = subset_box(&grid, &bounds, pad)?;
            assert!(previous.lat().iter().all(|lat| current.lat().contains(lat)));
            assert!(previous.lon().iter().all(|lon| current.lon().contains(lon)));
            assert!(current.lat().len() >= previous.lat().len());
            assert!(current.lon().len() >= previous.lon().len());
            previous = current;
        }
        // Clipped at the grid edge.
        assert_eq!(previous.lat().len(), 6);
        Ok(())
    }

    #[test]
    fn test_pad_one_around_single_cell() -> Result<(), Box<dyn std::error::Error>> {
        let grid = six_by_six();
        let subset = subset_box(&grid, &BoundingBox::new(0.0, 0.0, 0.0, 0.0), 1)?;
        assert_eq!(subset.lat(), &[0.0, 1.0]);
        assert_eq!(subset.lon(), &[0.0, 1.0]);
        assert_eq!(subset.variable("pre")?.values, array![[[0.0, 1.0], [10.0, 11.0]]]);
        Ok(())
    }

    #[test]
    fn test_polygon_outside_grid_is_empty_selection() {
        let grid = six_by_six();
        let lake = square_lake(7, 20.0, 20.0, 21.0, 21.0);
        assert!(matches!(
            subset_lake(&grid, &lake, 1),
            Err(SpatialError::EmptySelection { .. })
        ));
    }

    #[test]
    fn test_small_polygon_between_centres_needs_buffer() -> Result<(), Box<dyn std::error::Error>> {
        let grid = six_by_six();
        let lake = square_lake(8, 2.2, 2.2, 2.4, 2.4);
        assert!(subset_lake(&grid, &lake, 1).is_err());

        let buffered = lake.bounds().unwrap().buffered(0.5);
        let subset = subset_box(&grid, &buffered, 0)?;
        assert_eq!(subset.lat(), &[2.0]);
        assert_eq!(subset.lon(), &[2.0]);
        Ok(())
    }
}
