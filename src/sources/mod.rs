//! Data products: adapters that fetch a product for one lake and reduce it to series.
//!
//! Every adapter implements [`DataSource`]. The pipeline holds them as [`DataProduct`]
//! values, which dispatch to the concrete adapter without boxing.

pub mod cruts;
pub mod era5_land;
pub mod error;
pub mod fetch;
pub mod nwm;

use crate::cache::ProductCache;
use crate::config::PipelineConfig;
use crate::reduction::{grid_to_series, shift_to_month_start};
use crate::spatial::{subset_box, SpatialError};
use crate::types::grid::GridDataset;
use crate::types::lake::{BoundingBox, Lake};
use crate::types::series::MetadataSeries;
use log::{error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

pub use cruts::Cruts;
pub use era5_land::Era5Land;
pub use error::SourceError;
pub use fetch::{FeatureFetcher, GridFetcher, LocalFeatureDirectory, LocalGridFile};
pub use nwm::Nwm;

/// The model feature a point-geodata product was extracted at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeodataPoint {
    pub feature_id: i64,
    pub lat: f64,
    pub lon: f64,
    pub verified: bool,
}

/// Which spatial companion file a product contributes to the outputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeodataMode {
    /// Raster snapshots of the source grid.
    Grid,
    /// A point file at the matched feature.
    Point(GeodataPoint),
    None,
}

/// How gridded products are cut down to a lake.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubsetSettings {
    /// Cells of padding around the lake bounds.
    pub pad: usize,
    /// Buffer in degrees for the retry when the lake falls between cell centres.
    pub buffer_degrees: f64,
}

impl Default for SubsetSettings {
    fn default() -> Self {
        Self {
            pad: 1,
            buffer_degrees: 0.5,
        }
    }
}

impl SubsetSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            pad: config.subset_pad,
            buffer_degrees: config.buffer_degrees,
        }
    }

    /// Cache header text; a subset cut with other settings is not reused.
    pub(crate) fn cache_key(&self) -> String {
        format!("pad={} buffer={}", self.pad, self.buffer_degrees)
    }
}

/// A product that can be run for one lake.
#[allow(async_fn_in_trait)]
pub trait DataSource {
    /// Product name, used for cache files, logs and the product list.
    fn name(&self) -> &'static str;

    /// Note added to the README when the product ran.
    fn readme_description(&self) -> &'static str;

    /// Whether the product runs as part of a default pipeline run.
    fn run_on_start(&self) -> bool;

    /// Checks that the product's inputs are reachable before anything is fetched.
    fn verify_inputs(&self) -> Result<(), SourceError>;

    /// The spatial companion file this product contributes, once it has run.
    fn geodata(&self) -> GeodataMode;

    /// Fetches (or loads from `cache`) the product for `lake` and reduces it to series
    /// in canonical units with month-start timestamps.
    async fn product_driver(
        &mut self,
        lake: &Lake,
        cache: &ProductCache,
    ) -> Result<Vec<MetadataSeries>, SourceError>;
}

/// The products the pipeline knows how to run.
pub enum DataProduct {
    Era5Land(Era5Land),
    Cruts(Cruts),
    Nwm(Nwm),
}

impl DataProduct {
    /// The products configured in `config`, in README order.
    pub fn from_config(config: &PipelineConfig) -> Vec<DataProduct> {
        let subset = SubsetSettings::from_config(config);
        let mut products = Vec::new();
        if let Some(settings) = &config.products.era5_land {
            products.push(DataProduct::Era5Land(
                Era5Land::builder()
                    .fetcher(Arc::new(LocalGridFile::new(&settings.data_file)))
                    .run_on_start(settings.run_on_start)
                    .subset(subset)
                    .build(),
            ));
        }
        if let Some(settings) = &config.products.cruts {
            products.push(DataProduct::Cruts(
                Cruts::builder()
                    .fetcher(Arc::new(LocalGridFile::new(&settings.data_file)))
                    .run_on_start(settings.run_on_start)
                    .subset(subset)
                    .build(),
            ));
        }
        if let Some(settings) = &config.products.nwm {
            products.push(DataProduct::Nwm(
                Nwm::builder()
                    .fetcher(Arc::new(LocalFeatureDirectory::new(
                        &settings.feature_catalog,
                        &settings.feature_dir,
                    )))
                    .run_on_start(settings.run_on_start)
                    .policy(settings.match_policy)
                    .build(),
            ));
        }
        products
    }
}

impl From<Era5Land> for DataProduct {
    fn from(value: Era5Land) -> Self {
        DataProduct::Era5Land(value)
    }
}

impl From<Cruts> for DataProduct {
    fn from(value: Cruts) -> Self {
        DataProduct::Cruts(value)
    }
}

impl From<Nwm> for DataProduct {
    fn from(value: Nwm) -> Self {
        DataProduct::Nwm(value)
    }
}

impl DataSource for DataProduct {
    fn name(&self) -> &'static str {
        match self {
            DataProduct::Era5Land(p) => p.name(),
            DataProduct::Cruts(p) => p.name(),
            DataProduct::Nwm(p) => p.name(),
        }
    }

    fn readme_description(&self) -> &'static str {
        match self {
            DataProduct::Era5Land(p) => p.readme_description(),
            DataProduct::Cruts(p) => p.readme_description(),
            DataProduct::Nwm(p) => p.readme_description(),
        }
    }

    fn run_on_start(&self) -> bool {
        match self {
            DataProduct::Era5Land(p) => p.run_on_start(),
            DataProduct::Cruts(p) => p.run_on_start(),
            DataProduct::Nwm(p) => p.run_on_start(),
        }
    }

    fn verify_inputs(&self) -> Result<(), SourceError> {
        match self {
            DataProduct::Era5Land(p) => p.verify_inputs(),
            DataProduct::Cruts(p) => p.verify_inputs(),
            DataProduct::Nwm(p) => p.verify_inputs(),
        }
    }

    fn geodata(&self) -> GeodataMode {
        match self {
            DataProduct::Era5Land(p) => p.geodata(),
            DataProduct::Cruts(p) => p.geodata(),
            DataProduct::Nwm(p) => p.geodata(),
        }
    }

    async fn product_driver(
        &mut self,
        lake: &Lake,
        cache: &ProductCache,
    ) -> Result<Vec<MetadataSeries>, SourceError> {
        match self {
            DataProduct::Era5Land(p) => p.product_driver(lake, cache).await,
            DataProduct::Cruts(p) => p.product_driver(lake, cache).await,
            DataProduct::Nwm(p) => p.product_driver(lake, cache).await,
        }
    }
}

/// Loads `source` produced with `settings` from the cache, or runs `fetch` and caches
/// its result.
///
/// An unreadable cache file is treated as a miss, and a failed store only costs the next
/// run a refetch; neither fails the product.
pub(crate) async fn cached_or_fetch<T, F, Fut>(
    cache: &ProductCache,
    source: &str,
    settings: &str,
    fetch: F,
) -> Result<Arc<T>, SourceError>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    match cache.load::<T>(source, settings).await {
        Ok(Some(payload)) => return Ok(Arc::new(payload)),
        Ok(None) => {}
        Err(e) => warn!("Could not read saved {} data, fetching it again: {}", source, e),
    }
    let payload = Arc::new(fetch().await?);
    if let Err(e) = cache.store(source, settings, Arc::clone(&payload)).await {
        warn!("Could not save {} data: {}", source, e);
    }
    Ok(payload)
}

/// Subsets with the configured padding; if the lake falls between cell centres, retries
/// once with the bounds buffered by `buffer_degrees` and no padding.
pub(crate) fn subset_with_retry(
    grid: &GridDataset,
    bounds: &BoundingBox,
    settings: SubsetSettings,
) -> Result<GridDataset, SpatialError> {
    match subset_box(grid, bounds, settings.pad) {
        Err(SpatialError::EmptySelection { .. }) => {
            error!(
                "{} has no cell centre inside the lake bounds, retrying with a {} degree buffer",
                grid.product_name(),
                settings.buffer_degrees
            );
            subset_box(grid, &bounds.buffered(settings.buffer_degrees), 0)
        }
        other => other,
    }
}

/// Shared driver of the gridded products: fetch, label, subset, run the product-specific
/// `prepare` stages, cache the result and reduce `variables` to series.
pub(crate) async fn run_grid_product<P>(
    name: &'static str,
    fetcher: &Arc<dyn GridFetcher>,
    subset: SubsetSettings,
    lake: &Lake,
    cache: &ProductCache,
    variables: &[&str],
    prepare: P,
) -> Result<Vec<MetadataSeries>, SourceError>
where
    P: FnOnce(&mut GridDataset) -> Result<(), SourceError>,
{
    let bounds = lake
        .bounds()
        .ok_or_else(|| SpatialError::EmptyGeometry(lake.name.clone()))?;

    let settings = subset.cache_key();
    let grid: Arc<GridDataset> = cached_or_fetch(cache, name, &settings, || async move {
        info!("Fetching {} from {}", name, fetcher.describe());
        let region = bounds.buffered(subset.buffer_degrees);
        let mut grid = fetch::fetch_grid_blocking(fetcher, region).await?;
        grid.set_product_name(name);
        let mut grid = subset_with_retry(&grid, &bounds, subset)?;
        prepare(&mut grid)?;
        Ok::<_, SourceError>(grid)
    })
    .await?;

    let mut series = grid_to_series(&grid, variables)?;
    shift_to_month_start(&mut series);
    Ok(series)
}

#[cfg(test)]
pub(crate) mod test_fetchers {
    use super::*;
    use crate::spatial::FeatureCandidate;
    use crate::types::table::TabularProduct;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a fixed grid and counts the calls.
    pub(crate) struct InMemoryGrid {
        pub grid: GridDataset,
        pub calls: AtomicUsize,
    }

    impl InMemoryGrid {
        pub(crate) fn new(grid: GridDataset) -> Arc<Self> {
            Arc::new(Self {
                grid,
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl GridFetcher for InMemoryGrid {
        fn describe(&self) -> String {
            "in-memory grid".to_string()
        }

        fn fetch_grid(&self, _region: &BoundingBox) -> Result<GridDataset, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.grid.clone())
        }
    }

    /// Serves fixed features, all sharing one table.
    pub(crate) struct InMemoryFeatures {
        pub candidates: Vec<FeatureCandidate>,
        pub table: TabularProduct,
    }

    impl FeatureFetcher for InMemoryFeatures {
        fn describe(&self) -> String {
            "in-memory features".to_string()
        }

        fn candidates(&self) -> Result<Vec<FeatureCandidate>, SourceError> {
            Ok(self.candidates.clone())
        }

        fn fetch_feature(&self, _feature: &FeatureCandidate) -> Result<TabularProduct, SourceError> {
            Ok(self.table.clone())
        }
    }
}
