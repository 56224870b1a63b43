//! The per-lake orchestrator: look up the lake, run every product, write the outputs.

use crate::cache::ProductCache;
use crate::config::{LakeContext, PipelineConfig};
use crate::error::HydrologyError;
use crate::lakes::LakeCatalog;
use crate::outputs::{
    merge_series_into_frame, write_csv, write_dashboard_config, write_point_geometry,
    write_product_list, write_readme, write_snapshot_zip,
};
use crate::sources::{DataProduct, DataSource, GeodataMode, SourceError};
use crate::types::events::{OutputArtifact, PipelineEvent, ProductRun, ProductStatus};
use crate::types::lake::Lake;
use crate::types::series::MetadataSeries;
use bon::bon;
use log::{error, info, warn};
use polars::prelude::DataFrame;
use std::path::PathBuf;

type Listener = Box<dyn Fn(&PipelineEvent) + Send + Sync>;

/// Everything a run produced for one lake.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub lake: Lake,
    pub context: LakeContext,
    /// Every series of every product that loaded, in canonical units.
    pub series: Vec<MetadataSeries>,
    /// The merged table written to the CSV.
    pub table: DataFrame,
    /// Every configured product and whether it loaded.
    pub products: Vec<ProductStatus>,
    /// Files written, in order.
    pub artifacts: Vec<OutputArtifact>,
    /// Products that finished, in order.
    pub runs: Vec<ProductRun>,
    /// The dashboard `CONFIG.json`.
    pub dashboard_config: PathBuf,
}

/// Records artifacts and product runs and forwards each to the listeners.
struct RunRecorder<'a> {
    listeners: &'a [Listener],
    artifacts: Vec<OutputArtifact>,
    runs: Vec<ProductRun>,
}

impl RunRecorder<'_> {
    fn emit(&self, event: PipelineEvent) {
        for listener in self.listeners {
            listener(&event);
        }
    }

    fn artifact(&mut self, artifact: OutputArtifact) {
        info!("Output file ({}): {}", artifact.role, artifact.path.display());
        self.artifacts.push(artifact.clone());
        self.emit(PipelineEvent::ArtifactWritten(artifact));
    }

    fn product_finished(&mut self, run: ProductRun) {
        self.runs.push(run.clone());
        self.emit(PipelineEvent::ProductFinished(run));
    }
}

/// Runs the configured data products for a lake and writes its output folder.
///
/// # Examples
///
/// ```rust,no_run
/// # use lake_hydrology::{HydrologyError, LakePipeline, PipelineConfig};
/// # async fn run() -> Result<(), HydrologyError> {
/// let config = PipelineConfig::from_file("glhe_config.json".as_ref()).await?;
/// let mut pipeline = LakePipeline::new(config).await?;
/// pipeline.subscribe(|event| println!("{event:?}"));
///
/// let report = pipeline.run().lake_id(798).call().await?;
/// println!("Wrote {} files to {}", report.artifacts.len(), report.context.output_dir.display());
/// # Ok(())
/// # }
/// ```
pub struct LakePipeline {
    config: PipelineConfig,
    catalog: LakeCatalog,
    listeners: Vec<Listener>,
}

#[bon]
impl LakePipeline {
    /// Validates `config` and loads its lake catalog.
    ///
    /// # Errors
    ///
    /// [`HydrologyError::Config`] for an invalid configuration and
    /// [`HydrologyError::LakeLookup`] if the lakes file cannot be read or parsed.
    pub async fn new(config: PipelineConfig) -> Result<Self, HydrologyError> {
        config.validate()?;
        let catalog = LakeCatalog::load(&config.lakes_geojson).await?;
        Ok(Self::with_catalog(config, catalog))
    }

    /// A pipeline over an already loaded catalog.
    pub fn with_catalog(config: PipelineConfig, catalog: LakeCatalog) -> Self {
        Self {
            config,
            catalog,
            listeners: Vec::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Registers a callback for every artifact written and product finished.
    pub fn subscribe(&mut self, listener: impl Fn(&PipelineEvent) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Runs the pipeline for one lake.
    ///
    /// Products come from the configuration unless `products` is given. A product that
    /// fails is logged and listed as not loaded; it never aborts the run.
    ///
    /// # Errors
    ///
    /// Fails if the lake is not in the catalog, its output directories cannot be created,
    /// or an output file cannot be written.
    #[builder]
    pub async fn run(
        &self,
        lake_id: u64,
        products: Option<Vec<DataProduct>>,
    ) -> Result<PipelineReport, HydrologyError> {
        let lake = self.catalog.lookup(lake_id)?;
        let context = LakeContext::prepare(&self.config, &lake).await?;
        let cache = ProductCache::new(&context.save_files_dir, &lake, self.config.run_cleanly);
        let mut products = products.unwrap_or_else(|| DataProduct::from_config(&self.config));
        info!("Running {} data products for {}", products.len(), lake.name);

        let mut recorder = RunRecorder {
            listeners: &self.listeners,
            artifacts: Vec::new(),
            runs: Vec::new(),
        };
        let mut series = Vec::new();
        let mut statuses = Vec::with_capacity(products.len());

        for product in products.iter_mut() {
            let mut status = ProductStatus {
                name: product.name().to_string(),
                description: product.readme_description().to_string(),
                run_on_start: product.run_on_start(),
                loaded: false,
            };
            if !product.run_on_start() {
                info!("{} is not set to run on start, skipping it", product.name());
                statuses.push(status);
                continue;
            }
            match run_product(product, &lake, &cache).await {
                Ok(product_series) => {
                    info!(
                        "{} produced {} series for {}",
                        product.name(),
                        product_series.len(),
                        lake.name
                    );
                    status.loaded = true;
                    series.extend(product_series);
                    recorder.product_finished(ProductRun {
                        name: status.name.clone(),
                        description: status.description.clone(),
                    });
                }
                Err(e) => error!(
                    "Data Product: {} not available for this lake with error: {}",
                    product.name(),
                    e
                ),
            }
            statuses.push(status);
        }
        if series.is_empty() {
            warn!("No data products loaded for {}", lake.name);
        }

        for (product, status) in products.iter().zip(&statuses) {
            if let (true, GeodataMode::Point(point)) = (status.loaded, product.geodata()) {
                let artifact =
                    write_point_geometry(&point, product.name(), &context.lake_name, &context.output_dir)
                        .await?;
                recorder.artifact(artifact);
            }
        }
        if let Some(artifact) = write_snapshot_zip(
            &series,
            &context.lake_name,
            context.snapshot_date,
            &context.output_dir,
        )
        .await?
        {
            recorder.artifact(artifact);
        }

        let table = merge_series_into_frame(&series)?;
        #[cfg(feature = "plotting")]
        for artifact in
            crate::outputs::write_class_plots(&table, &context.lake_name, &context.output_dir)?
        {
            recorder.artifact(artifact);
        }
        recorder.artifact(write_csv(&table, &context.output_file("_Data.csv")).await?);
        recorder.artifact(write_product_list(&context, &statuses).await?);
        let readme = write_readme(&context, &recorder.runs, &recorder.artifacts).await?;
        recorder.artifact(readme);
        let dashboard_config = write_dashboard_config(&context, &recorder.artifacts).await?;

        info!(
            "Finished {}: {} products loaded, {} files in {}",
            lake.name,
            recorder.runs.len(),
            recorder.artifacts.len(),
            context.output_dir.display()
        );
        Ok(PipelineReport {
            lake,
            context,
            series,
            table,
            products: statuses,
            artifacts: recorder.artifacts,
            runs: recorder.runs,
            dashboard_config,
        })
    }
}

async fn run_product(
    product: &mut DataProduct,
    lake: &Lake,
    cache: &ProductCache,
) -> Result<Vec<MetadataSeries>, SourceError> {
    product.verify_inputs()?;
    product.product_driver(lake, cache).await
}
