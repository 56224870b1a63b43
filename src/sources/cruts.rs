//! CRU TS monthly climate grids: precipitation and potential evapotranspiration.

use crate::cache::ProductCache;
use crate::sources::error::SourceError;
use crate::sources::fetch::GridFetcher;
use crate::sources::{run_grid_product, DataSource, GeodataMode, SubsetSettings};
use crate::types::lake::Lake;
use crate::types::series::MetadataSeries;
use crate::types::variable_class::VariableClass;
use crate::units::convert_grid_units;
use bon::Builder;
use std::sync::Arc;

const NAME: &str = "CRUTS";
const VARIABLES: [&str; 2] = ["pet", "pre"];

/// The half-degree CRU grid is coarse: small lakes often fall between cell centres, in
/// which case the subset falls back to the buffered lake bounds.
#[derive(Builder)]
pub struct Cruts {
    fetcher: Arc<dyn GridFetcher>,
    #[builder(default = true)]
    run_on_start: bool,
    #[builder(default)]
    subset: SubsetSettings,
}

impl DataSource for Cruts {
    fn name(&self) -> &'static str {
        NAME
    }

    fn readme_description(&self) -> &'static str {
        "CRU TS gridded precipitation (pre) and potential evapotranspiration (pet), averaged \
         over the lake and converted to mm/month. Validate this data with the gridded geodata \
         in the zip file."
    }

    fn run_on_start(&self) -> bool {
        self.run_on_start
    }

    fn verify_inputs(&self) -> Result<(), SourceError> {
        self.fetcher.verify()
    }

    fn geodata(&self) -> GeodataMode {
        GeodataMode::Grid
    }

    async fn product_driver(
        &mut self,
        lake: &Lake,
        cache: &ProductCache,
    ) -> Result<Vec<MetadataSeries>, SourceError> {
        run_grid_product(
            NAME,
            &self.fetcher,
            self.subset,
            lake,
            cache,
            &VARIABLES,
            |grid| {
                convert_grid_units(
                    grid,
                    VariableClass::Evaporation.canonical_unit(),
                    &VARIABLES,
                )?;
                Ok(())
            },
        )
        .await
    }
}
