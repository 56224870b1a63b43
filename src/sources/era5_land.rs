//! ERA5-Land monthly averaged reanalysis: total precipitation and evaporation.

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

const NAME: &str = "ERA5_Land";
const VARIABLES: [&str; 2] = ["tp", "e"];

#[derive(Builder)]
pub struct Era5Land {
    fetcher: Arc<dyn GridFetcher>,
    #[builder(default = true)]
    run_on_start: bool,
    #[builder(default)]
    subset: SubsetSettings,
}

impl DataSource for Era5Land {
    fn name(&self) -> &'static str {
        NAME
    }

    fn readme_description(&self) -> &'static str {
        "ERA5-Land monthly averaged reanalysis of total precipitation (tp) and evaporation (e), \
         averaged over the lake and converted to mm/month. Validate this data with the gridded \
         geodata in the zip file."
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
                // Monthly means of daily accumulations, stored as "m of water equivalent".
                for variable in VARIABLES {
                    grid.fix_unit_descriptor(variable, "m")?;
                }
                grid.add_time_denominator("day");
                grid.make_non_negative(&["e"])?;
                convert_grid_units(
                    grid,
                    VariableClass::Precipitation.canonical_unit(),
                    &VARIABLES,
                )?;
                Ok(())
            },
        )
        .await
    }
}
