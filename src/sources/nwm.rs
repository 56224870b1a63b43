//! National Water Model lake outputs: inflow and outflow at the model lake matched to
//! the polygon.

use crate::cache::ProductCache;
use crate::reduction::{group_series_by_month, series_from_table, shift_to_month_start};
use crate::sources::error::SourceError;
use crate::sources::fetch::FeatureFetcher;
use crate::sources::{cached_or_fetch, DataSource, GeodataMode, GeodataPoint};
use crate::spatial::{apply_match_policy, match_lake_to_feature, FeatureMatch, MatchPolicy};
use crate::types::lake::Lake;
use crate::types::series::MetadataSeries;
use crate::types::table::TabularProduct;
use crate::types::variable_class::VariableClass;
use crate::units::convert_all_series;
use bon::Builder;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const NAME: &str = "NWM";

/// What is cached for a lake: the matched feature and its raw output table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NwmExtract {
    feature: FeatureMatch,
    table: TabularProduct,
}

#[derive(Builder)]
pub struct Nwm {
    fetcher: Arc<dyn FeatureFetcher>,
    #[builder(default = true)]
    run_on_start: bool,
    #[builder(default)]
    policy: MatchPolicy,
    #[builder(skip)]
    matched: Option<FeatureMatch>,
}

impl Nwm {
    /// The feature the last run extracted data at.
    pub fn matched_feature(&self) -> Option<&FeatureMatch> {
        self.matched.as_ref()
    }
}

impl DataSource for Nwm {
    fn name(&self) -> &'static str {
        NAME
    }

    fn readme_description(&self) -> &'static str {
        "National Water Model lake inflow and outflow at the model lake nearest the lake \
         centroid, as monthly means converted to m^3/month. Validate this data with the point \
         file labeled 'NWM' in the output folder."
    }

    fn run_on_start(&self) -> bool {
        self.run_on_start
    }

    fn verify_inputs(&self) -> Result<(), SourceError> {
        self.fetcher.verify()
    }

    fn geodata(&self) -> GeodataMode {
        match &self.matched {
            Some(found) => GeodataMode::Point(GeodataPoint {
                feature_id: found.feature.feature_id,
                lat: found.feature.lat,
                lon: found.feature.lon,
                verified: found.verified,
            }),
            None => GeodataMode::None,
        }
    }

    async fn product_driver(
        &mut self,
        lake: &Lake,
        cache: &ProductCache,
    ) -> Result<Vec<MetadataSeries>, SourceError> {
        let fetcher = Arc::clone(&self.fetcher);
        let policy = self.policy;
        let settings = format!("policy={:?}", policy);
        let extract: Arc<NwmExtract> = cached_or_fetch(cache, NAME, &settings, || async move {
            info!("Fetching {} from {}", NAME, fetcher.describe());
            let candidates = tokio::task::spawn_blocking({
                let fetcher = Arc::clone(&fetcher);
                move || fetcher.candidates()
            })
            .await??;
            let feature = match_lake_to_feature(lake, &candidates, policy)?;
            let mut table = tokio::task::spawn_blocking(move || fetcher.fetch_feature(&feature.feature))
                .await??;
            table.product_name = NAME.to_string();
            Ok::<_, SourceError>(NwmExtract { feature, table })
        })
        .await?;
        self.matched = Some(apply_match_policy(lake, extract.feature, policy)?);

        let mut series = series_from_table(&extract.table)?;
        series.retain(|s| matches!(s.class(), Some(VariableClass::Inflow | VariableClass::Outflow)));
        for s in series.iter_mut() {
            group_series_by_month(s);
        }
        convert_all_series(&mut series, VariableClass::Inflow.canonical_unit())?;
        shift_to_month_start(&mut series);
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::test_fetchers::InMemoryFeatures;
    use crate::spatial::{FeatureCandidate, SpatialError};
    use crate::types::lake::square_lake;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn hourly_table() -> TabularProduct {
        let at = |m, d, h| {
            NaiveDate::from_ymd_opt(1979, m, d)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap()
        };
        TabularProduct {
            product_name: "nwm_retrospective".to_string(),
            units: "m3 s-1".to_string(),
            time: vec![at(2, 1, 1), at(2, 1, 2), at(3, 1, 1)],
            columns: BTreeMap::from([
                ("inflow".to_string(), vec![Some(1.0), Some(3.0), Some(1.0)]),
                ("outflow".to_string(), vec![Some(1.0), None, Some(0.5)]),
                ("water_sfc_elev".to_string(), vec![Some(1944.0), Some(1944.1), Some(1944.2)]),
            ]),
        }
    }

    fn fetcher(lat: f64, lon: f64) -> Arc<InMemoryFeatures> {
        Arc::new(InMemoryFeatures {
            candidates: vec![
                FeatureCandidate {
                    feature_id: 1,
                    lat: 45.0,
                    lon: -100.0,
                },
                FeatureCandidate {
                    feature_id: 166899229,
                    lat,
                    lon,
                },
            ],
            table: hourly_table(),
        })
    }

    #[tokio::test]
    async fn test_nwm_driver() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let lake = square_lake(798, -119.2, 37.9, -118.9, 38.1);
        let cache = ProductCache::new(dir.path(), &lake, false);
        let mut product = Nwm::builder().fetcher(fetcher(38.0, -119.0)).build();
        assert_eq!(product.geodata(), GeodataMode::None);

        let series = product.product_driver(&lake, &cache).await?;
        assert_eq!(series.len(), 2);
        let inflow = &series[0];
        assert_eq!(inflow.class(), Some(VariableClass::Inflow));
        assert_eq!(inflow.product_name(), "NWM");
        assert_eq!(inflow.unit().expression(), "m^3/month");
        // Mean of 2 m3/s over February 1979, then 1 m3/s over March.
        assert!((inflow.values()[0] - 2.0 * 28.0 * 86400.0).abs() < 1e-6);
        assert!((inflow.values()[1] - 31.0 * 86400.0).abs() < 1e-6);
        assert_eq!(inflow.times()[0], NaiveDate::from_ymd_opt(1979, 2, 1).unwrap().and_hms_opt(0, 0, 0).unwrap());

        let outflow = &series[1];
        assert!((outflow.values()[0] - 28.0 * 86400.0).abs() < 1e-6);

        match product.geodata() {
            GeodataMode::Point(point) => {
                assert_eq!(point.feature_id, 166899229);
                assert!(point.verified);
            }
            other => panic!("expected a point, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_nwm_outside_domain() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let lake = square_lake(798, -119.2, 37.9, -118.9, 38.1);
        let cache = ProductCache::new(dir.path(), &lake, false);

        let mut strict = Nwm::builder().fetcher(fetcher(39.0, -119.0)).build();
        assert!(matches!(
            strict.product_driver(&lake, &cache).await,
            Err(SourceError::Spatial(SpatialError::UnreliableMatch { .. }))
        ));
        assert_eq!(strict.geodata(), GeodataMode::None);

        let mut flagged = Nwm::builder()
            .fetcher(fetcher(39.0, -119.0))
            .policy(MatchPolicy::FlagUnverified)
            .build();
        flagged.product_driver(&lake, &cache).await?;
        assert!(!flagged.matched_feature().unwrap().verified);
        Ok(())
    }

    #[tokio::test]
    async fn test_strict_run_rejects_match_cached_by_flagged_run() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let lake = square_lake(798, -119.2, 37.9, -118.9, 38.1);
        let cache = ProductCache::new(dir.path(), &lake, false);

        let mut flagged = Nwm::builder()
            .fetcher(fetcher(39.0, -119.0))
            .policy(MatchPolicy::FlagUnverified)
            .build();
        flagged.product_driver(&lake, &cache).await?;
        assert!(cache.path_for(NAME).is_file());

        let mut strict = Nwm::builder().fetcher(fetcher(39.0, -119.0)).build();
        assert!(matches!(
            strict.product_driver(&lake, &cache).await,
            Err(SourceError::Spatial(SpatialError::UnreliableMatch { .. }))
        ));
        assert!(strict.matched_feature().is_none());
        Ok(())
    }
}
