//! Files written for a lake: the merged table, plots, raster snapshots, the model point,
//! the README, the product list and the dashboard configuration.
//!
//! Every writer returns the [`OutputArtifact`](crate::types::events::OutputArtifact) it
//! produced; recording and announcing them is up to the caller.

pub mod documents;
pub mod error;
#[cfg(feature = "plotting")]
pub mod plot;
pub mod point;
pub mod raster;
pub mod table;

pub use documents::{
    dashboard_config, render_readme, write_dashboard_config, write_product_list, write_readme,
    DASHBOARD_CONFIG_FILE,
};
pub use error::OutputError;
#[cfg(feature = "plotting")]
pub use plot::write_class_plots;
pub use point::write_point_geometry;
pub use raster::{encode_geotiff, snapshot_zip_name, write_snapshot_zip};
pub use table::{merge_series_into_frame, write_csv, TIME_COLUMN};
