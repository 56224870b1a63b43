pub mod error;
pub mod lake_catalog;

pub use error::LakeLookupError;
pub use lake_catalog::LakeCatalog;
