pub mod catalog;
pub mod config;
pub mod dataset;
pub mod error;
pub mod extensions;
pub mod extent;
pub mod item;
pub mod metadata;
pub mod model;
pub mod projection;
pub mod raster;
pub mod scanner;
pub mod stac_operations;

#[cfg(test)]
mod fixtures;

pub use catalog::generate_stac_metadata;
pub use config::{CatalogType, GenerationConfig};
pub use error::{CurationError, Result};
pub use scanner::{get_asset_table, AssetTable};
