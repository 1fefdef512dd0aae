use std::path::PathBuf;
use thiserror::Error;

/// Conditions that abort a curation run.
///
/// Degraded inputs (missing sidecar metadata, unreprojectable rasters, unknown
/// labels) never show up here; they are logged and turned into sentinel values.
#[derive(Error, Debug)]
pub enum CurationError {
    #[error("Unable to scan {path}: {reason}")]
    Scan { path: PathBuf, reason: String },

    #[error("Unable to open raster {path}: {reason}")]
    RasterOpen { path: PathBuf, reason: String },

    #[error("Unable to load existing catalog {path}: {reason}")]
    CatalogLoad { path: PathBuf, reason: String },

    #[error("Unable to persist catalog to {path}: {reason}")]
    Persist { path: PathBuf, reason: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    Config { key: String, reason: String },

    #[error("Invalid asset table: {0}")]
    AssetTable(String),

    #[error("Invalid dataset record: {0}")]
    Dataset(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CurationError>;
