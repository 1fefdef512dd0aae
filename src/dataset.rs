//! Dataset records published alongside generated catalogs.
//!
//! A record is either a plain file dataset or a STAC dataset; the integer
//! `quality` field tells them apart (`0` is plain).

use crate::error::{CurationError, Result};
use crate::stac_operations::{read_catalog_from_file, CATALOG_FILE};
use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use url::Url;
use walkdir::WalkDir;

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Version {
    pub version_id: u32,
    #[serde(rename = "createdAt", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub size: u64,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub uid: String,
    pub id: String,
    pub name: String,
    pub authors: Vec<String>,
    pub source: String,
    pub license: String,
    pub files: String,
    #[serde(default)]
    pub versions: Vec<Version>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub quality: i64,
}

impl Dataset {
    /// `source` must be empty or an http(s) URL.
    pub fn validate(&self) -> Result<()> {
        if self.source.is_empty() {
            return Ok(());
        }
        match Url::parse(&self.source) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
            _ => Err(CurationError::Dataset(format!(
                "source must be a valid url, got '{}'",
                self.source
            ))),
        }
    }
}

fn default_stac_quality() -> i64 {
    1
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StacDataset {
    pub uid: String,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default = "default_stac_quality")]
    pub quality: i64,
    /// Total byte size of the persisted descriptors.
    #[serde(default)]
    pub size: u64,
    /// Root catalog descriptor.
    #[serde(default)]
    pub catalog: Value,
    #[serde(default)]
    pub versions: Vec<Version>,
}

impl StacDataset {
    /// Record for the catalog persisted in `dir`.
    pub fn from_catalog_dir(dir: &Path, uid: &str, name: &str) -> Result<Self> {
        let path = dir.join(CATALOG_FILE);
        let stac_catalog = read_catalog_from_file(&path)?;
        let catalog: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        let size = descriptor_size(dir)?;
        let now = Utc::now();

        Ok(Self {
            uid: uid.to_string(),
            id: stac_catalog.id,
            name: name.to_string(),
            description: stac_catalog.description,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            likes: 0,
            downloads: 0,
            quality: default_stac_quality(),
            size,
            catalog,
            versions: vec![Version {
                version_id: 1,
                created_at: now,
                size,
            }],
        })
    }
}

fn descriptor_size(dir: &Path) -> Result<u64> {
    let mut size = 0;
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| CurationError::Dataset(e.to_string()))?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some("json")
        {
            size += entry
                .metadata()
                .map_err(|e| CurationError::Dataset(e.to_string()))?
                .len();
        }
    }
    Ok(size)
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum DatasetRecord {
    Plain(Dataset),
    Stac(StacDataset),
}

impl DatasetRecord {
    pub fn uid(&self) -> &str {
        match self {
            Self::Plain(d) => &d.uid,
            Self::Stac(d) => &d.uid,
        }
    }

    pub fn quality(&self) -> i64 {
        match self {
            Self::Plain(d) => d.quality,
            Self::Stac(d) => d.quality,
        }
    }
}

impl<'de> Deserialize<'de> for DatasetRecord {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let quality = value.get("quality").and_then(Value::as_i64).unwrap_or(0);
        if quality == 0 {
            let dataset: Dataset = serde_json::from_value(value).map_err(de::Error::custom)?;
            dataset.validate().map_err(de::Error::custom)?;
            Ok(Self::Plain(dataset))
        } else {
            serde_json::from_value(value)
                .map(Self::Stac)
                .map_err(de::Error::custom)
        }
    }
}
