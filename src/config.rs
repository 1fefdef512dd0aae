use crate::error::{CurationError, Result};
use crate::extensions::ExtensionMap;
use crate::scanner::DEFAULT_IMAGE_FORMAT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_DESCRIPTION: &str = "Catalog";
pub const DEFAULT_OUTPUT_DIR: &str = "stac";

/// How the persisted catalog refers to its own parts.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CatalogType {
    /// Relative links only, no `self` links; the tree can be moved as a whole.
    #[default]
    SelfContained,
    /// Absolute links plus a `self` link on every object.
    AbsolutePublished,
}

/// Options of one generation run, usually read from a TOML file.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct GenerationConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default = "default_image_format")]
    pub image_format: String,
    #[serde(default)]
    pub catalog_type: CatalogType,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<Url>,
    #[serde(default)]
    pub extensions: ExtensionMap,
}

fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_string()
}

fn default_image_format() -> String {
    DEFAULT_IMAGE_FORMAT.to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn config_error(key: &str, reason: impl ToString) -> CurationError {
    CurationError::Config {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

impl GenerationConfig {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            title: None,
            description: default_description(),
            image_format: default_image_format(),
            catalog_type: CatalogType::default(),
            output_dir: default_output_dir(),
            base_url: None,
            extensions: ExtensionMap::new(),
        }
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| config_error("file", format!("Failed to read config file: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| config_error("file", format!("Failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| config_error("file", e))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn from_template(table: &toml::Table) -> Result<Self> {
        let config: Self =
            toml::from_str(&table.to_string()).map_err(|e| config_error("template", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(config_error("id", "catalog id must not be empty"));
        }
        let format = self.image_format.as_str();
        if format.is_empty() || format.contains('.') || format.contains('/') {
            return Err(config_error(
                "image_format",
                format!("'{format}' must be a bare file extension such as 'tiff'"),
            ));
        }
        if self.base_url.is_some() && self.catalog_type == CatalogType::SelfContained {
            tracing::warn!("base_url is ignored for self-contained catalogs");
        }
        Ok(())
    }

    /// The label mapping, or `None` when no label has extensions.
    pub fn extension_map(&self) -> Option<&ExtensionMap> {
        (!self.extensions.is_empty()).then_some(&self.extensions)
    }
}
