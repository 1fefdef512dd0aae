//! Named STAC extensions and the label lookup that assigns them to assets.

use crate::model::Item;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const SAR_SCHEMA: &str = "https://stac-extensions.github.io/sar/v1.0.0/schema.json";
const EO_SCHEMA: &str = "https://stac-extensions.github.io/eo/v1.1.0/schema.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StacExtension {
    Sar,
    Eo,
}

impl StacExtension {
    pub fn schema_uri(&self) -> &'static str {
        match self {
            Self::Sar => SAR_SCHEMA,
            Self::Eo => EO_SCHEMA,
        }
    }

    pub fn decorate_item(&self, item: &mut Item) {
        item.add_stac_extension(self.schema_uri());
    }

    /// Asset fields of an extension are declared by the owning item, so
    /// decorating the asset under `key` registers the schema on `item`.
    pub fn decorate_asset(&self, item: &mut Item, key: &str) {
        if item.assets.iter().any(|asset| asset.key == key) {
            item.add_stac_extension(self.schema_uri());
        }
    }
}

impl fmt::Display for StacExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sar => write!(f, "sar"),
            Self::Eo => write!(f, "eo"),
        }
    }
}

impl FromStr for StacExtension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sar" => Ok(Self::Sar),
            "eo" => Ok(Self::Eo),
            other => Err(format!("unknown extension '{other}' (expected 'sar' or 'eo')")),
        }
    }
}

/// One extension name or a list of them, as written in a mapping file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtensionNames {
    One(StacExtension),
    Many(Vec<StacExtension>),
}

impl ExtensionNames {
    /// Names in declaration order, duplicates removed.
    pub fn to_vec(&self) -> Vec<StacExtension> {
        let names = match self {
            Self::One(ext) => vec![*ext],
            Self::Many(exts) => exts.clone(),
        };
        let mut unique = Vec::with_capacity(names.len());
        for name in names {
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        unique
    }
}

/// Label → extension names.
pub type ExtensionMap = BTreeMap<String, ExtensionNames>;

/// Parses `LABEL=NAME[,NAME...]`.
pub fn parse_mapping_entry(entry: &str) -> Result<(String, ExtensionNames), String> {
    let (label, names) = entry
        .split_once('=')
        .ok_or_else(|| format!("expected LABEL=NAME[,NAME], got '{entry}'"))?;
    let label = label.trim();
    if label.is_empty() {
        return Err(format!("empty label in '{entry}'"));
    }
    let names = names
        .split(',')
        .map(StacExtension::from_str)
        .collect::<Result<Vec<_>, _>>()?;
    let names = match names.as_slice() {
        [single] => ExtensionNames::One(*single),
        _ => ExtensionNames::Many(names),
    };
    Ok((label.to_string(), names))
}

/// Extensions applicable to each label, in input order.
///
/// Labels missing from the mapping (or an absent mapping) resolve to `None`.
pub fn resolve(labels: &[String], mapping: Option<&ExtensionMap>) -> Vec<Option<Vec<StacExtension>>> {
    labels
        .iter()
        .map(|label| {
            mapping
                .and_then(|m| m.get(label))
                .map(ExtensionNames::to_vec)
                .filter(|exts| !exts.is_empty())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Asset, GEOTIFF_MEDIA_TYPE};
    use chrono::Utc;
    use std::path::PathBuf;

    fn mapping() -> ExtensionMap {
        let mut m = ExtensionMap::new();
        m.insert("S1".to_string(), ExtensionNames::One(StacExtension::Sar));
        m.insert(
            "S2".to_string(),
            ExtensionNames::Many(vec![StacExtension::Eo, StacExtension::Sar, StacExtension::Eo]),
        );
        m
    }

    #[test]
    fn test_resolve_known_and_unknown_labels() {
        let labels = vec!["S1".to_string(), "DEM".to_string(), "S2".to_string()];
        let resolved = resolve(&labels, Some(&mapping()));
        assert_eq!(resolved[0], Some(vec![StacExtension::Sar]));
        assert_eq!(resolved[1], None);
        assert_eq!(resolved[2], Some(vec![StacExtension::Eo, StacExtension::Sar]));
    }

    #[test]
    fn test_resolve_without_mapping() {
        let labels = vec!["S1".to_string(), "S2".to_string()];
        assert_eq!(resolve(&labels, None), vec![None, None]);
    }

    #[test]
    fn test_mapping_from_toml() {
        let m: ExtensionMap = toml::from_str("S1 = \"sar\"\nS2 = [\"eo\", \"sar\"]").unwrap();
        assert_eq!(m["S1"], ExtensionNames::One(StacExtension::Sar));
        assert_eq!(
            m["S2"],
            ExtensionNames::Many(vec![StacExtension::Eo, StacExtension::Sar])
        );
        assert!(toml::from_str::<ExtensionMap>("S3 = \"lidar\"").is_err());
    }

    #[test]
    fn test_parse_mapping_entry() {
        let (label, names) = parse_mapping_entry("S1=sar").unwrap();
        assert_eq!(label, "S1");
        assert_eq!(names, ExtensionNames::One(StacExtension::Sar));

        let (_, names) = parse_mapping_entry("S2=eo,SAR").unwrap();
        assert_eq!(names.to_vec(), vec![StacExtension::Eo, StacExtension::Sar]);

        assert!(parse_mapping_entry("S1").is_err());
        assert!(parse_mapping_entry("=sar").is_err());
        assert!(parse_mapping_entry("S1=radar").is_err());
    }

    #[test]
    fn test_decorators_register_schema_once() {
        let mut item = Item::new("scene", Utc::now());
        item.assets.push(Asset {
            key: "S1_vv".to_string(),
            href: "S1_vv.tiff".to_string(),
            title: "S1_vv".to_string(),
            media_type: GEOTIFF_MEDIA_TYPE.to_string(),
            source: PathBuf::from("S1_vv.tiff"),
        });
        StacExtension::Sar.decorate_item(&mut item);
        StacExtension::Sar.decorate_asset(&mut item, "S1_vv");
        StacExtension::Eo.decorate_asset(&mut item, "missing");
        assert_eq!(item.stac_extensions, vec![SAR_SCHEMA.to_string()]);
    }
}
