//! Assembly and persistence of the catalog / collection / item tree.
//!
//! A run is all-or-nothing: every collection is built in memory first, and
//! the descriptors are written to a staging directory that only replaces
//! the output once it is complete.

use crate::config::{CatalogType, GenerationConfig};
use crate::error::{CurationError, Result};
use crate::extent::collection_extent;
use crate::item::build_items;
use crate::model::{Catalog, Collection, Item, Link};
use crate::scanner::{get_asset_table, AssetTable};
use crate::stac_operations::{is_url, load_catalog, normalize_path, CATALOG_FILE};
use serde_json::Value;
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;
use walkdir::WalkDir;

pub const COLLECTION_FILE: &str = "collection.json";

/// Builds the whole hierarchy for `root` and persists it to the configured output.
///
/// A precomputed `asset_table` replaces the scan of `root`. Returns the
/// in-memory catalog with normalized hrefs.
pub fn generate_stac_metadata(
    root: &Path,
    config: &GenerationConfig,
    asset_table: Option<AssetTable>,
) -> Result<Catalog> {
    config.validate()?;
    let root = absolute(root)?;
    let output = absolute(&config.output_dir)?;
    if root.starts_with(&output) {
        return Err(CurationError::Config {
            key: "output_dir".to_string(),
            reason: format!("{:?} would replace the scanned tree {:?}", output, root),
        });
    }
    check_replaceable(&output)?;

    let table = match asset_table {
        Some(mut table) => {
            for record in table.assets.iter_mut() {
                record.path = absolute(&record.path)?;
            }
            table
        }
        None => get_asset_table(&root, config.extension_map(), &config.image_format)?,
    };

    let existing = root.join(CATALOG_FILE);
    let mut catalog = if existing.is_file() {
        info!("Extending existing catalog {:?}", existing);
        load_catalog(&existing)?
    } else {
        create_stac_catalog(&config.id, config.title.as_deref(), &config.description)
    };

    for dir in collection_dirs(&root, &output)? {
        let collection = generate_stac_collection(&dir, &table, &config.image_format)?;
        catalog.add_child(collection);
    }

    normalize_hrefs(&mut catalog, &output, config.catalog_type, config.base_url.as_ref());
    save(&catalog, &output)?;
    info!(
        "Saved catalog {} with {} collections to {:?}",
        catalog.id,
        catalog.collections.len(),
        output
    );

    Ok(catalog)
}

pub fn create_stac_catalog(id: &str, title: Option<&str>, description: &str) -> Catalog {
    Catalog::new(id, title, description)
}

/// Collection for the directory `dir`: its extent plus one item per raster directory.
pub fn generate_stac_collection(dir: &Path, table: &AssetTable, image_format: &str) -> Result<Collection> {
    let id = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| CurationError::Scan {
            path: dir.to_path_buf(),
            reason: "collection directory has no name".to_string(),
        })?;
    info!("Generating collection {}", id);

    let extent = collection_extent(dir, image_format)?;
    let mut collection = Collection::new(&id, extent);
    collection.items = build_items(table, dir, image_format)?;
    for item in collection.items.iter_mut() {
        item.collection = Some(id.clone());
    }
    debug!("Collection {} has {} items", id, collection.items.len());

    Ok(collection)
}

/// Immediate subdirectories of `root` in name order, skipping the output tree.
fn collection_dirs(root: &Path, output: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(root).map_err(|e| CurationError::Scan {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })?;
    let staging = staging_dir(output);

    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if path == output || path == staging {
            debug!("Skipping output directory {:?}", path);
            continue;
        }
        dirs.push(path);
    }
    dirs.sort();
    if dirs.is_empty() {
        warn!("No collection directories under {:?}", root);
    }
    Ok(dirs)
}

/// Places every object under `output` and rewrites all links and asset hrefs.
///
/// Layout: `catalog.json` at the root, `<collection>/collection.json`, and
/// `<collection>/<item>/<item>.json`.
pub fn normalize_hrefs(
    catalog: &mut Catalog,
    output: &Path,
    catalog_type: CatalogType,
    base_url: Option<&Url>,
) {
    let hrefs = HrefBuilder {
        output,
        catalog_type,
        base_url,
    };
    let catalog_path = output.join(CATALOG_FILE);

    let mut catalog_links = vec![Link::new("root", &hrefs.object(&catalog_path, output))];
    if let Some(link) = hrefs.self_link(&catalog_path) {
        catalog_links.push(link);
    }

    for collection in catalog.collections.iter_mut() {
        let collection_dir = output.join(&collection.id);
        let collection_path = collection_dir.join(COLLECTION_FILE);
        catalog_links.push(
            Link::new("child", &hrefs.object(&collection_path, output))
                .with_title(Some(collection.id.as_str())),
        );

        let mut links = vec![
            Link::new("root", &hrefs.object(&catalog_path, &collection_dir)),
            Link::new("parent", &hrefs.object(&catalog_path, &collection_dir)),
        ];
        if let Some(link) = hrefs.self_link(&collection_path) {
            links.push(link);
        }

        for item in collection.items.iter_mut() {
            let item_dir = collection_dir.join(&item.id);
            let item_path = item_dir.join(format!("{}.json", item.id));
            links.push(Link::new("item", &hrefs.object(&item_path, &collection_dir)));
            normalize_item(item, &hrefs, &item_dir, &item_path, &catalog_path, &collection_path);
        }

        collection.links = links;
        collection.self_href = Some(collection_path);
    }

    for inherited in catalog.inherited_children.iter() {
        let mut link = inherited.clone();
        if !is_url(&link.href) {
            link.href = hrefs.object(Path::new(&inherited.href), output);
        }
        catalog_links.push(link);
    }

    catalog.links = catalog_links;
    catalog.self_href = Some(catalog_path);
}

fn normalize_item(
    item: &mut Item,
    hrefs: &HrefBuilder,
    item_dir: &Path,
    item_path: &Path,
    catalog_path: &Path,
    collection_path: &Path,
) {
    let mut links = vec![
        Link::new("root", &hrefs.object(catalog_path, item_dir)),
        Link::new("parent", &hrefs.object(collection_path, item_dir)),
        Link::new("collection", &hrefs.object(collection_path, item_dir)),
    ];
    if let Some(link) = hrefs.self_link(item_path) {
        links.push(link);
    }
    item.links = links;
    for asset in item.assets.iter_mut() {
        asset.href = hrefs.asset(&asset.source, item_dir);
    }
    item.self_href = Some(item_path.to_path_buf());
}

struct HrefBuilder<'a> {
    output: &'a Path,
    catalog_type: CatalogType,
    base_url: Option<&'a Url>,
}

impl HrefBuilder<'_> {
    /// Href of a descriptor under the output root, seen from `from_dir`.
    fn object(&self, target: &Path, from_dir: &Path) -> String {
        match self.catalog_type {
            CatalogType::SelfContained => relative_href(from_dir, target),
            CatalogType::AbsolutePublished => self.absolute(target),
        }
    }

    /// Href of a source raster, seen from `from_dir`.
    fn asset(&self, source: &Path, from_dir: &Path) -> String {
        match self.catalog_type {
            CatalogType::SelfContained => relative_href(from_dir, source),
            CatalogType::AbsolutePublished => source.to_string_lossy().into_owned(),
        }
    }

    fn self_link(&self, target: &Path) -> Option<Link> {
        match self.catalog_type {
            CatalogType::SelfContained => None,
            CatalogType::AbsolutePublished => Some(Link::new("self", &self.absolute(target))),
        }
    }

    fn absolute(&self, target: &Path) -> String {
        let published = self.base_url.and_then(|base| {
            let relative = target.strip_prefix(self.output).ok()?;
            let relative: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            base.join(&relative.join("/")).ok()
        });
        match published {
            Some(url) => url.to_string(),
            None => target.to_string_lossy().into_owned(),
        }
    }
}

/// `/`-separated path from directory `from_dir` to `target`, both absolute.
pub fn relative_href(from_dir: &Path, target: &Path) -> String {
    let from: Vec<Component> = from_dir.components().collect();
    let to: Vec<Component> = target.components().collect();
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = vec!["..".to_string(); from.len() - common];
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    if parts.first().map(String::as_str) == Some("..") {
        parts.join("/")
    } else {
        format!("./{}", parts.join("/"))
    }
}

pub fn absolute(path: &Path) -> Result<PathBuf> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()?.join(path)
    };
    Ok(normalize_path(&path))
}

fn staging_dir(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    output.with_file_name(name)
}

/// Fails unless `output` is absent, empty, or a previous catalog output.
///
/// A previous output holds a `catalog.json` and nothing but JSON descriptors.
pub fn check_replaceable(output: &Path) -> Result<()> {
    let refuse = |reason: &str| {
        Err(CurationError::Persist {
            path: output.to_path_buf(),
            reason: reason.to_string(),
        })
    };
    if !output.exists() {
        return Ok(());
    }
    if !output.is_dir() {
        return refuse("output exists and is not a directory");
    }
    if fs::read_dir(output)?.next().is_none() {
        return Ok(());
    }
    if !output.join(CATALOG_FILE).is_file() {
        return refuse("output is not empty and holds no catalog.json");
    }
    for entry in WalkDir::new(output) {
        let entry = entry.map_err(|e| CurationError::Persist {
            path: output.to_path_buf(),
            reason: e.to_string(),
        })?;
        let is_json = entry.path().extension().and_then(|e| e.to_str()) == Some("json");
        if !entry.file_type().is_dir() && !is_json {
            return refuse(&format!("output holds a non-descriptor file {:?}", entry.path()));
        }
    }
    Ok(())
}

/// Writes every descriptor of `catalog` below `output`, replacing a previous output.
pub fn save(catalog: &Catalog, output: &Path) -> Result<()> {
    check_replaceable(output)?;
    let staging = staging_dir(output);
    let persist_error = |reason: String| CurationError::Persist {
        path: output.to_path_buf(),
        reason,
    };

    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(|e| persist_error(e.to_string()))?;
    }
    if let Err(e) = write_tree(catalog, output, &staging) {
        let _ = fs::remove_dir_all(&staging);
        return Err(persist_error(e.to_string()));
    }

    if output.exists() {
        fs::remove_dir_all(output).map_err(|e| persist_error(e.to_string()))?;
    }
    fs::rename(&staging, output).map_err(|e| persist_error(e.to_string()))?;
    Ok(())
}

fn write_tree(catalog: &Catalog, output: &Path, staging: &Path) -> Result<()> {
    write_descriptor(&catalog.to_value(), catalog.self_href.as_deref(), output, staging)?;
    for collection in catalog.collections.iter() {
        write_descriptor(&collection.to_value(), collection.self_href.as_deref(), output, staging)?;
        for item in collection.items.iter() {
            write_descriptor(&item.to_value()?, item.self_href.as_deref(), output, staging)?;
        }
    }
    Ok(())
}

fn write_descriptor(
    value: &Value,
    self_href: Option<&Path>,
    output: &Path,
    staging: &Path,
) -> Result<()> {
    let target = self_href
        .and_then(|href| href.strip_prefix(output).ok())
        .ok_or_else(|| CurationError::Persist {
            path: output.to_path_buf(),
            reason: "hrefs must be normalized under the output directory before saving".to_string(),
        })?;
    let path = staging.join(target);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}
