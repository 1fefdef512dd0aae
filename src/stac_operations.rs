use crate::error::{CurationError, Result};
use crate::model::{Catalog, Link};
use std::fs::read_to_string;
use std::path::{Component, Path, PathBuf};

pub const CATALOG_FILE: &str = "catalog.json";

pub fn read_catalog_from_file(path: &Path) -> Result<stac::Catalog> {
    let load_error = |reason: String| CurationError::CatalogLoad {
        path: path.to_path_buf(),
        reason,
    };
    let content = read_to_string(path).map_err(|e| load_error(e.to_string()))?;
    let catalog: stac::Catalog =
        serde_json::from_str(&content).map_err(|e| load_error(e.to_string()))?;
    Ok(catalog)
}

/// Loads `path` as the starting point of a run.
///
/// Id, title and description are kept. Child links are kept with their
/// hrefs resolved against the catalog's directory so they can be rewritten
/// for the new output location.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let stac_catalog = read_catalog_from_file(path)?;
    let links: Vec<Link> = serde_json::to_value(&stac_catalog.links)
        .and_then(serde_json::from_value)
        .map_err(|e| CurationError::CatalogLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let mut catalog = Catalog::new(
        &stac_catalog.id,
        stac_catalog.title.as_deref(),
        &stac_catalog.description,
    );
    catalog.inherited_children = links
        .into_iter()
        .filter(|link| link.rel == "child")
        .map(|mut link| {
            if !is_url(&link.href) {
                let resolved = normalize_path(&base.join(&link.href));
                link.href = resolved.to_string_lossy().into_owned();
            }
            link
        })
        .collect();
    Ok(catalog)
}

pub fn is_url(href: &str) -> bool {
    href.contains("://")
}

/// Lexically removes `.` and `..` components.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
