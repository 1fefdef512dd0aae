//! Discovery of raster assets below a scan root.

use crate::error::{CurationError, Result};
use crate::extensions::{self, ExtensionMap, StacExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const DEFAULT_IMAGE_FORMAT: &str = "tiff";

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct AssetRecord {
    pub path: PathBuf,
    /// Grouping key: file name up to the first underscore.
    pub label: String,
    /// Position of the first asset carrying the same label.
    pub ix: usize,
    pub extensions: Option<Vec<StacExtension>>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct AssetTable {
    pub assets: Vec<AssetRecord>,
}

impl AssetTable {
    pub fn new(assets: Vec<AssetRecord>) -> Self {
        Self { assets }
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let table: Self = serde_json::from_str(&content)
            .map_err(|e| CurationError::AssetTable(format!("{}: {e}", path.as_ref().display())))?;
        table.validate()?;
        Ok(table)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Records whose path lies below `dir`, in table order.
    pub fn under(&self, dir: &Path) -> Vec<&AssetRecord> {
        self.assets
            .iter()
            .filter(|record| record.path.starts_with(dir))
            .collect()
    }

    fn validate(&self) -> Result<()> {
        for (i, record) in self.assets.iter().enumerate() {
            if record.ix > i {
                return Err(CurationError::AssetTable(format!(
                    "row {i} ({}) points at later group index {}",
                    record.path.display(),
                    record.ix
                )));
            }
        }
        Ok(())
    }
}

/// Lazily walks `root` for files with the `image_format` extension.
///
/// Entries are visited in file-name order so repeated scans agree.
/// Unreadable directories are skipped; other walk errors are yielded.
pub fn scan_images<'a>(
    root: &Path,
    image_format: &'a str,
) -> Result<impl Iterator<Item = Result<PathBuf>> + 'a> {
    if !root.is_dir() {
        return Err(CurationError::Scan {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }
    let root = root.to_path_buf();
    let walker = WalkDir::new(&root).sort_by_file_name().into_iter();

    Ok(walker.filter_map(move |entry| match entry {
        Ok(entry) => {
            let matches = entry.file_type().is_file()
                && entry.path().extension().and_then(|e| e.to_str()) == Some(image_format);
            matches.then(|| Ok(entry.into_path()))
        }
        Err(e) if is_skippable(e.io_error().map(|io| io.kind())) => {
            warn!("Skipping unreadable path {:?}: {}", e.path(), e);
            None
        }
        Err(e) => Some(Err(CurationError::Scan {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone()),
            reason: e.to_string(),
        })),
    }))
}

/// Walk errors that skip an entry instead of failing the scan.
fn is_skippable(kind: Option<ErrorKind>) -> bool {
    kind == Some(ErrorKind::PermissionDenied)
}

/// Label of a raster: its file name cut at the first `_`, then at the first `.`.
pub fn format_label(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    let before_underscore = name.split('_').next().unwrap_or_default();
    before_underscore
        .split('.')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Labels of `images` and, for each, the index of the first image sharing its label.
pub fn format_labels(images: &[PathBuf]) -> (Vec<String>, Vec<usize>) {
    let labels: Vec<String> = images.iter().map(|p| format_label(p)).collect();
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    let ixs = labels
        .iter()
        .enumerate()
        .map(|(i, label)| *first_seen.entry(label.as_str()).or_insert(i))
        .collect();
    (labels, ixs)
}

/// Scans `root` and builds one record per matching raster.
pub fn get_asset_table(
    root: &Path,
    mapping: Option<&ExtensionMap>,
    image_format: &str,
) -> Result<AssetTable> {
    let images = scan_images(root, image_format)?.collect::<Result<Vec<_>>>()?;
    if images.is_empty() {
        warn!("No *.{} files found under {:?}", image_format, root);
    }
    let (labels, ixs) = format_labels(&images);
    let exts = extensions::resolve(&labels, mapping);

    let assets = images
        .into_iter()
        .zip(labels)
        .zip(ixs)
        .zip(exts)
        .map(|(((path, label), ix), extensions)| AssetRecord {
            path,
            label,
            ix,
            extensions,
        })
        .collect::<Vec<_>>();
    debug!("Scanned {} assets under {:?}", assets.len(), root);

    Ok(AssetTable::new(assets))
}
