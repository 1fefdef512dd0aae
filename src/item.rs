//! Items and their GeoTIFF assets.

use crate::error::{CurationError, Result};
use crate::extensions::StacExtension;
use crate::extent::raster_bbox;
use crate::metadata::item_acquisition_datetime;
use crate::model::{Asset, Bbox, Item, GEOTIFF_MEDIA_TYPE};
use crate::scanner::{AssetRecord, AssetTable};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Closed footprint polygon of `bbox`.
///
/// Absent when the box is unknown or any coordinate is zero.
pub fn bbox_geometry(bbox: Option<&Bbox>) -> Option<geojson::Geometry> {
    let b = bbox?;
    if b.to_array().iter().any(|c| *c == 0.0) {
        return None;
    }
    let ring = vec![
        vec![b.west, b.south],
        vec![b.west, b.north],
        vec![b.east, b.north],
        vec![b.east, b.south],
        vec![b.west, b.south],
    ];
    Some(geojson::Geometry::new(geojson::Value::Polygon(vec![ring])))
}

/// Rasters of `dir` (not recursive) with the `image_format` extension, sorted by file name.
pub fn list_rasters(dir: &Path, image_format: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| CurationError::Scan {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut rasters = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(image_format) {
            rasters.push(path);
        }
    }
    rasters.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(rasters)
}

fn asset_from_raster(raster: &Path) -> Asset {
    let file_name = raster
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let title = raster
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Asset {
        key: title.clone(),
        href: file_name,
        title,
        media_type: GEOTIFF_MEDIA_TYPE.to_string(),
        source: raster.to_path_buf(),
    }
}

/// Builds the item for the directory holding `raster`.
///
/// The raster gives the item its bbox, geometry and metadata; every raster
/// of the directory becomes an asset. A raster that cannot be opened fails
/// the build.
pub fn create_item(
    raster: &Path,
    extensions: Option<&[StacExtension]>,
    image_format: &str,
) -> Result<Item> {
    let dir = raster.parent().ok_or_else(|| CurationError::Scan {
        path: raster.to_path_buf(),
        reason: "raster has no parent directory".to_string(),
    })?;
    let id = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| CurationError::Scan {
            path: dir.to_path_buf(),
            reason: "directory has no name".to_string(),
        })?;

    let bbox = raster_bbox(raster)?;
    let mut item = Item::new(&id, item_acquisition_datetime(raster));
    item.geometry = bbox_geometry(bbox.as_ref());
    item.bbox = bbox;
    item.assets = list_rasters(dir, image_format)?
        .iter()
        .map(|r| asset_from_raster(r))
        .collect();

    if let Some(extensions) = extensions {
        for extension in extensions {
            extension.decorate_item(&mut item);
            let keys: Vec<String> = item.assets.iter().map(|a| a.key.clone()).collect();
            for key in keys {
                extension.decorate_asset(&mut item, &key);
            }
        }
    }
    debug!("Built item {} with {} assets", item.id, item.assets.len());

    Ok(item)
}

/// Records under `collection_dir` that each start a new item, in group order.
///
/// Groups are visited by first occurrence of their label; within the
/// collection only the first raster of every directory is kept, and a
/// directory whose name repeats an earlier item id is dropped.
pub fn item_sources<'a>(table: &'a AssetTable, collection_dir: &Path) -> Vec<&'a AssetRecord> {
    let mut records = table.under(collection_dir);
    records.sort_by_key(|record| record.ix);

    let mut seen_dirs: HashSet<&Path> = HashSet::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut sources = Vec::new();
    for record in records {
        let Some(dir) = record.path.parent() else {
            continue;
        };
        if !seen_dirs.insert(dir) {
            continue;
        }
        let id = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !seen_ids.insert(id.clone()) {
            warn!("Item id {} already used in {:?}; skipping {:?}", id, collection_dir, dir);
            continue;
        }
        sources.push(record);
    }
    sources
}

/// One item per raster directory under `collection_dir`.
pub fn build_items(
    table: &AssetTable,
    collection_dir: &Path,
    image_format: &str,
) -> Result<Vec<Item>> {
    item_sources(table, collection_dir)
        .into_iter()
        .map(|record| create_item(&record.path, record.extensions.as_deref(), image_format))
        .collect()
}
