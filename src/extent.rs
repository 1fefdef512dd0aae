//! Spatial and temporal extents of rasters and collections.

use crate::error::Result;
use crate::metadata::{self, default_temporal_extent};
use crate::model::{Bbox, Extent, TemporalExtent};
use crate::projection;
use crate::raster::read_raster_info;
use crate::scanner::scan_images;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// EPSG:4326 bounds of one raster.
///
/// `Ok(None)` means the raster's coordinate system cannot be reprojected.
/// A raster that cannot be opened is an error.
pub fn raster_bbox(path: &Path) -> Result<Option<Bbox>> {
    let info = read_raster_info(path)?;
    let (Some(epsg), Some(bounds)) = (info.epsg, info.native_bounds) else {
        warn!("Raster {:?} has no usable coordinate reference", path);
        return Ok(None);
    };
    match projection::transform_bounds(epsg, &bounds) {
        Ok(bbox) => Ok(Some(bbox)),
        Err(e) => {
            warn!("Unable to reproject {:?}: {}", path, e);
            Ok(None)
        }
    }
}

/// Union of the bounds of `rasters`.
///
/// The first raster that cannot be reprojected makes the whole extent
/// unknown and stops the computation; later rasters are not opened. No
/// rasters also gives the unknown extent.
pub fn spatial_extent<'a, I>(rasters: I) -> Result<Option<Bbox>>
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut extent: Option<Bbox> = None;
    for raster in rasters {
        match raster_bbox(raster)? {
            Some(bbox) => {
                extent = Some(extent.map_or(bbox, |e| e.union(&bbox)));
            }
            None => {
                warn!(
                    "Spatial extent set to unknown because of {:?}",
                    raster
                );
                return Ok(None);
            }
        }
    }
    Ok(extent)
}

/// Earliest and latest acquisition dates found in any `*.json` below `dir`.
pub fn temporal_extent(dir: &Path) -> TemporalExtent {
    let mut dates = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping {:?} while collecting dates: {}", e.path(), e);
                None
            }
        })
        .filter(|entry| {
            entry.file_type().is_file()
                && entry.path().extension().and_then(|e| e.to_str()) == Some("json")
        })
        .filter_map(|entry| {
            let date = metadata::read_metadata(entry.path())
                .as_ref()
                .and_then(metadata::acquisition_date);
            if date.is_none() {
                debug!("No acquisition date in {:?}", entry.path());
            }
            date
        });

    let Some(first) = dates.next() else {
        warn!("No acquisition dates under {:?}; using default interval", dir);
        return default_temporal_extent();
    };
    let (start, end) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
    TemporalExtent { start, end }
}

/// Spatial and temporal extent of the collection rooted at `dir`.
pub fn collection_extent(dir: &Path, image_format: &str) -> Result<Extent> {
    let rasters = scan_images(dir, image_format)?.collect::<Result<Vec<PathBuf>>>()?;
    let spatial = spatial_extent(rasters.iter().map(PathBuf::as_path))?;
    let temporal = temporal_extent(dir);
    Ok(Extent { spatial, temporal })
}
