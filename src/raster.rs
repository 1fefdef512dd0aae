//! GeoTIFF header reading.
//!
//! Only the tags needed to place a raster on the globe are decoded: image
//! dimensions, the model tie point / pixel scale (or the full model
//! transformation) and the EPSG code from the GeoKey directory. Pixel data
//! is never read.

use crate::error::{CurationError, Result};
use crate::model::Bbox;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::decoder::Decoder;
use tiff::tags::Tag;

const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;
const USER_DEFINED: u16 = 32767;

/// Georeferencing of one raster in its native coordinate system.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterInfo {
    pub width: u32,
    pub height: u32,
    /// `None` when the file declares no usable EPSG code.
    pub epsg: Option<u16>,
    /// `None` when the file carries no model georeferencing.
    pub native_bounds: Option<Bbox>,
}

/// Opens `path` and reads its georeferencing. The file handle is released on return.
pub fn read_raster_info(path: &Path) -> Result<RasterInfo> {
    let open_error = |reason: String| CurationError::RasterOpen {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| open_error(e.to_string()))?;
    let mut decoder = Decoder::new(BufReader::new(file)).map_err(|e| open_error(e.to_string()))?;
    let (width, height) = decoder.dimensions().map_err(|e| open_error(e.to_string()))?;

    let pixel_scale = find_f64_vec(&mut decoder, Tag::ModelPixelScaleTag).map_err(open_error)?;
    let tiepoint = find_f64_vec(&mut decoder, Tag::ModelTiepointTag).map_err(open_error)?;
    let transformation =
        find_f64_vec(&mut decoder, Tag::ModelTransformationTag).map_err(open_error)?;
    let geokeys = decoder
        .find_tag(Tag::GeoKeyDirectoryTag)
        .map_err(|e| open_error(e.to_string()))?
        .map(|v| v.into_u16_vec())
        .transpose()
        .map_err(|e| open_error(e.to_string()))?;

    let native_bounds = match (transformation, pixel_scale, tiepoint) {
        (Some(t), _, _) if t.len() >= 16 => Some(bounds_from_transformation(&t, width, height)),
        (_, Some(scale), Some(tie)) if scale.len() >= 2 && tie.len() >= 6 => {
            Some(bounds_from_tiepoint(&scale, &tie, width, height))
        }
        _ => None,
    };
    let epsg = geokeys.as_deref().and_then(epsg_from_geokeys);

    Ok(RasterInfo {
        width,
        height,
        epsg,
        native_bounds,
    })
}

fn find_f64_vec(
    decoder: &mut Decoder<BufReader<File>>,
    tag: Tag,
) -> std::result::Result<Option<Vec<f64>>, String> {
    decoder
        .find_tag(tag)
        .map_err(|e| e.to_string())?
        .map(|v| v.into_f64_vec())
        .transpose()
        .map_err(|e| e.to_string())
}

/// EPSG code of the raster: the projected CRS if any, else the geographic one.
///
/// The directory is `[version, revision, minor, count]` followed by
/// `count` entries of `[key, location, count, value]`; only inline values
/// (location 0) carry codes.
pub fn epsg_from_geokeys(keys: &[u16]) -> Option<u16> {
    let count = *keys.get(3)? as usize;
    let entries = keys.get(4..)?.chunks_exact(4).take(count);

    let mut projected = None;
    let mut geographic = None;
    for entry in entries {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 || value == 0 || value == USER_DEFINED {
            continue;
        }
        match key {
            PROJECTED_CS_TYPE_GEO_KEY => projected = Some(value),
            GEOGRAPHIC_TYPE_GEO_KEY => geographic = Some(value),
            _ => {}
        }
    }
    projected.or(geographic)
}

fn bounds_from_tiepoint(scale: &[f64], tie: &[f64], width: u32, height: u32) -> Bbox {
    let (sx, sy) = (scale[0], scale[1]);
    let (i, j, x, y) = (tie[0], tie[1], tie[3], tie[4]);
    let west = x - i * sx;
    let north = y + j * sy;
    let east = west + f64::from(width) * sx;
    let south = north - f64::from(height) * sy;
    Bbox::new(west.min(east), south.min(north), west.max(east), south.max(north))
}

fn bounds_from_transformation(t: &[f64], width: u32, height: u32) -> Bbox {
    let (w, h) = (f64::from(width), f64::from(height));
    let corners = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)];
    let points = corners
        .iter()
        .map(|&(i, j)| (t[0] * i + t[1] * j + t[3], t[4] * i + t[5] * j + t[7]));

    let mut bbox = Bbox::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (x, y) in points {
        bbox = bbox.union(&Bbox::new(x, y, x, y));
    }
    bbox
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{write_geotiff, GeoTiffFixture};
    use tempfile::TempDir;

    #[test]
    fn test_epsg_prefers_projected() {
        let keys = [1, 1, 0, 3, 1024, 0, 1, 1, 2048, 0, 1, 4326, 3072, 0, 1, 32630];
        assert_eq!(epsg_from_geokeys(&keys), Some(32630));
    }

    #[test]
    fn test_epsg_user_defined_is_unknown() {
        let keys = [1, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, USER_DEFINED];
        assert_eq!(epsg_from_geokeys(&keys), None);
        assert_eq!(epsg_from_geokeys(&[1, 1]), None);
    }

    #[test]
    fn test_bounds_from_tiepoint() {
        let bbox = bounds_from_tiepoint(&[10.0, 10.0, 0.0], &[0.0, 0.0, 0.0, 500000.0, 4000000.0, 0.0], 100, 50);
        assert_eq!(bbox, Bbox::new(500000.0, 3999500.0, 501000.0, 4000000.0));
    }

    #[test]
    fn test_bounds_from_transformation() {
        let mut t = [0.0; 16];
        t[0] = 0.5;
        t[3] = 10.0;
        t[5] = -0.5;
        t[7] = 20.0;
        t[15] = 1.0;
        let bbox = bounds_from_transformation(&t, 4, 2);
        assert_eq!(bbox, Bbox::new(10.0, 19.0, 12.0, 20.0));
    }

    #[test]
    fn test_read_raster_info() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("S2_rgb.tiff");
        write_geotiff(&path, &GeoTiffFixture::geographic(4326, -3.0, 40.0, 0.01)).unwrap();

        let info = read_raster_info(&path).unwrap();
        assert_eq!((info.width, info.height), (16, 16));
        assert_eq!(info.epsg, Some(4326));
        let bounds = info.native_bounds.unwrap();
        assert!((bounds.west + 3.0).abs() < 1e-9);
        assert!((bounds.north - 40.0).abs() < 1e-9);
        assert!((bounds.east - (-3.0 + 0.16)).abs() < 1e-9);
    }

    #[test]
    fn test_not_a_tiff_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.tiff");
        std::fs::write(&path, b"definitely not a tiff").unwrap();
        assert!(matches!(
            read_raster_info(&path),
            Err(CurationError::RasterOpen { .. })
        ));
    }
}
