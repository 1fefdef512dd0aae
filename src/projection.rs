//! Reprojection of raster bounds to EPSG:4326 with proj4rs.

use crate::model::Bbox;
use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use thiserror::Error;

pub const TARGET_EPSG: u16 = 4326;

/// Points sampled along each edge of a box before reprojecting it.
const DENSIFY_POINTS: usize = 21;

#[derive(Error, Debug, PartialEq)]
pub enum ProjectionError {
    #[error("EPSG:{0} is not in the crs-definitions database")]
    UnknownEpsg(u16),

    #[error("Invalid projection EPSG:{epsg}: {reason}")]
    InvalidDefinition { epsg: u16, reason: String },

    #[error("Transform from EPSG:{from} to EPSG:{to} failed: {reason}")]
    Transform { from: u16, to: u16, reason: String },
}

pub fn get_proj_string(epsg: u16) -> Option<&'static str> {
    crs_definitions::from_code(epsg).map(|def| def.proj4)
}

pub fn is_geographic_crs(epsg: u16) -> bool {
    match get_proj_string(epsg) {
        Some(proj) => proj.contains("+proj=longlat"),
        None => epsg == TARGET_EPSG,
    }
}

fn load(epsg: u16) -> Result<Proj, ProjectionError> {
    let definition = get_proj_string(epsg).ok_or(ProjectionError::UnknownEpsg(epsg))?;
    Proj::from_proj_string(definition).map_err(|e| ProjectionError::InvalidDefinition {
        epsg,
        reason: format!("{e:?}"),
    })
}

/// Reprojects `bbox` (in `source_epsg` units) to an EPSG:4326 box.
///
/// Each edge is densified so curved edges in the target system stay inside
/// the result.
pub fn transform_bounds(source_epsg: u16, bbox: &Bbox) -> Result<Bbox, ProjectionError> {
    if source_epsg == TARGET_EPSG {
        return Ok(*bbox);
    }
    let source = load(source_epsg)?;
    let target = load(TARGET_EPSG)?;
    let source_is_geographic = is_geographic_crs(source_epsg);

    let mut result = Bbox::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (x, y) in densify(bbox) {
        let mut point = if source_is_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        transform(&source, &target, &mut point).map_err(|e| ProjectionError::Transform {
            from: source_epsg,
            to: TARGET_EPSG,
            reason: format!("{e:?}"),
        })?;
        let (lon, lat) = (point.0.to_degrees(), point.1.to_degrees());
        if !lon.is_finite() || !lat.is_finite() {
            return Err(ProjectionError::Transform {
                from: source_epsg,
                to: TARGET_EPSG,
                reason: format!("non-finite result for ({x}, {y})"),
            });
        }
        result = result.union(&Bbox::new(lon, lat, lon, lat));
    }
    Ok(result)
}

fn densify(bbox: &Bbox) -> Vec<(f64, f64)> {
    let steps = (DENSIFY_POINTS - 1) as f64;
    let width = bbox.east - bbox.west;
    let height = bbox.north - bbox.south;
    let mut points = Vec::with_capacity(DENSIFY_POINTS * 4);
    for k in 0..DENSIFY_POINTS {
        let t = k as f64 / steps;
        let x = bbox.west + t * width;
        let y = bbox.south + t * height;
        points.push((x, bbox.south));
        points.push((x, bbox.north));
        points.push((bbox.west, y));
        points.push((bbox.east, y));
    }
    points
}
