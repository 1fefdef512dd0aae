#![allow(dead_code)]

#[path = "../../src/fixtures.rs"]
mod fixtures;

pub use fixtures::{write_geotiff, GeoTiffFixture};

use std::fs;
use std::path::{Path, PathBuf};

/// 16x16 EPSG:4326 raster of 4x4 degrees with its upper-left corner at (`west`, `north`).
pub fn wgs84_raster(root: &Path, rel: &str, west: f64, north: f64) -> PathBuf {
    write_raster(root, rel, &GeoTiffFixture::geographic(4326, west, north, 0.25))
}

pub fn write_raster(root: &Path, rel: &str, fixture: &GeoTiffFixture) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    write_geotiff(&path, fixture).unwrap();
    path
}

pub fn write_metadata(path: &Path, date: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, format!(r#"{{"date-adquired": "{date}"}}"#)).unwrap();
}

pub fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}
