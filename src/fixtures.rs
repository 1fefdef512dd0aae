//! GeoTIFF files for unit tests, written with the pure-Rust encoder.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use tiff::TiffResult;

pub struct GeoTiffFixture {
    pub width: u32,
    pub height: u32,
    pub epsg: Option<u16>,
    pub geographic: bool,
    pub west: f64,
    pub north: f64,
    pub resolution: f64,
}

impl GeoTiffFixture {
    pub fn geographic(epsg: u16, west: f64, north: f64, resolution: f64) -> Self {
        Self {
            width: 16,
            height: 16,
            epsg: Some(epsg),
            geographic: true,
            west,
            north,
            resolution,
        }
    }

    pub fn projected(epsg: u16, west: f64, north: f64, resolution: f64) -> Self {
        Self {
            geographic: false,
            ..Self::geographic(epsg, west, north, resolution)
        }
    }

    /// Georeferenced, but with a user-defined coordinate system.
    pub fn user_defined(west: f64, north: f64, resolution: f64) -> Self {
        Self {
            geographic: false,
            ..Self::geographic(32767, west, north, resolution)
        }
    }

    fn geokeys(&self) -> Vec<u16> {
        let (model, crs_key) = if self.geographic { (2, 2048) } else { (1, 3072) };
        let mut keys = vec![1, 1, 0, 2, 1024, 0, 1, model, 1025, 0, 1, 1];
        if let Some(epsg) = self.epsg {
            keys[3] = 3;
            keys.extend_from_slice(&[crs_key, 0, 1, epsg]);
        }
        keys
    }
}

pub fn write_geotiff(path: &Path, fixture: &GeoTiffFixture) -> TiffResult<()> {
    let file = File::create(path)?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
    let mut image = encoder.new_image::<colortype::Gray8>(fixture.width, fixture.height)?;

    let res = fixture.resolution;
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, [res, res, 0.0].as_slice())?;
    image.encoder().write_tag(
        Tag::ModelTiepointTag,
        [0.0, 0.0, 0.0, fixture.west, fixture.north, 0.0].as_slice(),
    )?;
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, fixture.geokeys().as_slice())?;

    let data = vec![0u8; (fixture.width * fixture.height) as usize];
    image.write_data(&data)?;
    Ok(())
}
