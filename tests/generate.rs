mod common;

use common::{read_json, wgs84_raster, write_metadata, write_raster, GeoTiffFixture};
use serde_json::{json, Value};
use stac_curator::catalog::generate_stac_metadata;
use stac_curator::config::{CatalogType, GenerationConfig};
use stac_curator::extensions::{ExtensionNames, StacExtension};
use stac_curator::scanner::get_asset_table;
use stac_curator::CurationError;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use url::Url;
use walkdir::WalkDir;

fn config(output: &Path) -> GenerationConfig {
    let mut config = GenerationConfig::new("test-catalog");
    config.output_dir = output.to_path_buf();
    config
}

fn descriptors(output: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    WalkDir::new(output)
        .sort_by_file_name()
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(output).unwrap().to_path_buf();
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

#[test]
fn single_collection_two_assets_same_label() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let output = dir.path().join("out");
    wgs84_raster(&root, "colA/img_02.tiff", 10.0, 45.0);
    wgs84_raster(&root, "colA/img_01.tiff", 10.0, 45.0);
    write_metadata(&root.join("colA/metadata.json"), "2021-05-01");

    let catalog = generate_stac_metadata(&root, &config(&output), None).unwrap();
    assert_eq!(catalog.collections.len(), 1);
    let collection = &catalog.collections[0];
    assert_eq!(collection.id, "colA");
    assert_eq!(collection.items.len(), 1);
    assert_eq!(collection.items[0].id, "colA");

    let value = read_json(&output.join("colA/collection.json"));
    assert_eq!(
        value["extent"]["temporal"]["interval"][0],
        json!(["2021-05-01T00:00:00Z", "2021-05-01T00:00:00Z"])
    );
    assert_eq!(value["extent"]["spatial"]["bbox"][0], json!([10.0, 41.0, 14.0, 45.0]));

    let item = read_json(&output.join("colA/colA/colA.json"));
    let keys: Vec<&String> = item["assets"].as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["img_01", "img_02"]);
    assert_eq!(item["properties"]["datetime"], "2021-05-01T00:00:00Z");
    assert_eq!(item["collection"], "colA");
    assert_eq!(item["assets"]["img_01"]["type"], "image/tiff; application=geotiff");
    assert_eq!(
        item["assets"]["img_01"]["href"],
        "../../../data/colA/img_01.tiff"
    );

    let parsed: stac::Item = serde_json::from_value(item).unwrap();
    assert_eq!(parsed.id, "colA");
}

#[test]
fn unreprojectable_raster_nulls_collection_extent() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let output = dir.path().join("out");
    wgs84_raster(&root, "colB/a/S1_a.tiff", 1.0, 10.0);
    write_raster(&root, "colB/b/S1_b.tiff", &GeoTiffFixture::user_defined(2.0, 11.0, 0.25));
    wgs84_raster(&root, "colB/c/S1_c.tiff", 3.0, 12.0);

    generate_stac_metadata(&root, &config(&output), None).unwrap();

    let collection = read_json(&output.join("colB/collection.json"));
    assert_eq!(collection["extent"]["spatial"]["bbox"][0], json!([null, null, null, null]));

    let bad = read_json(&output.join("colB/b/b.json"));
    assert_eq!(bad["bbox"], json!([null, null, null, null]));
    assert_eq!(bad["geometry"], Value::Null);
    let good = read_json(&output.join("colB/a/a.json"));
    assert_eq!(good["bbox"], json!([1.0, 6.0, 5.0, 10.0]));
    assert_eq!(good["geometry"]["type"], "Polygon");
}

#[test]
fn missing_metadata_uses_sentinel_datetime() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let output = dir.path().join("out");
    wgs84_raster(&root, "col/a/S2_x.tiff", 5.0, 40.0);
    write_metadata(&root.join("col/a/metadata.json"), "2022-03-04T10:00:00");
    wgs84_raster(&root, "col/b/S2_y.tiff", 6.0, 41.0);

    generate_stac_metadata(&root, &config(&output), None).unwrap();

    let a = read_json(&output.join("col/a/a.json"));
    let b = read_json(&output.join("col/b/b.json"));
    assert_eq!(a["properties"]["datetime"], "2022-03-04T00:00:00Z");
    assert_eq!(b["properties"]["datetime"], "2000-01-01T00:00:00Z");
    assert!(output.join("catalog.json").is_file());
}

#[test]
fn collection_without_metadata_gets_default_interval() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let output = dir.path().join("out");
    wgs84_raster(&root, "col/a/S2_x.tiff", 5.0, 40.0);

    generate_stac_metadata(&root, &config(&output), None).unwrap();

    let collection = read_json(&output.join("col/collection.json"));
    assert_eq!(
        collection["extent"]["temporal"]["interval"][0],
        json!(["2000-01-01T00:00:00Z", "2023-12-31T00:00:00Z"])
    );
}

#[test]
fn two_runs_are_byte_identical() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let output = dir.path().join("out");
    wgs84_raster(&root, "colA/s1/S1_vv.tiff", 1.0, 10.0);
    wgs84_raster(&root, "colA/s1/S1_vh.tiff", 1.0, 10.0);
    wgs84_raster(&root, "colA/s2/S2_rgb.tiff", 2.0, 10.0);
    wgs84_raster(&root, "colB/x/DEM.tiff", 3.0, 12.0);
    write_metadata(&root.join("colA/s1/metadata.json"), "2020-01-01");

    let mut config = config(&output);
    config
        .extensions
        .insert("S1".to_string(), ExtensionNames::One(StacExtension::Sar));

    generate_stac_metadata(&root, &config, None).unwrap();
    let first = descriptors(&output);
    generate_stac_metadata(&root, &config, None).unwrap();
    let second = descriptors(&output);

    assert_eq!(first.len(), 6);
    assert_eq!(first, second);

    let s1 = read_json(&output.join("colA/s1/s1.json"));
    assert_eq!(s1["stac_extensions"], json!([StacExtension::Sar.schema_uri()]));
    let s2 = read_json(&output.join("colA/s2/s2.json"));
    assert_eq!(s2["stac_extensions"], json!([]));
}

#[test]
fn catalog_links_are_relative_when_self_contained() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let output = dir.path().join("out");
    wgs84_raster(&root, "colA/a/S1_a.tiff", 1.0, 10.0);

    generate_stac_metadata(&root, &config(&output), None).unwrap();

    let catalog = read_json(&output.join("catalog.json"));
    assert_eq!(catalog["id"], "test-catalog");
    assert_eq!(catalog["description"], "Catalog");
    let links = catalog["links"].as_array().unwrap();
    assert!(links.iter().all(|l| l["rel"] != "self"));
    assert!(links
        .iter()
        .any(|l| l["rel"] == "child" && l["href"] == "./colA/collection.json"));

    let parsed: stac::Catalog = serde_json::from_value(catalog).unwrap();
    assert_eq!(parsed.id, "test-catalog");
}

#[test]
fn absolute_published_catalog_uses_base_url() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let output = dir.path().join("out");
    wgs84_raster(&root, "colA/a/S1_a.tiff", 1.0, 10.0);

    let mut config = config(&output);
    config.catalog_type = CatalogType::AbsolutePublished;
    config.base_url = Some(Url::parse("https://example.org/stac/").unwrap());
    generate_stac_metadata(&root, &config, None).unwrap();

    let item = read_json(&output.join("colA/a/a.json"));
    let links = item["links"].as_array().unwrap();
    assert!(links
        .iter()
        .any(|l| l["rel"] == "self" && l["href"] == "https://example.org/stac/colA/a/a.json"));
    assert!(links
        .iter()
        .any(|l| l["rel"] == "root" && l["href"] == "https://example.org/stac/catalog.json"));
    let href = item["assets"]["S1_a"]["href"].as_str().unwrap();
    assert_eq!(Path::new(href), root.join("colA/a/S1_a.tiff"));
}

#[test]
fn existing_catalog_is_extended() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let output = dir.path().join("out");
    wgs84_raster(&root, "colA/a/S1_a.tiff", 1.0, 10.0);
    fs::write(
        root.join("catalog.json"),
        r#"{
            "type": "Catalog",
            "stac_version": "1.0.0",
            "id": "legacy",
            "title": "Legacy",
            "description": "Curated before",
            "links": [
                {"rel": "child", "href": "./colA/collection.json"},
                {"rel": "child", "href": "./old/collection.json"}
            ]
        }"#,
    )
    .unwrap();

    let catalog = generate_stac_metadata(&root, &config(&output), None).unwrap();
    assert_eq!(catalog.id, "legacy");

    let value = read_json(&output.join("catalog.json"));
    assert_eq!(value["title"], "Legacy");
    assert_eq!(value["description"], "Curated before");
    let children: Vec<&str> = value["links"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|l| l["rel"] == "child")
        .map(|l| l["href"].as_str().unwrap())
        .collect();
    assert_eq!(
        children,
        vec!["./colA/collection.json", "../data/old/collection.json"]
    );
}

#[test]
fn output_inside_root_is_not_a_collection() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let output = root.join("stac");
    wgs84_raster(&root, "colA/a/S1_a.tiff", 1.0, 10.0);

    generate_stac_metadata(&root, &config(&output), None).unwrap();
    let catalog = generate_stac_metadata(&root, &config(&output), None).unwrap();

    let ids: Vec<&str> = catalog.collections.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["colA"]);
}

#[test]
fn precomputed_asset_table_drives_items() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let output = dir.path().join("out");
    wgs84_raster(&root, "colA/a/S1_a.tiff", 1.0, 10.0);
    let table = get_asset_table(&root, None, "tiff").unwrap();
    wgs84_raster(&root, "colA/b/S1_b.tiff", 2.0, 10.0);

    let catalog = generate_stac_metadata(&root, &config(&output), Some(table)).unwrap();
    let items: Vec<&str> = catalog.collections[0]
        .items
        .iter()
        .map(|i| i.id.as_str())
        .collect();
    assert_eq!(items, vec!["a"]);
}

#[test]
fn empty_root_gives_empty_catalog() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    fs::create_dir_all(&root).unwrap();
    let output = dir.path().join("out");

    let catalog = generate_stac_metadata(&root, &config(&output), None).unwrap();
    assert!(catalog.collections.is_empty());
    assert!(output.join("catalog.json").is_file());
}

#[test]
fn broken_raster_aborts_without_output() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let output = dir.path().join("out");
    wgs84_raster(&root, "colA/a/S1_a.tiff", 1.0, 10.0);
    fs::create_dir_all(root.join("colB/x")).unwrap();
    fs::write(root.join("colB/x/S1_x.tiff"), b"not a tiff").unwrap();

    let result = generate_stac_metadata(&root, &config(&output), None);
    assert!(matches!(result, Err(CurationError::RasterOpen { .. })));
    assert!(!output.exists());
}

#[test]
fn output_equal_to_root_is_rejected() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let raster = wgs84_raster(&root, "colA/a/S1_a.tiff", 1.0, 10.0);
    write_metadata(&root.join("colA/a/metadata.json"), "2021-05-01");

    let result = generate_stac_metadata(&root, &config(&root), None);
    assert!(matches!(result, Err(CurationError::Config { .. })));
    assert!(raster.is_file());
    assert!(root.join("colA/a/metadata.json").is_file());
}

#[test]
fn output_containing_root_is_rejected() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let raster = wgs84_raster(&root, "colA/a/S1_a.tiff", 1.0, 10.0);
    fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

    let result = generate_stac_metadata(&root, &config(dir.path()), None);
    assert!(matches!(result, Err(CurationError::Config { .. })));
    assert!(raster.is_file());
    assert!(dir.path().join("notes.txt").is_file());
}

#[test]
fn unrelated_output_directory_is_left_alone() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let output = dir.path().join("out");
    wgs84_raster(&root, "colA/a/S1_a.tiff", 1.0, 10.0);
    fs::create_dir_all(&output).unwrap();
    fs::write(output.join("notes.txt"), "keep me").unwrap();

    let result = generate_stac_metadata(&root, &config(&output), None);
    assert!(matches!(result, Err(CurationError::Persist { .. })));
    assert!(output.join("notes.txt").is_file());
    assert!(!output.join("catalog.json").exists());
}
