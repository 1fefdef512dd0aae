//! In-memory STAC hierarchy produced by a curation run.
//!
//! The objects here carry exactly what the generator derives. Their JSON
//! descriptors are rendered with [`serde_json::json!`] so that nullable
//! bounding boxes (`[null, null, null, null]`) and the filename order of
//! assets survive serialization unchanged.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::PathBuf;

pub const STAC_VERSION: &str = "1.0.0";
pub const GEOTIFF_MEDIA_TYPE: &str = "image/tiff; application=geotiff";
pub const JSON_MEDIA_TYPE: &str = "application/json";
pub const DEFAULT_LICENSE: &str = "proprietary";
pub const COLLECTION_DESCRIPTION: &str = "Collection";

/// Bounding box in EPSG:4326 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bbox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Bbox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &Bbox) -> Bbox {
        Bbox {
            west: self.west.min(other.west),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            north: self.north.max(other.north),
        }
    }

    pub fn contains(&self, other: &Bbox) -> bool {
        self.west <= other.west
            && self.south <= other.south
            && self.east >= other.east
            && self.north >= other.north
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }
}

/// Renders an optional bbox, using four nulls for the unknown value.
pub fn bbox_value(bbox: Option<&Bbox>) -> Value {
    match bbox {
        Some(b) => json!(b.to_array()),
        None => json!([null, null, null, null]),
    }
}

pub fn format_datetime(datetime: &DateTime<Utc>) -> String {
    datetime.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Midnight UTC of a calendar date.
pub fn date_to_datetime(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Link {
    pub fn new(rel: &str, href: &str) -> Self {
        Self {
            rel: rel.to_string(),
            href: href.to_string(),
            media_type: Some(JSON_MEDIA_TYPE.to_string()),
            title: None,
        }
    }

    pub fn with_title(mut self, title: Option<&str>) -> Self {
        self.title = title.map(str::to_string);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemporalExtent {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extent {
    /// `None` is the unknown spatial extent.
    pub spatial: Option<Bbox>,
    pub temporal: TemporalExtent,
}

impl Extent {
    pub fn to_value(&self) -> Value {
        json!({
            "spatial": { "bbox": [bbox_value(self.spatial.as_ref())] },
            "temporal": {
                "interval": [[
                    format_datetime(&date_to_datetime(self.temporal.start)),
                    format_datetime(&date_to_datetime(self.temporal.end)),
                ]]
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    /// Key of the asset within its item; the file stem.
    pub key: String,
    pub href: String,
    pub title: String,
    pub media_type: String,
    /// Original raster location; `href` is derived from it when hrefs are normalized.
    pub source: PathBuf,
}

impl Asset {
    pub fn to_value(&self) -> Value {
        json!({
            "href": self.href,
            "type": self.media_type,
            "title": self.title,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: String,
    pub geometry: Option<geojson::Geometry>,
    pub bbox: Option<Bbox>,
    pub datetime: DateTime<Utc>,
    /// Ordered by file name.
    pub assets: Vec<Asset>,
    /// Extension schema URIs, sorted.
    pub stac_extensions: Vec<String>,
    pub collection: Option<String>,
    pub links: Vec<Link>,
    pub self_href: Option<PathBuf>,
}

impl Item {
    pub fn new(id: &str, datetime: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            geometry: None,
            bbox: None,
            datetime,
            assets: Vec::new(),
            stac_extensions: Vec::new(),
            collection: None,
            links: Vec::new(),
            self_href: None,
        }
    }

    pub fn add_stac_extension(&mut self, schema: &str) {
        if let Err(position) = self
            .stac_extensions
            .binary_search_by(|s| s.as_str().cmp(schema))
        {
            self.stac_extensions.insert(position, schema.to_string());
        }
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        let geometry = match &self.geometry {
            Some(g) => serde_json::to_value(g)?,
            None => Value::Null,
        };
        let mut assets = Map::new();
        for asset in self.assets.iter() {
            assets.insert(asset.key.clone(), asset.to_value());
        }

        let mut value = json!({
            "type": "Feature",
            "stac_version": STAC_VERSION,
            "stac_extensions": self.stac_extensions,
            "id": self.id,
            "geometry": geometry,
            "bbox": bbox_value(self.bbox.as_ref()),
            "properties": { "datetime": format_datetime(&self.datetime) },
            "links": self.links,
            "assets": assets,
        });
        if let (Some(collection), Some(obj)) = (&self.collection, value.as_object_mut()) {
            obj.insert("collection".to_string(), json!(collection));
        }
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub id: String,
    pub description: String,
    pub license: String,
    pub extent: Extent,
    pub items: Vec<Item>,
    pub links: Vec<Link>,
    pub self_href: Option<PathBuf>,
}

impl Collection {
    pub fn new(id: &str, extent: Extent) -> Self {
        Self {
            id: id.to_string(),
            description: COLLECTION_DESCRIPTION.to_string(),
            license: DEFAULT_LICENSE.to_string(),
            extent,
            items: Vec::new(),
            links: Vec::new(),
            self_href: None,
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "type": "Collection",
            "id": self.id,
            "stac_version": STAC_VERSION,
            "description": self.description,
            "links": self.links,
            "stac_extensions": [],
            "extent": self.extent.to_value(),
            "license": self.license,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub id: String,
    pub title: Option<String>,
    pub description: String,
    pub collections: Vec<Collection>,
    /// Child links of a loaded catalog that no generated collection replaces.
    pub inherited_children: Vec<Link>,
    pub links: Vec<Link>,
    pub self_href: Option<PathBuf>,
}

impl Catalog {
    pub fn new(id: &str, title: Option<&str>, description: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.map(str::to_string),
            description: description.to_string(),
            collections: Vec::new(),
            inherited_children: Vec::new(),
            links: Vec::new(),
            self_href: None,
        }
    }

    /// Attaches a collection, replacing any previous child with the same id.
    pub fn add_child(&mut self, collection: Collection) {
        self.inherited_children
            .retain(|link| child_id_from_href(&link.href) != Some(collection.id.as_str()));
        match self.collections.iter_mut().find(|c| c.id == collection.id) {
            Some(existing) => *existing = collection,
            None => self.collections.push(collection),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut value = json!({
            "type": "Catalog",
            "id": self.id,
            "stac_version": STAC_VERSION,
            "description": self.description,
            "links": self.links,
        });
        if let (Some(title), Some(obj)) = (&self.title, value.as_object_mut()) {
            obj.insert("title".to_string(), json!(title));
        }
        value
    }
}

/// Collection id implied by a child href laid out as `<id>/collection.json`.
pub fn child_id_from_href(href: &str) -> Option<&str> {
    let mut parts = href.trim_end_matches('/').rsplit('/');
    let _descriptor = parts.next()?;
    parts.next().filter(|p| !p.is_empty() && *p != "." && *p != "..")
}
