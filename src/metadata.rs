//! Sidecar metadata files and the acquisition dates they carry.

use crate::model::{date_to_datetime, TemporalExtent};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::warn;

/// Acquisition date key, spelled as in the datasets this tool curates.
pub const DATE_FIELD: &str = "date-adquired";
pub const DATE_FIELD_ALIAS: &str = "date-acquired";
pub const DIRECTORY_METADATA: &str = "metadata.json";

pub fn unknown_acquisition_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default()
}

/// Item datetime used when no metadata gives one.
pub fn unknown_acquisition_datetime() -> DateTime<Utc> {
    date_to_datetime(unknown_acquisition_date())
}

/// Interval reported for collections without any dated metadata.
pub fn default_temporal_extent() -> TemporalExtent {
    TemporalExtent {
        start: unknown_acquisition_date(),
        end: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap_or_default(),
    }
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(?<date>\d{4}-\d{2}-\d{2})").expect("Regex pattern should always compile")
    })
}

/// Calendar date at the start of `value`; any time-of-day suffix is ignored.
pub fn parse_acquisition_date(value: &str) -> Option<NaiveDate> {
    let captures = date_pattern().captures(value)?;
    NaiveDate::parse_from_str(&captures["date"], "%Y-%m-%d").ok()
}

/// Acquisition date of a metadata document, if it has a usable one.
pub fn acquisition_date(metadata: &Value) -> Option<NaiveDate> {
    let raw = metadata
        .get(DATE_FIELD)
        .or_else(|| metadata.get(DATE_FIELD_ALIAS))?
        .as_str()?;
    if raw.trim().is_empty() {
        return None;
    }
    parse_acquisition_date(raw)
}

/// Metadata file describing `raster`: `metadata.json` next to it, else
/// `<name>.json` where `<name>` is the file name up to its first dot.
pub fn find_item_metadata(raster: &Path) -> Option<PathBuf> {
    let dir = raster.parent()?;
    let directory_metadata = dir.join(DIRECTORY_METADATA);
    if directory_metadata.is_file() {
        return Some(directory_metadata);
    }
    let name = raster.file_name()?.to_str()?;
    let stem = name.split('.').next()?;
    let own_metadata = dir.join(format!("{stem}.json"));
    own_metadata.is_file().then_some(own_metadata)
}

/// Parses a metadata file, logging and returning `None` when it cannot be used.
pub fn read_metadata(path: &Path) -> Option<Value> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Unable to read metadata {:?}: {}", path, e);
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Unable to parse metadata {:?}: {}", path, e);
            None
        }
    }
}

/// Datetime of the item built from `raster`, falling back to the unknown sentinel.
pub fn item_acquisition_datetime(raster: &Path) -> DateTime<Utc> {
    let Some(path) = find_item_metadata(raster) else {
        warn!("No metadata for {:?}; using unknown acquisition date", raster);
        return unknown_acquisition_datetime();
    };
    match read_metadata(&path).as_ref().and_then(acquisition_date) {
        Some(date) => date_to_datetime(date),
        None => {
            warn!(
                "Metadata {:?} has no usable '{}'; using unknown acquisition date",
                path, DATE_FIELD
            );
            unknown_acquisition_datetime()
        }
    }
}
