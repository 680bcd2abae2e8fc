//! Segment file loader.
//!
//! Accepts the upstream analysis job's JSON output, either a bare array of
//! segments or `{ "segments": [...], "min_cohort_size": N }`, and a flat
//! CSV export with one segment per row. Expected CSV columns:
//!   product_id, app_store, price_bucket, country, region, user_count,
//!   has_sufficient_data, properties_dropped, rollup_description,
//!   rollup_target, final_user_count, accuracy_score
//!
//! `properties_dropped` is `;`-separated in CSV. Empty cells are `None`.

use std::io::Read;
use std::path::Path;

use rollup_core::{RollupError, Segment};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{LoadError, LoadResult};

const PROPERTY_LIST_SEPARATOR: char = ';';

/// On-disk encoding of a segment file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentFormat {
    Json,
    Csv,
}

impl SegmentFormat {
    /// Pick the format from the file extension.
    pub fn from_path(path: &Path) -> LoadResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("json") => Ok(SegmentFormat::Json),
            Some("csv") => Ok(SegmentFormat::Csv),
            _ => Err(LoadError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Segments plus the cohort size carried by a wrapped JSON file, if any.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadedSegments {
    pub segments: Vec<Segment>,
    pub min_cohort_size: Option<i64>,
}

/// A CSV row. Mirrors `Segment` but with CSV-friendly list and bool cells.
#[derive(Debug, Clone, Deserialize)]
struct SegmentRecord {
    product_id: String,
    app_store: String,
    price_bucket: String,
    country: Option<String>,
    region: Option<String>,
    user_count: i64,
    #[serde(deserialize_with = "deserialize_bool")]
    has_sufficient_data: bool,
    #[serde(default)]
    properties_dropped: Option<String>,
    #[serde(default)]
    rollup_description: Option<String>,
    #[serde(default)]
    rollup_target: Option<String>,
    #[serde(default)]
    final_user_count: Option<i64>,
    #[serde(default)]
    accuracy_score: Option<String>,
}

impl SegmentRecord {
    fn into_segment(self) -> Segment {
        let properties_dropped = self
            .properties_dropped
            .map(|cell| {
                cell.split(PROPERTY_LIST_SEPARATOR)
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Segment {
            product_id: self.product_id,
            app_store: self.app_store,
            price_bucket: self.price_bucket,
            country: non_empty(self.country),
            region: non_empty(self.region),
            user_count: self.user_count,
            has_sufficient_data: self.has_sufficient_data,
            properties_dropped,
            rollup_description: non_empty(self.rollup_description),
            rollup_target: non_empty(self.rollup_target),
            final_user_count: self.final_user_count,
            accuracy_score: non_empty(self.accuracy_score),
        }
    }
}

fn non_empty(cell: Option<String>) -> Option<String> {
    cell.filter(|v| !v.trim().is_empty())
}

/// Load segments from a reader in the given format.
pub fn load_segments<R: Read>(reader: R, format: SegmentFormat) -> LoadResult<LoadedSegments> {
    match format {
        SegmentFormat::Json => load_json(reader),
        SegmentFormat::Csv => load_csv(reader).map(|segments| LoadedSegments {
            segments,
            min_cohort_size: None,
        }),
    }
}

/// Load segments from a file, choosing the format by extension.
pub fn load_segments_file(path: impl AsRef<Path>) -> LoadResult<LoadedSegments> {
    let path = path.as_ref();
    let format = SegmentFormat::from_path(path)?;
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let loaded = load_segments(file, format)?;
    log::debug!(
        "loaded {} segments from {}",
        loaded.segments.len(),
        path.display()
    );
    Ok(loaded)
}

fn load_json<R: Read>(reader: R) -> LoadResult<LoadedSegments> {
    let value: Value = serde_json::from_reader(reader)?;
    match value {
        Value::Array(_) => Ok(LoadedSegments {
            segments: serde_json::from_value(value)?,
            min_cohort_size: None,
        }),
        Value::Object(mut object) => {
            let segments = match object.remove("segments") {
                Some(raw) => serde_json::from_value(raw)?,
                None => return Err(LoadError::UnexpectedShape("an object without \"segments\"".into())),
            };
            let min_cohort_size = match object.remove("min_cohort_size") {
                None | Some(Value::Null) => None,
                Some(raw) => Some(
                    raw.as_i64()
                        .ok_or_else(|| RollupError::InvalidMinCohortSize(raw.to_string()))?,
                ),
            };
            Ok(LoadedSegments {
                segments,
                min_cohort_size,
            })
        }
        other => Err(LoadError::UnexpectedShape(json_kind(&other).into())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn load_csv<R: Read>(reader: R) -> LoadResult<Vec<Segment>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut segments = Vec::new();
    for (line_num, result) in csv_reader.deserialize().enumerate() {
        let record: SegmentRecord = result.map_err(|source| LoadError::Csv {
            line: line_num + 2,
            source,
        })?;
        segments.push(record.into_segment());
    }

    Ok(segments)
}

/// Flexible bool deserializer: handles "true"/"false", "1"/"0", "yes"/"no".
fn deserialize_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    match s.to_lowercase().trim() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected bool value, got '{}'",
            other
        ))),
    }
}
