use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use schemars::schema::RootSchema;
use serde_json::Value;
use thiserror::Error;

use super::Sidecar;
use crate::timestamps::CANONICAL_FORMAT;

pub const SCHEMA_FILE_NAME: &str = "vna_sidecar_v0.1.0.json";
pub const SCHEMA_RELATIVE_PATH: &str = "schema/vna_sidecar_v0.1.0.json";

const CANONICAL_LEN: usize = "2000-01-01T00:00:00Z".len();

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("document does not match the sidecar shape: {0}")]
    Shape(String),
    #[error("{field} is not a canonical UTC timestamp: {value}")]
    Timestamp { field: String, value: String },
    #[error("warnings must be sorted and unique")]
    Warnings,
    #[error("streams must be listed in ascending index order")]
    StreamOrder,
    #[error("{field} is out of range")]
    Number { field: String },
    #[error("failed to write schema to {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
}

/// JSON Schema describing the canonical sidecar.
pub fn sidecar_schema() -> RootSchema {
    schemars::schema_for!(Sidecar)
}

/// Writes the schema under `<derived_root>/schema/` and returns the path.
pub fn export_schema(derived_root: &Path) -> Result<PathBuf, SchemaError> {
    let path = derived_root.join(SCHEMA_RELATIVE_PATH);
    export_schema_to(&path)?;
    Ok(path)
}

pub fn export_schema_to(path: &Path) -> Result<(), SchemaError> {
    let io_error = |source| SchemaError::Io {
        source,
        path: path.to_path_buf(),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    let mut rendered = serde_json::to_string_pretty(&sidecar_schema())
        .map_err(|err| SchemaError::Shape(err.to_string()))?;
    rendered.push('\n');
    std::fs::write(path, rendered).map_err(io_error)
}

/// Checks a typed sidecar against the strict schema and its invariants.
pub fn validate(sidecar: &Sidecar) -> Result<(), SchemaError> {
    let value = serde_json::to_value(sidecar).map_err(|err| SchemaError::Shape(err.to_string()))?;
    validate_value(&value).map(|_| ())
}

/// Strictly parses an untyped document and checks the invariants the type
/// system cannot express.
pub fn validate_value(value: &Value) -> Result<Sidecar, SchemaError> {
    let sidecar: Sidecar =
        serde_json::from_value(value.clone()).map_err(|err| SchemaError::Shape(err.to_string()))?;

    check_timestamp("source.created_time", &sidecar.source.created_time)?;
    if let Some(modified) = &sidecar.source.modified_time {
        check_timestamp("source.modified_time", modified)?;
    }
    check_timestamp("provenance.ingested_at", &sidecar.provenance.ingested_at)?;

    if sidecar.warnings.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(SchemaError::Warnings);
    }
    if sidecar
        .streams
        .windows(2)
        .any(|pair| pair[0].index > pair[1].index)
    {
        return Err(SchemaError::StreamOrder);
    }

    check_finite("format.duration_s", sidecar.format.duration_s)?;
    if let Some(video) = &sidecar.video {
        check_finite("video.pixel_aspect_ratio", video.pixel_aspect_ratio)?;
        if let Some(fps) = video.frame_rate_fps {
            check_number("video.frame_rate_fps", fps)?;
        }
    }
    check_number(
        "thumbnails.poster.timestamp_s",
        sidecar.thumbnails.poster.timestamp_s,
    )?;
    for (position, sample) in sidecar.thumbnails.samples.iter().enumerate() {
        check_number(
            &format!("thumbnails.samples[{position}].timestamp_s"),
            sample.timestamp_s,
        )?;
    }
    Ok(sidecar)
}

/// `YYYY-MM-DDTHH:MM:SSZ`, exactly. chrono also formats signed and
/// five-digit years, so the length is pinned as well.
fn check_timestamp(field: &str, value: &str) -> Result<(), SchemaError> {
    let canonical = NaiveDateTime::parse_from_str(value, CANONICAL_FORMAT)
        .ok()
        .map(|parsed| parsed.format(CANONICAL_FORMAT).to_string());
    if value.len() == CANONICAL_LEN && canonical.as_deref() == Some(value) {
        Ok(())
    } else {
        Err(SchemaError::Timestamp {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

fn check_finite(field: &str, value: f64) -> Result<(), SchemaError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SchemaError::Number {
            field: field.to_string(),
        })
    }
}

fn check_number(field: &str, value: f64) -> Result<(), SchemaError> {
    check_finite(field, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(SchemaError::Number {
            field: field.to_string(),
        })
    }
}
