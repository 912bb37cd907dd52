//! Canonical sidecar document.
//!
//! Every object here is closed (`deny_unknown_fields`) so that drift between
//! what the normalizer produces and what the schema describes is caught by
//! [`validate`]. Previously stored documents that only need to be echoed back
//! go through the open [`SidecarEcho`] instead.

mod echo;
mod schema;

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::identity::{HashInfo, HashQuality};
use crate::source::SourceType;

pub use echo::SidecarEcho;
pub use schema::{
    export_schema, export_schema_to, sidecar_schema, validate, validate_value, SchemaError,
    SCHEMA_FILE_NAME, SCHEMA_RELATIVE_PATH,
};

pub const SCHEMA_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum SchemaVersion {
    #[default]
    #[serde(rename = "0.1.0")]
    V0_1_0,
}

impl SchemaVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaVersion::V0_1_0 => SCHEMA_VERSION,
        }
    }
}

/// Warnings recorded for degraded input or failed enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IngestWarning {
    DurationUnavailable,
    FrameRateUnavailable,
    NoAudioStream,
    ThumbnailGenerationFailed,
}

impl IngestWarning {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestWarning::DurationUnavailable => "duration_unavailable",
            IngestWarning::FrameRateUnavailable => "frame_rate_unavailable",
            IngestWarning::NoAudioStream => "no_audio_stream",
            IngestWarning::ThumbnailGenerationFailed => "thumbnail_generation_failed",
        }
    }
}

impl fmt::Display for IngestWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Sidecar {
    pub schema_version: SchemaVersion,
    pub asset_id: String,
    pub source: SourceInfo,
    pub format: FormatInfo,
    pub video: Option<VideoSummary>,
    pub audio: Option<AudioSummary>,
    pub streams: Vec<StreamEntry>,
    pub thumbnails: ThumbnailManifest,
    pub provenance: Provenance,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl Sidecar {
    pub fn has_warning(&self, warning: IngestWarning) -> bool {
        self.warnings
            .binary_search_by(|probe| probe.as_str().cmp(warning.as_str()))
            .is_ok()
    }

    /// Inserts a warning while keeping the list sorted and free of duplicates.
    pub fn add_warning(&mut self, warning: IngestWarning) {
        let label = warning.as_str();
        if let Err(position) = self
            .warnings
            .binary_search_by(|probe| probe.as_str().cmp(label))
        {
            self.warnings.insert(position, label.to_string());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SourceInfo {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub uri: String,
    pub filename: String,
    pub size_bytes: Option<u64>,
    pub created_time: String,
    pub modified_time: Option<String>,
    pub hash: Option<HashInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FormatInfo {
    pub container: String,
    pub duration_s: f64,
    pub bitrate_kbps: Option<u32>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct VideoSummary {
    pub codec: String,
    pub profile: Option<String>,
    pub width_px: u32,
    pub height_px: u32,
    pub pixel_aspect_ratio: f64,
    pub frame_rate_fps: Option<f64>,
    pub color_space: Option<String>,
    pub color_transfer: Option<String>,
    pub color_primaries: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AudioSummary {
    pub codec: String,
    pub channels: u32,
    pub sample_rate_hz: u32,
    pub bitrate_kbps: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Video,
    Audio,
    Data,
    Subtitle,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct StreamEntry {
    pub index: u32,
    #[serde(rename = "type")]
    pub stream_type: StreamType,
    pub codec: String,
    pub avg_frame_rate: Option<String>,
    pub r_frame_rate: Option<String>,
    pub width_px: Option<u32>,
    pub height_px: Option<u32>,
    pub channels: Option<u32>,
    pub sample_rate_hz: Option<u32>,
    pub bitrate_kbps: Option<u32>,
    pub disposition_default: Option<bool>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Thumbnail {
    pub timestamp_s: f64,
    /// Relative to the derived root; empty until rendered.
    pub path: String,
    pub width_px: u32,
    pub height_px: u32,
}

impl Thumbnail {
    pub fn placeholder(timestamp_s: f64) -> Self {
        Self {
            timestamp_s,
            path: String::new(),
            width_px: 0,
            height_px: 0,
        }
    }

    pub fn is_rendered(&self) -> bool {
        !self.path.is_empty()
    }

    pub fn clear(&mut self) {
        self.path.clear();
        self.width_px = 0;
        self.height_px = 0;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ThumbnailManifest {
    pub poster: Thumbnail,
    pub samples: Vec<Thumbnail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ToolVersions {
    pub ffprobe: String,
    pub ffmpeg: String,
    pub normalizer: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VideoSelectionPolicy {
    #[default]
    FirstDefaultOrHighestResolution,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AudioSelectionPolicy {
    #[default]
    FirstDefaultOrHighestChannels,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SelectionPolicy {
    pub video: VideoSelectionPolicy,
    pub audio: AudioSelectionPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Provenance {
    pub ingested_at: String,
    pub tools: ToolVersions,
    pub selection_policy: SelectionPolicy,
    pub hash_quality: Option<HashQuality>,
    pub source_etag: Option<String>,
    pub remote_checksum: Option<String>,
}
