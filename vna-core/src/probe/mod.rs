//! Normalization of raw ffprobe output into the canonical sidecar.

mod fields;
mod selection;

use std::path::Path;
use std::process::Command;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::ingest::{IngestError, IngestResult};
use crate::sidecar::{
    validate, AudioSummary, FormatInfo, IngestWarning, Provenance, SchemaVersion, SelectionPolicy,
    Sidecar, SourceInfo, StreamEntry, StreamType, Thumbnail, ThumbnailManifest, ToolVersions,
    VideoSummary,
};
use crate::source::SourceContext;
use crate::timestamps::format_utc;
use crate::tools::CommandRunner;

pub use fields::{
    normalize_tags, parse_bitrate_kbps, parse_count, parse_duration, parse_rational,
    parse_sample_aspect_ratio,
};
pub use selection::CREATION_TAG_KEYS;

use fields::round_to;
use selection::{resolve_created_time, select_audio, select_video, CreationInputs, ParsedStream};

/// Duration from which sample thumbnails are seeded.
pub const SAMPLE_THRESHOLD_S: f64 = 60.0;
pub const SAMPLE_RATIOS: [f64; 2] = [0.2, 0.8];

#[derive(Debug, Clone)]
pub struct ProbeNormalizer {
    tools: ToolVersions,
}

impl ProbeNormalizer {
    pub fn new(tools: ToolVersions) -> Self {
        Self { tools }
    }

    pub fn tools(&self) -> &ToolVersions {
        &self.tools
    }

    pub fn normalize(&self, raw: &Value, context: &SourceContext) -> IngestResult<Sidecar> {
        self.normalize_at(raw, context, Utc::now())
    }

    /// Normalizes with a fixed ingestion clock. Malformed probe fields degrade
    /// to defaults and warnings; the only error is a failed self-check.
    pub fn normalize_at(
        &self,
        raw: &Value,
        context: &SourceContext,
        ingested_at: DateTime<Utc>,
    ) -> IngestResult<Sidecar> {
        let format = raw.get("format");
        let format_tags = normalize_tags(format.and_then(|f| f.get("tags")));

        let duration = parse_duration(format.and_then(|f| f.get("duration")));
        if duration.is_none() {
            warn!(asset_id = %context.asset_id, "probe reported no usable duration");
        }
        let duration_s = duration.unwrap_or(0.0);

        let parsed = parse_streams(raw.get("streams"));
        let video_streams: Vec<ParsedStream<'_>> = parsed
            .iter()
            .filter(|stream| stream.entry.stream_type == StreamType::Video)
            .cloned()
            .collect();
        let audio_streams: Vec<ParsedStream<'_>> = parsed
            .iter()
            .filter(|stream| stream.entry.stream_type == StreamType::Audio)
            .cloned()
            .collect();

        let video =
            select_video(&video_streams).map(|chosen| summarize_video(&video_streams[chosen]));
        let audio =
            select_audio(&audio_streams).map(|chosen| summarize_audio(&audio_streams[chosen]));

        let created_time = resolve_created_time(
            &CreationInputs {
                context,
                format_tags: &format_tags,
                stream_tags: video_streams
                    .iter()
                    .chain(&audio_streams)
                    .map(|stream| &stream.entry.tags)
                    .collect(),
            },
            ingested_at,
        );

        let mut streams: Vec<StreamEntry> =
            parsed.iter().map(|stream| stream.entry.clone()).collect();
        streams.sort_by_key(|entry| entry.index);

        let mut sidecar = Sidecar {
            schema_version: SchemaVersion::default(),
            asset_id: context.asset_id.clone(),
            source: SourceInfo {
                source_type: context.source_type,
                uri: context.uri.clone(),
                filename: context.filename.clone(),
                size_bytes: context.size_bytes,
                created_time: format_utc(created_time),
                modified_time: context.modified_time.map(format_utc),
                hash: context.hash.clone(),
            },
            format: FormatInfo {
                container: container_name(format),
                duration_s,
                bitrate_kbps: parse_bitrate_kbps(format.and_then(|f| f.get("bit_rate"))),
                tags: format_tags.clone(),
            },
            video,
            audio,
            streams,
            thumbnails: seed_thumbnails(duration_s),
            provenance: Provenance {
                ingested_at: format_utc(ingested_at),
                tools: self.tools.clone(),
                selection_policy: SelectionPolicy::default(),
                hash_quality: context.hash_quality,
                source_etag: context.source_etag.clone(),
                remote_checksum: context.remote_checksum.clone(),
            },
            warnings: Vec::new(),
            errors: Vec::new(),
        };

        if duration.is_none() {
            sidecar.add_warning(IngestWarning::DurationUnavailable);
        }
        if sidecar
            .video
            .as_ref()
            .is_some_and(|video| video.frame_rate_fps.is_none())
        {
            sidecar.add_warning(IngestWarning::FrameRateUnavailable);
        }
        if sidecar.audio.is_none() {
            sidecar.add_warning(IngestWarning::NoAudioStream);
        }

        validate(&sidecar)?;
        info!(
            asset_id = %sidecar.asset_id,
            streams = sidecar.streams.len(),
            warnings = sidecar.warnings.len(),
            "normalized probe output"
        );
        Ok(sidecar)
    }
}

/// Placeholder manifest: a poster at the midpoint and, for long media, two
/// samples at 20% and 80%.
pub fn seed_thumbnails(duration_s: f64) -> ThumbnailManifest {
    let poster_at = if duration_s > 0.0 { duration_s / 2.0 } else { 0.0 };
    let samples = if duration_s >= SAMPLE_THRESHOLD_S {
        SAMPLE_RATIOS
            .iter()
            .map(|ratio| Thumbnail::placeholder(round_to(duration_s * ratio, 3)))
            .collect()
    } else {
        Vec::new()
    };
    ThumbnailManifest {
        poster: Thumbnail::placeholder(round_to(poster_at, 3)),
        samples,
    }
}

/// Runs ffprobe against `media` and returns its JSON report.
pub fn run_ffprobe(
    runner: &dyn CommandRunner,
    ffprobe: &Path,
    media: &Path,
) -> IngestResult<Value> {
    std::fs::metadata(media).map_err(|source| IngestError::from_io(source, media))?;

    let mut command = Command::new(ffprobe);
    command
        .arg("-v")
        .arg("error")
        .arg("-show_format")
        .arg("-show_streams")
        .arg("-print_format")
        .arg("json")
        .arg(media);

    let output = runner
        .output(&mut command)
        .map_err(|err| IngestError::Probe(format!("failed to run {}: {err}", ffprobe.display())))?;
    if !output.status.success() {
        return Err(IngestError::Probe(format!(
            "{} exited with {}: {}",
            ffprobe.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    serde_json::from_slice(&output.stdout)
        .map_err(|err| IngestError::Probe(format!("invalid ffprobe output: {err}")))
}

fn parse_streams(streams: Option<&Value>) -> Vec<ParsedStream<'_>> {
    let Some(streams) = streams.and_then(Value::as_array) else {
        return Vec::new();
    };
    streams
        .iter()
        .filter(|raw| {
            let keep = raw.is_object();
            if !keep {
                warn!(stream = %raw, "skipping non-object probe stream");
            }
            keep
        })
        .map(|raw| ParsedStream {
            entry: stream_entry(raw),
            raw,
        })
        .collect()
}

fn stream_entry(raw: &Value) -> StreamEntry {
    StreamEntry {
        index: parse_count(raw.get("index")).unwrap_or(0),
        stream_type: fields::parse_stream_type(raw.get("codec_type")),
        codec: non_empty_text(raw.get("codec_name")).unwrap_or_else(|| "unknown".to_string()),
        avg_frame_rate: fields::rational_string(raw.get("avg_frame_rate")),
        r_frame_rate: fields::rational_string(raw.get("r_frame_rate")),
        width_px: parse_count(raw.get("width")),
        height_px: parse_count(raw.get("height")),
        channels: parse_count(raw.get("channels")),
        sample_rate_hz: parse_count(raw.get("sample_rate")),
        bitrate_kbps: parse_bitrate_kbps(raw.get("bit_rate")),
        disposition_default: fields::parse_disposition_default(raw.get("disposition")),
        tags: normalize_tags(raw.get("tags")),
    }
}

fn summarize_video(stream: &ParsedStream<'_>) -> VideoSummary {
    let entry = &stream.entry;
    let frame_rate_fps = [&entry.avg_frame_rate, &entry.r_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|rate| parse_rational(rate));
    VideoSummary {
        codec: entry.codec.clone(),
        profile: fields::text(stream.raw.get("profile")),
        width_px: entry.width_px.unwrap_or(0),
        height_px: entry.height_px.unwrap_or(0),
        pixel_aspect_ratio: parse_sample_aspect_ratio(stream.raw.get("sample_aspect_ratio")),
        frame_rate_fps,
        color_space: fields::text(stream.raw.get("color_space")),
        color_transfer: fields::text(stream.raw.get("color_transfer")),
        color_primaries: fields::text(stream.raw.get("color_primaries")),
    }
}

fn summarize_audio(stream: &ParsedStream<'_>) -> AudioSummary {
    let entry = &stream.entry;
    AudioSummary {
        codec: entry.codec.clone(),
        channels: entry.channels.unwrap_or(0),
        sample_rate_hz: entry.sample_rate_hz.unwrap_or(0),
        bitrate_kbps: entry.bitrate_kbps,
    }
}

fn container_name(format: Option<&Value>) -> String {
    ["format_name", "format_long_name"]
        .into_iter()
        .find_map(|key| non_empty_text(format.and_then(|f| f.get(key))))
        .unwrap_or_else(|| "unknown".to_string())
}

fn non_empty_text(value: Option<&Value>) -> Option<String> {
    fields::text(value).filter(|text| !text.is_empty())
}
