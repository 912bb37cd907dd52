//! Priority tables for picking summary streams and the creation time.
//!
//! Each table is an ordered list of named steps. A step either yields a
//! candidate or has no opinion, and the first step with an opinion wins.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::sidecar::StreamEntry;
use crate::source::SourceContext;
use crate::timestamps::parse_timestamp;

pub const CREATION_TAG_KEYS: [&str; 3] =
    ["com.apple.quicktime.creationdate", "creation_time", "date"];

/// A normalized stream paired with the raw probe object it came from.
#[derive(Debug, Clone)]
pub struct ParsedStream<'a> {
    pub entry: StreamEntry,
    pub raw: &'a Value,
}

type StreamStep = (&'static str, fn(&[ParsedStream<'_>]) -> Option<usize>);

const VIDEO_STEPS: &[StreamStep] = &[
    ("first_default", first_default),
    ("highest_resolution", highest_resolution),
];

const AUDIO_STEPS: &[StreamStep] = &[
    ("first_default", first_default),
    ("highest_channels", highest_channels),
];

pub fn select_video(streams: &[ParsedStream<'_>]) -> Option<usize> {
    run_stream_steps("video", VIDEO_STEPS, streams)
}

pub fn select_audio(streams: &[ParsedStream<'_>]) -> Option<usize> {
    run_stream_steps("audio", AUDIO_STEPS, streams)
}

fn run_stream_steps(
    kind: &'static str,
    steps: &[StreamStep],
    streams: &[ParsedStream<'_>],
) -> Option<usize> {
    steps.iter().find_map(|(name, step)| {
        let chosen = step(streams)?;
        debug!(
            kind,
            step = *name,
            index = streams[chosen].entry.index,
            "selected summary stream"
        );
        Some(chosen)
    })
}

fn first_default(streams: &[ParsedStream<'_>]) -> Option<usize> {
    streams
        .iter()
        .position(|stream| stream.entry.disposition_default == Some(true))
}

fn highest_resolution(streams: &[ParsedStream<'_>]) -> Option<usize> {
    first_max_by_key(streams, |stream| {
        let width = u64::from(stream.entry.width_px.unwrap_or(0));
        let height = u64::from(stream.entry.height_px.unwrap_or(0));
        width * height
    })
}

fn highest_channels(streams: &[ParsedStream<'_>]) -> Option<usize> {
    first_max_by_key(streams, |stream| {
        (
            stream.entry.channels.unwrap_or(0),
            stream.entry.sample_rate_hz.unwrap_or(0),
        )
    })
}

/// Like `Iterator::max_by_key` but ties keep the earliest element.
fn first_max_by_key<K, F>(streams: &[ParsedStream<'_>], key: F) -> Option<usize>
where
    K: Ord,
    F: Fn(&ParsedStream<'_>) -> K,
{
    let mut best: Option<(usize, K)> = None;
    for (position, stream) in streams.iter().enumerate() {
        let score = key(stream);
        match &best {
            Some((_, current)) if score <= *current => {}
            _ => best = Some((position, score)),
        }
    }
    best.map(|(position, _)| position)
}

/// Inputs to creation-time resolution.
pub struct CreationInputs<'a> {
    pub context: &'a SourceContext,
    pub format_tags: &'a BTreeMap<String, String>,
    /// Tags of the video and audio candidates only.
    pub stream_tags: Vec<&'a BTreeMap<String, String>>,
}

type CreationStep = (&'static str, fn(&CreationInputs<'_>) -> Option<DateTime<Utc>>);

const CREATION_STEPS: &[CreationStep] = &[
    ("source_context", from_source_context),
    ("embedded_tags", earliest_embedded_tag),
    ("modified_time", from_modified_time),
];

/// Resolves the asset's creation time, falling back to `now`.
pub fn resolve_created_time(inputs: &CreationInputs<'_>, now: DateTime<Utc>) -> DateTime<Utc> {
    for (name, step) in CREATION_STEPS {
        if let Some(resolved) = step(inputs) {
            debug!(step = *name, created_time = %resolved, "resolved creation time");
            return resolved;
        }
    }
    debug!(step = "ingested_at", created_time = %now, "resolved creation time");
    now
}

fn from_source_context(inputs: &CreationInputs<'_>) -> Option<DateTime<Utc>> {
    inputs.context.created_time
}

fn from_modified_time(inputs: &CreationInputs<'_>) -> Option<DateTime<Utc>> {
    inputs.context.modified_time
}

fn earliest_embedded_tag(inputs: &CreationInputs<'_>) -> Option<DateTime<Utc>> {
    std::iter::once(inputs.format_tags)
        .chain(inputs.stream_tags.iter().copied())
        .flat_map(|tags| {
            CREATION_TAG_KEYS
                .iter()
                .filter_map(|key| tags.get(*key))
                .filter_map(|value| parse_timestamp(value))
        })
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sidecar::StreamType;
    use chrono::TimeZone;
    use serde_json::json;

    fn stream(index: u32, width: u32, height: u32, default: Option<bool>) -> StreamEntry {
        StreamEntry {
            index,
            stream_type: StreamType::Video,
            codec: "h264".into(),
            avg_frame_rate: None,
            r_frame_rate: None,
            width_px: Some(width),
            height_px: Some(height),
            channels: None,
            sample_rate_hz: None,
            bitrate_kbps: None,
            disposition_default: default,
            tags: BTreeMap::new(),
        }
    }

    fn parsed(entries: Vec<StreamEntry>, raw: &Value) -> Vec<ParsedStream<'_>> {
        entries
            .into_iter()
            .map(|entry| ParsedStream { entry, raw })
            .collect()
    }

    #[test]
    fn ties_keep_first_stream() {
        let raw = json!({});
        let streams = parsed(
            vec![
                stream(0, 1280, 720, None),
                stream(1, 1920, 1080, Some(false)),
                stream(2, 1920, 1080, None),
            ],
            &raw,
        );
        assert_eq!(select_video(&streams), Some(1));
    }

    #[test]
    fn default_disposition_beats_resolution() {
        let raw = json!({});
        let streams = parsed(
            vec![stream(0, 3840, 2160, None), stream(1, 640, 360, Some(true))],
            &raw,
        );
        assert_eq!(select_video(&streams), Some(1));
        assert_eq!(select_video(&[]), None);
    }

    #[test]
    fn audio_prefers_channels_then_sample_rate() {
        let raw = json!({});
        let mut stereo_low = stream(0, 0, 0, None);
        stereo_low.channels = Some(2);
        stereo_low.sample_rate_hz = Some(44_100);
        let mut stereo_high = stream(1, 0, 0, None);
        stereo_high.channels = Some(2);
        stereo_high.sample_rate_hz = Some(48_000);
        let mut mono = stream(2, 0, 0, None);
        mono.channels = Some(1);
        mono.sample_rate_hz = Some(96_000);
        let streams = parsed(vec![stereo_low, stereo_high, mono], &raw);
        assert_eq!(select_audio(&streams), Some(1));
    }

    #[test]
    fn creation_time_priority() {
        let identity = crate::identity::compose_remote_asset_identity("obj", None);
        let mut context = SourceContext {
            source_type: crate::source::SourceType::Remote,
            uri: "remote://obj".into(),
            filename: "clip.mp4".into(),
            size_bytes: None,
            asset_id: identity.asset_id,
            created_time: None,
            modified_time: Some(Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap()),
            hash: None,
            hash_quality: None,
            source_etag: None,
            remote_checksum: None,
        };
        let format_tags = BTreeMap::from([(
            "creation_time".to_string(),
            "2023-05-05T00:00:00Z".to_string(),
        )]);
        let stream_tags = BTreeMap::from([("date".to_string(), "2022-01-01".to_string())]);
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let inputs = CreationInputs {
            context: &context,
            format_tags: &format_tags,
            stream_tags: vec![&stream_tags],
        };
        assert_eq!(
            resolve_created_time(&inputs, now),
            Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()
        );

        let empty = BTreeMap::new();
        let inputs = CreationInputs {
            context: &context,
            format_tags: &empty,
            stream_tags: Vec::new(),
        };
        assert_eq!(
            resolve_created_time(&inputs, now),
            Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap()
        );

        context.modified_time = None;
        let inputs = CreationInputs {
            context: &context,
            format_tags: &empty,
            stream_tags: Vec::new(),
        };
        assert_eq!(resolve_created_time(&inputs, now), now);
    }
}
