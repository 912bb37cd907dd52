use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::sync::Arc;

use image::GenericImageView;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ThumbnailsSection, ToolsSection};
use crate::ingest::{IngestError, IngestResult};
use crate::sidecar::{validate, IngestWarning, Sidecar, Thumbnail};
use crate::tools::{CommandRunner, SystemCommandRunner};

pub const THUMBS_DIR: &str = "thumbs";
pub const POSTER_FILE_NAME: &str = "poster.jpg";

/// Failure to produce a single thumbnail. Recorded as a warning on the
/// sidecar, never returned to the caller.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
    #[error("ffmpeg exited with {status}: {stderr}")]
    Status { status: ExitStatus, stderr: String },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailSlot {
    Poster,
    /// Position in the seeded sample list.
    Sample(usize),
}

impl fmt::Display for ThumbnailSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThumbnailSlot::Poster => f.write_str("poster"),
            ThumbnailSlot::Sample(ordinal) => write!(f, "sample[{ordinal}]"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOutcome {
    pub rendered: Vec<ThumbnailSlot>,
    pub failed: Vec<ThumbnailSlot>,
}

impl RenderOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// File name for a sample frame, in centiseconds: 12.345 s is `t1235.jpg`.
pub fn sample_file_name(timestamp_s: f64) -> String {
    let centiseconds = (timestamp_s.max(0.0) * 100.0).round() as u64;
    format!("t{centiseconds:04}.jpg")
}

pub struct ThumbnailRenderer {
    ffmpeg: PathBuf,
    width_px: u32,
    jpeg_quality: u8,
    runner: Arc<dyn CommandRunner>,
}

impl fmt::Debug for ThumbnailRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThumbnailRenderer")
            .field("ffmpeg", &self.ffmpeg)
            .field("width_px", &self.width_px)
            .field("jpeg_quality", &self.jpeg_quality)
            .finish()
    }
}

impl ThumbnailRenderer {
    pub fn new(thumbnails: &ThumbnailsSection, tools: &ToolsSection) -> Self {
        Self {
            ffmpeg: tools.ffmpeg.clone(),
            width_px: thumbnails.width_px,
            jpeg_quality: thumbnails.jpeg_quality,
            runner: Arc::new(SystemCommandRunner),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Renders the seeded manifest into `<out_root>/thumbs/<asset_id>/`.
    ///
    /// A failed poster stays in the manifest with an empty path; failed
    /// samples are dropped. Either way the sidecar gains
    /// `thumbnail_generation_failed` and no partial file is left behind.
    pub fn render(
        &self,
        source: &Path,
        sidecar: &mut Sidecar,
        out_root: &Path,
    ) -> IngestResult<RenderOutcome> {
        if sidecar.asset_id.is_empty() {
            return Err(IngestError::MissingAssetId);
        }
        std::fs::metadata(source).map_err(|err| IngestError::from_io(err, source))?;

        let asset_id = sidecar.asset_id.clone();
        let thumbs_dir = out_root.join(THUMBS_DIR).join(&asset_id);
        std::fs::create_dir_all(&thumbs_dir).map_err(|source| IngestError::Io {
            source,
            path: thumbs_dir.clone(),
        })?;

        let mut outcome = RenderOutcome::default();

        let poster = &mut sidecar.thumbnails.poster;
        let rendered = self.render_slot(
            ThumbnailSlot::Poster,
            source,
            poster,
            &thumbs_dir,
            &asset_id,
            POSTER_FILE_NAME,
        );
        if !rendered {
            poster.clear();
        }
        record(&mut outcome, ThumbnailSlot::Poster, rendered);

        let seeded = std::mem::take(&mut sidecar.thumbnails.samples);
        let mut kept = Vec::with_capacity(seeded.len());
        for (ordinal, mut sample) in seeded.into_iter().enumerate() {
            let slot = ThumbnailSlot::Sample(ordinal);
            let file_name = sample_file_name(sample.timestamp_s);
            let rendered =
                self.render_slot(slot, source, &mut sample, &thumbs_dir, &asset_id, &file_name);
            if rendered {
                kept.push(sample);
            }
            record(&mut outcome, slot, rendered);
        }
        sidecar.thumbnails.samples = kept;

        if !outcome.is_complete() {
            sidecar.add_warning(IngestWarning::ThumbnailGenerationFailed);
        }
        validate(sidecar)?;
        info!(
            asset_id = %asset_id,
            rendered = outcome.rendered.len(),
            failed = outcome.failed.len(),
            "rendered thumbnails"
        );
        Ok(outcome)
    }

    fn render_slot(
        &self,
        slot: ThumbnailSlot,
        source: &Path,
        thumbnail: &mut Thumbnail,
        thumbs_dir: &Path,
        asset_id: &str,
        file_name: &str,
    ) -> bool {
        let output = thumbs_dir.join(file_name);
        match self.extract(source, thumbnail.timestamp_s, &output) {
            Ok((width, height)) => {
                thumbnail.path = format!("{THUMBS_DIR}/{asset_id}/{file_name}");
                thumbnail.width_px = width;
                thumbnail.height_px = height;
                debug!(%slot, path = %output.display(), width, height, "extracted frame");
                true
            }
            Err(err) => {
                warn!(
                    %slot,
                    asset_id,
                    path = %output.display(),
                    error = %err,
                    "thumbnail extraction failed"
                );
                remove_partial(&output);
                false
            }
        }
    }

    fn extract(
        &self,
        source: &Path,
        timestamp_s: f64,
        output: &Path,
    ) -> Result<(u32, u32), ExtractionError> {
        let mut command = Command::new(&self.ffmpeg);
        command
            .arg("-nostdin")
            .arg("-v")
            .arg("error")
            .arg("-ss")
            .arg(format!("{:.3}", timestamp_s.max(0.0)))
            .arg("-i")
            .arg(source)
            .arg("-frames:v")
            .arg("1")
            .arg("-vf")
            .arg(format!("scale={}:-2", self.width_px))
            .arg("-q:v")
            .arg(self.jpeg_quality.to_string())
            .arg("-y")
            .arg(output);

        let result = self
            .runner
            .output(&mut command)
            .map_err(|source| ExtractionError::Spawn {
                program: self.ffmpeg.clone(),
                source,
            })?;
        if !result.status.success() {
            return Err(ExtractionError::Status {
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        let frame = image::open(output).map_err(|source| ExtractionError::Decode {
            path: output.to_path_buf(),
            source,
        })?;
        Ok(frame.dimensions())
    }
}

fn record(outcome: &mut RenderOutcome, slot: ThumbnailSlot, rendered: bool) {
    if rendered {
        outcome.rendered.push(slot);
    } else {
        outcome.failed.push(slot);
    }
}

fn remove_partial(path: &Path) {
    if !path.exists() {
        return;
    }
    if let Err(err) = std::fs::remove_file(path) {
        warn!(path = %path.display(), error = %err, "failed to remove partial thumbnail");
    }
}
