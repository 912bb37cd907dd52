use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

pub const DEFAULT_WEAK_THRESHOLD_BYTES: u64 = 1_000_000_000;
pub const DEFAULT_CHUNK_SIZE_BYTES: usize = 8 * 1024 * 1024;
pub const DEFAULT_THUMBNAIL_WIDTH_PX: u32 = 320;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IngestConfig {
    #[serde(default)]
    pub identity: IdentitySection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub thumbnails: ThumbnailsSection,
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub paths: PathsSection,
}

impl IngestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.identity.chunk_size_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "identity.chunk_size_bytes",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.thumbnails.width_px == 0 {
            return Err(ConfigError::Invalid {
                field: "thumbnails.width_px",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(2..=31).contains(&self.thumbnails.jpeg_quality) {
            return Err(ConfigError::Invalid {
                field: "thumbnails.jpeg_quality",
                reason: format!("{} is outside 2..=31", self.thumbnails.jpeg_quality),
            });
        }
        Ok(())
    }

    pub fn resolve_path<P: AsRef<Path>>(&self, candidate: P) -> PathBuf {
        let path = candidate.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.paths.derived_root.join(path)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentitySection {
    #[serde(default = "IdentitySection::default_weak_threshold")]
    pub weak_threshold_bytes: u64,
    /// Hash every file in full regardless of size. Large files block for the
    /// whole read.
    #[serde(default)]
    pub always_strong: bool,
    #[serde(default = "IdentitySection::default_chunk_size")]
    pub chunk_size_bytes: usize,
}

impl IdentitySection {
    fn default_weak_threshold() -> u64 {
        DEFAULT_WEAK_THRESHOLD_BYTES
    }

    fn default_chunk_size() -> usize {
        DEFAULT_CHUNK_SIZE_BYTES
    }

    /// `None` means the strong hash is always computed.
    pub fn weak_threshold(&self) -> Option<u64> {
        if self.always_strong {
            None
        } else {
            Some(self.weak_threshold_bytes)
        }
    }
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            weak_threshold_bytes: DEFAULT_WEAK_THRESHOLD_BYTES,
            always_strong: false,
            chunk_size_bytes: DEFAULT_CHUNK_SIZE_BYTES,
        }
    }
}

/// How local source metadata is read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceSection {
    /// Seed `created_time` from the filesystem birth time. Off by default
    /// because Linux reports one on most filesystems and it would shadow the
    /// creation dates embedded in the container.
    #[serde(default)]
    pub use_birth_time: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    #[serde(default = "ToolsSection::default_ffprobe")]
    pub ffprobe: PathBuf,
    #[serde(default = "ToolsSection::default_ffmpeg")]
    pub ffmpeg: PathBuf,
}

impl ToolsSection {
    fn default_ffprobe() -> PathBuf {
        PathBuf::from("ffprobe")
    }

    fn default_ffmpeg() -> PathBuf {
        PathBuf::from("ffmpeg")
    }
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            ffprobe: Self::default_ffprobe(),
            ffmpeg: Self::default_ffmpeg(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThumbnailsSection {
    #[serde(default = "ThumbnailsSection::default_width")]
    pub width_px: u32,
    #[serde(default = "ThumbnailsSection::default_quality")]
    pub jpeg_quality: u8,
}

impl ThumbnailsSection {
    fn default_width() -> u32 {
        DEFAULT_THUMBNAIL_WIDTH_PX
    }

    fn default_quality() -> u8 {
        2
    }
}

impl Default for ThumbnailsSection {
    fn default() -> Self {
        Self {
            width_px: Self::default_width(),
            jpeg_quality: Self::default_quality(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    #[serde(default = "PathsSection::default_derived_root")]
    pub derived_root: PathBuf,
}

impl PathsSection {
    fn default_derived_root() -> PathBuf {
        PathBuf::from("derived")
    }
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            derived_root: Self::default_derived_root(),
        }
    }
}

pub fn load_ingest_config<P: AsRef<Path>>(path: P) -> Result<IngestConfig> {
    let config: IngestConfig = load_toml(path)?;
    config.validate()?;
    Ok(config)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
