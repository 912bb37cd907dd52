use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::sidecar::SchemaError;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("input not found: {path}")]
    InputNotFound { path: PathBuf },
    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("probe failed: {0}")]
    Probe(String),
    #[error("sidecar is missing asset_id")]
    MissingAssetId,
    #[error("sidecar failed its own schema check: {0}")]
    SchemaInvariantViolation(#[from] SchemaError),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl IngestError {
    /// Maps `NotFound` onto [`IngestError::InputNotFound`], everything else onto
    /// [`IngestError::Io`].
    pub fn from_io(source: std::io::Error, path: &Path) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            IngestError::InputNotFound {
                path: path.to_path_buf(),
            }
        } else {
            IngestError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    pub fn is_input_not_found(&self) -> bool {
        matches!(self, IngestError::InputNotFound { .. })
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(error: serde_json::Error) -> Self {
        IngestError::Serialization(error.to_string())
    }
}

pub type IngestResult<T> = Result<T, IngestError>;
