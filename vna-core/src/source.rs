use std::path::Path;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::identity::{AssetIdentity, HashInfo, HashQuality};
use crate::ingest::{IngestError, IngestResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Local,
    Remote,
}

/// Caller-assembled description of where an asset came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceContext {
    pub source_type: SourceType,
    pub uri: String,
    pub filename: String,
    pub size_bytes: Option<u64>,
    pub asset_id: String,
    pub created_time: Option<DateTime<Utc>>,
    pub modified_time: Option<DateTime<Utc>>,
    pub hash: Option<HashInfo>,
    pub hash_quality: Option<HashQuality>,
    pub source_etag: Option<String>,
    pub remote_checksum: Option<String>,
}

impl SourceContext {
    /// Builds the context for a file on local disk. With `use_birth_time` the
    /// platform's birth time, when reported, becomes `created_time`.
    pub fn local(
        path: &Path,
        identity: &AssetIdentity,
        use_birth_time: bool,
    ) -> IngestResult<Self> {
        let metadata =
            std::fs::metadata(path).map_err(|source| IngestError::from_io(source, path))?;
        let absolute =
            std::fs::canonicalize(path).map_err(|source| IngestError::from_io(source, path))?;
        let uri = Url::from_file_path(&absolute)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| absolute.display().to_string());
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Self {
            source_type: SourceType::Local,
            uri,
            filename,
            size_bytes: Some(metadata.len()),
            asset_id: identity.asset_id.clone(),
            created_time: use_birth_time
                .then(|| metadata.created().ok())
                .flatten()
                .map(DateTime::<Utc>::from),
            modified_time: metadata.modified().ok().map(DateTime::<Utc>::from),
            hash: identity.hash.clone(),
            hash_quality: identity.hash_quality,
            source_etag: None,
            remote_checksum: None,
        })
    }

    pub fn with_asset_id(mut self, asset_id: impl Into<String>) -> Self {
        self.asset_id = asset_id.into();
        self
    }
}
