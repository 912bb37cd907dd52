//! Deterministic asset identities.
//!
//! Local files get a strong `sha256:` identity when they fit under the weak
//! threshold and a `weak:` metadata signature otherwise. Remote objects are
//! identified by their stable object id plus an optional checksum.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use hex::encode as hex_encode;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use md5::Md5;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::DEFAULT_CHUNK_SIZE_BYTES;
use crate::ingest::{IngestError, IngestResult};
use crate::timestamps::format_utc;

pub const STRONG_PREFIX: &str = "sha256:";
pub const WEAK_PREFIX: &str = "weak:";
pub const REMOTE_PREFIX: &str = "remote:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgo {
    Sha256,
    Md5,
    Weak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum HashQuality {
    Strong,
    Weak,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct HashInfo {
    pub algo: HashAlgo,
    pub value: String,
}

impl HashInfo {
    pub fn new(algo: HashAlgo, value: impl Into<String>) -> Self {
        Self {
            algo,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetIdentity {
    pub asset_id: String,
    pub hash: Option<HashInfo>,
    pub hash_quality: Option<HashQuality>,
}

impl AssetIdentity {
    pub fn is_strong(&self) -> bool {
        self.hash_quality == Some(HashQuality::Strong)
    }
}

/// Streams the file through SHA-256 in `chunk_size` reads.
pub fn compute_sha256(path: &Path, chunk_size: usize) -> IngestResult<String> {
    let mut file = File::open(path).map_err(|source| IngestError::from_io(source, path))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; chunk_size.max(1)];
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|source| IngestError::from_io(source, path))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex_encode(hasher.finalize()))
}

/// Metadata-only MD5 fingerprint over `filename|size|modified-second`.
pub fn compute_weak_signature(
    filename: &str,
    size_bytes: Option<u64>,
    modified_time: Option<DateTime<Utc>>,
) -> String {
    let size_component = size_bytes
        .map(|size| size.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let modified_component = modified_time
        .map(format_utc)
        .unwrap_or_else(|| "missing".to_string());
    let payload = format!("{filename}|{size_component}|{modified_component}");
    let mut hasher = Md5::new();
    hasher.update(payload.as_bytes());
    hex_encode(hasher.finalize())
}

/// Derives the canonical identity of a local file.
///
/// `max_bytes_for_strong_hash = None` hashes the full file whatever its size,
/// which blocks for as long as the read takes on very large inputs.
pub fn derive_local_asset_identity(
    path: &Path,
    max_bytes_for_strong_hash: Option<u64>,
) -> IngestResult<AssetIdentity> {
    derive_local_asset_identity_with_chunk(
        path,
        max_bytes_for_strong_hash,
        DEFAULT_CHUNK_SIZE_BYTES,
    )
}

pub fn derive_local_asset_identity_with_chunk(
    path: &Path,
    max_bytes_for_strong_hash: Option<u64>,
    chunk_size: usize,
) -> IngestResult<AssetIdentity> {
    let metadata =
        std::fs::metadata(path).map_err(|source| IngestError::from_io(source, path))?;
    let size_bytes = metadata.len();
    let do_strong = max_bytes_for_strong_hash
        .map(|threshold| size_bytes <= threshold)
        .unwrap_or(true);

    if do_strong {
        let digest = compute_sha256(path, chunk_size)?;
        debug!(path = %path.display(), size_bytes, "derived strong asset identity");
        return Ok(AssetIdentity {
            asset_id: format!("{STRONG_PREFIX}{digest}"),
            hash: Some(HashInfo::new(HashAlgo::Sha256, digest)),
            hash_quality: Some(HashQuality::Strong),
        });
    }

    let modified_time = metadata.modified().ok().map(DateTime::<Utc>::from);
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let signature = compute_weak_signature(&filename, Some(size_bytes), modified_time);
    debug!(path = %path.display(), size_bytes, "derived weak asset identity");
    Ok(AssetIdentity {
        asset_id: format!("{WEAK_PREFIX}{signature}"),
        hash: Some(HashInfo::new(HashAlgo::Weak, signature)),
        hash_quality: Some(HashQuality::Weak),
    })
}

/// Identity for an object held by a remote store.
pub fn compose_remote_asset_identity(object_id: &str, checksum: Option<&str>) -> AssetIdentity {
    match checksum.filter(|value| !value.is_empty()) {
        Some(checksum) => AssetIdentity {
            asset_id: format!("{REMOTE_PREFIX}{object_id}::{checksum}"),
            hash: Some(HashInfo::new(HashAlgo::Md5, checksum)),
            hash_quality: Some(HashQuality::Strong),
        },
        None => AssetIdentity {
            asset_id: format!("{REMOTE_PREFIX}{object_id}"),
            hash: None,
            hash_quality: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn weak_signature_is_deterministic() {
        let first = compute_weak_signature("example.mp4", Some(1024), Some(noon()));
        let second = compute_weak_signature("example.mp4", Some(1024), Some(noon()));
        assert_eq!(first, second);
    }

    #[test]
    fn weak_signature_is_md5_of_the_composite() {
        assert_eq!(
            compute_weak_signature("example.mp4", Some(1024), Some(noon())),
            "dc24b9d58165fd884ee10a10f49f6785"
        );
    }

    #[test]
    fn weak_signature_ignores_sub_second_noise() {
        let precise = noon() + chrono::Duration::milliseconds(750);
        assert_eq!(
            compute_weak_signature("example.mp4", Some(1024), Some(noon())),
            compute_weak_signature("example.mp4", Some(1024), Some(precise)),
        );
    }

    #[test]
    fn weak_signature_tracks_each_component() {
        let base = compute_weak_signature("example.mp4", Some(1024), Some(noon()));
        assert_ne!(base, compute_weak_signature("other.mp4", Some(1024), Some(noon())));
        assert_ne!(base, compute_weak_signature("example.mp4", Some(1025), Some(noon())));
        let later = noon() + chrono::Duration::seconds(1);
        assert_ne!(base, compute_weak_signature("example.mp4", Some(1024), Some(later)));
        assert_ne!(base, compute_weak_signature("example.mp4", None, Some(noon())));
        assert_ne!(base, compute_weak_signature("example.mp4", Some(1024), None));
    }

    #[test]
    fn strong_identity_matches_digest() {
        let dir = tempdir().unwrap();
        let sample = dir.path().join("sample.bin");
        std::fs::write(&sample, b"hello world").unwrap();

        let identity = derive_local_asset_identity(&sample, None).unwrap();
        let hash = identity.hash.clone().expect("strong hash");
        assert_eq!(hash.algo, HashAlgo::Sha256);
        assert_eq!(identity.hash_quality, Some(HashQuality::Strong));
        assert_eq!(
            hash.value,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(identity.asset_id, format!("sha256:{}", hash.value));
        assert_eq!(hash.value, compute_sha256(&sample, 3).unwrap());
    }

    #[test]
    fn identical_content_shares_strong_id() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("a.mov");
        let second = dir.path().join("renamed.mov");
        std::fs::write(&first, b"same bytes").unwrap();
        std::fs::write(&second, b"same bytes").unwrap();
        let lhs = derive_local_asset_identity(&first, Some(1_000)).unwrap();
        let rhs = derive_local_asset_identity(&second, Some(1_000)).unwrap();
        assert_eq!(lhs.asset_id, rhs.asset_id);

        std::fs::write(&second, b"same bytes!").unwrap();
        let changed = derive_local_asset_identity(&second, Some(1_000)).unwrap();
        assert_ne!(lhs.asset_id, changed.asset_id);
    }

    #[test]
    fn oversized_file_gets_weak_identity() {
        let dir = tempdir().unwrap();
        let sample = dir.path().join("large.bin");
        std::fs::write(&sample, vec![b'x'; 10]).unwrap();

        let identity = derive_local_asset_identity(&sample, Some(1)).unwrap();
        assert_eq!(identity.hash.as_ref().map(|h| h.algo), Some(HashAlgo::Weak));
        assert_eq!(identity.hash_quality, Some(HashQuality::Weak));
        assert!(identity.asset_id.starts_with(WEAK_PREFIX));
        assert!(!identity.is_strong());

        let again = derive_local_asset_identity(&sample, Some(1)).unwrap();
        assert_eq!(identity, again);
    }

    #[test]
    fn missing_file_is_input_not_found() {
        let dir = tempdir().unwrap();
        let err = derive_local_asset_identity(&dir.path().join("absent.mp4"), None).unwrap_err();
        assert!(err.is_input_not_found());
    }

    #[test]
    fn remote_identity_with_and_without_checksum() {
        let with_hash = compose_remote_asset_identity("abc123", Some("md5value"));
        assert_eq!(with_hash.asset_id, "remote:abc123::md5value");
        assert_eq!(with_hash.hash, Some(HashInfo::new(HashAlgo::Md5, "md5value")));
        assert_eq!(with_hash.hash_quality, Some(HashQuality::Strong));

        let without_hash = compose_remote_asset_identity("abc123", None);
        assert_eq!(without_hash.asset_id, "remote:abc123");
        assert_eq!(without_hash.hash, None);
        assert_eq!(without_hash.hash_quality, None);

        assert_eq!(compose_remote_asset_identity("abc123", Some("")), without_hash);
    }
}
