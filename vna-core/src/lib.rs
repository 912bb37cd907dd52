pub mod config;
pub mod error;
pub mod identity;
pub mod ingest;
pub mod probe;
pub mod sidecar;
pub mod source;
pub mod thumbnails;
pub mod timestamps;
pub mod tools;

pub use config::{load_ingest_config, IngestConfig};
pub use error::{ConfigError, Result};
pub use identity::{
    compose_remote_asset_identity, compute_sha256, compute_weak_signature,
    derive_local_asset_identity, derive_local_asset_identity_with_chunk, AssetIdentity, HashAlgo,
    HashInfo, HashQuality,
};
pub use ingest::{write_sidecar, IngestError, IngestResult, Ingestor, SidecarArtifacts};
pub use probe::{run_ffprobe, seed_thumbnails, ProbeNormalizer};
pub use sidecar::{
    export_schema, export_schema_to, sidecar_schema, validate, validate_value, IngestWarning,
    SchemaError, Sidecar, SidecarEcho, SCHEMA_VERSION,
};
pub use source::{SourceContext, SourceType};
pub use thumbnails::{ExtractionError, RenderOutcome, ThumbnailRenderer, ThumbnailSlot};
pub use tools::{
    binary_version, check_tools, detect_tool_versions, CommandRunner, SystemCommandRunner,
    ToolCheck, NORMALIZER_VERSION,
};
