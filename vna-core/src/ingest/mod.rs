//! End-to-end ingestion of a single local file.

mod error;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::config::IngestConfig;
use crate::identity::{derive_local_asset_identity_with_chunk, AssetIdentity};
use crate::probe::{run_ffprobe, ProbeNormalizer};
use crate::sidecar::{export_schema, SchemaError, Sidecar};
use crate::source::SourceContext;
use crate::thumbnails::{RenderOutcome, ThumbnailRenderer};
use crate::tools::{detect_tool_versions, CommandRunner, SystemCommandRunner};

pub use error::{IngestError, IngestResult};

pub const SIDECARS_DIR: &str = "sidecars";
pub const SIDECAR_EXTENSION: &str = "vna.json";

/// Everything written by [`Ingestor::build_sidecar`].
#[derive(Debug, Clone)]
pub struct SidecarArtifacts {
    pub sidecar: Sidecar,
    pub sidecar_path: PathBuf,
    pub schema_path: PathBuf,
    pub outcome: RenderOutcome,
}

pub struct Ingestor {
    config: IngestConfig,
    runner: Arc<dyn CommandRunner>,
    normalizer: ProbeNormalizer,
    renderer: ThumbnailRenderer,
}

impl fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ingestor")
            .field("config", &self.config)
            .field("normalizer", &self.normalizer)
            .field("renderer", &self.renderer)
            .finish()
    }
}

impl Ingestor {
    pub fn new(config: IngestConfig) -> Self {
        Self::with_runner(config, Arc::new(SystemCommandRunner))
    }

    /// Builds an ingestor whose ffprobe and ffmpeg calls go through `runner`.
    /// Tool versions are looked up once here.
    pub fn with_runner(config: IngestConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let tools = detect_tool_versions(&config.tools, runner.as_ref());
        let renderer = ThumbnailRenderer::new(&config.thumbnails, &config.tools)
            .with_runner(Arc::clone(&runner));
        Self {
            normalizer: ProbeNormalizer::new(tools),
            renderer,
            runner,
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &ProbeNormalizer {
        &self.normalizer
    }

    pub fn identify(&self, path: &Path) -> IngestResult<AssetIdentity> {
        derive_local_asset_identity_with_chunk(
            path,
            self.config.identity.weak_threshold(),
            self.config.identity.chunk_size_bytes,
        )
    }

    pub fn source_context(
        &self,
        path: &Path,
        asset_id_override: Option<&str>,
    ) -> IngestResult<SourceContext> {
        let identity = self.identify(path)?;
        let context = SourceContext::local(path, &identity, self.config.source.use_birth_time)?;
        Ok(match asset_id_override {
            Some(asset_id) => context.with_asset_id(asset_id),
            None => context,
        })
    }

    pub fn probe_file(&self, path: &Path) -> IngestResult<Value> {
        run_ffprobe(self.runner.as_ref(), &self.config.tools.ffprobe, path)
    }

    /// Identity, probe and normalization; no thumbnails yet.
    pub fn probe(&self, path: &Path, asset_id_override: Option<&str>) -> IngestResult<Sidecar> {
        let context = self.source_context(path, asset_id_override)?;
        let raw = self.probe_file(path)?;
        self.normalizer.normalize(&raw, &context)
    }

    pub fn render(
        &self,
        path: &Path,
        sidecar: &mut Sidecar,
        out_root: &Path,
    ) -> IngestResult<RenderOutcome> {
        self.renderer.render(path, sidecar, out_root)
    }

    /// Full pipeline: exports the schema, probes, renders thumbnails and
    /// writes `<derived_root>/sidecars/<asset_id>.vna.json`.
    pub fn build_sidecar(
        &self,
        path: &Path,
        asset_id_override: Option<&str>,
        derived_root: &Path,
    ) -> IngestResult<SidecarArtifacts> {
        let schema_path = export_schema(derived_root).map_err(schema_export_error)?;
        let mut sidecar = self.probe(path, asset_id_override)?;
        let outcome = self.render(path, &mut sidecar, derived_root)?;
        let sidecar_path = write_sidecar(&sidecar, derived_root)?;
        info!(
            asset_id = %sidecar.asset_id,
            path = %sidecar_path.display(),
            "wrote sidecar"
        );
        Ok(SidecarArtifacts {
            sidecar,
            sidecar_path,
            schema_path,
            outcome,
        })
    }
}

pub fn sidecar_path(derived_root: &Path, asset_id: &str) -> PathBuf {
    derived_root
        .join(SIDECARS_DIR)
        .join(format!("{asset_id}.{SIDECAR_EXTENSION}"))
}

/// Writes the sidecar as pretty JSON with a trailing newline.
pub fn write_sidecar(sidecar: &Sidecar, derived_root: &Path) -> IngestResult<PathBuf> {
    if sidecar.asset_id.is_empty() {
        return Err(IngestError::MissingAssetId);
    }
    let path = sidecar_path(derived_root, &sidecar.asset_id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| IngestError::Io {
            source,
            path: parent.to_path_buf(),
        })?;
    }
    let mut bytes = serde_json::to_vec_pretty(sidecar)?;
    bytes.push(b'\n');
    std::fs::write(&path, bytes).map_err(|source| IngestError::Io {
        source,
        path: path.clone(),
    })?;
    Ok(path)
}

fn schema_export_error(err: SchemaError) -> IngestError {
    match err {
        SchemaError::Io { source, path } => IngestError::Io { source, path },
        other => IngestError::SchemaInvariantViolation(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_path_layout() {
        assert_eq!(
            sidecar_path(Path::new("derived"), "sha256:abc"),
            PathBuf::from("derived/sidecars/sha256:abc.vna.json")
        );
    }
}
