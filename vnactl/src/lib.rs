use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use vna_core::identity::{HashInfo, HashQuality};
use vna_core::sidecar::SCHEMA_RELATIVE_PATH;
use vna_core::{
    check_tools, export_schema_to, load_ingest_config, CommandRunner, IngestConfig, Ingestor,
    RenderOutcome, Sidecar, SystemCommandRunner, ThumbnailSlot,
};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] vna_core::ConfigError),
    #[error("ingest error: {0}")]
    Ingest(#[from] vna_core::IngestError),
    #[error("schema error: {0}")]
    Schema(#[from] vna_core::SchemaError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("required tool unavailable: {0}")]
    MissingTool(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "VNA ingest command-line interface", long_about = None)]
pub struct Cli {
    /// Caminho do vna.toml (padrões embutidos quando omitido)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Formato de saída
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Verifica se ffprobe e ffmpeg podem ser executados
    Check,
    /// Deriva o asset_id de um arquivo local
    Identity(IdentityArgs),
    /// Normaliza a saída do ffprobe em um sidecar
    Probe(ProbeArgs),
    /// Gera thumbnails e exibe o sidecar enriquecido
    Thumbs(RenderArgs),
    /// Exporta o schema, gera thumbnails e grava o sidecar
    Sidecar(RenderArgs),
    /// Exporta o JSON Schema do sidecar
    Schema(SchemaArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct IdentityOverrides {
    /// Tamanho máximo (bytes) para hash SHA-256 completo
    #[arg(long)]
    pub weak_threshold_bytes: Option<u64>,
    /// Sempre calcula o hash completo, independente do tamanho
    #[arg(long)]
    pub always_strong: bool,
}

#[derive(Args, Debug)]
pub struct IdentityArgs {
    /// Arquivo de mídia
    #[arg(long)]
    pub file: PathBuf,
    #[command(flatten)]
    pub identity: IdentityOverrides,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Arquivo de mídia
    #[arg(long)]
    pub file: PathBuf,
    /// Substitui o asset_id derivado
    #[arg(long)]
    pub asset_id: Option<String>,
    #[command(flatten)]
    pub identity: IdentityOverrides,
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Arquivo de mídia
    #[arg(long)]
    pub file: PathBuf,
    /// Substitui o asset_id derivado
    #[arg(long)]
    pub asset_id: Option<String>,
    /// Diretório de saída (substitui paths.derived_root)
    #[arg(long)]
    pub derived_root: Option<PathBuf>,
    #[command(flatten)]
    pub identity: IdentityOverrides,
}

#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Caminho de saída (padrão: <derived_root>/schema/vna_sidecar_v0.1.0.json)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub fn run(cli: Cli) -> Result<()> {
    run_with_runner(cli, Arc::new(SystemCommandRunner))
}

/// Runs a command with every external tool call going through `runner`.
pub fn run_with_runner(cli: Cli, runner: Arc<dyn CommandRunner>) -> Result<()> {
    let context = AppContext::new(&cli, runner)?;

    match &cli.command {
        Commands::Check => {
            let report = context.check();
            render(&report, cli.format)?;
            let missing: Vec<&str> = report
                .tools
                .iter()
                .filter(|tool| !tool.available)
                .map(|tool| tool.name)
                .collect();
            if !missing.is_empty() {
                return Err(AppError::MissingTool(missing.join(", ")));
            }
        }
        Commands::Identity(args) => {
            let report = context.identity(args)?;
            render(&report, cli.format)?;
        }
        Commands::Probe(args) => {
            let sidecar = context.probe(args)?;
            render(&sidecar, cli.format)?;
        }
        Commands::Thumbs(args) => {
            let report = context.thumbs(args)?;
            render(&report, cli.format)?;
        }
        Commands::Sidecar(args) => {
            let report = context.sidecar(args)?;
            render(&report, cli.format)?;
        }
        Commands::Schema(args) => {
            let report = context.schema(args)?;
            render(&report, cli.format)?;
        }
    }

    Ok(())
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

struct AppContext {
    config: IngestConfig,
    runner: Arc<dyn CommandRunner>,
}

impl AppContext {
    fn new(cli: &Cli, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let config = match &cli.config {
            Some(path) => load_ingest_config(path)?,
            None => IngestConfig::default(),
        };
        debug!(
            config = ?cli.config,
            derived_root = %config.paths.derived_root.display(),
            "configuration loaded"
        );
        Ok(Self { config, runner })
    }

    fn ingestor(&self, overrides: &IdentityOverrides) -> Ingestor {
        let mut config = self.config.clone();
        if let Some(threshold) = overrides.weak_threshold_bytes {
            config.identity.weak_threshold_bytes = threshold;
        }
        if overrides.always_strong {
            config.identity.always_strong = true;
        }
        Ingestor::with_runner(config, Arc::clone(&self.runner))
    }

    fn derived_root(&self, requested: Option<&Path>) -> PathBuf {
        requested
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.paths.derived_root.clone())
    }

    fn check(&self) -> CheckReport {
        let tools = check_tools(&self.config.tools, self.runner.as_ref())
            .into_iter()
            .map(|check| ToolStatus {
                available: check.is_available(),
                name: check.name,
                program: check.program.display().to_string(),
                version: check.version,
            })
            .collect();
        CheckReport { tools }
    }

    fn identity(&self, args: &IdentityArgs) -> Result<IdentityReport> {
        let identity = self.ingestor(&args.identity).identify(&args.file)?;
        Ok(IdentityReport {
            path: args.file.display().to_string(),
            asset_id: identity.asset_id,
            hash: identity.hash,
            hash_quality: identity.hash_quality,
        })
    }

    fn probe(&self, args: &ProbeArgs) -> Result<Sidecar> {
        let ingestor = self.ingestor(&args.identity);
        Ok(ingestor.probe(&args.file, args.asset_id.as_deref())?)
    }

    fn thumbs(&self, args: &RenderArgs) -> Result<ThumbsReport> {
        let ingestor = self.ingestor(&args.identity);
        let derived_root = self.derived_root(args.derived_root.as_deref());
        let mut sidecar = ingestor.probe(&args.file, args.asset_id.as_deref())?;
        let outcome = ingestor.render(&args.file, &mut sidecar, &derived_root)?;
        Ok(ThumbsReport {
            slots: SlotSummary::from(&outcome),
            sidecar,
        })
    }

    fn sidecar(&self, args: &RenderArgs) -> Result<SidecarReport> {
        let ingestor = self.ingestor(&args.identity);
        let derived_root = self.derived_root(args.derived_root.as_deref());
        let artifacts =
            ingestor.build_sidecar(&args.file, args.asset_id.as_deref(), &derived_root)?;
        Ok(SidecarReport {
            sidecar_path: artifacts.sidecar_path.display().to_string(),
            schema_path: artifacts.schema_path.display().to_string(),
            slots: SlotSummary::from(&artifacts.outcome),
            sidecar: artifacts.sidecar,
        })
    }

    fn schema(&self, args: &SchemaArgs) -> Result<SchemaReport> {
        let path = args
            .output
            .clone()
            .unwrap_or_else(|| self.config.paths.derived_root.join(SCHEMA_RELATIVE_PATH));
        export_schema_to(&path)?;
        info!(path = %path.display(), "schema exported");
        Ok(SchemaReport {
            path: path.display().to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub tools: Vec<ToolStatus>,
}

#[derive(Debug, Serialize)]
pub struct ToolStatus {
    pub name: &'static str,
    pub program: String,
    pub available: bool,
    pub version: Option<String>,
}

impl DisplayFallback for CheckReport {
    fn display(&self) -> String {
        self.tools
            .iter()
            .map(|tool| {
                let status = if tool.available { "OK" } else { "ERRO" };
                format!(
                    "[{status}] {name} ({program}): {version}",
                    name = tool.name,
                    program = tool.program,
                    version = tool.version.as_deref().unwrap_or("não encontrado")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct IdentityReport {
    pub path: String,
    pub asset_id: String,
    pub hash: Option<HashInfo>,
    pub hash_quality: Option<HashQuality>,
}

impl DisplayFallback for IdentityReport {
    fn display(&self) -> String {
        let quality = match self.hash_quality {
            Some(HashQuality::Strong) => "forte",
            Some(HashQuality::Weak) => "fraco",
            None => "-",
        };
        format!("{} | {} | hash={}", self.path, self.asset_id, quality)
    }
}

impl DisplayFallback for Sidecar {
    fn display(&self) -> String {
        let mut lines = vec![
            format!("Asset: {}", self.asset_id),
            format!(
                "Formato: {} | duração={:.3}s | bitrate={}",
                self.format.container,
                self.format.duration_s,
                self.format
                    .bitrate_kbps
                    .map(|kbps| format!("{kbps} kbps"))
                    .unwrap_or_else(|| "-".to_string())
            ),
        ];
        match &self.video {
            Some(video) => lines.push(format!(
                "Vídeo: {} {}x{} @ {}",
                video.codec,
                video.width_px,
                video.height_px,
                video
                    .frame_rate_fps
                    .map(|fps| format!("{fps:.2} fps"))
                    .unwrap_or_else(|| "-".to_string())
            )),
            None => lines.push("Vídeo: ausente".to_string()),
        }
        match &self.audio {
            Some(audio) => lines.push(format!(
                "Áudio: {} {} ch @ {} Hz",
                audio.codec, audio.channels, audio.sample_rate_hz
            )),
            None => lines.push("Áudio: ausente".to_string()),
        }
        lines.push(format!("Streams: {}", self.streams.len()));
        let poster = &self.thumbnails.poster;
        lines.push(format!(
            "Poster: {}s {}",
            poster.timestamp_s,
            if poster.path.is_empty() { "-" } else { poster.path.as_str() }
        ));
        for sample in &self.thumbnails.samples {
            lines.push(format!(
                "  - amostra {}s {}",
                sample.timestamp_s,
                if sample.path.is_empty() { "-" } else { sample.path.as_str() }
            ));
        }
        if !self.warnings.is_empty() {
            lines.push(format!("Avisos: {}", self.warnings.join(", ")));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct SlotSummary {
    pub rendered: Vec<String>,
    pub failed: Vec<String>,
}

impl From<&RenderOutcome> for SlotSummary {
    fn from(outcome: &RenderOutcome) -> Self {
        let labels = |slots: &[ThumbnailSlot]| -> Vec<String> {
            slots.iter().map(ToString::to_string).collect()
        };
        Self {
            rendered: labels(&outcome.rendered),
            failed: labels(&outcome.failed),
        }
    }
}

impl SlotSummary {
    fn display(&self) -> String {
        if self.failed.is_empty() {
            format!("Thumbnails: {} gerados", self.rendered.len())
        } else {
            format!(
                "Thumbnails: {} gerados, falhas em {}",
                self.rendered.len(),
                self.failed.join(", ")
            )
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ThumbsReport {
    pub slots: SlotSummary,
    pub sidecar: Sidecar,
}

impl DisplayFallback for ThumbsReport {
    fn display(&self) -> String {
        format!("{}\n{}", self.sidecar.display(), self.slots.display())
    }
}

#[derive(Debug, Serialize)]
pub struct SidecarReport {
    pub sidecar_path: String,
    pub schema_path: String,
    pub slots: SlotSummary,
    pub sidecar: Sidecar,
}

impl DisplayFallback for SidecarReport {
    fn display(&self) -> String {
        format!(
            "{}\n{}\nSidecar: {}\nSchema: {}",
            self.sidecar.display(),
            self.slots.display(),
            self.sidecar_path,
            self.schema_path
        )
    }
}

#[derive(Debug, Serialize)]
pub struct SchemaReport {
    pub path: String,
}

impl DisplayFallback for SchemaReport {
    fn display(&self) -> String {
        format!("Schema exportado para {}", self.path)
    }
}
