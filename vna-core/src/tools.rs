use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::{OnceLock, RwLock};

use tracing::debug;

use crate::config::ToolsSection;
use crate::sidecar::ToolVersions;

pub const NORMALIZER_VERSION: &str = "vna.ingest/0.1.0";
pub const UNKNOWN_VERSION: &str = "unknown";

static VERSION_CACHE: OnceLock<RwLock<HashMap<PathBuf, String>>> = OnceLock::new();

/// Seam over process execution so probing and extraction can run against
/// scripted tools.
pub trait CommandRunner: Send + Sync {
    fn output(&self, command: &mut Command) -> io::Result<Output>;
}

#[derive(Debug, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn output(&self, command: &mut Command) -> io::Result<Output> {
        command.output()
    }
}

/// First line of `<program> -version`, memoized per program path for the
/// life of the process. The cache is keyed on the path alone: whichever
/// runner asks first decides the answer every later runner sees for that
/// path, so scripted runners that disagree need distinct paths. Use
/// [`query_version`] to bypass the cache. Two threads racing on first use
/// may both run the tool.
pub fn binary_version(runner: &dyn CommandRunner, program: &Path) -> String {
    let cache = VERSION_CACHE.get_or_init(Default::default);
    if let Some(version) = cache
        .read()
        .ok()
        .and_then(|cached| cached.get(program).cloned())
    {
        return version;
    }
    let version = query_version(runner, program);
    if let Ok(mut cached) = cache.write() {
        cached.insert(program.to_path_buf(), version.clone());
    }
    version
}

/// Uncached variant of [`binary_version`].
pub fn query_version(runner: &dyn CommandRunner, program: &Path) -> String {
    version_line(runner, program).unwrap_or_else(|| UNKNOWN_VERSION.to_string())
}

fn version_line(runner: &dyn CommandRunner, program: &Path) -> Option<String> {
    let mut command = Command::new(program);
    command.arg("-version");
    match runner.output(&mut command) {
        Ok(output) if output.status.success() => {
            first_line(&output.stdout).or_else(|| first_line(&output.stderr))
        }
        Ok(output) => {
            debug!(program = %program.display(), status = %output.status, "version query failed");
            None
        }
        Err(err) => {
            debug!(program = %program.display(), error = %err, "version query failed");
            None
        }
    }
}

/// Versions of the configured tools, served from the per-path cache.
pub fn detect_tool_versions(tools: &ToolsSection, runner: &dyn CommandRunner) -> ToolVersions {
    ToolVersions {
        ffprobe: binary_version(runner, &tools.ffprobe),
        ffmpeg: binary_version(runner, &tools.ffmpeg),
        normalizer: NORMALIZER_VERSION.to_string(),
    }
}

/// Result of running one configured tool with `-version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCheck {
    pub name: &'static str,
    pub program: PathBuf,
    pub version: Option<String>,
}

impl ToolCheck {
    pub fn is_available(&self) -> bool {
        self.version.is_some()
    }
}

/// Uncached availability check for every configured tool.
pub fn check_tools(tools: &ToolsSection, runner: &dyn CommandRunner) -> Vec<ToolCheck> {
    [("ffprobe", &tools.ffprobe), ("ffmpeg", &tools.ffmpeg)]
        .into_iter()
        .map(|(name, program)| ToolCheck {
            name,
            program: program.clone(),
            version: version_line(runner, program),
        })
        .collect()
}

fn first_line(bytes: &[u8]) -> Option<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}
