use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::ToolConfig;
use super::commands::MediaCommandBuilder;

/// Where a located executable came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolSource {
    /// `binary_path` from the configuration
    Configured,
    /// A bundled build or wrapper script next to the working directory
    Local,
    /// Bare name left for the OS search path to resolve
    SearchPath,
}

/// Resolved invocation for the conversion tool and its companion probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolLocation {
    pub executable: String,
    pub probe: String,
    pub source: ToolSource,
}

pub struct ToolLocator {
    config: ToolConfig,
    base_dir: PathBuf,
}

impl ToolLocator {
    pub fn new(config: ToolConfig) -> Self {
        Self {
            config,
            base_dir: PathBuf::from("."),
        }
    }

    /// Resolve local candidates against `dir` instead of the working directory
    pub fn with_base_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Local candidate paths in probe order
    pub fn candidates(&self) -> Vec<PathBuf> {
        self.config
            .candidates
            .iter()
            .map(|c| self.base_dir.join(c))
            .collect()
    }

    /// First existing candidate, else the bare tool name.
    ///
    /// Never fails: a missing tool surfaces when it is invoked.
    pub fn locate(&self) -> ToolLocation {
        if let Some(configured) = &self.config.binary_path {
            if Path::new(configured).exists() {
                info!("Using configured ffmpeg: {}", configured);
                return self.location(configured.clone(), ToolSource::Configured);
            }
            warn!("Configured ffmpeg not found at {}, probing defaults", configured);
        }

        for candidate in self.candidates() {
            debug!("Probing for ffmpeg at {}", candidate.display());
            if candidate.exists() {
                info!("Using local ffmpeg: {}", candidate.display());
                return self.location(candidate.to_string_lossy().to_string(), ToolSource::Local);
            }
        }

        info!("No local ffmpeg found, relying on {} from PATH", self.config.tool_name);
        self.location(self.config.tool_name.clone(), ToolSource::SearchPath)
    }

    fn location(&self, executable: String, source: ToolSource) -> ToolLocation {
        let probe = self.probe_companion(&executable);
        ToolLocation {
            executable,
            probe,
            source,
        }
    }

    /// Companion inspection tool for `executable`: the same path with the
    /// tool name swapped for the probe name, or the bare probe name when
    /// that path does not exist.
    pub fn probe_companion(&self, executable: &str) -> String {
        let substituted = executable.replace(&self.config.tool_name, &self.config.probe_name);
        if Path::new(&substituted).exists() {
            substituted
        } else {
            self.config.probe_name.clone()
        }
    }
}

impl ToolLocation {
    /// Runs `<executable> -version`; any launch failure or non-zero exit is `false`.
    pub async fn is_available(&self) -> bool {
        match MediaCommandBuilder::new(&self.executable).version_check().execute().await {
            Ok(output) if output.success() => {
                debug!(
                    "ffmpeg version: {}",
                    output.stdout.lines().next().unwrap_or("unknown")
                );
                true
            }
            Ok(output) => {
                warn!("ffmpeg version check exited with {:?}", output.code);
                false
            }
            Err(e) => {
                warn!("ffmpeg version check failed: {}", e);
                false
            }
        }
    }

    /// First line of `-version` output, when the tool runs
    pub async fn version(&self) -> Option<String> {
        let output = MediaCommandBuilder::new(&self.executable)
            .version_check()
            .execute()
            .await
            .ok()?;
        if !output.success() {
            return None;
        }
        output.stdout.lines().next().map(str::to_string)
    }
}
