use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use super::commands::MediaCommandBuilder;

/// Subset of ffprobe's `-show_format -show_streams` JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeInfo {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    #[serde(default)]
    pub format: Option<ProbeFormat>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeStream {
    #[serde(default)]
    pub index: u32,
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sample_rate: Option<String>,
    pub channels: Option<u32>,
    pub duration: Option<String>,
    pub bit_rate: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeFormat {
    pub filename: Option<String>,
    pub format_name: Option<String>,
    pub duration: Option<String>,
    pub size: Option<String>,
    pub bit_rate: Option<String>,
    pub nb_streams: Option<u32>,
}

impl ProbeInfo {
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty() && self.format.is_none()
    }

    /// Container duration in seconds
    pub fn duration_secs(&self) -> Option<f64> {
        self.format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .and_then(|d| d.parse().ok())
    }

    /// Streams of one type ("video", "audio", ...)
    pub fn streams_of<'a>(&'a self, codec_type: &'a str) -> impl Iterator<Item = &'a ProbeStream> + 'a {
        self.streams
            .iter()
            .filter(move |s| s.codec_type.as_deref() == Some(codec_type))
    }
}

/// Metadata reader backed by the companion inspection tool
pub struct MediaProbe {
    command_builder: MediaCommandBuilder,
}

impl MediaProbe {
    pub fn new<S: Into<String>>(probe_path: S) -> Self {
        Self {
            command_builder: MediaCommandBuilder::new(probe_path),
        }
    }

    /// Stream and container metadata for `path`; empty when the probe fails.
    pub async fn probe<P: AsRef<Path>>(&self, path: P) -> ProbeInfo {
        let path = path.as_ref();
        let command = self.command_builder.probe_json(path);

        let output = match command.execute().await {
            Ok(output) => output,
            Err(e) => {
                warn!("Failed to probe {}: {}", path.display(), e);
                return ProbeInfo::default();
            }
        };

        if !output.success() {
            debug!("Probe of {} exited with {:?}", path.display(), output.code);
            return ProbeInfo::default();
        }

        Self::parse(&output.stdout).unwrap_or_else(|e| {
            warn!("Unreadable probe output for {}: {}", path.display(), e);
            ProbeInfo::default()
        })
    }

    pub fn parse(json: &str) -> serde_json::Result<ProbeInfo> {
        serde_json::from_str(json)
    }
}
