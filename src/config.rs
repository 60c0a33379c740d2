use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{Result, ConvertError};

fn default_quality() -> u32 {
    80
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tool: ToolConfig,
    #[serde(default)]
    pub formats: FormatConfig,
    #[serde(default)]
    pub conversion: ConversionConfig,
    #[serde(default)]
    pub install: InstallConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Explicit path to the ffmpeg binary. Checked before any candidate.
    pub binary_path: Option<String>,
    /// Bare tool name, resolved through PATH when no candidate exists
    pub tool_name: String,
    /// Name of the companion inspection tool (substituted for `tool_name`)
    pub probe_name: String,
    /// Local candidates, relative to the working directory, probed in order
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Extensions classified as video input (no leading dot)
    pub video_extensions: Vec<String>,
    /// Extensions classified as audio input
    pub audio_extensions: Vec<String>,
    /// Extensions classified as image input
    pub image_extensions: Vec<String>,
    /// Output formats offered for each input kind. The first entry is the
    /// fallback when a selection is not offered for that kind.
    pub video_targets: Vec<String>,
    pub audio_targets: Vec<String>,
    pub image_targets: Vec<String>,
    /// Output format used when no selection was made
    pub default_video_target: String,
    pub default_audio_target: String,
    pub default_image_target: String,
    pub default_unknown_target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Quality percentage (1-100). Not range-checked.
    pub quality: u32,
    /// Video codec forced for every item instead of the per-format default
    pub video_codec: Option<String>,
    /// Audio codec forced for every item instead of the per-format default
    pub audio_codec: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Release location of the prebuilt archives
    pub base_url: String,
    /// Directory the archive is unpacked into
    pub bin_dir: String,
    /// Name of the directory the unpacked build is renamed to, inside `bin_dir`
    pub install_dir_name: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            tool_name: "ffmpeg".to_string(),
            probe_name: "ffprobe".to_string(),
            candidates: strings(&[
                "bin/bin/ffmpeg.exe",
                "bin/bin/ffmpeg",
                "bin/ffmpeg/bin/ffmpeg.exe",
                "ffmpeg.bat",
                "ffmpeg.sh",
            ]),
        }
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            video_extensions: strings(&["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm"]),
            audio_extensions: strings(&["mp3", "wav", "aac", "ogg", "flac", "m4a"]),
            image_extensions: strings(&["jpg", "jpeg", "png", "bmp", "tiff", "webp"]),
            video_targets: strings(&["mp4", "webm", "avi", "mkv", "mov"]),
            audio_targets: strings(&["mp3", "wav", "aac", "ogg", "opus"]),
            image_targets: strings(&["webp", "jpg", "png"]),
            default_video_target: "webm".to_string(),
            default_audio_target: "mp3".to_string(),
            default_image_target: "webp".to_string(),
            default_unknown_target: "mp4".to_string(),
        }
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            quality: default_quality(),
            video_codec: None,
            audio_codec: None,
        }
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            base_url: "https://github.com/BtbN/FFmpeg-Builds/releases/download/latest".to_string(),
            bin_dir: "bin".to_string(),
            install_dir_name: "ffmpeg".to_string(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConvertError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| ConvertError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConvertError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConvertError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}
