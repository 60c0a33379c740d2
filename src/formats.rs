//! Extension-based media classification and output-format tables.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::config::FormatConfig;
use crate::error::{Result, ConvertError};

/// Coarse kind of a media file, derived from its extension only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Video,
    Audio,
    Image,
    Unknown,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Image => "image",
            MediaKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Lower-cases an extension and strips a leading dot.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Normalized extension of a path, empty when it has none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| normalize_extension(&e.to_string_lossy()))
        .unwrap_or_default()
}

/// Immutable classification table built from configuration.
#[derive(Debug, Clone)]
pub struct FormatTable {
    video: HashSet<String>,
    audio: HashSet<String>,
    image: HashSet<String>,
    video_targets: Vec<String>,
    audio_targets: Vec<String>,
    image_targets: Vec<String>,
    all_targets: Vec<String>,
    default_video: String,
    default_audio: String,
    default_image: String,
    default_unknown: String,
}

impl FormatTable {
    /// Builds the table, rejecting extension sets that overlap.
    pub fn new(config: &FormatConfig) -> Result<Self> {
        let video = Self::to_set(&config.video_extensions);
        let audio = Self::to_set(&config.audio_extensions);
        let image = Self::to_set(&config.image_extensions);

        let pairs = [
            ("video", &video, "audio", &audio),
            ("video", &video, "image", &image),
            ("audio", &audio, "image", &image),
        ];
        for (left_name, left, right_name, right) in pairs {
            if let Some(ext) = left.intersection(right).next() {
                return Err(ConvertError::Config(format!(
                    "Extension '{}' is listed as both {} and {}",
                    ext, left_name, right_name
                )));
            }
        }

        let video_targets = Self::to_list(&config.video_targets);
        let audio_targets = Self::to_list(&config.audio_targets);
        let image_targets = Self::to_list(&config.image_targets);
        if video_targets.is_empty() || audio_targets.is_empty() || image_targets.is_empty() {
            return Err(ConvertError::Config(
                "Every media kind needs at least one output format".to_string(),
            ));
        }

        let mut all_targets: Vec<String> = Vec::new();
        for target in video_targets.iter().chain(&audio_targets).chain(&image_targets) {
            if !all_targets.contains(target) {
                all_targets.push(target.clone());
            }
        }

        Ok(Self {
            video,
            audio,
            image,
            video_targets,
            audio_targets,
            image_targets,
            all_targets,
            default_video: normalize_extension(&config.default_video_target),
            default_audio: normalize_extension(&config.default_audio_target),
            default_image: normalize_extension(&config.default_image_target),
            default_unknown: normalize_extension(&config.default_unknown_target),
        })
    }

    fn to_set(items: &[String]) -> HashSet<String> {
        items.iter().map(|e| normalize_extension(e)).collect()
    }

    fn to_list(items: &[String]) -> Vec<String> {
        items.iter().map(|e| normalize_extension(e)).collect()
    }

    /// Classifies an extension given with or without its leading dot.
    pub fn classify(&self, ext: &str) -> MediaKind {
        let ext = normalize_extension(ext);
        if self.video.contains(&ext) {
            MediaKind::Video
        } else if self.audio.contains(&ext) {
            MediaKind::Audio
        } else if self.image.contains(&ext) {
            MediaKind::Image
        } else {
            MediaKind::Unknown
        }
    }

    pub fn classify_path(&self, path: &Path) -> MediaKind {
        self.classify(&extension_of(path))
    }

    /// True when the extension belongs to any known kind.
    pub fn is_supported(&self, ext: &str) -> bool {
        self.classify(ext) != MediaKind::Unknown
    }

    /// Known input extensions of one kind, sorted.
    pub fn extensions(&self, kind: MediaKind) -> Vec<&str> {
        let set = match kind {
            MediaKind::Video => &self.video,
            MediaKind::Audio => &self.audio,
            MediaKind::Image => &self.image,
            MediaKind::Unknown => return Vec::new(),
        };
        let mut exts: Vec<&str> = set.iter().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }

    /// Output formats offered for an input kind. Unknown inputs get every format.
    pub fn targets(&self, kind: MediaKind) -> &[String] {
        match kind {
            MediaKind::Video => &self.video_targets,
            MediaKind::Audio => &self.audio_targets,
            MediaKind::Image => &self.image_targets,
            MediaKind::Unknown => &self.all_targets,
        }
    }

    pub fn default_target(&self, kind: MediaKind) -> &str {
        match kind {
            MediaKind::Video => &self.default_video,
            MediaKind::Audio => &self.default_audio,
            MediaKind::Image => &self.default_image,
            MediaKind::Unknown => &self.default_unknown,
        }
    }

    /// Output format for an item: the selection when the kind offers it,
    /// the kind's first offered format when it does not, and the kind's
    /// default when nothing was selected.
    pub fn resolve_target(&self, kind: MediaKind, selected: Option<&str>) -> String {
        match selected {
            Some(selected) => {
                let selected = normalize_extension(selected);
                let targets = self.targets(kind);
                if targets.contains(&selected) {
                    selected
                } else {
                    targets[0].clone()
                }
            }
            None => self.default_target(kind).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> FormatTable {
        FormatTable::new(&FormatConfig::default()).unwrap()
    }

    #[test]
    fn test_classify_normalizes_dot_and_case() {
        let table = table();
        assert_eq!(table.classify("mp4"), MediaKind::Video);
        assert_eq!(table.classify(".MKV"), MediaKind::Video);
        assert_eq!(table.classify("Wav"), MediaKind::Audio);
        assert_eq!(table.classify(".jpeg"), MediaKind::Image);
    }

    #[test]
    fn test_classify_is_total() {
        let table = table();
        for ext in ["", ".", "txt", "opus", "gif", "tar.gz", "  "] {
            assert_eq!(table.classify(ext), MediaKind::Unknown, "extension {:?}", ext);
        }
    }

    #[test]
    fn test_default_sets_are_disjoint() {
        let table = table();
        for kind in [MediaKind::Video, MediaKind::Audio, MediaKind::Image] {
            for ext in table.extensions(kind) {
                assert_eq!(table.classify(ext), kind);
            }
        }
    }

    #[test]
    fn test_overlapping_sets_rejected() {
        let mut config = FormatConfig::default();
        config.audio_extensions.push("webm".to_string());
        let err = FormatTable::new(&config).unwrap_err();
        assert!(err.to_string().contains("webm"));
    }

    #[test]
    fn test_sets_extend_from_config() {
        let mut config = FormatConfig::default();
        config.image_extensions.push(".GIF".to_string());
        let table = FormatTable::new(&config).unwrap();
        assert_eq!(table.classify("gif"), MediaKind::Image);
    }

    #[test]
    fn test_classify_path() {
        let table = table();
        assert_eq!(table.classify_path(Path::new("/tmp/movie.AVI")), MediaKind::Video);
        assert_eq!(table.classify_path(Path::new("README")), MediaKind::Unknown);
    }

    #[test]
    fn test_resolve_target() {
        let table = table();
        assert_eq!(table.resolve_target(MediaKind::Video, None), "webm");
        assert_eq!(table.resolve_target(MediaKind::Audio, None), "mp3");
        assert_eq!(table.resolve_target(MediaKind::Image, None), "webp");
        assert_eq!(table.resolve_target(MediaKind::Unknown, None), "mp4");

        assert_eq!(table.resolve_target(MediaKind::Video, Some("MKV")), "mkv");
        // Not offered for images: fall back to the first image format
        assert_eq!(table.resolve_target(MediaKind::Image, Some("mp3")), "webp");
        assert_eq!(table.resolve_target(MediaKind::Unknown, Some("ogg")), "ogg");
    }

    #[test]
    fn test_unknown_targets_are_union() {
        let table = table();
        let all = table.targets(MediaKind::Unknown);
        assert_eq!(all.len(), 13);
        assert_eq!(all[0], "mp4");
        assert!(all.contains(&"opus".to_string()));
        assert!(all.contains(&"png".to_string()));
    }
}
