//! Translates a conversion request into ffmpeg arguments.
//!
//! Codec and quality rules are keyed on the kind of the *input* file, so an
//! mp4 converted to mp3 still goes through the video rules.

use std::path::PathBuf;
use tracing::debug;

use crate::formats::{extension_of, FormatTable, MediaKind};
use super::commands::MediaCommand;

/// CRF used for every webm video output, regardless of quality
pub const WEBM_CRF: i64 = 30;

/// Everything needed to convert one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Quality percentage, nominally 1-100
    pub quality: u32,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
}

impl ConversionRequest {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(input: P, output: Q, quality: u32) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            quality,
            video_codec: None,
            audio_codec: None,
        }
    }

    pub fn with_video_codec<S: Into<String>>(mut self, codec: Option<S>) -> Self {
        self.video_codec = codec.map(Into::into);
        self
    }

    pub fn with_audio_codec<S: Into<String>>(mut self, codec: Option<S>) -> Self {
        self.audio_codec = codec.map(Into::into);
        self
    }
}

/// Maps a quality percentage onto a 0 (best) .. 31 (worst) quantizer scale.
pub fn inverse_quality(quality: u32) -> i64 {
    31 - (f64::from(quality) * 0.31).floor() as i64
}

fn default_video_codec(output_ext: &str) -> Option<&'static str> {
    match output_ext {
        "webm" => Some("libvpx-vp9"),
        "mp4" => Some("libx264"),
        "avi" => Some("libxvid"),
        _ => None,
    }
}

fn default_video_audio_codec(output_ext: &str) -> &'static str {
    match output_ext {
        "webm" => "libopus",
        _ => "aac",
    }
}

fn default_audio_codec(output_ext: &str) -> Option<&'static str> {
    match output_ext {
        "mp3" => Some("libmp3lame"),
        "aac" => Some("aac"),
        "ogg" => Some("libvorbis"),
        "opus" => Some("libopus"),
        _ => None,
    }
}

fn audio_bitrate_kbps(output_ext: &str, quality: u32) -> Option<u32> {
    match output_ext {
        "mp3" => Some(quality * 3),
        "aac" => Some(quality * 2),
        _ => None,
    }
}

pub struct CommandSynthesizer {
    table: FormatTable,
}

impl CommandSynthesizer {
    pub fn new(table: FormatTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &FormatTable {
        &self.table
    }

    /// Full invocation for `request`, executable included.
    pub fn build_command(&self, binary_path: &str, request: &ConversionRequest) -> MediaCommand {
        let input_kind = self.table.classify_path(&request.input);
        let output_ext = extension_of(&request.output);
        let quality = request.quality;

        let mut cmd = MediaCommand::new(binary_path, format!("Convert to {}", output_ext))
            .input(&request.input);

        match input_kind {
            MediaKind::Video => {
                let video_codec = request
                    .video_codec
                    .as_deref()
                    .or_else(|| default_video_codec(&output_ext));
                if let Some(codec) = video_codec {
                    cmd = cmd.video_codec(codec);
                }

                let audio_codec = request
                    .audio_codec
                    .as_deref()
                    .unwrap_or_else(|| default_video_audio_codec(&output_ext));
                cmd = cmd.audio_codec(audio_codec);

                cmd = if output_ext == "webm" {
                    cmd.crf(WEBM_CRF)
                } else {
                    cmd.crf(inverse_quality(quality))
                };
            }
            MediaKind::Audio => {
                let audio_codec = request
                    .audio_codec
                    .as_deref()
                    .or_else(|| default_audio_codec(&output_ext));
                if let Some(codec) = audio_codec {
                    cmd = cmd.audio_codec(codec);
                }

                if let Some(kbps) = audio_bitrate_kbps(&output_ext, quality) {
                    cmd = cmd.audio_bitrate_kbps(kbps);
                }
            }
            MediaKind::Image => match output_ext.as_str() {
                "webp" => cmd = cmd.image_quality(quality),
                "jpg" => cmd = cmd.qscale_video(inverse_quality(quality)),
                _ => {}
            },
            MediaKind::Unknown => {}
        }

        let cmd = cmd.overwrite().output(&request.output);
        debug!("Synthesized {} command: {}", input_kind, cmd);
        cmd
    }

    /// Argument vector for `request`, executable excluded.
    pub fn build_arguments(&self, request: &ConversionRequest) -> Vec<String> {
        self.build_command("", request).args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormatConfig;

    fn synthesizer() -> CommandSynthesizer {
        CommandSynthesizer::new(FormatTable::new(&FormatConfig::default()).unwrap())
    }

    fn args(input: &str, output: &str, quality: u32) -> Vec<String> {
        synthesizer().build_arguments(&ConversionRequest::new(input, output, quality))
    }

    fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_inverse_quality_endpoints() {
        assert_eq!(inverse_quality(100), 0);
        assert_eq!(inverse_quality(1), 31);
        assert_eq!(inverse_quality(50), 16);
        assert_eq!(inverse_quality(80), 7);
    }

    #[test]
    fn test_inverse_quality_out_of_range_passes_through() {
        assert_eq!(inverse_quality(0), 31);
        assert_eq!(inverse_quality(200), -31);
    }

    #[test]
    fn test_avi_to_webm() {
        let args = args("movie.avi", "out/movie.webm", 80);
        assert_eq!(
            args,
            vec![
                "-i", "movie.avi",
                "-c:v", "libvpx-vp9",
                "-c:a", "libopus",
                "-crf", "30",
                "-y", "out/movie.webm",
            ]
        );
    }

    #[test]
    fn test_mp4_to_mp4() {
        let args = args("clip.mp4", "clip_out.mp4", 50);
        assert_eq!(flag_value(&args, "-c:v"), Some("libx264"));
        assert_eq!(flag_value(&args, "-c:a"), Some("aac"));
        assert_eq!(flag_value(&args, "-crf"), Some("16"));
    }

    #[test]
    fn test_video_codec_table() {
        assert_eq!(flag_value(&args("a.mov", "a.avi", 80), "-c:v"), Some("libxvid"));
        assert_eq!(flag_value(&args("a.mov", "a.avi", 80), "-c:a"), Some("aac"));

        // No table entry: the tool picks the video codec, audio stays aac
        let mkv = args("a.mov", "a.mkv", 80);
        assert_eq!(flag_value(&mkv, "-c:v"), None);
        assert_eq!(flag_value(&mkv, "-c:a"), Some("aac"));
        assert_eq!(flag_value(&mkv, "-crf"), Some("7"));
    }

    #[test]
    fn test_video_input_to_audio_output_uses_video_rules() {
        let args = args("talk.mp4", "talk.mp3", 80);
        assert_eq!(flag_value(&args, "-c:v"), None);
        assert_eq!(flag_value(&args, "-c:a"), Some("aac"));
        assert_eq!(flag_value(&args, "-crf"), Some("7"));
        assert_eq!(flag_value(&args, "-b:a"), None);
    }

    #[test]
    fn test_wav_to_mp3() {
        let args = args("song.wav", "song.mp3", 80);
        assert_eq!(
            args,
            vec!["-i", "song.wav", "-c:a", "libmp3lame", "-b:a", "240k", "-y", "song.mp3"]
        );
    }

    #[test]
    fn test_audio_tables() {
        let aac = args("a.flac", "a.aac", 64);
        assert_eq!(flag_value(&aac, "-c:a"), Some("aac"));
        assert_eq!(flag_value(&aac, "-b:a"), Some("128k"));

        let ogg = args("a.flac", "a.ogg", 64);
        assert_eq!(flag_value(&ogg, "-c:a"), Some("libvorbis"));
        assert_eq!(flag_value(&ogg, "-b:a"), None);

        let opus = args("a.m4a", "a.opus", 64);
        assert_eq!(flag_value(&opus, "-c:a"), Some("libopus"));

        assert_eq!(args("a.mp3", "a.wav", 64), vec!["-i", "a.mp3", "-y", "a.wav"]);
    }

    #[test]
    fn test_image_quality() {
        assert_eq!(
            args("shot.png", "shot.webp", 75),
            vec!["-i", "shot.png", "-quality", "75", "-y", "shot.webp"]
        );
        assert_eq!(flag_value(&args("shot.bmp", "shot.jpg", 100), "-q:v"), Some("0"));
        assert_eq!(args("shot.jpg", "shot.png", 75), vec!["-i", "shot.jpg", "-y", "shot.png"]);
    }

    #[test]
    fn test_unknown_input_gets_generic_arguments() {
        assert_eq!(
            args("notes.txt", "notes.mp4", 80),
            vec!["-i", "notes.txt", "-y", "notes.mp4"]
        );
    }

    #[test]
    fn test_overrides_win() {
        let request = ConversionRequest::new("in.mkv", "out.webm", 80)
            .with_video_codec(Some("libaom-av1"))
            .with_audio_codec(Some("libvorbis"));
        let args = synthesizer().build_arguments(&request);
        assert_eq!(flag_value(&args, "-c:v"), Some("libaom-av1"));
        assert_eq!(flag_value(&args, "-c:a"), Some("libvorbis"));
        assert_eq!(flag_value(&args, "-crf"), Some("30"));

        let request = ConversionRequest::new("in.wav", "out.flac", 80)
            .with_audio_codec(Some("flac"));
        assert_eq!(
            synthesizer().build_arguments(&request),
            vec!["-i", "in.wav", "-c:a", "flac", "-y", "out.flac"]
        );
    }

    #[test]
    fn test_extensions_are_case_insensitive() {
        let args = args("MOVIE.AVI", "MOVIE.WEBM", 80);
        assert_eq!(flag_value(&args, "-c:v"), Some("libvpx-vp9"));
    }

    #[test]
    fn test_build_is_idempotent() {
        let synthesizer = synthesizer();
        let request = ConversionRequest::new("clip.mov", "clip.mp4", 42);
        assert_eq!(
            synthesizer.build_arguments(&request),
            synthesizer.build_arguments(&request)
        );
    }

    #[test]
    fn test_build_command_includes_binary() {
        let request = ConversionRequest::new("a.wav", "b.mp3", 10);
        let cmd = synthesizer().build_command("/opt/ffmpeg", &request);
        assert_eq!(cmd.binary_path, "/opt/ffmpeg");
        assert_eq!(cmd.args.first().map(String::as_str), Some("-i"));
        assert_eq!(cmd.args.last().map(String::as_str), Some("b.mp3"));
    }
}
