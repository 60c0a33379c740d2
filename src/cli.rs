use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert the images and videos of a directory (images to webp, videos to webm)
    Convert {
        /// Directory containing the media files
        input_dir: PathBuf,

        /// Output directory (defaults to the input directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Quality 1-100
        #[arg(short, long, default_value_t = 80)]
        quality: u32,

        /// Only convert images
        #[arg(long, conflicts_with = "videos_only")]
        images_only: bool,

        /// Only convert videos
        #[arg(long)]
        videos_only: bool,

        /// Video codec override
        #[arg(long)]
        video_codec: Option<String>,

        /// Audio codec override
        #[arg(long)]
        audio_codec: Option<String>,
    },

    /// Convert an explicit list of files, choosing the output format per file
    Files {
        /// Input files
        paths: Vec<PathBuf>,

        /// Drag-and-drop text to take additional paths from
        #[arg(long)]
        dropped: Option<String>,

        /// Output format of one item, as INDEX=FORMAT (repeatable)
        #[arg(short, long = "format", value_parser = parse_selection)]
        formats: Vec<(usize, String)>,

        /// Output directory (defaults to the directory of the first file)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Quality 1-100 (defaults to the configured quality)
        #[arg(short, long)]
        quality: Option<u32>,
    },

    /// Print stream and container metadata of a media file
    Info {
        /// Media file to inspect
        file: PathBuf,
    },

    /// Report which ffmpeg would be used and whether it runs
    Check,

    /// Download a prebuilt ffmpeg into ./bin
    Install,

    /// List supported input extensions and output formats
    Formats,
}

/// Parse an `INDEX=FORMAT` selection
pub fn parse_selection(value: &str) -> Result<(usize, String), String> {
    let (index, format) = value
        .split_once('=')
        .ok_or_else(|| format!("expected INDEX=FORMAT, got '{}'", value))?;
    let index = index
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid index '{}': {}", index, e))?;
    let format = format.trim().trim_start_matches('.').to_lowercase();
    if format.is_empty() {
        return Err(format!("missing format in '{}'", value));
    }
    Ok((index, format))
}
