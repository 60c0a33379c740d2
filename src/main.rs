//! mediaconv - batch media conversion on top of ffmpeg
//!
//! Entry point: parses the command line, sets up logging and configuration,
//! then collects a work list and drives the batch runner with a progress bar.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::{non_blocking, rolling};

use mediaconv::batch::{BatchEvent, BatchOptions, BatchRunner, BatchState};
use mediaconv::cli::{Args, Commands};
use mediaconv::config::Config;
use mediaconv::error::ConvertError;
use mediaconv::formats::{FormatTable, MediaKind};
use mediaconv::media::{CommandSynthesizer, FfmpegRunner, MediaProbe, ToolLocator, ToolRunner};
use mediaconv::setup::Installer;
use mediaconv::worklist::{discover, parse_dropped_paths, DropPlatform, WorkList};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    let config = load_config(args.config.as_deref())?;
    let table = FormatTable::new(&config.formats)?;

    match args.command {
        Commands::Convert { input_dir, output_dir, quality, images_only, videos_only, video_codec, audio_codec } => {
            if !input_dir.is_dir() {
                error!("Directory '{}' does not exist", input_dir.display());
                std::process::exit(1);
            }

            let kinds = if images_only {
                vec![MediaKind::Image]
            } else if videos_only {
                vec![MediaKind::Video]
            } else {
                vec![MediaKind::Image, MediaKind::Video]
            };

            info!("Scanning {} for {:?} files", input_dir.display(), kinds);
            let list = WorkList::from_files(discover(&input_dir, &kinds, &table)?);

            let mut options = BatchOptions::new(output_dir.unwrap_or_else(|| input_dir.clone()), quality);
            options.video_codec = video_codec.or_else(|| config.conversion.video_codec.clone());
            options.audio_codec = audio_codec.or_else(|| config.conversion.audio_codec.clone());

            run_batch(&config, table, list, options).await?;
        }
        Commands::Files { paths, dropped, formats, output_dir, quality } => {
            let mut list = WorkList::from_files(paths);
            if let Some(data) = dropped {
                for path in parse_dropped_paths(&data, &table, DropPlatform::current()) {
                    list.push(path);
                }
            }
            for (index, format) in formats {
                list.select(index, format)?;
            }

            let output_dir = output_dir.unwrap_or_else(|| default_output_dir(list.files()));
            let mut options = BatchOptions::new(output_dir, quality.unwrap_or(config.conversion.quality));
            options.video_codec = config.conversion.video_codec.clone();
            options.audio_codec = config.conversion.audio_codec.clone();

            run_batch(&config, table, list, options).await?;
        }
        Commands::Info { file } => {
            if !file.exists() {
                return Err(ConvertError::FileNotFound(file.display().to_string()).into());
            }
            let location = ToolLocator::new(config.tool.clone()).locate();
            let probe = MediaProbe::new(location.probe.clone());
            let metadata = probe.probe(&file).await;
            if metadata.is_empty() {
                warn!("No metadata available for {} (is {} installed?)", file.display(), location.probe);
            }
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        Commands::Check => {
            let location = ToolLocator::new(config.tool.clone()).locate();
            println!("ffmpeg:  {} ({:?})", location.executable, location.source);
            println!("ffprobe: {}", location.probe);
            match location.version().await {
                Some(version) => println!("Status:  available, {}", version),
                None => println!("Status:  not available (run `mediaconv install` or put ffmpeg on PATH)"),
            }
        }
        Commands::Install => {
            let installer = Installer::new(config.install.clone())?;
            info!("Installing ffmpeg from {}", installer.download_url()?);
            let outcome = installer.install().await?;
            println!("ffmpeg installed in {}", outcome.install_dir.display());
            println!("Executable: {}", outcome.executable.display());
            println!("Wrapper:    {}", outcome.wrapper.display());
        }
        Commands::Formats => {
            for kind in [MediaKind::Video, MediaKind::Audio, MediaKind::Image, MediaKind::Unknown] {
                println!("{}:", kind);
                if kind != MediaKind::Unknown {
                    println!("  inputs:  {}", table.extensions(kind).join(", "));
                }
                println!("  outputs: {}", table.targets(kind).join(", "));
                println!("  default: {}", table.default_target(kind));
            }
        }
    }

    Ok(())
}

/// Load configuration: `--config`, else ./config.toml, else defaults
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };
    Ok(config)
}

/// Directory of the first file, or the working directory
fn default_output_dir(files: &[PathBuf]) -> PathBuf {
    files
        .first()
        .and_then(|f| f.parent())
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Run a batch on a spawned task, rendering its progress until it finishes
async fn run_batch(config: &Config, table: FormatTable, list: WorkList, options: BatchOptions) -> Result<()> {
    let items = list.items(&table);
    if items.is_empty() {
        println!("No files to convert.");
        return Ok(());
    }
    let total = items.len();

    let location = ToolLocator::new(config.tool.clone()).locate();
    let tool: Arc<dyn ToolRunner> = Arc::new(FfmpegRunner::new(location));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let runner = BatchRunner::new(tool, CommandSynthesizer::new(table), options).with_progress(tx);

    let cancel = runner.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current file");
            cancel.cancel();
        }
    });

    // The runner owns the sender, so the event stream ends when the task does
    let task = tokio::spawn(async move { runner.run(items).await });

    let pb = ProgressBar::new(total as u64);
    pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
        .progress_chars("#>-"));

    while let Some(event) = rx.recv().await {
        match event {
            BatchEvent::Started { .. } => {}
            BatchEvent::ItemStarted { input, .. } => {
                let name = input.file_name().unwrap_or(input.as_os_str()).to_string_lossy().to_string();
                pb.set_message(name);
            }
            BatchEvent::ItemFinished { outcome, processed, .. } => {
                pb.set_position(processed as u64);
                if outcome.success {
                    let saved = outcome
                        .compression_percent()
                        .map(|p| format!(" ({:.1}% smaller)", p))
                        .unwrap_or_default();
                    pb.println(format!("Converted: {} -> {}{}", outcome.input.display(), outcome.output.display(), saved));
                } else {
                    pb.println(format!(
                        "Failed: {}: {}",
                        outcome.input.display(),
                        outcome.diagnostic.as_deref().unwrap_or("unknown error")
                    ));
                }
            }
            BatchEvent::Finished { .. } => pb.finish_and_clear(),
        }
    }

    let report = match task.await? {
        Ok(report) => report,
        Err(ConvertError::ToolUnavailable(binary)) => {
            pb.abandon();
            return Err(anyhow::anyhow!(
                "ffmpeg is not available ({}). Put it on PATH or run `mediaconv install`",
                binary
            ));
        }
        Err(e) => return Err(e.into()),
    };

    if report.state == BatchState::Cancelled {
        println!("Cancelled after {} of {} file(s)", report.summary.processed(), total);
    }
    println!(
        "Conversion complete! Successful: {}, Failed: {}",
        report.summary.successful, report.summary.failed
    );

    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".mediaconv").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "mediaconv.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("mediaconv.log").display());

    Ok(())
}
