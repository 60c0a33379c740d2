//! Sequential batch conversion.
//!
//! Items run strictly one at a time, in order. Cancellation is checked
//! before each item starts; a launched conversion always runs to completion.
//! There is no per-item timeout, so a hung ffmpeg blocks the batch.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use crate::error::{Result, ConvertError};
use crate::media::{CommandSynthesizer, ConversionRequest, ToolRunner};

/// One input file and the output format requested for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItem {
    pub input: PathBuf,
    pub format: String,
}

impl BatchItem {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(input: P, format: S) -> Self {
        Self {
            input: input.into(),
            format: format.into(),
        }
    }
}

/// Result of one conversion attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionOutcome {
    /// Position of the item in the batch
    pub index: usize,
    pub input: PathBuf,
    pub output: PathBuf,
    pub success: bool,
    /// Captured stderr (or launch error) of a failed conversion
    pub diagnostic: Option<String>,
    pub input_bytes: Option<u64>,
    pub output_bytes: Option<u64>,
    pub finished_at: DateTime<Utc>,
}

impl ConversionOutcome {
    /// Size reduction in percent, when both sizes are known
    pub fn compression_percent(&self) -> Option<f64> {
        match (self.input_bytes, self.output_bytes) {
            (Some(input), Some(output)) if input > 0 => {
                Some((1.0 - output as f64 / input as f64) * 100.0)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub successful: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.successful + self.failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl BatchState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => BatchState::Running,
            2 => BatchState::Completed,
            3 => BatchState::Cancelled,
            _ => BatchState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            BatchState::Idle => 0,
            BatchState::Running => 1,
            BatchState::Completed => 2,
            BatchState::Cancelled => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub state: BatchState,
    pub summary: BatchSummary,
    /// One entry per processed item, in input order
    pub outcomes: Vec<ConversionOutcome>,
}

/// Progress notifications sent while a batch runs
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Started {
        total: usize,
    },
    ItemStarted {
        index: usize,
        total: usize,
        input: PathBuf,
        output: PathBuf,
    },
    ItemFinished {
        outcome: ConversionOutcome,
        processed: usize,
        total: usize,
        /// processed / total, never decreasing
        fraction: f64,
    },
    Finished {
        state: BatchState,
        summary: BatchSummary,
    },
}

/// Cooperative stop signal shared with the foreground
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub output_dir: PathBuf,
    pub quality: u32,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
}

impl BatchOptions {
    pub fn new<P: Into<PathBuf>>(output_dir: P, quality: u32) -> Self {
        Self {
            output_dir: output_dir.into(),
            quality,
            video_codec: None,
            audio_codec: None,
        }
    }
}

/// Runs one batch of conversions
pub struct BatchRunner {
    tool: Arc<dyn ToolRunner>,
    synthesizer: CommandSynthesizer,
    options: BatchOptions,
    cancel: CancelHandle,
    events: Option<UnboundedSender<BatchEvent>>,
    state: AtomicU8,
}

impl BatchRunner {
    pub fn new(tool: Arc<dyn ToolRunner>, synthesizer: CommandSynthesizer, options: BatchOptions) -> Self {
        Self {
            tool,
            synthesizer,
            options,
            cancel: CancelHandle::new(),
            events: None,
            state: AtomicU8::new(BatchState::Idle.as_u8()),
        }
    }

    /// Send progress events to `sender` while running
    pub fn with_progress(mut self, sender: UnboundedSender<BatchEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Handle the foreground uses to stop the batch between items
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn state(&self) -> BatchState {
        BatchState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: BatchState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(sender) = &self.events {
            // A dropped receiver only means nobody is watching
            let _ = sender.send(event);
        }
    }

    /// `<output_dir>/<input stem>.<format>`
    pub fn output_path(&self, item: &BatchItem) -> PathBuf {
        let stem = item
            .input
            .file_stem()
            .unwrap_or_else(|| item.input.as_os_str())
            .to_string_lossy();
        self.options
            .output_dir
            .join(format!("{}.{}", stem, item.format.trim_start_matches('.')))
    }

    /// Convert every item in order.
    ///
    /// Fails only when the tool is unavailable or the output directory cannot
    /// be created; both are checked before any item runs. Per-item failures
    /// are recorded in the report.
    pub async fn run(&self, items: Vec<BatchItem>) -> Result<BatchReport> {
        let binary = self.tool.binary_path();
        if !self.tool.is_available().await {
            error!("Conversion tool is not available: {}", binary);
            return Err(ConvertError::ToolUnavailable(binary));
        }

        fs::create_dir_all(&self.options.output_dir).await?;

        let total = items.len();
        info!(
            "Starting batch of {} item(s) into {}",
            total,
            self.options.output_dir.display()
        );
        self.set_state(BatchState::Running);
        self.emit(BatchEvent::Started { total });

        let mut summary = BatchSummary::default();
        let mut outcomes = Vec::with_capacity(total);
        let mut state = BatchState::Completed;

        for (index, item) in items.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("Batch cancelled after {} of {} item(s)", index, total);
                state = BatchState::Cancelled;
                break;
            }

            let output = self.output_path(item);
            self.emit(BatchEvent::ItemStarted {
                index,
                total,
                input: item.input.clone(),
                output: output.clone(),
            });

            let outcome = self.convert_one(index, &binary, &item.input, output).await;
            if outcome.success {
                summary.successful += 1;
            } else {
                summary.failed += 1;
            }

            let processed = index + 1;
            self.emit(BatchEvent::ItemFinished {
                outcome: outcome.clone(),
                processed,
                total,
                fraction: processed as f64 / total as f64,
            });
            outcomes.push(outcome);
        }

        self.set_state(state);
        info!(
            "Batch {:?}: {} converted, {} failed, {} processed",
            state,
            summary.successful,
            summary.failed,
            summary.processed()
        );
        self.emit(BatchEvent::Finished { state, summary });

        Ok(BatchReport {
            state,
            summary,
            outcomes,
        })
    }

    async fn convert_one(
        &self,
        index: usize,
        binary: &str,
        input: &Path,
        output: PathBuf,
    ) -> ConversionOutcome {
        let request = ConversionRequest::new(input, &output, self.options.quality)
            .with_video_codec(self.options.video_codec.clone())
            .with_audio_codec(self.options.audio_codec.clone());
        let command = self.synthesizer.build_command(binary, &request);

        info!("Converting {} -> {}", input.display(), output.display());

        let diagnostic = match self.tool.execute(&command).await {
            Ok(result) if result.success() => None,
            Ok(result) => {
                let stderr = result.stderr.trim();
                Some(if stderr.is_empty() {
                    format!("exited with status {:?}", result.code)
                } else {
                    stderr.to_string()
                })
            }
            Err(e) => Some(e.to_string()),
        };

        let input_bytes = fs::metadata(input).await.ok().map(|m| m.len());
        let output_bytes = if diagnostic.is_none() {
            fs::metadata(&output).await.ok().map(|m| m.len())
        } else {
            None
        };

        match &diagnostic {
            None => info!("Converted {} -> {}", input.display(), output.display()),
            Some(text) => warn!("Failed to convert {}: {}", input.display(), text),
        }

        ConversionOutcome {
            index,
            input: input.to_path_buf(),
            output,
            success: diagnostic.is_none(),
            diagnostic,
            input_bytes,
            output_bytes,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormatConfig;
    use crate::formats::FormatTable;
    use crate::media::{MediaCommand, MockToolRunner, ToolOutput};
    use tokio::sync::mpsc;

    fn synthesizer() -> CommandSynthesizer {
        CommandSynthesizer::new(FormatTable::new(&FormatConfig::default()).unwrap())
    }

    fn ok() -> ToolOutput {
        ToolOutput {
            code: Some(0),
            ..ToolOutput::default()
        }
    }

    fn available_mock() -> MockToolRunner {
        let mut mock = MockToolRunner::new();
        mock.expect_binary_path().return_const("ffmpeg".to_string());
        mock.expect_is_available().returning(|| true);
        mock
    }

    fn items(names: &[&str]) -> Vec<BatchItem> {
        names.iter().map(|n| BatchItem::new(*n, "mp3")).collect()
    }

    fn input_of(command: &MediaCommand) -> String {
        command.args[1].clone()
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = available_mock();
        mock.expect_execute().times(3).returning(|command| {
            if input_of(command) == "two.wav" {
                Ok(ToolOutput {
                    code: Some(1),
                    stdout: String::new(),
                    stderr: "Invalid data found when processing input\n".to_string(),
                })
            } else {
                Ok(ok())
            }
        });

        let runner = BatchRunner::new(Arc::new(mock), synthesizer(), BatchOptions::new(dir.path(), 80));
        let report = runner.run(items(&["one.wav", "two.wav", "three.wav"])).await.unwrap();

        assert_eq!(report.state, BatchState::Completed);
        assert_eq!(report.summary, BatchSummary { successful: 2, failed: 1 });
        assert_eq!(report.outcomes.len(), 3);

        let successes: Vec<bool> = report.outcomes.iter().map(|o| o.success).collect();
        assert_eq!(successes, vec![true, false, true]);
        let indexes: Vec<usize> = report.outcomes.iter().map(|o| o.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(
            report.outcomes[1].diagnostic.as_deref(),
            Some("Invalid data found when processing input")
        );
        assert_eq!(report.outcomes[2].output, dir.path().join("three.mp3"));
        assert_eq!(runner.state(), BatchState::Completed);
    }

    #[tokio::test]
    async fn test_unavailable_tool_aborts_before_any_item() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("out");

        let mut mock = MockToolRunner::new();
        mock.expect_binary_path().return_const("ffmpeg".to_string());
        mock.expect_is_available().returning(|| false);
        mock.expect_execute().times(0);

        let runner = BatchRunner::new(Arc::new(mock), synthesizer(), BatchOptions::new(&output_dir, 80));
        let err = runner.run(items(&["a.wav", "b.wav"])).await.unwrap_err();

        assert!(matches!(err, ConvertError::ToolUnavailable(_)));
        assert!(!output_dir.exists());
        assert_eq!(runner.state(), BatchState::Idle);
    }

    #[tokio::test]
    async fn test_cancel_during_item_finishes_that_item_only() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancelHandle::new();

        let mut mock = available_mock();
        let flag = cancel.clone();
        mock.expect_execute().times(2).returning(move |command| {
            if input_of(command) == "b.wav" {
                flag.cancel();
            }
            Ok(ok())
        });

        let mut runner = BatchRunner::new(Arc::new(mock), synthesizer(), BatchOptions::new(dir.path(), 80));
        runner.cancel = cancel;
        let report = runner.run(items(&["a.wav", "b.wav", "c.wav", "d.wav"])).await.unwrap();

        assert_eq!(report.state, BatchState::Cancelled);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.summary, BatchSummary { successful: 2, failed: 0 });
        assert_eq!(report.outcomes[1].input, PathBuf::from("b.wav"));
    }

    #[tokio::test]
    async fn test_cancel_before_start_processes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = available_mock();
        mock.expect_execute().times(0);

        let runner = BatchRunner::new(Arc::new(mock), synthesizer(), BatchOptions::new(dir.path(), 80));
        runner.cancel_handle().cancel();
        let report = runner.run(items(&["a.wav"])).await.unwrap();

        assert_eq!(report.state, BatchState::Cancelled);
        assert!(report.outcomes.is_empty());
        assert_eq!(report.summary.processed(), 0);
    }

    #[tokio::test]
    async fn test_launch_failure_is_item_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = available_mock();
        mock.expect_execute()
            .returning(|_| Err(ConvertError::Media("Failed to execute ffmpeg: not found".to_string())));

        let runner = BatchRunner::new(Arc::new(mock), synthesizer(), BatchOptions::new(dir.path(), 80));
        let report = runner.run(items(&["a.wav", "b.wav"])).await.unwrap();

        assert_eq!(report.summary, BatchSummary { successful: 0, failed: 2 });
        assert!(report.outcomes[0]
            .diagnostic
            .as_deref()
            .unwrap()
            .contains("not found"));
    }

    #[tokio::test]
    async fn test_commands_carry_options() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().to_path_buf();
        let mut mock = available_mock();
        mock.expect_execute().times(1).returning(move |command| {
            assert_eq!(command.binary_path, "ffmpeg");
            assert_eq!(
                command.args,
                vec![
                    "-i".to_string(),
                    "clips/movie.avi".to_string(),
                    "-c:v".to_string(),
                    "libx265".to_string(),
                    "-c:a".to_string(),
                    "aac".to_string(),
                    "-crf".to_string(),
                    "16".to_string(),
                    "-y".to_string(),
                    out.join("movie.mp4").to_string_lossy().to_string(),
                ]
            );
            Ok(ok())
        });

        let mut options = BatchOptions::new(dir.path(), 50);
        options.video_codec = Some("libx265".to_string());
        let runner = BatchRunner::new(Arc::new(mock), synthesizer(), options);
        let report = runner
            .run(vec![BatchItem::new("clips/movie.avi", "mp4")])
            .await
            .unwrap();
        assert_eq!(report.summary.successful, 1);
    }

    #[tokio::test]
    async fn test_progress_events() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = available_mock();
        mock.expect_execute().returning(|_| Ok(ok()));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let runner = BatchRunner::new(Arc::new(mock), synthesizer(), BatchOptions::new(dir.path(), 80))
            .with_progress(tx);
        runner.run(items(&["a.wav", "b.wav", "c.wav"])).await.unwrap();
        drop(runner);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(events.first(), Some(&BatchEvent::Started { total: 3 }));
        let fractions: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                BatchEvent::ItemFinished { fraction, .. } => Some(*fraction),
                _ => None,
            })
            .collect();
        assert_eq!(fractions.len(), 3);
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(fractions.last(), Some(&1.0));
        assert!(matches!(
            events.last(),
            Some(BatchEvent::Finished { state: BatchState::Completed, .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_batch_completes() {
        let dir = tempfile::tempdir().unwrap();
        let mock = available_mock();
        let runner = BatchRunner::new(Arc::new(mock), synthesizer(), BatchOptions::new(dir.path(), 80));
        let report = runner.run(Vec::new()).await.unwrap();
        assert_eq!(report.state, BatchState::Completed);
        assert!(report.outcomes.is_empty());
    }

    #[test]
    fn test_output_path_uses_stem_and_format() {
        let runner = BatchRunner::new(
            Arc::new(MockToolRunner::new()),
            synthesizer(),
            BatchOptions::new("/out", 80),
        );
        assert_eq!(
            runner.output_path(&BatchItem::new("/in/holiday.clip.MOV", ".webm")),
            PathBuf::from("/out/holiday.clip.webm")
        );
    }

    #[test]
    fn test_compression_percent() {
        let outcome = ConversionOutcome {
            index: 0,
            input: PathBuf::from("a.png"),
            output: PathBuf::from("a.webp"),
            success: true,
            diagnostic: None,
            input_bytes: Some(1000),
            output_bytes: Some(250),
            finished_at: Utc::now(),
        };
        assert_eq!(outcome.compression_percent(), Some(75.0));
    }
}
