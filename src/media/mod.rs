// External tool plumbing
//
// - commands: command representation, builder and execution
// - synthesizer: request -> ffmpeg argument vector
// - locator: which ffmpeg binary to run
// - processor: the ffmpeg-backed ToolRunner
// - probe: ffprobe JSON metadata

pub mod commands;
pub mod locator;
pub mod probe;
pub mod processor;
pub mod synthesizer;

use async_trait::async_trait;

pub use commands::*;
pub use locator::*;
pub use probe::*;
pub use processor::*;
pub use synthesizer::*;

use crate::error::Result;

/// Seam between the batch runner and the process that does the work
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Executable handed to the synthesizer for each conversion
    fn binary_path(&self) -> String;

    /// Lightweight liveness check. Must return false rather than fail.
    async fn is_available(&self) -> bool;

    /// Run one command to completion. `Err` only when it could not be launched.
    async fn execute(&self, command: &MediaCommand) -> Result<ToolOutput>;
}
