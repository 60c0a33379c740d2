use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::Result;
use super::{MediaCommand, ToolLocation, ToolOutput, ToolRunner};

/// ffmpeg-backed tool runner
pub struct FfmpegRunner {
    location: ToolLocation,
}

impl FfmpegRunner {
    pub fn new(location: ToolLocation) -> Self {
        Self { location }
    }

    pub fn location(&self) -> &ToolLocation {
        &self.location
    }
}

#[async_trait]
impl ToolRunner for FfmpegRunner {
    fn binary_path(&self) -> String {
        self.location.executable.clone()
    }

    async fn is_available(&self) -> bool {
        let available = self.location.is_available().await;
        if available {
            info!("Media processor is available: {}", self.location.executable);
        }
        available
    }

    async fn execute(&self, command: &MediaCommand) -> Result<ToolOutput> {
        debug!("{}: {}", command.description, command);
        command.execute().await
    }
}
