use std::fmt;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, ConvertError};

/// One tool invocation: program, argument vector, and a label for the logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

/// Exit status and captured streams of a finished tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl MediaCommand {
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// `-i <path>`
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Output path, positional; must come last
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// `-y`
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Constant rate factor
    pub fn crf(self, value: i64) -> Self {
        self.arg("-crf").arg(value.to_string())
    }

    /// Audio bitrate in kbit/s
    pub fn audio_bitrate_kbps(self, kbps: u32) -> Self {
        self.arg("-b:a").arg(format!("{}k", kbps))
    }

    /// Encoder quality for image encoders that take a 0-100 scale (webp)
    pub fn image_quality(self, value: u32) -> Self {
        self.arg("-quality").arg(value.to_string())
    }

    /// Fixed quantizer scale for video/mjpeg encoders
    pub fn qscale_video(self, value: i64) -> Self {
        self.arg("-q:v").arg(value.to_string())
    }

    /// Execute the command, capturing both output streams.
    ///
    /// A non-zero exit is reported through [`ToolOutput::code`], not as an
    /// error; only a failure to launch the process is an `Err`.
    pub async fn execute(&self) -> Result<ToolOutput> {
        debug!("Executing {}: {}", self.description, self);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ConvertError::Media(format!(
                "Failed to execute {}: {}",
                self.binary_path, e
            )))?;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

impl fmt::Display for MediaCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.binary_path)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Builder for the auxiliary invocations of a located tool
pub struct MediaCommandBuilder {
    binary_path: String,
}

impl MediaCommandBuilder {
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// `<binary> -version`, used as the liveness probe
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check")
            .arg("-version")
    }

    /// Build a JSON stream/format query for the inspection tool
    pub fn probe_json<P: AsRef<Path>>(&self, path: P) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Media probe")
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .output(path)
    }
}
