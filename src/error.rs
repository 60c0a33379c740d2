use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Conversion tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Installation error: {0}")]
    Install(String),
}

pub type Result<T> = std::result::Result<T, ConvertError>;
