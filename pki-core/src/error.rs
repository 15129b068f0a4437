use thiserror::Error;

#[derive(Error, Debug)]
pub enum PkiError {
    #[error("Launch error: {0}")]
    LaunchError(String),

    #[error("Timeout error: {command} did not exit within {seconds:.1}s")]
    TimeoutError { command: String, seconds: f64 },

    #[error("Snapshot error: {0}")]
    SnapshotError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request rejected: {0}")]
    RequestRejected(String),
}

pub type Result<T> = std::result::Result<T, PkiError>;
