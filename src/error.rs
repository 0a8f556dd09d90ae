use std::path::PathBuf;

use thiserror::Error;

/// Main error type for header-split operations
#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file exists but could not be read (permissions, is a directory, ...)
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File is not valid UTF-8: {}", path.display())]
    Decode { path: PathBuf },

    #[error("VCS command `{command}` failed: {message}")]
    Vcs { command: String, message: String },

    #[error("VCS command `{command}` timed out after {seconds}s")]
    VcsTimeout { command: String, seconds: u64 },

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("File system walk error: {0}")]
    Walk(String),

    #[error("Invalid date: {0}")]
    Date(String),
}

pub type Result<T> = std::result::Result<T, SplitError>;
