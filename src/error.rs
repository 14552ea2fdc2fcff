//! Error types for diffscribe modules using thiserror.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading and validating settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Missing required setting(s): {}. Set them in .diffscribe.toml or via DIFFSCRIBE_* environment variables",
        .0.join(", ")
    )]
    Missing(Vec<&'static str>),

    #[error("The prompt setting must contain the {{diff}} placeholder")]
    MissingDiffPlaceholder,

    #[error("Failed to read config file {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors from a single generation request.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Generation server unreachable at {url}. Is it running?")]
    ConnectionRefused { url: String },

    #[error("Generation server returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Stream from generation server failed: {0}")]
    StreamTransport(String),

    #[error("Generation server reported an error: {0}")]
    Endpoint(String),

    #[error("Generation server sent a malformed record: {line}")]
    MalformedRecord { line: String },

    #[error("The generated commit message was empty")]
    EmptyMessage,

    #[error("Generation request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Invalid generation request: {0}")]
    InvalidRequest(String),
}

/// Errors from source control operations.
#[derive(Error, Debug)]
pub enum ScmError {
    #[error("Failed to open repository: {0}")]
    OpenRepository(#[source] git2::Error),

    #[error("Failed to collect diff: {0}")]
    DiffFailed(#[source] git2::Error),

    #[error("Failed to write commit message to {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create commit: {0}")]
    CommitFailed(#[source] git2::Error),

    #[error("Git config error (missing user.name or user.email): {0}")]
    ConfigError(#[source] git2::Error),
}
