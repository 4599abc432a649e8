//! Error types for remote operations

use thiserror::Error;

/// Errors from GitHub, OCI registries and git
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Network Errors ============
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("Authentication required for {url}")]
    AuthRequired { url: String },

    // ============ GitHub Errors ============
    #[error("No release found for {repo}")]
    ReleaseNotFound { repo: String },

    #[error("Invalid pull request: {message}")]
    InvalidReview { message: String },

    #[error("Failed to create pull request: status={status} {message}")]
    ReviewFailed { status: u16, message: String },

    // ============ OCI Errors ============
    #[error("Invalid OCI reference: {reference}")]
    InvalidOciReference { reference: String },

    #[error("OCI registry error: {message}")]
    OciError { message: String },

    #[error("OCI push failed: {message}")]
    OciPushFailed { message: String },

    #[error("Version {version} of chart {chart} already exists in the registry at {reference}")]
    VersionExists {
        chart: String,
        version: String,
        reference: String,
    },

    // ============ Git Errors ============
    #[error("Not a git repository: {path}")]
    RepoNotFound { path: String },

    #[error("Git remote '{remote}' not found")]
    RemoteNotFound { remote: String },

    #[error("Invalid branch: {message}")]
    InvalidBranch { message: String },

    #[error("git {command} failed: {stderr}")]
    GitCommandFailed { command: String, stderr: String },

    // ============ Local Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Core(#[from] chartwright_core::CoreError),

    #[error(transparent)]
    Chart(#[from] chartwright_chart::ChartError),
}

/// Result type for remote operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl From<reqwest::Error> for RepoError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RepoError::Timeout {
                operation: e.url().map(|u| u.to_string()).unwrap_or_else(|| "request".into()),
                seconds: 30,
            }
        } else if e.is_connect() {
            RepoError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else if let Some(status) = e.status() {
            RepoError::HttpError {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            RepoError::NetworkError {
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(e: serde_json::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for RepoError {
    fn from(e: url::ParseError) -> Self {
        RepoError::NetworkError {
            message: format!("Invalid URL: {}", e),
        }
    }
}
