//! CLI error types with exit code handling
//!
//! Library errors are folded into one diagnostic type here; only the CLI
//! decides which exit code a failure maps to.

use chartwright_chart::ChartError;
use chartwright_core::CoreError;
use chartwright_engine::RuleError;
use chartwright_repo::RepoError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Configuration could not be loaded or is incomplete
    #[error("Configuration error: {message}")]
    #[diagnostic(code(chartwright::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Chart loading, synthesis or packaging failed
    #[error("Chart error: {message}")]
    #[diagnostic(code(chartwright::cli::chart))]
    Chart {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Linting failed with errors
    #[error("Linting failed with {errors} error(s) and {warnings} warning(s)")]
    #[diagnostic(code(chartwright::cli::lint))]
    LintFailed { errors: usize, warnings: usize },

    /// A git operation failed
    #[error("Git error: {message}")]
    #[diagnostic(code(chartwright::cli::git))]
    Git { message: String },

    /// GitHub or registry request failed
    #[error("Remote error: {message}")]
    #[diagnostic(code(chartwright::cli::remote))]
    Remote {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(chartwright::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(chartwright::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Chart { .. } => exit_codes::CHART_ERROR,
            CliError::LintFailed { .. } => exit_codes::CHART_ERROR,
            CliError::Git { .. } => exit_codes::GIT_ERROR,
            CliError::Remote { .. } => exit_codes::ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn chart(message: impl Into<String>) -> Self {
        Self::Chart {
            message: message.into(),
            help: None,
        }
    }

    pub fn lint_failed(errors: usize, warnings: usize) -> Self {
        Self::LintFailed { errors, warnings }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io(e) => e.into(),
            CoreError::InvalidConfig { message } => CliError::config(message),
            CoreError::ConfigNotFound { .. } => CliError::config_with_help(
                err.to_string(),
                "pass an existing file to --config, or omit it to use config.yaml",
            ),
            other => CliError::config(other.to_string()),
        }
    }
}

impl From<RuleError> for CliError {
    fn from(err: RuleError) -> Self {
        CliError::config(err.to_string())
    }
}

impl From<ChartError> for CliError {
    fn from(err: ChartError) -> Self {
        match err {
            ChartError::LintFailed {
                errors, warnings, ..
            } => CliError::lint_failed(errors, warnings),
            ChartError::Io(e) => e.into(),
            ChartError::Core(e) => e.into(),
            other => CliError::chart(other.to_string()),
        }
    }
}

impl From<RepoError> for CliError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::RepoNotFound { .. }
            | RepoError::RemoteNotFound { .. }
            | RepoError::InvalidBranch { .. }
            | RepoError::GitCommandFailed { .. } => CliError::Git {
                message: err.to_string(),
            },
            RepoError::AuthRequired { .. } => CliError::Remote {
                message: err.to_string(),
                help: Some("set pr.authToken, --auth-token or GITHUB_TOKEN".to_string()),
            },
            RepoError::VersionExists { .. } => CliError::Remote {
                message: err.to_string(),
                help: Some("bump the chart version before publishing".to_string()),
            },
            RepoError::Io(e) => e.into(),
            RepoError::Core(e) => e.into(),
            RepoError::Chart(e) => e.into(),
            other => CliError::Remote {
                message: other.to_string(),
                help: None,
            },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
