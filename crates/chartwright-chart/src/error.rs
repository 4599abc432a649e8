//! Chart error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Chart not found: {path}")]
    ChartNotFound { path: PathBuf },

    #[error("Invalid chart: {message}")]
    InvalidChart { message: String },

    #[error("Document {index} ({document}) has no kind")]
    MissingKind { index: usize, document: String },

    #[error("Lint failed for chart {chart}: {errors} error(s), {warnings} warning(s)")]
    LintFailed {
        chart: String,
        errors: usize,
        warnings: usize,
    },

    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] semver::Error),

    #[error(transparent)]
    Core(#[from] chartwright_core::CoreError),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, ChartError>;
