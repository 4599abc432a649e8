//! Chartwright Chart - Helm chart backend
//!
//! This crate writes parametrized manifest sets to disk as Helm charts:
//! - `templates`: one template file per kind, placeholders unquoted
//! - `ChartSynthesizer`: chart and CRD chart creation, values, lint gate
//! - `Linter`: static checks against a target Kubernetes version
//! - `archive`: reproducible `.tgz` packaging

pub mod archive;
pub mod chart;
pub mod error;
pub mod lint;
pub mod synthesizer;
pub mod templates;

pub use archive::{archive_name, list_archive, package_chart, read_chart_metadata};
pub use chart::{ChartMetadata, ChartVersions, LoadedChart, Maintainer, peek_versions};
pub use error::{ChartError, Result};
pub use lint::{LintFinding, LintReport, LintSeverity, Linter};
pub use synthesizer::{ChartHandle, ChartSynthesizer, SynthesizedPackage};
pub use templates::render_templates;
