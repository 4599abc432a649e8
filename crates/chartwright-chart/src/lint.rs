//! Static chart linting
//!
//! Checks the chart the way `helm lint` would for generated charts: the
//! Chart.yaml fields, the values file, and every manifest template rendered
//! against the chart's own values. Templates are rendered with a minimal
//! substitution of `.Values`, `.Release`, `.Chart` and `.Capabilities`
//! references; files using any other template action are only checked for
//! presence.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use semver::{Version, VersionReq};
use serde_json::Value as JsonValue;
use std::fmt;
use std::path::{Path, PathBuf};

use chartwright_core::Values;

use crate::chart::{
    CHART_API_VERSION, CHART_FILE, ChartMetadata, TEMPLATES_DIR, VALUES_FILE,
    is_generated_template,
};
use crate::error::{ChartError, Result};

/// Namespace substituted for `.Release.Namespace` while linting
pub const LINT_NAMESPACE: &str = "lint-namespace";

static TEMPLATE_ACTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{-?\s*(.*?)\s*-?\}\}").expect("valid action regex"));

/// Lint message severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LintSeverity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LintSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LintSeverity::Info => write!(f, "INFO"),
            LintSeverity::Warning => write!(f, "WARNING"),
            LintSeverity::Error => write!(f, "ERROR"),
        }
    }
}

/// A single lint message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintFinding {
    pub severity: LintSeverity,
    /// File the message is about, relative to the chart root
    pub path: String,
    pub message: String,
}

impl fmt::Display for LintFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.path, self.message)
    }
}

/// Result of linting one chart
#[derive(Debug, Clone, Default)]
pub struct LintReport {
    pub chart_dir: PathBuf,
    pub findings: Vec<LintFinding>,
}

impl LintReport {
    fn push(&mut self, severity: LintSeverity, path: &str, message: impl Into<String>) {
        self.findings.push(LintFinding {
            severity,
            path: path.to_string(),
            message: message.into(),
        });
    }

    /// Most severe finding, if any
    pub fn highest(&self) -> Option<LintSeverity> {
        self.findings.iter().map(|f| f.severity).max()
    }

    pub fn errors(&self) -> usize {
        self.count(LintSeverity::Error)
    }

    pub fn warnings(&self) -> usize {
        self.count(LintSeverity::Warning)
    }

    fn count(&self, severity: LintSeverity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    /// Whether any finding reaches `threshold`
    pub fn fails(&self, threshold: LintSeverity) -> bool {
        self.highest().is_some_and(|s| s >= threshold)
    }
}

/// An API version that Kubernetes deprecated or removed
struct RetiredApi {
    api_version: &'static str,
    deprecated_in: (u64, u64),
    removed_in: (u64, u64),
    replacement: &'static str,
}

const RETIRED_APIS: &[RetiredApi] = &[
    RetiredApi { api_version: "extensions/v1beta1", deprecated_in: (1, 14), removed_in: (1, 22), replacement: "apps/v1 or networking.k8s.io/v1" },
    RetiredApi { api_version: "apps/v1beta1", deprecated_in: (1, 9), removed_in: (1, 16), replacement: "apps/v1" },
    RetiredApi { api_version: "apps/v1beta2", deprecated_in: (1, 9), removed_in: (1, 16), replacement: "apps/v1" },
    RetiredApi { api_version: "policy/v1beta1", deprecated_in: (1, 21), removed_in: (1, 25), replacement: "policy/v1" },
    RetiredApi { api_version: "batch/v1beta1", deprecated_in: (1, 21), removed_in: (1, 25), replacement: "batch/v1" },
    RetiredApi { api_version: "autoscaling/v2beta1", deprecated_in: (1, 22), removed_in: (1, 25), replacement: "autoscaling/v2" },
    RetiredApi { api_version: "autoscaling/v2beta2", deprecated_in: (1, 23), removed_in: (1, 26), replacement: "autoscaling/v2" },
    RetiredApi { api_version: "networking.k8s.io/v1beta1", deprecated_in: (1, 19), removed_in: (1, 22), replacement: "networking.k8s.io/v1" },
    RetiredApi { api_version: "rbac.authorization.k8s.io/v1beta1", deprecated_in: (1, 17), removed_in: (1, 22), replacement: "rbac.authorization.k8s.io/v1" },
    RetiredApi { api_version: "apiextensions.k8s.io/v1beta1", deprecated_in: (1, 16), removed_in: (1, 22), replacement: "apiextensions.k8s.io/v1" },
    RetiredApi { api_version: "admissionregistration.k8s.io/v1beta1", deprecated_in: (1, 16), removed_in: (1, 22), replacement: "admissionregistration.k8s.io/v1" },
    RetiredApi { api_version: "scheduling.k8s.io/v1beta1", deprecated_in: (1, 14), removed_in: (1, 22), replacement: "scheduling.k8s.io/v1" },
    RetiredApi { api_version: "coordination.k8s.io/v1beta1", deprecated_in: (1, 19), removed_in: (1, 22), replacement: "coordination.k8s.io/v1" },
    RetiredApi { api_version: "certificates.k8s.io/v1beta1", deprecated_in: (1, 19), removed_in: (1, 22), replacement: "certificates.k8s.io/v1" },
    RetiredApi { api_version: "discovery.k8s.io/v1beta1", deprecated_in: (1, 21), removed_in: (1, 25), replacement: "discovery.k8s.io/v1" },
    RetiredApi { api_version: "events.k8s.io/v1beta1", deprecated_in: (1, 19), removed_in: (1, 25), replacement: "events.k8s.io/v1" },
    RetiredApi { api_version: "flowcontrol.apiserver.k8s.io/v1beta1", deprecated_in: (1, 23), removed_in: (1, 26), replacement: "flowcontrol.apiserver.k8s.io/v1" },
    RetiredApi { api_version: "flowcontrol.apiserver.k8s.io/v1beta2", deprecated_in: (1, 26), removed_in: (1, 29), replacement: "flowcontrol.apiserver.k8s.io/v1" },
    RetiredApi { api_version: "flowcontrol.apiserver.k8s.io/v1beta3", deprecated_in: (1, 29), removed_in: (1, 32), replacement: "flowcontrol.apiserver.k8s.io/v1" },
];

/// Lints charts against a target Kubernetes version
#[derive(Debug, Clone)]
pub struct Linter {
    kube_version: Version,
}

impl Linter {
    pub fn new(kube_version: Version) -> Self {
        Self { kube_version }
    }

    pub fn kube_version(&self) -> &Version {
        &self.kube_version
    }

    /// Lint the chart in `chart_dir`
    ///
    /// Only a missing directory is an `Err`; every problem with the chart's
    /// content is reported as a finding.
    pub fn lint(&self, chart_dir: &Path) -> Result<LintReport> {
        if !chart_dir.is_dir() {
            return Err(ChartError::ChartNotFound {
                path: chart_dir.to_path_buf(),
            });
        }

        tracing::info!(
            chart = %chart_dir.display(),
            kube_version = %self.kube_version,
            "linting chart"
        );

        let mut report = LintReport {
            chart_dir: chart_dir.to_path_buf(),
            findings: Vec::new(),
        };

        let Some(metadata) = self.lint_chart_file(chart_dir, &mut report) else {
            log_findings(&report);
            return Ok(report);
        };
        let values = self.lint_values(chart_dir, &mut report);
        self.lint_templates(chart_dir, &metadata, &values, &mut report)?;

        log_findings(&report);
        Ok(report)
    }

    fn lint_chart_file(&self, chart_dir: &Path, report: &mut LintReport) -> Option<ChartMetadata> {
        let metadata = match ChartMetadata::load(chart_dir) {
            Ok(m) => m,
            Err(ChartError::ChartNotFound { .. }) => {
                report.push(LintSeverity::Error, CHART_FILE, "file does not exist");
                return None;
            }
            Err(e) => {
                report.push(LintSeverity::Error, CHART_FILE, format!("unable to parse: {e}"));
                return None;
            }
        };

        if metadata.api_version.is_empty() {
            report.push(LintSeverity::Error, CHART_FILE, "apiVersion is required");
        } else if metadata.api_version == "v1" {
            report.push(
                LintSeverity::Info,
                CHART_FILE,
                format!("apiVersion v1 is legacy, use {CHART_API_VERSION}"),
            );
        } else if metadata.api_version != CHART_API_VERSION {
            report.push(
                LintSeverity::Error,
                CHART_FILE,
                format!("apiVersion '{}' is not valid", metadata.api_version),
            );
        }

        if metadata.name.is_empty() {
            report.push(LintSeverity::Error, CHART_FILE, "name is required");
        } else if let Some(dir_name) = chart_dir.file_name().and_then(|n| n.to_str())
            && dir_name != metadata.name
        {
            report.push(
                LintSeverity::Error,
                CHART_FILE,
                format!(
                    "chart name '{}' and directory name '{dir_name}' must match",
                    metadata.name
                ),
            );
        }

        if let Err(e) = metadata.semver() {
            report.push(
                LintSeverity::Error,
                CHART_FILE,
                format!("version '{}' is not a valid SemVer: {e}", metadata.version),
            );
        }

        if metadata.app_version.as_deref().is_none_or(str::is_empty) {
            report.push(LintSeverity::Warning, CHART_FILE, "appVersion is not set");
        }

        if metadata.icon.is_none() {
            report.push(LintSeverity::Info, CHART_FILE, "icon is recommended");
        }

        if let Some(constraint) = &metadata.kube_version {
            match VersionReq::parse(constraint) {
                Ok(req) if !req.matches(&self.kube_version) => report.push(
                    LintSeverity::Error,
                    CHART_FILE,
                    format!(
                        "chart requires kubeVersion '{constraint}' which is incompatible with Kubernetes v{}",
                        self.kube_version
                    ),
                ),
                Ok(_) => {}
                Err(e) => report.push(
                    LintSeverity::Warning,
                    CHART_FILE,
                    format!("kubeVersion '{constraint}' is not a valid constraint: {e}"),
                ),
            }
        }

        Some(metadata)
    }

    fn lint_values(&self, chart_dir: &Path, report: &mut LintReport) -> Values {
        let path = chart_dir.join(VALUES_FILE);
        if !path.exists() {
            report.push(LintSeverity::Info, VALUES_FILE, "file does not exist");
            return Values::new();
        }

        match Values::from_file(&path) {
            Ok(values) if values.inner().is_object() => values,
            Ok(_) => {
                report.push(LintSeverity::Error, VALUES_FILE, "values must be a mapping");
                Values::new()
            }
            Err(e) => {
                report.push(LintSeverity::Error, VALUES_FILE, format!("unable to parse: {e}"));
                Values::new()
            }
        }
    }

    fn lint_templates(
        &self,
        chart_dir: &Path,
        metadata: &ChartMetadata,
        values: &Values,
        report: &mut LintReport,
    ) -> Result<()> {
        let templates_dir = chart_dir.join(TEMPLATES_DIR);
        if !templates_dir.is_dir() {
            report.push(LintSeverity::Warning, TEMPLATES_DIR, "directory does not exist");
            return Ok(());
        }

        for entry in walkdir::WalkDir::new(&templates_dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(chart_dir)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            let is_manifest = rel.ends_with(".yaml") || rel.ends_with(".yml");
            if !is_manifest || !is_generated_template(&rel) {
                continue;
            }

            let source = std::fs::read_to_string(entry.path())?;
            self.lint_template(&rel, &source, metadata, values, report);
        }
        Ok(())
    }

    fn lint_template(
        &self,
        path: &str,
        source: &str,
        metadata: &ChartMetadata,
        values: &Values,
        report: &mut LintReport,
    ) {
        let rendered = match self.render(path, source, metadata, values, report) {
            Some(r) => r,
            None => return,
        };

        for (idx, de) in serde_yaml::Deserializer::from_str(&rendered).enumerate() {
            let doc = match <JsonValue as serde::Deserialize>::deserialize(de) {
                Ok(JsonValue::Null) => continue,
                Ok(doc) => doc,
                Err(e) => {
                    report.push(
                        LintSeverity::Error,
                        path,
                        format!("document {idx} is not valid YAML after rendering: {e}"),
                    );
                    return;
                }
            };

            let Some(map) = doc.as_object() else {
                report.push(LintSeverity::Error, path, format!("document {idx} is not a mapping"));
                continue;
            };

            let api_version = map.get("apiVersion").and_then(JsonValue::as_str);
            let kind = map.get("kind").and_then(JsonValue::as_str);
            let name = map
                .get("metadata")
                .and_then(|m| m.get("name"))
                .and_then(JsonValue::as_str);

            if api_version.is_none() {
                report.push(LintSeverity::Error, path, format!("document {idx} has no apiVersion"));
            }
            if kind.is_none() {
                report.push(LintSeverity::Error, path, format!("document {idx} has no kind"));
            }
            if name.is_none_or(str::is_empty) {
                report.push(LintSeverity::Error, path, format!("document {idx} has no metadata.name"));
            }

            if let Some(api_version) = api_version {
                self.check_api_version(path, api_version, kind.unwrap_or("<unknown>"), report);
            }
        }
    }

    /// Substitute the supported template actions, or `None` when the file uses others
    fn render(
        &self,
        path: &str,
        source: &str,
        metadata: &ChartMetadata,
        values: &Values,
        report: &mut LintReport,
    ) -> Option<String> {
        let mut unsupported = None;
        let rendered = TEMPLATE_ACTION.replace_all(source, |caps: &Captures<'_>| {
            let action = &caps[1];
            match self.resolve_action(action, metadata, values) {
                Some(Resolved::Text(text)) => text,
                Some(Resolved::MissingValue) => {
                    report.push(
                        LintSeverity::Info,
                        path,
                        format!("{action} is not set in {VALUES_FILE}"),
                    );
                    String::new()
                }
                None => {
                    unsupported.get_or_insert_with(|| action.to_string());
                    String::new()
                }
            }
        });

        if let Some(action) = unsupported {
            report.push(
                LintSeverity::Info,
                path,
                format!("template action '{action}' is not evaluated, rendering skipped"),
            );
            return None;
        }
        Some(rendered.into_owned())
    }

    fn resolve_action(
        &self,
        action: &str,
        metadata: &ChartMetadata,
        values: &Values,
    ) -> Option<Resolved> {
        if action == ".Values" {
            return Some(Resolved::Text(flow(values.inner())));
        }
        if let Some(path) = action.strip_prefix(".Values.") {
            return Some(match values.get(path) {
                Some(JsonValue::String(s)) => Resolved::Text(s.clone()),
                Some(value) => Resolved::Text(flow(value)),
                None => Resolved::MissingValue,
            });
        }

        let text = match action {
            ".Release.Namespace" => LINT_NAMESPACE.to_string(),
            ".Release.Name" | ".Chart.Name" => metadata.name.clone(),
            ".Chart.Version" => metadata.version.clone(),
            ".Chart.AppVersion" => metadata.app_version.clone().unwrap_or_default(),
            ".Capabilities.KubeVersion.Version" => format!("v{}", self.kube_version),
            _ => return None,
        };
        Some(Resolved::Text(text))
    }

    fn check_api_version(&self, path: &str, api_version: &str, kind: &str, report: &mut LintReport) {
        let Some(retired) = RETIRED_APIS.iter().find(|r| r.api_version == api_version) else {
            return;
        };

        let target = (self.kube_version.major, self.kube_version.minor);
        if target >= retired.removed_in {
            report.push(
                LintSeverity::Error,
                path,
                format!(
                    "{api_version} {kind} is not available in Kubernetes v{}, removed in v{}.{}; use {}",
                    self.kube_version, retired.removed_in.0, retired.removed_in.1, retired.replacement
                ),
            );
        } else if target >= retired.deprecated_in {
            report.push(
                LintSeverity::Warning,
                path,
                format!(
                    "{api_version} {kind} is deprecated since v{}.{} and removed in v{}.{}; use {}",
                    retired.deprecated_in.0,
                    retired.deprecated_in.1,
                    retired.removed_in.0,
                    retired.removed_in.1,
                    retired.replacement
                ),
            );
        }
    }
}

enum Resolved {
    Text(String),
    MissingValue,
}

/// Single-line rendering of a value; JSON is a subset of YAML flow style
fn flow(value: &JsonValue) -> String {
    value.to_string()
}

fn log_findings(report: &LintReport) {
    for finding in &report.findings {
        if finding.severity >= LintSeverity::Warning {
            tracing::warn!("{finding}");
        } else {
            tracing::info!("{finding}");
        }
    }
}
