//! Chart synthesis from a parametrized manifest set

use semver::Version;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chartwright_core::config::{DEFAULT_LINT_K8S, HelmSettings};
use chartwright_core::manifest::Document;
use chartwright_core::release::CRD_CHART_SUFFIX;
use chartwright_core::version::parse_lenient;
use chartwright_core::{ManifestSet, Values};

use crate::chart::{
    CHART_FILE, ChartMetadata, HELMIGNORE_FILE, HELPERS_FILE, TEMPLATES_DIR, VALUES_FILE,
};
use crate::error::{ChartError, Result};
use crate::lint::{LintReport, LintSeverity, Linter};
use crate::templates::render_templates;

const DEFAULT_HELMIGNORE: &str = r#"# Patterns to ignore when building packages.
.DS_Store
.git/
.gitignore
.bzr/
.bzrignore
.hg/
.hgignore
.svn/
*.swp
*.bak
*.tmp
*.orig
*~
.project
.idea/
*.tmproj
.vscode/
"#;

const DEFAULT_HELPERS: &str = r#"{{/*
Expand the name of the chart.
*/}}
{{- define "chart.name" -}}
{{- default .Chart.Name .Values.nameOverride | trunc 63 | trimSuffix "-" }}
{{- end }}

{{/*
Common labels
*/}}
{{- define "chart.labels" -}}
helm.sh/chart: {{ printf "%s-%s" .Chart.Name .Chart.Version | replace "+" "_" | trunc 63 | trimSuffix "-" }}
app.kubernetes.io/name: {{ include "chart.name" . }}
app.kubernetes.io/instance: {{ .Release.Name }}
app.kubernetes.io/version: {{ .Chart.AppVersion | quote }}
app.kubernetes.io/managed-by: {{ .Release.Service }}
{{- end }}
"#;

/// One chart written to disk
#[derive(Debug, Clone)]
pub struct ChartHandle {
    pub name: String,
    /// Chart directory
    pub path: PathBuf,
    pub metadata: ChartMetadata,
    /// Values written to values.yaml
    pub values: Values,
    /// Generated template files by name
    pub templates: BTreeMap<String, String>,
    pub report: LintReport,
}

/// Result of synthesizing one release
#[derive(Debug, Clone)]
pub struct SynthesizedPackage {
    pub src_dir: PathBuf,
    pub version: Version,
    pub app_version: String,
    pub chart: ChartHandle,
    /// Sibling chart carrying the CRDs, when the release has any
    pub crds: Option<ChartHandle>,
}

impl SynthesizedPackage {
    /// Chart directories owned by this package
    pub fn paths(&self) -> Vec<PathBuf> {
        std::iter::once(&self.chart)
            .chain(self.crds.as_ref())
            .map(|c| c.path.clone())
            .collect()
    }

    pub fn chart_names(&self) -> Vec<&str> {
        std::iter::once(&self.chart)
            .chain(self.crds.as_ref())
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Writes charts for manifest sets and lints them
#[derive(Debug, Clone)]
pub struct ChartSynthesizer {
    src_dir: PathBuf,
    linter: Linter,
    fail_on: LintSeverity,
}

impl ChartSynthesizer {
    /// Synthesizer writing under `src_dir`, linting against `lint_k8s`
    ///
    /// An unparsable Kubernetes version falls back to the default one.
    pub fn new(src_dir: impl Into<PathBuf>, lint_k8s: &str) -> Self {
        let kube_version = match parse_lenient(lint_k8s) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    "Invalid Kubernetes version for linting: '{lint_k8s}' ({e}), defaulting to {DEFAULT_LINT_K8S}"
                );
                Version::new(1, 30, 0)
            }
        };

        Self {
            src_dir: src_dir.into(),
            linter: Linter::new(kube_version),
            fail_on: LintSeverity::Warning,
        }
    }

    pub fn from_settings(settings: &HelmSettings) -> Self {
        Self::new(settings.src_dir.clone(), &settings.lint_k8s)
    }

    pub fn src_dir(&self) -> &Path {
        &self.src_dir
    }

    pub fn linter(&self) -> &Linter {
        &self.linter
    }

    /// Write the chart (and CRD chart) for `set` under the source directory
    pub fn synthesize(&self, chart_name: &str, set: &ManifestSet) -> Result<SynthesizedPackage> {
        let crds = if set.contains_crds() {
            let crd_chart = format!("{chart_name}{CRD_CHART_SUFFIX}");
            tracing::info!(
                chart = %crd_chart,
                crds = set.crds.len(),
                "moving CRDs to dedicated chart"
            );
            Some(self.write_chart(&crd_chart, &set.crds, &set.crd_values, set)?)
        } else {
            None
        };

        let chart = self.write_chart(chart_name, &set.manifests, &set.values, set)?;

        Ok(SynthesizedPackage {
            src_dir: self.src_dir.clone(),
            version: set.version.clone(),
            app_version: set.app_version.clone(),
            chart,
            crds,
        })
    }

    fn write_chart(
        &self,
        name: &str,
        documents: &[Document],
        values: &Values,
        set: &ManifestSet,
    ) -> Result<ChartHandle> {
        tracing::debug!(chart = name, documents = documents.len(), "updating chart templates");
        let templates = render_templates(documents)?;

        let path = self.src_dir.join(name);
        let templates_dir = path.join(TEMPLATES_DIR);
        std::fs::create_dir_all(&templates_dir)?;

        let mut metadata = if path.join(CHART_FILE).exists() {
            ChartMetadata::load(&path)?
        } else {
            tracing::info!(chart = name, path = %path.display(), "creating chart");
            ChartMetadata::new(name, &set.version)
        };
        metadata.stamp(&set.version, &set.app_version);

        scaffold(&path)?;
        clear_generated(&templates_dir)?;

        for (file, content) in &templates {
            std::fs::write(templates_dir.join(file), content)?;
        }
        metadata.save(&path)?;
        std::fs::write(path.join(VALUES_FILE), values.to_yaml()?)?;

        tracing::info!(
            chart = name,
            version = %set.version,
            app_version = %set.app_version,
            templates = templates.len(),
            "saved chart to {}",
            path.display()
        );

        let report = self.linter.lint(&path)?;
        if report.fails(self.fail_on) {
            return Err(ChartError::LintFailed {
                chart: name.to_string(),
                errors: report.errors(),
                warnings: report.warnings(),
            });
        }

        Ok(ChartHandle {
            name: name.to_string(),
            path,
            metadata,
            values: values.clone(),
            templates,
            report,
        })
    }
}

/// Write the files a fresh chart starts with, leaving existing ones alone
fn scaffold(chart_dir: &Path) -> Result<()> {
    let helmignore = chart_dir.join(HELMIGNORE_FILE);
    if !helmignore.exists() {
        std::fs::write(helmignore, DEFAULT_HELMIGNORE)?;
    }
    let helpers = chart_dir.join(TEMPLATES_DIR).join(HELPERS_FILE);
    if !helpers.exists() {
        std::fs::write(helpers, DEFAULT_HELPERS)?;
    }
    Ok(())
}

/// Remove previously generated templates, keeping `.tpl` files
fn clear_generated(templates_dir: &Path) -> Result<()> {
    for entry in std::fs::read_dir(templates_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".tpl") {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}
