//! Chart.yaml model and on-disk chart layout

use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chartwright_core::Values;
use chartwright_core::version::parse_lenient;

use crate::error::{ChartError, Result};

pub const CHART_FILE: &str = "Chart.yaml";
pub const VALUES_FILE: &str = "values.yaml";
pub const TEMPLATES_DIR: &str = "templates";
pub const HELPERS_FILE: &str = "_helpers.tpl";
pub const HELMIGNORE_FILE: &str = ".helmignore";

/// Chart API version written for new charts
pub const CHART_API_VERSION: &str = "v2";

/// Version a chart starts from when it does not exist yet
pub const INITIAL_CHART_VERSION: Version = Version::new(0, 1, 0);

/// Helm Chart.yaml structure
///
/// Fields chartwright does not manage (dependencies, custom keys) are kept
/// in `extra` so that hand edits survive regeneration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    /// API version (v2)
    pub api_version: String,

    /// Chart name
    pub name: String,

    /// Chart version (SemVer)
    pub version: String,

    /// Kubernetes version constraint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_version: Option<String>,

    /// Chart description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Chart type (application or library)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,

    /// Keywords for searching
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    /// Project home page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,

    /// Source code URLs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,

    /// Maintainers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<Maintainer>,

    /// Icon URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Version of the packaged application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,

    /// Whether chart is deprecated
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,

    /// Annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Any other key, preserved as written
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Chart maintainer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maintainer {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ChartMetadata {
    /// Metadata for a chart that does not exist yet
    pub fn new(name: &str, version: &Version) -> Self {
        Self {
            api_version: CHART_API_VERSION.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            kube_version: None,
            description: None,
            chart_type: Some("application".to_string()),
            keywords: Vec::new(),
            home: None,
            sources: Vec::new(),
            maintainers: Vec::new(),
            icon: None,
            app_version: None,
            deprecated: false,
            annotations: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Load `Chart.yaml` from a chart directory
    pub fn load(chart_dir: &Path) -> Result<Self> {
        let path = chart_dir.join(CHART_FILE);
        if !path.exists() {
            return Err(ChartError::ChartNotFound { path });
        }
        Self::from_yaml(&std::fs::read_to_string(&path)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Write `Chart.yaml` into a chart directory
    pub fn save(&self, chart_dir: &Path) -> Result<()> {
        std::fs::write(chart_dir.join(CHART_FILE), serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Parsed chart version
    pub fn semver(&self) -> Result<Version> {
        Ok(Version::parse(&self.version)?)
    }

    /// Stamp a generated release onto the metadata
    pub fn stamp(&mut self, version: &Version, app_version: &str) {
        self.version = version.to_string();
        self.app_version = Some(app_version.to_string());
        self.description = Some(format!("A Helm Chart for {}", self.name));
    }
}

/// Versions recorded in a chart, used to decide whether an upstream release is new
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartVersions {
    pub version: Version,
    pub app_version: String,
}

/// Read the current versions of `<src_dir>/<chart_name>`
///
/// A chart that does not exist yet reports [`INITIAL_CHART_VERSION`] and an
/// empty app version, so the first upstream release always counts as new.
pub fn peek_versions(src_dir: &Path, chart_name: &str) -> Result<ChartVersions> {
    let chart_dir = src_dir.join(chart_name);
    if !chart_dir.join(CHART_FILE).exists() {
        tracing::info!(chart = chart_name, "chart does not exist yet, starting at {INITIAL_CHART_VERSION}");
        return Ok(ChartVersions {
            version: INITIAL_CHART_VERSION,
            app_version: String::new(),
        });
    }

    let metadata = ChartMetadata::load(&chart_dir)?;
    let version = parse_lenient(&metadata.version)?;
    Ok(ChartVersions {
        version,
        app_version: metadata.app_version.unwrap_or_default(),
    })
}

/// A chart read back from disk
#[derive(Debug, Clone)]
pub struct LoadedChart {
    /// Chart directory
    pub root: PathBuf,
    /// Parsed Chart.yaml
    pub metadata: ChartMetadata,
    /// Parsed values.yaml (empty when absent)
    pub values: Values,
    /// Template files by name, relative to `templates/`
    pub templates: BTreeMap<String, String>,
}

impl LoadedChart {
    /// Load a chart directory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ChartError::ChartNotFound { path: root });
        }

        let metadata = ChartMetadata::load(&root)?;

        let values_path = root.join(VALUES_FILE);
        let values = if values_path.exists() {
            Values::from_file(&values_path)?
        } else {
            Values::new()
        };

        let mut templates = BTreeMap::new();
        let templates_dir = root.join(TEMPLATES_DIR);
        if templates_dir.is_dir() {
            for entry in walkdir::WalkDir::new(&templates_dir).sort_by_file_name() {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let rel = entry
                    .path()
                    .strip_prefix(&templates_dir)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                templates.insert(rel, std::fs::read_to_string(entry.path())?);
            }
        }

        Ok(Self {
            root,
            metadata,
            values,
            templates,
        })
    }

    /// Template files that chartwright generates, i.e. not helpers or partials
    pub fn generated_templates(&self) -> impl Iterator<Item = (&String, &String)> {
        self.templates.iter().filter(|(name, _)| is_generated_template(name))
    }
}

/// Whether a template file is a generated manifest file rather than a helper
pub fn is_generated_template(name: &str) -> bool {
    let file = name.rsplit('/').next().unwrap_or(name);
    !file.ends_with(".tpl") && !file.starts_with('_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_chart_metadata_preserves_unknown_keys() {
        let yaml = r#"
apiVersion: v2
name: kubevirt
version: 1.2.0
appVersion: v1.2.0
icon: https://example.com/icon.svg
dependencies:
  - name: common
    version: 2.x.x
    repository: oci://registry-1.docker.io/bitnamicharts
"#;
        let mut chart = ChartMetadata::from_yaml(yaml).unwrap();
        assert_eq!(chart.semver().unwrap(), Version::new(1, 2, 0));
        assert!(chart.extra.contains_key("dependencies"));

        chart.stamp(&Version::new(1, 3, 0), "v1.3.0");
        let out = serde_yaml::to_string(&chart).unwrap();
        let back = ChartMetadata::from_yaml(&out).unwrap();

        assert_eq!(back.version, "1.3.0");
        assert_eq!(back.app_version.as_deref(), Some("v1.3.0"));
        assert_eq!(back.description.as_deref(), Some("A Helm Chart for kubevirt"));
        assert_eq!(back.icon.as_deref(), Some("https://example.com/icon.svg"));
        assert_eq!(back.extra, chart.extra);
    }

    #[test]
    fn test_peek_versions_missing_chart_bootstraps() {
        let dir = TempDir::new().unwrap();
        let versions = peek_versions(dir.path(), "kubevirt").unwrap();
        assert_eq!(versions.version, INITIAL_CHART_VERSION);
        assert_eq!(versions.app_version, "");
    }

    #[test]
    fn test_peek_versions_reads_chart() {
        let dir = TempDir::new().unwrap();
        let chart_dir = dir.path().join("cdi");
        std::fs::create_dir_all(&chart_dir).unwrap();
        let mut meta = ChartMetadata::new("cdi", &Version::new(1, 4, 2));
        meta.app_version = Some("v1.60.1".into());
        meta.save(&chart_dir).unwrap();

        let versions = peek_versions(dir.path(), "cdi").unwrap();
        assert_eq!(versions.version, Version::new(1, 4, 2));
        assert_eq!(versions.app_version, "v1.60.1");
    }

    #[test]
    fn test_generated_template_names() {
        assert!(is_generated_template("deployment.yaml"));
        assert!(!is_generated_template("_helpers.tpl"));
        assert!(!is_generated_template("partials/_labels.yaml"));
        assert!(!is_generated_template("custom.tpl"));
    }
}
