//! Tool configuration
//!
//! Configuration is layered: every existing file is deep-merged over the
//! previous one, command-line overrides are applied on top, and the GitHub
//! token falls back to the `GITHUB_TOKEN` environment variable.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CoreError, Result};
use crate::release::ReleaseDescriptor;
use crate::values::merge;

/// Files loaded when no explicit configuration is given, lowest priority first
pub const DEFAULT_CONFIG_FILES: &[&str] = &["config.yaml", ".local/config.yaml"];

/// Environment variable consulted when no auth token is configured
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Default Kubernetes version charts are linted against
pub const DEFAULT_LINT_K8S: &str = "1.30.0";

/// What a run does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Regenerate charts from upstream releases and open pull requests
    Update,
    /// Package charts and push them to the OCI registry
    Publish,
}

impl FromStr for Mode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "update" => Ok(Mode::Update),
            "publish" => Ok(Mode::Publish),
            other => Err(CoreError::InvalidConfig {
                message: format!("unknown mode '{other}', expected 'update' or 'publish'"),
            }),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Update => write!(f, "update"),
            Mode::Publish => write!(f, "publish"),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogSettings {
    /// tracing level or filter directive
    #[serde(default)]
    pub level: Option<String>,
}

/// Pull request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestSettings {
    #[serde(default = "default_branch")]
    pub default_branch: String,

    /// Title template, `{branch}` is replaced by the update branch name
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default)]
    pub body: String,

    /// Repository receiving the pull requests
    #[serde(default)]
    pub repo: String,

    #[serde(default)]
    pub owner: String,

    #[serde(default, skip_serializing)]
    pub auth_token: String,

    /// GitHub API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

impl Default for PullRequestSettings {
    fn default() -> Self {
        Self {
            default_branch: default_branch(),
            title: default_title(),
            body: String::new(),
            repo: String::new(),
            owner: String::new(),
            auth_token: String::new(),
            api_url: default_api_url(),
        }
    }
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_title() -> String {
    "Update {branch}".to_string()
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

/// Commit identity and remote
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitSettings {
    #[serde(default = "default_author_name")]
    pub author_name: String,

    #[serde(default = "default_author_email")]
    pub author_email: String,

    #[serde(default = "default_remote")]
    pub remote: String,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            author_name: default_author_name(),
            author_email: default_author_email(),
            remote: default_remote(),
        }
    }
}

fn default_author_name() -> String {
    "charts-bot".to_string()
}

fn default_author_email() -> String {
    "charts-bot@users.noreply.github.com".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

/// Chart locations and publishing target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmSettings {
    /// Directory holding one sub-directory per chart
    #[serde(default = "default_src_dir")]
    pub src_dir: PathBuf,

    /// Directory receiving packaged archives
    #[serde(default = "default_target_dir")]
    pub target_dir: PathBuf,

    /// Kubernetes version charts are linted against
    #[serde(default = "default_lint_k8s")]
    pub lint_k8s: String,

    /// OCI registry location, `oci://host/path`
    #[serde(default)]
    pub remote: String,
}

impl Default for HelmSettings {
    fn default() -> Self {
        Self {
            src_dir: default_src_dir(),
            target_dir: default_target_dir(),
            lint_k8s: default_lint_k8s(),
            remote: String::new(),
        }
    }
}

fn default_src_dir() -> PathBuf {
    PathBuf::from("charts")
}

fn default_target_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_lint_k8s() -> String {
    DEFAULT_LINT_K8S.to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Full tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub log: LogSettings,

    #[serde(default)]
    pub mode: Option<Mode>,

    /// Skip every git and pull request operation
    #[serde(default)]
    pub offline: bool,

    /// Bound on the network phase of a single release
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub release_timeout: Duration,

    /// Bound on each git network operation
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub git_timeout: Duration,

    #[serde(default)]
    pub pr: PullRequestSettings,

    #[serde(default)]
    pub git: GitSettings,

    #[serde(default)]
    pub helm: HelmSettings,

    #[serde(default)]
    pub github_releases: Vec<ReleaseDescriptor>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log: LogSettings::default(),
            mode: None,
            offline: false,
            release_timeout: default_timeout(),
            git_timeout: default_timeout(),
            pr: PullRequestSettings::default(),
            git: GitSettings::default(),
            helm: HelmSettings::default(),
            github_releases: Vec::new(),
        }
    }
}

/// Values given on the command line, applied over the files
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub mode: Option<Mode>,
    pub offline: bool,
    pub log_level: Option<String>,
    pub auth_token: Option<String>,
}

impl Config {
    /// Load and deep-merge every file that exists, in order
    pub fn load_layered<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut merged = JsonValue::Object(serde_json::Map::new());

        for path in paths {
            let path = path.as_ref();
            if !path.exists() {
                tracing::debug!(path = %path.display(), "config file not present, skipping");
                continue;
            }
            merged = merge(&merged, &read_yaml(path)?);
            tracing::debug!(path = %path.display(), "loaded config file");
        }

        Ok(serde_json::from_value(merged)?)
    }

    /// Load exactly the given files, failing on any that is missing
    pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        if let Some(missing) = paths.iter().find(|p| !p.as_ref().exists()) {
            return Err(CoreError::ConfigNotFound {
                path: missing.as_ref().display().to_string(),
            });
        }
        Self::load_layered(paths)
    }

    /// Parse a configuration from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        let value = match value {
            JsonValue::Null => JsonValue::Object(serde_json::Map::new()),
            other => other,
        };
        Ok(serde_json::from_value(value)?)
    }

    /// Apply command-line overrides
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(mode) = overrides.mode {
            self.mode = Some(mode);
        }
        if overrides.offline {
            self.offline = true;
        }
        if let Some(level) = overrides.log_level {
            self.log.level = Some(level);
        }
        if let Some(token) = overrides.auth_token.filter(|t| !t.is_empty()) {
            self.pr.auth_token = token;
        }
    }

    /// Fill an empty auth token from `token`, typically the `GITHUB_TOKEN` variable
    pub fn apply_token_fallback(&mut self, token: Option<String>) {
        if self.pr.auth_token.is_empty() {
            if let Some(token) = token.filter(|t| !t.is_empty()) {
                self.pr.auth_token = token;
            }
        }
    }

    /// The configured mode, which must be set by now
    pub fn mode(&self) -> Result<Mode> {
        self.mode.ok_or_else(|| CoreError::InvalidConfig {
            message: "no operation specified, use --mode=publish or --mode=update".to_string(),
        })
    }

    /// Check release declarations for problems that would only surface mid-run
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for release in &self.github_releases {
            if release.owner.is_empty() || release.repo.is_empty() {
                return Err(CoreError::InvalidConfig {
                    message: format!(
                        "release '{}' needs both owner and repo",
                        release.chart_name
                    ),
                });
            }
            if release.chart_name.is_empty() {
                return Err(CoreError::InvalidConfig {
                    message: format!("release {} has no chartName", release.slug()),
                });
            }
            if !seen.insert(release.chart_name.as_str()) {
                return Err(CoreError::InvalidConfig {
                    message: format!("chartName '{}' is declared twice", release.chart_name),
                });
            }
        }

        for release in &self.github_releases {
            let crd_chart = release.crd_chart_name();
            if seen.contains(crd_chart.as_str()) {
                return Err(CoreError::InvalidConfig {
                    message: format!(
                        "chartName '{crd_chart}' collides with the CRD chart of '{}'",
                        release.chart_name
                    ),
                });
            }
        }

        Ok(())
    }
}

fn read_yaml(path: &Path) -> Result<JsonValue> {
    let content = std::fs::read_to_string(path)?;
    let value: JsonValue = serde_yaml::from_str(&content)?;
    Ok(match value {
        JsonValue::Null => JsonValue::Object(serde_json::Map::new()),
        other => other,
    })
}
