//! Release orchestration
//!
//! Every configured release is processed in its own task: peek the current
//! chart versions, fetch the latest upstream release, filter and rewrite the
//! manifests, then synthesize the charts. Outcomes are collected in
//! configuration order once every task has joined. Submitting the resulting
//! packages (branch, commit, push, pull request) is sequential since all of
//! them share one working tree.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use chartwright_chart::{ChartError, ChartSynthesizer, SynthesizedPackage, peek_versions};
use chartwright_core::{Config, ReleaseDescriptor};
use chartwright_engine::{Modifier, RuleError};
use chartwright_repo::{
    ReleaseSource, RepoError, ReviewService, VersionControl, commit_message,
};

/// Why a single release produced no package
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("fetching the release timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Chart(#[from] ChartError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("release task failed: {0}")]
    Task(String),
}

/// What happened to one release
#[derive(Debug)]
pub enum ReleaseOutcome {
    /// Charts were regenerated
    Package(SynthesizedPackage),
    /// The chart already carries the latest upstream tag
    Skipped { chart: String },
    Failed { chart: String, error: ReleaseError },
}

impl ReleaseOutcome {
    pub fn chart(&self) -> &str {
        match self {
            ReleaseOutcome::Package(package) => &package.chart.name,
            ReleaseOutcome::Skipped { chart } | ReleaseOutcome::Failed { chart, .. } => chart,
        }
    }
}

/// Runs the concurrent per-release phase
pub struct Orchestrator<S> {
    config: Arc<Config>,
    source: Arc<S>,
}

impl<S: ReleaseSource + 'static> Orchestrator<S> {
    pub fn new(config: Arc<Config>, source: S) -> Self {
        Self {
            config,
            source: Arc::new(source),
        }
    }

    /// Process every release, returning outcomes in configuration order
    pub async fn collect(&self) -> Vec<ReleaseOutcome> {
        let tasks: Vec<_> = self
            .config
            .github_releases
            .iter()
            .map(|release| {
                let release = Arc::new(release.clone());
                let chart = release.chart_name.clone();
                let handle = tokio::spawn(process_release(
                    Arc::clone(&self.source),
                    Arc::clone(&self.config),
                    release,
                ));
                (chart, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (chart, handle) in tasks {
            let outcome = match handle.await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(error)) => {
                    tracing::error!(chart = %chart, "error generating chart: {error}");
                    ReleaseOutcome::Failed { chart, error }
                }
                Err(e) => ReleaseOutcome::Failed {
                    chart,
                    error: ReleaseError::Task(e.to_string()),
                },
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

async fn process_release<S: ReleaseSource>(
    source: Arc<S>,
    config: Arc<Config>,
    release: Arc<ReleaseDescriptor>,
) -> Result<ReleaseOutcome, ReleaseError> {
    let slug = release.slug();
    let modifier = Modifier::new();
    let rules = modifier.compile(&release.modifications)?;

    let current = peek_versions(&config.helm.src_dir, &release.chart_name)?;
    tracing::debug!(
        release = %slug,
        version = %current.version,
        app_version = %current.app_version,
        "current chart versions"
    );

    let fetched = tokio::time::timeout(
        config.release_timeout,
        source.fetch(&release, &current.version, &current.app_version),
    )
    .await
    .map_err(|_| ReleaseError::Timeout(config.release_timeout))??;

    let Some(set) = fetched else {
        return Ok(ReleaseOutcome::Skipped {
            chart: release.chart_name.clone(),
        });
    };

    let package = tokio::task::spawn_blocking(move || -> Result<_, ReleaseError> {
        let set = modifier.filter(set, &release.drop);
        let set = modifier.parametrize(set, &rules)?;
        let synthesizer = ChartSynthesizer::from_settings(&config.helm);
        Ok(synthesizer.synthesize(&release.chart_name, &set)?)
    })
    .await
    .map_err(|e| ReleaseError::Task(e.to_string()))??;

    tracing::info!(release = %slug, charts = ?package.chart_names(), "created chart for release");
    Ok(ReleaseOutcome::Package(package))
}

/// Branch a package is pushed to
pub fn update_branch(chart: &str, app_version: &str) -> String {
    format!("update/{chart}-{app_version}")
}

/// A package that went through the git phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub chart: String,
    pub branch: String,
    /// Review number, `None` when the branch already existed
    pub review: Option<u64>,
}

/// Branch, commit, push and open a review for every package, in order
///
/// Any failure stops the phase; later packages are left unsubmitted.
pub async fn submit<V, R>(
    outcomes: &[ReleaseOutcome],
    vcs: &V,
    reviews: &R,
    default_branch: &str,
) -> Result<Vec<Submission>, RepoError>
where
    V: VersionControl + ?Sized,
    R: ReviewService + ?Sized,
{
    let mut submissions = Vec::new();

    for outcome in outcomes {
        let ReleaseOutcome::Package(package) = outcome else {
            continue;
        };
        let chart = package.chart.name.clone();
        let branch = update_branch(&chart, &package.app_version);

        if vcs.branch_exists(&branch).await? {
            tracing::info!("Branch {branch} already exists: close it or merge it, then re-try, skipping");
            submissions.push(Submission {
                chart,
                branch,
                review: None,
            });
            continue;
        }

        vcs.create_branch(default_branch, &branch).await?;
        vcs.commit_package(package, &commit_message(&package.app_version))
            .await?;
        vcs.push(&branch).await?;
        let number = reviews.create_review(default_branch, &branch).await?;

        submissions.push(Submission {
            chart,
            branch,
            review: Some(number),
        });
    }

    Ok(submissions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chartwright_core::{ManifestSet, Rule, Values, resolve_version};
    use semver::Version;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const MANIFESTS: &str = r#"apiVersion: v1
kind: Namespace
metadata:
  name: demo
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: demo-operator
  namespace: demo
spec:
  replicas: 1
---
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: demos.example.com
spec:
  group: example.com
"#;

    #[derive(Clone)]
    enum Upstream {
        Tag(&'static str),
        Missing,
        Slow,
    }

    #[derive(Default)]
    struct MockSource {
        upstream: HashMap<String, Upstream>,
        fetches: AtomicUsize,
    }

    impl MockSource {
        fn with(mut self, chart: &str, upstream: Upstream) -> Self {
            self.upstream.insert(chart.to_string(), upstream);
            self
        }
    }

    #[async_trait]
    impl ReleaseSource for MockSource {
        async fn fetch(
            &self,
            release: &ReleaseDescriptor,
            existing_version: &Version,
            existing_app_version: &str,
        ) -> chartwright_repo::Result<Option<ManifestSet>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let tag = match self.upstream.get(&release.chart_name).cloned() {
                Some(Upstream::Tag(tag)) => tag,
                Some(Upstream::Slow) => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "v9.9.9"
                }
                Some(Upstream::Missing) | None => {
                    return Err(RepoError::ReleaseNotFound {
                        repo: release.slug(),
                    });
                }
            };
            if tag == existing_app_version {
                return Ok(None);
            }
            let set = ManifestSet::new(
                &[("manifests.yaml".to_string(), MANIFESTS.as_bytes().to_vec())],
                resolve_version(existing_version, tag),
                tag,
                release.add_values.clone(),
                release.add_crd_values.clone(),
            )?;
            Ok(Some(set))
        }
    }

    fn release(chart: &str) -> ReleaseDescriptor {
        ReleaseDescriptor {
            owner: "acme".into(),
            repo: chart.into(),
            assets: vec!["manifests.yaml".into()],
            chart_name: chart.into(),
            drop: vec!["namespace".into()],
            modifications: vec![
                Rule::new(".metadata.namespace = \"{{ .Release.Namespace }}\"")
                    .rejecting("^CustomResourceDefinition$"),
                Rule::new(".spec.replicas = \"{{ .Values.replicas }}\"")
                    .with_selectors([".spec.replicas"])
                    .for_kind("^Deployment$"),
            ],
            ..Default::default()
        }
    }

    fn config(src: &TempDir, releases: Vec<ReleaseDescriptor>) -> Arc<Config> {
        let mut config = Config::default();
        config.helm.src_dir = src.path().to_path_buf();
        config.release_timeout = Duration::from_millis(200);
        config.github_releases = releases;
        Arc::new(config)
    }

    #[tokio::test]
    async fn test_collect_keeps_configuration_order() {
        let src = TempDir::new().unwrap();
        let config = config(
            &src,
            vec![release("missing"), release("demo"), release("other")],
        );
        let source = MockSource::default()
            .with("demo", Upstream::Tag("v1.3.0"))
            .with("other", Upstream::Tag("v2.0.0"))
            .with("missing", Upstream::Missing);

        let outcomes = Orchestrator::new(config, source).collect().await;
        let charts: Vec<&str> = outcomes.iter().map(ReleaseOutcome::chart).collect();
        assert_eq!(charts, vec!["missing", "demo", "other"]);

        assert!(matches!(
            &outcomes[0],
            ReleaseOutcome::Failed {
                error: ReleaseError::Repo(RepoError::ReleaseNotFound { .. }),
                ..
            }
        ));

        let ReleaseOutcome::Package(package) = &outcomes[1] else {
            panic!("expected a package, got {:?}", outcomes[1]);
        };
        assert_eq!(package.version, Version::new(1, 3, 0));
        assert_eq!(package.chart_names(), vec!["demo", "demo-crds"]);
        assert_eq!(package.chart.values.0, json!({"replicas": 1}));
        assert!(!package.chart.templates.contains_key("namespace.yaml"));
        assert!(
            package.chart.templates["deployment.yaml"]
                .contains("namespace: {{ .Release.Namespace }}")
        );
        assert!(src.path().join("demo-crds/Chart.yaml").exists());
    }

    #[tokio::test]
    async fn test_current_chart_is_skipped() {
        let src = TempDir::new().unwrap();
        let config = config(&src, vec![release("demo")]);
        let source = MockSource::default().with("demo", Upstream::Tag("v1.3.0"));
        let orchestrator = Orchestrator::new(config, source);

        let first = orchestrator.collect().await;
        assert!(matches!(first[0], ReleaseOutcome::Package(_)));

        let second = orchestrator.collect().await;
        assert!(matches!(&second[0], ReleaseOutcome::Skipped { chart } if chart == "demo"));
    }

    #[tokio::test]
    async fn test_slow_release_times_out_alone() {
        let src = TempDir::new().unwrap();
        let config = config(&src, vec![release("slow"), release("demo")]);
        let source = MockSource::default()
            .with("slow", Upstream::Slow)
            .with("demo", Upstream::Tag("v1.3.0"));

        let outcomes = Orchestrator::new(config, source).collect().await;
        assert!(matches!(
            outcomes[0],
            ReleaseOutcome::Failed {
                error: ReleaseError::Timeout(_),
                ..
            }
        ));
        assert!(matches!(outcomes[1], ReleaseOutcome::Package(_)));
    }

    #[tokio::test]
    async fn test_malformed_rule_fails_before_fetching() {
        let src = TempDir::new().unwrap();
        let mut broken = release("demo");
        broken.modifications = vec![Rule::new(".metadata.name = ").for_kind("(")];
        let config = config(&src, vec![broken]);
        let orchestrator =
            Orchestrator::new(config, MockSource::default().with("demo", Upstream::Tag("v1")));

        let outcomes = orchestrator.collect().await;
        assert!(matches!(
            outcomes[0],
            ReleaseOutcome::Failed {
                error: ReleaseError::Rule(_),
                ..
            }
        ));
        assert_eq!(orchestrator.source.fetches.load(Ordering::SeqCst), 0);
    }

    #[derive(Default)]
    struct MockVcs {
        existing: Vec<String>,
        fail_push: bool,
        calls: Mutex<Vec<String>>,
    }

    impl MockVcs {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VersionControl for MockVcs {
        async fn branch_exists(&self, branch: &str) -> chartwright_repo::Result<bool> {
            self.record(format!("exists {branch}"));
            Ok(self.existing.iter().any(|b| b == branch))
        }

        async fn create_branch(
            &self,
            default_branch: &str,
            branch: &str,
        ) -> chartwright_repo::Result<()> {
            self.record(format!("branch {default_branch} {branch}"));
            Ok(())
        }

        async fn commit_package(
            &self,
            package: &SynthesizedPackage,
            message: &str,
        ) -> chartwright_repo::Result<()> {
            self.record(format!("commit {} {message}", package.paths().len()));
            Ok(())
        }

        async fn push(&self, branch: &str) -> chartwright_repo::Result<()> {
            self.record(format!("push {branch}"));
            if self.fail_push {
                return Err(RepoError::GitCommandFailed {
                    command: format!("push origin {branch}"),
                    stderr: "rejected".into(),
                });
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockReviews {
        opened: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ReviewService for MockReviews {
        async fn create_review(
            &self,
            default_branch: &str,
            source_branch: &str,
        ) -> chartwright_repo::Result<u64> {
            let mut opened = self.opened.lock().unwrap();
            opened.push((default_branch.to_string(), source_branch.to_string()));
            Ok(opened.len() as u64)
        }
    }

    async fn packages(src: &TempDir) -> Vec<ReleaseOutcome> {
        let config = config(src, vec![release("demo"), release("gone"), release("other")]);
        let source = MockSource::default()
            .with("demo", Upstream::Tag("v1.3.0"))
            .with("other", Upstream::Tag("v2.0.0"));
        Orchestrator::new(config, source).collect().await
    }

    #[tokio::test]
    async fn test_submit_runs_git_phase_per_package() {
        let src = TempDir::new().unwrap();
        let outcomes = packages(&src).await;
        let vcs = MockVcs {
            existing: vec!["update/other-v2.0.0".into()],
            ..Default::default()
        };
        let reviews = MockReviews::default();

        let submissions = submit(&outcomes, &vcs, &reviews, "main").await.unwrap();

        assert_eq!(
            submissions,
            vec![
                Submission {
                    chart: "demo".into(),
                    branch: "update/demo-v1.3.0".into(),
                    review: Some(1),
                },
                Submission {
                    chart: "other".into(),
                    branch: "update/other-v2.0.0".into(),
                    review: None,
                },
            ]
        );
        assert_eq!(
            vcs.calls(),
            vec![
                "exists update/demo-v1.3.0",
                "branch main update/demo-v1.3.0",
                "commit 2 Automated update to version: v1.3.0",
                "push update/demo-v1.3.0",
                "exists update/other-v2.0.0",
            ]
        );
        assert_eq!(
            reviews.opened.lock().unwrap().clone(),
            vec![("main".to_string(), "update/demo-v1.3.0".to_string())]
        );
    }

    #[tokio::test]
    async fn test_submit_stops_at_first_git_failure() {
        let src = TempDir::new().unwrap();
        let outcomes = packages(&src).await;
        let vcs = MockVcs {
            fail_push: true,
            ..Default::default()
        };
        let reviews = MockReviews::default();

        let err = submit(&outcomes, &vcs, &reviews, "main").await.unwrap_err();
        assert!(matches!(err, RepoError::GitCommandFailed { .. }));
        assert!(reviews.opened.lock().unwrap().is_empty());
        assert_eq!(vcs.calls().last().unwrap(), "push update/demo-v1.3.0");
    }

    #[test]
    fn test_update_branch() {
        assert_eq!(update_branch("kubevirt", "v1.3.0"), "update/kubevirt-v1.3.0");
    }

    #[tokio::test]
    async fn test_seeded_values_survive_extraction() {
        let src = TempDir::new().unwrap();
        let mut seeded = release("demo");
        seeded.add_values = Values(json!({"monitorNamespace": "monitoring"}));
        let config = config(&src, vec![seeded]);
        let source = MockSource::default().with("demo", Upstream::Tag("v1.3.0"));

        let outcomes = Orchestrator::new(config, source).collect().await;
        let ReleaseOutcome::Package(package) = &outcomes[0] else {
            panic!("expected a package");
        };
        assert_eq!(
            package.chart.values.0,
            json!({"monitorNamespace": "monitoring", "replicas": 1})
        );
    }
}
