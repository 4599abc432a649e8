//! GitHub REST client
//!
//! Fetches the latest release of an upstream project with its manifest
//! assets, and opens pull requests for generated chart updates.

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use chartwright_core::{ManifestSet, PullRequestSettings, ReleaseDescriptor, resolve_version};

use crate::error::{RepoError, Result};

const GITHUB_JSON: &str = "application/vnd.github+json";
const OCTET_STREAM: &str = "application/octet-stream";
const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const API_VERSION: &str = "2022-11-28";

/// Placeholder in the pull request title replaced by the source branch
pub const BRANCH_PLACEHOLDER: &str = "{branch}";

/// Release metadata, as returned by `GET /repos/{owner}/{repo}/releases/latest`
#[derive(Debug, Clone, Deserialize)]
pub struct GithubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<GithubAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubAsset {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Serialize)]
struct NewPullRequest<'a> {
    title: String,
    head: &'a str,
    base: &'a str,
    body: &'a str,
}

/// Created pull request
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub html_url: String,
}

/// Low level GitHub API client
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_url: String,
}

impl GithubClient {
    /// Client for `api_url`, authenticating with `token` when given
    pub fn new(api_url: &str, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(API_VERSION_HEADER, HeaderValue::from_static(API_VERSION));
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                RepoError::NetworkError {
                    message: format!("Invalid auth token: {e}"),
                }
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("chartwright/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| RepoError::NetworkError {
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &PullRequestSettings) -> Result<Self> {
        Self::new(&settings.api_url, Some(&settings.auth_token))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!("{}{}", self.api_url, path))?)
    }

    /// Latest published release of `owner/repo`
    pub async fn latest_release(&self, owner: &str, repo: &str) -> Result<GithubRelease> {
        let url = self.endpoint(&format!("/repos/{owner}/{repo}/releases/latest"))?;
        let response = self.http.get(url.clone()).header(ACCEPT, GITHUB_JSON).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(RepoError::ReleaseNotFound {
                repo: format!("{owner}/{repo}"),
            }),
            StatusCode::UNAUTHORIZED => Err(RepoError::AuthRequired {
                url: url.to_string(),
            }),
            status if !status.is_success() => Err(RepoError::HttpError {
                status: status.as_u16(),
                message: format!("failed to download release metadata from {url}"),
            }),
            _ => Ok(response.json().await?),
        }
    }

    /// Raw content of a release asset
    pub async fn download_asset(&self, owner: &str, repo: &str, asset: &GithubAsset) -> Result<Vec<u8>> {
        let url = self.endpoint(&format!("/repos/{owner}/{repo}/releases/assets/{}", asset.id))?;
        let response = self.http.get(url.clone()).header(ACCEPT, OCTET_STREAM).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RepoError::HttpError {
                status: status.as_u16(),
                message: format!("failed to download asset {} from {url}", asset.name),
            });
        }

        let data = response.bytes().await?.to_vec();
        tracing::info!(asset = %asset.name, repo, size = data.len(), "downloaded release asset");
        Ok(data)
    }

    /// Open a pull request from `head` into `base`
    pub async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        title: String,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<PullRequest> {
        let url = self.endpoint(&format!("/repos/{owner}/{repo}/pulls"))?;
        let response = self
            .http
            .post(url)
            .header(ACCEPT, GITHUB_JSON)
            .json(&NewPullRequest {
                title,
                head,
                base,
                body,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // 422 usually means the pull request exists or the branch is missing
            let message = response.text().await.unwrap_or_default();
            return Err(RepoError::ReviewFailed {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

/// Where upstream releases come from
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Fetch the latest release of `release`
    ///
    /// Returns `None` when the chart already carries the latest upstream tag.
    async fn fetch(
        &self,
        release: &ReleaseDescriptor,
        existing_version: &Version,
        existing_app_version: &str,
    ) -> Result<Option<ManifestSet>>;
}

/// [`ReleaseSource`] backed by GitHub releases
#[derive(Debug, Clone)]
pub struct GithubReleaseSource {
    client: GithubClient,
}

impl GithubReleaseSource {
    pub fn new(client: GithubClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReleaseSource for GithubReleaseSource {
    async fn fetch(
        &self,
        release: &ReleaseDescriptor,
        existing_version: &Version,
        existing_app_version: &str,
    ) -> Result<Option<ManifestSet>> {
        let slug = release.slug();
        let latest = self.client.latest_release(&release.owner, &release.repo).await?;
        tracing::info!(release = %slug, tag = %latest.tag_name, "latest release");

        if existing_app_version == latest.tag_name {
            tracing::info!(
                chart = %release.chart_name,
                version = %existing_app_version,
                "chart is already up to date"
            );
            return Ok(None);
        }

        let version = resolve_version(existing_version, &latest.tag_name);

        let wanted: Vec<&GithubAsset> = release
            .assets
            .iter()
            .filter_map(|name| {
                let asset = latest.assets.iter().find(|a| &a.name == name);
                if asset.is_none() {
                    tracing::warn!(release = %slug, asset = %name, "asset not attached to release, skipping");
                }
                asset
            })
            .collect();

        let downloads = wanted.iter().map(|asset| async move {
            let data = self
                .client
                .download_asset(&release.owner, &release.repo, asset)
                .await?;
            Ok::<_, RepoError>((asset.name.clone(), data))
        });
        let assets = try_join_all(downloads).await?;
        tracing::info!(release = %slug, assets = assets.len(), "assets downloaded");

        let set = ManifestSet::new(
            &assets,
            version,
            latest.tag_name,
            release.add_values.clone(),
            release.add_crd_values.clone(),
        )?;
        Ok(Some(set))
    }
}

/// Where review requests for pushed branches are opened
#[async_trait]
pub trait ReviewService: Send + Sync {
    /// Request review of `source_branch` into `default_branch`, returning the review number
    async fn create_review(&self, default_branch: &str, source_branch: &str) -> Result<u64>;
}

/// [`ReviewService`] opening GitHub pull requests
#[derive(Debug, Clone)]
pub struct GithubReviewService {
    client: GithubClient,
    settings: PullRequestSettings,
}

impl GithubReviewService {
    pub fn new(client: GithubClient, settings: PullRequestSettings) -> Self {
        Self { client, settings }
    }
}

/// Reject review requests that cannot be valid
pub fn validate_review(default_branch: &str, source_branch: &str) -> Result<()> {
    if default_branch.is_empty() {
        return Err(RepoError::InvalidReview {
            message: "default branch empty".to_string(),
        });
    }
    if source_branch.is_empty() {
        return Err(RepoError::InvalidReview {
            message: "source branch empty".to_string(),
        });
    }
    if source_branch == default_branch {
        return Err(RepoError::InvalidReview {
            message: "source branch equals default branch".to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl ReviewService for GithubReviewService {
    async fn create_review(&self, default_branch: &str, source_branch: &str) -> Result<u64> {
        validate_review(default_branch, source_branch)?;

        let title = self.settings.title.replace(BRANCH_PLACEHOLDER, source_branch);
        let pr = self
            .client
            .create_pull_request(
                &self.settings.owner,
                &self.settings.repo,
                title,
                source_branch,
                default_branch,
                &self.settings.body,
            )
            .await?;

        tracing::info!(number = pr.number, url = %pr.html_url, "created pull request");
        Ok(pr.number)
    }
}
