//! GitHub client behavior against a mock API server

use chartwright_core::{PullRequestSettings, ReleaseDescriptor, Values};
use chartwright_repo::{
    GithubClient, GithubReleaseSource, GithubReviewService, ReleaseSource, RepoError,
    ReviewService,
};
use semver::Version;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OPERATOR: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../fixtures/manifests/kubevirt-operator.yaml"
));
const CR: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../fixtures/manifests/kubevirt-cr.yaml"
));

fn kubevirt_release() -> ReleaseDescriptor {
    ReleaseDescriptor {
        owner: "kubevirt".into(),
        repo: "kubevirt".into(),
        assets: vec![
            "kubevirt-operator.yaml".into(),
            "kubevirt-cr.yaml".into(),
            "kubevirt-extra.yaml".into(),
        ],
        chart_name: "kubevirt".into(),
        add_values: Values(json!({"monitorNamespace": "monitoring"})),
        ..Default::default()
    }
}

async fn mount_latest(server: &MockServer, tag: &str) {
    Mock::given(method("GET"))
        .and(path("/repos/kubevirt/kubevirt/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tag_name": tag,
            "assets": [
                {"id": 11, "name": "kubevirt-operator.yaml", "size": OPERATOR.len()},
                {"id": 12, "name": "kubevirt-cr.yaml", "size": CR.len()},
                {"id": 13, "name": "checksums.txt", "size": 10}
            ]
        })))
        .mount(server)
        .await;
}

async fn mount_asset(server: &MockServer, id: u64, body: &[u8], times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/kubevirt/kubevirt/releases/assets/{id}")))
        .and(header("accept", "application/octet-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn fetch_downloads_configured_assets_in_order() {
    let server = MockServer::start().await;
    mount_latest(&server, "v1.3.0").await;
    mount_asset(&server, 11, OPERATOR, 1).await;
    mount_asset(&server, 12, CR, 1).await;
    mount_asset(&server, 13, b"unused", 0).await;

    let source = GithubReleaseSource::new(GithubClient::new(&server.uri(), None).unwrap());
    let set = source
        .fetch(&kubevirt_release(), &Version::new(1, 2, 0), "v1.2.0")
        .await
        .unwrap()
        .expect("a new release");

    assert_eq!(set.version, Version::new(1, 3, 0));
    assert_eq!(set.app_version, "v1.3.0");
    assert_eq!(set.crds.len(), 1);
    assert_eq!(set.manifests.len(), 10);
    assert_eq!(set.manifests.last().unwrap()["kind"], json!("KubeVirt"));
    assert_eq!(set.values.get("monitorNamespace"), Some(&json!("monitoring")));
}

#[tokio::test]
async fn fetch_skips_when_chart_is_current() {
    let server = MockServer::start().await;
    mount_latest(&server, "v1.3.0").await;
    mount_asset(&server, 11, OPERATOR, 0).await;

    let source = GithubReleaseSource::new(GithubClient::new(&server.uri(), None).unwrap());
    let set = source
        .fetch(&kubevirt_release(), &Version::new(1, 3, 0), "v1.3.0")
        .await
        .unwrap();

    assert!(set.is_none());
}

#[tokio::test]
async fn fetch_keeps_chart_version_for_non_semver_tags() {
    let server = MockServer::start().await;
    mount_latest(&server, "release-2024-06").await;
    mount_asset(&server, 11, OPERATOR, 1).await;
    mount_asset(&server, 12, CR, 1).await;

    let source = GithubReleaseSource::new(GithubClient::new(&server.uri(), None).unwrap());
    let set = source
        .fetch(&kubevirt_release(), &Version::new(1, 2, 0), "v1.2.0")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(set.version, Version::new(1, 2, 0));
    assert_eq!(set.app_version, "release-2024-06");
}

#[tokio::test]
async fn fetch_reports_missing_release() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/kubevirt/kubevirt/releases/latest"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let source = GithubReleaseSource::new(GithubClient::new(&server.uri(), None).unwrap());
    let err = source
        .fetch(&kubevirt_release(), &Version::new(0, 1, 0), "")
        .await
        .unwrap_err();

    assert!(matches!(err, RepoError::ReleaseNotFound { .. }));
}

fn pr_settings() -> PullRequestSettings {
    PullRequestSettings {
        owner: "org".into(),
        repo: "charts".into(),
        body: "Generated from the latest upstream release".into(),
        auth_token: "secret-token".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn create_review_opens_pull_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/org/charts/pulls"))
        .and(header("authorization", "Bearer secret-token"))
        .and(body_partial_json(json!({
            "title": "Update update/kubevirt-v1.3.0",
            "head": "update/kubevirt-v1.3.0",
            "base": "main",
            "body": "Generated from the latest upstream release"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "number": 42,
            "html_url": "https://github.com/org/charts/pull/42"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let settings = PullRequestSettings {
        api_url: server.uri(),
        ..pr_settings()
    };
    let reviews = GithubReviewService::new(GithubClient::from_settings(&settings).unwrap(), settings);

    let number = reviews
        .create_review("main", "update/kubevirt-v1.3.0")
        .await
        .unwrap();
    assert_eq!(number, 42);
}

#[tokio::test]
async fn create_review_surfaces_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/org/charts/pulls"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "Validation Failed",
            "errors": [{"message": "A pull request already exists for org:update/kubevirt-v1.3.0."}]
        })))
        .mount(&server)
        .await;

    let settings = PullRequestSettings {
        api_url: server.uri(),
        ..pr_settings()
    };
    let reviews = GithubReviewService::new(GithubClient::from_settings(&settings).unwrap(), settings);

    let err = reviews
        .create_review("main", "update/kubevirt-v1.3.0")
        .await
        .unwrap_err();
    match err {
        RepoError::ReviewFailed { status, message } => {
            assert_eq!(status, 422);
            assert!(message.contains("already exists"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn create_review_rejects_same_branch_without_calling_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let settings = PullRequestSettings {
        api_url: server.uri(),
        ..pr_settings()
    };
    let reviews = GithubReviewService::new(GithubClient::from_settings(&settings).unwrap(), settings);

    let err = reviews.create_review("main", "main").await.unwrap_err();
    assert!(matches!(err, RepoError::InvalidReview { .. }));
}
