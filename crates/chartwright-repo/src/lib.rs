//! Chartwright Repo - Remote collaborators
//!
//! This crate talks to everything outside the local chart tree:
//!
//! - **GitHub releases**: latest upstream release and its manifest assets
//! - **GitHub pull requests**: review requests for pushed update branches
//! - **OCI registries**: publishing packaged charts without overwriting versions
//! - **git**: isolated update branches committing only a package's files
//!
//! Each concern sits behind a trait (`ReleaseSource`, `ReviewService`,
//! `VersionControl`) so the release workflow can run against test doubles.

pub mod error;
pub mod git;
pub mod github;
pub mod oci;

pub use error::{RepoError, Result};
pub use git::{GitClient, VersionControl, commit_message};
pub use github::{
    GithubAsset, GithubClient, GithubRelease, GithubReleaseSource, GithubReviewService,
    PullRequest, ReleaseSource, ReviewService, validate_review,
};
pub use oci::{ChartPublisher, chart_reference, parse_reference};
