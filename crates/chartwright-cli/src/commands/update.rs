//! Update command - regenerate charts from upstream releases and open pull requests

use console::style;
use std::path::Path;
use std::sync::Arc;

use chartwright_core::Config;
use chartwright_repo::{GitClient, GithubClient, GithubReleaseSource, GithubReviewService};

use crate::error::Result;
use crate::orchestrator::{Orchestrator, ReleaseOutcome, Submission, submit};
use crate::util::plural;

pub async fn run(config: Config) -> Result<()> {
    config.validate()?;
    let config = Arc::new(config);

    println!(
        "{} Checking {} for updates",
        style("→").blue(),
        plural(config.github_releases.len(), "release")
    );

    let client = GithubClient::from_settings(&config.pr)?;
    let orchestrator = Orchestrator::new(
        Arc::clone(&config),
        GithubReleaseSource::new(client.clone()),
    );
    let outcomes = orchestrator.collect().await;
    print_outcomes(&outcomes);

    let packages = outcomes
        .iter()
        .filter(|o| matches!(o, ReleaseOutcome::Package(_)))
        .count();

    if config.offline {
        tracing::info!("offline mode, skipping git operations");
        return Ok(());
    }
    if packages == 0 {
        return Ok(());
    }

    let vcs = GitClient::open(
        Path::new("."),
        &config.git,
        Some(&config.pr.auth_token),
        config.git_timeout,
    )
    .await?;
    let reviews = GithubReviewService::new(client, config.pr.clone());

    let submissions = submit(&outcomes, &vcs, &reviews, &config.pr.default_branch).await?;
    print_submissions(&submissions);

    Ok(())
}

fn print_outcomes(outcomes: &[ReleaseOutcome]) {
    for outcome in outcomes {
        match outcome {
            ReleaseOutcome::Package(package) => println!(
                "  {} {} {} ({})",
                style("✓").green(),
                package.chart_names().join(", "),
                package.version,
                package.app_version
            ),
            ReleaseOutcome::Skipped { .. } => {
                println!("  {} {} is up to date", style("-").dim(), outcome.chart())
            }
            ReleaseOutcome::Failed { error, .. } => {
                println!("  {} {}: {}", style("✗").red(), outcome.chart(), error)
            }
        }
    }
}

fn print_submissions(submissions: &[Submission]) {
    if submissions.is_empty() {
        return;
    }
    println!();
    for submission in submissions {
        match submission.review {
            Some(number) => println!(
                "  {} {} → pull request #{}",
                style("✓").green(),
                submission.branch,
                number
            ),
            None => println!(
                "  {} {} already exists, skipped",
                style("⚠").yellow(),
                submission.branch
            ),
        }
    }
}
