//! Publish command - package every chart and push it to the OCI registry

use console::style;
use std::path::{Path, PathBuf};

use chartwright_chart::chart::CHART_FILE;
use chartwright_chart::package_chart;
use chartwright_core::{Config, PullRequestSettings};
use chartwright_repo::ChartPublisher;

use crate::error::{CliError, Result};
use crate::util::plural;

pub async fn run(config: &Config) -> Result<()> {
    let src_dir = &config.helm.src_dir;
    let target_dir = &config.helm.target_dir;

    if !config.offline && config.helm.remote.is_empty() {
        return Err(CliError::config_with_help(
            "helm.remote is not set",
            "set helm.remote to oci://<registry>/<path>, or pass --offline to only package",
        ));
    }

    let charts = chart_dirs(src_dir)?;
    println!(
        "{} Publishing {} from {}",
        style("→").blue(),
        plural(charts.len(), "chart"),
        src_dir.display()
    );

    let publisher = ChartPublisher::new(registry_credentials(&config.pr));

    for chart_dir in &charts {
        tracing::info!(path = %chart_dir.display(), "found chart directory");
        let archive = package_chart(chart_dir, target_dir)?;
        println!("  {} {}", style("Packaged").green(), archive.display());

        if config.offline {
            tracing::info!("offline mode, not pushing {}", archive.display());
            continue;
        }

        let reference = publisher.publish(&archive, &config.helm.remote).await?;
        println!("  {} {}", style("Pushed").green().bold(), reference);
    }

    println!();
    println!("{} Done", style("✓").green().bold());
    Ok(())
}

/// Chart directories directly under `src_dir`, sorted by name
fn chart_dirs(src_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(src_dir).map_err(|e| {
        CliError::config(format!(
            "failed to read charts directory {}: {e}",
            src_dir.display()
        ))
    })?;

    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if !path.join(CHART_FILE).is_file() {
            tracing::warn!(path = %path.display(), "directory has no {CHART_FILE}, skipping");
            continue;
        }
        dirs.push(path);
    }
    dirs.sort();
    Ok(dirs)
}

/// Registry credentials: the pull request owner and token, when a token is set
fn registry_credentials(pr: &PullRequestSettings) -> Option<(String, String)> {
    if pr.auth_token.is_empty() {
        return None;
    }
    Some((pr.owner.clone(), pr.auth_token.clone()))
}
