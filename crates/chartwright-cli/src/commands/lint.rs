//! Lint command - check a chart directory

use console::style;
use std::path::Path;

use chartwright_chart::{LintSeverity, Linter};
use chartwright_core::parse_lenient;

use crate::error::{CliError, Result};

pub fn run(path: &Path, kube_version: &str, strict: bool) -> Result<()> {
    let version = parse_lenient(kube_version).map_err(|e| {
        CliError::config_with_help(
            format!("invalid Kubernetes version '{kube_version}': {e}"),
            "use a version such as 1.30 or v1.30.0",
        )
    })?;

    println!(
        "{} Linting chart at {} (Kubernetes {})",
        style("→").blue(),
        path.display(),
        version
    );

    let report = Linter::new(version).lint(path)?;

    if report.findings.is_empty() {
        println!("  {} no findings", style("✓").green());
    }
    for finding in &report.findings {
        let marker = match finding.severity {
            LintSeverity::Error => style("✗").red(),
            LintSeverity::Warning => style("⚠").yellow(),
            LintSeverity::Info => style("ℹ").cyan(),
        };
        println!("  {} {}: {}", marker, finding.path, finding.message);
    }

    let threshold = if strict {
        LintSeverity::Warning
    } else {
        LintSeverity::Error
    };

    println!();
    if report.fails(threshold) {
        println!(
            "{} Linting failed with {} error(s) and {} warning(s)",
            style("✗").red().bold(),
            report.errors(),
            report.warnings()
        );
        return Err(CliError::lint_failed(report.errors(), report.warnings()));
    }

    if report.warnings() > 0 {
        println!(
            "{} Linting passed with {} warning(s)",
            style("⚠").yellow().bold(),
            report.warnings()
        );
    } else {
        println!("{} Linting passed!", style("✓").green().bold());
    }

    Ok(())
}
