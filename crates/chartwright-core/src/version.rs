//! Chart version resolution against upstream release tags

use semver::Version;

/// Parse a version the way release tags are usually written
///
/// Accepts a leading `v`, and pads a missing minor or patch component with zero,
/// so `v1.3`, `1.3.0` and `v1.3.0` all parse to `1.3.0`.
pub fn parse_lenient(input: &str) -> Result<Version, semver::Error> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    let split = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split);

    let mut core = core.to_string();
    let parts = core.split('.').count();
    if !core.is_empty() && parts < 3 {
        for _ in parts..3 {
            core.push_str(".0");
        }
    }

    Version::parse(&format!("{core}{suffix}"))
}

/// Pick the chart version to publish for an upstream tag
///
/// Returns `remote` when it is strictly greater than `existing`; otherwise, and
/// whenever `remote` cannot be parsed, the existing version is kept.
pub fn resolve_version(existing: &Version, remote: &str) -> Version {
    match parse_lenient(remote) {
        Ok(remote) if remote > *existing => remote,
        Ok(_) => existing.clone(),
        Err(e) => {
            tracing::warn!(
                remote,
                existing = %existing,
                error = %e,
                "upstream tag is not a semantic version, keeping existing chart version"
            );
            existing.clone()
        }
    }
}
