//! Chart archive creation
//!
//! Produces Helm-compatible `<name>-<version>.tgz` archives: every entry is
//! rooted at `<name>/`, files listed in `.helmignore` are left out, and headers
//! carry a fixed mode and mtime so archives are reproducible.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use glob::Pattern;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, Header};

use crate::chart::{CHART_FILE, ChartMetadata, HELMIGNORE_FILE};
use crate::error::{ChartError, Result};

/// Archive file name for a chart
#[must_use]
pub fn archive_name(metadata: &ChartMetadata) -> String {
    format!("{}-{}.tgz", metadata.name, metadata.version)
}

/// Package the chart in `chart_dir` into `dest_dir`
///
/// Returns the path of the created archive.
pub fn package_chart(chart_dir: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let metadata = ChartMetadata::load(chart_dir)?;
    metadata.semver()?;

    std::fs::create_dir_all(dest_dir)?;
    let output = dest_dir.join(archive_name(&metadata));
    let ignore = HelmIgnore::load(chart_dir)?;

    tracing::info!(chart = %metadata.name, version = %metadata.version, "packaging chart");

    let file = File::create(&output)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);

    // Chart.yaml first, as helm does
    add_file_to_archive(
        &mut builder,
        &chart_dir.join(CHART_FILE),
        &format!("{}/{CHART_FILE}", metadata.name),
    )?;

    let walker = walkdir::WalkDir::new(chart_dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let rel = relative(chart_dir, e.path());
            !ignore.is_ignored(&rel, e.file_type().is_dir())
        });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = relative(chart_dir, entry.path());
        if rel == CHART_FILE {
            continue;
        }
        add_file_to_archive(
            &mut builder,
            entry.path(),
            &format!("{}/{rel}", metadata.name),
        )?;
    }

    let encoder = builder.into_inner()?;
    encoder.finish()?;

    tracing::info!(archive = %output.display(), "packaged chart");
    Ok(output)
}

/// Read Chart.yaml out of a packaged chart
pub fn read_chart_metadata(archive_path: &Path) -> Result<ChartMetadata> {
    let file = File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_string_lossy().to_string();
        let is_chart_file = path
            .split_once('/')
            .is_some_and(|(_, rest)| rest == CHART_FILE);
        if is_chart_file {
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            return ChartMetadata::from_yaml(&content);
        }
    }

    Err(ChartError::Archive {
        message: format!("{CHART_FILE} not found in {}", archive_path.display()),
    })
}

/// List the entry paths of a packaged chart
pub fn list_archive(archive_path: &Path) -> Result<Vec<String>> {
    let file = File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));

    archive
        .entries()?
        .map(|entry| -> Result<String> { Ok(entry?.path()?.to_string_lossy().to_string()) })
        .collect()
}

/// `.helmignore` patterns
#[derive(Debug, Default)]
struct HelmIgnore {
    patterns: Vec<IgnoreRule>,
}

#[derive(Debug)]
struct IgnoreRule {
    pattern: Pattern,
    dir_only: bool,
    negated: bool,
}

impl HelmIgnore {
    fn load(chart_dir: &Path) -> Result<Self> {
        let path = chart_dir.join(HELMIGNORE_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    fn parse(content: &str) -> Self {
        let patterns = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter_map(|line| {
                let (negated, line) = match line.strip_prefix('!') {
                    Some(rest) => (true, rest),
                    None => (false, line),
                };
                let (dir_only, line) = match line.strip_suffix('/') {
                    Some(rest) => (true, rest),
                    None => (false, line),
                };
                match Pattern::new(line.trim_start_matches('/')) {
                    Ok(pattern) => Some(IgnoreRule {
                        pattern,
                        dir_only,
                        negated,
                    }),
                    Err(e) => {
                        tracing::warn!("ignoring invalid {HELMIGNORE_FILE} pattern '{line}': {e}");
                        None
                    }
                }
            })
            .collect();
        Self { patterns }
    }

    /// Whether `rel` (relative to the chart root) is ignored; the last matching rule wins
    fn is_ignored(&self, rel: &str, is_dir: bool) -> bool {
        let file_name = rel.rsplit('/').next().unwrap_or(rel);
        let mut ignored = false;
        for rule in &self.patterns {
            if rule.dir_only && !is_dir {
                continue;
            }
            if rule.pattern.matches(rel) || rule.pattern.matches(file_name) {
                ignored = !rule.negated;
            }
        }
        ignored
    }
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn add_file_to_archive<W: Write>(
    builder: &mut Builder<W>,
    file_path: &Path,
    archive_path: &str,
) -> Result<()> {
    let content = std::fs::read(file_path)?;
    let mut header = Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();

    builder.append_data(&mut header, archive_path, content.as_slice())?;
    Ok(())
}
