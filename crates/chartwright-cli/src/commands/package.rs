//! Package command - create a Helm chart archive

use console::style;
use std::path::Path;

use chartwright_chart::{ChartMetadata, list_archive, package_chart};

use crate::error::Result;
use crate::util::format_size;

pub fn run(path: &Path, destination: &Path) -> Result<()> {
    let metadata = ChartMetadata::load(path)?;

    println!(
        "{} {} v{}",
        style("Packaging").cyan().bold(),
        metadata.name,
        metadata.version
    );

    let archive = package_chart(path, destination)?;
    let size = std::fs::metadata(&archive)?.len();

    println!("  {} {}", style("Created").green().bold(), archive.display());
    println!("  {} {}", style("Size").dim(), format_size(size));

    println!();
    println!("{}:", style("Contents").bold());
    for entry in list_archive(&archive)? {
        println!("  {entry}");
    }

    Ok(())
}
