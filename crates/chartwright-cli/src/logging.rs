//! Tracing subscriber setup

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber, logging to stderr
///
/// `RUST_LOG` wins over `level`; an unknown `level` falls back to `info`.
pub fn init(level: Option<&str>) {
    let (default_level, invalid) = resolve_level(level);

    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();

    if let Some(level) = invalid {
        tracing::warn!(level, "invalid log level, falling back to info");
    }
}

/// Level to filter at, plus the rejected input when it was not a level
fn resolve_level(level: Option<&str>) -> (LevelFilter, Option<String>) {
    match level.map(str::trim).filter(|l| !l.is_empty()) {
        None => (LevelFilter::INFO, None),
        Some(level) => match level.parse::<LevelFilter>() {
            Ok(filter) => (filter, None),
            Err(_) => (LevelFilter::INFO, Some(level.to_string())),
        },
    }
}
