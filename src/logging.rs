//! Tracing setup for the teledrive server.
//!
//! `RUST_LOG` wins when set. Otherwise the configured level applies to
//! teledrive and its HTTP layer while dependencies stay at `warn`.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::Result;

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Normalize a configured level name, falling back to `info`.
fn level_name(level: &str) -> &'static str {
    let level = level.trim().to_ascii_lowercase();
    let level = if level == "warning" { "warn" } else { level.as_str() };
    LEVELS
        .iter()
        .find(|name| **name == level)
        .copied()
        .unwrap_or("info")
}

/// Filter directives used when `RUST_LOG` is absent.
fn filter_directive(level: &str) -> String {
    let level = level_name(level);
    format!("warn,teledrive={level},tower_http={level}")
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directive(level)))
}

/// Open the log file for appending, creating it and its directory as needed.
///
/// Earlier runs' output is kept.
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Log to the console and to the configured file.
///
/// The file copy is written without ANSI colors.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let log_file = Arc::new(open_log_file(Path::new(&config.file))?);

    tracing_subscriber::registry()
        .with(env_filter(&config.level))
        .with(fmt::layer().with_target(true))
        .with(
            fmt::layer()
                .with_writer(log_file)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    tracing::debug!(file = %config.file, "Logging to file");
    Ok(())
}

/// Log to the console only, used when the log file cannot be opened.
pub fn init_console_only(level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(fmt::layer().with_target(true))
        .init();
}
