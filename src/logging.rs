//! Tracing subscriber setup.
//!
//! Logs go to stderr so they interleave sanely with the progress bars, or
//! to a file through a non-blocking `tracing-appender` writer. `RUST_LOG`
//! always wins over the verbosity flag.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Default filter directive for the given verbosity.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "portfolio_harness=debug,info"
    } else {
        "info"
    }
}

/// Install the global subscriber.
///
/// When `log_file` is set, the returned guard must be held until exit so
/// buffered lines are flushed.
pub fn init_tracing(
    verbose: bool,
    format: LogFormat,
    log_file: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let (writer, guard) = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            (
                fmt::writer::BoxMakeWriter::new(writer),
                Some(guard),
            )
        }
        None => (fmt::writer::BoxMakeWriter::new(std::io::stderr), None),
    };
    let ansi = log_file.is_none();

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_ansi(ansi).with_writer(writer))
            .try_init(),
    };
    installed.context("Failed to install tracing subscriber")?;

    Ok(guard)
}
