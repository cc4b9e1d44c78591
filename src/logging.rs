//! Tracing setup for the CLI.
//!
//! `RUST_LOG` wins when set; otherwise `info`, or `debug` for this crate with
//! `--verbose`. Output goes to stderr (compact, or JSON with `--log-json`) and,
//! for long-running commands, to a daily-rolling file under `data/logs/`.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Base name of the rolling log files.
pub const LOG_FILE_PREFIX: &str = "textcraft.log";

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub verbose: bool,
    pub json: bool,
    /// Also write logs to a daily file in this directory
    pub log_dir: Option<PathBuf>,
}

impl LogOptions {
    fn default_directive(&self) -> &'static str {
        if self.verbose {
            "info,textcraft=debug"
        } else {
            "info"
        }
    }
}

/// Install the global subscriber. Keep the returned guard alive for as long
/// as file logging should flush; dropping it stops the background writer.
/// Calling this twice leaves the first subscriber in place.
pub fn init(options: &LogOptions) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.default_directive()));

    let (json_layer, compact_layer) = if options.json {
        (
            Some(fmt::layer().json().with_writer(std::io::stderr)),
            None,
        )
    } else {
        (
            None,
            Some(fmt::layer().compact().with_writer(std::io::stderr)),
        )
    };

    let (file_layer, guard) = match &options.log_dir {
        Some(dir) if std::fs::create_dir_all(dir).is_ok() => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        _ => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(compact_layer)
        .with(file_layer)
        .try_init();

    guard
}
