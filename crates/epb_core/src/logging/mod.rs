//! Logging infrastructure for Episode Builder.
//!
//! This module provides:
//! - Per-episode loggers with file + callback output
//! - Tail buffer of external tool output for failure diagnosis
//! - Integration with the `tracing` ecosystem
//!
//! # Example
//!
//! ```no_run
//! use epb_core::logging::{EpisodeLogger, LogConfig};
//!
//! let logger = EpisodeLogger::new("ep_001", "/path/to/logs", LogConfig::default(), None).unwrap();
//!
//! logger.phase("Audio");
//! logger.command("ffmpeg -y -f concat ...");
//! logger.success("Audio track assembled");
//! ```

mod episode_logger;
mod types;

pub use episode_logger::{EpisodeLogger, EpisodeLoggerBuilder};
pub use types::{LineCallback, LogConfig, LogLevel, MessagePrefix};

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Respects `RUST_LOG`, falling back to `default_level`. Output goes to
/// stderr and, when `file_dir` is given, also to a daily rolling file in
/// that directory. Keep the returned guard alive for the life of the
/// process so buffered file output is flushed.
///
/// Should be called once at application startup.
pub fn init_tracing(default_level: LogLevel, file_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false);

    match file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "episode-builder.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer().with_writer(writer).with_ansi(false);

            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .try_init();
            None
        }
    }
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
