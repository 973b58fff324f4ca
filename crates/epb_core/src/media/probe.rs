//! Duration probe.
//!
//! Measures the playback duration of a finished media file with ffprobe.
//! Both assembly stages measure through the [`DurationProbe`] trait so the
//! pipeline can be exercised without ffprobe installed.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use super::runner::{ToolCommand, ToolError, ToolRunner};
use crate::logging::EpisodeLogger;

/// Errors from measuring a file's duration.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Cannot probe missing file: {0}")]
    NotFound(PathBuf),

    #[error("Failed to probe '{path}': {source}")]
    Tool {
        path: PathBuf,
        #[source]
        source: ToolError,
    },

    #[error("No duration reported for '{path}' (got '{output}')")]
    NoDuration { path: PathBuf, output: String },
}

/// Something that can measure playback duration in seconds.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<f64, ProbeError>;
}

/// ffprobe-backed duration probe.
pub struct FfprobeProbe {
    program: String,
    runner: ToolRunner,
}

impl FfprobeProbe {
    pub fn new(program: impl Into<String>, runner: ToolRunner) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }

    fn command(&self, path: &Path) -> ToolCommand {
        ToolCommand::new(&self.program)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
    }
}

#[async_trait]
impl DurationProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> Result<f64, ProbeError> {
        if tokio::fs::metadata(path).await.is_err() {
            return Err(ProbeError::NotFound(path.to_path_buf()));
        }

        let output = self
            .runner
            .run(&self.command(path))
            .await
            .map_err(|source| ProbeError::Tool {
                path: path.to_path_buf(),
                source,
            })?;

        parse_duration(&output.stdout).ok_or_else(|| ProbeError::NoDuration {
            path: path.to_path_buf(),
            output: output.stdout.trim().to_string(),
        })
    }
}

/// Parse ffprobe's bare `format=duration` output.
///
/// Returns `None` for `N/A`, empty output, or anything that is not a
/// finite non-negative number.
pub fn parse_duration(output: &str) -> Option<f64> {
    let value = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let seconds = value.parse::<f64>().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then_some(seconds)
}

/// Probe a non-essential measurement, degrading to zero on failure.
///
/// The failure is logged as a warning; the caller continues.
pub async fn probe_or_zero(
    probe: &dyn DurationProbe,
    path: &Path,
    logger: Option<&EpisodeLogger>,
) -> f64 {
    match probe.probe(path).await {
        Ok(seconds) => seconds,
        Err(e) => {
            let message = format!("Duration probe failed, using 0.0s: {}", e);
            match logger {
                Some(logger) => logger.warn(&message),
                None => tracing::warn!("{}", message),
            }
            0.0
        }
    }
}
