//! Error types for the episode pipeline.
//!
//! Errors chain Episode → Step → Stage error → Detail, so a batch summary
//! line names the episode and step while the source chain keeps the cause.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::audio::AudioError;
use crate::render::RenderError;
use crate::video::VideoError;

/// Top-level pipeline error with episode context.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Episode '{episode}' failed at step '{step}': {source}")]
    StepFailed {
        episode: String,
        step: String,
        #[source]
        source: StepError,
    },

    /// The script could not be loaded or checked.
    #[error("Episode '{episode}' failed validation: {message}")]
    ValidationFailed { episode: String, message: String },

    #[error("Episode '{episode}' was cancelled")]
    Cancelled { episode: String },

    /// Working directory or logger could not be created.
    #[error("Episode '{episode}' setup failed: {message}")]
    SetupFailed { episode: String, message: String },
}

impl PipelineError {
    pub fn step_failed(
        episode: impl Into<String>,
        step: impl Into<String>,
        source: StepError,
    ) -> Self {
        Self::StepFailed {
            episode: episode.into(),
            step: step.into(),
            source,
        }
    }

    pub fn validation_failed(episode: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            episode: episode.into(),
            message: message.into(),
        }
    }

    pub fn setup_failed(episode: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SetupFailed {
            episode: episode.into(),
            message: message.into(),
        }
    }

    pub fn cancelled(episode: impl Into<String>) -> Self {
        Self::Cancelled {
            episode: episode.into(),
        }
    }

    /// Name of the failing step, or the phase before any step ran.
    pub fn step(&self) -> &str {
        match self {
            Self::StepFailed { step, .. } => step,
            Self::ValidationFailed { .. } => "validate",
            Self::Cancelled { .. } => "cancelled",
            Self::SetupFailed { .. } => "setup",
        }
    }
}

/// Error from a pipeline step.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("Input validation failed: {0}")]
    InvalidInput(String),

    #[error("Output validation failed: {0}")]
    InvalidOutput(String),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Video(#[from] VideoError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Failed to publish '{path}': {source}")]
    Publish {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("Precondition not met: {0}")]
    PreconditionFailed(String),
}

impl StepError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    pub fn publish(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Publish {
            path: path.into(),
            source,
        }
    }

    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }
}

pub type StepResult<T> = Result<T, StepError>;

pub type PipelineResult<T> = Result<T, PipelineError>;
