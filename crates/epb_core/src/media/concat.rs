//! Concat list handling for lossless stream-copy concatenation.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::encoder::EncoderError;

/// Errors from concatenating segment files.
#[derive(Error, Debug)]
pub enum ConcatError {
    #[error("Nothing to concatenate")]
    Empty,

    #[error("Segment missing from concat list: {0}")]
    MissingSegment(PathBuf),

    #[error("Failed to write concat list '{path}': {source}")]
    ListWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Concatenation failed: {0}")]
    Encoder(#[from] EncoderError),
}

/// Quote a path for the concat demuxer (`file '...'`).
///
/// Single quotes are closed, escaped and reopened; backslashes become
/// forward slashes.
pub fn escape_concat_path(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    format!("'{}'", normalized.replace('\'', r"'\''"))
}

/// Render the concat list for `inputs`.
pub fn render_concat_list(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|p| format!("file {}\n", escape_concat_path(p)))
        .collect()
}

/// Check every input exists, then write the concat list to `list_path`.
///
/// Relative inputs are made absolute first, since the demuxer resolves
/// them against the list file's directory. A missing input fails before
/// anything is written.
pub async fn write_concat_list(inputs: &[PathBuf], list_path: &Path) -> Result<(), ConcatError> {
    if inputs.is_empty() {
        return Err(ConcatError::Empty);
    }

    let mut resolved = Vec::with_capacity(inputs.len());
    for input in inputs {
        if tokio::fs::metadata(input).await.is_err() {
            return Err(ConcatError::MissingSegment(input.clone()));
        }
        let absolute = if input.is_absolute() {
            input.clone()
        } else {
            std::env::current_dir()
                .map_err(|source| ConcatError::ListWrite {
                    path: list_path.to_path_buf(),
                    source,
                })?
                .join(input)
        };
        resolved.push(absolute);
    }

    tokio::fs::write(list_path, render_concat_list(&resolved))
        .await
        .map_err(|source| ConcatError::ListWrite {
            path: list_path.to_path_buf(),
            source,
        })
}
