//! Still-frame rendering: style, fonts, text wrapping and frame layouts.

mod canvas;
mod fonts;
mod frames;
mod style;
mod wrap;

pub use canvas::Canvas;
pub use fonts::{FontSet, FontSource};
pub use frames::{
    speaker_slot, DialogueCard, EpisodeBadge, Frame, FramePainter, FrameRenderer, ReviewCard,
    ReviewItem, TitleCard,
};
pub use style::{Color, RenderStyle};
pub use wrap::{wrap_text, TextMeasure};

use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;

use crate::media::EncoderError;

/// Errors from rendering frames or encoding them into clips.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Font not found: {0}")]
    FontMissing(PathBuf),

    #[error("Failed to download font from {url}: {message}")]
    FontDownload { url: String, message: String },

    #[error("Failed to parse font '{path}': {message}")]
    FontParse { path: PathBuf, message: String },

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to save frame '{path}': {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to encode {block} clip: {source}")]
    Encode {
        block: String,
        #[source]
        source: EncoderError,
    },

    #[error("Frame rendering task failed: {0}")]
    Task(String),
}

impl RenderError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn encode(block: impl Into<String>, source: EncoderError) -> Self {
        Self::Encode {
            block: block.into(),
            source,
        }
    }
}

/// Write `image` as PNG.
pub fn save_frame(image: &RgbImage, path: &Path) -> Result<(), RenderError> {
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|source| RenderError::Image {
            path: path.to_path_buf(),
            source,
        })
}
