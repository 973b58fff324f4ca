//! Video assembly against the timing manifest.
//!
//! One clip per manifest entry, each held for the exact number of frames
//! its duration covers, concatenated by stream copy and muxed with the
//! audio track. Scripts without dialogue get a single title clip spanning
//! the whole track instead.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use thiserror::Error;

use super::segment::{frame_counts, Block, SegmentRenderer};
use crate::logging::EpisodeLogger;
use crate::media::{probe_or_zero, ConcatError, DurationProbe, Encoder, EncoderError, ProbeError};
use crate::models::{BlockKind, Script, TimingManifest};
use crate::render::{FramePainter, RenderError};

/// The manifest and the script disagree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlignmentError {
    #[error("Manifest references dialogue line {index}, but the script has {lines} line(s)")]
    MissingLine { index: usize, lines: usize },

    #[error("Manifest references dialogue line {index}, which has no text")]
    UnspokenLine { index: usize },
}

/// Errors that abort video assembly.
#[derive(Error, Debug)]
pub enum VideoError {
    #[error(transparent)]
    Alignment(#[from] AlignmentError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Failed to join clips: {0}")]
    Concat(#[from] ConcatError),

    #[error("Failed to mux audio onto video: {0}")]
    Mux(#[source] EncoderError),

    #[error("Cannot size single-clip video: {0}")]
    Probe(#[source] ProbeError),
}

/// Result of a successful assembly.
#[derive(Debug, Clone)]
pub struct AssembledVideo {
    /// The muxed output.
    pub path: PathBuf,
    /// The painted title frame.
    pub thumbnail: PathBuf,
    /// Frame count of every rendered clip, in order.
    pub clip_frames: Vec<u64>,
    pub fps: u32,
    /// Whether the single-clip layout was used.
    pub single_clip: bool,
}

impl AssembledVideo {
    /// Duration of the silent video before muxing.
    pub fn video_secs(&self) -> f64 {
        self.clip_frames.iter().sum::<u64>() as f64 / self.fps.max(1) as f64
    }
}

/// Renders and joins the video for one episode.
pub struct VideoAssembler {
    painter: Arc<dyn FramePainter>,
    encoder: Arc<dyn Encoder>,
    probe: Arc<dyn DurationProbe>,
    render_concurrency: usize,
    review_max_examples: usize,
    logger: Option<Arc<EpisodeLogger>>,
}

impl VideoAssembler {
    pub fn new(
        painter: Arc<dyn FramePainter>,
        encoder: Arc<dyn Encoder>,
        probe: Arc<dyn DurationProbe>,
    ) -> Self {
        Self {
            painter,
            encoder,
            probe,
            render_concurrency: 2,
            review_max_examples: 3,
            logger: None,
        }
    }

    pub fn with_render_concurrency(mut self, concurrency: usize) -> Self {
        self.render_concurrency = concurrency.max(1);
        self
    }

    pub fn with_review_max_examples(mut self, max: usize) -> Self {
        self.review_max_examples = max;
        self
    }

    pub fn with_logger(mut self, logger: Arc<EpisodeLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Build the video for `script` timed by `manifest`, with `audio`
    /// muxed in, at `output`.
    pub async fn assemble(
        &self,
        script: &Script,
        manifest: &TimingManifest,
        audio: &Path,
        work_dir: &Path,
        output: &Path,
    ) -> Result<AssembledVideo, VideoError> {
        let renderer = SegmentRenderer::prepare(
            self.painter.clone(),
            self.encoder.clone(),
            script,
            work_dir,
            self.review_max_examples,
        )
        .await?;
        let fps = renderer.fps();

        let single_clip = !manifest.has_dialogue() || !script.has_dialogue();
        let (clips, clip_frames) = if single_clip {
            self.single_clip(&renderer, script, audio).await?
        } else {
            self.per_block(&renderer, script, manifest, audio).await?
        };

        let silent = work_dir.join("video_silent.mp4");
        self.encoder.concat(&clips, &silent).await?;
        self.encoder
            .mux(&silent, audio, output)
            .await
            .map_err(VideoError::Mux)?;

        let assembled = AssembledVideo {
            path: output.to_path_buf(),
            thumbnail: renderer.title_frame().to_path_buf(),
            clip_frames,
            fps,
            single_clip,
        };
        self.info(&format!(
            "Video {:.2}s from {} clip(s) at {} fps",
            assembled.video_secs(),
            assembled.clip_frames.len(),
            fps
        ));
        Ok(assembled)
    }

    /// One title clip held for the probed audio duration.
    async fn single_clip(
        &self,
        renderer: &SegmentRenderer,
        script: &Script,
        audio: &Path,
    ) -> Result<(Vec<PathBuf>, Vec<u64>), VideoError> {
        let seconds = self.probe.probe(audio).await.map_err(VideoError::Probe)?;
        let frames = frame_counts([seconds], renderer.fps())[0].max(1);
        self.info(&format!(
            "No dialogue to align; single title clip for {:.2}s",
            seconds
        ));

        let clip = renderer
            .render(script, &Block::Thumbnail, frames, 0)
            .await?;
        Ok((vec![clip], vec![frames]))
    }

    /// One clip per manifest entry, in manifest order.
    ///
    /// The last clip is held until the end of the audio track, covering
    /// the lead-out silence the manifest does not record.
    async fn per_block(
        &self,
        renderer: &SegmentRenderer,
        script: &Script,
        manifest: &TimingManifest,
        audio: &Path,
    ) -> Result<(Vec<PathBuf>, Vec<u64>), VideoError> {
        let blocks = resolve_blocks(script, manifest)?;
        let fps = renderer.fps();
        let frames = frame_counts(manifest.iter().map(|e| e.duration()), fps);

        let mut jobs: Vec<(usize, Block<'_>, u64)> = blocks
            .into_iter()
            .zip(frames)
            .enumerate()
            .filter_map(|(position, (block, frames))| {
                if frames == 0 {
                    tracing::debug!(block = %block, "Block shorter than half a frame, skipped");
                    None
                } else {
                    Some((position, block, frames))
                }
            })
            .collect();

        let audio_secs = probe_or_zero(self.probe.as_ref(), audio, self.logger.as_deref()).await;
        let audio_frames = frame_counts([audio_secs], fps)[0];
        let clip_frames: u64 = jobs.iter().map(|(_, _, frames)| frames).sum();
        if let Some(last) = jobs.last_mut() {
            if audio_frames > clip_frames {
                let tail = audio_frames - clip_frames;
                let block = last.1;
                tracing::debug!(block = %block, frames = tail, "Holding last clip to end of audio");
                last.2 += tail;
            }
        }

        let total = jobs.len();
        self.info(&format!("Rendering {} clip(s)", total));
        let logger = self.logger.as_deref();

        let renders: Vec<BoxFuture<'_, Result<(PathBuf, u64), RenderError>>> = jobs
            .into_iter()
            .map(|(position, block, frames)| {
                async move {
                    let clip = renderer.render(script, &block, frames, position).await?;
                    if let Some(logger) = logger {
                        logger.progress("Clips", position + 1, total);
                    }
                    Ok((clip, frames))
                }
                .boxed()
            })
            .collect();

        let rendered: Vec<(PathBuf, u64)> = stream::iter(renders)
            .buffered(self.render_concurrency.max(1))
            .try_collect()
            .await?;

        Ok(rendered.into_iter().unzip())
    }

    fn info(&self, message: &str) {
        match self.logger {
            Some(ref logger) => logger.info(message),
            None => tracing::info!("{}", message),
        }
    }
}

/// Match manifest entries to script content; dialogue by line index.
pub fn resolve_blocks<'a>(
    script: &'a Script,
    manifest: &TimingManifest,
) -> Result<Vec<Block<'a>>, AlignmentError> {
    manifest
        .iter()
        .map(|entry| match entry.kind() {
            BlockKind::Thumbnail => Ok(Block::Thumbnail),
            BlockKind::Narration => Ok(Block::Narration),
            BlockKind::Review => Ok(Block::Review),
            BlockKind::Dialogue => {
                // Builder guarantees dialogue entries carry an index
                let index = entry.index().unwrap_or_default();
                let line = script.dialogue.get(index).ok_or(AlignmentError::MissingLine {
                    index,
                    lines: script.dialogue.len(),
                })?;
                if !line.is_spoken() {
                    return Err(AlignmentError::UnspokenLine { index });
                }
                Ok(Block::Dialogue { index, line })
            }
        })
        .collect()
}
