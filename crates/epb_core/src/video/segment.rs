//! Per-block clip rendering.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::media::Encoder;
use crate::models::{BlockKind, DialogueLine, Script};
use crate::render::{
    save_frame, DialogueCard, Frame, FramePainter, RenderError, ReviewCard, TitleCard,
};

/// A manifest entry resolved against the script.
#[derive(Debug, Clone, Copy)]
pub enum Block<'a> {
    Thumbnail,
    /// Shown with the title frame.
    Narration,
    Dialogue {
        index: usize,
        line: &'a DialogueLine,
    },
    Review,
}

impl Block<'_> {
    pub fn kind(&self) -> BlockKind {
        match self {
            Block::Thumbnail => BlockKind::Thumbnail,
            Block::Narration => BlockKind::Narration,
            Block::Dialogue { .. } => BlockKind::Dialogue,
            Block::Review => BlockKind::Review,
        }
    }
}

impl std::fmt::Display for Block<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Block::Dialogue { index, .. } => write!(f, "dialogue {}", index),
            other => write!(f, "{}", other.kind()),
        }
    }
}

/// Frame count per block, from cumulative rounding.
///
/// Block `i` gets `round(end_i * fps) - round(start_i * fps)` frames, so
/// rounding never accumulates: every boundary lands on the frame nearest
/// its true time and the counts sum to `round(total * fps)`.
pub fn frame_counts<I>(durations: I, fps: u32) -> Vec<u64>
where
    I: IntoIterator<Item = f64>,
{
    let fps = fps.max(1) as f64;
    let mut elapsed = 0.0_f64;
    let mut emitted = 0_u64;

    durations
        .into_iter()
        .map(|duration| {
            elapsed += duration.max(0.0);
            let boundary = (elapsed * fps).round() as u64;
            let frames = boundary.saturating_sub(emitted);
            emitted = emitted.max(boundary);
            frames
        })
        .collect()
}

/// Renders blocks to silent clips of exact frame counts.
///
/// The title frame is painted once and shared by the thumbnail and
/// narration blocks.
pub struct SegmentRenderer {
    painter: Arc<dyn FramePainter>,
    encoder: Arc<dyn Encoder>,
    work_dir: PathBuf,
    title_frame: PathBuf,
    review_max_examples: usize,
}

impl SegmentRenderer {
    /// Paint the title frame into `work_dir` and return a renderer.
    pub async fn prepare(
        painter: Arc<dyn FramePainter>,
        encoder: Arc<dyn Encoder>,
        script: &Script,
        work_dir: &Path,
        review_max_examples: usize,
    ) -> Result<Self, RenderError> {
        let title_frame = work_dir.join("frame_title.png");
        paint_to(
            painter.clone(),
            Frame::Title(TitleCard::from_script(script)),
            title_frame.clone(),
        )
        .await?;

        Ok(Self {
            painter,
            encoder,
            work_dir: work_dir.to_path_buf(),
            title_frame,
            review_max_examples,
        })
    }

    /// The painted title frame (also published as the thumbnail).
    pub fn title_frame(&self) -> &Path {
        &self.title_frame
    }

    pub fn fps(&self) -> u32 {
        self.encoder.fps()
    }

    /// Render `block` held for `frames` frames; `position` orders the
    /// clip files.
    pub async fn render(
        &self,
        script: &Script,
        block: &Block<'_>,
        frames: u64,
        position: usize,
    ) -> Result<PathBuf, RenderError> {
        let image = match block {
            Block::Thumbnail | Block::Narration => self.title_frame.clone(),
            Block::Dialogue { index, line } => {
                let path = self.work_dir.join(format!("frame_line_{:03}.png", index));
                let card = DialogueCard::from_line(script, line);
                paint_to(self.painter.clone(), Frame::Dialogue(card), path.clone()).await?;
                path
            }
            Block::Review => {
                let path = self.work_dir.join("frame_review.png");
                let card = ReviewCard::from_script(script, self.review_max_examples);
                paint_to(self.painter.clone(), Frame::Review(card), path.clone()).await?;
                path
            }
        };

        let clip = self.work_dir.join(format!("clip_{:03}.mp4", position));
        self.encoder
            .encode_still(&image, frames, &clip)
            .await
            .map_err(|e| RenderError::encode(block.to_string(), e))?;

        tracing::debug!(block = %block, frames, clip = %clip.display(), "Rendered clip");
        Ok(clip)
    }
}

/// Paint on a blocking thread and save as PNG.
async fn paint_to(
    painter: Arc<dyn FramePainter>,
    frame: Frame,
    path: PathBuf,
) -> Result<(), RenderError> {
    tokio::task::spawn_blocking(move || {
        let image = painter.paint(&frame)?;
        save_frame(&image, &path)
    })
    .await
    .map_err(|e| RenderError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::EncoderError;
    use crate::testing::{line, FakeEncoder, FakePainter};
    use tempfile::tempdir;

    #[test]
    fn scenario_frame_counts() {
        let counts = frame_counts([0.5, 4.2, 2.8, 3.1], 24);
        assert_eq!(counts, vec![12, 101, 67, 74]);
        assert_eq!(counts.iter().sum::<u64>(), (10.6_f64 * 24.0).round() as u64);
    }

    #[test]
    fn frame_counts_are_deterministic() {
        let durations = [0.5, 1.234, 2.71, 0.04, 3.333];
        assert_eq!(frame_counts(durations, 30), frame_counts(durations, 30));
    }

    #[test]
    fn rounding_does_not_accumulate() {
        // 100 blocks of 1.02s at 24fps: per-block rounding would give
        // 24 frames each (2400 total, 2.0s short).
        let counts = frame_counts(std::iter::repeat(1.02).take(100), 24);
        let total: u64 = counts.iter().sum();
        assert_eq!(total, 2448);
        assert!(counts.iter().all(|&c| c == 24 || c == 25));
    }

    #[test]
    fn tiny_block_can_get_zero_frames() {
        assert_eq!(frame_counts([0.01, 1.0], 24), vec![0, 24]);
    }

    #[tokio::test]
    async fn renders_each_variant() {
        let dir = tempdir().unwrap();
        let painter = Arc::new(FakePainter::new());
        let encoder = Arc::new(FakeEncoder::new());
        let script = Script {
            dialogue: vec![line("田中", "はい")],
            ..Default::default()
        };

        let renderer = SegmentRenderer::prepare(
            painter.clone(),
            encoder.clone(),
            &script,
            dir.path(),
            3,
        )
        .await
        .unwrap();
        assert!(renderer.title_frame().exists());

        let blocks = [
            Block::Thumbnail,
            Block::Narration,
            Block::Dialogue {
                index: 0,
                line: &script.dialogue[0],
            },
            Block::Review,
        ];
        for (position, block) in blocks.iter().enumerate() {
            let clip = renderer.render(&script, block, 10, position).await.unwrap();
            assert!(clip.exists());
        }

        // title painted once, reused by thumbnail and narration
        let painted = painter.painted();
        assert_eq!(painted.len(), 3);
        assert!(painted[1].starts_with("dialogue:0:"));
        assert_eq!(encoder.still_frames(), vec![10, 10, 10, 10]);
    }

    #[tokio::test]
    async fn encoder_failure_is_render_error() {
        let dir = tempdir().unwrap();
        let renderer = SegmentRenderer::prepare(
            Arc::new(FakePainter::new()),
            Arc::new(FakeEncoder::new()),
            &Script::default(),
            dir.path(),
            3,
        )
        .await
        .unwrap();

        let err = renderer
            .render(&Script::default(), &Block::Thumbnail, 0, 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::Encode { source: EncoderError::InvalidRequest(_), .. }
        ));
    }
}
