//! Video step - renders clips against the manifest and muxes the track.

use async_trait::async_trait;

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome, VideoOutput};
use crate::video::VideoAssembler;

/// Builds `video.mp4` and the title frame in the working directory.
pub struct VideoStep;

impl VideoStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for VideoStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStep for VideoStep {
    fn name(&self) -> &str {
        "Video"
    }

    fn description(&self) -> &str {
        "Render clips and mux video"
    }

    fn validate_input(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let audio = state
            .audio
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("audio step has not run"))?;
        if !audio.track.exists() {
            return Err(StepError::invalid_input(format!(
                "audio track missing: {}",
                audio.track.display()
            )));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let audio = state
            .audio
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("audio step has not run"))?;
        let settings = &ctx.settings;

        let assembler = VideoAssembler::new(
            ctx.services.painter.clone(),
            ctx.services.encoder.clone(),
            ctx.services.probe.clone(),
        )
        .with_render_concurrency(settings.video.render_concurrency)
        .with_review_max_examples(settings.audio.review_max_examples)
        .with_logger(ctx.logger.clone());

        let output = ctx.work_dir.join("video.mp4");
        let assembled = assembler
            .assemble(&ctx.script, &audio.manifest, &audio.track, &ctx.work_dir, &output)
            .await?;

        let duration = assembled.video_secs();
        let frame = 1.0 / assembled.fps.max(1) as f64;
        if audio.duration > 0.0 && (audio.duration - duration).abs() > frame {
            ctx.logger.warn(&format!(
                "Video {:.3}s does not match audio {:.3}s ({:+.3}s)",
                duration,
                audio.duration,
                duration - audio.duration
            ));
        }

        state.video = Some(VideoOutput {
            video: assembled.path,
            thumbnail: assembled.thumbnail,
            clip_count: assembled.clip_frames.len(),
            duration,
            single_clip: assembled.single_clip,
        });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let video = state
            .video
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("video not recorded"))?;
        for path in [&video.video, &video.thumbnail] {
            if !path.exists() {
                return Err(StepError::invalid_output(format!(
                    "missing output: {}",
                    path.display()
                )));
            }
        }
        if video.clip_count == 0 {
            return Err(StepError::invalid_output("no clips rendered"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Script;
    use crate::orchestrator::steps::AudioStep;
    use crate::testing::{fake_context, line};
    use tempfile::tempdir;

    #[tokio::test]
    async fn requires_audio_first() {
        let dir = tempdir().unwrap();
        let ctx = fake_context(Script::default(), dir.path());
        let err = VideoStep::new()
            .validate_input(&ctx, &JobState::new("ep"))
            .unwrap_err();
        assert!(matches!(err, StepError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn renders_one_clip_per_entry() {
        let dir = tempdir().unwrap();
        let script = Script {
            intro_narration: "はじめます".to_string(),
            dialogue: vec![line("田中", "はい"), line("佐藤", "いいえ")],
            ..Default::default()
        };
        let ctx = fake_context(script, dir.path());
        let mut state = JobState::new("ep");
        AudioStep::new().execute(&ctx, &mut state).await.unwrap();

        let step = VideoStep::new();
        step.validate_input(&ctx, &state).unwrap();
        step.execute(&ctx, &mut state).await.unwrap();
        step.validate_output(&ctx, &state).unwrap();

        let video = state.video.as_ref().unwrap();
        assert_eq!(video.clip_count, 4);
        assert!(!video.single_clip);
    }

    #[tokio::test]
    async fn muxed_video_keeps_whole_track() {
        let dir = tempdir().unwrap();
        let script = Script {
            intro_narration: "はじめます".to_string(),
            dialogue: vec![line("田中", "はい"), line("佐藤", "いいえ")],
            ..Default::default()
        };
        let ctx = fake_context(script, dir.path());
        let mut state = JobState::new("ep");
        AudioStep::new().execute(&ctx, &mut state).await.unwrap();
        VideoStep::new().execute(&ctx, &mut state).await.unwrap();

        let audio = state.audio.as_ref().unwrap();
        let video = state.video.as_ref().unwrap();
        let muxed = ctx.services.probe.probe(&video.video).await.unwrap();
        let frame = 1.0 / 24.0;
        assert!(
            (muxed - audio.duration).abs() <= frame,
            "muxed {:.3}s vs audio {:.3}s",
            muxed,
            audio.duration
        );
        assert!((video.duration - audio.duration).abs() <= frame);
    }
}
