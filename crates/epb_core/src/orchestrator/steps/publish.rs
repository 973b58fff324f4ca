//! Publish step - moves finished artifacts into the output folder.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::media::publish_file;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, PublishOutput, StepOutcome};

/// Publishes `<id>.mp3`, `<id>.mp4`, `<id>_thumb.png` and, when enabled,
/// `<id>.timings.json`.
///
/// Either every artifact lands in the output folder or none does.
pub struct PublishStep;

impl PublishStep {
    pub fn new() -> Self {
        Self
    }

    /// Final artifact paths for `episode` under `output_dir`.
    pub fn targets(output_dir: &Path, episode: &str, with_manifest: bool) -> PublishOutput {
        PublishOutput {
            audio: output_dir.join(format!("{}.mp3", episode)),
            video: output_dir.join(format!("{}.mp4", episode)),
            thumbnail: output_dir.join(format!("{}_thumb.png", episode)),
            manifest: with_manifest.then(|| output_dir.join(format!("{}.timings.json", episode))),
        }
    }
}

impl Default for PublishStep {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove already-published files after a later publish failed.
async fn roll_back(published: &[PathBuf]) {
    for path in published {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %e, "Rollback could not remove artifact");
        }
    }
}

#[async_trait]
impl PipelineStep for PublishStep {
    fn name(&self) -> &str {
        "Publish"
    }

    fn description(&self) -> &str {
        "Publish episode artifacts"
    }

    fn validate_input(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        if !state.has_audio() {
            return Err(StepError::precondition_failed("audio step has not run"));
        }
        if !state.has_video() {
            return Err(StepError::precondition_failed("video step has not run"));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let (audio, video) = match (state.audio.as_ref(), state.video.as_ref()) {
            (Some(audio), Some(video)) => (audio, video),
            _ => return Err(StepError::precondition_failed("nothing to publish")),
        };

        let targets = Self::targets(
            &ctx.output_dir,
            &ctx.episode,
            ctx.settings.paths.save_manifest,
        );

        let mut moves: Vec<(PathBuf, PathBuf)> = vec![
            (audio.track.clone(), targets.audio.clone()),
            (video.thumbnail.clone(), targets.thumbnail.clone()),
        ];
        if let Some(ref dest) = targets.manifest {
            let json = audio
                .manifest
                .to_json_pretty()
                .map_err(|e| StepError::io("serializing timing manifest", e.into()))?;
            let staged = ctx.work_dir.join("timings.json");
            tokio::fs::write(&staged, json)
                .await
                .map_err(|e| StepError::io("writing timing manifest", e))?;
            moves.push((staged, dest.clone()));
        }
        // Video last: its presence marks a complete episode
        moves.push((video.video.clone(), targets.video.clone()));

        let mut published = Vec::with_capacity(moves.len());
        for (src, dest) in &moves {
            let existed = dest.exists();
            if let Err(e) = publish_file(src, dest).await {
                if !existed && dest.exists() {
                    published.push(dest.clone());
                }
                roll_back(&published).await;
                return Err(StepError::publish(dest, e));
            }
            ctx.logger.info(&format!("Published {}", dest.display()));
            published.push(dest.clone());
        }

        state.publish = Some(targets);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let output = state
            .publish
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("artifacts not recorded"))?;
        match output.paths().into_iter().find(|p| !p.exists()) {
            Some(missing) => Err(StepError::invalid_output(format!(
                "artifact missing: {}",
                missing.display()
            ))),
            None => Ok(()),
        }
    }
}
