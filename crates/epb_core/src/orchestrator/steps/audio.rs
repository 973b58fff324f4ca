//! Audio step - synthesizes speech and assembles the timed track.

use async_trait::async_trait;

use crate::audio::{AssemblyConfig, AudioAssembler};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{AudioOutput, Context, JobState, StepOutcome};
use crate::synthesis::VoiceTable;

/// Builds `audio.mp3` and the timing manifest in the working directory.
pub struct AudioStep;

impl AudioStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AudioStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStep for AudioStep {
    fn name(&self) -> &str {
        "Audio"
    }

    fn description(&self) -> &str {
        "Synthesize speech and assemble audio track"
    }

    fn validate_input(&self, ctx: &Context, state: &JobState) -> StepResult<()> {
        if state.has_audio() {
            return Err(StepError::precondition_failed("audio already assembled"));
        }
        if !ctx.work_dir.is_dir() {
            return Err(StepError::invalid_input(format!(
                "working directory missing: {}",
                ctx.work_dir.display()
            )));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let settings = &ctx.settings;
        let spoken = ctx.script.spoken_lines().count();
        ctx.logger.info(&format!(
            "Script: {} dialogue line(s), {} spoken, narration {}",
            ctx.script.dialogue.len(),
            spoken,
            if ctx.script.narration().is_some() { "present" } else { "absent" }
        ));

        let assembler = AudioAssembler::new(
            ctx.services.synthesizer.clone(),
            ctx.services.encoder.clone(),
            ctx.services.probe.clone(),
            VoiceTable::from_settings(&settings.synthesis),
            AssemblyConfig::from_settings(&settings.audio, &settings.synthesis),
        )
        .with_logger(ctx.logger.clone());

        let output = ctx.work_dir.join("audio.mp3");
        let assembled = assembler
            .assemble(&ctx.script, &ctx.work_dir, &output)
            .await?;

        state.audio = Some(AudioOutput {
            track: assembled.path,
            duration: assembled.duration,
            manifest: assembled.manifest,
        });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let audio = state
            .audio
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("audio not recorded"))?;
        if !audio.track.exists() {
            return Err(StepError::invalid_output(format!(
                "audio track missing: {}",
                audio.track.display()
            )));
        }
        if audio.manifest.is_empty() {
            return Err(StepError::invalid_output("timing manifest is empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Script;
    use crate::testing::{fake_context, line};
    use tempfile::tempdir;

    #[tokio::test]
    async fn records_track_and_manifest() {
        let dir = tempdir().unwrap();
        let script = Script {
            dialogue: vec![line("田中", "はい"), line("佐藤", "いいえ")],
            ..Default::default()
        };
        let ctx = fake_context(script, dir.path());
        let mut state = JobState::new("ep");
        let step = AudioStep::new();

        step.validate_input(&ctx, &state).unwrap();
        assert_eq!(step.execute(&ctx, &mut state).await.unwrap(), StepOutcome::Success);
        step.validate_output(&ctx, &state).unwrap();

        let manifest = state.manifest().unwrap();
        assert_eq!(manifest.dialogue_count(), 2);
    }

    #[test]
    fn refuses_second_run() {
        let dir = tempdir().unwrap();
        let ctx = fake_context(Script::default(), dir.path());
        let mut state = JobState::new("ep");
        state.audio = Some(AudioOutput {
            track: dir.path().join("audio.mp3"),
            duration: 0.0,
            manifest: crate::models::ManifestBuilder::new().build(),
        });
        assert!(AudioStep::new().validate_input(&ctx, &state).is_err());
    }
}
