//! Audio track assembly.
//!
//! Turns a script into one speech track plus the timing manifest the video
//! stage cuts against. Speech segments are synthesized (concurrently, but
//! collected in script order), each is followed by a fixed pause, every
//! block is measured, and all segments are joined by stream copy.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use thiserror::Error;

use crate::config::{AudioSettings, SynthesisSettings};
use crate::logging::EpisodeLogger;
use crate::media::{probe_or_zero, ConcatError, DurationProbe, Encoder, EncoderError};
use crate::models::{ManifestBuilder, ManifestError, Script, TimingEntry, TimingManifest};
use crate::synthesis::{
    synthesize_to_file, SegmentRef, SpeechRequest, SpeechSynthesizer, SynthesisError, VoiceTable,
};

/// Allowed gap between the measured track and the manifest accounting.
pub const TRACK_TOLERANCE_SECS: f64 = 0.05;

/// Errors that abort audio assembly.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error("Failed to generate {seconds}s of silence: {source}")]
    Silence {
        seconds: f64,
        #[source]
        source: EncoderError,
    },

    #[error("Failed to join audio segments: {0}")]
    Concat(#[from] ConcatError),

    #[error("Timing manifest rejected an entry: {0}")]
    Manifest(#[from] ManifestError),
}

/// Pauses, rates and limits for one assembly.
#[derive(Debug, Clone)]
pub struct AssemblyConfig {
    pub lead_in_secs: f64,
    pub lead_out_secs: f64,
    pub thumbnail_secs: f64,
    pub line_pause_secs: f64,
    pub narration_pause_secs: f64,
    pub section_pause_secs: f64,
    pub narration_rate: f64,
    pub soft_ceiling_secs: f64,
    pub review_enabled: bool,
    pub review_max_examples: usize,
    pub max_attempts: u32,
    pub concurrency: usize,
}

impl AssemblyConfig {
    pub fn from_settings(audio: &AudioSettings, synthesis: &SynthesisSettings) -> Self {
        Self {
            lead_in_secs: audio.lead_in_secs,
            lead_out_secs: audio.lead_out_secs,
            thumbnail_secs: audio.thumbnail_secs,
            line_pause_secs: audio.pause_between_lines_secs,
            narration_pause_secs: audio.pause_after_narration_secs,
            section_pause_secs: audio.pause_between_sections_secs,
            narration_rate: audio.narration_rate,
            soft_ceiling_secs: audio.soft_ceiling_secs,
            review_enabled: audio.review_enabled,
            review_max_examples: audio.review_max_examples,
            max_attempts: synthesis.max_attempts,
            concurrency: synthesis.concurrency,
        }
    }

    /// Track time not covered by manifest entries.
    ///
    /// The thumbnail block plays over the lead-in silence, so only the
    /// difference between the two counts, plus the lead-out.
    pub fn unrecorded_secs(&self) -> f64 {
        self.lead_in_secs - self.thumbnail_secs + self.lead_out_secs
    }
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self::from_settings(&AudioSettings::default(), &SynthesisSettings::default())
    }
}

/// Result of a successful assembly.
#[derive(Debug, Clone)]
pub struct AssembledAudio {
    /// The concatenated track.
    pub path: PathBuf,
    /// Measured duration of the track (0.0 if it could not be probed).
    pub duration: f64,
    pub manifest: TimingManifest,
    /// Track time outside the manifest (see [`AssemblyConfig::unrecorded_secs`]).
    pub unrecorded_secs: f64,
}

impl AssembledAudio {
    /// Difference between the measured track and the manifest accounting.
    pub fn drift_secs(&self) -> f64 {
        self.duration - (self.manifest.total_duration() + self.unrecorded_secs)
    }
}

/// One speech segment to synthesize.
struct SpeechJob {
    segment: SegmentRef,
    request: SpeechRequest,
    path: PathBuf,
}

/// A synthesized and measured speech segment.
struct SpokenSegment {
    segment: SegmentRef,
    path: PathBuf,
    duration: f64,
}

/// A generated silence file, shared by every pause of the same length.
#[derive(Clone)]
struct SilenceClip {
    path: PathBuf,
    duration: f64,
}

/// Assembles the narrated track and its timing manifest.
pub struct AudioAssembler {
    synth: Arc<dyn SpeechSynthesizer>,
    encoder: Arc<dyn Encoder>,
    probe: Arc<dyn DurationProbe>,
    voices: VoiceTable,
    config: AssemblyConfig,
    logger: Option<Arc<EpisodeLogger>>,
}

impl AudioAssembler {
    pub fn new(
        synth: Arc<dyn SpeechSynthesizer>,
        encoder: Arc<dyn Encoder>,
        probe: Arc<dyn DurationProbe>,
        voices: VoiceTable,
        config: AssemblyConfig,
    ) -> Self {
        Self {
            synth,
            encoder,
            probe,
            voices,
            config,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Arc<EpisodeLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    /// Assemble the track for `script` into `output`.
    ///
    /// Intermediate segments are written to `work_dir`. Synthesis failures
    /// (after retries) and concat failures abort; a failed probe of a
    /// segment counts as zero seconds with a warning.
    pub async fn assemble(
        &self,
        script: &Script,
        work_dir: &Path,
        output: &Path,
    ) -> Result<AssembledAudio, AudioError> {
        if (self.config.lead_in_secs - self.config.thumbnail_secs).abs() > f64::EPSILON {
            self.warn(&format!(
                "Lead-in ({:.3}s) differs from thumbnail block ({:.3}s); video will be offset by the difference",
                self.config.lead_in_secs, self.config.thumbnail_secs
            ));
        }

        let jobs = self.plan(script, work_dir);
        self.info(&format!("Synthesizing {} speech segment(s)", jobs.len()));
        let spoken = self.synthesize_all(jobs).await?;

        let mut silences: HashMap<u64, SilenceClip> = HashMap::new();
        let mut segments: Vec<PathBuf> = Vec::new();
        let mut manifest = ManifestBuilder::new();

        if let Some(lead_in) = self.silence(self.config.lead_in_secs, work_dir, &mut silences).await? {
            segments.push(lead_in.path);
        }
        manifest.push(TimingEntry::thumbnail(self.config.thumbnail_secs))?;

        let mut review_secs: Option<f64> = None;
        for spoken in spoken {
            let pause = match spoken.segment {
                SegmentRef::Narration => self.config.narration_pause_secs,
                SegmentRef::Line(_) | SegmentRef::Review(_) => self.config.line_pause_secs,
            };

            if matches!(spoken.segment, SegmentRef::Review(_)) && review_secs.is_none() {
                let mut block = 0.0;
                if let Some(gap) = self
                    .silence(self.config.section_pause_secs, work_dir, &mut silences)
                    .await?
                {
                    segments.push(gap.path);
                    block += gap.duration;
                }
                review_secs = Some(block);
            }

            segments.push(spoken.path);
            let mut duration = spoken.duration;
            if let Some(gap) = self.silence(pause, work_dir, &mut silences).await? {
                segments.push(gap.path);
                duration += gap.duration;
            }

            match spoken.segment {
                SegmentRef::Narration => {
                    manifest.push(TimingEntry::narration(duration))?;
                }
                SegmentRef::Line(index) => {
                    let speaker = script
                        .dialogue
                        .get(index)
                        .map(|l| l.speaker.as_str())
                        .unwrap_or_default();
                    manifest.push(TimingEntry::dialogue(index, duration, speaker))?;
                }
                SegmentRef::Review(_) => {
                    if let Some(total) = review_secs.as_mut() {
                        *total += duration;
                    }
                }
            }
        }
        if let Some(total) = review_secs {
            manifest.push(TimingEntry::review(total))?;
        }

        if let Some(lead_out) = self.silence(self.config.lead_out_secs, work_dir, &mut silences).await? {
            segments.push(lead_out.path);
        }

        self.info(&format!(
            "Joining {} segment(s) ({} distinct pause file(s))",
            segments.len(),
            silences.len()
        ));
        self.encoder.concat(&segments, output).await?;

        let manifest = manifest.build();
        let duration = probe_or_zero(self.probe.as_ref(), output, self.logger.as_deref()).await;
        let assembled = AssembledAudio {
            path: output.to_path_buf(),
            duration,
            manifest,
            unrecorded_secs: self.config.unrecorded_secs(),
        };

        if duration > self.config.soft_ceiling_secs {
            self.warn(&format!(
                "Track is {:.1}s, above the {:.0}s soft ceiling",
                duration, self.config.soft_ceiling_secs
            ));
        }
        if duration > 0.0 && assembled.drift_secs().abs() > TRACK_TOLERANCE_SECS {
            self.warn(&format!(
                "Track is {:.3}s but manifest accounts for {:.3}s",
                duration,
                assembled.manifest.total_duration() + assembled.unrecorded_secs
            ));
        }
        self.info(&format!(
            "Audio track {:.2}s, {} manifest entries ({} dialogue)",
            duration,
            assembled.manifest.len(),
            assembled.manifest.dialogue_count()
        ));

        Ok(assembled)
    }

    /// List speech segments in final temporal order.
    fn plan(&self, script: &Script, work_dir: &Path) -> Vec<SpeechJob> {
        let mut jobs = Vec::new();

        if let Some(text) = script.narration() {
            jobs.push(SpeechJob {
                segment: SegmentRef::Narration,
                request: SpeechRequest::new(
                    text,
                    self.voices.narrator(),
                    self.config.narration_rate,
                ),
                path: work_dir.join("speech_narration.mp3"),
            });
        }

        for (index, line) in script.spoken_lines() {
            jobs.push(SpeechJob {
                segment: SegmentRef::Line(index),
                request: SpeechRequest::new(
                    line.text_jp.trim(),
                    self.voices.voice_for_speaker(&line.speaker),
                    line.rate().factor(),
                ),
                path: work_dir.join(format!("speech_line_{:03}.mp3", index)),
            });
        }

        if self.config.review_enabled {
            for (i, point) in script
                .review_points(self.config.review_max_examples)
                .into_iter()
                .enumerate()
            {
                jobs.push(SpeechJob {
                    segment: SegmentRef::Review(i),
                    request: SpeechRequest::new(
                        point.example_jp.trim(),
                        self.voices.narrator(),
                        self.config.narration_rate,
                    ),
                    path: work_dir.join(format!("speech_review_{:02}.mp3", i)),
                });
            }
        }

        jobs
    }

    /// Synthesize and measure every job, keeping script order.
    async fn synthesize_all(&self, jobs: Vec<SpeechJob>) -> Result<Vec<SpokenSegment>, AudioError> {
        let total = jobs.len();
        let done = AtomicUsize::new(0);
        let done = &done;
        let logger = self.logger.as_deref();

        let results: Vec<SpokenSegment> = stream::iter(jobs)
            .map(|job| async move {
                synthesize_to_file(
                    self.synth.as_ref(),
                    &job.request,
                    &job.path,
                    self.config.max_attempts,
                    job.segment,
                    logger,
                )
                .await?;
                let duration = probe_or_zero(self.probe.as_ref(), &job.path, logger).await;

                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(logger) = logger {
                    logger.progress("Synthesis", finished, total);
                }

                Ok::<_, SynthesisError>(SpokenSegment {
                    segment: job.segment,
                    path: job.path,
                    duration,
                })
            })
            .buffered(self.config.concurrency.max(1))
            .try_collect()
            .await?;

        Ok(results)
    }

    /// Silence of `seconds`, generated once per distinct length.
    ///
    /// Non-positive lengths produce no segment.
    async fn silence(
        &self,
        seconds: f64,
        work_dir: &Path,
        cache: &mut HashMap<u64, SilenceClip>,
    ) -> Result<Option<SilenceClip>, AudioError> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Ok(None);
        }

        let key = (seconds * 1000.0).round() as u64;
        if let Some(clip) = cache.get(&key) {
            return Ok(Some(clip.clone()));
        }

        let path = work_dir.join(format!("silence_{}ms.mp3", key));
        self.encoder
            .silence(seconds, &path)
            .await
            .map_err(|source| AudioError::Silence { seconds, source })?;

        let measured = probe_or_zero(self.probe.as_ref(), &path, self.logger.as_deref()).await;
        // A silence file that cannot be measured still lasts what was asked for
        let duration = if measured > 0.0 { measured } else { seconds };

        let clip = SilenceClip { path, duration };
        cache.insert(key, clip.clone());
        Ok(Some(clip))
    }

    fn info(&self, message: &str) {
        match self.logger {
            Some(ref logger) => logger.info(message),
            None => tracing::info!("{}", message),
        }
    }

    fn warn(&self, message: &str) {
        match self.logger {
            Some(ref logger) => logger.warn(message),
            None => tracing::warn!("{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlockKind, DialogueLine, GrammarPoint};
    use crate::testing::{line, FakeEncoder, FakeProbe, FakeSynthesizer};
    use tempfile::tempdir;

    fn assembler(synth: Arc<FakeSynthesizer>, encoder: Arc<FakeEncoder>) -> AudioAssembler {
        AudioAssembler::new(
            synth,
            encoder,
            Arc::new(FakeProbe::new()),
            VoiceTable::default(),
            AssemblyConfig::default(),
        )
    }

    fn scenario_script() -> Script {
        Script {
            intro_narration: "ナレーション".to_string(),
            dialogue: vec![line("田中", "一行目"), line("佐藤", "二行目")],
            ..Default::default()
        }
    }

    fn scenario_synth() -> Arc<FakeSynthesizer> {
        Arc::new(
            FakeSynthesizer::new()
                .with_duration("ナレーション", 3.2)
                .with_duration("一行目", 2.2)
                .with_duration("二行目", 2.5),
        )
    }

    #[tokio::test]
    async fn scenario_manifest_matches_measurements() {
        let dir = tempdir().unwrap();
        let encoder = Arc::new(FakeEncoder::new());
        let result = assembler(scenario_synth(), encoder.clone())
            .assemble(&scenario_script(), dir.path(), &dir.path().join("track.mp3"))
            .await
            .unwrap();

        let entries = result.manifest.entries();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].kind(), BlockKind::Thumbnail);
        assert!((entries[0].duration() - 0.5).abs() < 1e-9);
        assert_eq!(entries[1].kind(), BlockKind::Narration);
        assert!((entries[1].duration() - 4.2).abs() < 1e-9);
        assert_eq!(entries[2].index(), Some(0));
        assert_eq!(entries[2].speaker(), Some("田中"));
        assert!((entries[2].duration() - 2.8).abs() < 1e-9);
        assert_eq!(entries[3].index(), Some(1));
        assert!((entries[3].duration() - 3.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn manifest_plus_unrecorded_equals_track() {
        let dir = tempdir().unwrap();
        let result = assembler(scenario_synth(), Arc::new(FakeEncoder::new()))
            .assemble(&scenario_script(), dir.path(), &dir.path().join("track.mp3"))
            .await
            .unwrap();

        assert!(result.duration > 0.0);
        assert!(result.drift_secs().abs() < TRACK_TOLERANCE_SECS);
        assert!((result.unrecorded_secs - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn n_spoken_lines_give_n_entries() {
        let dir = tempdir().unwrap();
        let script = Script {
            dialogue: (0..6).map(|i| line("田中", &format!("行{}", i))).collect(),
            ..Default::default()
        };
        let result = assembler(Arc::new(FakeSynthesizer::new()), Arc::new(FakeEncoder::new()))
            .assemble(&script, dir.path(), &dir.path().join("track.mp3"))
            .await
            .unwrap();

        let indices: Vec<_> = result
            .manifest
            .dialogue_entries()
            .map(|e| e.index().unwrap())
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
        assert!(result.manifest.block(BlockKind::Narration).is_none());
    }

    #[tokio::test]
    async fn empty_line_keeps_original_indices() {
        let dir = tempdir().unwrap();
        let script = Script {
            dialogue: vec![
                line("田中", "零"),
                line("佐藤", "一"),
                line("田中", "  "),
                line("佐藤", "三"),
            ],
            ..Default::default()
        };
        let synth = Arc::new(FakeSynthesizer::new());
        let result = assembler(synth.clone(), Arc::new(FakeEncoder::new()))
            .assemble(&script, dir.path(), &dir.path().join("track.mp3"))
            .await
            .unwrap();

        let indices: Vec<_> = result
            .manifest
            .dialogue_entries()
            .map(|e| e.index().unwrap())
            .collect();
        assert_eq!(indices, vec![0, 1, 3]);
        assert_eq!(synth.calls(), 3);
    }

    #[tokio::test]
    async fn no_dialogue_no_narration_is_thumbnail_only() {
        let dir = tempdir().unwrap();
        let result = assembler(Arc::new(FakeSynthesizer::new()), Arc::new(FakeEncoder::new()))
            .assemble(&Script::default(), dir.path(), &dir.path().join("track.mp3"))
            .await
            .unwrap();

        assert_eq!(result.manifest.len(), 1);
        assert_eq!(result.manifest.entries()[0].kind(), BlockKind::Thumbnail);
        assert!((result.manifest.entries()[0].duration() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn silence_is_generated_once_per_length() {
        let dir = tempdir().unwrap();
        let encoder = Arc::new(FakeEncoder::new());
        let script = Script {
            dialogue: (0..5).map(|i| line("田中", &format!("行{}", i))).collect(),
            ..Default::default()
        };
        assembler(Arc::new(FakeSynthesizer::new()), encoder.clone())
            .assemble(&script, dir.path(), &dir.path().join("track.mp3"))
            .await
            .unwrap();

        // lead-in/lead-out (0.5s) and the line pause (0.6s)
        assert_eq!(encoder.silence_calls(), 2);
        let inputs = encoder.last_concat_inputs();
        // lead-in + 5 x (speech + pause) + lead-out
        assert_eq!(inputs.len(), 12);
        assert_eq!(inputs.first(), inputs.last());
    }

    #[tokio::test]
    async fn synthesis_failure_aborts_naming_line() {
        let dir = tempdir().unwrap();
        let synth = Arc::new(FakeSynthesizer::new().fail_times("壊れた", 10));
        let script = Script {
            dialogue: vec![line("田中", "大丈夫"), line("佐藤", "壊れた")],
            ..Default::default()
        };
        let out = dir.path().join("track.mp3");
        let err = assembler(synth, Arc::new(FakeEncoder::new()))
            .assemble(&script, dir.path(), &out)
            .await
            .unwrap_err();

        match err {
            AudioError::Synthesis(SynthesisError::Segment { line, attempts, .. }) => {
                assert_eq!(line, Some(1));
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn concat_of_missing_segment_fails() {
        let dir = tempdir().unwrap();
        let encoder = Arc::new(FakeEncoder::new().skip_silence_output());
        let script = Script {
            dialogue: vec![line("田中", "一")],
            ..Default::default()
        };
        let err = assembler(Arc::new(FakeSynthesizer::new()), encoder)
            .assemble(&script, dir.path(), &dir.path().join("track.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, AudioError::Concat(ConcatError::MissingSegment(_))));
    }

    #[tokio::test]
    async fn review_block_is_recorded_when_enabled() {
        let dir = tempdir().unwrap();
        let mut config = AssemblyConfig::default();
        config.review_enabled = true;
        let script = Script {
            dialogue: vec![DialogueLine {
                speaker: "田中".to_string(),
                text_jp: "はい".to_string(),
                ..Default::default()
            }],
            used_grammar: vec![GrammarPoint {
                form: "〜ます".to_string(),
                example_jp: "行きます。".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let synth = Arc::new(FakeSynthesizer::new().with_duration("行きます。", 1.4));
        let result = AudioAssembler::new(
            synth,
            Arc::new(FakeEncoder::new()),
            Arc::new(FakeProbe::new()),
            VoiceTable::default(),
            config,
        )
        .assemble(&script, dir.path(), &dir.path().join("track.mp3"))
        .await
        .unwrap();

        let review = result.manifest.block(BlockKind::Review).unwrap();
        // section pause + example + line pause
        assert!((review.duration() - (1.5 + 1.4 + 0.6)).abs() < 1e-9);
        assert_eq!(result.manifest.entries().last().unwrap().kind(), BlockKind::Review);
        assert!(result.drift_secs().abs() < TRACK_TOLERANCE_SECS);
    }

    #[tokio::test]
    async fn review_is_off_by_default() {
        let dir = tempdir().unwrap();
        let script = Script {
            dialogue: vec![line("田中", "はい")],
            used_grammar: vec![GrammarPoint {
                example_jp: "行きます。".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let result = assembler(Arc::new(FakeSynthesizer::new()), Arc::new(FakeEncoder::new()))
            .assemble(&script, dir.path(), &dir.path().join("track.mp3"))
            .await
            .unwrap();
        assert!(result.manifest.block(BlockKind::Review).is_none());
    }
}
