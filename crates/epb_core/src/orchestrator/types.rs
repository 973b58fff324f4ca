//! Core types for the episode pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::config::Settings;
use crate::logging::EpisodeLogger;
use crate::media::{DurationProbe, Encoder};
use crate::models::{Script, TimingManifest};
use crate::render::FramePainter;
use crate::synthesis::SpeechSynthesizer;

/// Progress callback: (step_name, percent_complete, message).
pub type ProgressCallback = Box<dyn Fn(&str, u32, &str) + Send + Sync>;

/// External collaborators shared by every episode of a batch.
#[derive(Clone)]
pub struct Services {
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub encoder: Arc<dyn Encoder>,
    pub probe: Arc<dyn DurationProbe>,
    pub painter: Arc<dyn FramePainter>,
}

/// Read-only context passed to pipeline steps.
///
/// Mutable results go in [`JobState`].
pub struct Context {
    pub script: Script,
    pub settings: Settings,
    /// Episode identifier; names the published artifacts.
    pub episode: String,
    /// Scoped working directory for this run.
    pub work_dir: PathBuf,
    /// Where artifacts are published.
    pub output_dir: PathBuf,
    pub logger: Arc<EpisodeLogger>,
    pub services: Services,
    progress_callback: Option<ProgressCallback>,
}

impl Context {
    pub fn new(
        script: Script,
        settings: Settings,
        episode: impl Into<String>,
        work_dir: PathBuf,
        output_dir: PathBuf,
        logger: Arc<EpisodeLogger>,
        services: Services,
    ) -> Self {
        Self {
            script,
            settings,
            episode: episode.into(),
            work_dir,
            output_dir,
            logger,
            services,
            progress_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn report_progress(&self, step_name: &str, percent: u32, message: &str) {
        if let Some(ref callback) = self.progress_callback {
            callback(step_name, percent, message);
        }
    }
}

/// Results accumulated by the steps of one run.
///
/// Each step writes its own section once; later steps read earlier ones.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobState {
    pub episode: String,
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishOutput>,
}

impl JobState {
    pub fn new(episode: impl Into<String>) -> Self {
        Self {
            episode: episode.into(),
            started_at: Some(chrono::Local::now().to_rfc3339()),
            ..Default::default()
        }
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn manifest(&self) -> Option<&TimingManifest> {
        self.audio.as_ref().map(|a| &a.manifest)
    }
}

/// Output of the Audio step (files still in the working directory).
#[derive(Debug, Clone, Serialize)]
pub struct AudioOutput {
    pub track: PathBuf,
    pub duration: f64,
    pub manifest: TimingManifest,
}

/// Output of the Video step (files still in the working directory).
#[derive(Debug, Clone, Serialize)]
pub struct VideoOutput {
    pub video: PathBuf,
    pub thumbnail: PathBuf,
    pub clip_count: usize,
    pub duration: f64,
    pub single_clip: bool,
}

/// Final artifact locations.
#[derive(Debug, Clone, Serialize)]
pub struct PublishOutput {
    pub audio: PathBuf,
    pub video: PathBuf,
    pub thumbnail: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,
}

impl PublishOutput {
    pub fn paths(&self) -> Vec<&PathBuf> {
        let mut paths = vec![&self.audio, &self.video, &self.thumbnail];
        paths.extend(self.manifest.as_ref());
        paths
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    /// Skipped with a reason (not an error).
    Skipped(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ManifestBuilder, TimingEntry};

    #[test]
    fn job_state_tracks_completion() {
        let mut state = JobState::new("ep_001");
        assert!(!state.has_audio());
        assert!(state.manifest().is_none());

        let mut builder = ManifestBuilder::new();
        builder.push(TimingEntry::thumbnail(0.5)).unwrap();
        state.audio = Some(AudioOutput {
            track: PathBuf::from("/w/audio.mp3"),
            duration: 1.0,
            manifest: builder.build(),
        });

        assert!(state.has_audio());
        assert_eq!(state.manifest().map(|m| m.len()), Some(1));
    }

    #[test]
    fn job_state_serializes() {
        let state = JobState::new("ep_002");
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"episode\":\"ep_002\""));
        assert!(!json.contains("\"audio\""));
    }

    #[test]
    fn publish_paths_include_optional_manifest() {
        let mut output = PublishOutput {
            audio: PathBuf::from("a.mp3"),
            video: PathBuf::from("a.mp4"),
            thumbnail: PathBuf::from("a_thumb.png"),
            manifest: None,
        };
        assert_eq!(output.paths().len(), 3);
        output.manifest = Some(PathBuf::from("a.timings.json"));
        assert_eq!(output.paths().len(), 4);
    }
}
