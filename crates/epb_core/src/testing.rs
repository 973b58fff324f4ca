//! Fake collaborators for tests.
//!
//! Media files written by the fakes hold their duration as text
//! (`dur:<seconds>`), so probing, concatenation and muxing can be checked
//! arithmetically without ffmpeg or network access.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;
use parking_lot::Mutex;

use crate::config::Settings;
use crate::logging::{EpisodeLogger, LogConfig};
use crate::media::{ConcatError, DurationProbe, Encoder, EncoderError, ProbeError};
use crate::models::{DialogueLine, Script};
use crate::orchestrator::{Context, Services};
use crate::render::{Frame, FramePainter, RenderError};
use crate::synthesis::{SpeechRequest, SpeechSynthesizer, SynthesisError};

/// Dialogue line with just a speaker and source text.
pub fn line(speaker: &str, text: &str) -> DialogueLine {
    DialogueLine {
        speaker: speaker.to_string(),
        text_jp: text.to_string(),
        ..Default::default()
    }
}

fn parse_fake_duration(content: &str) -> Option<f64> {
    content
        .lines()
        .next()?
        .trim()
        .strip_prefix("dur:")?
        .parse::<f64>()
        .ok()
}

async fn read_fake_duration(path: &Path) -> Option<f64> {
    let content = tokio::fs::read_to_string(path).await.ok()?;
    parse_fake_duration(&content)
}

/// Probe that reads `dur:<seconds>` files.
pub struct FakeProbe;

impl FakeProbe {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DurationProbe for FakeProbe {
    async fn probe(&self, path: &Path) -> Result<f64, ProbeError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|_| ProbeError::NotFound(path.to_path_buf()))?;
        parse_fake_duration(&content).ok_or_else(|| ProbeError::NoDuration {
            path: path.to_path_buf(),
            output: content.trim().to_string(),
        })
    }
}

/// Synthesizer returning `dur:<seconds>` bytes.
///
/// Every text lasts 1.0 s unless configured otherwise.
pub struct FakeSynthesizer {
    durations: HashMap<String, f64>,
    failures: Mutex<HashMap<String, usize>>,
    calls: AtomicUsize,
}

impl FakeSynthesizer {
    pub fn new() -> Self {
        Self {
            durations: HashMap::new(),
            failures: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_duration(mut self, text: &str, seconds: f64) -> Self {
        self.durations.insert(text.to_string(), seconds);
        self
    }

    /// Fail the first `times` calls for `text` with a retryable error.
    pub fn fail_times(self, text: &str, times: usize) -> Self {
        self.failures.lock().insert(text.to_string(), times);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(remaining) = self.failures.lock().get_mut(&request.text) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(SynthesisError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
        }

        let seconds = self.durations.get(&request.text).copied().unwrap_or(1.0);
        Ok(format!("dur:{}", seconds).into_bytes())
    }
}

/// Encoder that writes `dur:<seconds>` files and records what it was asked.
pub struct FakeEncoder {
    fps: u32,
    write_silence: bool,
    silence_calls: AtomicUsize,
    still_frames: Mutex<Vec<u64>>,
    concat_inputs: Mutex<Vec<Vec<PathBuf>>>,
}

impl FakeEncoder {
    pub fn new() -> Self {
        Self {
            fps: 24,
            write_silence: true,
            silence_calls: AtomicUsize::new(0),
            still_frames: Mutex::new(Vec::new()),
            concat_inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Report success for silence without writing the file.
    pub fn skip_silence_output(mut self) -> Self {
        self.write_silence = false;
        self
    }

    pub fn silence_calls(&self) -> usize {
        self.silence_calls.load(Ordering::SeqCst)
    }

    /// Frame counts of every encoded still, in call order.
    pub fn still_frames(&self) -> Vec<u64> {
        self.still_frames.lock().clone()
    }

    pub fn last_concat_inputs(&self) -> Vec<PathBuf> {
        self.concat_inputs.lock().last().cloned().unwrap_or_default()
    }

    async fn write(path: &Path, seconds: f64) -> Result<(), EncoderError> {
        tokio::fs::write(path, format!("dur:{}", seconds))
            .await
            .map_err(|e| EncoderError::InvalidRequest(e.to_string()))
    }
}

#[async_trait]
impl Encoder for FakeEncoder {
    fn fps(&self) -> u32 {
        self.fps
    }

    async fn silence(&self, seconds: f64, output: &Path) -> Result<(), EncoderError> {
        self.silence_calls.fetch_add(1, Ordering::SeqCst);
        if self.write_silence {
            Self::write(output, seconds).await?;
        }
        Ok(())
    }

    async fn encode_still(
        &self,
        image: &Path,
        frames: u64,
        output: &Path,
    ) -> Result<(), EncoderError> {
        if frames == 0 {
            return Err(EncoderError::InvalidRequest("zero frames".to_string()));
        }
        if !image.exists() {
            return Err(EncoderError::MissingOutput(image.to_path_buf()));
        }
        self.still_frames.lock().push(frames);
        Self::write(output, frames as f64 / self.fps as f64).await
    }

    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), ConcatError> {
        if inputs.is_empty() {
            return Err(ConcatError::Empty);
        }
        let mut total = 0.0;
        for input in inputs {
            match read_fake_duration(input).await {
                Some(seconds) => total += seconds,
                None => return Err(ConcatError::MissingSegment(input.clone())),
            }
        }
        self.concat_inputs.lock().push(inputs.to_vec());
        Self::write(output, total).await?;
        Ok(())
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), EncoderError> {
        let video_secs = read_fake_duration(video)
            .await
            .ok_or_else(|| EncoderError::MissingOutput(video.to_path_buf()))?;
        let audio_secs = read_fake_duration(audio)
            .await
            .ok_or_else(|| EncoderError::MissingOutput(audio.to_path_buf()))?;
        Self::write(output, video_secs.min(audio_secs)).await
    }
}

/// Painter producing a tiny blank frame and recording what it painted.
pub struct FakePainter {
    painted: Mutex<Vec<String>>,
}

impl FakePainter {
    pub fn new() -> Self {
        Self {
            painted: Mutex::new(Vec::new()),
        }
    }

    /// Short description of every painted frame, in call order.
    pub fn painted(&self) -> Vec<String> {
        self.painted.lock().clone()
    }
}

impl FramePainter for FakePainter {
    fn paint(&self, frame: &Frame) -> Result<RgbImage, RenderError> {
        let label = match frame {
            Frame::Title(card) => format!("title:{}", card.title),
            Frame::Dialogue(card) => format!("dialogue:{}:{}", card.slot, card.text_jp),
            Frame::Review(card) => format!("review:{}", card.items.len()),
        };
        self.painted.lock().push(label);
        Ok(RgbImage::new(8, 8))
    }
}

/// Services backed entirely by the fakes above.
pub fn fake_services() -> Services {
    Services {
        synthesizer: Arc::new(FakeSynthesizer::new()),
        encoder: Arc::new(FakeEncoder::new()),
        probe: Arc::new(FakeProbe::new()),
        painter: Arc::new(FakePainter::new()),
    }
}

/// Context for episode `ep_test` rooted at `root`.
///
/// `root/work` is created; `root/out` is left for publishing to create.
pub fn fake_context(script: Script, root: &Path) -> Context {
    let work_dir = root.join("work");
    std::fs::create_dir_all(&work_dir).unwrap();
    let logger = EpisodeLogger::new("ep_test", root.join("logs"), LogConfig::default(), None)
        .unwrap();
    Context::new(
        script,
        Settings::default(),
        "ep_test",
        work_dir,
        root.join("out"),
        Arc::new(logger),
        fake_services(),
    )
}
