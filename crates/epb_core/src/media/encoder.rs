//! Encoder boundary.
//!
//! The pipeline needs four things from an encoder: silent audio of a
//! given length, a still image held for an exact number of frames,
//! stream-copy concatenation, and muxing audio onto video. [`Encoder`]
//! names exactly those so ffmpeg can be swapped for a native library.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::concat::{write_concat_list, ConcatError};
use super::runner::{ToolCommand, ToolError, ToolRunner};
use crate::config::{AudioSettings, EncoderSettings, VideoSettings};

/// Errors from an encoder invocation.
#[derive(Error, Debug)]
pub enum EncoderError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Encoder produced no output at '{0}'")]
    MissingOutput(PathBuf),

    #[error("Invalid encoder request: {0}")]
    InvalidRequest(String),
}

/// Video format shared by every clip of an episode.
///
/// Concatenation by stream copy is only valid when all inputs agree on
/// these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipFormat {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: String,
    pub pixel_format: String,
}

impl ClipFormat {
    pub fn from_settings(video: &VideoSettings, encoder: &EncoderSettings) -> Self {
        Self {
            width: video.width,
            height: video.height,
            fps: video.fps.max(1),
            codec: encoder.video_codec.clone(),
            pixel_format: encoder.pixel_format.clone(),
        }
    }
}

/// Audio parameters for generated silence and the final mux.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub silence_codec: String,
    pub mux_codec: String,
    pub mux_bitrate: String,
}

impl AudioFormat {
    pub fn from_settings(audio: &AudioSettings, encoder: &EncoderSettings) -> Self {
        Self {
            sample_rate: audio.sample_rate,
            silence_codec: encoder.silence_codec.clone(),
            mux_codec: encoder.audio_codec.clone(),
            mux_bitrate: encoder.audio_bitrate.clone(),
        }
    }
}

#[async_trait]
pub trait Encoder: Send + Sync {
    /// Frame rate every clip is encoded at.
    fn fps(&self) -> u32;

    /// Write `seconds` of silence to `output`.
    async fn silence(&self, seconds: f64, output: &Path) -> Result<(), EncoderError>;

    /// Hold `image` for exactly `frames` frames as a silent clip.
    async fn encode_still(
        &self,
        image: &Path,
        frames: u64,
        output: &Path,
    ) -> Result<(), EncoderError>;

    /// Concatenate `inputs` in order by stream copy.
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), ConcatError>;

    /// Put `audio` under `video`, ending at the shorter of the two.
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), EncoderError>;
}

/// ffmpeg-backed encoder.
pub struct FfmpegEncoder {
    program: String,
    runner: ToolRunner,
    clip: ClipFormat,
    audio: AudioFormat,
}

impl FfmpegEncoder {
    pub fn new(
        program: impl Into<String>,
        runner: ToolRunner,
        clip: ClipFormat,
        audio: AudioFormat,
    ) -> Self {
        Self {
            program: program.into(),
            runner,
            clip,
            audio,
        }
    }

    fn base(&self) -> ToolCommand {
        ToolCommand::new(&self.program).args(["-y", "-hide_banner", "-loglevel", "error"])
    }

    fn silence_command(&self, seconds: f64, output: &Path) -> ToolCommand {
        self.base()
            .args(["-f", "lavfi", "-i"])
            .arg(format!("anullsrc=r={}:cl=mono", self.audio.sample_rate))
            .arg("-t")
            .arg(format!("{:.3}", seconds))
            .arg("-c:a")
            .arg(&self.audio.silence_codec)
            .arg(output)
    }

    fn still_command(&self, image: &Path, frames: u64, output: &Path) -> ToolCommand {
        let fps = self.clip.fps.to_string();
        self.base()
            .args(["-loop", "1", "-framerate"])
            .arg(&fps)
            .arg("-i")
            .arg(image)
            .arg("-frames:v")
            .arg(frames.to_string())
            .arg("-vf")
            .arg(format!(
                "scale={}:{},setsar=1",
                self.clip.width, self.clip.height
            ))
            .arg("-r")
            .arg(&fps)
            .arg("-c:v")
            .arg(&self.clip.codec)
            .arg("-pix_fmt")
            .arg(&self.clip.pixel_format)
            .arg("-an")
            .arg(output)
    }

    fn concat_command(&self, list: &Path, output: &Path) -> ToolCommand {
        self.base()
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(list)
            .args(["-c", "copy"])
            .arg(output)
    }

    fn mux_command(&self, video: &Path, audio: &Path, output: &Path) -> ToolCommand {
        self.base()
            .arg("-i")
            .arg(video)
            .arg("-i")
            .arg(audio)
            .args(["-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy", "-c:a"])
            .arg(&self.audio.mux_codec)
            .arg("-b:a")
            .arg(&self.audio.mux_bitrate)
            .arg("-shortest")
            .arg(output)
    }

    async fn run_to(&self, cmd: ToolCommand, output: &Path) -> Result<(), EncoderError> {
        self.runner.run(&cmd).await?;
        ensure_output(output).await
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    fn fps(&self) -> u32 {
        self.clip.fps
    }

    async fn silence(&self, seconds: f64, output: &Path) -> Result<(), EncoderError> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(EncoderError::InvalidRequest(format!(
                "silence duration must be positive, got {}",
                seconds
            )));
        }
        self.run_to(self.silence_command(seconds, output), output)
            .await
    }

    async fn encode_still(
        &self,
        image: &Path,
        frames: u64,
        output: &Path,
    ) -> Result<(), EncoderError> {
        if frames == 0 {
            return Err(EncoderError::InvalidRequest(
                "clip must have at least one frame".to_string(),
            ));
        }
        self.run_to(self.still_command(image, frames, output), output)
            .await
    }

    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), ConcatError> {
        let list = concat_list_path(output);
        write_concat_list(inputs, &list).await?;
        self.run_to(self.concat_command(&list, output), output)
            .await?;
        let _ = tokio::fs::remove_file(&list).await;
        Ok(())
    }

    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), EncoderError> {
        self.run_to(self.mux_command(video, audio, output), output)
            .await
    }
}

/// List file written next to the concat output.
fn concat_list_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "concat".to_string());
    output.with_file_name(format!("{}.concat.txt", stem))
}

/// Fail unless `path` exists and is non-empty.
pub(crate) async fn ensure_output(path: &Path) -> Result<(), EncoderError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(EncoderError::MissingOutput(path.to_path_buf())),
    }
}

/// Check that an encoder tool can be started (`<tool> -version`).
pub async fn check_tool(program: &str, timeout: Duration) -> Result<String, ToolError> {
    let output = ToolRunner::new(timeout)
        .run(&ToolCommand::new(program).arg("-version"))
        .await?;
    Ok(output.stdout.lines().next().unwrap_or_default().to_string())
}
