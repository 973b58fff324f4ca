//! Speech synthesis boundary.
//!
//! The synthesizer itself is an opaque, fallible network call: text plus a
//! voice and a rate go in, encoded audio bytes come out. This module owns
//! the trait, request validation, and the retry policy applied to every
//! segment of an episode.

mod google;
mod voices;

pub use google::GoogleSynthesizer;
pub use voices::VoiceTable;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::logging::EpisodeLogger;

/// Rates the synthesizer accepts.
pub const MIN_RATE: f64 = 0.25;
pub const MAX_RATE: f64 = 4.0;

/// Phrase used by the connectivity check.
const CHECK_PHRASE: &str = "テスト";

/// Errors from synthesizing speech.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("Cannot synthesize empty text")]
    EmptyText,

    #[error("Speaking rate {0} is outside [0.25, 4.0]")]
    RateOutOfRange(f64),

    #[error("API key environment variable '{0}' is not set")]
    MissingApiKey(String),

    #[error("Synthesis request failed: {0}")]
    Request(String),

    #[error("Synthesizer returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Synthesis timed out after {seconds}s")]
    TimedOut { seconds: u64 },

    #[error("Failed to decode synthesized audio: {0}")]
    Decode(String),

    #[error("Synthesizer returned no audio")]
    EmptyAudio,

    #[error("Failed to write audio segment '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A segment still failed after every allowed attempt.
    #[error("Synthesis of {segment} failed after {attempts} attempt(s): {source}")]
    Segment {
        segment: String,
        /// Position in the script's dialogue list, for dialogue lines.
        line: Option<usize>,
        attempts: u32,
        #[source]
        source: Box<SynthesisError>,
    },
}

impl SynthesisError {
    /// Whether another attempt could succeed.
    ///
    /// Invalid requests and client errors (other than rate limiting) fail
    /// the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            SynthesisError::EmptyText
            | SynthesisError::RateOutOfRange(_)
            | SynthesisError::MissingApiKey(_)
            | SynthesisError::Write { .. }
            | SynthesisError::Segment { .. } => false,
            SynthesisError::Status { status, .. } => *status == 429 || *status >= 500,
            SynthesisError::Request(_)
            | SynthesisError::TimedOut { .. }
            | SynthesisError::Decode(_)
            | SynthesisError::EmptyAudio => true,
        }
    }
}

/// A concrete voice understood by the synthesizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub language_code: String,
    pub name: String,
}

/// One synthesis call.
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: Voice,
    pub rate: f64,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, voice: Voice, rate: f64) -> Self {
        Self {
            text: text.into(),
            voice,
            rate,
        }
    }

    pub fn validate(&self) -> Result<(), SynthesisError> {
        if self.text.trim().is_empty() {
            return Err(SynthesisError::EmptyText);
        }
        if !(MIN_RATE..=MAX_RATE).contains(&self.rate) {
            return Err(SynthesisError::RateOutOfRange(self.rate));
        }
        Ok(())
    }
}

/// Converts text to encoded audio bytes.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, SynthesisError>;
}

/// Which part of the script a synthesized segment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentRef {
    Narration,
    /// Dialogue line at this position in the full dialogue list.
    Line(usize),
    /// Review example sentence (zero-based).
    Review(usize),
}

impl SegmentRef {
    fn line(&self) -> Option<usize> {
        match self {
            SegmentRef::Line(index) => Some(*index),
            _ => None,
        }
    }
}

impl std::fmt::Display for SegmentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentRef::Narration => write!(f, "narration"),
            SegmentRef::Line(index) => write!(f, "dialogue line {}", index),
            SegmentRef::Review(index) => write!(f, "review example {}", index),
        }
    }
}

/// Synthesize `request` into `output`, retrying up to `max_attempts`.
///
/// Retries only errors that could succeed on another attempt. The final
/// error is wrapped in [`SynthesisError::Segment`] naming `segment`.
pub async fn synthesize_to_file(
    synth: &dyn SpeechSynthesizer,
    request: &SpeechRequest,
    output: &Path,
    max_attempts: u32,
    segment: SegmentRef,
    logger: Option<&EpisodeLogger>,
) -> Result<(), SynthesisError> {
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let result = match request.validate() {
            Ok(()) => synth.synthesize(request).await,
            Err(e) => Err(e),
        };

        let error = match result {
            Ok(bytes) if bytes.is_empty() => SynthesisError::EmptyAudio,
            Ok(bytes) => {
                return tokio::fs::write(output, bytes)
                    .await
                    .map_err(|source| SynthesisError::Write {
                        path: output.to_path_buf(),
                        source,
                    });
            }
            Err(e) => e,
        };

        if attempt < max_attempts && error.is_retryable() {
            let message = format!(
                "Synthesis of {} failed (attempt {}/{}), retrying: {}",
                segment, attempt, max_attempts, error
            );
            match logger {
                Some(logger) => logger.warn(&message),
                None => tracing::warn!("{}", message),
            }
            continue;
        }

        return Err(SynthesisError::Segment {
            segment: segment.to_string(),
            line: segment.line(),
            attempts: attempt,
            source: Box::new(error),
        });
    }
}

/// Synthesize a short test phrase into `dir` and return the file path.
pub async fn check_synthesizer(
    synth: &dyn SpeechSynthesizer,
    voice: Voice,
    dir: &Path,
) -> Result<PathBuf, SynthesisError> {
    let output = dir.join("synthesis_check.mp3");
    let request = SpeechRequest::new(CHECK_PHRASE, voice, 1.0);
    synthesize_to_file(synth, &request, &output, 1, SegmentRef::Narration, None).await?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSynthesizer;
    use tempfile::tempdir;

    fn voice() -> Voice {
        Voice {
            language_code: "ja-JP".to_string(),
            name: "ja-JP-Neural2-C".to_string(),
        }
    }

    #[test]
    fn validates_rate_bounds() {
        assert!(SpeechRequest::new("はい", voice(), 0.25).validate().is_ok());
        assert!(SpeechRequest::new("はい", voice(), 4.0).validate().is_ok());
        assert!(matches!(
            SpeechRequest::new("はい", voice(), 4.5).validate(),
            Err(SynthesisError::RateOutOfRange(_))
        ));
        assert!(matches!(
            SpeechRequest::new("  ", voice(), 1.0).validate(),
            Err(SynthesisError::EmptyText)
        ));
    }

    #[test]
    fn retry_classification() {
        assert!(SynthesisError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(SynthesisError::Status { status: 429, body: String::new() }.is_retryable());
        assert!(!SynthesisError::Status { status: 400, body: String::new() }.is_retryable());
        assert!(SynthesisError::TimedOut { seconds: 30 }.is_retryable());
        assert!(!SynthesisError::MissingApiKey("K".into()).is_retryable());
    }

    #[tokio::test]
    async fn retries_once_then_succeeds() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("line.mp3");
        let synth = FakeSynthesizer::new().fail_times("二回目", 1);

        let request = SpeechRequest::new("二回目", voice(), 1.0);
        synthesize_to_file(&synth, &request, &out, 2, SegmentRef::Line(4), None)
            .await
            .unwrap();

        assert!(out.exists());
        assert_eq!(synth.calls(), 2);
    }

    #[tokio::test]
    async fn gives_up_naming_the_line() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("line.mp3");
        let synth = FakeSynthesizer::new().fail_times("だめ", 5);

        let request = SpeechRequest::new("だめ", voice(), 1.0);
        let err = synthesize_to_file(&synth, &request, &out, 2, SegmentRef::Line(7), None)
            .await
            .unwrap_err();

        match err {
            SynthesisError::Segment {
                line, attempts, ref segment, ..
            } => {
                assert_eq!(line, Some(7));
                assert_eq!(attempts, 2);
                assert_eq!(segment, "dialogue line 7");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!out.exists());
        assert_eq!(synth.calls(), 2);
    }

    #[tokio::test]
    async fn invalid_request_is_not_retried() {
        let dir = tempdir().unwrap();
        let synth = FakeSynthesizer::new();
        let request = SpeechRequest::new("はい", voice(), 9.0);
        let err = synthesize_to_file(
            &synth,
            &request,
            &dir.path().join("x.mp3"),
            3,
            SegmentRef::Narration,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SynthesisError::Segment { attempts: 1, .. }));
        assert_eq!(synth.calls(), 0);
    }

    #[tokio::test]
    async fn check_writes_test_phrase() {
        let dir = tempdir().unwrap();
        let synth = FakeSynthesizer::new();
        let path = check_synthesizer(&synth, voice(), dir.path()).await.unwrap();
        assert!(path.exists());
    }
}
