//! Core enums used throughout the pipeline.

use serde::{Deserialize, Serialize};

/// Kind of semantic block in the final episode timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Thumbnail,
    Narration,
    Dialogue,
    Review,
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockKind::Thumbnail => write!(f, "thumbnail"),
            BlockKind::Narration => write!(f, "narration"),
            BlockKind::Dialogue => write!(f, "dialogue"),
            BlockKind::Review => write!(f, "review"),
        }
    }
}

/// Speech-rate hint attached to a dialogue line.
///
/// Hints outside the known set read as `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechRate {
    #[default]
    Normal,
    Slow,
    Emphasis,
    Fast,
}

impl SpeechRate {
    /// Parse a free-form hint string.
    pub fn from_hint(hint: &str) -> Self {
        match hint.trim().to_ascii_lowercase().as_str() {
            "slow" => SpeechRate::Slow,
            "emphasis" => SpeechRate::Emphasis,
            "fast" => SpeechRate::Fast,
            _ => SpeechRate::Normal,
        }
    }

    /// Playback rate passed to the synthesizer.
    pub fn factor(&self) -> f64 {
        match self {
            SpeechRate::Slow => 0.85,
            SpeechRate::Normal => 1.0,
            SpeechRate::Emphasis => 0.9,
            SpeechRate::Fast => 1.15,
        }
    }
}

impl std::fmt::Display for SpeechRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeechRate::Normal => write!(f, "normal"),
            SpeechRate::Slow => write!(f, "slow"),
            SpeechRate::Emphasis => write!(f, "emphasis"),
            SpeechRate::Fast => write!(f, "fast"),
        }
    }
}

/// Voice role a speaker is mapped to before picking a concrete voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceRole {
    #[default]
    Male,
    Female,
    Narrator,
}

impl std::fmt::Display for VoiceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoiceRole::Male => write!(f, "male"),
            VoiceRole::Female => write!(f, "female"),
            VoiceRole::Narrator => write!(f, "narrator"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_table_matches_hints() {
        assert_eq!(SpeechRate::from_hint("slow").factor(), 0.85);
        assert_eq!(SpeechRate::from_hint("normal").factor(), 1.0);
        assert_eq!(SpeechRate::from_hint("emphasis").factor(), 0.9);
        assert_eq!(SpeechRate::from_hint("fast").factor(), 1.15);
    }

    #[test]
    fn unknown_hint_is_normal() {
        assert_eq!(SpeechRate::from_hint(""), SpeechRate::Normal);
        assert_eq!(SpeechRate::from_hint("whisper"), SpeechRate::Normal);
        assert_eq!(SpeechRate::from_hint(" FAST "), SpeechRate::Fast);
    }

    #[test]
    fn block_kind_serializes_lowercase() {
        let json = serde_json::to_string(&BlockKind::Dialogue).unwrap();
        assert_eq!(json, "\"dialogue\"");
    }
}
