//! Episode script document.
//!
//! The script is produced upstream (content generation is not part of this
//! crate) and read once per episode. Every field is optional on the wire so
//! partially generated scripts still load; emptiness is handled by the
//! assembly stages.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::enums::SpeechRate;

/// Errors that can occur while loading a script document.
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("Failed to read script '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse script '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One generated episode script.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub episode_title: String,
    #[serde(default)]
    pub situation: Situation,
    /// Narration spoken before the dialogue.
    #[serde(default)]
    pub intro_narration: String,
    /// Translation of the narration (display only).
    #[serde(default)]
    pub intro_narration_ko: String,
    #[serde(default)]
    pub dialogue: Vec<DialogueLine>,
    #[serde(default)]
    pub grammar_explanation: Vec<GrammarPoint>,
    #[serde(default)]
    pub used_grammar: Vec<GrammarPoint>,
    #[serde(default)]
    pub used_vocab: Vec<VocabEntry>,
    #[serde(default)]
    pub summary: String,
}

/// Situation metadata shown on the title frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Situation {
    /// Episode type badge, e.g. "B2B" or "B2C".
    #[serde(default, rename = "type")]
    pub kind: String,
    /// One-line situation summary.
    #[serde(default)]
    pub situation: String,
    #[serde(default)]
    pub channel: String,
    /// Difficulty label, e.g. "N2".
    #[serde(default)]
    pub difficulty: String,
}

/// One spoken line of dialogue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DialogueLine {
    #[serde(default)]
    pub speaker: String,
    #[serde(default)]
    pub role: String,
    /// Source-language text (synthesized and displayed).
    #[serde(default)]
    pub text_jp: String,
    /// Translated text (display only).
    #[serde(default)]
    pub text_ko: String,
    /// Speech-rate hint (`normal|slow|emphasis|fast`).
    #[serde(default)]
    pub audio_note: String,
}

impl DialogueLine {
    /// Whether the line has text to speak.
    pub fn is_spoken(&self) -> bool {
        !self.text_jp.trim().is_empty()
    }

    pub fn rate(&self) -> SpeechRate {
        SpeechRate::from_hint(&self.audio_note)
    }
}

/// A grammar point, used on the title frame and in the review block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrammarPoint {
    #[serde(default)]
    pub form: String,
    #[serde(default)]
    pub meaning_ko: String,
    #[serde(default)]
    pub example_jp: String,
    #[serde(default)]
    pub example_ko: String,
    #[serde(default)]
    pub usage_note: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VocabEntry {
    #[serde(default)]
    pub word: String,
    #[serde(default)]
    pub reading: String,
    #[serde(default)]
    pub meaning_ko: String,
}

impl Script {
    /// Load a script from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| ScriptError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a script from a JSON string.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Narration text, if any non-whitespace text is present.
    pub fn narration(&self) -> Option<&str> {
        let text = self.intro_narration.trim();
        (!text.is_empty()).then_some(text)
    }

    pub fn has_dialogue(&self) -> bool {
        !self.dialogue.is_empty()
    }

    /// Dialogue lines that will be spoken, with their original positions.
    pub fn spoken_lines(&self) -> impl Iterator<Item = (usize, &DialogueLine)> {
        self.dialogue
            .iter()
            .enumerate()
            .filter(|(_, line)| line.is_spoken())
    }

    /// Speaker names in dialogue order (with repeats).
    pub fn speakers(&self) -> Vec<&str> {
        self.dialogue.iter().map(|l| l.speaker.as_str()).collect()
    }

    /// Grammar points used by the review block: those with an example
    /// sentence, up to `max`.
    pub fn review_points(&self, max: usize) -> Vec<&GrammarPoint> {
        self.used_grammar
            .iter()
            .filter(|g| !g.example_jp.trim().is_empty())
            .take(max)
            .collect()
    }
}
