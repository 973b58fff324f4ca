//! Data models for Episode Builder.
//!
//! This module contains the core data structures shared by every stage:
//! - Enums for block kinds, speech rates and voice roles
//! - The script document read from upstream generation
//! - The timing manifest produced by audio assembly

mod enums;
mod script;
mod timing;

// Re-export all public types
pub use enums::{BlockKind, SpeechRate, VoiceRole};
pub use script::{DialogueLine, GrammarPoint, Script, ScriptError, Situation, VocabEntry};
pub use timing::{ManifestBuilder, ManifestError, TimingEntry, TimingManifest};
