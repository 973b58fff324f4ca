//! Timing manifest shared between audio and video assembly.
//!
//! The audio stage is the only producer: it appends entries through a
//! [`ManifestBuilder`] while it measures segments, then freezes the result
//! into a [`TimingManifest`]. The video stage only reads it. Nothing can
//! modify a built manifest.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::enums::BlockKind;

/// Errors raised when an entry would break a manifest invariant.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ManifestError {
    #[error("Invalid duration {value} for {kind} block")]
    InvalidDuration { kind: BlockKind, value: f64 },

    #[error("Manifest already contains a {0} block")]
    DuplicateBlock(BlockKind),

    #[error("Dialogue index {index} is not after previous index {previous}")]
    IndexOutOfOrder { index: usize, previous: usize },

    #[error("Dialogue entry has no index")]
    MissingIndex,

    #[error("Failed to parse manifest: {0}")]
    Parse(String),
}

/// One measured block of the final timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingEntry {
    #[serde(rename = "type")]
    kind: BlockKind,
    duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    speaker: Option<String>,
}

impl TimingEntry {
    pub fn thumbnail(duration: f64) -> Self {
        Self::block(BlockKind::Thumbnail, duration)
    }

    pub fn narration(duration: f64) -> Self {
        Self::block(BlockKind::Narration, duration)
    }

    pub fn review(duration: f64) -> Self {
        Self::block(BlockKind::Review, duration)
    }

    /// Entry for the dialogue line at `index` in the full dialogue list.
    pub fn dialogue(index: usize, duration: f64, speaker: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Dialogue,
            duration,
            index: Some(index),
            speaker: Some(speaker.into()),
        }
    }

    fn block(kind: BlockKind, duration: f64) -> Self {
        Self {
            kind,
            duration,
            index: None,
            speaker: None,
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Position in the script's dialogue list (dialogue entries only).
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn speaker(&self) -> Option<&str> {
        self.speaker.as_deref()
    }
}

/// Frozen, ordered list of timing entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TimingManifest {
    entries: Vec<TimingEntry>,
}

impl TimingManifest {
    /// Parse a manifest from JSON, re-checking every invariant.
    pub fn from_json(content: &str) -> Result<Self, ManifestError> {
        let entries: Vec<TimingEntry> =
            serde_json::from_str(content).map_err(|e| ManifestError::Parse(e.to_string()))?;
        let mut builder = ManifestBuilder::new();
        for entry in entries {
            builder.push(entry)?;
        }
        Ok(builder.build())
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn entries(&self) -> &[TimingEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimingEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all recorded durations.
    pub fn total_duration(&self) -> f64 {
        self.entries.iter().map(|e| e.duration).sum()
    }

    /// The single non-dialogue block of `kind`, if recorded.
    pub fn block(&self, kind: BlockKind) -> Option<&TimingEntry> {
        self.entries.iter().find(|e| e.kind == kind)
    }

    /// The dialogue entry for script line `index`.
    pub fn dialogue(&self, index: usize) -> Option<&TimingEntry> {
        self.dialogue_entries().find(|e| e.index == Some(index))
    }

    pub fn dialogue_entries(&self) -> impl Iterator<Item = &TimingEntry> {
        self.entries
            .iter()
            .filter(|e| e.kind == BlockKind::Dialogue)
    }

    pub fn dialogue_count(&self) -> usize {
        self.dialogue_entries().count()
    }

    pub fn has_dialogue(&self) -> bool {
        self.dialogue_entries().next().is_some()
    }
}

impl<'a> IntoIterator for &'a TimingManifest {
    type Item = &'a TimingEntry;
    type IntoIter = std::slice::Iter<'a, TimingEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Append-only builder for a [`TimingManifest`].
#[derive(Debug, Default)]
pub struct ManifestBuilder {
    entries: Vec<TimingEntry>,
    last_dialogue_index: Option<usize>,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    ///
    /// Rejects negative or non-finite durations, a second thumbnail,
    /// narration or review block, and dialogue indices that do not
    /// strictly increase.
    pub fn push(&mut self, entry: TimingEntry) -> Result<&mut Self, ManifestError> {
        if !entry.duration.is_finite() || entry.duration < 0.0 {
            return Err(ManifestError::InvalidDuration {
                kind: entry.kind,
                value: entry.duration,
            });
        }

        if entry.kind == BlockKind::Dialogue {
            let index = entry.index.ok_or(ManifestError::MissingIndex)?;
            if let Some(previous) = self.last_dialogue_index {
                if index <= previous {
                    return Err(ManifestError::IndexOutOfOrder { index, previous });
                }
            }
            self.last_dialogue_index = Some(index);
        } else if self.entries.iter().any(|e| e.kind == entry.kind) {
            return Err(ManifestError::DuplicateBlock(entry.kind));
        }

        self.entries.push(entry);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freeze the manifest.
    pub fn build(self) -> TimingManifest {
        TimingManifest {
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TimingManifest {
        let mut builder = ManifestBuilder::new();
        builder
            .push(TimingEntry::thumbnail(0.5))
            .unwrap()
            .push(TimingEntry::narration(4.2))
            .unwrap()
            .push(TimingEntry::dialogue(0, 2.8, "田中"))
            .unwrap()
            .push(TimingEntry::dialogue(1, 3.1, "佐藤"))
            .unwrap();
        builder.build()
    }

    #[test]
    fn lookups_by_kind_and_index() {
        let manifest = sample();
        assert_eq!(manifest.len(), 4);
        assert_eq!(manifest.block(BlockKind::Narration).unwrap().duration(), 4.2);
        assert_eq!(manifest.dialogue(1).unwrap().speaker(), Some("佐藤"));
        assert!(manifest.dialogue(2).is_none());
        assert!(manifest.block(BlockKind::Review).is_none());
        assert!((manifest.total_duration() - 10.6).abs() < 1e-9);
    }

    #[test]
    fn rejects_duplicate_blocks() {
        let mut builder = ManifestBuilder::new();
        builder.push(TimingEntry::thumbnail(0.5)).unwrap();
        let err = builder.push(TimingEntry::thumbnail(0.5)).unwrap_err();
        assert_eq!(err, ManifestError::DuplicateBlock(BlockKind::Thumbnail));
    }

    #[test]
    fn rejects_out_of_order_indices() {
        let mut builder = ManifestBuilder::new();
        builder.push(TimingEntry::dialogue(3, 1.0, "a")).unwrap();
        let err = builder.push(TimingEntry::dialogue(3, 1.0, "a")).unwrap_err();
        assert!(matches!(err, ManifestError::IndexOutOfOrder { index: 3, previous: 3 }));
    }

    #[test]
    fn rejects_bad_durations() {
        let mut builder = ManifestBuilder::new();
        assert!(builder.push(TimingEntry::narration(-1.0)).is_err());
        assert!(builder.push(TimingEntry::narration(f64::NAN)).is_err());
        assert!(builder.push(TimingEntry::narration(0.0)).is_ok());
    }

    #[test]
    fn json_uses_type_key_and_skips_empty_fields() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.starts_with(r#"[{"type":"thumbnail","duration":0.5}"#));
        assert!(json.contains(r#"{"type":"dialogue","duration":2.8,"index":0,"speaker":"田中"}"#));
    }

    #[test]
    fn from_json_revalidates() {
        let manifest = sample();
        let parsed = TimingManifest::from_json(&manifest.to_json_pretty().unwrap()).unwrap();
        assert_eq!(parsed, manifest);

        let broken = r#"[{"type":"dialogue","duration":1.0}]"#;
        assert_eq!(
            TimingManifest::from_json(broken).unwrap_err(),
            ManifestError::MissingIndex
        );
    }
}
