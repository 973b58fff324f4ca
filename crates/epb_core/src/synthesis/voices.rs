//! Speaker to voice mapping.

use std::collections::HashMap;

use super::Voice;
use crate::config::SynthesisSettings;
use crate::models::VoiceRole;

/// Maps speaker names to voice roles, and roles to concrete voices.
#[derive(Debug, Clone)]
pub struct VoiceTable {
    language_code: String,
    male: String,
    female: String,
    narrator: String,
    speakers: HashMap<String, VoiceRole>,
}

impl VoiceTable {
    pub fn from_settings(settings: &SynthesisSettings) -> Self {
        let mut speakers = HashMap::new();
        let groups = [
            (&settings.male_speakers, VoiceRole::Male),
            (&settings.female_speakers, VoiceRole::Female),
            (&settings.narrator_speakers, VoiceRole::Narrator),
        ];
        for (names, role) in groups {
            for name in names {
                speakers.insert(name.trim().to_string(), role);
            }
        }

        Self {
            language_code: settings.language_code.clone(),
            male: settings.voice_male.clone(),
            female: settings.voice_female.clone(),
            narrator: settings.voice_narrator.clone(),
            speakers,
        }
    }

    /// Role for a speaker name; unknown names get the male voice.
    pub fn role_for(&self, speaker: &str) -> VoiceRole {
        self.speakers
            .get(speaker.trim())
            .copied()
            .unwrap_or_default()
    }

    pub fn voice_for_role(&self, role: VoiceRole) -> Voice {
        let name = match role {
            VoiceRole::Male => &self.male,
            VoiceRole::Female => &self.female,
            VoiceRole::Narrator => &self.narrator,
        };
        Voice {
            language_code: self.language_code.clone(),
            name: name.clone(),
        }
    }

    pub fn voice_for_speaker(&self, speaker: &str) -> Voice {
        self.voice_for_role(self.role_for(speaker))
    }

    pub fn narrator(&self) -> Voice {
        self.voice_for_role(VoiceRole::Narrator)
    }
}

impl Default for VoiceTable {
    fn default() -> Self {
        Self::from_settings(&SynthesisSettings::default())
    }
}
