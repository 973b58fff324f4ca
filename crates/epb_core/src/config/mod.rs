//! Configuration management for Episode Builder.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Defaults for every missing field on load
//!
//! # Example
//!
//! ```no_run
//! use epb_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new(".config/settings.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Output folder: {}", config.settings().paths.output_folder);
//!
//! config.settings_mut().audio.review_enabled = true;
//! config.update_section(ConfigSection::Audio).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    AudioSettings, ConfigSection, EncoderSettings, LoggingSettings, PathSettings, Settings,
    SynthesisSettings, VideoSettings,
};
