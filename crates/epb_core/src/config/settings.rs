//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Audio track assembly.
    #[serde(default)]
    pub audio: AudioSettings,

    /// Speech synthesizer.
    #[serde(default)]
    pub synthesis: SynthesisSettings,

    /// Frame rendering and clip layout.
    #[serde(default)]
    pub video: VideoSettings,

    /// External encoder tools.
    #[serde(default)]
    pub encoder: EncoderSettings,
}

/// Path configuration for output, temp, logs and fonts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Output folder for finished episodes.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Root folder for per-run working directories.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    /// Folder for log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,

    /// Folder fonts are downloaded into.
    #[serde(default = "default_fonts_folder")]
    pub fonts_folder: String,

    /// Also publish `<id>.timings.json` next to the outputs.
    #[serde(default)]
    pub save_manifest: bool,
}

fn default_output_folder() -> String {
    "episodes".to_string()
}

fn default_temp_root() -> String {
    ".temp".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

fn default_fonts_folder() -> String {
    "fonts".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
            temp_root: default_temp_root(),
            logs_folder: default_logs_folder(),
            fonts_folder: default_fonts_folder(),
            save_manifest: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is not set.
    #[serde(default)]
    pub level: LogLevel,

    /// Use compact log format.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of tool output lines to show on failure.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Progress update step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Prefix episode log lines with a timestamp.
    #[serde(default = "default_true")]
    pub show_timestamps: bool,

    /// Also write application-wide tracing output to a daily file in the
    /// logs folder.
    #[serde(default)]
    pub app_log_file: bool,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            compact: true,
            error_tail: default_error_tail(),
            progress_step: default_progress_step(),
            show_timestamps: true,
            app_log_file: false,
        }
    }
}

/// Audio track assembly: pauses, rates and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Silence before the first block (not recorded in the manifest).
    #[serde(default = "default_edge_silence")]
    pub lead_in_secs: f64,

    /// Silence after the last block (not recorded in the manifest).
    #[serde(default = "default_edge_silence")]
    pub lead_out_secs: f64,

    /// Fixed duration of the thumbnail block.
    #[serde(default = "default_thumbnail_secs")]
    pub thumbnail_secs: f64,

    /// Pause after each dialogue line.
    #[serde(default = "default_line_pause")]
    pub pause_between_lines_secs: f64,

    /// Pause after the narration.
    #[serde(default = "default_narration_pause")]
    pub pause_after_narration_secs: f64,

    /// Pause before the review block.
    #[serde(default = "default_section_pause")]
    pub pause_between_sections_secs: f64,

    /// Speaking rate used for narration and review sentences.
    #[serde(default = "default_narration_rate")]
    pub narration_rate: f64,

    /// Track length above which a warning is logged.
    #[serde(default = "default_soft_ceiling")]
    pub soft_ceiling_secs: f64,

    /// Append a spoken review of grammar examples after the dialogue.
    #[serde(default)]
    pub review_enabled: bool,

    /// Maximum number of example sentences in the review block.
    #[serde(default = "default_review_examples")]
    pub review_max_examples: usize,

    /// Sample rate shared by synthesized speech and generated silence.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

fn default_edge_silence() -> f64 {
    0.5
}

fn default_thumbnail_secs() -> f64 {
    0.5
}

fn default_line_pause() -> f64 {
    0.6
}

fn default_narration_pause() -> f64 {
    1.0
}

fn default_section_pause() -> f64 {
    1.5
}

fn default_narration_rate() -> f64 {
    0.95
}

fn default_soft_ceiling() -> f64 {
    180.0
}

fn default_review_examples() -> usize {
    3
}

fn default_sample_rate() -> u32 {
    24000
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            lead_in_secs: default_edge_silence(),
            lead_out_secs: default_edge_silence(),
            thumbnail_secs: default_thumbnail_secs(),
            pause_between_lines_secs: default_line_pause(),
            pause_after_narration_secs: default_narration_pause(),
            pause_between_sections_secs: default_section_pause(),
            narration_rate: default_narration_rate(),
            soft_ceiling_secs: default_soft_ceiling(),
            review_enabled: false,
            review_max_examples: default_review_examples(),
            sample_rate: default_sample_rate(),
        }
    }
}

/// Speech synthesizer configuration.
///
/// The API key itself is never stored here; `api_key_env` names the
/// environment variable it is read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisSettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_language_code")]
    pub language_code: String,

    #[serde(default = "default_voice_male")]
    pub voice_male: String,

    #[serde(default = "default_voice_female")]
    pub voice_female: String,

    #[serde(default = "default_voice_narrator")]
    pub voice_narrator: String,

    /// Speaker names voiced by the male voice.
    #[serde(default = "default_male_speakers")]
    pub male_speakers: Vec<String>,

    /// Speaker names voiced by the female voice.
    #[serde(default = "default_female_speakers")]
    pub female_speakers: Vec<String>,

    /// Speaker names voiced by the narrator voice.
    #[serde(default = "default_narrator_speakers")]
    pub narrator_speakers: Vec<String>,

    #[serde(default)]
    pub pitch: f64,

    /// Per-request deadline.
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,

    /// Attempts per segment before the episode is aborted.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Concurrent synthesis requests per episode.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_endpoint() -> String {
    "https://texttospeech.googleapis.com/v1/text:synthesize".to_string()
}

fn default_api_key_env() -> String {
    "GOOGLE_TTS_API_KEY".to_string()
}

fn default_language_code() -> String {
    "ja-JP".to_string()
}

fn default_voice_male() -> String {
    "ja-JP-Neural2-C".to_string()
}

fn default_voice_female() -> String {
    "ja-JP-Neural2-B".to_string()
}

fn default_voice_narrator() -> String {
    "ja-JP-Neural2-D".to_string()
}

fn default_male_speakers() -> Vec<String> {
    ["田中", "山田", "鈴木", "伊藤"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_female_speakers() -> Vec<String> {
    ["佐藤", "高橋", "渡辺"].iter().map(|s| s.to_string()).collect()
}

fn default_narrator_speakers() -> Vec<String> {
    ["ナレーター", "narrator"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    2
}

fn default_concurrency() -> usize {
    4
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            language_code: default_language_code(),
            voice_male: default_voice_male(),
            voice_female: default_voice_female(),
            voice_narrator: default_voice_narrator(),
            male_speakers: default_male_speakers(),
            female_speakers: default_female_speakers(),
            narrator_speakers: default_narrator_speakers(),
            pitch: 0.0,
            timeout_secs: default_request_timeout(),
            max_attempts: default_max_attempts(),
            concurrency: default_concurrency(),
        }
    }
}

/// Frame rendering and clip layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSettings {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Frames per second for every clip.
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Concurrent clip renders per episode.
    #[serde(default = "default_render_concurrency")]
    pub render_concurrency: usize,

    /// Font for source-language text. Relative paths resolve against
    /// `paths.fonts_folder`.
    #[serde(default = "default_primary_font")]
    pub primary_font: String,

    /// Font for translated text.
    #[serde(default = "default_secondary_font")]
    pub secondary_font: String,

    /// Download URL used when `primary_font` is missing. Empty disables.
    #[serde(default = "default_primary_font_url")]
    pub primary_font_url: String,

    #[serde(default = "default_secondary_font_url")]
    pub secondary_font_url: String,

    #[serde(default = "default_download_timeout")]
    pub font_download_timeout_secs: u64,

    /// Text on the branding bar.
    #[serde(default = "default_brand_text")]
    pub brand_text: String,
}

fn default_width() -> u32 {
    1080
}

fn default_height() -> u32 {
    1920
}

fn default_fps() -> u32 {
    24
}

fn default_render_concurrency() -> usize {
    2
}

fn default_primary_font() -> String {
    "NotoSansCJKjp-Bold.otf".to_string()
}

fn default_secondary_font() -> String {
    "NotoSansCJKkr-Bold.otf".to_string()
}

fn default_primary_font_url() -> String {
    "https://cdn.jsdelivr.net/gh/googlefonts/noto-cjk@main/Sans/OTF/Japanese/NotoSansCJKjp-Bold.otf"
        .to_string()
}

fn default_secondary_font_url() -> String {
    "https://cdn.jsdelivr.net/gh/googlefonts/noto-cjk@main/Sans/OTF/Korean/NotoSansCJKkr-Bold.otf"
        .to_string()
}

fn default_download_timeout() -> u64 {
    120
}

fn default_brand_text() -> String {
    "ビジネス日本語 Podcast  |  여행업 실무 일본어".to_string()
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            render_concurrency: default_render_concurrency(),
            primary_font: default_primary_font(),
            secondary_font: default_secondary_font(),
            primary_font_url: default_primary_font_url(),
            secondary_font_url: default_secondary_font_url(),
            font_download_timeout_secs: default_download_timeout(),
            brand_text: default_brand_text(),
        }
    }
}

/// External encoder tools and codec choices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderSettings {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: String,

    #[serde(default = "default_ffprobe")]
    pub ffprobe_path: String,

    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,

    /// Codec for generated silence; must match the synthesized speech so
    /// the audio concat can stream-copy.
    #[serde(default = "default_silence_codec")]
    pub silence_codec: String,

    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Deadline for encode, concat and mux invocations.
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// Deadline for a single duration probe.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_pixel_format() -> String {
    "yuv420p".to_string()
}

fn default_silence_codec() -> String {
    "libmp3lame".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

fn default_tool_timeout() -> u64 {
    300
}

fn default_probe_timeout() -> u64 {
    30
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg(),
            ffprobe_path: default_ffprobe(),
            video_codec: default_video_codec(),
            pixel_format: default_pixel_format(),
            silence_codec: default_silence_codec(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            tool_timeout_secs: default_tool_timeout(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Paths,
    Logging,
    Audio,
    Synthesis,
    Video,
    Encoder,
}

impl ConfigSection {
    /// All sections, in file order.
    pub const ALL: [ConfigSection; 6] = [
        ConfigSection::Paths,
        ConfigSection::Logging,
        ConfigSection::Audio,
        ConfigSection::Synthesis,
        ConfigSection::Video,
        ConfigSection::Encoder,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Audio => "audio",
            ConfigSection::Synthesis => "synthesis",
            ConfigSection::Video => "video",
            ConfigSection::Encoder => "encoder",
        }
    }

    /// Comment written above the section in generated files.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "Output, working, log and font directories",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Audio => "Audio track assembly (seconds unless noted)",
            ConfigSection::Synthesis => {
                "Speech synthesis (the API key is read from the env var named by api_key_env)"
            }
            ConfigSection::Video => "Frame rendering and clip layout",
            ConfigSection::Encoder => "External encoder tools (ffmpeg / ffprobe)",
        }
    }
}
