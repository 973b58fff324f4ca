//! Frame style and layout constants.

use crate::config::VideoSettings;

/// An opaque RGB color.
pub type Color = [u8; 3];

pub const BACKGROUND: Color = [12, 16, 38];
pub const ACCENT_RED: Color = [255, 75, 75];
pub const ACCENT_BLUE: Color = [60, 130, 255];
pub const TEXT: Color = [255, 255, 255];
pub const SUBTEXT: Color = [180, 185, 210];
pub const GOLD: Color = [255, 200, 60];
pub const SPEAKER_A: Color = [100, 200, 255];
pub const SPEAKER_B: Color = [255, 150, 100];
pub const TRANSLATION: Color = [180, 220, 255];
pub const TRANSLATION_PANEL: Color = [20, 28, 60];
pub const DARK_TEXT: Color = [20, 20, 20];

/// Layout is authored against this width and scaled to the canvas.
const REFERENCE_WIDTH: f32 = 1080.0;

/// Everything the frame painter needs to know about appearance.
///
/// One immutable value per episode; sizes are already scaled to the
/// canvas.
#[derive(Debug, Clone)]
pub struct RenderStyle {
    pub width: u32,
    pub height: u32,
    pub brand_text: String,
    pub speaker_palette: [Color; 4],
    pub margin: f32,
    pub accent_bar: f32,
    pub brand_bar: f32,
    pub badge_size: f32,
    pub title_size: f32,
    pub situation_size: f32,
    pub grammar_size: f32,
    pub brand_size: f32,
    pub header_size: f32,
    pub speaker_size: f32,
    pub role_size: f32,
    pub source_size: f32,
    pub translation_size: f32,
    /// Line advance as a multiple of the font size.
    pub line_spacing: f32,
}

impl RenderStyle {
    pub fn new(width: u32, height: u32, brand_text: impl Into<String>) -> Self {
        let scale = width.max(1) as f32 / REFERENCE_WIDTH;
        Self {
            width,
            height,
            brand_text: brand_text.into(),
            speaker_palette: [SPEAKER_A, SPEAKER_B, GOLD, SUBTEXT],
            margin: 40.0 * scale,
            accent_bar: 10.0 * scale,
            brand_bar: 120.0 * scale,
            badge_size: 32.0 * scale,
            title_size: 64.0 * scale,
            situation_size: 38.0 * scale,
            grammar_size: 30.0 * scale,
            brand_size: 32.0 * scale,
            header_size: 32.0 * scale,
            speaker_size: 52.0 * scale,
            role_size: 30.0 * scale,
            source_size: 44.0 * scale,
            translation_size: 36.0 * scale,
            line_spacing: 1.32,
        }
    }

    pub fn from_settings(video: &VideoSettings) -> Self {
        Self::new(video.width, video.height, video.brand_text.clone())
    }

    /// Accent color for an episode type: red for consumer-facing, blue
    /// otherwise.
    pub fn accent(&self, episode_type: &str) -> Color {
        if episode_type.trim().eq_ignore_ascii_case("B2C") {
            ACCENT_RED
        } else {
            ACCENT_BLUE
        }
    }

    /// Speaker color for a first-appearance slot.
    pub fn speaker_color(&self, slot: usize) -> Color {
        self.speaker_palette[slot % self.speaker_palette.len()]
    }

    /// Width available to text between the side margins.
    pub fn text_width(&self) -> f32 {
        (self.width as f32 - self.margin * 2.0).max(1.0)
    }

    pub fn line_height(&self, size: f32) -> f32 {
        (size * self.line_spacing).round()
    }
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self::from_settings(&VideoSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accent_follows_episode_type() {
        let style = RenderStyle::default();
        assert_eq!(style.accent("B2C"), ACCENT_RED);
        assert_eq!(style.accent("b2c"), ACCENT_RED);
        assert_eq!(style.accent("B2B"), ACCENT_BLUE);
        assert_eq!(style.accent(""), ACCENT_BLUE);
    }

    #[test]
    fn palette_wraps_after_four_speakers() {
        let style = RenderStyle::default();
        assert_eq!(style.speaker_color(0), SPEAKER_A);
        assert_eq!(style.speaker_color(1), SPEAKER_B);
        assert_eq!(style.speaker_color(4), SPEAKER_A);
    }

    #[test]
    fn sizes_scale_with_width() {
        let full = RenderStyle::new(1080, 1920, "");
        let half = RenderStyle::new(540, 960, "");
        assert!((full.title_size - 64.0).abs() < f32::EPSILON);
        assert!((half.title_size - 32.0).abs() < f32::EPSILON);
        assert!((half.text_width() - 500.0).abs() < 1e-3);
    }
}
