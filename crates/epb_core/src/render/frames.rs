//! Frame layouts.
//!
//! Each block of an episode is shown as one still frame. [`Frame`] is the
//! closed set of layouts; cards own their text so painting can move to a
//! blocking thread.

use image::RgbImage;

use super::canvas::Canvas;
use super::fonts::FontSet;
use super::style::{self, Color, RenderStyle};
use super::wrap::{wrap_text, TextMeasure};
use super::RenderError;
use crate::models::{DialogueLine, Script};

const DEFAULT_TITLE: &str = "ビジネス日本語";
const DEFAULT_TYPE: &str = "B2B";
const DEFAULT_DIFFICULTY: &str = "N2";
const GRAMMAR_LABEL: &str = "핵심 문법";
const REVIEW_LABEL: &str = "복습";
const MAX_TITLE_GRAMMAR: usize = 3;

fn or_default(value: &str, default: &str) -> String {
    let value = value.trim();
    let chosen = if value.is_empty() { default } else { value };
    chosen.to_string()
}

/// Episode identity shown on every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeBadge {
    pub title: String,
    pub episode_type: String,
    pub difficulty: String,
}

impl EpisodeBadge {
    pub fn from_script(script: &Script) -> Self {
        Self {
            title: or_default(&script.episode_title, DEFAULT_TITLE),
            episode_type: or_default(&script.situation.kind, DEFAULT_TYPE),
            difficulty: or_default(&script.situation.difficulty, DEFAULT_DIFFICULTY),
        }
    }
}

/// Title frame, shown for the thumbnail and narration blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleCard {
    pub badge: EpisodeBadge,
    pub title: String,
    pub situation: String,
    pub channel: String,
    /// `(form, meaning)` pairs.
    pub grammar: Vec<(String, String)>,
}

impl TitleCard {
    pub fn from_script(script: &Script) -> Self {
        let badge = EpisodeBadge::from_script(script);
        Self {
            title: badge.title.clone(),
            badge,
            situation: script.situation.situation.trim().to_string(),
            channel: script.situation.channel.trim().to_string(),
            grammar: script
                .used_grammar
                .iter()
                .take(MAX_TITLE_GRAMMAR)
                .map(|g| (g.form.clone(), g.meaning_ko.clone()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogueCard {
    pub badge: EpisodeBadge,
    pub speaker: String,
    pub role: String,
    pub text_jp: String,
    pub text_ko: String,
    /// First-appearance position of the speaker; picks the name color.
    pub slot: usize,
}

impl DialogueCard {
    pub fn from_line(script: &Script, line: &DialogueLine) -> Self {
        Self {
            badge: EpisodeBadge::from_script(script),
            speaker: line.speaker.clone(),
            role: line.role.clone(),
            text_jp: line.text_jp.clone(),
            text_ko: line.text_ko.clone(),
            slot: speaker_slot(script, &line.speaker),
        }
    }
}

/// Position of `speaker` among the script's distinct speakers, in order of
/// first appearance. Unknown speakers get slot 0.
pub fn speaker_slot(script: &Script, speaker: &str) -> usize {
    let mut seen: Vec<&str> = Vec::new();
    for name in script.speakers() {
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen.iter().position(|s| *s == speaker).unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewItem {
    pub form: String,
    pub example_jp: String,
    pub example_ko: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewCard {
    pub badge: EpisodeBadge,
    pub items: Vec<ReviewItem>,
}

impl ReviewCard {
    pub fn from_script(script: &Script, max_examples: usize) -> Self {
        Self {
            badge: EpisodeBadge::from_script(script),
            items: script
                .review_points(max_examples)
                .into_iter()
                .map(|g| ReviewItem {
                    form: g.form.clone(),
                    example_jp: g.example_jp.clone(),
                    example_ko: g.example_ko.clone(),
                })
                .collect(),
        }
    }
}

/// One still frame to paint.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Title(TitleCard),
    Dialogue(DialogueCard),
    Review(ReviewCard),
}

/// Paints frames to images.
pub trait FramePainter: Send + Sync {
    fn paint(&self, frame: &Frame) -> Result<RgbImage, RenderError>;
}

/// Font-backed painter producing the episode's frame layouts.
pub struct FrameRenderer {
    style: RenderStyle,
    fonts: FontSet,
}

impl FrameRenderer {
    pub fn new(style: RenderStyle, fonts: FontSet) -> Self {
        Self { style, fonts }
    }

    fn paint_title(&self, card: &TitleCard) -> RgbImage {
        let s = &self.style;
        let scale = s.margin / 40.0;
        let accent = s.accent(&card.badge.episode_type);
        let mut p = self.painter(accent);
        let bottom = s.height as f32 - s.brand_bar;
        let width = s.text_width();

        let font = &self.fonts.primary;
        let mut x = s.margin;
        let badge_y = 80.0 * scale;
        x = p.badge(font, &card.badge.episode_type, x, badge_y, s.badge_size, Some(accent), style::TEXT);
        x = p.badge(
            font,
            &format!("JLPT {}", card.badge.difficulty),
            x,
            badge_y,
            s.badge_size,
            Some(style::GOLD),
            style::DARK_TEXT,
        );
        if !card.channel.is_empty() {
            p.badge(font, &card.channel, x, badge_y, s.badge_size, None, style::TEXT);
        }

        let mut y = 200.0 * scale;
        y = p.paragraph(font, &card.title, s.margin, y, s.title_size, width, style::TEXT, bottom);
        y += 40.0 * scale;
        y = p.paragraph(font, &card.situation, s.margin, y, s.situation_size, width, style::SUBTEXT, bottom);

        if !card.grammar.is_empty() {
            let font = &self.fonts.secondary;
            let mut gy = (y + 80.0 * scale).max(750.0 * scale);
            if gy + s.grammar_size * 2.0 < bottom {
                p.badge(font, GRAMMAR_LABEL, s.margin, gy, s.grammar_size, Some(accent), style::TEXT);
                gy += s.grammar_size + 34.0 * scale;
                for (form, meaning) in &card.grammar {
                    let text = format!("{}   ({})", form, meaning);
                    gy = p.first_line(font, &text, s.margin + 10.0 * scale, gy, s.grammar_size, width, style::SUBTEXT, bottom);
                }
            }
        }

        p.brand_bar(&self.fonts.secondary, &card.badge, accent, false);
        p.canvas.into_image()
    }

    fn paint_dialogue(&self, card: &DialogueCard) -> RgbImage {
        let s = &self.style;
        let scale = s.margin / 40.0;
        let accent = s.accent(&card.badge.episode_type);
        let mut p = self.painter(accent);
        let bottom = s.height as f32 - s.brand_bar;
        let padding = 50.0 * scale;
        let width = (s.width as f32 - padding * 2.0).max(1.0);

        let primary = &self.fonts.primary;
        let secondary = &self.fonts.secondary;

        let header = format!("【{}】{}", card.badge.episode_type, card.badge.title);
        p.first_line(primary, &header, s.margin, s.margin, s.header_size, s.text_width(), style::SUBTEXT, bottom);

        let mut y = (s.height / 3) as f32;
        p.first_line(primary, &card.speaker, padding, y, s.speaker_size, width, s.speaker_color(card.slot), bottom);
        y += 65.0 * scale;
        p.first_line(secondary, &card.role, padding, y, s.role_size, width, style::SUBTEXT, bottom);
        y += 50.0 * scale;
        p.canvas.fill_rect(padding, y, width, 2.0 * scale.max(0.5), accent);

        y += 30.0 * scale;
        y = p.paragraph(primary, &card.text_jp, padding, y, s.source_size, width, style::TEXT, bottom);

        let ko_lines = wrap_text(secondary, &card.text_ko, s.translation_size, width);
        if !ko_lines.is_empty() {
            y += 30.0 * scale;
            let line_height = s.line_height(s.translation_size);
            let panel_h = (ko_lines.len() as f32 * line_height + 30.0 * scale).min(bottom - y + 10.0 * scale);
            p.canvas.fill_rect(padding / 2.0, y - 10.0 * scale, s.width as f32 - padding, panel_h, style::TRANSLATION_PANEL);
            p.lines(secondary, &ko_lines, padding, y, s.translation_size, style::TRANSLATION, bottom);
        }

        p.brand_bar(secondary, &card.badge, accent, true);
        p.canvas.into_image()
    }

    fn paint_review(&self, card: &ReviewCard) -> RgbImage {
        let s = &self.style;
        let scale = s.margin / 40.0;
        let accent = s.accent(&card.badge.episode_type);
        let mut p = self.painter(accent);
        let bottom = s.height as f32 - s.brand_bar;
        let width = s.text_width();

        let primary = &self.fonts.primary;
        let secondary = &self.fonts.secondary;

        let header = format!("【{}】{}", card.badge.episode_type, card.badge.title);
        p.first_line(primary, &header, s.margin, s.margin, s.header_size, width, style::SUBTEXT, bottom);

        let mut y = 200.0 * scale;
        p.badge(secondary, REVIEW_LABEL, s.margin, y, s.badge_size, Some(accent), style::TEXT);
        y += s.badge_size + 60.0 * scale;

        for item in &card.items {
            y = p.first_line(primary, &item.form, s.margin, y, s.speaker_size * 0.8, width, style::GOLD, bottom);
            y = p.paragraph(primary, &item.example_jp, s.margin, y, s.source_size, width, style::TEXT, bottom);
            y = p.paragraph(secondary, &item.example_ko, s.margin, y, s.translation_size, width, style::TRANSLATION, bottom);
            y += 50.0 * scale;
        }

        p.brand_bar(secondary, &card.badge, accent, false);
        p.canvas.into_image()
    }

    fn painter(&self, accent: Color) -> Painter<'_> {
        let s = &self.style;
        let mut canvas = Canvas::new(s.width, s.height, style::BACKGROUND);
        canvas.fill_rect(0.0, 0.0, s.accent_bar, s.height as f32, accent);
        Painter { canvas, style: s }
    }
}

impl FramePainter for FrameRenderer {
    fn paint(&self, frame: &Frame) -> Result<RgbImage, RenderError> {
        Ok(match frame {
            Frame::Title(card) => self.paint_title(card),
            Frame::Dialogue(card) => self.paint_dialogue(card),
            Frame::Review(card) => self.paint_review(card),
        })
    }
}

/// Layout helpers over one canvas. Text below `limit` is not drawn.
struct Painter<'a> {
    canvas: Canvas,
    style: &'a RenderStyle,
}

impl Painter<'_> {
    /// Wrapped text; returns the y below the last drawn line.
    #[allow(clippy::too_many_arguments)]
    fn paragraph(
        &mut self,
        font: &fontdue::Font,
        text: &str,
        x: f32,
        y: f32,
        size: f32,
        width: f32,
        color: Color,
        limit: f32,
    ) -> f32 {
        let lines = wrap_text(font, text, size, width);
        self.lines(font, &lines, x, y, size, color, limit)
    }

    /// Only the first wrapped line of `text`.
    #[allow(clippy::too_many_arguments)]
    fn first_line(
        &mut self,
        font: &fontdue::Font,
        text: &str,
        x: f32,
        y: f32,
        size: f32,
        width: f32,
        color: Color,
        limit: f32,
    ) -> f32 {
        let lines: Vec<String> = wrap_text(font, text, size, width).into_iter().take(1).collect();
        self.lines(font, &lines, x, y, size, color, limit)
    }

    #[allow(clippy::too_many_arguments)]
    fn lines(
        &mut self,
        font: &fontdue::Font,
        lines: &[String],
        x: f32,
        mut y: f32,
        size: f32,
        color: Color,
        limit: f32,
    ) -> f32 {
        let advance = self.style.line_height(size);
        for line in lines {
            if y + advance > limit {
                break;
            }
            self.canvas.draw_text(font, line, x, y, size, color);
            y += advance;
        }
        y
    }

    /// Label in a box; returns the x after the badge plus a gap.
    #[allow(clippy::too_many_arguments)]
    fn badge(
        &mut self,
        font: &fontdue::Font,
        text: &str,
        x: f32,
        y: f32,
        size: f32,
        fill: Option<Color>,
        text_color: Color,
    ) -> f32 {
        let scale = self.style.margin / 40.0;
        let (pad_x, pad_y) = (20.0 * scale, 10.0 * scale);
        let box_w = font.text_width(text, size) + pad_x * 2.0;
        let box_h = size + pad_y * 2.0;

        match fill {
            Some(color) => self.canvas.fill_rect(x, y, box_w, box_h, color),
            None => self.canvas.outline_rect(x, y, box_w, box_h, 2.0 * scale.max(0.5), style::SUBTEXT),
        }
        self.canvas.draw_text(font, text, x + pad_x, y + pad_y, size, text_color);
        x + box_w + 15.0 * scale
    }

    fn brand_bar(&mut self, font: &fontdue::Font, badge: &EpisodeBadge, accent: Color, shorts: bool) {
        let s = self.style;
        let top = s.height as f32 - s.brand_bar;
        self.canvas.fill_rect(0.0, top, s.width as f32, s.brand_bar, accent);

        let y = top + (s.brand_bar - s.brand_size) / 2.0;
        let mut tags = format!("#{} #{}", badge.episode_type, badge.difficulty);
        if shorts {
            tags.push_str(" #Shorts");
        }
        let tags_width = font.text_width(&tags, s.brand_size);
        let brand_width = (s.text_width() - tags_width - s.margin).max(1.0);
        if let Some(brand) = wrap_text(font, &s.brand_text, s.brand_size, brand_width).first() {
            self.canvas.draw_text(font, brand, s.margin, y, s.brand_size, style::TEXT);
        }
        self.canvas
            .draw_text_right(font, &tags, s.width as f32 - s.margin, y, s.brand_size, style::TEXT);
    }
}
