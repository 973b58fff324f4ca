//! Minimal raster canvas: filled rectangles and anti-aliased text.
//!
//! All drawing is clipped to the canvas; nothing ever writes outside it.

use fontdue::Font;
use image::{Rgb, RgbImage};

use super::style::Color;

pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Color) -> Self {
        Self {
            image: RgbImage::from_pixel(width.max(1), height.max(1), Rgb(background)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        let (width, height) = (self.width() as f32, self.height() as f32);
        let x0 = x.max(0.0).min(width) as u32;
        let y0 = y.max(0.0).min(height) as u32;
        let x1 = (x + w).max(0.0).min(width) as u32;
        let y1 = (y + h).max(0.0).min(height) as u32;

        for py in y0..y1 {
            for px in x0..x1 {
                self.image.put_pixel(px, py, Rgb(color));
            }
        }
    }

    /// Rectangle border of `thickness` drawn inside the given bounds.
    pub fn outline_rect(&mut self, x: f32, y: f32, w: f32, h: f32, thickness: f32, color: Color) {
        self.fill_rect(x, y, w, thickness, color);
        self.fill_rect(x, y + h - thickness, w, thickness, color);
        self.fill_rect(x, y, thickness, h, color);
        self.fill_rect(x + w - thickness, y, thickness, h, color);
    }

    /// Draw `text` with its top edge at `y`; returns the advance width.
    pub fn draw_text(
        &mut self,
        font: &Font,
        text: &str,
        x: f32,
        y: f32,
        size: f32,
        color: Color,
    ) -> f32 {
        let baseline = y + ascent(font, size);
        let mut pen = x;

        for ch in text.chars() {
            let (metrics, coverage) = font.rasterize(ch, size);
            let left = (pen + metrics.xmin as f32).round() as i64;
            let top = (baseline - metrics.height as f32 - metrics.ymin as f32).round() as i64;
            self.blend_glyph(left, top, metrics.width, metrics.height, &coverage, color);
            pen += metrics.advance_width;
        }

        pen - x
    }

    /// Draw `text` so that it ends at `right`.
    pub fn draw_text_right(
        &mut self,
        font: &Font,
        text: &str,
        right: f32,
        y: f32,
        size: f32,
        color: Color,
    ) {
        let width: f32 = text
            .chars()
            .map(|ch| font.metrics(ch, size).advance_width)
            .sum();
        self.draw_text(font, text, right - width, y, size, color);
    }

    fn blend_glyph(
        &mut self,
        left: i64,
        top: i64,
        glyph_width: usize,
        glyph_height: usize,
        coverage: &[u8],
        color: Color,
    ) {
        let (width, height) = (self.width() as i64, self.height() as i64);

        for row in 0..glyph_height {
            let py = top + row as i64;
            if py < 0 || py >= height {
                continue;
            }
            for col in 0..glyph_width {
                let px = left + col as i64;
                if px < 0 || px >= width {
                    continue;
                }
                let alpha = coverage[row * glyph_width + col];
                if alpha == 0 {
                    continue;
                }
                let pixel = self.image.get_pixel_mut(px as u32, py as u32);
                *pixel = Rgb(blend(pixel.0, color, alpha));
            }
        }
    }
}

/// Distance from the top of a line to the baseline.
pub fn ascent(font: &Font, size: f32) -> f32 {
    font.horizontal_line_metrics(size)
        .map(|m| m.ascent)
        .unwrap_or(size * 0.88)
}

fn blend(dst: Color, src: Color, alpha: u8) -> Color {
    let a = u16::from(alpha);
    let inv = 255 - a;
    let mut out = [0u8; 3];
    for i in 0..3 {
        out[i] = ((u16::from(src[i]) * a + u16::from(dst[i]) * inv + 127) / 255) as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_is_clipped_to_canvas() {
        let mut canvas = Canvas::new(10, 10, [0, 0, 0]);
        canvas.fill_rect(-5.0, 8.0, 100.0, 100.0, [255, 0, 0]);
        let image = canvas.into_image();
        assert_eq!(image.get_pixel(0, 9).0, [255, 0, 0]);
        assert_eq!(image.get_pixel(9, 8).0, [255, 0, 0]);
        assert_eq!(image.get_pixel(0, 7).0, [0, 0, 0]);
    }

    #[test]
    fn outline_leaves_inside_untouched() {
        let mut canvas = Canvas::new(10, 10, [0, 0, 0]);
        canvas.outline_rect(0.0, 0.0, 10.0, 10.0, 2.0, [9, 9, 9]);
        let image = canvas.into_image();
        assert_eq!(image.get_pixel(0, 0).0, [9, 9, 9]);
        assert_eq!(image.get_pixel(9, 5).0, [9, 9, 9]);
        assert_eq!(image.get_pixel(5, 5).0, [0, 0, 0]);
    }

    #[test]
    fn glyph_outside_bounds_is_ignored() {
        let mut canvas = Canvas::new(4, 4, [0, 0, 0]);
        let coverage = vec![255u8; 16];
        canvas.blend_glyph(2, 2, 4, 4, &coverage, [200, 200, 200]);
        canvas.blend_glyph(-10, -10, 4, 4, &coverage, [200, 200, 200]);
        let image = canvas.into_image();
        assert_eq!(image.get_pixel(3, 3).0, [200, 200, 200]);
        assert_eq!(image.get_pixel(1, 1).0, [0, 0, 0]);
    }

    #[test]
    fn blend_interpolates() {
        assert_eq!(blend([0, 0, 0], [255, 255, 255], 255), [255, 255, 255]);
        assert_eq!(blend([0, 0, 0], [255, 255, 255], 0), [0, 0, 0]);
        assert_eq!(blend([0, 0, 0], [255, 0, 0], 128)[0], 128);
    }
}
