//! RGB drawing surface with bitmap text.
//!
//! Provides the primitives the report page and the synthetic capture
//! surface are drawn with:
//! - `fill()` - Fill the entire canvas with a color
//! - `draw_rect()` - Draw a filled rectangle
//! - `draw_text()` - Draw text using font8x8 glyphs, optionally scaled
//! - `get_pixel()` / `set_pixel()` - Direct pixel access

use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{ImageBuffer, RgbImage};
use std::io::Cursor;

/// Width and height of one unscaled glyph cell
pub const GLYPH_SIZE: u32 = 8;

/// An RGB canvas for programmatic drawing
#[derive(Debug, Clone)]
pub struct Canvas {
    /// Width in pixels
    width: u32,
    /// Height in pixels
    height: u32,
    /// RGB pixel buffer (row-major, 3 bytes per pixel)
    buffer: Vec<u8>,
}

impl Canvas {
    /// Create a new canvas with the given dimensions, initialized to black
    pub fn new(width: u32, height: u32) -> Self {
        let buffer = vec![0u8; (width * height * 3) as usize];
        Self {
            width,
            height,
            buffer,
        }
    }

    /// Create a canvas initialized to a specific color
    pub fn with_color(width: u32, height: u32, color: [u8; 3]) -> Self {
        let mut canvas = Self::new(width, height);
        canvas.fill(color);
        canvas
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Fill the entire canvas with a color
    pub fn fill(&mut self, color: [u8; 3]) {
        for chunk in self.buffer.chunks_exact_mut(3) {
            chunk.copy_from_slice(&color);
        }
    }

    /// Draw a filled rectangle, clipped to the canvas
    pub fn draw_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: [u8; 3]) {
        for py in y..y.saturating_add(h).min(self.height) {
            for px in x..x.saturating_add(w).min(self.width) {
                self.set_pixel(px, py, color);
            }
        }
    }

    /// Draw text at 1x scale. Text does not wrap.
    pub fn draw_text(&mut self, x: u32, y: u32, text: &str, fg: [u8; 3], bg: [u8; 3]) {
        self.draw_text_scaled(x, y, text, 1, fg, bg);
    }

    /// Draw text with each glyph pixel expanded to `scale`x`scale`.
    ///
    /// Returns the x coordinate just past the last drawn glyph.
    pub fn draw_text_scaled(
        &mut self,
        x: u32,
        y: u32,
        text: &str,
        scale: u32,
        fg: [u8; 3],
        bg: [u8; 3],
    ) -> u32 {
        let scale = scale.max(1);
        let advance = GLYPH_SIZE * scale;
        let mut cursor_x = x;
        for ch in text.chars() {
            if cursor_x >= self.width {
                break;
            }
            self.draw_char(cursor_x, y, ch, scale, fg, bg);
            cursor_x += advance;
        }
        cursor_x
    }

    fn draw_char(&mut self, x: u32, y: u32, ch: char, scale: u32, fg: [u8; 3], bg: [u8; 3]) {
        let glyph = BASIC_FONTS
            .get(ch)
            .or_else(|| BASIC_FONTS.get('?'))
            .unwrap_or([0u8; 8]);
        for (row_idx, row) in glyph.iter().enumerate() {
            for bit in 0..GLYPH_SIZE {
                // font8x8 stores LSB as leftmost pixel
                let color = if (row >> bit) & 1 == 1 { fg } else { bg };
                self.draw_rect(
                    x + bit * scale,
                    y + row_idx as u32 * scale,
                    scale,
                    scale,
                    color,
                );
            }
        }
    }

    /// Get the color of a pixel
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        if x >= self.width || y >= self.height {
            return [0, 0, 0];
        }
        let idx = ((y * self.width + x) * 3) as usize;
        [self.buffer[idx], self.buffer[idx + 1], self.buffer[idx + 2]]
    }

    /// Set the color of a pixel
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        self.buffer[idx..idx + 3].copy_from_slice(&color);
    }

    /// Convert to an image buffer
    pub fn into_image(self) -> RgbImage {
        let (width, height) = (self.width, self.height);
        ImageBuffer::from_raw(width, height, self.buffer)
            .unwrap_or_else(|| ImageBuffer::new(width, height))
    }

    /// Encode the canvas as PNG bytes
    pub fn to_png(&self) -> image::ImageResult<Vec<u8>> {
        let img = self.clone().into_image();
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        Ok(bytes)
    }
}

/// Number of glyphs that fit in `width` pixels at `scale`
pub fn glyphs_per_line(width: u32, scale: u32) -> usize {
    (width / (GLYPH_SIZE * scale.max(1))) as usize
}

/// Greedy word wrap to at most `max_chars` per line.
///
/// Words longer than a line are hard-split.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            let current_len = current.chars().count();
            let needed = if current.is_empty() { word.len() } else { current_len + 1 + word.len() };
            if needed > max_chars {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.extend(word);
        }
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
