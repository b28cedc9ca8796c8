//! Text drawing for the dashboard.
//!
//! Uses a system font laid out with `skrifa` metrics when one is available,
//! otherwise a 5x7 bitmap font drawn as small rectangles. Lowercase letters
//! fall back to their uppercase bitmaps.

use skrifa::MetadataProvider;
use vello::kurbo::{Affine, Rect};
use vello::peniko::{Color, Fill, FontData};
use vello::{Glyph, Scene};

pub const GLYPH_COLS: usize = 5;
pub const GLYPH_ROWS: usize = 7;

/// Bitmap advance relative to the font size.
const BITMAP_ADVANCE: f64 = 0.6;
/// Bitmap glyph height relative to the font size.
const BITMAP_HEIGHT: f64 = 0.75;

/// 5x7 bitmap for `ch`. Each row uses the lower 5 bits, MSB leftmost.
pub fn glyph_bitmap(ch: u8) -> [u8; GLYPH_ROWS] {
    match ch.to_ascii_uppercase() {
        b'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        b'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        b'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        b'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        b'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        b'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        b'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0E],
        b'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        b'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        b'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        b'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        b'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        b'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        b'N' => [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11],
        b'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        b'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        b'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        b'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        b'S' => [0x0E, 0x11, 0x10, 0x0E, 0x01, 0x11, 0x0E],
        b'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        b'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        b'V' => [0x11, 0x11, 0x11, 0x11, 0x0A, 0x0A, 0x04],
        b'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x1B, 0x11],
        b'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        b'Y' => [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04],
        b'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        b'0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        b'1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        b'2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        b'3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        b'4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        b'5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        b'6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        b'7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        b'8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        b'9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        b'.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        b',' => [0x00, 0x00, 0x00, 0x00, 0x06, 0x04, 0x08],
        b':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        b'-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        b'+' => [0x00, 0x04, 0x04, 0x1F, 0x04, 0x04, 0x00],
        b'=' => [0x00, 0x00, 0x1F, 0x00, 0x1F, 0x00, 0x00],
        b'/' => [0x01, 0x01, 0x02, 0x04, 0x08, 0x10, 0x10],
        b'(' => [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02],
        b')' => [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08],
        b'[' => [0x0E, 0x08, 0x08, 0x08, 0x08, 0x08, 0x0E],
        b']' => [0x0E, 0x02, 0x02, 0x02, 0x02, 0x02, 0x0E],
        b'<' => [0x02, 0x04, 0x08, 0x10, 0x08, 0x04, 0x02],
        b'>' => [0x08, 0x04, 0x02, 0x01, 0x02, 0x04, 0x08],
        b'_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        b'%' => [0x19, 0x19, 0x02, 0x04, 0x08, 0x13, 0x13],
        b'#' => [0x0A, 0x0A, 0x1F, 0x0A, 0x1F, 0x0A, 0x0A],
        b'!' => [0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x04],
        b'?' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
        b' ' => [0x00; GLYPH_ROWS],
        _ => [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F],
    }
}

/// Font used for all dashboard text, or `None` for the bitmap fallback.
#[derive(Clone, Default)]
pub struct TextStyle {
    pub font: Option<FontData>,
}

impl TextStyle {
    pub fn new(font: Option<FontData>) -> Self {
        Self { font }
    }

    /// Draw a single line of text with its baseline at `y`.
    pub fn draw(&self, scene: &mut Scene, x: f64, y: f64, text: &str, color: Color, size: f64) {
        match &self.font {
            Some(font) => {
                let glyphs = layout_line(font, text, size as f32, x, y);
                if !glyphs.is_empty() {
                    scene
                        .draw_glyphs(font)
                        .font_size(size as f32)
                        .brush(&color)
                        .draw(Fill::NonZero, glyphs.into_iter());
                }
            }
            None => draw_bitmap_line(scene, x, y, text, color, size),
        }
    }

    /// Horizontal advance of `text` at `size`.
    pub fn width(&self, text: &str, size: f64) -> f64 {
        match &self.font {
            Some(font) => measure_line(font, text, size as f32),
            None => text.chars().count() as f64 * size * BITMAP_ADVANCE,
        }
    }
}

fn draw_bitmap_line(scene: &mut Scene, x: f64, y: f64, text: &str, color: Color, size: f64) {
    let advance = size * BITMAP_ADVANCE;
    let pixel_w = advance * 0.8 / GLYPH_COLS as f64;
    let pixel_h = size * BITMAP_HEIGHT / GLYPH_ROWS as f64;
    let top = y - size * BITMAP_HEIGHT;

    for (i, ch) in text.chars().enumerate() {
        if ch == ' ' {
            continue;
        }
        let bitmap = glyph_bitmap(u8::try_from(ch).unwrap_or(b'?'));
        let cx = x + i as f64 * advance;
        for (row, bits) in bitmap.iter().enumerate() {
            for col in 0..GLYPH_COLS {
                if (bits >> (GLYPH_COLS - 1 - col)) & 1 == 1 {
                    let px = cx + col as f64 * pixel_w;
                    let py = top + row as f64 * pixel_h;
                    let rect = Rect::new(px, py, px + pixel_w, py + pixel_h);
                    scene.fill(Fill::NonZero, Affine::IDENTITY, color, None, &rect);
                }
            }
        }
    }
}

fn layout_line(font: &FontData, text: &str, size: f32, x: f64, y: f64) -> Vec<Glyph> {
    let Ok(font_ref) = skrifa::FontRef::from_index(font.data.as_ref(), font.index) else {
        return Vec::new();
    };
    let charmap = font_ref.charmap();
    let metrics = font_ref.glyph_metrics(
        skrifa::instance::Size::new(size),
        skrifa::instance::LocationRef::default(),
    );

    let mut pen = x;
    text.chars()
        .map(|ch| {
            let gid = charmap.map(ch).unwrap_or_default();
            let glyph = Glyph {
                id: gid.to_u32(),
                x: pen as f32,
                y: y as f32,
            };
            pen += metrics.advance_width(gid).unwrap_or(size * 0.5) as f64;
            glyph
        })
        .collect()
}

fn measure_line(font: &FontData, text: &str, size: f32) -> f64 {
    let Ok(font_ref) = skrifa::FontRef::from_index(font.data.as_ref(), font.index) else {
        return text.chars().count() as f64 * size as f64 * BITMAP_ADVANCE;
    };
    let charmap = font_ref.charmap();
    let metrics = font_ref.glyph_metrics(
        skrifa::instance::Size::new(size),
        skrifa::instance::LocationRef::default(),
    );
    text.chars()
        .map(|ch| {
            let gid = charmap.map(ch).unwrap_or_default();
            metrics.advance_width(gid).unwrap_or(size * 0.5) as f64
        })
        .sum()
}

/// Try to load the first font in `names` from the usual system directories.
fn load_system_font(names: &[&str]) -> Option<FontData> {
    let dirs = [
        "/System/Library/Fonts/",
        "/System/Library/Fonts/Supplemental/",
        "/Library/Fonts/",
        "/usr/share/fonts/truetype/dejavu/",
        "/usr/share/fonts/truetype/",
        "/usr/share/fonts/opentype/",
        "C:\\Windows\\Fonts\\",
    ];
    let extensions = ["ttf", "otf", "ttc"];

    for name in names {
        for dir in &dirs {
            for ext in &extensions {
                let path = format!("{dir}{name}.{ext}");
                if let Ok(data) = std::fs::read(&path) {
                    return Some(FontData::new(data.into(), 0));
                }
            }
        }
    }
    None
}

/// Monospace-leaning font stack; numbers line up better in tables.
pub fn load_ui_font() -> Option<FontData> {
    load_system_font(&[
        "Menlo",
        "Monaco",
        "DejaVuSansMono",
        "LiberationMono-Regular",
        "consola",
        "DejaVuSans",
        "Helvetica",
        "Arial",
    ])
}

/// Shorten `text` with a trailing `..` so it fits in `max_width`.
pub fn ellipsize(style: &TextStyle, text: &str, size: f64, max_width: f64) -> String {
    if style.width(text, size) <= max_width {
        return text.to_string();
    }
    let mut out: String = text.to_string();
    while !out.is_empty() && style.width(&format!("{out}.."), size) > max_width {
        out.pop();
    }
    format!("{out}..")
}
