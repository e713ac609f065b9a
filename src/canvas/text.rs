//! Bitmap text for the software canvas
//!
//! Glyphs come from the 8x8 BASIC font, stretched to the same width model the
//! layout uses (0.6 em per character). CJK characters have no glyph and are
//! drawn as one-em outline boxes so line extents still match the layout.

use font8x8::{BASIC_FONTS, UnicodeFonts};
use tiny_skia::{Paint, Pixmap, Rect, Transform};

use crate::layout::text_flow::is_cjk;

const GLYPH_CELLS: f32 = 8.0;
const LATIN_ADVANCE: f32 = 0.6;

fn advance(c: char, font_size: f32) -> f32 {
    if is_cjk(c) && !c.is_whitespace() {
        font_size
    } else if c.is_whitespace() {
        font_size * 0.3
    } else {
        font_size * LATIN_ADVANCE
    }
}

/// Width of one line of `text` as drawn by [`draw_text`]
pub fn text_width(text: &str, font_size: f32) -> f32 {
    text.chars().map(|c| advance(c, font_size)).sum()
}

fn fill(pixmap: &mut Pixmap, x: f32, y: f32, w: f32, h: f32, paint: &Paint) {
    if let Some(rect) = Rect::from_xywh(x, y, w, h) {
        pixmap.fill_rect(rect, paint, Transform::identity(), None);
    }
}

fn draw_tofu(pixmap: &mut Pixmap, x: f32, y: f32, font_size: f32, paint: &Paint) {
    let inset = font_size * 0.1;
    let side = font_size - inset * 2.0;
    let line = (font_size / GLYPH_CELLS).max(1.0);
    let (x, y) = (x + inset, y + inset);
    fill(pixmap, x, y, side, line, paint);
    fill(pixmap, x, y + side - line, side, line, paint);
    fill(pixmap, x, y, line, side, paint);
    fill(pixmap, x + side - line, y, line, side, paint);
}

/// Draw `text` with its top-left corner at (`x`, `y`)
///
/// Each line of the text goes `line_height` below the one before it.
pub fn draw_text(
    pixmap: &mut Pixmap,
    text: &str,
    x: f32,
    y: f32,
    font_size: f32,
    line_height: f32,
    rgba: [u8; 4],
) {
    let mut paint = Paint::default();
    paint.set_color_rgba8(rgba[0], rgba[1], rgba[2], rgba[3]);
    paint.anti_alias = false;

    let cell_w = font_size * LATIN_ADVANCE / GLYPH_CELLS;
    let cell_h = font_size / GLYPH_CELLS;

    for (line_index, line) in text.split('\n').enumerate() {
        let top = y + line_index as f32 * line_height;
        let mut cursor = x;
        for c in line.chars() {
            if is_cjk(c) && !c.is_whitespace() {
                draw_tofu(pixmap, cursor, top, font_size, &paint);
            } else if !c.is_whitespace() {
                let glyph = BASIC_FONTS.get(c).or_else(|| BASIC_FONTS.get('?'));
                if let Some(rows) = glyph {
                    for (row, bits) in rows.iter().enumerate() {
                        for col in 0..8 {
                            if (bits >> col) & 1 == 1 {
                                fill(
                                    pixmap,
                                    cursor + col as f32 * cell_w,
                                    top + row as f32 * cell_h,
                                    cell_w,
                                    cell_h,
                                    &paint,
                                );
                            }
                        }
                    }
                }
            }
            cursor += advance(c, font_size);
        }
    }
}
