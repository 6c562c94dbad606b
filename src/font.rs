//! Embedded 5x7 bitmap digits, scaled with nearest-neighbor sampling.
//!
//! Cell labels are plain decimal numbers, so only the ten digit glyphs are
//! carried. Each glyph row is a 5-bit pattern with the most significant bit
//! on the left.

use image::{GrayImage, Luma};

pub const GLYPH_WIDTH: u32 = 5;
pub const GLYPH_HEIGHT: u32 = 7;
/// Horizontal advance between digits, in glyph units (one column of spacing).
pub const GLYPH_ADVANCE: u32 = 6;

#[rustfmt::skip]
const DIGITS_5X7: [[u8; 7]; 10] = [
    [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E], // 0
    [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E], // 1
    [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F], // 2
    [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E], // 3
    [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02], // 4
    [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E], // 5
    [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E], // 6
    [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08], // 7
    [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E], // 8
    [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C], // 9
];

/// Width in pixels of `text` rendered at `font_size` (glyph height scaled to
/// the font size, trailing inter-digit gap excluded).
pub fn text_width(text: &str, font_size: u32) -> f32 {
    let scale = font_size as f32 / GLYPH_HEIGHT as f32;
    let chars = text.chars().count() as f32;
    if chars == 0.0 {
        return 0.0;
    }
    (chars * GLYPH_ADVANCE as f32 - 1.0) * scale
}

/// Rasterizes `text` into the coverage mask, centered on `(cx, cy)` in both
/// axes. Non-digit characters occupy their advance but draw nothing.
pub fn draw_label(mask: &mut GrayImage, text: &str, cx: f32, cy: f32, font_size: u32) {
    let scale = font_size as f32 / GLYPH_HEIGHT as f32;
    let mut origin_x = cx - text_width(text, font_size) / 2.0;
    let origin_y = cy - (GLYPH_HEIGHT as f32 * scale) / 2.0;

    for ch in text.chars() {
        if let Some(digit) = ch.to_digit(10) {
            draw_glyph(mask, &DIGITS_5X7[digit as usize], origin_x, origin_y, scale);
        }
        origin_x += GLYPH_ADVANCE as f32 * scale;
    }
}

fn draw_glyph(mask: &mut GrayImage, glyph: &[u8; 7], origin_x: f32, origin_y: f32, scale: f32) {
    let target_w = (GLYPH_WIDTH as f32 * scale).round() as u32;
    let target_h = (GLYPH_HEIGHT as f32 * scale).round() as u32;

    for ty in 0..target_h {
        let row = ((ty as f32 / scale) as usize).min(GLYPH_HEIGHT as usize - 1);
        let bits = glyph[row];
        for tx in 0..target_w {
            let col = ((tx as f32 / scale) as u32).min(GLYPH_WIDTH - 1);
            if bits & (0x10 >> col) == 0 {
                continue;
            }
            let x = (origin_x + tx as f32).round();
            let y = (origin_y + ty as f32).round();
            if x >= 0.0 && y >= 0.0 && (x as u32) < mask.width() && (y as u32) < mask.height() {
                mask.put_pixel(x as u32, y as u32, Luma([255]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn coverage_bounds(mask: &GrayImage) -> Option<(u32, u32, u32, u32)> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, px) in mask.enumerate_pixels() {
            if px.0[0] == 0 {
                continue;
            }
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
        bounds
    }

    #[test]
    fn test_label_is_non_empty() {
        let mut mask = GrayImage::new(100, 100);
        draw_label(&mut mask, "1", 50.0, 50.0, 14);
        assert!(coverage_bounds(&mask).is_some());
    }

    #[test]
    fn test_label_is_centered() {
        let mut mask = GrayImage::new(200, 200);
        draw_label(&mut mask, "8", 100.0, 100.0, 28);
        let (x0, y0, x1, y1) = coverage_bounds(&mask).unwrap();
        let center_x = (x0 + x1) as f32 / 2.0;
        let center_y = (y0 + y1) as f32 / 2.0;
        // Centered to within one scaled glyph unit.
        let tolerance = 28.0 / 7.0;
        assert!((center_x - 100.0).abs() <= tolerance);
        assert!((center_y - 100.0).abs() <= tolerance);
    }

    #[test]
    fn test_glyph_height_matches_font_size() {
        let mut mask = GrayImage::new(200, 200);
        draw_label(&mut mask, "8", 100.0, 100.0, 35);
        let (_, y0, _, y1) = coverage_bounds(&mask).unwrap();
        assert_eq!(y1 - y0 + 1, 35);
    }

    #[test]
    fn test_multi_digit_label_is_wider() {
        let mut narrow = GrayImage::new(200, 200);
        draw_label(&mut narrow, "7", 100.0, 100.0, 21);
        let mut wide = GrayImage::new(200, 200);
        draw_label(&mut wide, "177", 100.0, 100.0, 21);
        let (nx0, _, nx1, _) = coverage_bounds(&narrow).unwrap();
        let (wx0, _, wx1, _) = coverage_bounds(&wide).unwrap();
        assert!(wx1 - wx0 > nx1 - nx0);
    }

    #[test]
    fn test_non_digit_draws_nothing() {
        let mut mask = GrayImage::new(100, 100);
        draw_label(&mut mask, "x", 50.0, 50.0, 14);
        assert!(coverage_bounds(&mask).is_none());
    }

    #[test]
    fn test_clipped_label_stays_in_bounds() {
        // Center near the edge: drawing must clip, not panic.
        let mut mask = GrayImage::new(30, 30);
        draw_label(&mut mask, "10", 1.0, 1.0, 20);
        draw_label(&mut mask, "10", 29.0, 29.0, 20);
    }

    #[test]
    fn test_text_width_scales_linearly() {
        assert_eq!(text_width("", 14), 0.0);
        let one = text_width("1", 14);
        let three = text_width("111", 14);
        assert!(three > 2.0 * one);
    }
}
