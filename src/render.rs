//! Composites grid lines and optional cell numbers over a source image.
//!
//! The overlay is painted into 8-bit coverage masks first and composited
//! source-over in a single pass, so line crossings never double-blend.

use image::{DynamicImage, GenericImageView, GrayImage, Luma, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::filter::gaussian_blur_f32;
use imageproc::rect::Rect;
use rayon::prelude::*;
use tracing::*;

use crate::font;
use crate::{GridError, GridGeometry, RenderParams, Rgb};

// Fixed drop shadow under cell numbers, not user-configurable.
const SHADOW_ALPHA: f32 = 0.35;
const SHADOW_BLUR_RATIO: f32 = 0.08;
const MIN_SHADOW_BLUR: f32 = 2.0;

/// Renders the grid overlay onto `image`, returning a buffer of exactly the
/// source dimensions. Deterministic pure function of its inputs.
pub fn render(image: &DynamicImage, params: &RenderParams) -> Result<RgbaImage, GridError> {
    let (width, height) = image.dimensions();
    let geometry = GridGeometry::compute(width, height, params)?;
    debug!(
        width,
        height,
        rows = params.rows,
        cols = params.cols,
        thickness = params.thickness,
        "rendering grid overlay"
    );

    let mut out = image.to_rgba8();

    let lines = line_mask(width, height, &geometry, params.thickness);
    blend_mask(&mut out, &lines, params.color, params.opacity);

    if params.show_numbers {
        let labels = label_mask(width, height, &geometry);
        let blur = (geometry.font_size as f32 * SHADOW_BLUR_RATIO)
            .round()
            .max(MIN_SHADOW_BLUR);
        let shadow = gaussian_blur_f32(&labels, blur / 2.0);
        blend_mask(&mut out, &shadow, Rgb::BLACK, SHADOW_ALPHA);
        blend_mask(&mut out, &labels, params.color, params.text_alpha());
    }

    Ok(out)
}

/// Paints every interior grid line into a coverage mask as a filled rect
/// `thickness` wide, centered on the line coordinate.
fn line_mask(width: u32, height: u32, geometry: &GridGeometry, thickness: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    let on = Luma([255u8]);
    let half = thickness as f32 / 2.0;

    for &x in &geometry.vertical_xs {
        let left = (x - half).round() as i32;
        draw_filled_rect_mut(&mut mask, Rect::at(left, 0).of_size(thickness, height), on);
    }
    for &y in &geometry.horizontal_ys {
        let top = (y - half).round() as i32;
        draw_filled_rect_mut(&mut mask, Rect::at(0, top).of_size(width, thickness), on);
    }

    mask
}

/// Rasterizes all cell numbers into a coverage mask, each centered in its
/// cell.
fn label_mask(width: u32, height: u32, geometry: &GridGeometry) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for (label, cx, cy) in geometry.cell_centers() {
        font::draw_label(&mut mask, &label.to_string(), cx, cy, geometry.font_size);
    }
    mask
}

/// Source-over composites `color` onto `out` wherever `mask` has coverage,
/// with per-pixel alpha `alpha * coverage / 255`. Rows are processed in
/// parallel.
///
/// The over operator is computed in f32 and rounded once per channel, so a
/// fully opaque destination stays at alpha 255.
fn blend_mask(out: &mut RgbaImage, mask: &GrayImage, color: Rgb, alpha: f32) {
    let width = out.width() as usize;
    let stride = width * 4;
    let src_rgb = [color.r, color.g, color.b];
    let buf: &mut [u8] = &mut *out;

    buf.par_chunks_mut(stride)
        .zip(mask.as_raw().par_chunks(width))
        .for_each(|(row, mask_row)| {
            for (px, &coverage) in row.chunks_exact_mut(4).zip(mask_row) {
                if coverage == 0 {
                    continue;
                }
                let src_a = alpha * f32::from(coverage) / 255.0;
                let dst_a = f32::from(px[3]) / 255.0;
                let out_a = src_a + dst_a * (1.0 - src_a);
                if out_a <= 0.0 {
                    continue;
                }
                for c in 0..3 {
                    let blended = (f32::from(src_rgb[c]) * src_a
                        + f32::from(px[c]) * dst_a * (1.0 - src_a))
                        / out_a;
                    px[c] = blended.round() as u8;
                }
                px[3] = (out_a * 255.0).round() as u8;
            }
        });
}
