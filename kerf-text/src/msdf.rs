//! Outline → multi-channel signed distance field bitmaps.
//!
//! The projection maps the glyph's design-unit bounding box into the
//! bitmap with `px_range` pixels of margin on every side and the Y flip
//! folded in, so rows come out top-down and can be blitted straight into
//! the atlas. Channel values encode `clamp(d/px_range + 0.5, 0, 1)·255`,
//! which is the contract the renderer's median-of-three shader decodes.
//!
//! Synthetic styling happens here when no real variant exists: italic is a
//! horizontal shear baked into the projection; bold is a uniform distance
//! bias (a distance field dilates by shifting every channel), both with a
//! matching advance correction.

use fdsm::bezier::scanline::FillRule;
use fdsm::generate::generate_msdf;
use fdsm::render::correct_sign_msdf;
use fdsm::shape::Shape;
use fdsm::transform::Transform;
use image::RgbImage;
use nalgebra::{Affine2, Matrix3};
use ttf_parser::{Face, GlyphId};

/// Horizontal shear applied for synthetic italics.
pub const ITALIC_SHEAR: f32 = 0.2;

/// Synthetic bold emboldens by `units_per_em / EMBOLDEN_DIVISOR`.
pub const EMBOLDEN_DIVISOR: f32 = 32.0;

/// Corner threshold handed to the edge-coloring pass.
const CORNER_THRESHOLD: f64 = 0.03;

/// A rendered glyph bitmap plus the design-unit geometry it was cut from.
pub struct GlyphBitmap {
    pub width: u32,
    pub height: u32,
    /// Top-down RGB rows, one byte per channel.
    pub rgb: RgbImage,
    /// Left edge of the (possibly sheared) outline, design units.
    pub left: f32,
    /// Top edge of the outline, design units.
    pub top: f32,
    /// Horizontal advance including synthetic corrections, design units.
    pub advance: f32,
}

/// Advance in design units including the synthetic-bold correction; used
/// for metrics-only entries where no outline exists.
pub fn glyph_advance(face: &Face, glyph: GlyphId, synth_bold: bool) -> f32 {
    let mut advance = face.glyph_hor_advance(glyph).unwrap_or(0) as f32;
    if synth_bold {
        advance += face.units_per_em() as f32 / EMBOLDEN_DIVISOR;
    }
    advance
}

/// Render one glyph. Returns `None` for empty outlines (spaces, controls),
/// which callers turn into metrics-only entries.
pub fn render_glyph(
    face: &Face,
    glyph: GlyphId,
    msdf_size: u32,
    px_range: u32,
    synth_bold: bool,
    synth_italic: bool,
) -> Option<GlyphBitmap> {
    let bbox = face.glyph_bounding_box(glyph)?;
    if bbox.x_max <= bbox.x_min || bbox.y_max <= bbox.y_min {
        return None;
    }
    let upem = face.units_per_em() as f64;
    let shear = if synth_italic { ITALIC_SHEAR as f64 } else { 0.0 };

    // Sheared horizontal extents (x' = x + shear·y, shear ≥ 0).
    let x_min = bbox.x_min as f64 + shear * bbox.y_min as f64;
    let x_max = bbox.x_max as f64 + shear * bbox.y_max as f64;
    let y_min = bbox.y_min as f64;
    let y_max = bbox.y_max as f64;

    let scale = msdf_size as f64 / upem;
    let margin = px_range as f64;
    let max_side = 2 * msdf_size;
    let width = (((x_max - x_min) * scale + 2.0 * margin).ceil() as u32).clamp(1, max_side);
    let height = (((y_max - y_min) * scale + 2.0 * margin).ceil() as u32).clamp(1, max_side);

    // Design units → bitmap pixels, top-down, margin on all sides.
    let projection = Affine2::from_matrix_unchecked(Matrix3::new(
        scale,
        shear * scale,
        margin - scale * x_min,
        0.0,
        -scale,
        margin + scale * y_max,
        0.0,
        0.0,
        1.0,
    ));

    let mut shape: Shape<_> =
        fdsm_ttf_parser::load_shape_from_face(face, glyph).expect("outline checked above");
    shape.transform(&projection);
    let colored = Shape::edge_coloring_simple(shape, CORNER_THRESHOLD, 0x71C4_D5A2);
    let prepared = colored.prepare();

    let mut rgb = RgbImage::new(width, height);
    generate_msdf(&prepared, px_range as f64, &mut rgb);
    correct_sign_msdf(&mut rgb, &prepared, FillRule::Nonzero);

    let embolden = if synth_bold { upem / EMBOLDEN_DIVISOR as f64 } else { 0.0 };
    if synth_bold {
        // Dilating a distance field by e/2 per side is a uniform shift of
        // every encoded channel value.
        let bias_px = embolden * scale * 0.5;
        let bias = ((bias_px / px_range as f64) * 255.0).round().min(255.0) as u8;
        for pixel in rgb.pixels_mut() {
            for channel in pixel.0.iter_mut() {
                *channel = channel.saturating_add(bias);
            }
        }
    }

    let mut advance = face.glyph_hor_advance(glyph).unwrap_or(0) as f32;
    advance += embolden as f32;
    if synth_italic {
        // The shear pushes ink above the baseline to the right; widen the
        // advance by the overhang so neighbors keep clear of it.
        advance += ITALIC_SHEAR * bbox.y_max.max(0) as f32;
    }

    Some(GlyphBitmap {
        width,
        height,
        rgb,
        left: x_min as f32,
        top: y_max as f32,
        advance,
    })
}

// ===================================================================
// Tests
// ===================================================================
