//! Quad stream builder — cached layout + atlas → interleaved vertices.
//!
//! Positions come out in world space: the entity-local Y-up frame (anchor
//! at the top) rotated by the entity rotation and offset by its anchor.
//! Glyphs whose atlas entry cannot be produced are skipped, matching the
//! "missing font renders nothing" degradation rule. Underline and
//! strikethrough bars sample the atlas's solid white cell.

use kerf_core::runs::{StyleFlags, StyleRun};
use kerf_core::store::{TextId, TextStore};
use kerf_layout::TextLayoutEngine;
use kerf_text::{FontManager, GlyphAtlas};

use crate::vertex::{unpack_rgba, GlyphVertex};

/// Build the vertex stream for one entity. Returns an empty buffer when
/// the entity or its layout is missing.
pub fn build_text_quads(
    store: &TextStore,
    engine: &TextLayoutEngine,
    fonts: &FontManager,
    atlas: &mut GlyphAtlas,
    id: TextId,
) -> Vec<GlyphVertex> {
    let mut vertices = Vec::new();
    let Some(entity) = store.entity(id) else {
        return vertices;
    };
    let Some(layout) = engine.layout(id) else {
        return vertices;
    };
    let runs: &[StyleRun] = store.get_runs(id).unwrap_or(&[]);
    if runs.is_empty() {
        return vertices;
    }

    let (sin, cos) = entity.rotation.sin_cos();
    let place = |x: f32, y: f32| -> [f32; 3] {
        [
            entity.x + x * cos - y * sin,
            entity.y + x * sin + y * cos,
            0.0,
        ]
    };

    let white_uv = atlas.white_uv();
    let mut line_top = 0.0f32;
    // Per-run horizontal span on the current line, for decoration bars.
    let mut spans: Vec<(u32, f32, f32)> = Vec::new();

    for line in &layout.lines {
        let baseline = line_top - line.ascent;
        let mut pen = line.x_offset;
        spans.clear();

        for glyph in &layout.glyphs[line.start_glyph..line.glyph_end()] {
            let run_index = glyph.run_index as usize;
            let Some(run) = runs.get(run_index) else {
                pen += glyph.x_advance;
                continue;
            };

            if run
                .flags
                .intersects(StyleFlags::UNDERLINE | StyleFlags::STRIKETHROUGH)
            {
                match spans.iter_mut().find(|(ri, _, _)| *ri == glyph.run_index) {
                    Some(span) => span.2 = pen + glyph.x_advance,
                    None => spans.push((glyph.run_index, pen, pen + glyph.x_advance)),
                }
            }

            let entry = atlas.get_glyph(fonts, run.font_id, glyph.glyph_id, run.flags);
            let Some(entry) = entry else {
                log::debug!("text {id}: no atlas entry for glyph {}, skipping", glyph.glyph_id);
                pen += glyph.x_advance;
                continue;
            };
            if entry.has_bitmap() {
                let size = run.font_size;
                let x0 = pen + glyph.x_offset + entry.bearing_x * size;
                let top = baseline + glyph.y_offset + entry.bearing_y * size;
                let x1 = x0 + entry.width * size;
                let bottom = top - entry.height * size;
                push_quad(
                    &mut vertices,
                    &place,
                    x0,
                    top,
                    x1,
                    bottom,
                    entry.uv_min,
                    entry.uv_max,
                    unpack_rgba(run.color),
                );
            }
            pen += glyph.x_advance;
        }

        for &(run_index, x0, x1) in &spans {
            let Some(run) = runs.get(run_index as usize) else {
                continue;
            };
            let variant = fonts.get_variant(
                run.font_id,
                run.flags.contains(StyleFlags::BOLD),
                run.flags.contains(StyleFlags::ITALIC),
            );
            let metrics = fonts.scaled_metrics(variant, run.font_size);
            let color = unpack_rgba(run.color);

            if run.flags.contains(StyleFlags::UNDERLINE) {
                let top = baseline + metrics.underline_position;
                push_quad(
                    &mut vertices,
                    &place,
                    x0,
                    top,
                    x1,
                    top - metrics.underline_thickness,
                    white_uv,
                    white_uv,
                    color,
                );
            }
            if run.flags.contains(StyleFlags::STRIKETHROUGH) {
                let top = baseline + 0.45 * metrics.ascender + metrics.underline_thickness / 2.0;
                push_quad(
                    &mut vertices,
                    &place,
                    x0,
                    top,
                    x1,
                    top - metrics.underline_thickness,
                    white_uv,
                    white_uv,
                    color,
                );
            }
        }

        line_top -= line.line_height;
    }

    vertices
}

#[allow(clippy::too_many_arguments)]
fn push_quad(
    out: &mut Vec<GlyphVertex>,
    place: &impl Fn(f32, f32) -> [f32; 3],
    x0: f32,
    top: f32,
    x1: f32,
    bottom: f32,
    uv_min: [f32; 2],
    uv_max: [f32; 2],
    color: [f32; 4],
) {
    let [u0, v0] = uv_min;
    let [u1, v1] = uv_max;
    // Two triangles, consistent winding in the Y-up frame.
    out.push(GlyphVertex::new(place(x0, top), [u0, v0], color));
    out.push(GlyphVertex::new(place(x0, bottom), [u0, v1], color));
    out.push(GlyphVertex::new(place(x1, top), [u1, v0], color));
    out.push(GlyphVertex::new(place(x1, top), [u1, v0], color));
    out.push(GlyphVertex::new(place(x0, bottom), [u0, v1], color));
    out.push(GlyphVertex::new(place(x1, bottom), [u1, v1], color));
}

// ===================================================================
// Tests
// ===================================================================
