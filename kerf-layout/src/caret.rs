//! Hit testing, caret geometry, and selection rectangles.
//!
//! All coordinates are entity-local and Y-up: the anchor is the box top at
//! y = 0, line `i` occupies `[top_i − line_height_i, top_i]`, and caret
//! positions name the line *top* (`y = −Σ heights above`).

use kerf_core::store::{TextId, TextStore};
use kerf_core::utf8;

use crate::engine::TextLayoutEngine;
use crate::{Layout, LayoutLine};

/// Result of a point query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitResult {
    /// Byte offset the caret would land on.
    pub char_index: usize,
    pub line_index: usize,
    /// Whether the hit resolved to the leading (logical-start) edge of the
    /// glyph under the point.
    pub is_leading_edge: bool,
}

/// Where a caret at some byte offset renders.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaretPosition {
    pub x: f32,
    /// Top of the caret's line (Y-up, anchor at 0).
    pub y: f32,
    pub height: f32,
    pub line_index: usize,
}

/// One highlight rectangle; selections emit at most one per line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SelectionRect {
    pub x: f32,
    /// Bottom of the line (Y-up).
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub line_index: usize,
}

impl TextLayoutEngine {
    /// Map an entity-local point to the byte offset a caret should land on.
    pub fn hit_test(&self, store: &TextStore, id: TextId, local_x: f32, local_y: f32) -> Option<HitResult> {
        let layout = self.layouts.get(&id)?;
        let content = store.get_content(id)?;
        let line_index = find_line_at_y(layout, local_y);
        let (char_index, is_leading_edge) =
            char_index_at_x(layout, content, line_index, local_x)?;
        Some(HitResult {
            char_index,
            line_index,
            is_leading_edge,
        })
    }

    /// Byte offset for a horizontal position on one specific line.
    pub fn char_index_at_x(
        &self,
        store: &TextStore,
        id: TextId,
        line_index: usize,
        local_x: f32,
    ) -> Option<usize> {
        let layout = self.layouts.get(&id)?;
        let content = store.get_content(id)?;
        char_index_at_x(layout, content, line_index, local_x).map(|(byte, _)| byte)
    }

    /// Caret geometry for a byte offset. The last line wins at end-of-text.
    pub fn caret_position(&self, store: &TextStore, id: TextId, char_index: usize) -> Option<CaretPosition> {
        let layout = self.layouts.get(&id)?;
        store.get_content(id)?;
        let line_index = line_for_byte(layout, char_index)?;
        let line = &layout.lines[line_index];

        let y = -layout.lines[..line_index]
            .iter()
            .map(|l| l.line_height)
            .sum::<f32>();
        Some(CaretPosition {
            x: x_at_byte(layout, line, char_index),
            y,
            height: line.line_height,
            line_index,
        })
    }

    /// One rectangle per line intersecting the byte range `[start, end)`.
    pub fn selection_rects(
        &self,
        store: &TextStore,
        id: TextId,
        start: usize,
        end: usize,
    ) -> Vec<SelectionRect> {
        let mut rects = Vec::new();
        let Some(layout) = self.layouts.get(&id) else {
            return rects;
        };
        if store.get_content(id).is_none() || end <= start {
            return rects;
        }

        let mut top = 0.0f32;
        for (i, line) in layout.lines.iter().enumerate() {
            let bottom = top - line.line_height;
            let from = start.max(line.start_byte);
            let to = end.min(line.end_byte());
            if from < to {
                let x0 = x_at_byte(layout, line, from);
                let x1 = x_at_byte(layout, line, to);
                let width = x1 - x0;
                if width > 0.0 {
                    rects.push(SelectionRect {
                        x: x0,
                        y: bottom,
                        width,
                        height: line.line_height,
                        line_index: i,
                    });
                }
            }
            top = bottom;
        }
        rects
    }
}

/// Line under a Y-up coordinate: walk down until the point sits above the
/// current line's bottom; past the last bottom the last line wins.
pub(crate) fn find_line_at_y(layout: &Layout, local_y: f32) -> usize {
    let mut top = 0.0f32;
    let last = layout.lines.len().saturating_sub(1);
    for (i, line) in layout.lines.iter().enumerate() {
        let bottom = top - line.line_height;
        if local_y > bottom || i == last {
            return i;
        }
        top = bottom;
    }
    0
}

/// Scan a line's glyphs for the one containing `local_x`; the half of the
/// glyph that was hit picks between its logical start and the boundary
/// after it (direction-aware). Past the last glyph the line end wins.
pub(crate) fn char_index_at_x(
    layout: &Layout,
    content: &str,
    line_index: usize,
    local_x: f32,
) -> Option<(usize, bool)> {
    let line = layout.lines.get(line_index)?;
    let mut x = line.x_offset;
    for g in &layout.glyphs[line.start_glyph..line.glyph_end()] {
        if local_x >= x && local_x < x + g.x_advance {
            let left_half = local_x < x + g.x_advance / 2.0;
            // LTR + left half or RTL + right half is the logical start.
            let leading = g.rtl != left_half;
            let byte = if leading {
                g.cluster
            } else {
                utf8::next_char_boundary(content, g.cluster)
            };
            return Some((byte, leading));
        }
        x += g.x_advance;
    }
    Some((line.end_byte(), false))
}

/// Line containing a byte offset (inclusive at the end so the caret can
/// sit at end-of-line); the last matching line wins.
pub(crate) fn line_for_byte(layout: &Layout, byte: usize) -> Option<usize> {
    let mut found = None;
    for (i, line) in layout.lines.iter().enumerate() {
        if byte >= line.start_byte && byte <= line.end_byte() {
            found = Some(i);
        }
    }
    found.or(if layout.lines.is_empty() { None } else { Some(layout.lines.len() - 1) })
}

/// X of the caret slot before `byte` on a line: the alignment offset plus
/// every advance whose cluster is logically before the byte.
pub(crate) fn x_at_byte(layout: &Layout, line: &LayoutLine, byte: usize) -> f32 {
    let mut x = line.x_offset;
    for g in &layout.glyphs[line.start_glyph..line.glyph_end()] {
        if g.cluster < byte {
            x += g.x_advance;
        }
    }
    x
}

// ===================================================================
// Tests
// ===================================================================
