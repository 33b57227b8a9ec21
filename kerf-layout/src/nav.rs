//! Caret navigation over the visual-gap model.
//!
//! A layout with N glyphs has N+1 notional gaps; gap `i` is the visual
//! slot on the logical-start side of glyph `i` (left for LTR, right for
//! RTL). Navigation moves between gaps, which is exact for purely LTR or
//! purely RTL text and a consistent approximation for mixed runs — the
//! public surface stays stable if a full reordering pass lands here later.

use kerf_core::store::{TextId, TextStore};
use kerf_core::utf8;

use crate::caret::{char_index_at_x, line_for_byte};
use crate::engine::TextLayoutEngine;
use crate::Layout;

/// Word characters for ctrl-arrow movement; conservative on purpose —
/// anything non-ASCII counts as a word character, only ASCII whitespace
/// counts as space.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || (c as u32) >= 128
}

fn is_space_char(c: char) -> bool {
    c.is_ascii_whitespace()
}

impl TextLayoutEngine {
    /// Caret one visual slot to the left (clamped at the first gap).
    pub fn visual_prev_char_index(&self, store: &TextStore, id: TextId, char_index: usize) -> usize {
        let Some((layout, content)) = self.layout_and_content(store, id) else {
            return char_index;
        };
        let gap = gap_for_char(layout, content, char_index);
        char_for_gap(layout, content, gap.saturating_sub(1))
    }

    /// Caret one visual slot to the right (clamped at the last gap).
    pub fn visual_next_char_index(&self, store: &TextStore, id: TextId, char_index: usize) -> usize {
        let Some((layout, content)) = self.layout_and_content(store, id) else {
            return char_index;
        };
        let gap = gap_for_char(layout, content, char_index);
        char_for_gap(layout, content, (gap + 1).min(layout.glyphs.len()))
    }

    /// Skip whitespace leftward, then a word, stopping at its start.
    pub fn word_left_index(&self, store: &TextStore, id: TextId, char_index: usize) -> usize {
        let Some((layout, content)) = self.layout_and_content(store, id) else {
            return char_index;
        };
        let gap = gap_for_char(layout, content, char_index);
        let mut i = gap as isize - 1;
        while i >= 0 && is_space_char(char_at_gap(layout, content, i as usize)) {
            i -= 1;
        }
        while i >= 0 && !is_space_char(char_at_gap(layout, content, i as usize)) {
            i -= 1;
        }
        char_for_gap(layout, content, (i + 1) as usize)
    }

    /// Skip a word (or a space run) rightward, landing on the next word's
    /// start.
    pub fn word_right_index(&self, store: &TextStore, id: TextId, char_index: usize) -> usize {
        let Some((layout, content)) = self.layout_and_content(store, id) else {
            return char_index;
        };
        let n = layout.glyphs.len();
        let mut i = gap_for_char(layout, content, char_index);
        if i >= n {
            return char_for_gap(layout, content, n);
        }
        if is_space_char(char_at_gap(layout, content, i)) {
            while i < n && is_space_char(char_at_gap(layout, content, i)) {
                i += 1;
            }
        } else {
            while i < n && !is_space_char(char_at_gap(layout, content, i)) {
                i += 1;
            }
            while i < n && is_space_char(char_at_gap(layout, content, i)) {
                i += 1;
            }
        }
        char_for_gap(layout, content, i)
    }

    /// First byte of the caret's line.
    pub fn line_start_index(&self, store: &TextStore, id: TextId, char_index: usize) -> usize {
        let Some((layout, _)) = self.layout_and_content(store, id) else {
            return char_index;
        };
        line_for_byte(layout, char_index)
            .map(|i| layout.lines[i].start_byte)
            .unwrap_or(char_index)
    }

    /// One past the last byte of the caret's line.
    pub fn line_end_index(&self, store: &TextStore, id: TextId, char_index: usize) -> usize {
        let Some((layout, _)) = self.layout_and_content(store, id) else {
            return char_index;
        };
        line_for_byte(layout, char_index)
            .map(|i| layout.lines[i].end_byte())
            .unwrap_or(char_index)
    }

    /// Caret one line up at (approximately) the same X; byte 0 at the top
    /// edge. X is not sticky across repeated vertical moves.
    pub fn line_up_index(&self, store: &TextStore, id: TextId, char_index: usize) -> usize {
        let Some(pos) = self.caret_position(store, id, char_index) else {
            return char_index;
        };
        if pos.line_index == 0 {
            return 0;
        }
        let Some((layout, content)) = self.layout_and_content(store, id) else {
            return char_index;
        };
        char_index_at_x(layout, content, pos.line_index - 1, pos.x)
            .map(|(byte, _)| byte)
            .unwrap_or(char_index)
    }

    /// Caret one line down at the same X; end-of-text at the bottom edge.
    pub fn line_down_index(&self, store: &TextStore, id: TextId, char_index: usize) -> usize {
        let Some(pos) = self.caret_position(store, id, char_index) else {
            return char_index;
        };
        let Some((layout, content)) = self.layout_and_content(store, id) else {
            return char_index;
        };
        if pos.line_index + 1 >= layout.lines.len() {
            return layout.lines.last().map(|l| l.end_byte()).unwrap_or(char_index);
        }
        char_index_at_x(layout, content, pos.line_index + 1, pos.x)
            .map(|(byte, _)| byte)
            .unwrap_or(char_index)
    }

    fn layout_and_content<'a>(
        &'a self,
        store: &'a TextStore,
        id: TextId,
    ) -> Option<(&'a Layout, &'a str)> {
        Some((self.layouts.get(&id)?, store.get_content(id)?))
    }
}

/// Logical byte → gap index. Exact cluster matches map directly; offsets
/// between clusters (unshaped bytes) snap to the next glyph's gap.
fn gap_for_char(layout: &Layout, content: &str, char_index: usize) -> usize {
    if char_index >= content.len() {
        return layout.glyphs.len();
    }
    for (i, g) in layout.glyphs.iter().enumerate() {
        if g.cluster == char_index {
            return if g.rtl { i + 1 } else { i };
        }
    }
    layout
        .glyphs
        .iter()
        .position(|g| g.cluster > char_index)
        .unwrap_or(layout.glyphs.len())
}

/// Gap index → logical byte.
fn char_for_gap(layout: &Layout, content: &str, gap: usize) -> usize {
    match layout.glyphs.get(gap) {
        None => layout
            .lines
            .last()
            .map(|l| l.end_byte())
            .unwrap_or(content.len()),
        Some(g) => {
            if g.rtl {
                utf8::next_char_boundary(content, g.cluster)
            } else {
                g.cluster
            }
        }
    }
}

/// Character of the glyph at a gap (used by the word classifier).
fn char_at_gap(layout: &Layout, content: &str, gap: usize) -> char {
    layout
        .glyphs
        .get(gap)
        .and_then(|g| content[g.cluster.min(content.len())..].chars().next())
        .unwrap_or(' ')
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LayoutLine, ShapedGlyph};
    use kerf_core::store::TextHeader;
    use kerf_core::TextStore;

    fn ltr_glyph(cluster: usize) -> ShapedGlyph {
        ShapedGlyph {
            glyph_id: 1,
            cluster,
            x_advance: 10.0,
            y_advance: 0.0,
            x_offset: 0.0,
            y_offset: 0.0,
            rtl: false,
            run_index: 0,
        }
    }

    /// Single-line LTR fixture over `text`, one glyph per byte.
    fn fixture(text: &str) -> (TextStore, TextLayoutEngine) {
        let mut store = TextStore::new();
        store.upsert_text(1, TextHeader::default(), Vec::new(), text.to_string());
        let glyphs: Vec<ShapedGlyph> = (0..text.len()).map(ltr_glyph).collect();
        let lines = vec![LayoutLine {
            start_glyph: 0,
            glyph_count: glyphs.len(),
            start_byte: 0,
            byte_count: text.len(),
            width: 10.0 * glyphs.len() as f32,
            ascent: 16.0,
            descent: -4.0,
            line_height: 20.0,
            x_offset: 0.0,
        }];
        let mut engine = TextLayoutEngine::new();
        engine.insert_layout(
            1,
            crate::Layout {
                total_width: 10.0 * glyphs.len() as f32,
                total_height: 20.0,
                baseline_y: 16.0,
                glyphs,
                lines,
                dirty: false,
            },
        );
        (store, engine)
    }

    #[test]
    fn test_visual_prev_next_clamp() {
        let (store, engine) = fixture("abc");
        assert_eq!(engine.visual_next_char_index(&store, 1, 0), 1);
        assert_eq!(engine.visual_next_char_index(&store, 1, 2), 3);
        assert_eq!(engine.visual_next_char_index(&store, 1, 3), 3);
        assert_eq!(engine.visual_prev_char_index(&store, 1, 3), 2);
        assert_eq!(engine.visual_prev_char_index(&store, 1, 1), 0);
        assert_eq!(engine.visual_prev_char_index(&store, 1, 0), 0);
    }

    #[test]
    fn test_word_left_skips_space_then_word() {
        let (store, engine) = fixture("foo bar baz");
        assert_eq!(engine.word_left_index(&store, 1, 11), 8);
        assert_eq!(engine.word_left_index(&store, 1, 8), 4);
        assert_eq!(engine.word_left_index(&store, 1, 5), 4);
        assert_eq!(engine.word_left_index(&store, 1, 4), 0);
        assert_eq!(engine.word_left_index(&store, 1, 0), 0);
    }

    #[test]
    fn test_word_right_lands_on_next_word_start() {
        let (store, engine) = fixture("foo bar baz");
        assert_eq!(engine.word_right_index(&store, 1, 0), 4);
        assert_eq!(engine.word_right_index(&store, 1, 4), 8);
        // Starting on the space: skip the space run only.
        assert_eq!(engine.word_right_index(&store, 1, 3), 4);
        assert_eq!(engine.word_right_index(&store, 1, 8), 11);
        assert_eq!(engine.word_right_index(&store, 1, 11), 11);
    }

    #[test]
    fn test_line_start_end() {
        let (store, engine) = fixture("hello");
        assert_eq!(engine.line_start_index(&store, 1, 3), 0);
        assert_eq!(engine.line_end_index(&store, 1, 3), 5);
    }

    #[test]
    fn test_missing_layout_is_identity() {
        let store = TextStore::new();
        let engine = TextLayoutEngine::new();
        assert_eq!(engine.visual_next_char_index(&store, 9, 2), 2);
        assert_eq!(engine.word_left_index(&store, 9, 2), 2);
        assert_eq!(engine.line_up_index(&store, 9, 2), 2);
    }

    #[test]
    fn test_line_up_down_via_two_lines() {
        let mut store = TextStore::new();
        store.upsert_text(1, TextHeader::default(), Vec::new(), "ab\ncd".to_string());
        let glyphs = vec![
            ltr_glyph(0),
            ltr_glyph(1),
            ShapedGlyph { x_advance: 0.0, ..ltr_glyph(2) },
            ltr_glyph(3),
            ltr_glyph(4),
        ];
        let lines = vec![
            LayoutLine {
                start_glyph: 0,
                glyph_count: 2,
                start_byte: 0,
                byte_count: 2,
                width: 20.0,
                ascent: 16.0,
                descent: -4.0,
                line_height: 20.0,
                x_offset: 0.0,
            },
            LayoutLine {
                start_glyph: 3,
                glyph_count: 2,
                start_byte: 3,
                byte_count: 2,
                width: 20.0,
                ascent: 16.0,
                descent: -4.0,
                line_height: 20.0,
                x_offset: 0.0,
            },
        ];
        let mut engine = TextLayoutEngine::new();
        engine.insert_layout(
            1,
            crate::Layout {
                glyphs,
                lines,
                total_width: 20.0,
                total_height: 40.0,
                baseline_y: 16.0,
                dirty: false,
            },
        );

        // Down from 'b' (byte 1, x=10) lands on 'd''s left half (byte 4).
        assert_eq!(engine.line_down_index(&store, 1, 1), 4);
        // Up from byte 4 returns to byte 1.
        assert_eq!(engine.line_up_index(&store, 1, 4), 1);
        // Edges: up from the top goes to 0, down from the bottom to the end.
        assert_eq!(engine.line_up_index(&store, 1, 1), 0);
        assert_eq!(engine.line_down_index(&store, 1, 4), 5);
    }

    #[test]
    fn test_rtl_gap_round_trip() {
        let mut store = TextStore::new();
        store.upsert_text(1, TextHeader::default(), Vec::new(), "אב".to_string());
        let glyphs = vec![
            ShapedGlyph { rtl: true, ..ltr_glyph(2) },
            ShapedGlyph { rtl: true, ..ltr_glyph(0) },
        ];
        let lines = vec![LayoutLine {
            start_glyph: 0,
            glyph_count: 2,
            start_byte: 0,
            byte_count: 4,
            width: 20.0,
            ascent: 16.0,
            descent: -4.0,
            line_height: 20.0,
            x_offset: 0.0,
        }];
        let mut engine = TextLayoutEngine::new();
        engine.insert_layout(
            1,
            crate::Layout {
                glyphs,
                lines,
                total_width: 20.0,
                total_height: 20.0,
                baseline_y: 16.0,
                dirty: false,
            },
        );

        // In RTL, moving visually left advances through the text: the
        // logical start walks 0 → 2 → 4.
        assert_eq!(engine.visual_prev_char_index(&store, 1, 0), 2);
        assert_eq!(engine.visual_prev_char_index(&store, 1, 2), 4);
        // Rightward from mid-text reaches the last gap (which the model
        // maps to end-of-line) and clamps there.
        assert_eq!(engine.visual_next_char_index(&store, 1, 2), 4);
        assert_eq!(engine.visual_next_char_index(&store, 1, 4), 4);
    }
}
