//! # kerf-layout
//!
//! Paragraph layout for the Kerf text subsystem: shapes each styled run
//! through the shaping service, breaks lines, aligns them, writes bounds
//! back to the store, and answers every caret/hit/navigation query from
//! the cached result.
//!
//! ## Architecture
//!
//! ```text
//! TextStore (dirty ids) ──▸ TextLayoutEngine::layout_dirty_texts
//!        ▲                        │ per run: rustybuzz shape
//!        │ set_layout_result      ▼
//!        └──────────────── Layout { glyphs[], lines[] }
//!                                 │
//!                 hit test · caret · selection · navigation
//! ```
//!
//! - **`engine`** — shaping, line breaking, alignment, bounds write-back.
//! - **`caret`** — hit testing, caret geometry, selection rectangles.
//! - **`nav`** — direction-aware visual/word/line caret movement.

pub mod caret;
pub mod engine;
pub mod nav;

pub use caret::{CaretPosition, HitResult, SelectionRect};
pub use engine::TextLayoutEngine;

/// One shaped glyph in a cached layout.
///
/// `cluster` is the byte offset into the entity's content of the character
/// this glyph represents, already re-biased from run-local to entity-global
/// offsets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapedGlyph {
    pub glyph_id: u16,
    pub cluster: usize,
    pub x_advance: f32,
    pub y_advance: f32,
    pub x_offset: f32,
    pub y_offset: f32,
    /// Set when the glyph came out of an RTL-shaped run.
    pub rtl: bool,
    /// Index into the entity's run list that produced this glyph.
    pub run_index: u32,
}

/// One laid-out line. `byte_count` excludes the newline that caused a hard
/// break. `descent` is negative (below the baseline).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LayoutLine {
    pub start_glyph: usize,
    pub glyph_count: usize,
    pub start_byte: usize,
    pub byte_count: usize,
    pub width: f32,
    pub ascent: f32,
    pub descent: f32,
    pub line_height: f32,
    /// Horizontal alignment offset, clamped to >= 0.
    pub x_offset: f32,
}

impl LayoutLine {
    /// One past the last content byte on this line.
    #[inline]
    pub fn end_byte(&self) -> usize {
        self.start_byte + self.byte_count
    }

    #[inline]
    pub fn glyph_end(&self) -> usize {
        self.start_glyph + self.glyph_count
    }
}

/// Cached layout of one entity. Empty content still yields exactly one
/// zero-width line so the caret has somewhere to sit; content ending in a
/// newline gets a trailing empty line for the same reason.
#[derive(Clone, Debug, Default)]
pub struct Layout {
    pub glyphs: Vec<ShapedGlyph>,
    pub lines: Vec<LayoutLine>,
    pub total_width: f32,
    pub total_height: f32,
    /// Distance from the box top down to the first baseline.
    pub baseline_y: f32,
    /// Set by `invalidate`; cleared by a successful layout pass.
    pub dirty: bool,
}
