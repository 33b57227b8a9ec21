//! Text store — the single source of truth for text entities.
//!
//! Owns every entity's header (anchor, box mode, alignment, constraint),
//! its UTF-8 content, its ordered style runs, the one focused
//! caret/selection, and the dirty set the layout engine consumes.
//!
//! All offsets are UTF-8 byte offsets; mutators clamp them to character
//! boundaries instead of failing. Every mutator marks the entity dirty
//! except [`TextStore::set_layout_result`], which is the layout engine's
//! write-back channel and must not re-dirty the entity.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::event::EngineEvent;
use crate::runs::{adjust_runs_for_delete, adjust_runs_for_insert, StyleRun};
use crate::utf8;

/// Stable nonzero entity id assigned by the host.
pub type TextId = u32;

/// Default size (pixels) for synthesized runs.
pub const DEFAULT_FONT_SIZE: f32 = 16.0;

/// Sizing mode of a text box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BoxMode {
    /// The box grows with its widest line.
    #[default]
    AutoWidth,
    /// The box wraps to `constraint_width`.
    FixedWidth,
}

/// Horizontal alignment of lines within the box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Cached layout result written back by the layout engine. Y-up: the anchor
/// is the top of the box and lines flow toward negative Y.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LayoutBounds {
    pub layout_width: f32,
    pub layout_height: f32,
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

/// Header fields of an entity, as supplied by `upsert_text`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextHeader {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub box_mode: BoxMode,
    pub align: TextAlign,
    pub constraint_width: f32,
}

/// A text entity's full header state.
#[derive(Clone, Copy, Debug)]
pub struct TextEntity {
    pub id: TextId,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub box_mode: BoxMode,
    pub align: TextAlign,
    pub constraint_width: f32,
    pub bounds: LayoutBounds,
}

/// The single focused caret/selection. `anchor <= focus`; the visible caret
/// sits at `focus`, the selection is `[anchor, focus)` when non-empty.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaretState {
    pub text_id: TextId,
    pub caret: usize,
    pub anchor: usize,
    pub focus: usize,
}

impl CaretState {
    pub fn has_selection(&self) -> bool {
        self.anchor < self.focus
    }
}

/// Store of all text entities plus caret and dirty bookkeeping.
pub struct TextStore {
    entities: FxHashMap<TextId, TextEntity>,
    contents: FxHashMap<TextId, String>,
    runs: FxHashMap<TextId, Vec<StyleRun>>,
    caret: Option<CaretState>,
    dirty: BTreeSet<TextId>,
    events: Vec<EngineEvent>,
}

impl Default for TextStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TextStore {
    pub fn new() -> Self {
        Self {
            entities: FxHashMap::default(),
            contents: FxHashMap::default(),
            runs: FxHashMap::default(),
            caret: None,
            dirty: BTreeSet::new(),
            events: Vec::new(),
        }
    }

    // ---------------------------------------------------------------
    // Entity lifecycle
    // ---------------------------------------------------------------

    /// Create or replace an entity. Content and runs are replaced
    /// atomically; layout bounds collapse to the anchor until the next
    /// layout pass. Returns `false` for the reserved id 0.
    pub fn upsert_text(
        &mut self,
        id: TextId,
        header: TextHeader,
        mut runs: Vec<StyleRun>,
        content: String,
    ) -> bool {
        if id == 0 {
            log::warn!("upsert_text: id 0 is reserved");
            return false;
        }
        let created = !self.entities.contains_key(&id);

        if runs.is_empty() {
            // Empty entities carry a zero-length typing stub; non-empty
            // content gets one default run covering it.
            runs.push(StyleRun::new(0, content.len(), 0, DEFAULT_FONT_SIZE));
        } else {
            runs.sort_by_key(|r| r.start);
        }

        self.entities.insert(
            id,
            TextEntity {
                id,
                x: header.x,
                y: header.y,
                rotation: header.rotation,
                box_mode: header.box_mode,
                align: header.align,
                constraint_width: header.constraint_width.max(0.0),
                bounds: LayoutBounds {
                    min_x: header.x,
                    min_y: header.y,
                    max_x: header.x,
                    max_y: header.y,
                    ..LayoutBounds::default()
                },
            },
        );
        self.contents.insert(id, content);
        self.runs.insert(id, runs);
        self.dirty.insert(id);
        self.events.push(if created {
            EngineEvent::EntityCreated(id)
        } else {
            EngineEvent::EntityChanged(id)
        });
        true
    }

    /// Drop an entity with its content, runs, and any caret targeting it.
    pub fn delete_text(&mut self, id: TextId) -> bool {
        if self.entities.remove(&id).is_none() {
            return false;
        }
        self.contents.remove(&id);
        self.runs.remove(&id);
        self.dirty.remove(&id);
        if self.caret.map(|c| c.text_id) == Some(id) {
            self.caret = None;
        }
        self.events.push(EngineEvent::EntityDeleted(id));
        true
    }

    // ---------------------------------------------------------------
    // Read-only views
    // ---------------------------------------------------------------

    pub fn has_text(&self, id: TextId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn entity(&self, id: TextId) -> Option<&TextEntity> {
        self.entities.get(&id)
    }

    pub fn get_content(&self, id: TextId) -> Option<&str> {
        self.contents.get(&id).map(String::as_str)
    }

    pub fn get_runs(&self, id: TextId) -> Option<&[StyleRun]> {
        self.runs.get(&id).map(Vec::as_slice)
    }

    /// All entity ids, ascending.
    pub fn all_text_ids(&self) -> Vec<TextId> {
        let mut ids: Vec<TextId> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn text_count(&self) -> usize {
        self.entities.len()
    }

    /// The run style governing the byte at `byte` — the typing stub at that
    /// position if one exists, otherwise left-biased at seams.
    pub fn style_at(&self, id: TextId, byte: usize) -> Option<StyleRun> {
        let runs = self.runs.get(&id)?;
        let content_len = self.contents.get(&id)?.len();
        let byte = byte.min(content_len);
        if let Some(stub) = runs.iter().find(|r| r.len == 0 && r.start == byte) {
            return Some(*stub);
        }
        runs.iter()
            .find(|r| byte > r.start && byte <= r.end())
            .or_else(|| runs.iter().find(|r| r.contains(byte)))
            .or_else(|| runs.first())
            .copied()
    }

    // ---------------------------------------------------------------
    // Content mutation
    // ---------------------------------------------------------------

    /// Insert text at `byte_index` (clamped to a character boundary).
    pub fn insert_content(&mut self, id: TextId, byte_index: usize, text: &str) -> bool {
        if text.is_empty() {
            return self.has_text(id);
        }
        let Some(content) = self.contents.get_mut(&id) else {
            return false;
        };
        let p = utf8::floor_char_boundary(content, byte_index);
        content.insert_str(p, text);
        let len = content.len();

        let runs = self.runs.entry(id).or_default();
        adjust_runs_for_insert(runs, p, text.len());
        if runs.iter().all(|r| r.len == 0) {
            runs.clear();
            runs.push(StyleRun::new(0, len, 0, DEFAULT_FONT_SIZE));
        }

        self.shift_caret_for_insert(id, p, text.len());
        self.touch(id);
        true
    }

    /// Delete the byte range `[start, end)` (both clamped to boundaries).
    pub fn delete_content(&mut self, id: TextId, start: usize, end: usize) -> bool {
        let Some(content) = self.contents.get_mut(&id) else {
            return false;
        };
        let s = utf8::floor_char_boundary(content, start);
        let e = utf8::floor_char_boundary(content, end);
        if e <= s {
            return true;
        }
        content.replace_range(s..e, "");

        if let Some(runs) = self.runs.get_mut(&id) {
            adjust_runs_for_delete(runs, s, e);
        }

        self.shift_caret_for_delete(id, s, e);
        self.touch(id);
        true
    }

    // ---------------------------------------------------------------
    // Style and header mutation
    // ---------------------------------------------------------------

    pub fn update_run(&mut self, id: TextId, index: usize, run: StyleRun) -> bool {
        let Some(runs) = self.runs.get_mut(&id) else {
            return false;
        };
        let Some(slot) = runs.get_mut(index) else {
            return false;
        };
        *slot = run;
        runs.sort_by_key(|r| r.start);
        self.touch(id);
        true
    }

    pub fn set_runs(&mut self, id: TextId, mut new_runs: Vec<StyleRun>) -> bool {
        if !self.entities.contains_key(&id) {
            return false;
        }
        new_runs.sort_by_key(|r| r.start);
        self.runs.insert(id, new_runs);
        self.touch(id);
        true
    }

    /// Set the wrap width; forces `FixedWidth`.
    pub fn set_constraint_width(&mut self, id: TextId, width: f32) -> bool {
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        entity.constraint_width = width.max(0.0);
        entity.box_mode = BoxMode::FixedWidth;
        self.touch(id);
        true
    }

    /// Layout-engine write-back. Deliberately does NOT mark dirty — the
    /// engine calls this at the end of every layout pass.
    pub fn set_layout_result(
        &mut self,
        id: TextId,
        width: f32,
        height: f32,
        min_x: f32,
        min_y: f32,
        max_x: f32,
        max_y: f32,
    ) -> bool {
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        entity.bounds = LayoutBounds {
            layout_width: width,
            layout_height: height,
            min_x,
            min_y,
            max_x,
            max_y,
        };
        true
    }

    // ---------------------------------------------------------------
    // Caret / selection
    // ---------------------------------------------------------------

    pub fn set_caret(&mut self, id: TextId, byte: usize) -> bool {
        let Some(content) = self.contents.get(&id) else {
            return false;
        };
        let b = utf8::floor_char_boundary(content, byte);
        self.caret = Some(CaretState {
            text_id: id,
            caret: b,
            anchor: b,
            focus: b,
        });
        self.events.push(EngineEvent::SelectionChanged(id));
        true
    }

    /// Set the selection; endpoints are swapped so `anchor <= focus`.
    pub fn set_selection(&mut self, id: TextId, start: usize, end: usize) -> bool {
        let Some(content) = self.contents.get(&id) else {
            return false;
        };
        let mut a = utf8::floor_char_boundary(content, start);
        let mut f = utf8::floor_char_boundary(content, end);
        if a > f {
            std::mem::swap(&mut a, &mut f);
        }
        self.caret = Some(CaretState {
            text_id: id,
            caret: f,
            anchor: a,
            focus: f,
        });
        self.events.push(EngineEvent::SelectionChanged(id));
        true
    }

    pub fn get_caret_state(&self, id: TextId) -> Option<CaretState> {
        self.caret.filter(|c| c.text_id == id)
    }

    pub fn focused_caret(&self) -> Option<CaretState> {
        self.caret
    }

    pub fn clear_caret_state(&mut self) {
        if let Some(c) = self.caret.take() {
            self.events.push(EngineEvent::SelectionChanged(c.text_id));
        }
    }

    // ---------------------------------------------------------------
    // Dirty tracking and events
    // ---------------------------------------------------------------

    pub fn mark_dirty(&mut self, id: TextId) {
        if self.entities.contains_key(&id) {
            self.dirty.insert(id);
        }
    }

    pub fn is_dirty(&self, id: TextId) -> bool {
        self.dirty.contains(&id)
    }

    /// Consume the dirty set, returning a deterministic ascending snapshot.
    pub fn consume_dirty_ids(&mut self) -> Vec<TextId> {
        let ids: Vec<TextId> = self.dirty.iter().copied().collect();
        self.dirty.clear();
        ids
    }

    /// Clear a single dirty flag; returns whether it was set.
    pub fn take_dirty(&mut self, id: TextId) -> bool {
        self.dirty.remove(&id)
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    pub fn push_event(&mut self, event: EngineEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    // ---------------------------------------------------------------
    // Internal helpers
    // ---------------------------------------------------------------

    fn touch(&mut self, id: TextId) {
        self.dirty.insert(id);
        self.events.push(EngineEvent::EntityChanged(id));
    }

    fn shift_caret_for_insert(&mut self, id: TextId, p: usize, k: usize) {
        if let Some(c) = self.caret.as_mut() {
            if c.text_id == id {
                for off in [&mut c.caret, &mut c.anchor, &mut c.focus] {
                    if *off >= p {
                        *off += k;
                    }
                }
            }
        }
    }

    fn shift_caret_for_delete(&mut self, id: TextId, s: usize, e: usize) {
        if let Some(c) = self.caret.as_mut() {
            if c.text_id == id {
                for off in [&mut c.caret, &mut c.anchor, &mut c.focus] {
                    if *off >= e {
                        *off -= e - s;
                    } else if *off > s {
                        *off = s;
                    }
                }
            }
        }
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runs::{runs_cover_content, StyleFlags};

    fn store_with(id: TextId, content: &str) -> TextStore {
        let mut store = TextStore::new();
        assert!(store.upsert_text(id, TextHeader::default(), Vec::new(), content.to_string()));
        store
    }

    #[test]
    fn test_upsert_rejects_id_zero() {
        let mut store = TextStore::new();
        assert!(!store.upsert_text(0, TextHeader::default(), Vec::new(), String::new()));
    }

    #[test]
    fn test_upsert_synthesizes_default_run() {
        let store = store_with(1, "hello");
        let runs = store.get_runs(1).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].start, 0);
        assert_eq!(runs[0].len, 5);
        assert_eq!(runs[0].font_id, 0);
        assert_eq!(runs[0].color, 0xFFFF_FFFF);
    }

    #[test]
    fn test_upsert_empty_carries_typing_stub() {
        let store = store_with(1, "");
        let runs = store.get_runs(1).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].len, 0);
    }

    #[test]
    fn test_upsert_marks_dirty_and_emits_created() {
        let mut store = store_with(7, "x");
        assert!(store.is_dirty(7));
        let events = store.drain_events();
        assert!(events.contains(&EngineEvent::EntityCreated(7)));

        store.upsert_text(7, TextHeader::default(), Vec::new(), "y".into());
        let events = store.drain_events();
        assert!(events.contains(&EngineEvent::EntityChanged(7)));
    }

    #[test]
    fn test_delete_text_drops_everything() {
        let mut store = store_with(1, "abc");
        store.set_caret(1, 2);
        assert!(store.delete_text(1));
        assert!(!store.has_text(1));
        assert!(store.get_content(1).is_none());
        assert!(store.get_runs(1).is_none());
        assert!(store.focused_caret().is_none());
        assert!(!store.delete_text(1));
    }

    #[test]
    fn test_insert_grows_content_and_runs() {
        let mut store = store_with(1, "");
        assert!(store.insert_content(1, 0, "Hello"));
        assert_eq!(store.get_content(1), Some("Hello"));
        let runs = store.get_runs(1).unwrap();
        assert!(runs_cover_content(runs, 5));
        assert!(store.is_dirty(1));
    }

    #[test]
    fn test_insert_clamps_offset_to_boundary() {
        let mut store = store_with(1, "é"); // 2 bytes
        assert!(store.insert_content(1, 1, "x")); // inside 'é' → snaps to 0
        assert_eq!(store.get_content(1), Some("xé"));
    }

    #[test]
    fn test_insert_past_end_appends() {
        let mut store = store_with(1, "ab");
        assert!(store.insert_content(1, 99, "c"));
        assert_eq!(store.get_content(1), Some("abc"));
    }

    #[test]
    fn test_delete_range_clamps_and_adjusts() {
        let mut store = store_with(1, "hello world");
        assert!(store.delete_content(1, 5, 99));
        assert_eq!(store.get_content(1), Some("hello"));
        assert!(runs_cover_content(store.get_runs(1).unwrap(), 5));
    }

    #[test]
    fn test_delete_empty_range_is_noop() {
        let mut store = store_with(1, "abc");
        store.drain_events();
        assert!(store.consume_dirty_ids().contains(&1));
        assert!(store.delete_content(1, 2, 2));
        assert_eq!(store.get_content(1), Some("abc"));
        assert_eq!(store.dirty_count(), 0);
    }

    #[test]
    fn test_caret_clamps_to_boundary() {
        let mut store = store_with(1, "a漢b");
        assert!(store.set_caret(1, 2)); // inside 漢 → snaps down to 1
        let caret = store.get_caret_state(1).unwrap();
        assert_eq!(caret.focus, 1);
        assert!(!caret.has_selection());
    }

    #[test]
    fn test_selection_swaps_endpoints() {
        let mut store = store_with(1, "abcdef");
        assert!(store.set_selection(1, 4, 1));
        let caret = store.get_caret_state(1).unwrap();
        assert_eq!(caret.anchor, 1);
        assert_eq!(caret.focus, 4);
        assert!(caret.has_selection());
    }

    #[test]
    fn test_caret_shifts_on_insert_and_delete() {
        let mut store = store_with(1, "abcdef");
        store.set_caret(1, 4);
        store.insert_content(1, 2, "XY");
        assert_eq!(store.get_caret_state(1).unwrap().focus, 6);

        store.delete_content(1, 0, 3);
        assert_eq!(store.get_caret_state(1).unwrap().focus, 3);

        // Caret inside a deleted range collapses to its start.
        store.set_caret(1, 3);
        store.delete_content(1, 1, 4);
        assert_eq!(store.get_caret_state(1).unwrap().focus, 1);
    }

    #[test]
    fn test_set_constraint_width_forces_fixed() {
        let mut store = store_with(1, "abc");
        assert!(store.set_constraint_width(1, 120.0));
        let entity = store.entity(1).unwrap();
        assert_eq!(entity.box_mode, BoxMode::FixedWidth);
        assert_eq!(entity.constraint_width, 120.0);
        assert!(store.is_dirty(1));
    }

    #[test]
    fn test_set_layout_result_does_not_mark_dirty() {
        let mut store = store_with(1, "abc");
        store.consume_dirty_ids();
        assert!(store.set_layout_result(1, 10.0, 20.0, 0.0, -20.0, 10.0, 0.0));
        assert_eq!(store.dirty_count(), 0);
        let bounds = store.entity(1).unwrap().bounds;
        assert_eq!(bounds.layout_width, 10.0);
        assert_eq!(bounds.min_y, -20.0);
    }

    #[test]
    fn test_consume_dirty_is_sorted_and_empties() {
        let mut store = TextStore::new();
        for id in [9, 3, 7] {
            store.upsert_text(id, TextHeader::default(), Vec::new(), String::new());
        }
        assert_eq!(store.consume_dirty_ids(), vec![3, 7, 9]);
        assert_eq!(store.dirty_count(), 0);
    }

    #[test]
    fn test_style_at_prefers_typing_stub() {
        let mut store = store_with(1, "foobar");
        let mut bold = StyleRun::new(3, 0, 2, 20.0);
        bold.flags = StyleFlags::BOLD;
        store.set_runs(
            1,
            vec![StyleRun::new(0, 3, 1, 16.0), bold, StyleRun::new(3, 3, 1, 16.0)],
        );
        let style = store.style_at(1, 3).unwrap();
        assert_eq!(style.flags, StyleFlags::BOLD);
        assert_eq!(style.font_size, 20.0);
    }

    #[test]
    fn test_style_at_left_biased_at_seam() {
        let mut store = store_with(1, "foobar");
        store.set_runs(
            1,
            vec![StyleRun::new(0, 3, 5, 16.0), StyleRun::new(3, 3, 6, 16.0)],
        );
        assert_eq!(store.style_at(1, 3).unwrap().font_id, 5);
        assert_eq!(store.style_at(1, 0).unwrap().font_id, 5);
        assert_eq!(store.style_at(1, 6).unwrap().font_id, 6);
    }

    #[test]
    fn test_all_text_ids_sorted() {
        let mut store = TextStore::new();
        for id in [42, 5, 17] {
            store.upsert_text(id, TextHeader::default(), Vec::new(), String::new());
        }
        assert_eq!(store.all_text_ids(), vec![5, 17, 42]);
    }
}
