//! Layout engine — per-run shaping, line breaking, alignment, write-back.
//!
//! The engine holds non-owning references to the store and font manager
//! only for the duration of a call; results are written back through
//! `TextStore::set_layout_result`, the one store mutator that does not mark
//! dirty (anything else would loop forever).
//!
//! One `rustybuzz` buffer is recycled across every shape call — the shaping
//! service's reusable scratch allocation is never shared across engines.

use rustc_hash::FxHashMap;
use rustybuzz::ttf_parser::Tag;
use rustybuzz::{Direction, Feature, UnicodeBuffer};

use kerf_core::runs::{StyleFlags, StyleRun};
use kerf_core::store::{BoxMode, TextAlign, TextId, TextStore, DEFAULT_FONT_SIZE};
use kerf_text::fonts::{FontHandle, FontManager, ScaledMetrics};

use crate::{Layout, LayoutLine, ShapedGlyph};

/// Engine with a per-entity layout cache.
pub struct TextLayoutEngine {
    pub(crate) layouts: FxHashMap<TextId, Layout>,
    shape_buffer: Option<UnicodeBuffer>,
}

impl Default for TextLayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayoutEngine {
    pub fn new() -> Self {
        Self {
            layouts: FxHashMap::default(),
            shape_buffer: None,
        }
    }

    /// The cached layout for an entity, if one has been computed.
    pub fn layout(&self, id: TextId) -> Option<&Layout> {
        self.layouts.get(&id)
    }

    /// Mark a cached layout stale without touching the store.
    pub fn invalidate(&mut self, id: TextId) {
        if let Some(layout) = self.layouts.get_mut(&id) {
            layout.dirty = true;
        }
    }

    /// Drop the cached layout of a deleted entity.
    pub fn remove_layout(&mut self, id: TextId) {
        self.layouts.remove(&id);
    }

    /// Lay out every dirty entity in the deterministic snapshot order and
    /// return the ids actually laid out.
    pub fn layout_dirty_texts(&mut self, store: &mut TextStore, fonts: &FontManager) -> Vec<TextId> {
        let ids = store.consume_dirty_ids();
        let mut done = Vec::with_capacity(ids.len());
        for id in ids {
            if self.layout_text(store, fonts, id) {
                done.push(id);
            }
        }
        done
    }

    /// Lay out iff the store says dirty or the cache is missing/stale; on
    /// success the store-side dirty flag is cleared.
    pub fn ensure_layout(&mut self, store: &mut TextStore, fonts: &FontManager, id: TextId) -> bool {
        let stale = store.is_dirty(id) || self.layouts.get(&id).map_or(true, |l| l.dirty);
        if !stale {
            return true;
        }
        if !self.layout_text(store, fonts, id) {
            return false;
        }
        store.take_dirty(id);
        true
    }

    /// Full layout of one entity: shape, break, align, write bounds back.
    pub fn layout_text(&mut self, store: &mut TextStore, fonts: &FontManager, id: TextId) -> bool {
        let Some(entity) = store.entity(id).copied() else {
            return false;
        };
        let Some(content) = store.get_content(id).map(str::to_owned) else {
            return false;
        };
        let runs: Vec<StyleRun> = store.get_runs(id).map(<[StyleRun]>::to_vec).unwrap_or_default();

        let fallback_metrics = fonts.scaled_metrics(
            runs.first().map_or(0, |r| r.font_id),
            runs.first().map_or(DEFAULT_FONT_SIZE, |r| r.font_size),
        );

        if content.is_empty() {
            let line = LayoutLine {
                ascent: fallback_metrics.ascender,
                descent: fallback_metrics.descender,
                line_height: fallback_metrics.line_height(),
                ..LayoutLine::default()
            };
            let layout = Layout {
                glyphs: Vec::new(),
                total_width: 0.0,
                total_height: line.line_height,
                baseline_y: line.ascent,
                lines: vec![line],
                dirty: false,
            };
            self.write_back(store, &entity, &layout);
            self.layouts.insert(id, layout);
            return true;
        }

        // Per-run scaled metrics, resolved through the same variant the
        // shaper will use.
        let run_metrics: Vec<ScaledMetrics> = runs
            .iter()
            .map(|r| {
                let variant = fonts.get_variant(
                    r.font_id,
                    r.flags.contains(StyleFlags::BOLD),
                    r.flags.contains(StyleFlags::ITALIC),
                );
                fonts.scaled_metrics(variant, r.font_size)
            })
            .collect();

        // 1. Shape each run in logical order. A run that cannot shape is
        // skipped; the rest of the entity still lays out.
        let mut glyphs: Vec<ShapedGlyph> = Vec::new();
        for (run_index, run) in runs.iter().enumerate() {
            if run.len == 0 {
                continue;
            }
            let Some(text) = content.get(run.start..run.end().min(content.len())) else {
                log::warn!("text {id}: run {run_index} is not on char boundaries, skipping");
                continue;
            };
            let variant = fonts.get_variant(
                run.font_id,
                run.flags.contains(StyleFlags::BOLD),
                run.flags.contains(StyleFlags::ITALIC),
            );
            let Some(handle) = fonts.handle(variant) else {
                continue;
            };
            self.shape_run(handle, text, run, run_index as u32, &mut glyphs);
        }

        // 2. Break into lines.
        let wrap_width = match entity.box_mode {
            BoxMode::FixedWidth if entity.constraint_width > 0.0 => Some(entity.constraint_width),
            _ => None,
        };
        let mut lines = break_lines(&glyphs, &content, &run_metrics, &fallback_metrics, wrap_width);

        // 3. Aggregate.
        let total_height: f32 = lines.iter().map(|l| l.line_height).sum();
        let total_width = lines.iter().map(|l| l.width).fold(0.0, f32::max);

        // 4. Align within the container.
        let container = wrap_width.unwrap_or(total_width);
        for line in &mut lines {
            line.x_offset = match entity.align {
                TextAlign::Left => 0.0,
                TextAlign::Center => ((container - line.width) / 2.0).max(0.0),
                TextAlign::Right => (container - line.width).max(0.0),
            };
        }

        let layout = Layout {
            baseline_y: lines.first().map_or(0.0, |l| l.ascent),
            glyphs,
            lines,
            total_width,
            total_height,
            dirty: false,
        };
        self.write_back(store, &entity, &layout);
        self.layouts.insert(id, layout);
        true
    }

    // ---------------------------------------------------------------
    // Internal helpers
    // ---------------------------------------------------------------

    fn shape_run(
        &mut self,
        handle: &FontHandle,
        text: &str,
        run: &StyleRun,
        run_index: u32,
        out: &mut Vec<ShapedGlyph>,
    ) {
        let Some(face) = handle.shaper_face() else {
            return;
        };

        let mut buffer = self.shape_buffer.take().unwrap_or_else(UnicodeBuffer::new);
        buffer.push_str(text);
        // Direction/script/language come from the content itself so mixed
        // scripts and RTL keep working.
        buffer.guess_segment_properties();
        let rtl = buffer.direction() == Direction::RightToLeft;

        // One char, one glyph wherever the font allows it.
        let features = [
            Feature::new(Tag::from_bytes(b"liga"), 0, ..),
            Feature::new(Tag::from_bytes(b"clig"), 0, ..),
        ];
        let output = rustybuzz::shape(&face, &features, buffer);

        let scale = handle.scale(run.font_size);
        for (info, pos) in output.glyph_infos().iter().zip(output.glyph_positions()) {
            out.push(ShapedGlyph {
                glyph_id: info.glyph_id as u16,
                cluster: run.start + info.cluster as usize,
                x_advance: pos.x_advance as f32 * scale,
                y_advance: pos.y_advance as f32 * scale,
                x_offset: pos.x_offset as f32 * scale,
                y_offset: pos.y_offset as f32 * scale,
                rtl,
                run_index,
            });
        }
        // Recycle the allocation for the next run.
        self.shape_buffer = Some(output.clear());
    }

    fn write_back(&self, store: &mut TextStore, entity: &kerf_core::store::TextEntity, layout: &Layout) {
        let final_width = match entity.box_mode {
            BoxMode::FixedWidth if entity.constraint_width > 0.0 => entity.constraint_width,
            _ => layout.total_width,
        };
        store.set_layout_result(
            entity.id,
            final_width,
            layout.total_height,
            entity.x,
            entity.y - layout.total_height,
            entity.x + final_width,
            entity.y,
        );
    }

    #[cfg(test)]
    pub(crate) fn insert_layout(&mut self, id: TextId, layout: Layout) {
        self.layouts.insert(id, layout);
    }
}

/// Walk the shaped glyphs and cut them into lines.
///
/// Soft wrapping rewinds to the last space/tab/hyphen opportunity when one
/// exists inside the current line, otherwise it force-breaks before the
/// overflowing glyph. The breaking space stays on the line it ended.
fn break_lines(
    glyphs: &[ShapedGlyph],
    content: &str,
    run_metrics: &[ScaledMetrics],
    fallback: &ScaledMetrics,
    wrap_width: Option<f32>,
) -> Vec<LayoutLine> {
    let bytes = content.as_bytes();

    // Tallest participating run wins; rescanned at every close because the
    // running tallies go stale whenever a line is cut short.
    let line_metrics = |from: usize, to: usize, fallback_run: Option<u32>| -> (f32, f32, f32) {
        let mut ascent = f32::MIN;
        let mut descent = 0.0f32;
        let mut height = 0.0f32;
        let mut any = false;
        for g in &glyphs[from..to] {
            let m = run_metrics.get(g.run_index as usize).unwrap_or(fallback);
            ascent = ascent.max(m.ascender);
            descent = descent.min(m.descender);
            height = height.max(m.line_height());
            any = true;
        }
        if !any {
            let m = fallback_run
                .and_then(|ri| run_metrics.get(ri as usize))
                .unwrap_or(fallback);
            (m.ascender, m.descender, m.line_height())
        } else {
            (ascent, descent, height)
        }
    };

    let mut lines: Vec<LayoutLine> = Vec::new();
    let mut line_start_glyph = 0usize;
    let mut line_start_byte = 0usize;
    let mut current_width = 0.0f32;
    // (first glyph of the would-be next line, its start byte, width kept on
    // the closed line)
    let mut last_break: Option<(usize, usize, f32)> = None;

    for i in 0..glyphs.len() {
        let g = &glyphs[i];

        if bytes.get(g.cluster) == Some(&b'\n') {
            let (ascent, descent, line_height) =
                line_metrics(line_start_glyph, i, Some(g.run_index));
            lines.push(LayoutLine {
                start_glyph: line_start_glyph,
                glyph_count: i - line_start_glyph,
                start_byte: line_start_byte,
                byte_count: g.cluster.saturating_sub(line_start_byte),
                width: current_width,
                ascent,
                descent,
                line_height,
                x_offset: 0.0,
            });
            line_start_glyph = i + 1;
            line_start_byte = g.cluster + 1;
            current_width = 0.0;
            last_break = None;
            continue;
        }

        let glyph_width = g.x_advance;
        if let Some(wrap) = wrap_width {
            if current_width + glyph_width > wrap && i > line_start_glyph {
                match last_break.filter(|&(bg, _, _)| bg > line_start_glyph && bg <= i) {
                    Some((break_glyph, break_byte, width_at_break)) => {
                        let (ascent, descent, line_height) =
                            line_metrics(line_start_glyph, break_glyph, None);
                        lines.push(LayoutLine {
                            start_glyph: line_start_glyph,
                            glyph_count: break_glyph - line_start_glyph,
                            start_byte: line_start_byte,
                            byte_count: break_byte.saturating_sub(line_start_byte),
                            width: width_at_break,
                            ascent,
                            descent,
                            line_height,
                            x_offset: 0.0,
                        });
                        line_start_glyph = break_glyph;
                        line_start_byte = break_byte;
                        // Residual width wrapped onto the new line.
                        current_width -= width_at_break;
                    }
                    None => {
                        let (ascent, descent, line_height) =
                            line_metrics(line_start_glyph, i, None);
                        lines.push(LayoutLine {
                            start_glyph: line_start_glyph,
                            glyph_count: i - line_start_glyph,
                            start_byte: line_start_byte,
                            byte_count: g.cluster.saturating_sub(line_start_byte),
                            width: current_width,
                            ascent,
                            descent,
                            line_height,
                            x_offset: 0.0,
                        });
                        line_start_glyph = i;
                        line_start_byte = g.cluster;
                        current_width = 0.0;
                    }
                }
                last_break = None;
            }
        }

        current_width += glyph_width;
        if matches!(bytes.get(g.cluster), Some(b' ' | b'\t' | b'-')) {
            last_break = Some((i + 1, g.cluster + 1, current_width));
        }
    }

    if line_start_glyph < glyphs.len() || lines.is_empty() {
        let fallback_run = glyphs
            .get(line_start_glyph)
            .or_else(|| glyphs.last())
            .map(|g| g.run_index);
        let (ascent, descent, line_height) =
            line_metrics(line_start_glyph, glyphs.len(), fallback_run);
        lines.push(LayoutLine {
            start_glyph: line_start_glyph,
            glyph_count: glyphs.len() - line_start_glyph,
            start_byte: line_start_byte,
            byte_count: content.len().saturating_sub(line_start_byte),
            width: current_width,
            ascent,
            descent,
            line_height,
            x_offset: 0.0,
        });
    }

    // A trailing newline gets an empty line so the caret can sit after it.
    if bytes.last() == Some(&b'\n') {
        let fallback_run = glyphs.last().map(|g| g.run_index);
        let (ascent, descent, line_height) = line_metrics(0, 0, fallback_run);
        lines.push(LayoutLine {
            start_glyph: glyphs.len(),
            glyph_count: 0,
            start_byte: content.len(),
            byte_count: 0,
            width: 0.0,
            ascent,
            descent,
            line_height,
            x_offset: 0.0,
        });
    }

    lines
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use kerf_core::store::TextHeader;

    fn glyph(cluster: usize, advance: f32, run_index: u32) -> ShapedGlyph {
        ShapedGlyph {
            glyph_id: 1,
            cluster,
            x_advance: advance,
            y_advance: 0.0,
            x_offset: 0.0,
            y_offset: 0.0,
            rtl: false,
            run_index,
        }
    }

    fn metrics(ascent: f32, descent: f32, gap: f32) -> ScaledMetrics {
        ScaledMetrics {
            ascender: ascent,
            descender: descent,
            line_gap: gap,
            underline_position: -1.0,
            underline_thickness: 1.0,
        }
    }

    fn ascii_glyphs(text: &str, advance: f32) -> Vec<ShapedGlyph> {
        text.bytes()
            .enumerate()
            .map(|(i, _)| glyph(i, advance, 0))
            .collect()
    }

    #[test]
    fn test_empty_content_layout_without_fonts() {
        let fonts = FontManager::new();
        let mut store = TextStore::new();
        let mut engine = TextLayoutEngine::new();
        store.upsert_text(1, TextHeader { y: 100.0, ..TextHeader::default() }, Vec::new(), String::new());

        assert!(engine.layout_text(&mut store, &fonts, 1));
        let layout = engine.layout(1).unwrap();
        assert_eq!(layout.glyphs.len(), 0);
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.total_width, 0.0);
        // Synthesized default metrics: 16px → line height 17.6.
        assert!((layout.lines[0].line_height - 17.6).abs() < 1e-3);
        assert!(layout.baseline_y > 0.0);

        let bounds = store.entity(1).unwrap().bounds;
        assert_eq!(bounds.layout_width, 0.0);
        assert!((bounds.max_y - 100.0).abs() < 1e-5);
        assert!((bounds.min_y - (100.0 - layout.total_height)).abs() < 1e-3);
    }

    #[test]
    fn test_layout_missing_entity_fails() {
        let fonts = FontManager::new();
        let mut store = TextStore::new();
        let mut engine = TextLayoutEngine::new();
        assert!(!engine.layout_text(&mut store, &fonts, 9));
    }

    #[test]
    fn test_layout_dirty_texts_consumes_in_order() {
        let fonts = FontManager::new();
        let mut store = TextStore::new();
        let mut engine = TextLayoutEngine::new();
        for id in [5, 2, 9] {
            store.upsert_text(id, TextHeader::default(), Vec::new(), String::new());
        }
        let done = engine.layout_dirty_texts(&mut store, &fonts);
        assert_eq!(done, vec![2, 5, 9]);
        assert_eq!(store.dirty_count(), 0);
        // Nothing dirty: second pass is a no-op.
        assert!(engine.layout_dirty_texts(&mut store, &fonts).is_empty());
    }

    #[test]
    fn test_ensure_layout_clears_store_dirty() {
        let fonts = FontManager::new();
        let mut store = TextStore::new();
        let mut engine = TextLayoutEngine::new();
        store.upsert_text(3, TextHeader::default(), Vec::new(), String::new());
        assert!(store.is_dirty(3));

        assert!(engine.ensure_layout(&mut store, &fonts, 3));
        assert!(!store.is_dirty(3));
        assert!(engine.layout(3).is_some());

        // Invalidation re-runs the pass.
        engine.invalidate(3);
        assert!(engine.ensure_layout(&mut store, &fonts, 3));
        assert!(!engine.layout(3).unwrap().dirty);
    }

    #[test]
    fn test_break_lines_newline_excluded_from_byte_count() {
        let content = "ab\ncd";
        let glyphs = ascii_glyphs(content, 10.0);
        let rm = vec![metrics(8.0, -2.0, 0.0)];
        let lines = break_lines(&glyphs, content, &rm, &metrics(8.0, -2.0, 0.0), None);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].start_byte, 0);
        assert_eq!(lines[0].byte_count, 2);
        assert_eq!(lines[0].glyph_count, 2);
        assert_eq!(lines[0].width, 20.0);
        assert_eq!(lines[1].start_byte, 3);
        assert_eq!(lines[1].byte_count, 2);
        assert_eq!(lines[1].start_glyph, 3);
    }

    #[test]
    fn test_break_lines_trailing_newline_appends_empty_line() {
        let content = "a\n";
        let glyphs = ascii_glyphs(content, 10.0);
        let rm = vec![metrics(8.0, -2.0, 1.0)];
        let lines = break_lines(&glyphs, content, &rm, &metrics(8.0, -2.0, 1.0), None);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].byte_count, 1);
        assert_eq!(lines[0].width, 10.0);
        assert_eq!(lines[1].start_byte, 2);
        assert_eq!(lines[1].byte_count, 0);
        assert_eq!(lines[1].glyph_count, 0);
        assert_eq!(lines[1].line_height, 11.0);
    }

    #[test]
    fn test_break_lines_soft_wrap_at_space() {
        // "aa bb" with 10px glyphs and a 35px wrap: "aa " stays (30px
        // including the trailing space), "bb" wraps.
        let content = "aa bb";
        let glyphs = ascii_glyphs(content, 10.0);
        let rm = vec![metrics(8.0, -2.0, 0.0)];
        let lines = break_lines(&glyphs, content, &rm, &metrics(8.0, -2.0, 0.0), Some(35.0));

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].byte_count, 3, "breaking space stays on line 0");
        assert_eq!(lines[0].width, 30.0);
        assert_eq!(lines[1].start_byte, 3);
        assert_eq!(lines[1].byte_count, 2);
        assert_eq!(lines[1].width, 20.0);
        assert!(lines.iter().all(|l| l.width <= 35.0));
    }

    #[test]
    fn test_break_lines_force_break_without_opportunity() {
        let content = "aaaa";
        let glyphs = ascii_glyphs(content, 10.0);
        let rm = vec![metrics(8.0, -2.0, 0.0)];
        let lines = break_lines(&glyphs, content, &rm, &metrics(8.0, -2.0, 0.0), Some(25.0));

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].byte_count, 2);
        assert_eq!(lines[0].width, 20.0);
        assert_eq!(lines[1].byte_count, 2);
        assert_eq!(lines[1].width, 20.0);
    }

    #[test]
    fn test_break_lines_no_wrap_in_auto_width() {
        let content = "aa bb cc dd";
        let glyphs = ascii_glyphs(content, 10.0);
        let rm = vec![metrics(8.0, -2.0, 0.0)];
        let lines = break_lines(&glyphs, content, &rm, &metrics(8.0, -2.0, 0.0), None);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].width, 110.0);
    }

    #[test]
    fn test_break_lines_tallest_run_wins_and_rescans() {
        // Two runs: small on "aa bb", tall on "cc". Wrap after "aa ".
        let content = "aa bbcc";
        let mut glyphs = ascii_glyphs(content, 10.0);
        for g in glyphs.iter_mut().skip(5) {
            g.run_index = 1;
        }
        let rm = vec![metrics(8.0, -2.0, 0.0), metrics(20.0, -5.0, 0.0)];
        let lines = break_lines(&glyphs, content, &rm, &metrics(8.0, -2.0, 0.0), Some(45.0));

        assert_eq!(lines.len(), 2);
        // Line 0 holds only run-0 glyphs; its metrics must not leak the
        // tall run that ended up on line 1.
        assert_eq!(lines[0].byte_count, 3);
        assert!((lines[0].ascent - 8.0).abs() < 1e-5);
        assert!((lines[0].line_height - 10.0).abs() < 1e-5);
        assert!((lines[1].ascent - 20.0).abs() < 1e-5);
        assert!((lines[1].line_height - 25.0).abs() < 1e-5);
    }

    #[test]
    fn test_unshaped_content_still_gets_one_line() {
        // No fonts loaded: every run fails to shape, but the layout stays
        // well-formed with a single empty line.
        let fonts = FontManager::new();
        let mut store = TextStore::new();
        let mut engine = TextLayoutEngine::new();
        store.upsert_text(1, TextHeader::default(), Vec::new(), "hello".to_string());

        assert!(engine.layout_text(&mut store, &fonts, 1));
        let layout = engine.layout(1).unwrap();
        assert!(layout.glyphs.is_empty());
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.lines[0].byte_count, 5);
        assert!(layout.total_height > 0.0);
    }

    #[test]
    fn test_alignment_offsets_clamped() {
        let content = "aaaa\naa";
        let glyphs = ascii_glyphs(content, 10.0);
        let rm = vec![metrics(8.0, -2.0, 0.0)];
        let mut lines = break_lines(&glyphs, content, &rm, &metrics(8.0, -2.0, 0.0), None);
        // Mimic the center-align pass with the widest line as container.
        let container = 40.0;
        for line in &mut lines {
            line.x_offset = ((container - line.width) / 2.0).max(0.0);
        }
        assert_eq!(lines[0].x_offset, 0.0);
        assert_eq!(lines[1].x_offset, 10.0);
    }
}
