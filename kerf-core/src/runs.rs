//! Style runs — contiguous byte ranges of content sharing one style.
//!
//! Runs are kept sorted by start offset, non-overlapping, and contiguous
//! over `[0, content_len)` whenever content is non-empty. A zero-length run
//! is legal only as the "typing attribute" stub that absorbs the next
//! insertion at its position.

use bitflags::bitflags;

bitflags! {
    /// Text decoration and face-selection flags for a run.
    ///
    /// Only `BOLD` and `ITALIC` participate in face selection and glyph
    /// caching; `UNDERLINE` and `STRIKETHROUGH` are purely decorative.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct StyleFlags: u8 {
        const BOLD = 1 << 0;
        const ITALIC = 1 << 1;
        const UNDERLINE = 1 << 2;
        const STRIKETHROUGH = 1 << 3;
    }
}

impl StyleFlags {
    /// The subset that can change a rasterized glyph shape.
    pub fn atlas_subset(self) -> StyleFlags {
        self & (StyleFlags::BOLD | StyleFlags::ITALIC)
    }
}

/// One styled span of entity content. Offsets are UTF-8 byte offsets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StyleRun {
    pub start: usize,
    pub len: usize,
    pub font_id: u32,
    pub font_size: f32,
    /// Packed 0xRRGGBBAA.
    pub color: u32,
    pub flags: StyleFlags,
}

impl StyleRun {
    pub fn new(start: usize, len: usize, font_id: u32, font_size: f32) -> Self {
        Self {
            start,
            len,
            font_id,
            font_size,
            color: 0xFFFF_FFFF,
            flags: StyleFlags::empty(),
        }
    }

    /// One past the last byte covered by this run.
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn contains(&self, byte: usize) -> bool {
        byte >= self.start && byte < self.end()
    }
}

/// Adjust runs for an insertion of `k` bytes at byte position `p`.
///
/// A zero-length run at `p` is the typing-attribute stub: the first one
/// expands to cover the insertion and any surplus stubs at `p` are dropped.
/// Without a stub, a run starting exactly at `p` owns the new bytes (the
/// right-hand neighbor wins at a seam); a run ending at `p` extends only
/// when nothing starts there.
pub fn adjust_runs_for_insert(runs: &mut Vec<StyleRun>, p: usize, k: usize) {
    if k == 0 {
        return;
    }
    let had_stub_at_p = runs.iter().any(|r| r.len == 0 && r.start == p);
    let any_starts_at_p = runs.iter().any(|r| r.start == p);

    let mut expanded_idx = None;
    let mut i = 0;
    while i < runs.len() {
        if runs[i].len == 0 && runs[i].start == p {
            if expanded_idx.is_none() {
                runs[i].len = k;
                expanded_idx = Some(i);
                i += 1;
            } else {
                runs.remove(i);
            }
        } else {
            i += 1;
        }
    }

    for (i, r) in runs.iter_mut().enumerate() {
        if Some(i) == expanded_idx {
            continue;
        }
        if r.start == p {
            if had_stub_at_p {
                r.start += k;
            } else {
                r.len += k;
            }
        } else if r.start > p {
            r.start += k;
        } else if r.end() > p {
            r.len += k;
        } else if r.end() == p && !any_starts_at_p {
            r.len += k;
        }
    }
    runs.sort_by_key(|r| r.start);
}

/// Adjust runs for a deletion of the byte range `[s, e)`.
pub fn adjust_runs_for_delete(runs: &mut Vec<StyleRun>, s: usize, e: usize) {
    if e <= s {
        return;
    }
    let d = e - s;
    runs.retain_mut(|r| {
        let (a, b) = (r.start, r.end());
        if b <= s {
            true
        } else if a >= e {
            r.start -= d;
            true
        } else if a >= s && b <= e {
            false
        } else if a < s && b > e {
            r.len -= d;
            true
        } else if a < s {
            // Right part of the run was deleted.
            r.len = s - a;
            true
        } else {
            // Left part of the run was deleted.
            r.start = s;
            r.len = b - e;
            true
        }
    });
    runs.sort_by_key(|r| r.start);
}

/// Check the covering invariant: sorted, non-overlapping, contiguous over
/// `[0, content_len)`, lengths summing to `content_len`.
pub fn runs_cover_content(runs: &[StyleRun], content_len: usize) -> bool {
    if content_len == 0 {
        return runs.iter().all(|r| r.start == 0 && r.len == 0);
    }
    let mut cursor = 0;
    for r in runs {
        if r.len == 0 {
            // Typing stubs may sit at any seam.
            if r.start > content_len {
                return false;
            }
            continue;
        }
        if r.start != cursor {
            return false;
        }
        cursor = r.end();
    }
    cursor == content_len
}

// ===================================================================
// Tests
// ===================================================================
