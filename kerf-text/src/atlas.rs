//! Glyph atlas — MSDF glyph cache over a shelf-packed RGBA texture.
//!
//! Entries are keyed by `(resolved font id, glyph id, effective style)`
//! where the effective style keeps only the Bold/Italic bits that the
//! resolved variant does NOT provide natively, so real and synthetic
//! variants never collide in the cache.
//!
//! The packer is append-only; when it fills up the whole atlas resets once
//! and the failing glyph retries. A second failure means the glyph alone
//! cannot fit and the caller gets `None`. Renderers watch `version()` and
//! `is_dirty()` to decide when to re-upload the texture.

use rustc_hash::FxHashMap;
use thiserror::Error;
use ttf_parser::GlyphId;

use kerf_core::runs::StyleFlags;
use kerf_core::utf8::Codepoints;

use crate::fonts::FontManager;
use crate::msdf;
use crate::packer::{PackedRect, ShelfPacker};

/// Atlas construction parameters.
#[derive(Clone, Copy, Debug)]
pub struct AtlasConfig {
    pub width: u32,
    pub height: u32,
    /// Gap between packed glyphs. Must be at least `px_range`, otherwise
    /// neighboring distance fields bleed into each other when sampled.
    pub padding: u32,
    /// Distance between the −1 and +1 endpoints of the stored field, in
    /// bitmap pixels.
    pub px_range: u32,
    /// Nominal pixel size glyphs are rendered at (one EM ≈ this many
    /// bitmap pixels).
    pub msdf_size: u32,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            padding: 4,
            px_range: 4,
            msdf_size: 48,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AtlasError {
    #[error("atlas padding {padding} must be >= the MSDF pixel range {px_range}")]
    PaddingTooSmall { padding: u32, px_range: u32 },
}

/// Cache key. `style` holds only Bold/Italic bits still unprovided by the
/// resolved font.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlyphKey {
    pub font_id: u32,
    pub glyph_id: u16,
    pub style: StyleFlags,
}

/// One cached glyph. Quad metrics are EM-normalized: multiply by the
/// target font size to get pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AtlasEntry {
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
    pub atlas_x: u32,
    pub atlas_y: u32,
    pub atlas_w: u32,
    pub atlas_h: u32,
    pub width: f32,
    pub height: f32,
    pub bearing_x: f32,
    pub bearing_y: f32,
    pub advance: f32,
    /// Pixel size the distance field was generated at.
    pub font_size: f32,
}

impl AtlasEntry {
    /// Whether the entry carries texels (metrics-only entries do not).
    pub fn has_bitmap(&self) -> bool {
        self.atlas_w > 0 && self.atlas_h > 0
    }
}

/// The glyph atlas: pixel buffer + cache + dirty/version tracking.
pub struct GlyphAtlas {
    config: AtlasConfig,
    packer: ShelfPacker,
    data: Vec<u8>,
    cache: FxHashMap<GlyphKey, AtlasEntry>,
    white: PackedRect,
    version: u64,
    dirty: bool,
}

impl GlyphAtlas {
    pub fn new(config: AtlasConfig) -> Result<Self, AtlasError> {
        if config.padding < config.px_range {
            return Err(AtlasError::PaddingTooSmall {
                padding: config.padding,
                px_range: config.px_range,
            });
        }
        let mut atlas = Self {
            config,
            packer: ShelfPacker::new(config.width, config.height, config.padding),
            data: vec![0; config.width as usize * config.height as usize * 4],
            cache: FxHashMap::default(),
            white: PackedRect::default(),
            version: 1,
            dirty: true,
        };
        atlas.reserve_white_cell();
        Ok(atlas)
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    /// Raw RGBA texture, row-major, top-down, `width × height × 4` bytes.
    pub fn texture_data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn glyph_count(&self) -> usize {
        self.cache.len()
    }

    pub fn occupancy(&self) -> f32 {
        self.packer.occupancy()
    }

    /// Center of the solid white cell; caret, underline, and strikethrough
    /// quads sample here.
    pub fn white_uv(&self) -> [f32; 2] {
        [
            (self.white.x as f32 + self.white.width as f32 / 2.0) / self.config.width as f32,
            (self.white.y as f32 + self.white.height as f32 / 2.0) / self.config.height as f32,
        ]
    }

    /// Look up or generate a glyph.
    ///
    /// `style` is masked to Bold|Italic. The font resolves through
    /// `FontManager::get_variant` first; whatever the variant provides
    /// natively is dropped from the style, and anything left is rendered
    /// synthetically.
    pub fn get_glyph(
        &mut self,
        fonts: &FontManager,
        font_id: u32,
        glyph_id: u16,
        style: StyleFlags,
    ) -> Option<AtlasEntry> {
        let style = style.atlas_subset();
        let resolved = fonts.get_variant(
            font_id,
            style.contains(StyleFlags::BOLD),
            style.contains(StyleFlags::ITALIC),
        );
        let handle = fonts.handle(resolved)?;
        let mut effective = style;
        if handle.bold {
            effective.remove(StyleFlags::BOLD);
        }
        if handle.italic {
            effective.remove(StyleFlags::ITALIC);
        }

        let key = GlyphKey {
            font_id: handle.id,
            glyph_id,
            style: effective,
        };
        if let Some(entry) = self.cache.get(&key) {
            return Some(*entry);
        }

        let face = handle.face()?;
        let upem = handle.metrics.units_per_em;
        let synth_bold = effective.contains(StyleFlags::BOLD);
        let synth_italic = effective.contains(StyleFlags::ITALIC);
        let msdf_size = self.config.msdf_size as f32;

        let Some(bitmap) = msdf::render_glyph(
            &face,
            GlyphId(glyph_id),
            self.config.msdf_size,
            self.config.px_range,
            synth_bold,
            synth_italic,
        ) else {
            // No outline (space, control): metrics-only entry.
            let entry = AtlasEntry {
                advance: msdf::glyph_advance(&face, GlyphId(glyph_id), synth_bold) / upem,
                font_size: msdf_size,
                ..AtlasEntry::default()
            };
            self.cache.insert(key, entry);
            self.version += 1;
            return Some(entry);
        };

        let rect = match self.packer.pack(bitmap.width, bitmap.height) {
            Some(rect) => rect,
            None => {
                log::warn!(
                    "glyph atlas full ({} glyphs, {:.0}% occupied), resetting",
                    self.cache.len(),
                    self.packer.occupancy() * 100.0
                );
                self.clear();
                match self.packer.pack(bitmap.width, bitmap.height) {
                    Some(rect) => rect,
                    None => {
                        log::error!(
                            "glyph {}x{} larger than the {}x{} atlas",
                            bitmap.width,
                            bitmap.height,
                            self.config.width,
                            self.config.height
                        );
                        return None;
                    }
                }
            }
        };

        self.blit(&rect, &bitmap);

        let margin = self.config.px_range as f32;
        let entry = AtlasEntry {
            uv_min: [
                rect.x as f32 / self.config.width as f32,
                rect.y as f32 / self.config.height as f32,
            ],
            uv_max: [
                (rect.x + rect.width) as f32 / self.config.width as f32,
                (rect.y + rect.height) as f32 / self.config.height as f32,
            ],
            atlas_x: rect.x,
            atlas_y: rect.y,
            atlas_w: rect.width,
            atlas_h: rect.height,
            width: bitmap.width as f32 / msdf_size,
            height: bitmap.height as f32 / msdf_size,
            bearing_x: bitmap.left / upem - margin / msdf_size,
            bearing_y: bitmap.top / upem + margin / msdf_size,
            advance: bitmap.advance / upem,
            font_size: msdf_size,
        };
        self.cache.insert(key, entry);
        self.version += 1;
        self.dirty = true;
        Some(entry)
    }

    /// Ensure the printable ASCII range is cached for a font.
    pub fn preload_ascii(&mut self, fonts: &FontManager, font_id: u32) -> usize {
        let ascii: Vec<u8> = (0x20u8..0x7F).collect();
        self.preload_string(fonts, font_id, &ascii)
    }

    /// Ensure every decodable codepoint of `bytes` is cached. Malformed
    /// bytes are skipped silently.
    pub fn preload_string(&mut self, fonts: &FontManager, font_id: u32, bytes: &[u8]) -> usize {
        let Some(handle) = fonts.handle(font_id) else {
            return 0;
        };
        let Some(face) = handle.face() else {
            return 0;
        };
        let mut cached = 0;
        for ch in Codepoints::new(bytes) {
            if let Some(gid) = face.glyph_index(ch) {
                if self
                    .get_glyph(fonts, font_id, gid.0, StyleFlags::empty())
                    .is_some()
                {
                    cached += 1;
                }
            }
        }
        cached
    }

    /// Drop every glyph and start a fresh packer generation. The white
    /// cell is re-reserved immediately.
    pub fn clear(&mut self) {
        self.packer.reset();
        self.data.fill(0);
        self.cache.clear();
        self.version += 1;
        self.dirty = true;
        self.reserve_white_cell();
    }

    // ---------------------------------------------------------------
    // Internal helpers
    // ---------------------------------------------------------------

    fn reserve_white_cell(&mut self) {
        match self.packer.pack(2, 2) {
            Some(rect) => {
                for dy in 0..rect.height {
                    for dx in 0..rect.width {
                        let idx = (((rect.y + dy) * self.config.width + rect.x + dx) * 4) as usize;
                        self.data[idx..idx + 4].copy_from_slice(&[255, 255, 255, 255]);
                    }
                }
                self.white = rect;
            }
            None => {
                log::error!("atlas too small for the 2x2 white cell");
                self.white = PackedRect::default();
            }
        }
    }

    fn blit(&mut self, rect: &PackedRect, bitmap: &msdf::GlyphBitmap) {
        let src = bitmap.rgb.as_raw();
        let stride = self.config.width as usize * 4;
        for row in 0..bitmap.height as usize {
            let src_off = row * bitmap.width as usize * 3;
            let dst_off = (rect.y as usize + row) * stride + rect.x as usize * 4;
            let dst = &mut self.data[dst_off..dst_off + bitmap.width as usize * 4];
            for x in 0..bitmap.width as usize {
                dst[4 * x] = src[src_off + 3 * x];
                dst[4 * x + 1] = src[src_off + 3 * x + 1];
                dst[4 * x + 2] = src[src_off + 3 * x + 2];
                dst[4 * x + 3] = 255;
            }
        }
    }
}

// ===================================================================
// Tests
// ===================================================================
