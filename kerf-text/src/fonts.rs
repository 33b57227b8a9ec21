//! Font manager — owned font bytes, family/variant resolution, metrics.
//!
//! Fonts are loaded from bytes supplied by the host; the manager owns the
//! bytes for the lifetime of the handle and parses faces on demand, so the
//! outline and shaping services never outlive the data they borrow. Id 0 is
//! reserved at every boundary to mean "the default font" (the first
//! successful load, reassigned on unload).
//!
//! Sizing is pure scaling: design-unit metrics × `font_size / units_per_em`
//! yields pixel units at 72 dpi, so 1 pt == 1 px and fractional sizes are
//! preserved exactly.

use rustc_hash::FxHashMap;
use ttf_parser::Face;

/// Design-unit metrics extracted once at load time.
///
/// OS/2 typographic metrics win when the table carries any non-zero value;
/// otherwise the hhea ascender/descender/line gap are used.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FontMetrics {
    pub units_per_em: f32,
    pub ascender: f32,
    /// Negative (below the baseline).
    pub descender: f32,
    pub line_gap: f32,
    /// Top of the underline relative to the baseline; usually negative.
    pub underline_position: f32,
    pub underline_thickness: f32,
}

/// Metrics scaled to a concrete pixel size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaledMetrics {
    pub ascender: f32,
    pub descender: f32,
    pub line_gap: f32,
    pub underline_position: f32,
    pub underline_thickness: f32,
}

impl ScaledMetrics {
    pub fn line_height(&self) -> f32 {
        self.ascender - self.descender + self.line_gap
    }
}

/// One loaded font face: owned bytes plus everything resolved at load.
pub struct FontHandle {
    pub id: u32,
    pub family: String,
    pub bold: bool,
    pub italic: bool,
    pub metrics: FontMetrics,
    data: Vec<u8>,
}

impl FontHandle {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Outline-service view of the font. Parsing validates table offsets
    /// only, so doing it per use is cheap.
    pub fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, 0).ok()
    }

    /// Shaping-service twin of the face.
    pub fn shaper_face(&self) -> Option<rustybuzz::Face<'_>> {
        rustybuzz::Face::from_slice(&self.data, 0)
    }

    /// Design-to-pixel scale factor for a font size.
    pub fn scale(&self, font_size: f32) -> f32 {
        font_size / self.metrics.units_per_em
    }
}

/// Registry of loaded fonts with a family → ids multimap.
pub struct FontManager {
    fonts: FxHashMap<u32, FontHandle>,
    families: FxHashMap<String, Vec<u32>>,
    default_font: u32,
    next_id: u32,
}

impl Default for FontManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FontManager {
    pub fn new() -> Self {
        Self {
            fonts: FxHashMap::default(),
            families: FxHashMap::default(),
            default_font: 0,
            next_id: 1,
        }
    }

    /// Load a font from bytes. Returns the fresh id, or 0 when the face
    /// cannot be parsed.
    pub fn load(&mut self, bytes: Vec<u8>, family: &str, bold: bool, italic: bool) -> u32 {
        let id = self.next_id;
        if !self.install(id, bytes, family, bold, italic) {
            return 0;
        }
        self.next_id += 1;
        while self.fonts.contains_key(&self.next_id) {
            self.next_id += 1;
        }
        id
    }

    /// Same as [`load`](Self::load) with a caller-chosen id. Rejects id 0
    /// and collisions.
    pub fn register_existing(
        &mut self,
        id: u32,
        bytes: Vec<u8>,
        family: &str,
        bold: bool,
        italic: bool,
    ) -> bool {
        if id == 0 || self.fonts.contains_key(&id) {
            return false;
        }
        if !self.install(id, bytes, family, bold, italic) {
            return false;
        }
        while self.fonts.contains_key(&self.next_id) {
            self.next_id += 1;
        }
        true
    }

    /// Destroy a handle, dropping its bytes. Reassigns the default font to
    /// the smallest remaining id when the default was unloaded.
    pub fn unload(&mut self, id: u32) -> bool {
        let Some(handle) = self.fonts.remove(&id) else {
            return false;
        };
        let key = handle.family.to_lowercase();
        if let Some(ids) = self.families.get_mut(&key) {
            ids.retain(|&f| f != id);
            if ids.is_empty() {
                self.families.remove(&key);
            }
        }
        if self.default_font == id {
            self.default_font = self.fonts.keys().copied().min().unwrap_or(0);
        }
        true
    }

    /// Resolve a handle; id 0 maps to the default font.
    pub fn handle(&self, id: u32) -> Option<&FontHandle> {
        let id = if id == 0 { self.default_font } else { id };
        self.fonts.get(&id)
    }

    pub fn default_font_id(&self) -> u32 {
        self.default_font
    }

    pub fn font_count(&self) -> usize {
        self.fonts.len()
    }

    /// Find the family member matching `(bold, italic)` exactly; fall back
    /// to the (resolved) base id. Bold-Italic needs a registered face of
    /// its own — there is no coercion here; synthetic styling is the
    /// atlas's job.
    pub fn get_variant(&self, base: u32, bold: bool, italic: bool) -> u32 {
        let resolved = if base == 0 { self.default_font } else { base };
        let Some(handle) = self.fonts.get(&resolved) else {
            return resolved;
        };
        if handle.bold == bold && handle.italic == italic {
            return resolved;
        }
        if let Some(ids) = self.families.get(&handle.family.to_lowercase()) {
            for &fid in ids {
                if let Some(h) = self.fonts.get(&fid) {
                    if h.bold == bold && h.italic == italic {
                        return fid;
                    }
                }
            }
        }
        resolved
    }

    /// Metrics scaled to `font_size`. Unknown ids get a synthesized
    /// sans-serif-ish profile so layout stays well-formed without fonts.
    pub fn scaled_metrics(&self, id: u32, font_size: f32) -> ScaledMetrics {
        match self.handle(id) {
            Some(h) => {
                let s = h.scale(font_size);
                ScaledMetrics {
                    ascender: h.metrics.ascender * s,
                    descender: h.metrics.descender * s,
                    line_gap: h.metrics.line_gap * s,
                    underline_position: h.metrics.underline_position * s,
                    underline_thickness: h.metrics.underline_thickness * s,
                }
            }
            None => ScaledMetrics {
                ascender: 0.8 * font_size,
                descender: -0.2 * font_size,
                line_gap: 0.1 * font_size,
                underline_position: -0.1 * font_size,
                underline_thickness: 0.05 * font_size,
            },
        }
    }

    fn install(&mut self, id: u32, bytes: Vec<u8>, family: &str, bold: bool, italic: bool) -> bool {
        let metrics = match Face::parse(&bytes, 0) {
            Ok(face) => extract_metrics(&face),
            Err(err) => {
                log::warn!("failed to parse font '{family}': {err}");
                return false;
            }
        };
        self.fonts.insert(
            id,
            FontHandle {
                id,
                family: family.to_string(),
                bold,
                italic,
                metrics,
                data: bytes,
            },
        );
        self.families
            .entry(family.to_lowercase())
            .or_default()
            .push(id);
        if self.default_font == 0 {
            self.default_font = id;
        }
        log::info!("registered font '{family}' (bold={bold}, italic={italic}) as id {id}");
        true
    }
}

fn extract_metrics(face: &Face) -> FontMetrics {
    let upem = face.units_per_em() as f32;
    let os2 = face.tables().os2.as_ref();
    let (ascender, descender, line_gap) = match os2 {
        Some(t)
            if t.typographic_ascender() != 0 || t.typographic_descender() != 0 =>
        {
            (
                t.typographic_ascender() as f32,
                t.typographic_descender() as f32,
                t.typographic_line_gap() as f32,
            )
        }
        _ => (
            face.ascender() as f32,
            face.descender() as f32,
            face.line_gap() as f32,
        ),
    };
    let underline = face.underline_metrics();
    FontMetrics {
        units_per_em: upem,
        ascender,
        descender,
        line_gap,
        underline_position: underline.map(|m| m.position as f32).unwrap_or(-0.1 * upem),
        underline_thickness: underline.map(|m| m.thickness as f32).unwrap_or(0.05 * upem),
    }
}

// ===================================================================
// Tests
// ===================================================================
