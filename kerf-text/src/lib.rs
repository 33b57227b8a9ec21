//! # kerf-text
//!
//! Font resources and the MSDF glyph atlas for the Kerf text subsystem.
//!
//! ## Architecture
//!
//! ```text
//! FontManager (owned font bytes + metrics)
//!     │ faces on demand
//!     ▼
//! GlyphAtlas ──▸ msdf::render_glyph ──▸ ShelfPacker ──▸ RGBA texture
//!     │
//!     └── AtlasEntry { UVs + EM-normalized metrics } for renderers
//! ```
//!
//! - **`fonts`** — loading, family/variant resolution, scaled metrics.
//! - **`packer`** — best-fit-height shelf packing over a fixed canvas.
//! - **`msdf`** — outline → multi-channel distance field bitmaps.
//! - **`atlas`** — glyph cache with reset-on-full and version tracking.

pub mod atlas;
pub mod fonts;
pub mod msdf;
pub mod packer;

#[cfg(test)]
pub(crate) mod testutil;

// Re-exports for ergonomic use.
pub use atlas::{AtlasConfig, AtlasEntry, AtlasError, GlyphAtlas, GlyphKey};
pub use fonts::{FontHandle, FontManager, FontMetrics, ScaledMetrics};
pub use packer::{PackedRect, ShelfPacker};
