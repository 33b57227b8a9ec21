//! # kerf-render
//!
//! CPU-side quad stream for the Kerf text subsystem: turns a cached layout
//! plus the glyph atlas into an interleaved vertex buffer (9 floats × 6
//! vertices per glyph) the host uploads as-is. GPU state, shaders, and
//! uploads stay outside — this crate ends at the byte buffer.

pub mod quads;
pub mod vertex;

pub use quads::build_text_quads;
pub use vertex::{GlyphVertex, FLOATS_PER_VERTEX, VERTICES_PER_QUAD};
