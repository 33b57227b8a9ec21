//! GPU vertex data for text quads.
//!
//! All types derive `bytemuck::Pod` + `Zeroable` for zero-copy upload to
//! GPU buffers.

use bytemuck::{Pod, Zeroable};

/// Floats per vertex in the interleaved stream: x, y, z, u, v, r, g, b, a.
pub const FLOATS_PER_VERTEX: usize = 9;

/// Two triangles per glyph quad.
pub const VERTICES_PER_QUAD: usize = 6;

/// One vertex of a glyph (or decoration) quad.
///
/// 36 bytes — a 1,000-glyph entity streams 216 KB of vertex data.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GlyphVertex {
    /// World-space position; z is 0 (hosts re-layer as needed).
    pub position: [f32; 3],
    /// Atlas UV.
    pub uv: [f32; 2],
    /// RGBA color, each channel in [0.0, 1.0].
    pub color: [f32; 4],
}

impl GlyphVertex {
    pub fn new(position: [f32; 3], uv: [f32; 2], color: [f32; 4]) -> Self {
        Self { position, uv, color }
    }
}

/// View the vertex stream as the raw float array hosts upload.
pub fn as_floats(vertices: &[GlyphVertex]) -> &[f32] {
    bytemuck::cast_slice(vertices)
}

/// Unpack 0xRRGGBBAA into normalized RGBA.
pub fn unpack_rgba(color: u32) -> [f32; 4] {
    [
        ((color >> 24) & 0xFF) as f32 / 255.0,
        ((color >> 16) & 0xFF) as f32 / 255.0,
        ((color >> 8) & 0xFF) as f32 / 255.0,
        (color & 0xFF) as f32 / 255.0,
    ]
}

// ===================================================================
// Tests
// ===================================================================
