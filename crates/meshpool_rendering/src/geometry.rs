//! Geometry handles written by the pool.
//!
//! A handle only stores where its data lives in the shared buffers. Offsets
//! are in elements (`f32` for vertices, `u32` for indices), not bytes.

use std::mem::size_of;

/// Bytes per vertex buffer element (one `f32`).
pub const VERTEX_ELEMENT_SIZE: u64 = size_of::<f32>() as u64;

/// Bytes per index buffer element (one `u32`).
pub const INDEX_ELEMENT_SIZE: u64 = size_of::<u32>() as u64;

/// Floats per vertex in the engine's interleaved layout:
/// position (3), normal (3), uv (2), tangent (3), bitangent (3).
pub const FLOATS_PER_VERTEX: usize = 14;

/// Full-screen quad as a 4-vertex triangle strip in the interleaved layout.
#[rustfmt::skip]
pub const SCREEN_QUAD_VERTICES: [f32; 4 * FLOATS_PER_VERTEX] = [
    -1.0, -1.0, 0.0,   0.0, 0.0, 0.0,   0.0, 1.0,   0.0, 0.0, 0.0,   0.0, 0.0, 0.0,
    -1.0,  1.0, 0.0,   0.0, 0.0, 0.0,   0.0, 0.0,   0.0, 0.0, 0.0,   0.0, 0.0, 0.0,
     1.0, -1.0, 0.0,   0.0, 0.0, 0.0,   1.0, 1.0,   0.0, 0.0, 0.0,   0.0, 0.0, 0.0,
     1.0,  1.0, 0.0,   0.0, 0.0, 0.0,   1.0, 0.0,   0.0, 0.0, 0.0,   0.0, 0.0, 0.0,
];

/// Where a geometry's data lives in the shared buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DrawRange {
    /// First vertex buffer element.
    pub vertex_offset: u32,
    /// First index buffer element.
    pub index_offset: u32,
    /// Number of indices to draw.
    pub index_count: u32,
}

impl DrawRange {
    /// Byte offset of the first vertex element.
    #[inline]
    #[must_use]
    pub const fn vertex_byte_offset(&self) -> u64 {
        self.vertex_offset as u64 * VERTEX_ELEMENT_SIZE
    }

    /// Byte offset of the first index element.
    #[inline]
    #[must_use]
    pub const fn index_byte_offset(&self) -> u64 {
        self.index_offset as u64 * INDEX_ELEMENT_SIZE
    }
}

/// A renderable whose buffer offsets are owned by the pool.
///
/// The pool is the only writer of these fields. Renderers read them to build
/// draw calls.
pub trait GeometryHandle {
    /// First vertex buffer element.
    fn vertex_offset(&self) -> u32;
    /// Sets the first vertex buffer element.
    fn set_vertex_offset(&mut self, offset: u32);
    /// First index buffer element.
    fn index_offset(&self) -> u32;
    /// Sets the first index buffer element.
    fn set_index_offset(&mut self, offset: u32);
    /// Number of indices to draw.
    fn index_count(&self) -> u32;
    /// Sets the number of indices to draw.
    fn set_index_count(&mut self, count: u32);

    /// Reads all three fields.
    fn draw_range(&self) -> DrawRange {
        DrawRange {
            vertex_offset: self.vertex_offset(),
            index_offset: self.index_offset(),
            index_count: self.index_count(),
        }
    }

    /// Writes all three fields.
    fn set_draw_range(&mut self, range: DrawRange) {
        self.set_vertex_offset(range.vertex_offset);
        self.set_index_offset(range.index_offset);
        self.set_index_count(range.index_count);
    }
}

/// Plain geometry handle holding only its draw range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Geometry {
    range: DrawRange,
}

impl Geometry {
    /// Creates a handle that has not been queued yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            range: DrawRange {
                vertex_offset: 0,
                index_offset: 0,
                index_count: 0,
            },
        }
    }

    /// The current draw range.
    #[inline]
    #[must_use]
    pub const fn range(&self) -> DrawRange {
        self.range
    }
}

impl GeometryHandle for Geometry {
    fn vertex_offset(&self) -> u32 {
        self.range.vertex_offset
    }

    fn set_vertex_offset(&mut self, offset: u32) {
        self.range.vertex_offset = offset;
    }

    fn index_offset(&self) -> u32 {
        self.range.index_offset
    }

    fn set_index_offset(&mut self, offset: u32) {
        self.range.index_offset = offset;
    }

    fn index_count(&self) -> u32 {
        self.range.index_count
    }

    fn set_index_count(&mut self, count: u32) {
        self.range.index_count = count;
    }

    fn draw_range(&self) -> DrawRange {
        self.range
    }

    fn set_draw_range(&mut self, range: DrawRange) {
        self.range = range;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_offsets() {
        let range = DrawRange {
            vertex_offset: 56,
            index_offset: 6,
            index_count: 6,
        };
        assert_eq!(range.vertex_byte_offset(), 224);
        assert_eq!(range.index_byte_offset(), 24);
    }

    #[test]
    fn test_handle_round_trips_range() {
        let mut geometry = Geometry::new();
        let range = DrawRange {
            vertex_offset: 10,
            index_offset: 20,
            index_count: 30,
        };
        geometry.set_draw_range(range);
        assert_eq!(geometry.draw_range(), range);
        assert_eq!(geometry.index_count(), 30);
    }

    #[test]
    fn test_screen_quad_layout() {
        assert_eq!(SCREEN_QUAD_VERTICES.len(), 56);
        // uv of the second vertex
        assert_eq!(&SCREEN_QUAD_VERTICES[FLOATS_PER_VERTEX + 6..FLOATS_PER_VERTEX + 8], &[0.0, 0.0]);
    }
}
