//! Pending work shared between the producer and the worker.

use crate::geometry::{DrawRange, INDEX_ELEMENT_SIZE, VERTEX_ELEMENT_SIZE};
use meshpool_core::MemBlock;
use std::fmt;
use std::sync::Arc;

/// One geometry's pending write into both buffers.
///
/// Payloads are shared, not copied: the producer keeps its `Arc` and the
/// worker drops its clone once the batch is flushed.
#[derive(Clone)]
pub struct UploadEntry {
    /// Destination span in the vertex buffer.
    pub vertex_block: MemBlock,
    /// Vertex payload, `vertex_block.size` bytes.
    pub vertices: Arc<[f32]>,
    /// Destination span in the index buffer; empty for vertex-only writes.
    pub index_block: MemBlock,
    /// Index payload, `index_block.size` bytes.
    pub indices: Arc<[u32]>,
}

impl UploadEntry {
    /// Entry writing both payloads.
    #[must_use]
    pub fn new(
        vertex_block: MemBlock,
        vertices: Arc<[f32]>,
        index_block: MemBlock,
        indices: Arc<[u32]>,
    ) -> Self {
        Self {
            vertex_block,
            vertices,
            index_block,
            indices,
        }
    }

    /// Entry writing only vertex data (e.g. the reserved screen quad).
    #[must_use]
    pub fn vertex_only(vertex_block: MemBlock, vertices: Arc<[f32]>) -> Self {
        Self {
            vertex_block,
            vertices,
            index_block: MemBlock::default(),
            indices: Arc::from(Vec::new()),
        }
    }

    /// Vertex payload as bytes.
    #[must_use]
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices[..])
    }

    /// Index payload as bytes.
    #[must_use]
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices[..])
    }
}

impl fmt::Debug for UploadEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadEntry")
            .field("vertex_block", &self.vertex_block)
            .field("vertex_len", &self.vertices.len())
            .field("index_block", &self.index_block)
            .field("index_len", &self.indices.len())
            .finish()
    }
}

/// Byte offsets to reclaim at the next removal pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemovalEntry {
    /// Start of the vertex block.
    pub vertex_start: u64,
    /// Start of the index block.
    pub index_start: u64,
}

impl RemovalEntry {
    /// Captures the byte offsets a handle currently points at.
    #[must_use]
    pub const fn from_range(range: &DrawRange) -> Self {
        Self {
            vertex_start: range.vertex_offset as u64 * VERTEX_ELEMENT_SIZE,
            index_start: range.index_offset as u64 * INDEX_ELEMENT_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removal_entry_in_bytes() {
        let entry = RemovalEntry::from_range(&DrawRange {
            vertex_offset: 100,
            index_offset: 7,
            index_count: 3,
        });
        assert_eq!(entry.vertex_start, 400);
        assert_eq!(entry.index_start, 28);
    }

    #[test]
    fn test_payload_bytes() {
        let entry = UploadEntry::new(
            MemBlock::new(0, 8),
            Arc::from(vec![1.0f32, 2.0]),
            MemBlock::new(0, 12),
            Arc::from(vec![0u32, 1, 2]),
        );
        assert_eq!(entry.vertex_bytes().len(), 8);
        assert_eq!(entry.index_bytes(), bytemuck::cast_slice::<u32, u8>(&[0, 1, 2]));
        assert!(UploadEntry::vertex_only(MemBlock::new(0, 8), Arc::from(vec![0.0f32; 2]))
            .index_bytes()
            .is_empty());
    }
}
