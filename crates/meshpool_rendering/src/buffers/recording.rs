//! CPU-side mirror of the geometry buffers.

use super::GeometryBuffers;
use crate::error::{PoolError, PoolResult};
use crate::pool::UploadEntry;
use parking_lot::Mutex;
use std::sync::Arc;

/// Byte-for-byte CPU copy of both buffers.
///
/// Clones share the same storage, so a test can keep one clone and hand the
/// other to the pool.
///
/// ## Usage
///
/// ```rust
/// use meshpool_rendering::{Geometry, GeometryPool, PoolConfig, RecordingBuffers};
/// use std::sync::Arc;
///
/// let buffers = RecordingBuffers::new();
/// let config = PoolConfig { instance_estimate: 1, slack_bytes: 4096, ..PoolConfig::default() };
/// let pool = GeometryPool::new(buffers.clone(), config)?;
///
/// let mut geometry = Geometry::new();
/// let range = pool.queue_geometry(&mut geometry, Arc::from(vec![1.0f32; 14]), Arc::from(vec![0u32]))?;
/// pool.mark_upload_pending();
/// pool.wait_for_upload_completion()?;
///
/// assert_eq!(buffers.read_vertices(range.vertex_offset, 14), vec![1.0; 14]);
/// # Ok::<(), meshpool_rendering::PoolError>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct RecordingBuffers {
    inner: Arc<Mutex<Recorded>>,
}

#[derive(Debug, Default)]
struct Recorded {
    vertex: Option<Vec<u8>>,
    index: Option<Vec<u8>>,
    vertex_batches: usize,
    index_batches: usize,
    vertex_writes: usize,
    index_writes: usize,
}

impl RecordingBuffers {
    /// Creates a backend with no buffers yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Vertex buffer size in bytes, zero before creation.
    #[must_use]
    pub fn vertex_capacity(&self) -> usize {
        self.inner.lock().vertex.as_ref().map_or(0, Vec::len)
    }

    /// Index buffer size in bytes, zero before creation.
    #[must_use]
    pub fn index_capacity(&self) -> usize {
        self.inner.lock().index.as_ref().map_or(0, Vec::len)
    }

    /// Number of vertex batches received.
    #[must_use]
    pub fn vertex_batches(&self) -> usize {
        self.inner.lock().vertex_batches
    }

    /// Number of index batches received.
    #[must_use]
    pub fn index_batches(&self) -> usize {
        self.inner.lock().index_batches
    }

    /// Number of non-empty vertex payloads written.
    #[must_use]
    pub fn vertex_writes(&self) -> usize {
        self.inner.lock().vertex_writes
    }

    /// Number of non-empty index payloads written.
    #[must_use]
    pub fn index_writes(&self) -> usize {
        self.inner.lock().index_writes
    }

    /// Reads `count` floats starting at element `offset`.
    ///
    /// Out-of-range elements read as zero.
    #[must_use]
    pub fn read_vertices(&self, offset: u32, count: usize) -> Vec<f32> {
        let inner = self.inner.lock();
        read_elements(inner.vertex.as_deref(), offset, count, f32::from_ne_bytes)
    }

    /// Reads `count` indices starting at element `offset`.
    ///
    /// Out-of-range elements read as zero.
    #[must_use]
    pub fn read_indices(&self, offset: u32, count: usize) -> Vec<u32> {
        let inner = self.inner.lock();
        read_elements(inner.index.as_deref(), offset, count, u32::from_ne_bytes)
    }
}

fn read_elements<T: Default>(
    storage: Option<&[u8]>,
    offset: u32,
    count: usize,
    decode: fn([u8; 4]) -> T,
) -> Vec<T> {
    let start = offset as usize * 4;
    (0..count)
        .map(|i| {
            let at = start + i * 4;
            storage
                .and_then(|bytes| bytes.get(at..at + 4))
                .and_then(|chunk| <[u8; 4]>::try_from(chunk).ok())
                .map_or_else(T::default, decode)
        })
        .collect()
}

fn write_payload(storage: &mut [u8], start: u64, payload: &[u8], label: &str) -> bool {
    if payload.is_empty() {
        return false;
    }
    let Ok(start) = usize::try_from(start) else {
        tracing::error!(start, label, "write offset does not fit the mirror");
        return false;
    };
    match storage.get_mut(start..start + payload.len()) {
        Some(dst) => {
            dst.copy_from_slice(payload);
            true
        }
        None => {
            tracing::error!(start, len = payload.len(), label, "write past the end of the buffer");
            false
        }
    }
}

fn allocate_mirror(slot: &mut Option<Vec<u8>>, capacity_bytes: u64, label: &str) -> PoolResult<()> {
    if slot.is_some() {
        return Err(PoolError::Buffer(format!("{label} buffer already created")));
    }
    let len = usize::try_from(capacity_bytes)
        .map_err(|_| PoolError::Buffer(format!("{label} buffer of {capacity_bytes} bytes")))?;
    *slot = Some(vec![0; len]);
    Ok(())
}

impl GeometryBuffers for RecordingBuffers {
    fn create_empty_vertex_buffer(&mut self, capacity_bytes: u64) -> PoolResult<()> {
        allocate_mirror(&mut self.inner.lock().vertex, capacity_bytes, "vertex")
    }

    fn create_empty_index_buffer(&mut self, capacity_bytes: u64) -> PoolResult<()> {
        allocate_mirror(&mut self.inner.lock().index, capacity_bytes, "index")
    }

    fn upload_batch_into_vertex_buffer(&mut self, batch: &[UploadEntry]) {
        let mut inner = self.inner.lock();
        let Recorded {
            vertex,
            vertex_batches,
            vertex_writes,
            ..
        } = &mut *inner;

        *vertex_batches += 1;
        let Some(storage) = vertex.as_mut() else {
            tracing::error!("vertex batch uploaded before the buffer was created");
            return;
        };
        for entry in batch {
            if write_payload(storage, entry.vertex_block.start, entry.vertex_bytes(), "vertex") {
                *vertex_writes += 1;
            }
        }
    }

    fn upload_batch_into_index_buffer(&mut self, batch: &[UploadEntry]) {
        let mut inner = self.inner.lock();
        let Recorded {
            index,
            index_batches,
            index_writes,
            ..
        } = &mut *inner;

        *index_batches += 1;
        let Some(storage) = index.as_mut() else {
            tracing::error!("index batch uploaded before the buffer was created");
            return;
        };
        for entry in batch {
            if write_payload(storage, entry.index_block.start, entry.index_bytes(), "index") {
                *index_writes += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshpool_core::MemBlock;

    #[test]
    fn test_batch_lands_at_block_offsets() {
        let mut buffers = RecordingBuffers::new();
        buffers.create_empty_vertex_buffer(64).unwrap();
        buffers.create_empty_index_buffer(64).unwrap();

        let entry = UploadEntry::new(
            MemBlock::new(16, 8),
            Arc::from(vec![3.5f32, -1.0]),
            MemBlock::new(4, 12),
            Arc::from(vec![7u32, 8, 9]),
        );
        buffers.upload_batch_into_vertex_buffer(std::slice::from_ref(&entry));
        buffers.upload_batch_into_index_buffer(std::slice::from_ref(&entry));

        assert_eq!(buffers.read_vertices(4, 2), vec![3.5, -1.0]);
        assert_eq!(buffers.read_indices(1, 3), vec![7, 8, 9]);
        assert_eq!(buffers.vertex_writes(), 1);
        assert_eq!(buffers.index_batches(), 1);
    }

    #[test]
    fn test_out_of_range_write_is_skipped() {
        let mut buffers = RecordingBuffers::new();
        buffers.create_empty_vertex_buffer(8).unwrap();

        let entry = UploadEntry::vertex_only(MemBlock::new(4, 8), Arc::from(vec![1.0f32, 2.0]));
        buffers.upload_batch_into_vertex_buffer(&[entry]);

        assert_eq!(buffers.vertex_writes(), 0);
        assert_eq!(buffers.read_vertices(0, 2), vec![0.0, 0.0]);
    }

    #[test]
    fn test_double_create_rejected() {
        let mut buffers = RecordingBuffers::new();
        buffers.create_empty_index_buffer(8).unwrap();
        assert!(matches!(
            buffers.create_empty_index_buffer(8),
            Err(PoolError::Buffer(_))
        ));
    }
}
