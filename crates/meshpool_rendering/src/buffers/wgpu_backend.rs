//! WGPU-backed geometry buffers.
//!
//! Both buffers are created once with `COPY_DST` and filled through
//! `Queue::write_buffer`, which stages the data and schedules the copy on the
//! next submit. Every block the pool hands out is a multiple of four bytes, so
//! offsets and sizes always satisfy `COPY_BUFFER_ALIGNMENT`.

use super::GeometryBuffers;
use crate::error::{PoolError, PoolResult};
use crate::pool::UploadEntry;
use std::sync::{Arc, OnceLock};

/// GPU-resident vertex and index buffers.
///
/// Cheap to clone: clones share the device, the queue and the buffers. Keep
/// one clone in the renderer to bind the buffers while the pool's worker
/// owns the other.
#[derive(Clone, Debug)]
pub struct WgpuGeometryBuffers {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    buffers: Arc<BufferSlots>,
}

#[derive(Debug, Default)]
struct BufferSlots {
    vertex: OnceLock<wgpu::Buffer>,
    index: OnceLock<wgpu::Buffer>,
}

impl WgpuGeometryBuffers {
    /// Creates a backend on `device`; no buffers exist until the pool asks.
    #[must_use]
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            device,
            queue,
            buffers: Arc::new(BufferSlots::default()),
        }
    }

    /// The vertex buffer, once the pool has created it.
    #[must_use]
    pub fn vertex_buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffers.vertex.get()
    }

    /// The index buffer, once the pool has created it.
    #[must_use]
    pub fn index_buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffers.index.get()
    }

    fn create(
        &self,
        slot: &OnceLock<wgpu::Buffer>,
        capacity_bytes: u64,
        usage: wgpu::BufferUsages,
        label: &'static str,
    ) -> PoolResult<()> {
        if slot.get().is_some() {
            return Err(PoolError::Buffer(format!("{label} already created")));
        }

        let max = self.device.limits().max_buffer_size;
        if capacity_bytes > max {
            return Err(PoolError::Buffer(format!(
                "{label} of {capacity_bytes} bytes exceeds the device limit of {max}"
            )));
        }

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity_bytes,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        slot.set(buffer)
            .map_err(|_| PoolError::Buffer(format!("{label} already created")))?;
        tracing::info!(label, capacity_bytes, "gpu buffer created");
        Ok(())
    }

    fn write_all<'a>(
        &self,
        slot: &OnceLock<wgpu::Buffer>,
        writes: impl Iterator<Item = (u64, &'a [u8])>,
        label: &'static str,
    ) {
        let Some(buffer) = slot.get() else {
            tracing::error!(label, "batch uploaded before the buffer was created");
            return;
        };
        for (offset, bytes) in writes.filter(|(_, bytes)| !bytes.is_empty()) {
            self.queue.write_buffer(buffer, offset, bytes);
        }
    }
}

impl GeometryBuffers for WgpuGeometryBuffers {
    fn create_empty_vertex_buffer(&mut self, capacity_bytes: u64) -> PoolResult<()> {
        self.create(
            &self.buffers.vertex,
            capacity_bytes,
            wgpu::BufferUsages::VERTEX,
            "meshpool vertex buffer",
        )
    }

    fn create_empty_index_buffer(&mut self, capacity_bytes: u64) -> PoolResult<()> {
        self.create(
            &self.buffers.index,
            capacity_bytes,
            wgpu::BufferUsages::INDEX,
            "meshpool index buffer",
        )
    }

    fn upload_batch_into_vertex_buffer(&mut self, batch: &[UploadEntry]) {
        self.write_all(
            &self.buffers.vertex,
            batch.iter().map(|e| (e.vertex_block.start, e.vertex_bytes())),
            "meshpool vertex buffer",
        );
    }

    fn upload_batch_into_index_buffer(&mut self, batch: &[UploadEntry]) {
        self.write_all(
            &self.buffers.index,
            batch.iter().map(|e| (e.index_block.start, e.index_bytes())),
            "meshpool index buffer",
        );
    }
}
