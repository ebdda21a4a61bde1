//! GPU buffer backends.
//!
//! The pool never touches a graphics API directly. It creates both buffers
//! once through [`GeometryBuffers`] and then hands whole upload batches to it
//! from the worker thread.
//!
//! ## Backends
//!
//! - [`WgpuGeometryBuffers`]: real GPU buffers written with `Queue::write_buffer`
//! - [`RecordingBuffers`]: CPU mirror for headless runs and tests

mod recording;
mod wgpu_backend;

pub use recording::RecordingBuffers;
pub use wgpu_backend::WgpuGeometryBuffers;

use crate::error::PoolResult;
use crate::pool::UploadEntry;

/// The buffer-write primitive the pool depends on.
///
/// The backend is created on the producer thread, then moved into the worker,
/// which is its only caller afterwards.
pub trait GeometryBuffers: Send + 'static {
    /// Creates the vertex buffer with `capacity_bytes` of uninitialized space.
    ///
    /// # Errors
    ///
    /// Backend-specific; typically [`PoolError::Buffer`](crate::PoolError::Buffer).
    fn create_empty_vertex_buffer(&mut self, capacity_bytes: u64) -> PoolResult<()>;

    /// Creates the index buffer with `capacity_bytes` of uninitialized space.
    ///
    /// # Errors
    ///
    /// Backend-specific; typically [`PoolError::Buffer`](crate::PoolError::Buffer).
    fn create_empty_index_buffer(&mut self, capacity_bytes: u64) -> PoolResult<()>;

    /// Writes every entry's vertex payload at its vertex block.
    fn upload_batch_into_vertex_buffer(&mut self, batch: &[UploadEntry]);

    /// Writes every entry's index payload at its index block.
    fn upload_batch_into_index_buffer(&mut self, batch: &[UploadEntry]);
}
