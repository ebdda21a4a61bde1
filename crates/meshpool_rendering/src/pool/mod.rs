//! # Geometry Pool
//!
//! Two shared GPU buffers (vertices, indices) sub-allocated between many
//! independently created and destroyed geometries.
//!
//! ## Architecture
//!
//! ```text
//!   Producer (frame thread)                      Worker (one thread)
//!   ───────────────────────                      ───────────────────
//!   queue_geometry ──┬─> [pool lock]   arenas ──────> removal pass: free + defrag
//!                    └─> [upload lock] batch  ──────> flush into both buffers
//!   remove ─────────────> [pool lock]  removals ─┘
//!   mark_upload_pending ──> uploading ─┐
//!   request_removal_pass ─> removing ──┴── Signals + Doorbell
//! ```
//!
//! - Allocation mutates the arenas on the producer thread.
//! - Reclamation mutates them only on the worker, in batched passes.
//! - A removed handle is redirected to the placeholder at once, so it never
//!   points at memory that is queued for reclamation.
//!
//! ## Frame Usage
//!
//! ```rust,ignore
//! pool.queue_geometry(&mut building, vertices, indices)?;
//! pool.remove(&mut demolished)?;
//!
//! pool.mark_upload_pending();       // end of frame
//! pool.request_removal_pass()?;     // whenever convenient
//!
//! pool.wait_for_upload_completion()?; // before drawing new geometry
//! ```

mod queue;
mod stats;
mod worker;

pub use queue::{RemovalEntry, UploadEntry};
pub use stats::PoolStats;
pub use worker::WorkerState;

use crate::buffers::GeometryBuffers;
use crate::config::PoolConfig;
use crate::error::{ArenaKind, PoolError, PoolResult};
use crate::geometry::{
    DrawRange, GeometryHandle, INDEX_ELEMENT_SIZE, SCREEN_QUAD_VERTICES, VERTEX_ELEMENT_SIZE,
};
use meshpool_core::{Arena, Doorbell, MemBlock, Signal};
use parking_lot::Mutex;
use stats::{PoolCounters, PressureMonitor};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Both arenas plus the removals waiting to be applied to them.
///
/// Guarded by the pool lock.
#[derive(Debug)]
pub(crate) struct ArenaState {
    pub(crate) vertex: Arena,
    pub(crate) index: Arena,
    pub(crate) removals: VecDeque<RemovalEntry>,
}

impl ArenaState {
    /// Allocates in both arenas or in neither.
    fn allocate_pair(&mut self, vertex_bytes: u64, index_bytes: u64) -> PoolResult<(MemBlock, MemBlock)> {
        let vertex_start = self
            .vertex
            .allocate(vertex_bytes)
            .map_err(|e| PoolError::arena(ArenaKind::Vertex, e))?;

        match self.index.allocate(index_bytes) {
            Ok(index_start) => Ok((
                MemBlock::new(vertex_start, vertex_bytes),
                MemBlock::new(index_start, index_bytes),
            )),
            Err(source) => {
                self.vertex
                    .rollback(vertex_start)
                    .map_err(|e| PoolError::arena(ArenaKind::Vertex, e))?;
                Err(PoolError::arena(ArenaKind::Index, source))
            }
        }
    }

    /// Undoes a successful [`ArenaState::allocate_pair`].
    fn rollback_pair(&mut self, vertex_block: MemBlock, index_block: MemBlock) -> PoolResult<()> {
        self.index
            .rollback(index_block.start)
            .map_err(|e| PoolError::arena(ArenaKind::Index, e))?;
        self.vertex
            .rollback(vertex_block.start)
            .map_err(|e| PoolError::arena(ArenaKind::Vertex, e))?;
        Ok(())
    }
}

/// State shared between the pool handle and its worker.
pub(crate) struct PoolShared {
    pub(crate) config: PoolConfig,
    /// Pool lock.
    pub(crate) arenas: Mutex<ArenaState>,
    /// Upload lock.
    pub(crate) uploads: Mutex<Vec<UploadEntry>>,
    pub(crate) uploading: Signal,
    pub(crate) removing: Signal,
    pub(crate) running: AtomicBool,
    pub(crate) doorbell: Doorbell,
    state: AtomicU8,
    fault: Mutex<Option<String>>,
    pub(crate) live_instances: AtomicU64,
    pub(crate) counters: PoolCounters,
    pub(crate) pressure: PressureMonitor,
}

impl PoolShared {
    pub(crate) fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Records an invariant violation and releases every waiter.
    ///
    /// Both flags are lowered while the fault lock is held, so no
    /// [`PoolShared::raise_unless_faulted`] can slip a raise in after them.
    pub(crate) fn poison(&self, violation: String) {
        tracing::error!(%violation, "geometry pool invariant violated; pool is now unusable");
        let mut fault = self.fault.lock();
        *fault = Some(violation);
        self.uploading.clear();
        self.removing.clear();
    }

    fn ensure_usable(&self) -> PoolResult<()> {
        match self.fault.lock().as_ref() {
            Some(violation) => Err(PoolError::Faulted(violation.clone())),
            None => Ok(()),
        }
    }

    /// Raises `signal` unless the pool has faulted.
    ///
    /// Check and raise happen under the fault lock. A flag raised on a
    /// faulted pool would never be lowered again.
    fn raise_unless_faulted(&self, signal: &Signal) -> PoolResult<()> {
        let fault = self.fault.lock();
        if let Some(violation) = fault.as_ref() {
            return Err(PoolError::Faulted(violation.clone()));
        }
        signal.raise();
        Ok(())
    }
}

/// Shared vertex/index buffers with deferred, batched reclamation.
///
/// Owns both arenas, both queues and the upload worker. Dropping the pool
/// stops the worker after its current unit of work and joins it.
///
/// ## Usage
///
/// ```rust
/// use meshpool_rendering::{Geometry, GeometryHandle, GeometryPool, PoolConfig, RecordingBuffers};
/// use std::sync::Arc;
///
/// let config = PoolConfig { instance_estimate: 4, slack_bytes: 4096, ..PoolConfig::default() };
/// let pool = GeometryPool::new(RecordingBuffers::new(), config)?;
///
/// let mut placeholder = Geometry::new();
/// pool.queue_geometry(&mut placeholder, Arc::from(vec![0.0f32; 14]), Arc::from(vec![0u32; 3]))?;
/// pool.set_placeholder(&placeholder)?;
///
/// let mut building = Geometry::new();
/// pool.queue_geometry(&mut building, Arc::from(vec![1.0f32; 28]), Arc::from(vec![0u32, 1, 0]))?;
/// pool.mark_upload_pending();
/// pool.wait_for_upload_completion()?;
///
/// pool.remove(&mut building)?;
/// assert_eq!(building.draw_range(), placeholder.draw_range());
/// # Ok::<(), meshpool_rendering::PoolError>(())
/// ```
pub struct GeometryPool {
    shared: Arc<PoolShared>,
    worker: Option<JoinHandle<()>>,
    placeholder: OnceLock<DrawRange>,
    screen_quad: Option<u32>,
}

impl GeometryPool {
    /// Creates both buffers, reserves the screen quad and starts the worker.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Config`] if `config` is invalid
    /// - Whatever the backend returns from buffer creation
    /// - [`PoolError::WorkerSpawn`] if the thread cannot be started
    pub fn new<B: GeometryBuffers>(mut buffers: B, config: PoolConfig) -> PoolResult<Self> {
        config.validate()?;

        let vertex_capacity = config.vertex_capacity();
        let index_capacity = config.index_capacity();
        buffers.create_empty_vertex_buffer(vertex_capacity)?;
        buffers.create_empty_index_buffer(index_capacity)?;

        let (vertex, screen_quad) = if config.reserve_screen_quad {
            let quad: Arc<[f32]> = Arc::from(SCREEN_QUAD_VERTICES.as_slice());
            let block = MemBlock::new(0, quad.len() as u64 * VERTEX_ELEMENT_SIZE);
            let vertex = Arena::with_reserved(vertex_capacity, block.size)
                .map_err(|e| PoolError::arena(ArenaKind::Vertex, e))?;
            buffers.upload_batch_into_vertex_buffer(&[UploadEntry::vertex_only(block, quad)]);
            (vertex, Some(0))
        } else {
            (Arena::new(vertex_capacity), None)
        };

        let idle_sleep = config.idle_sleep();
        let shared = Arc::new(PoolShared {
            config,
            arenas: Mutex::new(ArenaState {
                vertex,
                index: Arena::new(index_capacity),
                removals: VecDeque::new(),
            }),
            uploads: Mutex::new(Vec::new()),
            uploading: Signal::new(),
            removing: Signal::new(),
            running: AtomicBool::new(true),
            doorbell: Doorbell::new(),
            state: AtomicU8::new(WorkerState::Idle as u8),
            fault: Mutex::new(None),
            live_instances: AtomicU64::new(0),
            counters: PoolCounters::default(),
            pressure: PressureMonitor::default(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("meshpool-upload".to_string())
            .spawn(move || worker::run(worker_shared, buffers, idle_sleep))
            .map_err(|e| PoolError::WorkerSpawn(e.to_string()))?;

        tracing::info!(vertex_capacity, index_capacity, "geometry pool created");

        Ok(Self {
            shared,
            worker: Some(worker),
            placeholder: OnceLock::new(),
            screen_quad,
        })
    }

    /// The configuration the pool was built with.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Vertex element offset of the reserved full-screen quad, if reserved.
    #[must_use]
    pub const fn screen_quad_vertex_offset(&self) -> Option<u32> {
        self.screen_quad
    }

    /// Registers the geometry removed handles are redirected to.
    ///
    /// The placeholder must already be queued through this pool (its vertex
    /// offset may also be the reserved screen quad) and must stay allocated
    /// for the life of the pool; it is never removed through this pool.
    ///
    /// # Errors
    ///
    /// - [`PoolError::PlaceholderNotAllocated`] if either offset is not the
    ///   start of an allocated block
    /// - [`PoolError::PlaceholderAlreadySet`] on a second call
    pub fn set_placeholder(&self, placeholder: &impl GeometryHandle) -> PoolResult<()> {
        let range = placeholder.draw_range();
        {
            let arenas = self.shared.arenas.lock();
            if !arenas.vertex.is_allocated(range.vertex_byte_offset())
                || !arenas.index.is_allocated(range.index_byte_offset())
            {
                return Err(PoolError::PlaceholderNotAllocated {
                    vertex_offset: range.vertex_offset,
                    index_offset: range.index_offset,
                });
            }
        }

        self.placeholder
            .set(range)
            .map_err(|_| PoolError::PlaceholderAlreadySet)
    }

    /// The registered placeholder's draw range.
    #[must_use]
    pub fn placeholder(&self) -> Option<DrawRange> {
        self.placeholder.get().copied()
    }

    /// Allocates space for a geometry and queues its data for upload.
    ///
    /// Blocks while a removal pass is in flight. On success the handle's
    /// offsets (in elements) and index count are written and returned. The
    /// data only becomes GPU-visible after the next flush; see
    /// [`GeometryPool::wait_for_upload_completion`].
    ///
    /// # Errors
    ///
    /// - [`PoolError::EmptyGeometry`] if either payload is empty
    /// - [`PoolError::Arena`] with [`OutOfSpace`](meshpool_core::ArenaError::OutOfSpace)
    ///   if either buffer is full; neither arena is changed
    /// - [`PoolError::SyncTimeout`] if the removal pass outlasts the configured bound
    /// - [`PoolError::Faulted`] if the worker stopped on an invariant violation
    pub fn queue_geometry(
        &self,
        handle: &mut impl GeometryHandle,
        vertices: Arc<[f32]>,
        indices: Arc<[u32]>,
    ) -> PoolResult<DrawRange> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(PoolError::EmptyGeometry);
        }
        self.shared.ensure_usable()?;

        if self.shared.removing.is_raised() {
            tracing::debug!("removal pass in flight, producer waiting before allocating");
            self.wait_cleared(&self.shared.removing, "removal pass")?;
            self.shared.ensure_usable()?;
        }

        let vertex_bytes = vertices.len() as u64 * VERTEX_ELEMENT_SIZE;
        let index_bytes = indices.len() as u64 * INDEX_ELEMENT_SIZE;

        let (range, vertex_usage, index_usage) = {
            let mut arenas = self.shared.arenas.lock();
            let (vertex_block, index_block) = arenas.allocate_pair(vertex_bytes, index_bytes)?;

            let range = match draw_range_for(vertex_block, index_block, indices.len()) {
                Ok(range) => range,
                Err(e) => {
                    arenas.rollback_pair(vertex_block, index_block)?;
                    return Err(e);
                }
            };

            self.shared
                .uploads
                .lock()
                .push(UploadEntry::new(vertex_block, vertices, index_block, indices));

            (range, arenas.vertex.usage(), arenas.index.usage())
        };

        handle.set_draw_range(range);
        let live = self.shared.live_instances.fetch_add(1, Ordering::Relaxed) + 1;
        self.shared
            .pressure
            .check(&self.shared.config, &vertex_usage, &index_usage, live);

        Ok(range)
    }

    /// Raises the upload flag if anything is queued. Call once per frame.
    ///
    /// Returns true if a flush was requested; always false once the pool
    /// has faulted.
    pub fn mark_upload_pending(&self) -> bool {
        {
            let uploads = self.shared.uploads.lock();
            if uploads.is_empty()
                || self
                    .shared
                    .raise_unless_faulted(&self.shared.uploading)
                    .is_err()
            {
                return false;
            }
        }
        self.shared.doorbell.ring();
        true
    }

    /// Blocks until the requested upload batch has been flushed.
    ///
    /// # Errors
    ///
    /// - [`PoolError::SyncTimeout`] if the flush outlasts the configured bound
    /// - [`PoolError::Faulted`] if the worker stopped on an invariant violation
    pub fn wait_for_upload_completion(&self) -> PoolResult<()> {
        if self.shared.uploading.is_raised() {
            tracing::debug!("upload batch in flight, producer waiting");
            self.wait_cleared(&self.shared.uploading, "upload completion")?;
        }
        match self.shared.fault.lock().as_ref() {
            Some(violation) => Err(PoolError::Faulted(violation.clone())),
            None => Ok(()),
        }
    }

    /// Logically deletes a geometry.
    ///
    /// Queues its blocks for the next removal pass, then redirects the handle
    /// to the placeholder. The blocks are only reused after the pass.
    ///
    /// # Errors
    ///
    /// - [`PoolError::PlaceholderMissing`] if no placeholder is registered
    /// - [`PoolError::AlreadyRemoved`] if the handle already points at the placeholder
    /// - [`PoolError::Faulted`] if the worker stopped on an invariant violation
    pub fn remove(&self, handle: &mut impl GeometryHandle) -> PoolResult<()> {
        self.shared.ensure_usable()?;
        let placeholder = self.placeholder().ok_or(PoolError::PlaceholderMissing)?;

        let current = handle.draw_range();
        if current.vertex_offset == placeholder.vertex_offset
            && current.index_offset == placeholder.index_offset
        {
            return Err(PoolError::AlreadyRemoved);
        }

        self.shared
            .arenas
            .lock()
            .removals
            .push_back(RemovalEntry::from_range(&current));
        handle.set_draw_range(placeholder);

        // Saturating: a stale handle is reported by the worker, not here.
        let _ = self
            .shared
            .live_instances
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1)));

        Ok(())
    }

    /// Asks the worker to reclaim queued removals and defragment both arenas.
    ///
    /// # Errors
    ///
    /// [`PoolError::Faulted`] if the worker stopped on an invariant violation.
    pub fn request_removal_pass(&self) -> PoolResult<()> {
        self.shared.raise_unless_faulted(&self.shared.removing)?;
        self.shared.doorbell.ring();
        Ok(())
    }

    /// Blocks until the requested removal pass has finished.
    ///
    /// # Errors
    ///
    /// Same as [`GeometryPool::wait_for_upload_completion`].
    pub fn wait_for_removal_pass(&self) -> PoolResult<()> {
        self.wait_cleared(&self.shared.removing, "removal pass")?;
        match self.shared.fault.lock().as_ref() {
            Some(violation) => Err(PoolError::Faulted(violation.clone())),
            None => Ok(()),
        }
    }

    /// True while an upload batch is requested or being flushed.
    #[must_use]
    pub fn is_upload_pending(&self) -> bool {
        self.shared.uploading.is_raised()
    }

    /// True while a removal pass is requested or running.
    #[must_use]
    pub fn is_removal_pending(&self) -> bool {
        self.shared.removing.is_raised()
    }

    /// What the worker is doing right now.
    #[must_use]
    pub fn worker_state(&self) -> WorkerState {
        WorkerState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// The invariant violation that stopped the worker, if any.
    #[must_use]
    pub fn fault(&self) -> Option<String> {
        self.shared.fault.lock().clone()
    }

    /// Statistics and arena usage for capacity tuning.
    #[must_use]
    pub fn capacity_report(&self) -> PoolStats {
        let (vertex, index, pending_removals) = {
            let arenas = self.shared.arenas.lock();
            (arenas.vertex.usage(), arenas.index.usage(), arenas.removals.len())
        };
        let counters = &self.shared.counters;

        PoolStats {
            live_instances: self.shared.live_instances.load(Ordering::Relaxed),
            entries_flushed: counters.entries_flushed.load(Ordering::Relaxed),
            batches_flushed: counters.batches_flushed.load(Ordering::Relaxed),
            removal_passes: counters.removal_passes.load(Ordering::Relaxed),
            blocks_reclaimed: counters.blocks_reclaimed.load(Ordering::Relaxed),
            pending_uploads: self.shared.uploads.lock().len(),
            pending_removals,
            vertex,
            index,
        }
    }

    /// Runs `f` on both arenas under the pool lock.
    ///
    /// For diagnostics and invariant checks; the arenas cannot be mutated.
    pub fn inspect_arenas<R>(&self, f: impl FnOnce(&Arena, &Arena) -> R) -> R {
        let arenas = self.shared.arenas.lock();
        f(&arenas.vertex, &arenas.index)
    }

    fn wait_cleared(&self, signal: &Signal, what: &'static str) -> PoolResult<()> {
        match self.shared.config.sync_timeout() {
            None => {
                signal.wait_cleared();
                Ok(())
            }
            Some(timeout) => {
                let start = Instant::now();
                if signal.wait_cleared_timeout(timeout) {
                    Ok(())
                } else {
                    Err(PoolError::SyncTimeout {
                        what,
                        waited_ms: duration_ms(start.elapsed()),
                    })
                }
            }
        }
    }
}

impl Drop for GeometryPool {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.doorbell.ring();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("geometry upload worker panicked");
            }
        }
    }
}

fn draw_range_for(vertex_block: MemBlock, index_block: MemBlock, index_count: usize) -> PoolResult<DrawRange> {
    Ok(DrawRange {
        vertex_offset: element_offset(vertex_block.start, VERTEX_ELEMENT_SIZE)?,
        index_offset: element_offset(index_block.start, INDEX_ELEMENT_SIZE)?,
        index_count: u32::try_from(index_count).map_err(|_| PoolError::OffsetOverflow {
            offset: index_block.end(),
        })?,
    })
}

fn element_offset(byte_offset: u64, element_size: u64) -> PoolResult<u32> {
    u32::try_from(byte_offset / element_size).map_err(|_| PoolError::OffsetOverflow {
        offset: byte_offset,
    })
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshpool_core::ArenaError;

    fn state(capacity: u64) -> ArenaState {
        ArenaState {
            vertex: Arena::new(capacity),
            index: Arena::new(capacity),
            removals: VecDeque::new(),
        }
    }

    #[test]
    fn test_rollback_pair_restores_both_arenas() {
        let mut arenas = state(1024);
        arenas.allocate_pair(64, 12).unwrap();
        let before = (arenas.vertex.free_blocks().to_vec(), arenas.index.free_blocks().to_vec());

        let (vertex_block, index_block) = arenas.allocate_pair(128, 24).unwrap();
        arenas.rollback_pair(vertex_block, index_block).unwrap();

        assert_eq!(arenas.vertex.free_blocks(), before.0.as_slice());
        assert_eq!(arenas.index.free_blocks(), before.1.as_slice());
    }

    #[test]
    fn test_rollback_pair_reports_unknown_block() {
        let mut arenas = state(1024);
        let (vertex_block, _) = arenas.allocate_pair(64, 12).unwrap();
        let stale = MemBlock::new(512, 12);

        assert_eq!(
            arenas.rollback_pair(vertex_block, stale),
            Err(PoolError::Arena {
                arena: ArenaKind::Index,
                source: ArenaError::NotAllocated { offset: 512 },
            })
        );
    }

    #[test]
    fn test_index_allocation_failure_releases_vertex_block() {
        let mut arenas = state(64);
        let before = arenas.vertex.free_blocks().to_vec();

        let err = arenas.allocate_pair(16, 128).unwrap_err();
        assert!(err.is_out_of_space());
        assert_eq!(arenas.vertex.free_blocks(), before.as_slice());
        assert!(arenas.vertex.used_blocks().is_empty());
    }

    #[test]
    fn test_draw_range_rejects_offsets_past_u32() {
        let far = MemBlock::new((u64::from(u32::MAX) + 1) * VERTEX_ELEMENT_SIZE, 4);
        let near = MemBlock::new(8, 4);

        assert_eq!(
            draw_range_for(far, near, 1),
            Err(PoolError::OffsetOverflow { offset: far.start })
        );
        assert_eq!(
            draw_range_for(near, near, 3),
            Ok(DrawRange {
                vertex_offset: 2,
                index_offset: 2,
                index_count: 3,
            })
        );
    }
}
