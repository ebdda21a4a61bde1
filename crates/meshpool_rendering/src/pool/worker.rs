//! # Upload Worker
//!
//! The single background thread behind a [`GeometryPool`](crate::GeometryPool).
//!
//! ```text
//!               uploading raised                 removing raised, no upload
//!   ┌───────────┐ <─────────────── ┌──────┐ ───────────────> ┌──────────┐
//!   │ Uploading │                  │ Idle │                  │ Removing │
//!   └───────────┘ ───────────────> └──────┘ <─────────────── └──────────┘
//!                  batch flushed      │      drained + defragmented
//!                                     │ running cleared
//!                                     ▼
//!                                ┌─────────┐
//!                                │ Stopped │
//!                                └─────────┘
//! ```
//!
//! Each iteration does at most one unit of work, uploads first. A unit is
//! always finished before the loop looks at the running flag again.

use super::{PoolShared, UploadEntry};
use crate::buffers::GeometryBuffers;
use crate::error::ArenaKind;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// What the worker is doing right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WorkerState {
    /// Waiting for work.
    Idle = 0,
    /// Flushing an upload batch.
    Uploading = 1,
    /// Draining removals and defragmenting.
    Removing = 2,
    /// The loop has exited.
    Stopped = 3,
}

impl WorkerState {
    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Uploading,
            2 => Self::Removing,
            _ => Self::Stopped,
        }
    }
}

/// Worker thread main loop.
pub(crate) fn run<B: GeometryBuffers>(shared: Arc<PoolShared>, mut buffers: B, idle_sleep: Duration) {
    tracing::info!("geometry upload worker started");

    while shared.running.load(Ordering::Acquire) {
        if shared.uploading.is_raised() {
            shared.set_state(WorkerState::Uploading);
            flush_uploads(&shared, &mut buffers);
        } else if shared.removing.is_raised() {
            shared.set_state(WorkerState::Removing);
            if let Err(violation) = removal_pass(&shared) {
                shared.poison(violation);
                break;
            }
            shared.removing.clear();
        } else {
            shared.set_state(WorkerState::Idle);
            shared.doorbell.wait_timeout(idle_sleep);
            continue;
        }
        shared.set_state(WorkerState::Idle);
    }

    // Queued data is never dropped on the floor, even if nobody marked it.
    let flushed = flush_uploads(&shared, &mut buffers);
    let discarded = shared.arenas.lock().removals.len();
    if flushed > 0 || discarded > 0 {
        tracing::debug!(flushed, discarded, "worker drained queues on shutdown");
    }

    shared.uploading.clear();
    shared.removing.clear();
    shared.set_state(WorkerState::Stopped);
    tracing::info!("geometry upload worker stopped");
}

/// Hands the whole pending batch to the backend, then lowers the upload
/// flag. Returns the batch size.
///
/// The upload lock is held for the whole flush and while the flag is lowered,
/// so producers never observe a half-flushed batch and a request raised after
/// the batch was taken is never cleared unserved.
fn flush_uploads<B: GeometryBuffers>(shared: &PoolShared, buffers: &mut B) -> usize {
    let mut uploads = shared.uploads.lock();
    if uploads.is_empty() {
        shared.uploading.clear();
        return 0;
    }

    let batch: &[UploadEntry] = &uploads;
    buffers.upload_batch_into_vertex_buffer(batch);
    buffers.upload_batch_into_index_buffer(batch);

    let flushed = uploads.len();
    uploads.clear();
    shared.uploading.clear();
    drop(uploads);

    shared
        .counters
        .entries_flushed
        .fetch_add(flushed as u64, Ordering::Relaxed);
    shared.counters.batches_flushed.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(entries = flushed, "upload batch flushed");

    flushed
}

/// Applies every queued removal to both arenas, then coalesces them.
///
/// Any entry that does not match exactly one used block per arena aborts
/// the pass with a description of the violation.
fn removal_pass(shared: &PoolShared) -> Result<(), String> {
    let mut arenas = shared.arenas.lock();
    let mut reclaimed = 0u64;

    while let Some(entry) = arenas.removals.pop_front() {
        arenas
            .vertex
            .free(entry.vertex_start)
            .map_err(|e| format!("{} arena: {e} while applying {entry:?}", ArenaKind::Vertex))?;
        arenas
            .index
            .free(entry.index_start)
            .map_err(|e| format!("{} arena: {e} while applying {entry:?}", ArenaKind::Index))?;
        reclaimed += 1;
    }

    let merged = arenas.vertex.defrag() + arenas.index.defrag();
    let vertex = arenas.vertex.usage();
    let index = arenas.index.usage();
    drop(arenas);

    shared.counters.removal_passes.fetch_add(1, Ordering::Relaxed);
    shared
        .counters
        .blocks_reclaimed
        .fetch_add(reclaimed, Ordering::Relaxed);
    shared.pressure.check(
        &shared.config,
        &vertex,
        &index,
        shared.live_instances.load(Ordering::Relaxed),
    );
    tracing::debug!(
        reclaimed,
        merged,
        vertex_free_blocks = vertex.free_blocks,
        index_free_blocks = index.free_blocks,
        "removal pass applied"
    );

    Ok(())
}
