//! # MESHPOOL Rendering
//!
//! Shared geometry buffers for scenes with many short-lived renderables:
//! - One vertex buffer and one index buffer, sized once from an instance estimate
//! - Sub-allocated per geometry with first-fit free lists
//! - Uploads and reclamation run on a single background worker
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                          GeometryPool                          │
//! ├────────────────────────────────────────────────────────────────┤
//! │  queue_geometry → Arena (vertex, index) → Upload batch         │
//! │        ↓                                       ↓               │
//! │  remove → placeholder redirect        Worker → GeometryBuffers │
//! │        ↓                                                       │
//! │  Removal queue → Worker: free + defrag                         │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//!
//! - The frame thread never waits on the GPU except at explicit sync points
//! - A removed geometry draws the placeholder until its memory is reclaimed
//! - An invariant violation stops the pool instead of corrupting the buffers

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod buffers;
pub mod config;
pub mod error;
pub mod geometry;
pub mod pool;

pub use buffers::{GeometryBuffers, RecordingBuffers, WgpuGeometryBuffers};
pub use config::PoolConfig;
pub use error::{ArenaKind, PoolError, PoolResult};
pub use geometry::{DrawRange, Geometry, GeometryHandle, SCREEN_QUAD_VERTICES};
pub use pool::{GeometryPool, PoolStats, RemovalEntry, UploadEntry, WorkerState};

pub use meshpool_core::{Arena, ArenaError, ArenaUsage, MemBlock};

#[cfg(test)]
mod tests {
    #[test]
    fn test_architecture_diagram_is_aligned() {
        let widths: Vec<usize> = include_str!("lib.rs")
            .lines()
            .filter(|line| ["//! ┌", "//! │", "//! ├", "//! └"].iter().any(|p| line.starts_with(p)))
            .map(|line| line.chars().count())
            .collect();

        assert!(widths.len() >= 3);
        assert!(widths.iter().all(|&w| w == widths[0]), "{widths:?}");
    }
}
