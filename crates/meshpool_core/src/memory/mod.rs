//! # Memory Management
//!
//! Byte-range bookkeeping for fixed-capacity GPU buffers.
//!
//! ## Design Philosophy
//!
//! The buffers are allocated once at startup. During gameplay:
//! - Ranges are carved first-fit from a free list
//! - Freed ranges go back to the free list untouched
//! - Adjacent free ranges are only merged during an explicit `defrag` pass

mod arena;
mod block;

pub use arena::{Arena, ArenaUsage};
pub use block::MemBlock;
