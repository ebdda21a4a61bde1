//! # MESHPOOL Core
//!
//! Engine-agnostic building blocks for the shared geometry buffers:
//! - Free-list arenas that hand out byte ranges of a fixed-capacity buffer
//! - Flag signals used to hand work between the producer and the upload worker
//!
//! ## Architecture Rules
//!
//! 1. **Capacity is fixed at creation** - arenas never grow
//! 2. **Ranges, not memory** - an arena only tracks offsets, the GPU owns the bytes
//! 3. **Failures are values** - running out of space is an `Err`, never a panic
//!
//! ## Example
//!
//! ```rust
//! use meshpool_core::Arena;
//!
//! let mut arena = Arena::new(1000);
//! let a = arena.allocate(300)?;
//! let b = arena.allocate(300)?;
//! assert_eq!((a, b), (0, 300));
//!
//! arena.free(a)?;
//! arena.defrag();
//! # Ok::<(), meshpool_core::ArenaError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod memory;
pub mod sync;

pub use error::{ArenaError, ArenaResult};
pub use memory::{Arena, ArenaUsage, MemBlock};
pub use sync::{Doorbell, Signal};
