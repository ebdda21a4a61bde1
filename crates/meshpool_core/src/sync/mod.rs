//! # Synchronization Primitives for the Upload Worker
//!
//! ## The Problem
//!
//! ```text
//! Producer (frame thread):  queue geometry, request removal, wait for upload
//! Worker (upload thread):   flush uploads, reclaim + defrag
//!
//! Busy-wait on a bool:      burns a core while the frame stalls
//! Full channel per request: allocation per frame, ordering harder to reason about
//! ```
//!
//! ## The Solution: Flags with a Parking Lot
//!
//! ```text
//! Signal   - an AtomicBool that can be waited on (cleared / raised) with a bound
//! Doorbell - a latched wake-up so the idle worker sleeps instead of spinning
//! ```
//!
//! The fast path is still a single atomic load. Threads only park when the
//! flag is in the wrong state.

mod doorbell;
mod signal;

pub use doorbell::Doorbell;
pub use signal::Signal;
