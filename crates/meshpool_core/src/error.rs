//! # Arena Error Types
//!
//! All errors that can occur while carving or releasing arena ranges.

use thiserror::Error;

/// Errors that can occur in an [`Arena`](crate::Arena).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    /// Zero-length ranges are never handed out.
    #[error("zero-sized allocation requested")]
    ZeroSize,

    /// No free block is large enough for the request.
    #[error("out of space: requested {requested} bytes, largest free block is {largest_free} of {capacity}")]
    OutOfSpace {
        /// Bytes requested.
        requested: u64,
        /// Size of the largest free block at the time of the request.
        largest_free: u64,
        /// Total arena capacity.
        capacity: u64,
    },

    /// No used block starts at the offset (double free or stale handle).
    #[error("no used block starts at offset {offset}")]
    NotAllocated {
        /// The offending byte offset.
        offset: u64,
    },

    /// More than one used block starts at the offset; the arena is corrupted.
    #[error("{matches} used blocks start at offset {offset}")]
    DuplicateBlock {
        /// The offending byte offset.
        offset: u64,
        /// How many used blocks matched.
        matches: usize,
    },

    /// The reserved prefix does not fit in the arena.
    #[error("reserved prefix of {reserved} bytes exceeds capacity {capacity}")]
    ReservedTooLarge {
        /// Bytes to reserve.
        reserved: u64,
        /// Total arena capacity.
        capacity: u64,
    },
}

/// Result type for arena operations.
pub type ArenaResult<T> = Result<T, ArenaError>;
