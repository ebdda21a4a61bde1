//! # Pool Error Types
//!
//! All errors that can occur in the geometry pool.

use meshpool_core::ArenaError;
use std::fmt;
use thiserror::Error;

/// Which of the two buffers an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArenaKind {
    /// The vertex buffer arena.
    Vertex,
    /// The index buffer arena.
    Index,
}

impl fmt::Display for ArenaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Index => f.write_str("index"),
        }
    }
}

/// Errors that can occur in the geometry pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// An arena rejected an allocation or a free.
    #[error("{arena} arena: {source}")]
    Arena {
        /// The arena that failed.
        arena: ArenaKind,
        /// The underlying arena error.
        #[source]
        source: ArenaError,
    },

    /// `remove` was called before a placeholder was registered.
    #[error("placeholder geometry has not been registered")]
    PlaceholderMissing,

    /// A placeholder is already registered for this pool.
    #[error("placeholder geometry is already registered")]
    PlaceholderAlreadySet,

    /// The placeholder does not point at blocks allocated in this pool.
    #[error("placeholder at vertex element {vertex_offset}, index element {index_offset} is not allocated in this pool")]
    PlaceholderNotAllocated {
        /// The placeholder's vertex element offset.
        vertex_offset: u32,
        /// The placeholder's index element offset.
        index_offset: u32,
    },

    /// The handle already points at the placeholder.
    #[error("geometry was already removed")]
    AlreadyRemoved,

    /// Queued geometry had no vertices or no indices.
    #[error("geometry needs at least one vertex element and one index")]
    EmptyGeometry,

    /// A byte offset does not fit the handle's 32-bit element offset.
    #[error("byte offset {offset} does not fit a 32-bit element offset")]
    OffsetOverflow {
        /// The offending byte offset.
        offset: u64,
    },

    /// A bounded wait on the worker elapsed.
    #[error("timed out after {waited_ms} ms waiting for {what}")]
    SyncTimeout {
        /// What the caller was waiting for.
        what: &'static str,
        /// How long the caller waited.
        waited_ms: u64,
    },

    /// The worker hit an invariant violation and stopped; the pool is unusable.
    #[error("pool faulted: {0}")]
    Faulted(String),

    /// Invalid pool configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The buffer backend failed.
    #[error("buffer backend: {0}")]
    Buffer(String),

    /// The worker thread could not be started.
    #[error("failed to spawn upload worker: {0}")]
    WorkerSpawn(String),
}

impl PoolError {
    /// Wraps an arena error with the arena it came from.
    #[must_use]
    pub const fn arena(arena: ArenaKind, source: ArenaError) -> Self {
        Self::Arena { arena, source }
    }

    /// Returns true if the error means a buffer is out of space.
    #[must_use]
    pub const fn is_out_of_space(&self) -> bool {
        matches!(
            self,
            Self::Arena {
                source: ArenaError::OutOfSpace { .. },
                ..
            }
        )
    }
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
