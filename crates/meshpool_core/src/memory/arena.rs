//! # Free-List Arena
//!
//! First-fit sub-allocator over a fixed byte range.

use super::block::MemBlock;
use crate::error::{ArenaError, ArenaResult};

/// A free-list arena over `[0, capacity)`.
///
/// Allocations are carved first-fit from the front of a free block.
/// Freed blocks go back to the free list as-is; adjacent free blocks are only
/// merged by [`Arena::defrag`].
///
/// # Thread Safety
///
/// This arena is NOT thread-safe. Wrap it in a mutex to share it.
///
/// # Example
///
/// ```rust
/// use meshpool_core::{Arena, MemBlock};
///
/// let mut arena = Arena::new(1000);
/// assert_eq!(arena.allocate(300)?, 0);
/// assert_eq!(arena.free_blocks(), &[MemBlock::new(300, 700)]);
/// # Ok::<(), meshpool_core::ArenaError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Arena {
    /// Total capacity in bytes.
    capacity: u64,
    /// Permanently used prefix, never returned by `free`.
    reserved: Option<MemBlock>,
    /// Unused spans, unordered between defrag passes.
    free: Vec<MemBlock>,
    /// Spans handed out by `allocate`.
    used: Vec<MemBlock>,
    /// Where the most recent allocation was carved, for `rollback`.
    last_carve: Option<Carve>,
}

/// Free-list position of the most recent carve.
#[derive(Debug, Clone, Copy)]
struct Carve {
    start: u64,
    index: usize,
    exact: bool,
}

/// Snapshot of how full an arena is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArenaUsage {
    /// Total capacity in bytes.
    pub capacity: u64,
    /// Bytes in used blocks, including any reserved prefix.
    pub used_bytes: u64,
    /// Bytes in free blocks.
    pub free_bytes: u64,
    /// Number of free blocks.
    pub free_blocks: usize,
    /// Number of used blocks, excluding any reserved prefix.
    pub used_blocks: usize,
    /// Size of the largest free block.
    pub largest_free: u64,
}

impl ArenaUsage {
    /// Fraction of the capacity in use, in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fill_ratio(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.capacity as f64
    }
}

impl Arena {
    /// Creates an arena with a single free block covering the whole capacity.
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        let free = if capacity == 0 {
            Vec::new()
        } else {
            vec![MemBlock::new(0, capacity)]
        };

        Self {
            capacity,
            reserved: None,
            free,
            used: Vec::new(),
            last_carve: None,
        }
    }

    /// Creates an arena whose first `reserved` bytes are permanently in use.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::ReservedTooLarge`] if `reserved > capacity`.
    pub fn with_reserved(capacity: u64, reserved: u64) -> ArenaResult<Self> {
        if reserved > capacity {
            return Err(ArenaError::ReservedTooLarge { reserved, capacity });
        }
        if reserved == 0 {
            return Ok(Self::new(capacity));
        }

        let free = if reserved == capacity {
            Vec::new()
        } else {
            vec![MemBlock::new(reserved, capacity - reserved)]
        };

        Ok(Self {
            capacity,
            reserved: Some(MemBlock::new(0, reserved)),
            free,
            used: Vec::new(),
            last_carve: None,
        })
    }

    /// Returns the total capacity in bytes.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Returns the permanently reserved prefix, if any.
    #[inline]
    #[must_use]
    pub const fn reserved(&self) -> Option<MemBlock> {
        self.reserved
    }

    /// Current free list, in list order.
    #[inline]
    #[must_use]
    pub fn free_blocks(&self) -> &[MemBlock] {
        &self.free
    }

    /// Current used list, in list order.
    #[inline]
    #[must_use]
    pub fn used_blocks(&self) -> &[MemBlock] {
        &self.used
    }

    /// Returns true if a used block, or the reserved prefix, starts at `offset`.
    #[must_use]
    pub fn is_allocated(&self, offset: u64) -> bool {
        self.reserved.is_some_and(|r| r.start == offset)
            || self.used.iter().any(|b| b.start == offset)
    }

    /// Bytes in free blocks.
    #[must_use]
    pub fn free_bytes(&self) -> u64 {
        self.free.iter().map(|b| b.size).sum()
    }

    /// Bytes in used blocks, including any reserved prefix.
    #[must_use]
    pub fn used_bytes(&self) -> u64 {
        self.capacity - self.free_bytes()
    }

    /// Size of the largest free block, zero if the free list is empty.
    #[must_use]
    pub fn largest_free(&self) -> u64 {
        self.free.iter().map(|b| b.size).max().unwrap_or(0)
    }

    /// Returns a usage snapshot.
    #[must_use]
    pub fn usage(&self) -> ArenaUsage {
        let free_bytes = self.free_bytes();
        ArenaUsage {
            capacity: self.capacity,
            used_bytes: self.capacity - free_bytes,
            free_bytes,
            free_blocks: self.free.len(),
            used_blocks: self.used.len(),
            largest_free: self.largest_free(),
        }
    }

    /// Allocates `size` bytes, returning the start offset.
    ///
    /// This is a **O(free blocks)** first-fit scan. The carved span is taken
    /// from the front of the first block that fits; the remainder stays in
    /// place in the free list.
    ///
    /// # Errors
    ///
    /// - [`ArenaError::ZeroSize`] for `size == 0`
    /// - [`ArenaError::OutOfSpace`] if no free block fits; the arena is unchanged
    pub fn allocate(&mut self, size: u64) -> ArenaResult<u64> {
        if size == 0 {
            return Err(ArenaError::ZeroSize);
        }

        let Some(index) = self.free.iter().position(|b| b.size >= size) else {
            return Err(ArenaError::OutOfSpace {
                requested: size,
                largest_free: self.largest_free(),
                capacity: self.capacity,
            });
        };

        let found = self.free[index];
        let exact = found.size == size;
        if exact {
            self.free.remove(index);
        } else {
            self.free[index] = MemBlock::new(found.start + size, found.size - size);
        }
        self.last_carve = Some(Carve {
            start: found.start,
            index,
            exact,
        });

        let carved = MemBlock::new(found.start, size);
        self.used.push(carved);
        tracing::trace!(start = carved.start, size, "arena block carved");

        Ok(carved.start)
    }

    /// Moves the used block starting at `offset` back to the free list.
    ///
    /// # Errors
    ///
    /// - [`ArenaError::NotAllocated`] if no used block starts at `offset`
    /// - [`ArenaError::DuplicateBlock`] if several do; nothing is moved
    pub fn free(&mut self, offset: u64) -> ArenaResult<MemBlock> {
        let mut matches = self
            .used
            .iter()
            .enumerate()
            .filter(|(_, b)| b.start == offset)
            .map(|(i, _)| i);

        let Some(index) = matches.next() else {
            return Err(ArenaError::NotAllocated { offset });
        };
        let extra = matches.count();
        if extra > 0 {
            return Err(ArenaError::DuplicateBlock {
                offset,
                matches: extra + 1,
            });
        }

        let block = self.used.swap_remove(index);
        self.free.push(block);
        self.last_carve = None;
        tracing::trace!(start = block.start, size = block.size, "arena block freed");

        Ok(block)
    }

    /// Undoes the most recent `allocate` that returned `offset`.
    ///
    /// Unlike [`Arena::free`], the block goes back exactly where it was
    /// carved from: folded into its remainder, or reinserted at its old
    /// free-list position after an exact fit. The free list is then identical
    /// to its state before that `allocate`, so a failed multi-arena
    /// allocation leaves no trace.
    ///
    /// For any other used block this behaves like `free` followed by a merge
    /// into the free block that directly follows it, if there is one.
    ///
    /// # Errors
    ///
    /// Same as [`Arena::free`].
    pub fn rollback(&mut self, offset: u64) -> ArenaResult<MemBlock> {
        let carve = self.last_carve.filter(|c| c.start == offset);
        let block = self.free(offset)?;
        // `free` pushed the block last.
        self.free.pop();

        match carve {
            Some(Carve { index, exact: true, .. }) if index <= self.free.len() => {
                self.free.insert(index, block);
            }
            Some(Carve { index, exact: false, .. })
                if self.free.get(index).is_some_and(|r| block.is_adjacent_to(r)) =>
            {
                let remainder = &mut self.free[index];
                remainder.start = block.start;
                remainder.size += block.size;
            }
            _ => match self.free.iter_mut().find(|b| block.is_adjacent_to(b)) {
                Some(next) => {
                    next.start = block.start;
                    next.size += block.size;
                }
                None => self.free.push(block),
            },
        }

        Ok(block)
    }

    /// Coalesces adjacent free blocks.
    ///
    /// Sorts the free list by start offset and rebuilds it in one pass,
    /// folding each block into its predecessor when they touch. Afterwards
    /// no two free blocks are adjacent. Returns the number of merges.
    pub fn defrag(&mut self) -> usize {
        if self.free.len() < 2 {
            return 0;
        }

        self.free.sort_unstable();
        let before = self.free.len();

        let mut merged: Vec<MemBlock> = Vec::with_capacity(before);
        for block in self.free.drain(..) {
            match merged.last_mut() {
                Some(last) if last.is_adjacent_to(&block) => last.size += block.size,
                _ => merged.push(block),
            }
        }
        self.free = merged;
        self.last_carve = None;

        before - self.free.len()
    }

    /// Checks the partition invariant.
    ///
    /// Free, used and reserved blocks must be non-empty, pairwise disjoint and
    /// together cover exactly `[0, capacity)`.
    #[must_use]
    pub fn is_partitioned(&self) -> bool {
        let mut all: Vec<MemBlock> = self
            .free
            .iter()
            .chain(self.used.iter())
            .chain(self.reserved.iter())
            .copied()
            .collect();
        all.sort_unstable();

        let mut cursor = 0;
        for block in &all {
            if block.size == 0 || block.start != cursor {
                return false;
            }
            cursor = block.end();
        }
        cursor == self.capacity
    }
}
