//! Contiguous byte span inside an arena.

/// A contiguous span of `size` bytes starting at byte offset `start`.
///
/// Ordering is by `start` first, which is what coalescing sorts on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemBlock {
    /// Byte offset of the first byte.
    pub start: u64,
    /// Length in bytes.
    pub size: u64,
}

impl MemBlock {
    /// Creates a block covering `[start, start + size)`.
    #[inline]
    #[must_use]
    pub const fn new(start: u64, size: u64) -> Self {
        Self { start, size }
    }

    /// One past the last byte of the block.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.start + self.size
    }

    /// Returns true if `next` begins exactly where this block ends.
    #[inline]
    #[must_use]
    pub const fn is_adjacent_to(&self, next: &Self) -> bool {
        self.end() == next.start
    }

    /// Returns true if the two blocks share at least one byte.
    #[inline]
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacency() {
        let a = MemBlock::new(100, 100);
        let b = MemBlock::new(200, 50);
        let c = MemBlock::new(300, 700);

        assert!(a.is_adjacent_to(&b));
        assert!(!b.is_adjacent_to(&a));
        assert!(!a.is_adjacent_to(&c));
    }

    #[test]
    fn test_overlap() {
        let a = MemBlock::new(0, 100);
        assert!(a.overlaps(&MemBlock::new(99, 10)));
        assert!(!a.overlaps(&MemBlock::new(100, 10)));
    }

    #[test]
    fn test_ordering_by_start() {
        let mut blocks = vec![MemBlock::new(300, 700), MemBlock::new(100, 100)];
        blocks.sort();
        assert_eq!(blocks[0].start, 100);
    }
}
