//! Subchunk coordinates for the sweep position space
//!
//! A sweep walks the dataset chunk by chunk and, within each chunk, subchunk
//! by subchunk. Every buffer handed through the ring is tagged with the
//! `(chunk, subchunk)` pair it was filled from, and the consumer requests
//! buffers back in exactly that order.

use std::fmt;

/// Logical position of one buffer within a sweep.
///
/// Ordering is lexicographic: all subchunks of chunk `n` come before every
/// subchunk of chunk `n + 1`. The reserved [`NO_MORE_DATA`](Self::NO_MORE_DATA)
/// sentinel compares greater than every real coordinate, which is what lets a
/// horizon query distinguish "sweep ended" from "not produced yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubchunkPosition {
    /// Chunk number within the sweep
    pub chunk: u64,
    /// Subchunk number within the chunk
    pub subchunk: u64,
}

impl SubchunkPosition {
    /// The origin of every sweep
    pub const ORIGIN: Self = Self {
        chunk: 0,
        subchunk: 0,
    };

    /// Reserved sentinel meaning "the sweep legitimately ended"
    pub const NO_MORE_DATA: Self = Self {
        chunk: u64::MAX,
        subchunk: u64::MAX,
    };

    /// Create a position from chunk and subchunk numbers
    pub fn new(chunk: u64, subchunk: u64) -> Self {
        Self { chunk, subchunk }
    }

    /// The next subchunk within the same chunk
    pub fn next_subchunk(self) -> Self {
        Self {
            chunk: self.chunk,
            subchunk: self.subchunk + 1,
        }
    }

    /// The first subchunk of the next chunk
    pub fn next_chunk(self) -> Self {
        Self {
            chunk: self.chunk + 1,
            subchunk: 0,
        }
    }

    /// Whether this is the reserved end-of-sweep sentinel
    pub fn is_sentinel(self) -> bool {
        self == Self::NO_MORE_DATA
    }

    /// Whether this is the first subchunk of its chunk
    pub fn is_chunk_origin(self) -> bool {
        self.subchunk == 0
    }
}

impl fmt::Display for SubchunkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_sentinel() {
            write!(f, "(end)")
        } else {
            write!(f, "({}, {})", self.chunk, self.subchunk)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexicographic_ordering() {
        assert!(SubchunkPosition::new(0, 5) < SubchunkPosition::new(1, 0));
        assert!(SubchunkPosition::new(2, 3) < SubchunkPosition::new(2, 4));
        assert!(SubchunkPosition::new(3, 0) > SubchunkPosition::new(2, 99));
        assert_eq!(SubchunkPosition::new(1, 1), SubchunkPosition::new(1, 1));
    }

    #[test]
    fn test_sentinel_greater_than_all() {
        let sentinel = SubchunkPosition::NO_MORE_DATA;
        assert!(sentinel.is_sentinel());
        assert!(sentinel > SubchunkPosition::ORIGIN);
        assert!(sentinel > SubchunkPosition::new(u64::MAX - 1, u64::MAX));
        assert!(!SubchunkPosition::new(0, 0).is_sentinel());
    }

    #[test]
    fn test_successors() {
        let pos = SubchunkPosition::new(4, 7);
        assert_eq!(pos.next_subchunk(), SubchunkPosition::new(4, 8));
        assert_eq!(pos.next_chunk(), SubchunkPosition::new(5, 0));
        assert!(SubchunkPosition::ORIGIN.is_chunk_origin());
        assert!(!pos.is_chunk_origin());
    }

    #[test]
    fn test_display() {
        assert_eq!(SubchunkPosition::new(2, 3).to_string(), "(2, 3)");
        assert_eq!(SubchunkPosition::NO_MORE_DATA.to_string(), "(end)");
    }
}
