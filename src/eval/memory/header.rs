//! Header for all heap allocations
//!
//! The header precedes every object in the heap. It is not part of
//! the object representation proper (which begins with the object's
//! tag) but is owned by the allocator and collector.

use bitmaps::Bitmap;

#[derive(Debug, Clone, Copy)]
pub struct HeaderBits(Bitmap<8>);

const MARK_BIT: usize = 0;
const COMMITTED_BIT: usize = 1;
const LARGE_BIT: usize = 2;

impl HeaderBits {
    /// Bits for a fresh reservation: unmarked according to the
    /// heap's current mark state and not yet committed
    fn fresh(mark_state: bool) -> HeaderBits {
        let mut bits = HeaderBits(Bitmap::new());
        bits.0.set(MARK_BIT, !mark_state);
        bits
    }
}

/// Allocation header
///
/// Mark region collection requires:
///  - a mark bit (for mark phase), interpreted relative to the heap's
///    flipping mark state so marks never need clearing
///  - the allocation length so lines can be marked for the whole
///    object
///
/// Additionally the committed bit distinguishes provisional
/// reservations from objects which have been handed out.
#[repr(C)]
#[derive(Debug)]
pub struct AllocHeader {
    /// Header bits for object state
    bits: HeaderBits,
    /// Count of allocated bytes including this header
    alloc_length: u32,
}

impl AllocHeader {
    pub fn new(byte_length: u32, mark_state: bool) -> Self {
        AllocHeader {
            bits: HeaderBits::fresh(mark_state),
            alloc_length: byte_length,
        }
    }

    /// Header for an allocation living in its own large object block
    pub fn new_large(byte_length: u32, mark_state: bool) -> Self {
        let mut header = Self::new(byte_length, mark_state);
        header.bits.0.set(LARGE_BIT, true);
        header
    }

    pub fn mark(&mut self, mark_state: bool) {
        self.bits.0.set(MARK_BIT, mark_state);
    }

    pub fn is_marked(&self, mark_state: bool) -> bool {
        self.bits.0.get(MARK_BIT) == mark_state
    }

    pub fn commit(&mut self) {
        self.bits.0.set(COMMITTED_BIT, true);
    }

    pub fn is_committed(&self) -> bool {
        self.bits.0.get(COMMITTED_BIT)
    }

    pub fn is_large(&self) -> bool {
        self.bits.0.get(LARGE_BIT)
    }

    pub fn length(&self) -> u32 {
        self.alloc_length
    }
}

#[cfg(test)]
pub mod tests {
    use std::mem::{align_of, size_of};

    use super::*;

    #[test]
    pub fn test_expected_bitmap_size() {
        assert_eq!(size_of::<HeaderBits>(), 1);
    }

    #[test]
    pub fn test_header_preserves_word_alignment() {
        assert_eq!(size_of::<AllocHeader>() % size_of::<usize>(), 0);
        assert!(align_of::<AllocHeader>() <= align_of::<usize>());
    }

    #[test]
    pub fn test_fresh_header_is_unmarked_and_uncommitted() {
        for state in [false, true] {
            let header = AllocHeader::new(32, state);
            assert!(!header.is_marked(state));
            assert!(!header.is_committed());
            assert!(!header.is_large());
            assert_eq!(header.length(), 32);
        }
    }

    #[test]
    pub fn test_mark_is_relative_to_state() {
        let mut header = AllocHeader::new(16, false);
        header.mark(false);
        assert!(header.is_marked(false));
        // after the heap flips state the same bits read as unmarked
        assert!(!header.is_marked(true));
    }

    #[test]
    pub fn test_commit() {
        let mut header = AllocHeader::new_large(1 << 20, true);
        header.commit();
        assert!(header.is_committed());
        assert!(header.is_large());
    }
}
