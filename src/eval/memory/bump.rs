//! Basic (downward) bump allocation and line map
//!

use std::{
    alloc::{alloc, dealloc, Layout},
    fmt::Debug,
    ptr::NonNull,
};

use bitmaps::Bitmap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AllocError {
    BadRequest,
    OOM,
}

/// 32K Block
pub const BLOCK_SIZE_BITS: usize = 15;
/// 32K Block
pub const BLOCK_SIZE_BYTES: usize = 1 << BLOCK_SIZE_BITS;

/// 128 byte line
pub const LINE_SIZE_BITS: usize = 7;
/// 128 byte line
pub const LINE_SIZE_BYTES: usize = 1 << LINE_SIZE_BITS;
/// Lines in a block
pub const LINE_COUNT: usize = BLOCK_SIZE_BYTES / LINE_SIZE_BYTES;

/// Maximum allocation size
pub const MAX_ALLOC_SIZE: usize = u32::MAX as usize;

/// LineMap contains mark flags for each line
#[derive(Default)]
pub struct LineMap(Bitmap<LINE_COUNT>);

impl LineMap {
    /// Mark the specified line
    pub fn mark(&mut self, index: usize) {
        debug_assert!(index < LINE_COUNT);
        self.0.set(index, true);
    }

    /// Check whether the specified line is marked
    pub fn marked(&self, index: usize) -> bool {
        debug_assert!(index < LINE_COUNT);
        self.0.get(index)
    }

    /// Clear all marks
    pub fn reset(&mut self) {
        self.0 = Bitmap::new();
    }

    /// Find next hole
    ///
    /// Work downward through the line map from the line containing
    /// the byte below `below_offset`. Lines are marked precisely
    /// (every line an object touches is marked) so any run of
    /// unmarked lines is usable.
    ///
    /// Returns memory byte offsets (within the block) of the next hole.
    pub fn find_hole(&self, below_offset: usize) -> Option<(usize, usize)> {
        let limit_line = below_offset / LINE_SIZE_BYTES;

        let upper = (0..limit_line).rev().find(|line| !self.marked(*line))?;
        let lower = (0..upper)
            .rev()
            .take_while(|line| !self.marked(*line))
            .last()
            .unwrap_or(upper);

        Some((lower * LINE_SIZE_BYTES, (upper + 1) * LINE_SIZE_BYTES))
    }

    /// Returns (count holes, count free, count marked)
    pub fn stats(&self) -> (usize, usize, usize) {
        let mut count_holes = 0;
        let mut free = 0;
        let mut marked = 0;
        let mut last = true;
        for i in 0..LINE_COUNT {
            let current = self.marked(i);
            if current {
                marked += 1
            } else {
                free += 1
            }
            if last && !current {
                count_holes += 1
            }
            last = current;
        }
        (count_holes, free, marked)
    }
}

impl Debug for LineMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let row: String = (0..LINE_COUNT)
            .map(|i| if self.marked(i) { '#' } else { '.' })
            .collect();
        for chunk in row.as_bytes().chunks(64) {
            writeln!(f, "  {}", String::from_utf8_lossy(chunk))?;
        }
        Ok(())
    }
}

/// Blocks are aligned to their own size so the block containing any
/// object can be found by masking its address
fn block_layout() -> Result<Layout, AllocError> {
    Layout::from_size_align(BLOCK_SIZE_BYTES, BLOCK_SIZE_BYTES).map_err(|_| AllocError::BadRequest)
}

/// A memory block with downward bump allocation machinery and a
/// line map recording which lines hold live objects
pub struct BumpBlock {
    /// Start of the block's memory
    base: NonNull<u8>,
    /// Lower limit offset of current hole
    lower: usize,
    /// Offset to move down as regions are allocated
    cursor: usize,
    /// Line mark flags
    line_map: LineMap,
}

impl PartialEq for BumpBlock {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base
    }
}

impl Eq for BumpBlock {}

impl Debug for BumpBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{:p} {}:{}:{}",
            self.base,
            BLOCK_SIZE_BYTES,
            self.cursor,
            self.lower
        )?;
        write!(f, "{:?}", self.line_map)
    }
}

impl BumpBlock {
    /// Initialise a fresh new block ready to start bumping downwards
    pub fn new() -> Result<Self, AllocError> {
        let layout = block_layout()?;
        let base = NonNull::new(unsafe { alloc(layout) }).ok_or(AllocError::OOM)?;
        Ok(BumpBlock {
            base,
            cursor: BLOCK_SIZE_BYTES,
            lower: 0,
            line_map: LineMap::default(),
        })
    }

    /// Bump cursor back by size, moving on to lower holes as required
    pub fn bump(&mut self, size: usize) -> Option<NonNull<u8>> {
        if size > self.cursor {
            return None;
        }

        let next = self.cursor - size;
        if next < self.lower {
            let (lower, cursor) = self.line_map.find_hole(self.lower)?;
            self.lower = lower;
            self.cursor = cursor;
            self.bump(size)
        } else {
            self.cursor = next;
            NonNull::new(unsafe { self.base.as_ptr().add(next) })
        }
    }

    /// Reset cursor to the highest hole after a collection has
    /// marked the lines in use. Returns false if the block is full.
    pub fn recycle(&mut self) -> bool {
        if let Some((lower, cursor)) = self.line_map.find_hole(BLOCK_SIZE_BYTES) {
            if cfg!(debug_assertions) {
                self.poison_holes();
            }
            self.cursor = cursor;
            self.lower = lower;
            true
        } else {
            self.cursor = 0;
            self.lower = 0;
            false
        }
    }

    /// Overwrite every free line with 0xbb so stale references are
    /// obvious
    fn poison_holes(&mut self) {
        for line in (0..LINE_COUNT).filter(|line| !self.line_map.marked(*line)) {
            unsafe {
                std::ptr::write_bytes(
                    self.base.as_ptr().add(line * LINE_SIZE_BYTES),
                    0xbb,
                    LINE_SIZE_BYTES,
                );
            }
        }
    }

    /// Offset of `ptr` from the base if it lies within the block
    fn offset_of<T>(&self, ptr: NonNull<T>) -> Option<usize> {
        let base = self.base_address();
        let addr = ptr.as_ptr() as usize;
        if addr >= base && addr < base + BLOCK_SIZE_BYTES {
            Some(addr - base)
        } else {
            None
        }
    }

    /// Size in bytes of the hole we're currently allocating into
    pub fn current_hole_size(&self) -> usize {
        self.cursor - self.lower
    }

    /// Reset line maps ready for GC trace
    pub fn reset_region_marks(&mut self) {
        self.line_map.reset();
    }

    /// Address of the start of the block
    pub fn base_address(&self) -> usize {
        self.base.as_ptr() as usize
    }

    /// Does the block contain the address?
    pub fn contains<T>(&self, ptr: NonNull<T>) -> bool {
        self.offset_of(ptr).is_some()
    }

    /// If ptr is within the block, mark all lines touched by the
    /// region starting at ptr and extending for bytes.
    pub fn mark_region(&mut self, ptr: NonNull<u8>, bytes: usize) -> bool {
        if let Some(offset) = self.offset_of(ptr) {
            let first_line = offset / LINE_SIZE_BYTES;
            let last_line = (offset + bytes.max(1) - 1) / LINE_SIZE_BYTES;
            for line in first_line..=last_line.min(LINE_COUNT - 1) {
                self.line_map.mark(line);
            }
            true
        } else {
            false
        }
    }

    /// Returns (count holes, count free, count marked)
    pub fn stats(&self) -> (usize, usize, usize) {
        self.line_map.stats()
    }
}

impl Drop for BumpBlock {
    fn drop(&mut self) {
        if let Ok(layout) = block_layout() {
            unsafe { dealloc(self.base.as_ptr(), layout) }
        }
    }
}
