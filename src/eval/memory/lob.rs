//! A large object allocation
//!
//! A memory region that contains a single object and its header

use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;

use super::bump::AllocError;

/// Granularity of large object sizes
const PAGE_BYTES: usize = 4096;

/// A memory allocation containing a single large object with its
/// header, rounded up to whole pages rather than a block size
#[derive(Debug)]
pub struct LargeObjectBlock {
    /// Pointer to memory
    ptr: NonNull<u8>,
    /// Size of allocation
    size: usize,
}

impl LargeObjectBlock {
    /// Create a new LargeObjectBlock of size sufficient to contain
    /// `required_size` bytes.
    pub fn new(required_size: usize) -> Result<Self, AllocError> {
        let size = Self::rounded_size_for(required_size);
        Ok(LargeObjectBlock {
            ptr: Self::alloc_block(size)?,
            size,
        })
    }

    fn layout(size: usize) -> Result<Layout, AllocError> {
        Layout::from_size_align(size, PAGE_BYTES).map_err(|_| AllocError::BadRequest)
    }

    fn alloc_block(size: usize) -> Result<NonNull<u8>, AllocError> {
        let layout = Self::layout(size)?;
        // SAFETY: layout has non-zero size (at least one page) and
        // the result is checked for null
        let ptr = unsafe { alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError::OOM)
    }

    /// Round up to whole pages
    fn rounded_size_for(required_size: usize) -> usize {
        required_size.max(1).div_ceil(PAGE_BYTES) * PAGE_BYTES
    }

    /// Pointer to the writeable memory area
    pub fn space(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Get the actual allocated size of this large object block
    pub fn allocated_size(&self) -> usize {
        self.size
    }

    /// Does the block contain the address?
    pub fn contains<T>(&self, ptr: NonNull<T>) -> bool {
        let start = self.ptr.as_ptr() as usize;
        let addr = ptr.as_ptr() as usize;
        addr >= start && addr < start + self.size
    }
}

impl Drop for LargeObjectBlock {
    fn drop(&mut self) {
        // SAFETY: `ptr` was allocated by `alloc_block` with the same
        // size and alignment and is owned exclusively by this block
        unsafe {
            let layout = Layout::from_size_align_unchecked(self.size, PAGE_BYTES);
            dealloc(self.ptr.as_ptr(), layout);
        }
    }
}
