//! The collector-managed heap
//!
//! Immix style: small and medium objects are bump allocated downward
//! into 32K blocks, objects larger than a block get a large object
//! block of their own. Every allocation starts life as a reservation
//! which must be committed before the object is visible.

use std::cell::{Cell, RefCell, UnsafeCell};
use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::mem::size_of;
use std::ptr::{write, NonNull};

use log::{debug, trace};
use thiserror::Error;

use super::{
    alloc::{align_up, Allocator, MutatorScope, Reservation},
    bump::{self, AllocError, BumpBlock, BLOCK_SIZE_BYTES, MAX_ALLOC_SIZE},
    header::AllocHeader,
    lob::LargeObjectBlock,
    object::{Tag, TAG_COUNT},
};

/// Errors raised when the heap cannot produce a reservation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeapError {
    #[error("out of memory: cannot reserve {requested} bytes with {blocks} blocks in use")]
    OutOfMemory { requested: usize, blocks: usize },
    #[error("invalid allocation size: {requested} bytes exceeds the maximum of {max} bytes")]
    InvalidAllocationSize { requested: usize, max: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Number of standard blocks allocated
    pub blocks_allocated: usize,
    /// Number of large objects allocated
    pub lobs_allocated: usize,
    /// Bytes held in large object blocks
    pub lob_bytes: usize,
    /// Number of blocks used and not reclaimed
    pub used: usize,
    /// Number of blocks with holes available for reuse
    pub recycled: usize,
}

/// Running totals of allocation activity
#[derive(Debug, Clone, Default)]
pub struct AllocationCounters {
    /// Committed objects by tag
    pub objects: [u64; TAG_COUNT],
    /// Committed bytes (including headers)
    pub bytes: u64,
    /// Reservations abandoned because commit failed
    pub commit_failures: u64,
    /// Completed collections
    pub collections: u64,
}

impl AllocationCounters {
    pub fn total_objects(&self) -> u64 {
        self.objects.iter().sum()
    }

    pub fn objects_of(&self, tag: Tag) -> u64 {
        self.objects[tag as usize]
    }
}

/// Object size class.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SizeClass {
    /// Small objects fit inside a line
    Small,
    /// Medium objects span lines inside a block
    Medium,
    /// Large objects are larger than a normal block
    Large,
}

impl SizeClass {
    pub fn for_size(object_size: usize) -> SizeClass {
        if object_size < bump::LINE_SIZE_BYTES {
            SizeClass::Small
        } else if object_size < bump::BLOCK_SIZE_BYTES {
            SizeClass::Medium
        } else {
            SizeClass::Large
        }
    }
}

/// Blocks owned by the heap
///
/// Bump blocks live in a single vector and are referred to by index;
/// `by_address` finds the block containing an object in constant time
/// because blocks are aligned to their size.
#[derive(Default)]
pub struct HeapState {
    blocks: Vec<BumpBlock>,
    by_address: HashMap<usize, usize>,
    /// For allocating small objects
    head: Option<usize>,
    /// For allocating medium objects
    overflow: Option<usize>,
    /// Part used blocks with holes, available to become head
    recycled: VecDeque<usize>,
    /// Large object blocks - each contains single object
    lobs: Vec<LargeObjectBlock>,
}

impl Debug for HeapState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, block) in self.blocks.iter().enumerate() {
            let role = if Some(i) == self.head {
                "Hd"
            } else if Some(i) == self.overflow {
                "Ov"
            } else if self.recycled.contains(&i) {
                "Cy"
            } else {
                "XX"
            };
            writeln!(f, "({}) {:?}", role, block)?;
        }

        for lob in &self.lobs {
            writeln!(f, "(Lo) {:?}", lob)?;
        }

        writeln!(f)
    }
}

impl HeapState {
    /// Blocks in use, counting large objects in block-sized units
    fn block_count(&self) -> usize {
        self.blocks.len()
            + self
                .lobs
                .iter()
                .map(|lob| lob.allocated_size().div_ceil(BLOCK_SIZE_BYTES))
                .sum::<usize>()
    }

    fn out_of_memory(&self, requested: usize) -> HeapError {
        HeapError::OutOfMemory {
            requested,
            blocks: self.block_count(),
        }
    }

    fn within_limit(&self, extra_blocks: usize, limit: Option<usize>) -> bool {
        limit.map_or(true, |limit| self.block_count() + extra_blocks <= limit)
    }

    /// Acquire a brand new block
    fn new_block(&mut self, requested: usize, limit: Option<usize>) -> Result<usize, HeapError> {
        if !self.within_limit(1, limit) {
            return Err(self.out_of_memory(requested));
        }
        let block = BumpBlock::new().map_err(|_| self.out_of_memory(requested))?;
        let index = self.blocks.len();
        self.by_address.insert(block.base_address(), index);
        self.blocks.push(block);
        trace!("new block {} (of {})", index, self.blocks.len());
        Ok(index)
    }

    fn head_hole_size(&self) -> usize {
        self.head
            .map(|i| self.blocks[i].current_hole_size())
            .unwrap_or(0)
    }

    /// Bump allocate in the head block, moving on to recycled or new
    /// blocks as required
    fn bump_head(&mut self, size: usize, limit: Option<usize>) -> Result<NonNull<u8>, HeapError> {
        if let Some(space) = self.head.and_then(|i| self.blocks[i].bump(size)) {
            return Ok(space);
        }

        loop {
            let index = match self.recycled.pop_front() {
                Some(index) => index,
                None => self.new_block(size, limit)?,
            };
            self.head = Some(index);
            if let Some(space) = self.blocks[index].bump(size) {
                return Ok(space);
            }
        }
    }

    /// Bump allocate a medium object in the overflow block
    fn bump_overflow(
        &mut self,
        size: usize,
        limit: Option<usize>,
    ) -> Result<NonNull<u8>, HeapError> {
        if let Some(space) = self.overflow.and_then(|i| self.blocks[i].bump(size)) {
            return Ok(space);
        }

        let index = self.new_block(size, limit)?;
        self.overflow = Some(index);
        self.blocks[index]
            .bump(size)
            .ok_or_else(|| self.out_of_memory(size))
    }

    /// Create a new large object block able to store data of the
    /// specified size
    fn lob(&mut self, size: usize, limit: Option<usize>) -> Result<NonNull<u8>, HeapError> {
        if !self.within_limit(size.div_ceil(BLOCK_SIZE_BYTES), limit) {
            return Err(self.out_of_memory(size));
        }
        let lob = LargeObjectBlock::new(size).map_err(|e| match e {
            AllocError::BadRequest => HeapError::InvalidAllocationSize {
                requested: size,
                max: MAX_ALLOC_SIZE,
            },
            AllocError::OOM => self.out_of_memory(size),
        })?;
        let space = lob.space();
        self.lobs.push(lob);
        Ok(space)
    }

    fn reset_region_marks(&mut self) {
        for block in &mut self.blocks {
            block.reset_region_marks();
        }
    }

    /// Mark the lines occupied by an allocation
    fn mark_region(&mut self, start: NonNull<u8>, bytes: usize) {
        let base = start.as_ptr() as usize & !(BLOCK_SIZE_BYTES - 1);
        if let Some(index) = self.by_address.get(&base) {
            self.blocks[*index].mark_region(start, bytes);
        }
    }

    /// Recycle every block with free lines and release unmarked large
    /// objects
    fn sweep(&mut self, mark_state: bool) {
        self.head = None;
        self.overflow = None;
        self.recycled.clear();

        for (index, block) in self.blocks.iter_mut().enumerate() {
            if block.recycle() {
                self.recycled.push_back(index);
            }
        }

        self.lobs.retain(|lob| {
            let header = lob.space().cast::<AllocHeader>();
            // SAFETY: every large object block starts with a header
            unsafe { (*header.as_ptr()).is_marked(mark_state) }
        });
    }

    fn stats(&self) -> HeapStats {
        HeapStats {
            blocks_allocated: self.blocks.len(),
            lobs_allocated: self.lobs.len(),
            lob_bytes: self.lobs.iter().map(|l| l.allocated_size()).sum(),
            used: self.blocks.len() - self.recycled.len(),
            recycled: self.recycled.len(),
        }
    }
}

/// The heap
///
/// Allocation and collection both go through `&self`: the evaluator
/// collects at safepoints while its mutator view is alive. Objects
/// never move, so a collection leaves every handle to a reachable
/// object valid. Handles held anywhere other than the roots passed
/// to the collector must not be used afterwards.
pub struct Heap {
    /// Blocks
    state: UnsafeCell<HeapState>,
    /// Limit in blocks
    limit: Option<usize>,
    /// Mark bit value meaning "marked" in the current cycle
    mark_state: Cell<bool>,
    /// Advanced whenever outstanding reservations are invalidated
    epoch: Cell<u64>,
    /// Commits which will fail before any succeeds
    injected_failures: Cell<usize>,
    /// Allocation counters
    counters: RefCell<AllocationCounters>,
    /// Bytes committed since the last collection which prompt another
    threshold: Option<u64>,
    /// Committed bytes as of the last collection
    bytes_at_collection: Cell<u64>,
}

impl MutatorScope for Heap {}

impl Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // SAFETY: read only, no reservation in progress while
        // formatting
        unsafe { (*self.state.get()).fmt(f) }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            state: UnsafeCell::new(HeapState::default()),
            limit: None,
            mark_state: Cell::new(false),
            epoch: Cell::new(0),
            injected_failures: Cell::new(0),
            counters: RefCell::new(AllocationCounters::default()),
            threshold: None,
            bytes_at_collection: Cell::new(0),
        }
    }

    /// Request collection once `mib` mebibytes have been committed
    /// since the last one
    pub fn with_threshold(self, mib: usize) -> Self {
        Heap {
            threshold: Some(mib as u64 * 1_048_576),
            ..self
        }
    }

    /// A heap which refuses to grow beyond `limit_mib` mebibytes
    pub fn with_limit(limit_mib: usize) -> Self {
        let block_limit = ((limit_mib * 1_048_576) / BLOCK_SIZE_BYTES).max(1);
        debug!("heap block limit {}", block_limit);
        Heap {
            limit: Some(block_limit),
            ..Heap::new()
        }
    }

    pub fn stats(&self) -> HeapStats {
        // SAFETY: read only snapshot
        unsafe { (*self.state.get()).stats() }
    }

    pub fn counters(&self) -> AllocationCounters {
        self.counters.borrow().clone()
    }

    /// Get the current mark state for this heap
    pub fn mark_state(&self) -> bool {
        self.mark_state.get()
    }

    /// Current collection epoch
    pub fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    /// Invalidate all outstanding reservations
    fn advance_epoch(&self) {
        self.epoch.set(self.epoch.get() + 1);
    }

    /// Make the next `n` commits fail as though a collection had run
    /// between reservation and commit
    pub fn inject_commit_failures(&self, n: usize) {
        self.injected_failures.set(self.injected_failures.get() + n);
    }

    /// Whether a collection is due: either the heap is approaching
    /// its block limit with few blocks recycled, or enough has been
    /// allocated since the last collection
    pub fn policy_requires_collection(&self) -> bool {
        let near_limit = self.limit.map_or(false, |limit| {
            let stats = self.stats();
            stats.blocks_allocated * 4 >= limit * 3
                && stats.recycled * 4 < stats.blocks_allocated.max(1)
        });

        let allocated = self.counters.borrow().bytes - self.bytes_at_collection.get();
        let over_threshold = self
            .threshold
            .map_or(false, |threshold| allocated >= threshold);

        near_limit || over_threshold
    }

    /// Allocation size including header
    fn alloc_size_of(object_size: usize) -> Option<usize> {
        object_size
            .checked_add(size_of::<AllocHeader>())
            .filter(|size| *size <= MAX_ALLOC_SIZE)
            .map(align_up)
    }

    fn find_space(&self, alloc_size: usize, size_class: SizeClass) -> Result<NonNull<u8>, HeapError> {
        // SAFETY: no reference into the state outlives this call and
        // reservations are never made re-entrantly
        let state = unsafe { &mut *self.state.get() };
        match size_class {
            SizeClass::Large => state.lob(alloc_size, self.limit),
            SizeClass::Medium if state.head.is_some() && alloc_size > state.head_hole_size() => {
                state.bump_overflow(alloc_size, self.limit)
            }
            _ => state.bump_head(alloc_size, self.limit),
        }
    }

    /// Overwrite abandoned memory so accidental use is obvious
    fn poison(&self, reservation: &Reservation) {
        if cfg!(debug_assertions) {
            // SAFETY: the reservation owns `size` bytes of object area
            // which nothing references
            unsafe {
                std::ptr::write_bytes(reservation.object().as_ptr(), 0xbb, reservation.size())
            }
        }
    }

    // GC functions

    /// Reset all region marks ready for a fresh trace
    pub fn reset_region_marks(&self) {
        // SAFETY: no reservation is in progress during a collection
        unsafe { &mut *self.state.get() }.reset_region_marks();
    }

    /// Check whether an object is marked
    pub fn is_marked(&self, object: NonNull<u8>) -> bool {
        let header = self.get_header(object);
        // SAFETY: object is a committed allocation
        unsafe { (*header.as_ptr()).is_marked(self.mark_state()) }
    }

    /// Mark an object as live, along with the lines it occupies
    pub fn mark_object(&self, object: NonNull<u8>) {
        let mark_state = self.mark_state();
        let header = self.get_header(object);
        // SAFETY: object is a committed allocation so its header is
        // valid and nothing else touches headers during the trace
        let (large, length) = unsafe {
            let header = &mut *header.as_ptr();
            debug_assert!(header.is_committed());
            header.mark(mark_state);
            (header.is_large(), header.length() as usize)
        };
        if !large {
            // SAFETY: as for reset_region_marks
            unsafe { &mut *self.state.get() }.mark_region(header.cast(), length);
        }
    }

    /// Reclaim everything left unmarked by the trace
    pub fn sweep(&self) {
        let mark_state = self.mark_state();
        // SAFETY: as for reset_region_marks
        unsafe { &mut *self.state.get() }.sweep(mark_state);
    }

    /// Complete a collection cycle: flip the mark state and
    /// invalidate any outstanding reservation
    pub fn finish_collection(&self) {
        self.mark_state.set(!self.mark_state.get());
        self.advance_epoch();
        let mut counters = self.counters.borrow_mut();
        counters.collections += 1;
        self.bytes_at_collection.set(counters.bytes);
    }
}

impl Allocator for Heap {
    fn reserve(&self, tag: Tag, size_bytes: usize) -> Result<Reservation, HeapError> {
        let alloc_size =
            Self::alloc_size_of(size_bytes).ok_or(HeapError::InvalidAllocationSize {
                requested: size_bytes,
                max: MAX_ALLOC_SIZE,
            })?;
        let size_class = SizeClass::for_size(alloc_size);
        let space = self.find_space(alloc_size, size_class)?;

        let header = match size_class {
            SizeClass::Large => AllocHeader::new_large(alloc_size as u32, self.mark_state()),
            _ => AllocHeader::new(alloc_size as u32, self.mark_state()),
        };

        // SAFETY: find_space returned alloc_size writeable bytes
        unsafe {
            write(space.as_ptr() as *mut AllocHeader, header);
            let object = NonNull::new_unchecked(space.as_ptr().add(size_of::<AllocHeader>()));
            Ok(Reservation::new(object, tag, size_bytes, self.epoch()))
        }
    }

    fn commit(&self, reservation: &Reservation) -> bool {
        let pending = self.injected_failures.get();
        if pending > 0 {
            self.injected_failures.set(pending - 1);
            self.advance_epoch();
        }

        if reservation.epoch() != self.epoch() {
            self.poison(reservation);
            self.counters.borrow_mut().commit_failures += 1;
            return false;
        }

        let header = self.get_header(reservation.object());
        // SAFETY: reservation was produced by this heap and its header
        // is valid
        let length = unsafe {
            let header = &mut *header.as_ptr();
            header.commit();
            header.length()
        };

        let mut counters = self.counters.borrow_mut();
        counters.objects[reservation.tag() as usize] += 1;
        counters.bytes += length as u64;
        true
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::eval::memory::object::Fixnum;

    fn reserve_fixnum(heap: &Heap, value: i64) -> Reservation {
        let reservation = heap.reserve(Tag::Fixnum, size_of::<Fixnum>()).unwrap();
        unsafe {
            write(
                reservation.object().as_ptr() as *mut Fixnum,
                Fixnum {
                    tag: Tag::Fixnum,
                    value,
                },
            );
        }
        reservation
    }

    #[test]
    pub fn test_reservation_is_preceded_by_uncommitted_header() {
        let heap = Heap::new();
        let reservation = reserve_fixnum(&heap, 99);

        let header_ptr = heap.get_header(reservation.object());
        let difference = reservation.object().as_ptr() as usize - header_ptr.as_ptr() as usize;
        assert_eq!(difference, size_of::<AllocHeader>());
        assert_eq!(reservation.object().as_ptr() as usize % size_of::<usize>(), 0);

        unsafe {
            assert!(!(*header_ptr.as_ptr()).is_committed());
            assert!(!(*header_ptr.as_ptr()).is_marked(heap.mark_state()));
        }

        assert!(heap.commit(&reservation));
        unsafe {
            assert!((*header_ptr.as_ptr()).is_committed());
        }
        assert_eq!(heap.counters().objects_of(Tag::Fixnum), 1);
    }

    #[test]
    pub fn test_injected_failure_invalidates_reservation() {
        let heap = Heap::new();
        heap.inject_commit_failures(2);

        let first = reserve_fixnum(&heap, 1);
        assert!(!heap.commit(&first));
        let second = reserve_fixnum(&heap, 2);
        assert!(!heap.commit(&second));
        let third = reserve_fixnum(&heap, 3);
        assert!(heap.commit(&third));

        let counters = heap.counters();
        assert_eq!(counters.commit_failures, 2);
        assert_eq!(counters.objects_of(Tag::Fixnum), 1);
    }

    #[test]
    pub fn test_stale_epoch_fails_commit() {
        let heap = Heap::new();
        let reservation = reserve_fixnum(&heap, 1);
        heap.finish_collection();
        assert!(!heap.commit(&reservation));
    }

    #[test]
    pub fn test_several_blocks() {
        let heap = Heap::new();
        for i in 0..32000 {
            let reservation = reserve_fixnum(&heap, i);
            assert!(heap.commit(&reservation));
        }
        assert!(heap.stats().blocks_allocated > 1);
    }

    #[test]
    pub fn test_large_object_block() {
        let heap = Heap::new();
        let reservation = heap.reserve(Tag::Vector, 64 * 1024).unwrap();
        let header = heap.get_header(reservation.object());
        unsafe {
            assert!((*header.as_ptr()).is_large());
        }
        assert_eq!(heap.stats().lobs_allocated, 1);
        assert_eq!(heap.stats().blocks_allocated, 0);
    }

    #[test]
    pub fn test_medium_object_uses_overflow() {
        let heap = Heap::new();
        // first opens the head block, second does not fit its hole
        heap.reserve(Tag::Vector, 20 * 1024).unwrap();
        heap.reserve(Tag::Vector, 20 * 1024).unwrap();
        assert_eq!(heap.stats().blocks_allocated, 2);
        // small objects continue in the head block
        reserve_fixnum(&heap, 0);
        assert_eq!(heap.stats().blocks_allocated, 2);
        // a small medium object still fits the head's hole
        heap.reserve(Tag::Vector, 4 * 1024).unwrap();
        assert_eq!(heap.stats().blocks_allocated, 2);
        // another large medium object needs a fresh overflow block
        heap.reserve(Tag::Vector, 20 * 1024).unwrap();
        assert_eq!(heap.stats().blocks_allocated, 3);
    }

    #[test]
    pub fn test_limit_produces_out_of_memory() {
        let heap = Heap::with_limit(1);
        let mut result = Ok(());
        for i in 0..100_000 {
            match heap.reserve(Tag::Fixnum, size_of::<Fixnum>()) {
                Ok(reservation) => {
                    unsafe {
                        write(
                            reservation.object().as_ptr() as *mut Fixnum,
                            Fixnum {
                                tag: Tag::Fixnum,
                                value: i,
                            },
                        )
                    };
                    heap.commit(&reservation);
                }
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        assert!(matches!(result, Err(HeapError::OutOfMemory { .. })));
    }

    #[test]
    pub fn test_oversized_request_is_invalid() {
        let heap = Heap::new();
        assert!(matches!(
            heap.reserve(Tag::Vector, MAX_ALLOC_SIZE),
            Err(HeapError::InvalidAllocationSize { .. })
        ));
    }

    #[test]
    pub fn test_threshold_policy() {
        let heap = Heap::new().with_threshold(1);
        assert!(!heap.policy_requires_collection());
        // headers take each allocation past 16 bytes
        for i in 0..(1_048_576 / 16) {
            let reservation = reserve_fixnum(&heap, i);
            assert!(heap.commit(&reservation));
        }
        assert!(heap.policy_requires_collection());
        heap.finish_collection();
        assert!(!heap.policy_requires_collection());
    }

    #[test]
    pub fn test_no_policy_without_limit_or_threshold() {
        let heap = Heap::new();
        for i in 0..10_000 {
            let reservation = reserve_fixnum(&heap, i);
            heap.commit(&reservation);
        }
        assert!(!heap.policy_requires_collection());
    }
}
