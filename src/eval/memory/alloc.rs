//! The allocation protocol
//!
//! New objects are never written directly into the heap. Instead an
//! [`AllocationPoint`] obtains a provisional [`Reservation`],
//! initialises every field of the reserved memory and then asks the
//! heap to commit it. A commit fails if the heap has invalidated the
//! reservation in the meantime (a collection cycle ran) and the whole
//! reserve / initialise / commit sequence starts again from scratch.
//!
//! Only a successful commit makes an object visible to callers.

use std::{mem::size_of, ptr::NonNull};

use log::trace;

use super::{header::AllocHeader, heap::HeapError, object::Obj, object::Tag};

/// Anything that can be used as a mutator scope
pub trait MutatorScope {}

/// Required alignment of every allocation
pub const ALIGN: usize = size_of::<usize>();

/// Round `size` up to the allocation alignment
pub fn align_up(size: usize) -> usize {
    (size + (ALIGN - 1)) & !(ALIGN - 1)
}

/// Provisional memory handed out by an allocator
///
/// The memory is preceded by an uncommitted header and is not yet
/// an object.
#[derive(Debug)]
pub struct Reservation {
    /// Start of the object area (after the header)
    object: NonNull<u8>,
    /// Variant the memory is reserved for
    tag: Tag,
    /// Aligned object size requested
    size: usize,
    /// Collection epoch at the time of reservation
    epoch: u64,
}

impl Reservation {
    pub fn new(object: NonNull<u8>, tag: Tag, size: usize, epoch: u64) -> Self {
        Reservation {
            object,
            tag,
            size,
            epoch,
        }
    }

    pub fn object(&self) -> NonNull<u8> {
        self.object
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// The reservation interface a heap provides
pub trait Allocator {
    /// Reserve `size_bytes` (already aligned) of provisional memory
    /// for an object with tag `tag`
    fn reserve(&self, tag: Tag, size_bytes: usize) -> Result<Reservation, HeapError>;

    /// Attempt to make a reservation permanent
    ///
    /// Returns false if the reservation has been invalidated, in
    /// which case the memory must be abandoned.
    fn commit(&self, reservation: &Reservation) -> bool;

    /// Get header from object
    fn get_header(&self, object: NonNull<u8>) -> NonNull<AllocHeader> {
        // SAFETY: every object is preceded by its header
        unsafe { NonNull::new_unchecked(object.cast::<AllocHeader>().as_ptr().offset(-1)) }
    }
}

/// A per-variant channel through which reservations are requested
pub struct AllocationPoint<'h, A: Allocator + ?Sized> {
    allocator: &'h A,
    tag: Tag,
}

impl<'h, A: Allocator + ?Sized> AllocationPoint<'h, A> {
    pub fn new(allocator: &'h A, tag: Tag) -> Self {
        AllocationPoint { allocator, tag }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Create an object of `size` bytes, using `init` to write every
    /// field of the reserved memory
    ///
    /// `init` may run several times, once for each fresh
    /// reservation, and must not allocate.
    pub fn allocate<F>(&self, size: usize, init: F) -> Result<Obj, HeapError>
    where
        F: Fn(NonNull<u8>),
    {
        let size = align_up(size);
        loop {
            let reservation = self.allocator.reserve(self.tag, size)?;
            init(reservation.object());
            debug_assert_eq!(
                // SAFETY: init has written the layout starting with the tag
                unsafe { *reservation.object().cast::<Tag>().as_ptr() },
                self.tag
            );
            if self.allocator.commit(&reservation) {
                // SAFETY: committed memory holds a fully initialised
                // object of this point's variant
                return Ok(unsafe { Obj::from_raw(reservation.object()) });
            }
            trace!(
                "commit of {} bytes for {} failed, retrying",
                size,
                self.tag
            );
        }
    }
}
