//! Support mutator access to heap and machine

use std::{cell::Cell, mem::size_of, ptr::write};

use crate::eval::error::ExecutionError;

use super::{
    alloc::{AllocationPoint, MutatorScope},
    bump::MAX_ALLOC_SIZE,
    heap::{Heap, HeapError},
    object::{
        Applicative, Boolean, Constant, Environment, Fixnum, Obj, Operative, Package, Pair, Port,
        Primitive, Str, Symbol, Tag, Vector,
    },
};

/// A view onto the heap for code that needs mutator access (as
/// opposed to collector access)
///
/// MutatorHeapView provides a scope for dereferencing objects and
/// the means of allocation through the reserve / commit protocol.
#[derive(Copy, Clone)]
pub struct MutatorHeapView<'guard> {
    heap: &'guard Heap,
}

impl MutatorScope for MutatorHeapView<'_> {}

impl<'guard> MutatorHeapView<'guard> {
    pub fn new(heap: &'guard Heap) -> Self {
        MutatorHeapView { heap }
    }

    pub fn heap(&self) -> &'guard Heap {
        self.heap
    }

    /// The allocation point for objects of variant `tag`
    pub fn allocation_point(&self, tag: Tag) -> AllocationPoint<'guard, Heap> {
        AllocationPoint::new(self.heap, tag)
    }

    /// Allocate a fixed size layout built by `init`
    fn fixed<T, F>(&self, tag: Tag, init: F) -> Result<Obj, ExecutionError>
    where
        F: Fn() -> T,
    {
        Ok(self
            .allocation_point(tag)
            .allocate(size_of::<T>(), |addr| {
                // SAFETY: the reservation holds at least size_of::<T>()
                // aligned bytes
                unsafe { write(addr.as_ptr() as *mut T, init()) }
            })?)
    }

    /// Allocate a list of `items` terminated by `tail`
    pub fn list(&self, items: &[Obj], tail: Obj) -> Result<Obj, ExecutionError> {
        items
            .iter()
            .rev()
            .try_fold(tail, |acc, item| self.make_pair(*item, acc))
    }
}

/// Constructors for every object variant, each following the
/// reserve / initialise / commit protocol
pub trait ObjectBuilder {
    /// `()`, `#inert` or `#ignore`
    fn make_constant(&self, tag: Tag) -> Result<Obj, ExecutionError>;

    fn make_boolean(&self, value: bool) -> Result<Obj, ExecutionError>;

    fn make_fixnum(&self, value: i64) -> Result<Obj, ExecutionError>;

    fn make_string(&self, text: &str) -> Result<Obj, ExecutionError>;

    /// An uninterned symbol named by string object `name`
    fn make_symbol(&self, name: Obj) -> Result<Obj, ExecutionError>;

    fn make_pair(&self, car: Obj, cdr: Obj) -> Result<Obj, ExecutionError>;

    fn make_applicative(&self, underlying: Obj) -> Result<Obj, ExecutionError>;

    fn make_operative(
        &self,
        arg: Obj,
        earg: Obj,
        env: Obj,
        body: Obj,
    ) -> Result<Obj, ExecutionError>;

    fn make_primitive(&self, index: usize) -> Result<Obj, ExecutionError>;

    /// A vector of `length` slots, every one holding `fill`
    fn make_vector(&self, length: usize, fill: Obj) -> Result<Obj, ExecutionError>;

    fn make_environment(&self, bindings: Obj, parent: Obj) -> Result<Obj, ExecutionError>;

    fn make_package(&self, name: Obj, buckets: Obj) -> Result<Obj, ExecutionError>;

    fn make_port(&self, index: usize) -> Result<Obj, ExecutionError>;
}

impl ObjectBuilder for MutatorHeapView<'_> {
    fn make_constant(&self, tag: Tag) -> Result<Obj, ExecutionError> {
        debug_assert!(matches!(tag, Tag::Nil | Tag::Inert | Tag::Ignore));
        self.fixed(tag, || Constant { tag })
    }

    fn make_boolean(&self, value: bool) -> Result<Obj, ExecutionError> {
        self.fixed(Tag::Boolean, || Boolean {
            tag: Tag::Boolean,
            value,
        })
    }

    fn make_fixnum(&self, value: i64) -> Result<Obj, ExecutionError> {
        self.fixed(Tag::Fixnum, || Fixnum {
            tag: Tag::Fixnum,
            value,
        })
    }

    fn make_string(&self, text: &str) -> Result<Obj, ExecutionError> {
        let length = text.len();
        Ok(self
            .allocation_point(Tag::String)
            .allocate(Str::size_for(length), |addr| {
                // SAFETY: reservation holds the header and `length`
                // bytes of text
                unsafe {
                    write(
                        addr.as_ptr() as *mut Str,
                        Str {
                            tag: Tag::String,
                            length,
                            data: [],
                        },
                    );
                    let data = addr.as_ptr().add(std::mem::offset_of!(Str, data));
                    std::ptr::copy_nonoverlapping(text.as_ptr(), data, length);
                }
            })?)
    }

    fn make_symbol(&self, name: Obj) -> Result<Obj, ExecutionError> {
        debug_assert!(name.is(Tag::String));
        self.fixed(Tag::Symbol, || Symbol {
            tag: Tag::Symbol,
            name,
        })
    }

    fn make_pair(&self, car: Obj, cdr: Obj) -> Result<Obj, ExecutionError> {
        self.fixed(Tag::Pair, || Pair {
            tag: Tag::Pair,
            car: Cell::new(car),
            cdr: Cell::new(cdr),
        })
    }

    fn make_applicative(&self, underlying: Obj) -> Result<Obj, ExecutionError> {
        debug_assert!(underlying.is_combiner());
        self.fixed(Tag::Applicative, || Applicative {
            tag: Tag::Applicative,
            underlying,
        })
    }

    fn make_operative(
        &self,
        arg: Obj,
        earg: Obj,
        env: Obj,
        body: Obj,
    ) -> Result<Obj, ExecutionError> {
        debug_assert!(env.is(Tag::Environment));
        self.fixed(Tag::Operative, || Operative {
            tag: Tag::Operative,
            arg,
            earg,
            env,
            body,
        })
    }

    fn make_primitive(&self, index: usize) -> Result<Obj, ExecutionError> {
        self.fixed(Tag::Primitive, || Primitive {
            tag: Tag::Primitive,
            index,
        })
    }

    fn make_vector(&self, length: usize, fill: Obj) -> Result<Obj, ExecutionError> {
        let size = Vector::size_for(length).ok_or(HeapError::InvalidAllocationSize {
            requested: usize::MAX,
            max: MAX_ALLOC_SIZE,
        })?;
        Ok(self
            .allocation_point(Tag::Vector)
            .allocate(size, |addr| {
                // SAFETY: reservation holds the header and `length`
                // aligned slots
                unsafe {
                    write(
                        addr.as_ptr() as *mut Vector,
                        Vector {
                            tag: Tag::Vector,
                            length,
                            data: [],
                        },
                    );
                    let slots =
                        addr.as_ptr().add(std::mem::offset_of!(Vector, data)) as *mut Cell<Obj>;
                    for i in 0..length {
                        write(slots.add(i), Cell::new(fill));
                    }
                }
            })?)
    }

    fn make_environment(&self, bindings: Obj, parent: Obj) -> Result<Obj, ExecutionError> {
        self.fixed(Tag::Environment, || Environment {
            tag: Tag::Environment,
            bindings: Cell::new(bindings),
            parent,
        })
    }

    fn make_package(&self, name: Obj, buckets: Obj) -> Result<Obj, ExecutionError> {
        self.fixed(Tag::Package, || Package {
            tag: Tag::Package,
            name,
            buckets,
            count: Cell::new(0),
        })
    }

    fn make_port(&self, index: usize) -> Result<Obj, ExecutionError> {
        self.fixed(Tag::Port, || Port {
            tag: Tag::Port,
            index,
        })
    }
}

/// The singleton constants every machine allocates at start up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constants {
    pub nil: Obj,
    pub inert: Obj,
    pub ignore: Obj,
    pub t: Obj,
    pub f: Obj,
}

impl Constants {
    pub fn allocate(view: &MutatorHeapView) -> Result<Self, ExecutionError> {
        Ok(Constants {
            nil: view.make_constant(Tag::Nil)?,
            inert: view.make_constant(Tag::Inert)?,
            ignore: view.make_constant(Tag::Ignore)?,
            t: view.make_boolean(true)?,
            f: view.make_boolean(false)?,
        })
    }

    pub fn boolean(&self, value: bool) -> Obj {
        if value {
            self.t
        } else {
            self.f
        }
    }

    /// As roots for collection
    pub fn roots(&self) -> [Obj; 5] {
        [self.nil, self.inert, self.ignore, self.t, self.f]
    }
}

/// Code which runs with mutator access to the heap
pub trait Mutator: Sized {
    type Input;
    type Output;

    fn run(
        &self,
        view: &MutatorHeapView,
        input: Self::Input,
    ) -> Result<Self::Output, ExecutionError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_make_vector_fills_every_slot() {
        let heap = Heap::new();
        let view = MutatorHeapView::new(&heap);
        let constants = Constants::allocate(&view).unwrap();

        let vector = view.make_vector(3, constants.nil).unwrap();
        let v = vector.vector(&view).unwrap();
        assert_eq!(v.len(), 3);
        assert!(v.iter().all(|slot| slot == constants.nil));
        assert_eq!(v.get(3), None);
    }

    #[test]
    pub fn test_empty_vector() {
        let heap = Heap::new();
        let view = MutatorHeapView::new(&heap);
        let constants = Constants::allocate(&view).unwrap();
        let vector = view.make_vector(0, constants.nil).unwrap();
        assert!(vector.vector(&view).unwrap().is_empty());
    }

    #[test]
    pub fn test_large_vector_is_fully_initialised() {
        let heap = Heap::new();
        let view = MutatorHeapView::new(&heap);
        let constants = Constants::allocate(&view).unwrap();

        let vector = view.make_vector(10_000, constants.t).unwrap();
        let v = vector.vector(&view).unwrap();
        assert_eq!(v.len(), 10_000);
        assert!(v.iter().all(|slot| slot == constants.t));
        assert_eq!(heap.stats().lobs_allocated, 1);
    }

    #[test]
    pub fn test_objects_initialised_under_commit_failures() {
        let heap = Heap::new();
        let view = MutatorHeapView::new(&heap);
        let constants = Constants::allocate(&view).unwrap();
        let one = view.make_fixnum(1).unwrap();
        let two = view.make_fixnum(2).unwrap();
        let env = view.make_environment(constants.nil, constants.nil).unwrap();

        heap.inject_commit_failures(3);
        let pair = view.make_pair(one, two).unwrap();
        let p = pair.pair(&view).unwrap();
        assert_eq!(p.car(), one);
        assert_eq!(p.cdr(), two);

        heap.inject_commit_failures(2);
        let operative = view
            .make_operative(pair, constants.ignore, env, constants.nil)
            .unwrap();
        let op = operative.operative(&view).unwrap();
        assert_eq!(op.arg(), pair);
        assert_eq!(op.earg(), constants.ignore);
        assert_eq!(op.env(), env);
        assert_eq!(op.body(), constants.nil);

        heap.inject_commit_failures(1);
        let applicative = view.make_applicative(operative).unwrap();
        assert_eq!(
            applicative.applicative(&view).unwrap().underlying(),
            operative
        );

        heap.inject_commit_failures(4);
        let vector = view.make_vector(5, two).unwrap();
        assert!(vector.vector(&view).unwrap().iter().all(|slot| slot == two));

        heap.inject_commit_failures(1);
        let text = view.make_string("héllo").unwrap();
        assert_eq!(text.string(&view).unwrap().as_str(), "héllo");

        assert_eq!(heap.counters().commit_failures, 11);
    }

    #[test]
    pub fn test_list() {
        let heap = Heap::new();
        let view = MutatorHeapView::new(&heap);
        let constants = Constants::allocate(&view).unwrap();
        let items: Vec<Obj> = (0..3).map(|i| view.make_fixnum(i).unwrap()).collect();
        let list = view.list(&items, constants.nil).unwrap();

        let mut cell = list;
        let mut values = vec![];
        while let Some(pair) = cell.pair(&view) {
            values.push(pair.car().fixnum(&view).unwrap().value());
            cell = pair.cdr();
        }
        assert_eq!(values, vec![0, 1, 2]);
        assert_eq!(cell, constants.nil);
    }

    #[test]
    pub fn test_constants_are_distinct() {
        let heap = Heap::new();
        let view = MutatorHeapView::new(&heap);
        let constants = Constants::allocate(&view).unwrap();
        assert_eq!(constants.nil.tag(), Tag::Nil);
        assert_eq!(constants.inert.tag(), Tag::Inert);
        assert_eq!(constants.ignore.tag(), Tag::Ignore);
        assert!(constants.t.boolean(&view).unwrap().value());
        assert!(!constants.f.boolean(&view).unwrap().value());
        assert_eq!(constants.boolean(true), constants.t);
    }
}
