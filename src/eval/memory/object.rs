//! Runtime object representation
//!
//! Every runtime value is a heap object whose first field is its
//! [`Tag`]. Layouts are `#[repr(C)]` so that the tag can be read
//! through an untyped [`Obj`] handle before the object is viewed as
//! its specific variant. Sizes are either fixed (`size_of` the
//! layout) or, for vectors and strings, computed from a runtime
//! length.
//!
//! Objects are only mutated through a handful of operations
//! (environment frame insertion, vector element store); those fields
//! are `Cell`s and nothing else changes after creation.

use std::{cell::Cell, fmt, mem::size_of, ptr::NonNull};

use super::alloc::MutatorScope;

/// Discriminant at the start of every object
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    Nil,
    Inert,
    Ignore,
    Boolean,
    Fixnum,
    String,
    Symbol,
    Pair,
    Applicative,
    Operative,
    Primitive,
    Vector,
    Environment,
    Package,
    Port,
}

/// Number of distinct tags
pub const TAG_COUNT: usize = Tag::Port as usize + 1;

impl Tag {
    /// All tags in discriminant order
    pub const ALL: [Tag; TAG_COUNT] = [
        Tag::Nil,
        Tag::Inert,
        Tag::Ignore,
        Tag::Boolean,
        Tag::Fixnum,
        Tag::String,
        Tag::Symbol,
        Tag::Pair,
        Tag::Applicative,
        Tag::Operative,
        Tag::Primitive,
        Tag::Vector,
        Tag::Environment,
        Tag::Package,
        Tag::Port,
    ];

    /// Human readable name for diagnostics
    pub fn name(self) -> &'static str {
        match self {
            Tag::Nil => "null",
            Tag::Inert => "inert",
            Tag::Ignore => "ignore",
            Tag::Boolean => "boolean",
            Tag::Fixnum => "integer",
            Tag::String => "string",
            Tag::Symbol => "symbol",
            Tag::Pair => "pair",
            Tag::Applicative => "applicative",
            Tag::Operative => "operative",
            Tag::Primitive => "primitive",
            Tag::Vector => "vector",
            Tag::Environment => "environment",
            Tag::Package => "package",
            Tag::Port => "port",
        }
    }

    /// Fixed object size for this tag, `None` for variable sized
    /// variants
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Tag::Nil | Tag::Inert | Tag::Ignore => Some(size_of::<Constant>()),
            Tag::Boolean => Some(size_of::<Boolean>()),
            Tag::Fixnum => Some(size_of::<Fixnum>()),
            Tag::Symbol => Some(size_of::<Symbol>()),
            Tag::Pair => Some(size_of::<Pair>()),
            Tag::Applicative => Some(size_of::<Applicative>()),
            Tag::Operative => Some(size_of::<Operative>()),
            Tag::Primitive => Some(size_of::<Primitive>()),
            Tag::Environment => Some(size_of::<Environment>()),
            Tag::Package => Some(size_of::<Package>()),
            Tag::Port => Some(size_of::<Port>()),
            Tag::String | Tag::Vector => None,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An untyped reference to a committed heap object
///
/// Equality is identity (`eq?`).
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Obj(NonNull<Tag>);

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:p}", self.tag(), self.0)
    }
}

macro_rules! downcast {
    ($method:ident, $tag:path, $layout:ty) => {
        pub fn $method<'g>(self, _guard: &'g dyn MutatorScope) -> Option<&'g $layout> {
            if self.tag() == $tag {
                // SAFETY: tag identifies the layout; the guard keeps
                // the heap borrowed so no collection can run
                Some(unsafe { &*(self.0.as_ptr() as *const $layout) })
            } else {
                None
            }
        }
    };
}

impl Obj {
    /// Wrap the address of an object whose tag has been written
    ///
    /// # Safety
    ///
    /// `ptr` must point at a fully initialised object layout.
    pub(crate) unsafe fn from_raw(ptr: NonNull<u8>) -> Obj {
        Obj(ptr.cast())
    }

    /// Address of the object (immediately after its header)
    pub fn as_ptr(self) -> NonNull<u8> {
        self.0.cast()
    }

    /// The object's tag
    pub fn tag(self) -> Tag {
        // SAFETY: every Obj addresses an initialised layout whose
        // first field is a Tag
        unsafe { *self.0.as_ptr() }
    }

    pub fn is(self, tag: Tag) -> bool {
        self.tag() == tag
    }

    /// Can this object appear in combiner position?
    pub fn is_combiner(self) -> bool {
        matches!(
            self.tag(),
            Tag::Applicative | Tag::Operative | Tag::Primitive
        )
    }

    downcast!(boolean, Tag::Boolean, Boolean);
    downcast!(fixnum, Tag::Fixnum, Fixnum);
    downcast!(string, Tag::String, Str);
    downcast!(symbol, Tag::Symbol, Symbol);
    downcast!(pair, Tag::Pair, Pair);
    downcast!(applicative, Tag::Applicative, Applicative);
    downcast!(operative, Tag::Operative, Operative);
    downcast!(primitive, Tag::Primitive, Primitive);
    downcast!(vector, Tag::Vector, Vector);
    downcast!(environment, Tag::Environment, Environment);
    downcast!(package, Tag::Package, Package);
    downcast!(port, Tag::Port, Port);

    /// Name text of a symbol
    pub fn symbol_name<'g>(self, guard: &'g dyn MutatorScope) -> Option<&'g str> {
        self.symbol(guard)
            .and_then(|s| s.name().string(guard))
            .map(|s| s.as_str())
    }

    /// Visit every object reference held in this object's fields
    ///
    /// Used by the collector which holds the heap exclusively.
    pub(crate) fn scan_references(self, mut visit: impl FnMut(Obj)) {
        // SAFETY: only committed objects reachable from roots are
        // scanned and the tag identifies the layout
        unsafe {
            let ptr = self.0.as_ptr();
            match self.tag() {
                Tag::Nil
                | Tag::Inert
                | Tag::Ignore
                | Tag::Boolean
                | Tag::Fixnum
                | Tag::String
                | Tag::Primitive
                | Tag::Port => {}
                Tag::Symbol => visit((*(ptr as *const Symbol)).name),
                Tag::Pair => {
                    let pair = &*(ptr as *const Pair);
                    visit(pair.car());
                    visit(pair.cdr());
                }
                Tag::Applicative => visit((*(ptr as *const Applicative)).underlying),
                Tag::Operative => {
                    let op = &*(ptr as *const Operative);
                    visit(op.arg);
                    visit(op.earg);
                    visit(op.env);
                    visit(op.body);
                }
                Tag::Vector => {
                    for item in (*(ptr as *const Vector)).iter() {
                        visit(item);
                    }
                }
                Tag::Environment => {
                    let env = &*(ptr as *const Environment);
                    visit(env.bindings());
                    visit(env.parent);
                }
                Tag::Package => {
                    let package = &*(ptr as *const Package);
                    visit(package.name);
                    visit(package.buckets);
                }
            }
        }
    }
}

/// `()`, `#inert` and `#ignore`
#[repr(C)]
pub struct Constant {
    pub(crate) tag: Tag,
}

/// `#t` / `#f`
#[repr(C)]
pub struct Boolean {
    pub(crate) tag: Tag,
    pub(crate) value: bool,
}

impl Boolean {
    pub fn value(&self) -> bool {
        self.value
    }
}

/// Machine integer
#[repr(C)]
pub struct Fixnum {
    pub(crate) tag: Tag,
    pub(crate) value: i64,
}

impl Fixnum {
    pub fn value(&self) -> i64 {
        self.value
    }
}

/// Immutable UTF-8 text stored inline after the length
#[repr(C)]
pub struct Str {
    pub(crate) tag: Tag,
    pub(crate) length: usize,
    pub(crate) data: [u8; 0],
}

impl Str {
    /// Object size for `length` bytes of text
    pub fn size_for(length: usize) -> usize {
        std::mem::offset_of!(Str, data) + length
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn as_str(&self) -> &str {
        // SAFETY: bytes were copied from a &str at creation and are
        // never mutated
        unsafe {
            let bytes = std::slice::from_raw_parts(self.data.as_ptr(), self.length);
            std::str::from_utf8_unchecked(bytes)
        }
    }
}

/// Interned name
#[repr(C)]
pub struct Symbol {
    pub(crate) tag: Tag,
    pub(crate) name: Obj,
}

impl Symbol {
    pub fn name(&self) -> Obj {
        self.name
    }
}

/// Cons cell
#[repr(C)]
pub struct Pair {
    pub(crate) tag: Tag,
    pub(crate) car: Cell<Obj>,
    pub(crate) cdr: Cell<Obj>,
}

impl Pair {
    pub fn car(&self) -> Obj {
        self.car.get()
    }

    pub fn cdr(&self) -> Obj {
        self.cdr.get()
    }

    /// Replace the cdr (used to overwrite environment bindings)
    pub(crate) fn set_cdr(&self, value: Obj) {
        self.cdr.set(value)
    }
}

/// Combiner which evaluates its operands before passing them on
#[repr(C)]
pub struct Applicative {
    pub(crate) tag: Tag,
    pub(crate) underlying: Obj,
}

impl Applicative {
    pub fn underlying(&self) -> Obj {
        self.underlying
    }
}

/// Compound operative (fexpr) created by `vau`
#[repr(C)]
pub struct Operative {
    pub(crate) tag: Tag,
    pub(crate) arg: Obj,
    pub(crate) earg: Obj,
    pub(crate) env: Obj,
    pub(crate) body: Obj,
}

impl Operative {
    /// Parameter pattern
    pub fn arg(&self) -> Obj {
        self.arg
    }

    /// Symbol (or `#ignore`) bound to the dynamic environment
    pub fn earg(&self) -> Obj {
        self.earg
    }

    /// Static environment
    pub fn env(&self) -> Obj {
        self.env
    }

    /// List of body expressions
    pub fn body(&self) -> Obj {
        self.body
    }
}

/// Operative implemented natively, identified by its index in the
/// intrinsic catalogue
#[repr(C)]
pub struct Primitive {
    pub(crate) tag: Tag,
    pub(crate) index: usize,
}

impl Primitive {
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Fixed length, mutable sequence stored inline after the length
#[repr(C)]
pub struct Vector {
    pub(crate) tag: Tag,
    pub(crate) length: usize,
    pub(crate) data: [Cell<Obj>; 0],
}

impl Vector {
    /// Object size for `length` slots
    pub fn size_for(length: usize) -> Option<usize> {
        length
            .checked_mul(size_of::<Obj>())
            .and_then(|slots| slots.checked_add(std::mem::offset_of!(Vector, data)))
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    fn slots(&self) -> &[Cell<Obj>] {
        // SAFETY: all `length` slots are initialised before commit
        unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.length) }
    }

    pub fn get(&self, index: usize) -> Option<Obj> {
        self.slots().get(index).map(Cell::get)
    }

    /// Store into a slot, returning false if out of bounds
    pub fn set(&self, index: usize, value: Obj) -> bool {
        match self.slots().get(index) {
            Some(slot) => {
                slot.set(value);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Obj> + '_ {
        self.slots().iter().map(Cell::get)
    }
}

/// A frame of bindings: an association list of `(symbol . value)`
/// pairs and a parent environment (or `()` at the root)
#[repr(C)]
pub struct Environment {
    pub(crate) tag: Tag,
    pub(crate) bindings: Cell<Obj>,
    pub(crate) parent: Obj,
}

impl Environment {
    pub fn bindings(&self) -> Obj {
        self.bindings.get()
    }

    pub(crate) fn set_bindings(&self, bindings: Obj) {
        self.bindings.set(bindings)
    }

    pub fn parent(&self) -> Obj {
        self.parent
    }
}

/// Symbol table: a vector of buckets, each a list of symbols
#[repr(C)]
pub struct Package {
    pub(crate) tag: Tag,
    pub(crate) name: Obj,
    pub(crate) buckets: Obj,
    pub(crate) count: Cell<usize>,
}

impl Package {
    pub fn name(&self) -> Obj {
        self.name
    }

    pub fn buckets(&self) -> Obj {
        self.buckets
    }

    /// Number of interned symbols
    pub fn count(&self) -> usize {
        self.count.get()
    }

    pub(crate) fn increment(&self) {
        self.count.set(self.count.get() + 1)
    }
}

/// Opaque handle onto a stream in the machine's port table
#[repr(C)]
pub struct Port {
    pub(crate) tag: Tag,
    pub(crate) index: usize,
}

impl Port {
    pub fn index(&self) -> usize {
        self.index
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_tag_is_first_field() {
        assert_eq!(std::mem::offset_of!(Pair, tag), 0);
        assert_eq!(std::mem::offset_of!(Vector, tag), 0);
        assert_eq!(std::mem::offset_of!(Operative, tag), 0);
        assert_eq!(std::mem::offset_of!(Str, tag), 0);
    }

    #[test]
    pub fn test_vector_size() {
        let header = std::mem::offset_of!(Vector, data);
        assert_eq!(Vector::size_for(0), Some(header));
        assert_eq!(Vector::size_for(3), Some(header + 3 * size_of::<Obj>()));
        assert_eq!(Vector::size_for(usize::MAX), None);
    }

    #[test]
    pub fn test_fixed_sizes() {
        assert_eq!(Tag::Pair.fixed_size(), Some(3 * size_of::<usize>()));
        assert_eq!(Tag::Operative.fixed_size(), Some(5 * size_of::<usize>()));
        assert_eq!(Tag::Vector.fixed_size(), None);
        assert_eq!(Tag::String.fixed_size(), None);
    }

    #[test]
    pub fn test_tag_order() {
        for (i, tag) in Tag::ALL.iter().enumerate() {
            assert_eq!(*tag as usize, i);
        }
    }
}
