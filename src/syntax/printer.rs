//! Render heap objects as text

use std::{
    collections::HashSet,
    io::{self, Write},
};

use itertools::Itertools;
use pretty::{DocAllocator, DocBuilder, RcAllocator};

use crate::eval::{
    intrinsics,
    memory::{alloc::MutatorScope, object::Obj, object::Tag},
};

/// Width used when output must stay on one line
pub const COMPACT_WIDTH: usize = 1_000_000;

/// Nesting beyond which structure is elided
const MAX_NESTING: usize = 64;

/// Objects printed before the remainder is elided
const MAX_NODES: usize = 10_000;

/// Escape a string for printing in its read syntax
fn quote(text: &str) -> String {
    let escaped = text
        .chars()
        .map(|c| match c {
            '"' => "\\\"".to_string(),
            '\\' => "\\\\".to_string(),
            '\n' => "\\n".to_string(),
            '\t' => "\\t".to_string(),
            c => c.to_string(),
        })
        .join("");
    format!("\"{}\"", escaped)
}

/// Text for objects which print as a single token
fn atom(guard: &dyn MutatorScope, obj: Obj) -> Option<String> {
    let text = match obj.tag() {
        Tag::Nil => "()".to_string(),
        Tag::Inert => "#inert".to_string(),
        Tag::Ignore => "#ignore".to_string(),
        Tag::Boolean => match obj.boolean(guard)?.value() {
            true => "#t".to_string(),
            false => "#f".to_string(),
        },
        Tag::Fixnum => obj.fixnum(guard)?.value().to_string(),
        Tag::String => quote(obj.string(guard)?.as_str()),
        Tag::Symbol => obj.symbol_name(guard)?.to_string(),
        Tag::Applicative => "#[applicative]".to_string(),
        Tag::Operative => "#[operative]".to_string(),
        Tag::Primitive => {
            let index = obj.primitive(guard)?.index();
            format!("#[primitive {}]", intrinsics::intrinsic(index).name())
        }
        Tag::Environment => "#[environment]".to_string(),
        Tag::Package => {
            let name = obj.package(guard)?.name();
            format!("#[package {}]", name.string(guard)?.as_str())
        }
        Tag::Port => format!("#[port {}]", obj.port(guard)?.index()),
        Tag::Pair | Tag::Vector => return None,
    };
    Some(text)
}

/// Builds the document for an object graph
///
/// A compound object met again while it is still being printed is
/// elided rather than followed, as is everything once the node budget
/// is spent, so shared and self-referencing structure terminates.
struct Printer<'g, 'b> {
    guard: &'g dyn MutatorScope,
    allocator: &'b RcAllocator,
    /// Compound objects enclosing the current one
    active: HashSet<Obj>,
    /// Nodes remaining
    budget: usize,
}

impl<'g, 'b> Printer<'g, 'b> {
    fn new(guard: &'g dyn MutatorScope, allocator: &'b RcAllocator) -> Self {
        Printer {
            guard,
            allocator,
            active: HashSet::new(),
            budget: MAX_NODES,
        }
    }

    fn elision(&self) -> DocBuilder<'b, RcAllocator> {
        self.allocator.text("...")
    }

    fn doc(&mut self, obj: Obj, nesting: usize) -> DocBuilder<'b, RcAllocator> {
        if self.budget == 0 {
            return self.elision();
        }
        self.budget -= 1;

        if let Some(text) = atom(self.guard, obj) {
            return self.allocator.text(text);
        }

        if nesting >= MAX_NESTING || !self.active.insert(obj) {
            return self.elision();
        }

        let guard = self.guard;
        let doc = if obj.is(Tag::Pair) {
            self.list(obj, nesting)
        } else if let Some(vector) = obj.vector(guard) {
            let items = vector
                .iter()
                .map(|item| self.doc(item, nesting + 1))
                .collect();
            sequence(self.allocator, "#(", items)
        } else {
            self.allocator.text(format!("#[{}]", obj.tag()))
        };

        self.active.remove(&obj);
        doc
    }

    /// A list starting at the pair `obj`, which is already active
    fn list(&mut self, obj: Obj, nesting: usize) -> DocBuilder<'b, RcAllocator> {
        let guard = self.guard;
        let mut items = vec![];
        let mut spine = vec![];
        let mut next = obj;

        while let Some(pair) = next.pair(guard) {
            items.push(self.doc(pair.car(), nesting + 1));
            next = pair.cdr();
            if next.is(Tag::Nil) {
                break;
            }
            if !next.is(Tag::Pair) {
                items.push(self.allocator.text("."));
                items.push(self.doc(next, nesting + 1));
                break;
            }
            if self.budget == 0 || !self.active.insert(next) {
                items.push(self.elision());
                break;
            }
            self.budget -= 1;
            spine.push(next);
        }

        for pair in spine {
            self.active.remove(&pair);
        }
        sequence(self.allocator, "(", items)
    }
}

/// Bracketed items which break onto aligned lines when too wide
fn sequence<'b>(
    allocator: &'b RcAllocator,
    open: &'static str,
    items: Vec<DocBuilder<'b, RcAllocator>>,
) -> DocBuilder<'b, RcAllocator> {
    allocator
        .text(open)
        .append(allocator.intersperse(items, allocator.line()).align())
        .append(allocator.text(")"))
        .group()
}

/// Write the printed representation of `obj` laid out within `width`
pub fn write(
    guard: &dyn MutatorScope,
    obj: Obj,
    width: usize,
    out: &mut dyn Write,
) -> io::Result<()> {
    let allocator = RcAllocator;
    let doc = Printer::new(guard, &allocator).doc(obj, 0);
    let result = doc.1.render(width, out);
    result
}

/// Render `obj` as a string laid out within `width`
pub fn render(guard: &dyn MutatorScope, obj: Obj, width: usize) -> String {
    let mut w = Vec::new();
    match write(guard, obj, width, &mut w) {
        Ok(()) => String::from_utf8_lossy(&w).into_owned(),
        Err(_) => format!("#[{}]", obj.tag()),
    }
}

/// Render `obj` on a single line, as for diagnostics
pub fn render_compact(guard: &dyn MutatorScope, obj: Obj) -> String {
    render(guard, obj, COMPACT_WIDTH)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::eval::memory::{
        heap::Heap,
        loader::load,
        mutator::{Constants, MutatorHeapView, ObjectBuilder},
        symbol::make_package,
    };
    use crate::syntax::reader::Reader;

    fn round_trip(text: &str, width: usize) -> String {
        let heap = Heap::new();
        let view = MutatorHeapView::new(&heap);
        let constants = Constants::allocate(&view).unwrap();
        let package = make_package(&view, "test", 11, constants.nil).unwrap();
        let datum = Reader::from_text("test", text).read().unwrap().unwrap();
        let obj = load(&view, &constants, package, &datum).unwrap();
        render(&view, obj, width)
    }

    #[test]
    pub fn test_atoms() {
        assert_eq!(round_trip("()", 80), "()");
        assert_eq!(round_trip("#t", 80), "#t");
        assert_eq!(round_trip("#ignore", 80), "#ignore");
        assert_eq!(round_trip("-42", 80), "-42");
        assert_eq!(round_trip("\"a\\\"b\\n\"", 80), "\"a\\\"b\\n\"");
        assert_eq!(round_trip("vector-set!", 80), "vector-set!");
    }

    #[test]
    pub fn test_lists() {
        assert_eq!(round_trip("(a (b c) . d)", 80), "(a (b c) . d)");
        assert_eq!(round_trip("(a . (b . ()))", 80), "(a b)");
    }

    #[test]
    pub fn test_narrow_layout_breaks_lines() {
        assert_eq!(round_trip("(alpha beta gamma)", 8), "(alpha\n beta\n gamma)");
    }

    #[test]
    pub fn test_opaque_objects() {
        let heap = Heap::new();
        let view = MutatorHeapView::new(&heap);
        let constants = Constants::allocate(&view).unwrap();
        let car = view
            .make_primitive(intrinsics::index("car").unwrap())
            .unwrap();
        assert_eq!(render_compact(&view, car), "#[primitive car]");
        let app = view.make_applicative(car).unwrap();
        assert_eq!(render_compact(&view, app), "#[applicative]");
        let env = view.make_environment(constants.nil, constants.nil).unwrap();
        assert_eq!(render_compact(&view, env), "#[environment]");
        let port = view.make_port(2).unwrap();
        assert_eq!(render_compact(&view, port), "#[port 2]");
        let package = make_package(&view, "user", 3, constants.nil).unwrap();
        assert_eq!(render_compact(&view, package), "#[package user]");
    }

    #[test]
    pub fn test_vectors_and_self_reference() {
        let heap = Heap::new();
        let view = MutatorHeapView::new(&heap);
        let constants = Constants::allocate(&view).unwrap();
        let v = view.make_vector(2, constants.inert).unwrap();
        assert_eq!(render_compact(&view, v), "#(#inert #inert)");
        v.vector(&view).unwrap().set(0, v);
        assert_eq!(render_compact(&view, v), "#(... #inert)");
    }

    #[test]
    pub fn test_vector_holding_itself_twice() {
        let heap = Heap::new();
        let view = MutatorHeapView::new(&heap);
        let constants = Constants::allocate(&view).unwrap();
        let v = view.make_vector(2, constants.inert).unwrap();
        let vector = v.vector(&view).unwrap();
        vector.set(0, v);
        vector.set(1, v);
        assert_eq!(render_compact(&view, v), "#(... ...)");

        let outer = view.make_vector(2, v).unwrap();
        assert_eq!(render_compact(&view, outer), "#(#(... ...) #(... ...))");
    }

    #[test]
    pub fn test_deeply_shared_structure_is_bounded() {
        let heap = Heap::new();
        let view = MutatorHeapView::new(&heap);
        let constants = Constants::allocate(&view).unwrap();
        let mut v = view.make_vector(2, constants.inert).unwrap();
        for _ in 0..40 {
            v = view.make_vector(2, v).unwrap();
        }
        let text = render_compact(&view, v);
        assert!(text.ends_with("... ...)"));
        assert!(text.matches("#inert").count() < MAX_NODES);
    }

    #[test]
    pub fn test_list_sharing_is_not_a_cycle() {
        assert_eq!(round_trip("((a b) (a b))", 80), "((a b) (a b))");
    }
}
