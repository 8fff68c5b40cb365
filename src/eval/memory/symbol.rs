//! Symbol interning through in-heap packages
//!
//! A package is a heap object holding a vector of buckets, each
//! bucket a list of symbols whose names hash to it. Interning the
//! same text twice through the same package yields the identical
//! symbol object, so symbols can be compared by identity.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::eval::error::ExecutionError;

use super::{
    mutator::{MutatorHeapView, ObjectBuilder},
    object::Obj,
};

/// Bucket count of the standard package
pub const STANDARD_BUCKETS: usize = 100;

fn bucket_for(name: &str, buckets: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    (hasher.finish() % buckets as u64) as usize
}

/// Create an empty package with `buckets` buckets
pub fn make_package(
    view: &MutatorHeapView,
    name: &str,
    buckets: usize,
    nil: Obj,
) -> Result<Obj, ExecutionError> {
    let name = view.make_string(name)?;
    let buckets = view.make_vector(buckets.max(1), nil)?;
    view.make_package(name, buckets)
}

/// Find an existing symbol named `name` in the package
pub fn find(view: &MutatorHeapView, package: Obj, name: &str) -> Option<Obj> {
    let package = package.package(view)?;
    let buckets = package.buckets().vector(view)?;
    let mut cell = buckets.get(bucket_for(name, buckets.len()))?;
    while let Some(pair) = cell.pair(view) {
        let symbol = pair.car();
        if symbol.symbol_name(view) == Some(name) {
            return Some(symbol);
        }
        cell = pair.cdr();
    }
    None
}

/// Find the symbol named `name` or create and record a new one
pub fn find_or_intern(
    view: &MutatorHeapView,
    package: Obj,
    name: &str,
) -> Result<Obj, ExecutionError> {
    if let Some(symbol) = find(view, package, name) {
        return Ok(symbol);
    }

    let text = view.make_string(name)?;
    let symbol = view.make_symbol(text)?;

    if let Some(pkg) = package.package(view) {
        if let Some(buckets) = pkg.buckets().vector(view) {
            let index = bucket_for(name, buckets.len());
            if let Some(bucket) = buckets.get(index) {
                let extended = view.make_pair(symbol, bucket)?;
                buckets.set(index, extended);
                pkg.increment();
            }
        }
    }

    Ok(symbol)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::eval::memory::{heap::Heap, mutator::Constants};

    #[test]
    pub fn test_interning_is_identity_stable() {
        let heap = Heap::new();
        let view = MutatorHeapView::new(&heap);
        let constants = Constants::allocate(&view).unwrap();
        let package = make_package(&view, "test", 7, constants.nil).unwrap();

        let foo = find_or_intern(&view, package, "foo").unwrap();
        let bar = find_or_intern(&view, package, "bar").unwrap();
        assert_ne!(foo, bar);
        assert_eq!(find_or_intern(&view, package, "foo").unwrap(), foo);
        assert_eq!(find(&view, package, "bar"), Some(bar));
        assert_eq!(find(&view, package, "baz"), None);
        assert_eq!(foo.symbol_name(&view), Some("foo"));
        assert_eq!(package.package(&view).unwrap().count(), 2);
    }

    #[test]
    pub fn test_many_symbols_share_buckets() {
        let heap = Heap::new();
        let view = MutatorHeapView::new(&heap);
        let constants = Constants::allocate(&view).unwrap();
        let package = make_package(&view, "test", 3, constants.nil).unwrap();

        let symbols: Vec<Obj> = (0..50)
            .map(|i| find_or_intern(&view, package, &format!("s{}", i)).unwrap())
            .collect();
        for (i, symbol) in symbols.iter().enumerate() {
            assert_eq!(find(&view, package, &format!("s{}", i)), Some(*symbol));
        }
    }
}
