//! Collector support
//!
//! In contrast to the mutator, a collector needs facilities for
//! tracing and marking. Objects are never moved so no reference needs
//! updating; anything not reached from the roots is reclaimed by the
//! sweep.

use std::collections::VecDeque;
use std::time::Instant;

use log::debug;

use super::{heap::Heap, object::Obj};

/// Something that can be scanned for references to heap objects
pub trait GcScannable {
    /// Mark everything directly referenced, returning those objects
    /// which were not already marked and so still need scanning
    fn scan(&self, marker: &mut CollectorHeapView<'_>) -> Vec<Obj>;
}

impl GcScannable for Obj {
    fn scan(&self, marker: &mut CollectorHeapView<'_>) -> Vec<Obj> {
        let mut grey = vec![];
        self.scan_references(|child| {
            if marker.mark(child) {
                grey.push(child);
            }
        });
        grey
    }
}

impl GcScannable for [Obj] {
    fn scan(&self, marker: &mut CollectorHeapView<'_>) -> Vec<Obj> {
        self.iter().copied().filter(|obj| marker.mark(*obj)).collect()
    }
}

/// View of the heap available to the collector
pub struct CollectorHeapView<'guard> {
    heap: &'guard Heap,
}

impl<'guard> CollectorHeapView<'guard> {
    pub fn new(heap: &'guard Heap) -> Self {
        CollectorHeapView { heap }
    }

    pub fn reset(&mut self) {
        self.heap.reset_region_marks();
    }

    /// Mark object if not already marked and return whether marked
    pub fn mark(&mut self, obj: Obj) -> bool {
        if self.heap.is_marked(obj.as_ptr()) {
            false
        } else {
            self.heap.mark_object(obj.as_ptr());
            true
        }
    }

    pub fn is_marked(&self, obj: Obj) -> bool {
        self.heap.is_marked(obj.as_ptr())
    }

    pub fn sweep(&mut self) {
        self.heap.sweep();
    }

    pub fn finish(&mut self) {
        self.heap.finish_collection();
    }
}

/// Summary of one collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionReport {
    /// Objects found reachable
    pub live_objects: usize,
    /// Blocks with holes after the sweep
    pub recycled_blocks: usize,
    /// Large objects surviving
    pub large_objects: usize,
}

/// Mark everything reachable from `roots` and reclaim the rest
pub fn collect(roots: &[Obj], heap: &Heap, dump_heap: bool) -> CollectionReport {
    let start = Instant::now();
    debug!(
        "collection {} starting with {} roots",
        heap.counters().collections + 1,
        roots.len()
    );

    let mut live_objects = 0;
    {
        let mut view = CollectorHeapView::new(heap);
        view.reset();

        let mut queue: VecDeque<Obj> = roots.scan(&mut view).into();
        while let Some(obj) = queue.pop_front() {
            live_objects += 1;
            queue.extend(obj.scan(&mut view));
        }

        view.sweep();
        view.finish();
    }

    let stats = heap.stats();
    debug!(
        "collection complete in {:?}: {} live objects, {} of {} blocks recycled, {} large objects",
        start.elapsed(),
        live_objects,
        stats.recycled,
        stats.blocks_allocated,
        stats.lobs_allocated
    );

    if dump_heap {
        eprintln!("{:?}", heap);
    }

    CollectionReport {
        live_objects,
        recycled_blocks: stats.recycled,
        large_objects: stats.lobs_allocated,
    }
}
