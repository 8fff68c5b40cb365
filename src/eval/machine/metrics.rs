//! Machine metrics

use std::cmp::max;

/// Record some metrics as we evaluate
#[derive(Default, Debug, Clone)]
pub struct Metrics {
    /// Combinations evaluated
    ticks: u64,
    /// Objects allocated during evaluation
    allocs: u64,
    /// Deepest nesting of evaluation reached
    max_depth: usize,
}

impl Metrics {
    pub fn tick(&mut self) {
        self.ticks += 1;
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn alloc(&mut self, count: u64) {
        self.allocs += count;
    }

    pub fn allocs(&self) -> u64 {
        self.allocs
    }

    pub fn depth(&mut self, depth: usize) {
        self.max_depth = max(self.max_depth, depth);
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}
