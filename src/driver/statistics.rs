//! Capture and report statistics for optimisation

use std::{fmt::Display, time::Duration};

use indexmap::IndexMap;

#[derive(Default, Debug)]
pub struct Timings {
    timings: IndexMap<String, Duration>,
}

impl Timings {
    /// Record a timing, accumulating if the name is already present
    pub fn record<T: AsRef<str>>(&mut self, name: T, elapsed: Duration) {
        *self
            .timings
            .entry(name.as_ref().to_string())
            .or_insert(Duration::ZERO) += elapsed;
    }

    pub fn get<T: AsRef<str>>(&self, name: T) -> Option<Duration> {
        self.timings.get(name.as_ref()).copied()
    }
}

impl Display for Timings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = self.timings.keys().map(|k| k.len()).max().unwrap_or(0) + 1;

        for (k, v) in &self.timings {
            writeln!(f, "{:width$}: {:14.9}s", k, v.as_secs_f64(), width = width)?;
        }
        Ok(())
    }
}

/// The statistics captured during a run
#[derive(Default, Debug)]
pub struct Statistics {
    machine_ticks: u64,
    machine_allocs: u64,
    machine_max_depth: usize,
    collections: usize,
    blocks_allocated: usize,
    timings: Timings,
}

impl Statistics {
    pub fn set_ticks(&mut self, ticks: u64) {
        self.machine_ticks = ticks;
    }

    pub fn set_allocs(&mut self, allocs: u64) {
        self.machine_allocs = allocs;
    }

    pub fn set_max_depth(&mut self, depth: usize) {
        self.machine_max_depth = depth;
    }

    pub fn set_collections(&mut self, collections: usize) {
        self.collections = collections;
    }

    pub fn set_blocks_allocated(&mut self, blocks: usize) {
        self.blocks_allocated = blocks;
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn timings_mut(&mut self) -> &mut Timings {
        &mut self.timings
    }
}

impl Display for Statistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Machine Ticks     : {:10}", self.machine_ticks)?;
        writeln!(f, "Machine Allocs    : {:10}", self.machine_allocs)?;
        writeln!(f, "Machine Max Depth : {:10}", self.machine_max_depth)?;
        writeln!(f, "GC Collections    : {:10}", self.collections)?;
        writeln!(f, "Heap Blocks       : {:10}", self.blocks_allocated)?;
        writeln!(f)?;
        writeln!(f, "{}", self.timings)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_timings_accumulate() {
        let mut timings = Timings::default();
        timings.record("evaluate", Duration::from_millis(2));
        timings.record("evaluate", Duration::from_millis(3));
        assert_eq!(timings.get("evaluate"), Some(Duration::from_millis(5)));
        assert!(timings.to_string().starts_with("evaluate"));
    }

    #[test]
    pub fn test_empty_display() {
        let stats = Statistics::default();
        assert!(stats.to_string().contains("Machine Ticks"));
    }
}
