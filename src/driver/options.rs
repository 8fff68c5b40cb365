//! Command line argument handling

use std::path::PathBuf;

use structopt::StructOpt;

use crate::eval::machine::vm::MachineSettings;

/// burke - a vau calculus lisp
#[derive(StructOpt, Debug, Clone)]
#[structopt(name = "burke")]
pub struct BurkeOptions {
    /// Expression to evaluate after loading any files
    #[structopt(short = "e", long = "eval")]
    pub evaluate: Option<String>,

    /// Don't load the standard prelude
    #[structopt(short = "Q", long = "no-prelude")]
    pub no_prelude: bool,

    /// Read, evaluate and print from stdin after loading files
    #[structopt(short = "i", long = "interactive")]
    pub interactive: bool,

    /// Print metrics to stderr before exiting
    #[structopt(short = "S", long = "statistics")]
    pub statistics: bool,

    /// Refuse to grow the heap beyond this many mebibytes
    #[structopt(long = "heap-limit")]
    pub heap_limit_mib: Option<usize>,

    /// Collect garbage after this many mebibytes of allocation
    #[structopt(long = "collection-threshold", default_value = "64")]
    pub collection_threshold_mib: usize,

    /// Dump heap block structure to stderr after each collection
    #[structopt(long = "dump-heap")]
    pub dump_heap: bool,

    /// Maximum nesting of non-tail evaluation
    #[structopt(long = "max-depth", default_value = "1000")]
    pub max_depth: usize,

    /// Line width for printed output
    #[structopt(long = "width", default_value = "80")]
    pub width: usize,

    /// Source files to load in order
    #[structopt(name = "FILES", parse(from_os_str))]
    pub files: Vec<PathBuf>,
}

impl BurkeOptions {
    pub fn machine_settings(&self) -> MachineSettings {
        MachineSettings {
            heap_limit_mib: self.heap_limit_mib,
            collection_threshold_mib: self.collection_threshold_mib,
            dump_heap: self.dump_heap,
            max_depth: self.max_depth,
            render_width: self.width,
        }
    }

    /// Whether to run the read-evaluate-print loop on stdin
    ///
    /// With no files and no expression there is nothing else to do.
    pub fn repl(&self) -> bool {
        self.interactive || (self.files.is_empty() && self.evaluate.is_none())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_defaults() {
        let opt = BurkeOptions::from_iter(vec!["burke"]);
        assert!(opt.repl());
        assert_eq!(opt.machine_settings(), MachineSettings::default());
    }

    #[test]
    pub fn test_files_and_settings() {
        let opt = BurkeOptions::from_iter(vec![
            "burke",
            "-Q",
            "--heap-limit",
            "16",
            "--max-depth",
            "50",
            "a.bk",
            "b.bk",
        ]);
        assert!(opt.no_prelude);
        assert!(!opt.repl());
        assert_eq!(opt.files.len(), 2);
        let settings = opt.machine_settings();
        assert_eq!(settings.heap_limit_mib, Some(16));
        assert_eq!(settings.max_depth, 50);
    }

    #[test]
    pub fn test_interactive_after_files() {
        let opt = BurkeOptions::from_iter(vec!["burke", "-i", "a.bk"]);
        assert!(opt.repl());
    }
}
