extern crate burke;

use std::process;

use burke::driver::options::BurkeOptions;
use burke::driver::{eval, statistics::Statistics};
use structopt::StructOpt;

pub fn main() {
    env_logger::init();
    let opt = BurkeOptions::from_args();

    let mut statistics = Statistics::default();

    // run manages error reporting
    match eval::run(&opt, &mut statistics) {
        Ok(()) => exit(&opt, 0, &statistics),
        Err(_) => exit(&opt, 1, &statistics),
    }
}

/// Optionally dump stats to stderr then exit
pub fn exit(opts: &BurkeOptions, code: i32, stats: &Statistics) {
    if opts.statistics {
        eprintln!();
        eprintln!("~~~~~~~~~~");
        eprintln!("STATISTICS");
        eprintln!("~~~~~~~~~~");
        eprintln!();
        eprintln!("{stats}");
    }
    process::exit(code)
}
