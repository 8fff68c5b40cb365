extern crate codespan;
extern crate codespan_reporting;
extern crate indexmap;
extern crate itertools;
extern crate pretty;
extern crate regex;
extern crate structopt;
extern crate thiserror;
extern crate unic_ucd_category;
#[macro_use]
extern crate lazy_static;

pub mod driver;
pub mod eval;
pub mod syntax;
