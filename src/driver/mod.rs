//! Command line driver: options, error reporting and the
//! read-evaluate-print loop
pub mod error;
pub mod eval;
pub mod options;
pub mod prelude;
pub mod statistics;
