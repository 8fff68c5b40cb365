//! Allocation and memory management for the machine
pub mod alloc;
pub mod bump;
pub mod collect;
pub mod header;
pub mod heap;
pub mod loader;
pub mod lob;
pub mod mutator;
pub mod object;
pub mod symbol;
