pub mod builtins;
pub mod error;
pub mod intrinsics;
pub mod machine;
pub mod memory;
