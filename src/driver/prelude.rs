//! The prelude, baked into the executable

use crate::{
    eval::{error::ExecutionError, machine::vm::Machine},
    syntax::reader::Reader,
};

pub const PRELUDE: &str = include_str!("../../lib/prelude.bk");

/// Evaluate every form of the prelude in the root environment
pub fn load_prelude(machine: &mut Machine) -> Result<(), ExecutionError> {
    let mut reader = Reader::from_text("prelude", PRELUDE);
    while let Some(datum) = reader.read()? {
        machine.evaluate_datum(&datum)?;
    }
    Ok(())
}
