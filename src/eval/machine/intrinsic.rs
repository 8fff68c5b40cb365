//! Intrinsic traits

use crate::eval::{error::ExecutionError, memory::object::Obj};

use super::vm::Evaluator;

/// The result of executing a primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Evaluation is complete with this value
    Value(Obj),
    /// Continue by evaluating the expression in the environment, in
    /// tail position
    Tail(Obj, Obj),
}

/// Implementation of a primitive combiner
pub trait Builtin: Sync {
    /// The name of the intrinsic, as listed in the catalogue
    fn name(&self) -> &str;

    /// Execute the primitive
    ///
    /// `args` holds the elements of the operand list, already counted
    /// against the intrinsic's arity and already evaluated for
    /// applicatives; `operands` is the list itself. `env` is the
    /// dynamic environment of the combination.
    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        operands: Obj,
        args: &[Obj],
        env: Obj,
    ) -> Result<Step, ExecutionError>;
}
