//! Argument checking and return helpers for builtins

use crate::eval::{
    error::ExecutionError,
    machine::{intrinsic::Step, vm::Evaluator},
    memory::{
        mutator::ObjectBuilder,
        object::{Obj, Tag},
    },
};

/// Extract an integer argument
pub fn int_arg(machine: &Evaluator, name: &str, arg: Obj) -> Result<i64, ExecutionError> {
    arg.fixnum(&machine.view())
        .map(|n| n.value())
        .ok_or_else(|| ExecutionError::type_mismatch(name, "integer", arg.tag()))
}

/// Extract an integer argument as an index into a sequence of
/// `length` elements
pub fn index_arg(
    machine: &Evaluator,
    name: &str,
    arg: Obj,
    length: usize,
) -> Result<usize, ExecutionError> {
    let index = int_arg(machine, name, arg)?;
    usize::try_from(index)
        .ok()
        .filter(|i| *i < length)
        .ok_or_else(|| ExecutionError::IndexOutOfBounds {
            combiner: name.to_string(),
            index,
            length,
        })
}

/// Check an argument is an environment
pub fn env_arg(name: &str, arg: Obj) -> Result<Obj, ExecutionError> {
    if arg.is(Tag::Environment) {
        Ok(arg)
    } else {
        Err(ExecutionError::type_mismatch(name, "environment", arg.tag()))
    }
}

/// Extract the stream index of a port argument
pub fn port_arg(machine: &Evaluator, name: &str, arg: Obj) -> Result<usize, ExecutionError> {
    arg.port(&machine.view())
        .map(|p| p.index())
        .ok_or_else(|| ExecutionError::type_mismatch(name, "port", arg.tag()))
}

pub fn machine_return_bool(machine: &Evaluator, value: bool) -> Result<Step, ExecutionError> {
    Ok(Step::Value(machine.constants().boolean(value)))
}

pub fn machine_return_int(machine: &Evaluator, value: i64) -> Result<Step, ExecutionError> {
    Ok(Step::Value(machine.view().make_fixnum(value)?))
}

pub fn machine_return_inert(machine: &Evaluator) -> Result<Step, ExecutionError> {
    Ok(Step::Value(machine.constants().inert))
}
