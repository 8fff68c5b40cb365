//! Intrinsics for integer arithmetic

use crate::eval::{
    error::ExecutionError,
    intrinsics::Arity,
    machine::{
        intrinsic::{Builtin, Step},
        vm::Evaluator,
    },
    memory::object::Obj,
};

use super::support::{int_arg, machine_return_bool, machine_return_int};

/// All arguments as integers
fn int_args(machine: &Evaluator, name: &str, args: &[Obj]) -> Result<Vec<i64>, ExecutionError> {
    args.iter()
        .map(|arg| int_arg(machine, name, *arg))
        .collect()
}

/// Fold integer arguments with a checked operation
fn fold(
    machine: &Evaluator,
    name: &str,
    init: i64,
    args: &[i64],
    op: fn(i64, i64) -> Option<i64>,
) -> Result<Step, ExecutionError> {
    let total = args
        .iter()
        .try_fold(init, |acc, n| op(acc, *n))
        .ok_or_else(|| ExecutionError::ArithmeticOverflow(name.to_string()))?;
    machine_return_int(machine, total)
}

/// (+ . integers)
pub struct Add;

impl Builtin for Add {
    fn name(&self) -> &str {
        "+"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        _env: Obj,
    ) -> Result<Step, ExecutionError> {
        let ns = int_args(machine, self.name(), args)?;
        fold(machine, self.name(), 0, &ns, i64::checked_add)
    }
}

/// (- n . integers) - negation with one argument, otherwise
/// subtraction of the rest from the first
pub struct Sub;

impl Builtin for Sub {
    fn name(&self) -> &str {
        "-"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        _env: Obj,
    ) -> Result<Step, ExecutionError> {
        let ns = int_args(machine, self.name(), args)?;
        match ns.as_slice() {
            [n] => {
                let negated = n
                    .checked_neg()
                    .ok_or_else(|| ExecutionError::ArithmeticOverflow(self.name().to_string()))?;
                machine_return_int(machine, negated)
            }
            [first, rest @ ..] => fold(machine, self.name(), *first, rest, i64::checked_sub),
            [] => Err(ExecutionError::ArityMismatch {
                combiner: self.name().to_string(),
                expected: Arity::AtLeast(1),
                found: 0,
            }),
        }
    }
}

/// (* . integers)
pub struct Mul;

impl Builtin for Mul {
    fn name(&self) -> &str {
        "*"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        _env: Obj,
    ) -> Result<Step, ExecutionError> {
        let ns = int_args(machine, self.name(), args)?;
        fold(machine, self.name(), 1, &ns, i64::checked_mul)
    }
}

/// (< a b)
pub struct Lt;

impl Builtin for Lt {
    fn name(&self) -> &str {
        "<"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        _env: Obj,
    ) -> Result<Step, ExecutionError> {
        let x = int_arg(machine, self.name(), args[0])?;
        let y = int_arg(machine, self.name(), args[1])?;
        machine_return_bool(machine, x < y)
    }
}

/// (= a b)
pub struct NumEq;

impl Builtin for NumEq {
    fn name(&self) -> &str {
        "="
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        _env: Obj,
    ) -> Result<Step, ExecutionError> {
        let x = int_arg(machine, self.name(), args[0])?;
        let y = int_arg(machine, self.name(), args[1])?;
        machine_return_bool(machine, x == y)
    }
}

#[cfg(test)]
pub mod tests {
    use crate::eval::builtins::tests::{evaluate, evaluate_err};
    use crate::eval::error::ExecutionError;

    #[test]
    pub fn test_arithmetic() {
        assert_eq!(evaluate("(+)"), "0");
        assert_eq!(evaluate("(+ 1 2 3)"), "6");
        assert_eq!(evaluate("(- 5)"), "-5");
        assert_eq!(evaluate("(- 10 1 2)"), "7");
        assert_eq!(evaluate("(* 2 3 4)"), "24");
        assert_eq!(evaluate("(*)"), "1");
    }

    #[test]
    pub fn test_comparison() {
        assert_eq!(evaluate("(< 1 2)"), "#t");
        assert_eq!(evaluate("(< 2 1)"), "#f");
        assert_eq!(evaluate("(= 2 2)"), "#t");
    }

    #[test]
    pub fn test_overflow() {
        assert!(matches!(
            evaluate_err("(* 9223372036854775807 2)"),
            ExecutionError::ArithmeticOverflow(_)
        ));
        assert!(matches!(
            evaluate_err("(- -9223372036854775808)"),
            ExecutionError::ArithmeticOverflow(_)
        ));
    }

    #[test]
    pub fn test_type_mismatch() {
        assert!(matches!(
            evaluate_err("(+ 1 #t)"),
            ExecutionError::TypeMismatch { .. }
        ));
    }
}
