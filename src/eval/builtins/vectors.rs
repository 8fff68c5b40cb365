//! Intrinsics for vectors

use crate::eval::{
    error::ExecutionError,
    machine::{
        intrinsic::{Builtin, Step},
        vm::Evaluator,
    },
    memory::{
        mutator::ObjectBuilder,
        object::{Obj, Tag, Vector},
    },
};

use super::support::{index_arg, int_arg, machine_return_inert, machine_return_int};

fn vector_arg<'e>(
    machine: &'e Evaluator<'_>,
    name: &str,
    arg: Obj,
) -> Result<&'e Vector, ExecutionError> {
    arg.vector(machine)
        .ok_or_else(|| ExecutionError::type_mismatch(name, "vector", arg.tag()))
}

/// (make-vector length fill)
pub struct MakeVector;

impl Builtin for MakeVector {
    fn name(&self) -> &str {
        "make-vector"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        _env: Obj,
    ) -> Result<Step, ExecutionError> {
        let length = int_arg(machine, self.name(), args[0])?;
        let length = usize::try_from(length).map_err(|_| {
            ExecutionError::type_mismatch(self.name(), "non-negative integer", Tag::Fixnum)
        })?;
        Ok(Step::Value(machine.view().make_vector(length, args[1])?))
    }
}

/// (vector-length vector)
pub struct VectorLength;

impl Builtin for VectorLength {
    fn name(&self) -> &str {
        "vector-length"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        _env: Obj,
    ) -> Result<Step, ExecutionError> {
        let length = vector_arg(machine, self.name(), args[0])?.len();
        machine_return_int(machine, length as i64)
    }
}

/// (vector-ref vector index)
pub struct VectorRef;

impl Builtin for VectorRef {
    fn name(&self) -> &str {
        "vector-ref"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        _env: Obj,
    ) -> Result<Step, ExecutionError> {
        let vector = vector_arg(machine, self.name(), args[0])?;
        let index = index_arg(machine, self.name(), args[1], vector.len())?;
        vector
            .get(index)
            .map(Step::Value)
            .ok_or_else(|| ExecutionError::IndexOutOfBounds {
                combiner: self.name().to_string(),
                index: index as i64,
                length: vector.len(),
            })
    }
}

/// (vector-set! vector index value)
pub struct VectorSet;

impl Builtin for VectorSet {
    fn name(&self) -> &str {
        "vector-set!"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        _env: Obj,
    ) -> Result<Step, ExecutionError> {
        let vector = vector_arg(machine, self.name(), args[0])?;
        let index = index_arg(machine, self.name(), args[1], vector.len())?;
        if vector.set(index, args[2]) {
            machine_return_inert(machine)
        } else {
            Err(ExecutionError::IndexOutOfBounds {
                combiner: self.name().to_string(),
                index: index as i64,
                length: vector.len(),
            })
        }
    }
}

#[cfg(test)]
pub mod tests {
    use crate::eval::builtins::tests::{evaluate, evaluate_err};
    use crate::eval::error::ExecutionError;

    #[test]
    pub fn test_make_vector_fills() {
        assert_eq!(evaluate("(make-vector 3 #t)"), "#(#t #t #t)");
        assert_eq!(evaluate("(make-vector 0 #t)"), "#()");
        assert_eq!(evaluate("(vector-length (make-vector 5000 0))"), "5000");
    }

    #[test]
    pub fn test_ref_and_set() {
        assert_eq!(
            evaluate(
                "(sequence \
                   (define v (make-vector 2 0)) \
                   (vector-set! v 1 (quote x)) \
                   (list (vector-ref v 0) (vector-ref v 1)))"
            ),
            "(0 x)"
        );
    }

    #[test]
    pub fn test_bounds() {
        assert!(matches!(
            evaluate_err("(vector-ref (make-vector 2 0) 2)"),
            ExecutionError::IndexOutOfBounds {
                index: 2,
                length: 2,
                ..
            }
        ));
        assert!(matches!(
            evaluate_err("(vector-set! (make-vector 2 0) -1 0)"),
            ExecutionError::IndexOutOfBounds { index: -1, .. }
        ));
        assert!(matches!(
            evaluate_err("(make-vector -1 0)"),
            ExecutionError::TypeMismatch { .. }
        ));
    }
}
