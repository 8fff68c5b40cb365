//! Intrinsics for pairs, lists and type predicates

use crate::eval::{
    error::ExecutionError,
    machine::{
        intrinsic::{Builtin, Step},
        vm::Evaluator,
    },
    memory::{
        mutator::ObjectBuilder,
        object::{Obj, Tag},
    },
};

use super::support::machine_return_bool;

/// (cons a b)
pub struct Cons;

impl Builtin for Cons {
    fn name(&self) -> &str {
        "cons"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        _env: Obj,
    ) -> Result<Step, ExecutionError> {
        Ok(Step::Value(machine.view().make_pair(args[0], args[1])?))
    }
}

/// (car pair)
pub struct Car;

impl Builtin for Car {
    fn name(&self) -> &str {
        "car"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        _env: Obj,
    ) -> Result<Step, ExecutionError> {
        args[0]
            .pair(&machine.view())
            .map(|p| Step::Value(p.car()))
            .ok_or_else(|| ExecutionError::type_mismatch(self.name(), "pair", args[0].tag()))
    }
}

/// (cdr pair)
pub struct Cdr;

impl Builtin for Cdr {
    fn name(&self) -> &str {
        "cdr"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        _env: Obj,
    ) -> Result<Step, ExecutionError> {
        args[0]
            .pair(&machine.view())
            .map(|p| Step::Value(p.cdr()))
            .ok_or_else(|| ExecutionError::type_mismatch(self.name(), "pair", args[0].tag()))
    }
}

/// (list . items) - the (evaluated) operand list itself
pub struct List;

impl Builtin for List {
    fn name(&self) -> &str {
        "list"
    }

    fn execute(
        &self,
        _machine: &mut Evaluator<'_>,
        operands: Obj,
        _args: &[Obj],
        _env: Obj,
    ) -> Result<Step, ExecutionError> {
        Ok(Step::Value(operands))
    }
}

/// (eq? a b) - identity, except that integers compare by value
pub struct EqP;

impl Builtin for EqP {
    fn name(&self) -> &str {
        "eq?"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        _env: Obj,
    ) -> Result<Step, ExecutionError> {
        let view = machine.view();
        let same = args[0] == args[1]
            || matches!(
                (args[0].fixnum(&view), args[1].fixnum(&view)),
                (Some(a), Some(b)) if a.value() == b.value()
            );
        machine_return_bool(machine, same)
    }
}

/// Defines a builtin testing its single argument against a predicate
/// on tags
macro_rules! tag_predicate {
    ($builtin:ident, $name:literal, $test:expr) => {
        pub struct $builtin;

        impl Builtin for $builtin {
            fn name(&self) -> &str {
                $name
            }

            fn execute(
                &self,
                machine: &mut Evaluator<'_>,
                _operands: Obj,
                args: &[Obj],
                _env: Obj,
            ) -> Result<Step, ExecutionError> {
                let test: fn(Tag) -> bool = $test;
                machine_return_bool(machine, test(args[0].tag()))
            }
        }
    };
}

tag_predicate!(NullP, "null?", |t| t == Tag::Nil);
tag_predicate!(PairP, "pair?", |t| t == Tag::Pair);
tag_predicate!(SymbolP, "symbol?", |t| t == Tag::Symbol);
tag_predicate!(OperativeP, "operative?", |t| matches!(
    t,
    Tag::Operative | Tag::Primitive
));
tag_predicate!(ApplicativeP, "applicative?", |t| t == Tag::Applicative);
