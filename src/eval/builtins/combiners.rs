//! Intrinsics for constructing and applying combiners

use crate::eval::{
    error::ExecutionError,
    machine::{
        env::{validate_environment_parameter, validate_pattern, EnvBuilder},
        intrinsic::{Builtin, Step},
        vm::Evaluator,
    },
    memory::{
        mutator::ObjectBuilder,
        object::{Obj, Tag},
    },
};

use super::support::{env_arg, machine_return_inert};

/// (vau ptree earg . body) - an operative closing over the current
/// environment
pub struct Vau;

impl Builtin for Vau {
    fn name(&self) -> &str {
        "vau"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        operands: Obj,
        args: &[Obj],
        env: Obj,
    ) -> Result<Step, ExecutionError> {
        let view = machine.view();
        let (ptree, earg) = (args[0], args[1]);
        validate_pattern(&view, ptree)?;
        validate_environment_parameter(&view, ptree, earg)?;

        let body = operands
            .pair(&view)
            .and_then(|p| p.cdr().pair(&view))
            .map(|p| p.cdr())
            .ok_or_else(|| ExecutionError::type_mismatch(self.name(), "pair", operands.tag()))?;

        Ok(Step::Value(view.make_operative(ptree, earg, env, body)?))
    }
}

/// (define ptree expr) - bind the value of expr in the current
/// environment
pub struct Define;

impl Builtin for Define {
    fn name(&self) -> &str {
        "define"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        env: Obj,
    ) -> Result<Step, ExecutionError> {
        let view = machine.view();
        validate_pattern(&view, args[0])?;
        let value = machine.evaluate(args[1], env)?;
        view.bind(env, args[0], value)?;
        machine_return_inert(machine)
    }
}

/// (if test consequent alternative)
pub struct If;

impl Builtin for If {
    fn name(&self) -> &str {
        "if"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        env: Obj,
    ) -> Result<Step, ExecutionError> {
        let test = machine.evaluate(args[0], env)?;
        match test.boolean(&machine.view()).map(|b| b.value()) {
            Some(true) => Ok(Step::Tail(args[1], env)),
            Some(false) => Ok(Step::Tail(args[2], env)),
            None => Err(ExecutionError::type_mismatch(
                self.name(),
                "boolean",
                test.tag(),
            )),
        }
    }
}

/// (sequence . body) - evaluate in order, returning the last
pub struct Sequence;

impl Builtin for Sequence {
    fn name(&self) -> &str {
        "sequence"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        operands: Obj,
        _args: &[Obj],
        env: Obj,
    ) -> Result<Step, ExecutionError> {
        machine.sequence(operands, env)
    }
}

/// (wrap combiner)
pub struct Wrap;

impl Builtin for Wrap {
    fn name(&self) -> &str {
        "wrap"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        _env: Obj,
    ) -> Result<Step, ExecutionError> {
        if args[0].is_combiner() {
            Ok(Step::Value(machine.view().make_applicative(args[0])?))
        } else {
            Err(ExecutionError::type_mismatch(
                self.name(),
                "combiner",
                args[0].tag(),
            ))
        }
    }
}

/// (unwrap applicative)
pub struct Unwrap;

impl Builtin for Unwrap {
    fn name(&self) -> &str {
        "unwrap"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        _env: Obj,
    ) -> Result<Step, ExecutionError> {
        args[0]
            .applicative(&machine.view())
            .map(|a| Step::Value(a.underlying()))
            .ok_or_else(|| {
                ExecutionError::type_mismatch(self.name(), "applicative", args[0].tag())
            })
    }
}

/// (eval expr env) - evaluate expr in env, in tail position
pub struct Eval;

impl Builtin for Eval {
    fn name(&self) -> &str {
        "eval"
    }

    fn execute(
        &self,
        _machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        _env: Obj,
    ) -> Result<Step, ExecutionError> {
        let env = env_arg(self.name(), args[1])?;
        Ok(Step::Tail(args[0], env))
    }
}

/// (make-environment [parent]) - a new empty environment
pub struct MakeEnvironment;

impl Builtin for MakeEnvironment {
    fn name(&self) -> &str {
        "make-environment"
    }

    fn execute(
        &self,
        machine: &mut Evaluator<'_>,
        _operands: Obj,
        args: &[Obj],
        _env: Obj,
    ) -> Result<Step, ExecutionError> {
        let nil = machine.constants().nil;
        let parent = match args.first() {
            Some(parent) => env_arg(self.name(), *parent)?,
            None => nil,
        };
        Ok(Step::Value(machine.view().extend(parent, nil)?))
    }
}
