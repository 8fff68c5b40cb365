//! The environment store
//!
//! An environment is a frame of bindings plus an optional parent. A
//! frame's bindings are an association list of `(symbol . value)`
//! pairs; definition either mutates an existing binding in place or
//! conses a new one onto the front of the frame's own list, so
//! parents are never affected.

use std::collections::HashSet;

use crate::{
    eval::{
        error::ExecutionError,
        memory::{
            mutator::{MutatorHeapView, ObjectBuilder},
            object::{Obj, Tag},
        },
    },
    syntax::printer::render_compact,
};

/// Operations on environments in the heap
pub trait EnvBuilder {
    /// A new empty frame whose parent is `parent` (or `()` for none)
    fn extend(&self, parent: Obj, bindings: Obj) -> Result<Obj, ExecutionError>;

    /// Bind `symbol` in `env`'s own frame, replacing any existing
    /// binding in that frame
    fn define(&self, env: Obj, symbol: Obj, value: Obj) -> Result<(), ExecutionError>;

    /// The innermost binding of `symbol` visible from `env`
    fn lookup(&self, env: Obj, symbol: Obj) -> Result<Obj, ExecutionError>;

    /// Match `operands` against the parameter tree `pattern`, defining
    /// each symbol of the pattern in `env`
    fn bind(&self, env: Obj, pattern: Obj, operands: Obj) -> Result<(), ExecutionError>;
}

impl<'guard> MutatorHeapView<'guard> {
    /// The binding pair for `symbol` in the frame `env` alone
    fn binding_in_frame(&self, env: Obj, symbol: Obj) -> Result<Option<Obj>, ExecutionError> {
        let frame = env
            .environment(self)
            .ok_or_else(|| ExecutionError::type_mismatch("lookup", "environment", env.tag()))?;

        let mut next = frame.bindings();
        while let Some(cell) = next.pair(self) {
            let binding = cell.car();
            if let Some(entry) = binding.pair(self) {
                if entry.car() == symbol {
                    return Ok(Some(binding));
                }
            }
            next = cell.cdr();
        }
        Ok(None)
    }

    fn mismatch(&self, pattern: Obj, operands: Obj) -> ExecutionError {
        ExecutionError::MalformedOperandTree(format!(
            "{} does not match {}",
            render_compact(self, operands),
            render_compact(self, pattern)
        ))
    }
}

impl<'guard> EnvBuilder for MutatorHeapView<'guard> {
    fn extend(&self, parent: Obj, bindings: Obj) -> Result<Obj, ExecutionError> {
        self.make_environment(bindings, parent)
    }

    fn define(&self, env: Obj, symbol: Obj, value: Obj) -> Result<(), ExecutionError> {
        if !symbol.is(Tag::Symbol) {
            return Err(ExecutionError::type_mismatch(
                "define",
                "symbol",
                symbol.tag(),
            ));
        }

        if let Some(binding) = self.binding_in_frame(env, symbol)? {
            if let Some(entry) = binding.pair(self) {
                entry.set_cdr(value);
                return Ok(());
            }
        }

        let frame = env
            .environment(self)
            .ok_or_else(|| ExecutionError::type_mismatch("define", "environment", env.tag()))?;
        let binding = self.make_pair(symbol, value)?;
        let bindings = self.make_pair(binding, frame.bindings())?;
        frame.set_bindings(bindings);
        Ok(())
    }

    fn lookup(&self, env: Obj, symbol: Obj) -> Result<Obj, ExecutionError> {
        let mut current = env;
        while !current.is(Tag::Nil) {
            if let Some(binding) = self.binding_in_frame(current, symbol)? {
                if let Some(entry) = binding.pair(self) {
                    return Ok(entry.cdr());
                }
            }
            current = current
                .environment(self)
                .map(|frame| frame.parent())
                .ok_or_else(|| {
                    ExecutionError::type_mismatch("lookup", "environment", current.tag())
                })?;
        }
        Err(ExecutionError::UnboundSymbol(render_compact(self, symbol)))
    }

    fn bind(&self, env: Obj, pattern: Obj, operands: Obj) -> Result<(), ExecutionError> {
        let mut pattern = pattern;
        let mut operands = operands;
        loop {
            match pattern.tag() {
                Tag::Symbol => return self.define(env, pattern, operands),
                Tag::Ignore => return Ok(()),
                Tag::Nil if operands.is(Tag::Nil) => return Ok(()),
                Tag::Pair => match (pattern.pair(self), operands.pair(self)) {
                    (Some(p), Some(o)) => {
                        self.bind(env, p.car(), o.car())?;
                        pattern = p.cdr();
                        operands = o.cdr();
                    }
                    _ => return Err(self.mismatch(pattern, operands)),
                },
                _ => return Err(self.mismatch(pattern, operands)),
            }
        }
    }
}

/// Check a parameter tree is built only from symbols, `#ignore` and
/// (proper or dotted) lists and that no symbol occurs twice
pub fn validate_pattern(view: &MutatorHeapView, pattern: Obj) -> Result<(), ExecutionError> {
    let mut seen = HashSet::new();
    validate_subpattern(view, pattern, &mut seen)
}

/// Check an environment parameter, which may only be a symbol not
/// already bound by the parameter tree, or `#ignore`
pub fn validate_environment_parameter(
    view: &MutatorHeapView,
    pattern: Obj,
    earg: Obj,
) -> Result<(), ExecutionError> {
    match earg.tag() {
        Tag::Ignore => Ok(()),
        Tag::Symbol => {
            let mut seen = HashSet::new();
            validate_subpattern(view, pattern, &mut seen)?;
            if seen.contains(&earg) {
                Err(ExecutionError::MalformedOperandTree(format!(
                    "environment parameter {} is also an operand parameter",
                    render_compact(view, earg)
                )))
            } else {
                Ok(())
            }
        }
        _ => Err(ExecutionError::MalformedOperandTree(format!(
            "invalid environment parameter {}",
            render_compact(view, earg)
        ))),
    }
}

fn validate_subpattern(
    view: &MutatorHeapView,
    pattern: Obj,
    seen: &mut HashSet<Obj>,
) -> Result<(), ExecutionError> {
    let mut next = pattern;
    loop {
        match next.tag() {
            Tag::Nil | Tag::Ignore => return Ok(()),
            Tag::Symbol => {
                return if seen.insert(next) {
                    Ok(())
                } else {
                    Err(ExecutionError::MalformedOperandTree(format!(
                        "{} occurs more than once in {}",
                        render_compact(view, next),
                        render_compact(view, pattern)
                    )))
                }
            }
            Tag::Pair => {
                let pair = next.pair(view).ok_or_else(|| {
                    ExecutionError::type_mismatch("vau", "pair", next.tag())
                })?;
                validate_subpattern(view, pair.car(), seen)?;
                next = pair.cdr();
            }
            _ => {
                return Err(ExecutionError::MalformedOperandTree(format!(
                    "invalid parameter {} in {}",
                    render_compact(view, next),
                    render_compact(view, pattern)
                )))
            }
        }
    }
}
