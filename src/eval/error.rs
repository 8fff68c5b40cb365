//! Execution errors
use std::io;

use codespan::Span;
use codespan_reporting::diagnostic::{Diagnostic, Label};
use thiserror::Error;

use crate::syntax::error::SyntaxError;

use super::{intrinsics::Arity, memory::heap::HeapError, memory::object::Tag};

/// Errors raised while evaluating
///
/// Errors carry rendered text rather than object references so that
/// they remain meaningful after the objects involved are collected.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("allocation failed: {0}")]
    OutOfMemory(#[from] HeapError),
    #[error("unbound symbol {0}")]
    UnboundSymbol(String),
    #[error("malformed operand tree: {0}")]
    MalformedOperandTree(String),
    #[error("{0} is not a combiner")]
    NotCombinable(String),
    #[error("{combiner}: expected {expected}, found {found}")]
    TypeMismatch {
        combiner: String,
        expected: &'static str,
        found: Tag,
    },
    #[error("{combiner}: expected {expected} operands, found {found}")]
    ArityMismatch {
        combiner: String,
        expected: Arity,
        found: usize,
    },
    #[error("{combiner}: index {index} out of bounds for vector of length {length}")]
    IndexOutOfBounds {
        combiner: String,
        index: i64,
        length: usize,
    },
    #[error("{0}: arithmetic overflow")]
    ArithmeticOverflow(String),
    #[error("evaluation exceeded the maximum depth of {0}")]
    RecursionLimit(usize),
    #[error("port {0} is not open for {1}")]
    PortUnavailable(usize, &'static str),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ExecutionError {
    /// Construct a type mismatch for the named combiner
    pub fn type_mismatch(combiner: &str, expected: &'static str, found: Tag) -> Self {
        ExecutionError::TypeMismatch {
            combiner: combiner.to_string(),
            expected,
            found,
        }
    }

    /// Fatal errors end the session rather than just the current
    /// evaluation
    pub fn is_fatal(&self) -> bool {
        match self {
            ExecutionError::Syntax(e) => e.is_fatal(),
            _ => false,
        }
    }

    /// Convert to a diagnostic, optionally labelling the span of the
    /// top-level form in which the error occurred
    pub fn to_diagnostic(&self, file_id: usize, span: Option<Span>) -> Diagnostic<usize> {
        let diagnostic = Diagnostic::error().with_message(self.to_string());
        match span {
            Some(span) => diagnostic.with_labels(vec![
                Label::primary(file_id, span).with_message("while evaluating this form")
            ]),
            None => diagnostic,
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_messages() {
        assert_eq!(
            ExecutionError::UnboundSymbol("foo".to_string()).to_string(),
            "unbound symbol foo"
        );
        assert_eq!(
            ExecutionError::type_mismatch("car", "pair", Tag::Fixnum).to_string(),
            "car: expected pair, found integer"
        );
        assert_eq!(
            ExecutionError::ArityMismatch {
                combiner: "cons".to_string(),
                expected: Arity::Exact(2),
                found: 3
            }
            .to_string(),
            "cons: expected 2 operands, found 3"
        );
    }

    #[test]
    pub fn test_only_end_of_stream_is_fatal() {
        assert!(!ExecutionError::RecursionLimit(10).is_fatal());
        assert!(ExecutionError::from(SyntaxError::UnexpectedEndOfStream(Span::initial())).is_fatal());
        assert!(
            !ExecutionError::from(SyntaxError::UnexpectedCloseParen(Span::initial())).is_fatal()
        );
    }
}
