//! Overall high-level error type for burke
use std::fmt::Display;
use std::io;

use codespan::Span;
use codespan_reporting::diagnostic::Diagnostic;
use thiserror::Error;

use crate::eval::error::ExecutionError;
use crate::syntax::error::SyntaxError;

#[derive(Debug, Error)]
pub enum BurkeError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("path {0} could not be read")]
    FileCouldNotBeRead(String),
}

fn default_diagnostic<E>(e: &E) -> Diagnostic<usize>
where
    E: Display,
{
    Diagnostic::error().with_message(format!("{}", e))
}

impl BurkeError {
    /// Convert to a diagnostic against the source `file_id`, with
    /// `span` locating the form being evaluated if known
    pub fn to_diagnostic(&self, file_id: usize, span: Option<Span>) -> Diagnostic<usize> {
        match self {
            BurkeError::Syntax(e) => e.to_diagnostic(file_id),
            // raised by a read from some port, not the current source
            BurkeError::Execution(ExecutionError::Syntax(e)) => default_diagnostic(e),
            BurkeError::Execution(e) => e.to_diagnostic(file_id, span),
            e => default_diagnostic(e),
        }
    }

    /// Fatal errors terminate the session
    pub fn is_fatal(&self) -> bool {
        match self {
            BurkeError::Syntax(e) => e.is_fatal(),
            BurkeError::Execution(e) => e.is_fatal(),
            BurkeError::Io(_) | BurkeError::FileCouldNotBeRead(_) => true,
        }
    }
}
