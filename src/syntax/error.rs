use codespan::Span;
use codespan_reporting::diagnostic::{Diagnostic, Label};
use std::io;
use thiserror::Error;

/// Errors found while reading data from a character stream
#[derive(Debug, Error)]
pub enum SyntaxError {
    #[error("unexpected end of input")]
    UnexpectedEndOfStream(Span),
    #[error("unexpected character {1:?} found in input")]
    UnexpectedCharacter(Span, char),
    #[error("unexpected close parenthesis")]
    UnexpectedCloseParen(Span),
    #[error("misplaced dot")]
    InvalidDot(Span),
    #[error("invalid literal {1}")]
    InvalidLiteral(Span, String),
    #[error("invalid number literal {1}")]
    InvalidNumber(Span, String),
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),
}

impl SyntaxError {
    pub fn span(&self) -> Option<Span> {
        use self::SyntaxError::*;

        match *self {
            UnexpectedEndOfStream(s) => Some(s),
            UnexpectedCharacter(s, _) => Some(s),
            UnexpectedCloseParen(s) => Some(s),
            InvalidDot(s) => Some(s),
            InvalidLiteral(s, _) => Some(s),
            InvalidNumber(s, _) => Some(s),
            Io(_) => None,
        }
    }

    /// An exhausted or failing input stream leaves nothing sensible to
    /// resume with
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyntaxError::UnexpectedEndOfStream(_) | SyntaxError::Io(_)
        )
    }

    pub fn to_diagnostic(&self, file_id: usize) -> Diagnostic<usize> {
        let diagnostic = Diagnostic::error().with_message(format!("{}", self));
        match self.span() {
            Some(span) => diagnostic.with_labels(vec![Label::primary(file_id, span)]),
            None => diagnostic,
        }
    }
}
