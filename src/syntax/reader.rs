//! Reader: assembles tokens into data
//!
//! The reader produces [`Datum`] trees which live outside the heap;
//! they are loaded into heap objects separately.

use codespan::{ByteIndex, Span};

use super::{
    error::SyntaxError,
    lexer::{Lexer, Spanned, Token},
    source::Source,
};

/// A datum as read, with its source location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datum {
    Integer(Span, i64),
    String(Span, String),
    Symbol(Span, String),
    Boolean(Span, bool),
    Inert(Span),
    Ignore(Span),
    /// Proper list when the tail is `None`, `()` when also empty
    List(Span, Vec<Datum>, Option<Box<Datum>>),
}

impl Datum {
    pub fn span(&self) -> Span {
        match self {
            Datum::Integer(s, _)
            | Datum::String(s, _)
            | Datum::Symbol(s, _)
            | Datum::Boolean(s, _)
            | Datum::Inert(s)
            | Datum::Ignore(s)
            | Datum::List(s, _, _) => *s,
        }
    }
}

/// Reads successive data from a source
pub struct Reader {
    lexer: Lexer,
}

impl Reader {
    pub fn new(source: Source) -> Self {
        Reader {
            lexer: Lexer::new(source),
        }
    }

    pub fn from_text(name: &str, text: &str) -> Self {
        Reader::new(Source::from_text(name, text))
    }

    pub fn source(&self) -> &Source {
        self.lexer.source()
    }

    /// Read the next datum, `None` at a clean end of input
    ///
    /// After a recoverable error the rest of the offending line is
    /// discarded so that reading can resume.
    pub fn read(&mut self) -> Result<Option<Datum>, SyntaxError> {
        let result = match self.lexer.next_token() {
            Ok(Some(token)) => self.datum(token).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            if !e.is_fatal() {
                self.lexer.skip_line()?;
            }
        }

        result
    }

    /// Next token where end of input is an error
    fn next_required(&mut self, start: ByteIndex) -> Result<Spanned, SyntaxError> {
        self.lexer.next_token()?.ok_or_else(|| {
            SyntaxError::UnexpectedEndOfStream(Span::new(start, self.lexer.location()))
        })
    }

    fn datum(&mut self, (i, token, e): Spanned) -> Result<Datum, SyntaxError> {
        let span = Span::new(i, e);
        match token {
            Token::OpenParen => self.list(i),
            Token::CloseParen => Err(SyntaxError::UnexpectedCloseParen(span)),
            Token::Dot => Err(SyntaxError::InvalidDot(span)),
            Token::Integer(text) => text
                .parse::<i64>()
                .map(|n| Datum::Integer(span, n))
                .map_err(|_| SyntaxError::InvalidNumber(span, text)),
            Token::String(text) => Ok(Datum::String(span, text)),
            Token::Symbol(name) => Ok(Datum::Symbol(span, name)),
            Token::Hash(name) => match name.as_str() {
                "t" => Ok(Datum::Boolean(span, true)),
                "f" => Ok(Datum::Boolean(span, false)),
                "inert" => Ok(Datum::Inert(span)),
                "ignore" => Ok(Datum::Ignore(span)),
                _ => Err(SyntaxError::InvalidLiteral(span, format!("#{}", name))),
            },
        }
    }

    /// Read the remainder of a list after its open paren
    fn list(&mut self, start: ByteIndex) -> Result<Datum, SyntaxError> {
        let mut items = vec![];
        loop {
            let (i, token, e) = self.next_required(start)?;
            match token {
                Token::CloseParen => return Ok(Datum::List(Span::new(start, e), items, None)),
                Token::Dot if items.is_empty() => {
                    return Err(SyntaxError::InvalidDot(Span::new(i, e)))
                }
                Token::Dot => {
                    let next = self.next_required(start)?;
                    let tail = self.datum(next)?;
                    let (ci, close, ce) = self.next_required(start)?;
                    return if close == Token::CloseParen {
                        Ok(Datum::List(
                            Span::new(start, ce),
                            items,
                            Some(Box::new(tail)),
                        ))
                    } else {
                        Err(SyntaxError::InvalidDot(Span::new(ci, ce)))
                    };
                }
                token => items.push(self.datum((i, token, e))?),
            }
        }
    }
}
