//! Incrementally consumed input text
//!
//! Input streams are read a line at a time and only when the lexer
//! needs more characters, so interactive input is processed as it
//! arrives. Everything read is retained so that spans remain valid
//! for diagnostics.

use std::io::{self, BufRead};

use codespan::{ByteIndex, Span};

pub struct Source {
    /// Name used in diagnostics
    name: String,
    /// Stream supplying further text
    input: Box<dyn BufRead>,
    /// All text read so far
    text: String,
    /// Set once the stream reports end of input
    exhausted: bool,
}

impl Source {
    pub fn new(name: impl Into<String>, input: Box<dyn BufRead>) -> Self {
        Source {
            name: name.into(),
            input,
            text: String::new(),
            exhausted: false,
        }
    }

    /// A source with all text available up front
    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Source {
            name: name.into(),
            input: Box::new(io::empty()),
            text: text.into(),
            exhausted: true,
        }
    }

    /// Source reading from the process's standard input
    pub fn stdin() -> Self {
        Source::new("<stdin>", Box::new(io::BufReader::new(io::stdin())))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Text consumed so far
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn slice(&self, span: Span) -> &str {
        &self.text[span.start().to_usize()..span.end().to_usize()]
    }

    /// Read lines until `index` is available, returning false if the
    /// input ends first
    fn fill_to(&mut self, index: usize) -> io::Result<bool> {
        while self.text.len() <= index && !self.exhausted {
            if self.input.read_line(&mut self.text)? == 0 {
                self.exhausted = true;
            }
        }
        Ok(index < self.text.len())
    }

    /// Character starting at `index`, or `None` at end of input
    pub fn char_at(&mut self, index: ByteIndex) -> io::Result<Option<char>> {
        let i = index.to_usize();
        if self.fill_to(i)? {
            Ok(self.text[i..].chars().next())
        } else {
            Ok(None)
        }
    }
}
