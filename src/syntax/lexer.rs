//! Lexer for s-expressions
use codespan::{ByteIndex, ByteOffset, Span};
use regex::Regex;
use unic_ucd_category::GeneralCategory;

use super::{error::SyntaxError, source::Source};

/// Tokens of the surface syntax
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Token {
    OpenParen,
    CloseParen,
    /// A lone `.` in a dotted list
    Dot,
    Integer(String),
    /// String literal with escapes processed
    String(String),
    Symbol(String),
    /// `#` literal, text following the hash
    Hash(String),
}

/// A token with its start and end locations
pub type Spanned = (ByteIndex, Token, ByteIndex);

lazy_static! {
    static ref INTEGER: Regex = Regex::new(r"^[+-]?[0-9]+$").unwrap();
}

pub const ONE_BYTE: ByteOffset = ByteOffset(1);

/// is c a character which can appear in an atom?
fn is_atom_char(c: char) -> bool {
    match c {
        '(' | ')' | '"' | ';' => false,
        _ if c.is_whitespace() => false,
        _ => match GeneralCategory::of(c) {
            GeneralCategory::OpenPunctuation => false,
            GeneralCategory::ClosePunctuation => false,
            cat => {
                cat.is_letter() || cat.is_number() || cat.is_symbol() || cat.is_punctuation()
            }
        },
    }
}

/// is c a character which ends an atom?
fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';')
}

/// Lexer over an incrementally read source
pub struct Lexer {
    /// the source text
    source: Source,
    /// track source location as we progress
    location: ByteIndex,
}

impl Lexer {
    pub fn new(source: Source) -> Self {
        Lexer {
            source,
            location: ByteIndex(0),
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn location(&self) -> ByteIndex {
        self.location
    }

    /// peek at the next character in the stream
    fn peek(&mut self) -> Result<Option<char>, SyntaxError> {
        Ok(self.source.char_at(self.location)?)
    }

    /// move one character forward, returning index of the read char
    /// and the char
    fn bump(&mut self) -> Result<Option<(ByteIndex, char)>, SyntaxError> {
        let loc = self.location;
        match self.peek()? {
            Some(c) => {
                self.location += ByteOffset::from_char_len(c);
                Ok(Some((loc, c)))
            }
            None => Ok(None),
        }
    }

    /// consume characters matching predicate and return the next index
    fn consume<P>(&mut self, predicate: P) -> Result<ByteIndex, SyntaxError>
    where
        P: Fn(char) -> bool,
    {
        while let Some(c) = self.peek()? {
            if !predicate(c) {
                break;
            }
            self.bump()?;
        }
        Ok(self.location)
    }

    /// skip whitespace and line comments
    fn skip_atmosphere(&mut self) -> Result<(), SyntaxError> {
        loop {
            match self.peek()? {
                Some(c) if c.is_whitespace() => {
                    self.bump()?;
                }
                Some(';') => {
                    self.consume(|c| c != '\n')?;
                }
                _ => return Ok(()),
            }
        }
    }

    /// Discard everything up to and including the next newline
    pub fn skip_line(&mut self) -> Result<(), SyntaxError> {
        self.consume(|c| c != '\n')?;
        self.bump()?;
        Ok(())
    }

    /// consume an atom: integer, symbol or lone dot
    fn atom(&mut self, i: ByteIndex) -> Result<Spanned, SyntaxError> {
        let e = self.consume(|c| !is_delimiter(c))?;
        let span = Span::new(i, e);
        let text = self.source.slice(span);

        if let Some(c) = text.chars().find(|c| !is_atom_char(*c)) {
            return Err(SyntaxError::UnexpectedCharacter(span, c));
        }

        let token = if text == "." {
            Token::Dot
        } else if INTEGER.is_match(text) {
            Token::Integer(text.to_string())
        } else {
            Token::Symbol(text.to_string())
        };
        Ok((i, token, e))
    }

    /// consume a `#` literal
    fn hash(&mut self, i: ByteIndex) -> Result<Spanned, SyntaxError> {
        let e = self.consume(|c| !is_delimiter(c))?;
        let text = self.source.slice(Span::new(i + ONE_BYTE, e)).to_string();
        Ok((i, Token::Hash(text), e))
    }

    /// consume a string literal, processing escapes
    fn dquote(&mut self, i: ByteIndex) -> Result<Spanned, SyntaxError> {
        let mut text = String::new();
        loop {
            match self.bump()? {
                Some((_, '"')) => return Ok((i, Token::String(text), self.location)),
                Some((b, '\\')) => match self.bump()? {
                    Some((_, '"')) => text.push('"'),
                    Some((_, '\\')) => text.push('\\'),
                    Some((_, 'n')) => text.push('\n'),
                    Some((_, 't')) => text.push('\t'),
                    Some((_, c)) => {
                        return Err(SyntaxError::InvalidLiteral(
                            Span::new(b, self.location),
                            format!("\\{}", c),
                        ))
                    }
                    None => {
                        return Err(SyntaxError::UnexpectedEndOfStream(Span::new(
                            i,
                            self.location,
                        )))
                    }
                },
                Some((_, c)) => text.push(c),
                None => {
                    return Err(SyntaxError::UnexpectedEndOfStream(Span::new(
                        i,
                        self.location,
                    )))
                }
            }
        }
    }

    /// Next token, or `None` at the end of input
    pub fn next_token(&mut self) -> Result<Option<Spanned>, SyntaxError> {
        self.skip_atmosphere()?;
        match self.bump()? {
            Some((i, '(')) => Ok(Some((i, Token::OpenParen, i + ONE_BYTE))),
            Some((i, ')')) => Ok(Some((i, Token::CloseParen, i + ONE_BYTE))),
            Some((i, '"')) => self.dquote(i).map(Some),
            Some((i, '#')) => self.hash(i).map(Some),
            Some((i, c)) if is_atom_char(c) => self.atom(i).map(Some),
            Some((i, c)) => Err(SyntaxError::UnexpectedCharacter(
                Span::new(i, self.location),
                c,
            )),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(Source::from_text("test", text));
        let mut tokens = vec![];
        while let Some((_, token, _)) = lexer.next_token().unwrap() {
            tokens.push(token);
        }
        tokens
    }

    #[test]
    pub fn test_simple_tokens() {
        use Token::*;
        assert_eq!(
            tokens("(foo . -12) ; comment\n\"a\\nb\" #t +"),
            vec![
                OpenParen,
                Symbol("foo".to_string()),
                Dot,
                Integer("-12".to_string()),
                CloseParen,
                String("a\nb".to_string()),
                Hash("t".to_string()),
                Symbol("+".to_string()),
            ]
        );
    }

    #[test]
    pub fn test_spans() {
        let mut lexer = Lexer::new(Source::from_text("test", "  (ab"));
        assert_eq!(
            lexer.next_token().unwrap(),
            Some((ByteIndex(2), Token::OpenParen, ByteIndex(3)))
        );
        assert_eq!(
            lexer.next_token().unwrap(),
            Some((ByteIndex(3), Token::Symbol("ab".to_string()), ByteIndex(5)))
        );
        assert_eq!(lexer.next_token().unwrap(), None);
    }

    #[test]
    pub fn test_symbols_with_dots_and_unicode() {
        assert_eq!(
            tokens("... vector-set! λ"),
            vec![
                Token::Symbol("...".to_string()),
                Token::Symbol("vector-set!".to_string()),
                Token::Symbol("λ".to_string()),
            ]
        );
    }

    #[test]
    pub fn test_unterminated_string() {
        let mut lexer = Lexer::new(Source::from_text("test", "\"abc"));
        assert!(matches!(
            lexer.next_token(),
            Err(SyntaxError::UnexpectedEndOfStream(_))
        ));
    }

    #[test]
    pub fn test_bad_escape() {
        let mut lexer = Lexer::new(Source::from_text("test", "\"a\\qb\""));
        assert!(matches!(
            lexer.next_token(),
            Err(SyntaxError::InvalidLiteral(_, _))
        ));
    }

    #[test]
    pub fn test_unexpected_character() {
        let mut lexer = Lexer::new(Source::from_text("test", "[1]"));
        assert!(matches!(
            lexer.next_token(),
            Err(SyntaxError::UnexpectedCharacter(_, '['))
        ));
    }

    #[test]
    pub fn test_skip_line() {
        let mut lexer = Lexer::new(Source::from_text("test", "junk ) here\n42"));
        lexer.skip_line().unwrap();
        assert_eq!(
            lexer.next_token().unwrap().map(|(_, t, _)| t),
            Some(Token::Integer("42".to_string()))
        );
    }
}
