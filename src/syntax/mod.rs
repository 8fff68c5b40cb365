pub mod error;
pub mod lexer;
pub mod printer;
pub mod reader;
pub mod source;
