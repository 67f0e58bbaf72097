//! Source frontend: tokenizer, syntax tree and parser
//!
//! Fragments handed over by the host are parsed into a flat list of
//! statements; the evaluator walks the resulting tree directly.

pub mod ast;
pub mod lexer;
pub mod parser;

use thiserror::Error;

use crate::error::RuntimeError;
use ast::Expr;

/// Syntax error with a 1-based source position
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, column: usize, message: &str) -> Self {
        Self {
            line,
            column,
            message: message.to_string(),
        }
    }
}

impl From<ParseError> for RuntimeError {
    fn from(err: ParseError) -> Self {
        RuntimeError::Parse {
            line: err.line,
            column: err.column,
            message: err.message,
        }
    }
}

/// Parse a complete program
pub fn parse(source: &str) -> Result<Vec<Expr>, ParseError> {
    let tokens = lexer::tokenize(source)?;
    parser::Parser::new(tokens).parse_program()
}

#[cfg(test)]
mod tests;
