//! Errors raised while turning Redcode source into a `Program`.
//!
//! Both the scanner and the parser stop at the first problem, so a parse
//! yields either a complete program or exactly one of these.
use thiserror::Error;

use super::ast::{Modifier, Opcode};
use super::lexer::Token;

#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("line {line}: bad number syntax: {text:?}")]
    Lexical { line: usize, text: String },

    #[error("line {line}: expected {expected}, found {found}")]
    UnexpectedToken {
        line: usize,
        expected: &'static str,
        found: Token,
    },

    #[error("line {line}: number {text:?} is out of range")]
    InvalidNumber { line: usize, text: String },

    #[error("line {line}: {opcode} takes {expected} operand(s), found {found}")]
    OperandCount {
        line: usize,
        opcode: Opcode,
        expected: String,
        found: usize,
    },

    #[error("line {line}: modifier .{modifier} has no meaning on {opcode}")]
    ModifierNotAllowed {
        line: usize,
        opcode: Opcode,
        modifier: Modifier,
    },

    #[error("line {line}: parentheses nested deeper than {limit}")]
    NestingTooDeep { line: usize, limit: usize },

    #[error("line {line}: operand has more than {limit} terms")]
    TooManyTerms { line: usize, limit: usize },
}

impl Error {
    /// Line the error was raised on, for callers that render their own diagnostics.
    pub fn line(&self) -> usize {
        match self {
            Error::Lexical { line, .. }
            | Error::UnexpectedToken { line, .. }
            | Error::InvalidNumber { line, .. }
            | Error::OperandCount { line, .. }
            | Error::ModifierNotAllowed { line, .. }
            | Error::NestingTooDeep { line, .. }
            | Error::TooManyTerms { line, .. } => *line,
        }
    }

    pub(crate) fn unexpected(expected: &'static str, found: Token) -> Self {
        Error::UnexpectedToken { line: found.line, expected, found }
    }
}
