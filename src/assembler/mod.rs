//! The Assembler module is in charge of taking a
//! Redcode source text and producing a `Program` as
//! described by the AST submodule.
//!
//! It does this with a lazy, state-machine scanner
//! feeding a one-token-lookahead recursive descent parser.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;

pub use error::Error;

/// Scans and parses one source text. `name` only shows up in the logs.
pub fn parse(name: &str, source: &str) -> Result<ast::Program, Error> {
    parser::Parser::new(lexer::Scanner::new(name, source)).run()
}
