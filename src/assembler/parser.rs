//! The Parser module pulls tokens from the scanner one at a time and builds
//! a `Program`.
//!
//! It is a recursive descent parser with a single token of lookahead:
//!
//! ```text
//! program     := line*
//! line        := comment | instruction
//! instruction := label* operation operand (',' operand)? comment? EOL
//! operation   := opcode ('.' modifier)?
//! operand     := mode? expr
//! expr        := term (op term)*
//! term        := label | number | sign number | '(' expr ')'
//! ```
//!
//! Labels on a line of their own carry over to the next instruction. All
//! binary operators bind equally and associate to the left. Missing modifiers
//! are filled in from the operand modes once an instruction is complete.
//! Parsing stops at the first error.
use super::ast::*;
use super::error::Error;
use super::lexer::{Token, TokenKind};

/// Deepest parenthesis nesting accepted in one operand.
pub const MAX_NESTING: usize = 64;
/// Most terms accepted in one operand, nested ones included. This bounds the
/// depth of every expression tree handed out.
pub const MAX_TERMS: usize = 1024;

pub struct Parser<I: Iterator<Item = Token>> {
    tokens: I,
    peeked: Option<Token>,
    line: usize,
    depth: usize,
    terms: usize,
    program: Program,
}

impl<I: Iterator<Item = Token>> Parser<I> {
    pub fn new<T: IntoIterator<IntoIter = I, Item = Token>>(tokens: T) -> Self {
        Parser {
            tokens: tokens.into_iter(),
            peeked: None,
            line: 1,
            depth: 0,
            terms: 0,
            program: Program::default(),
        }
    }

    /// Run the parser, consuming itself and returning the program.
    /// An END line closes the program; whatever follows it is never read.
    pub fn run(mut self) -> Result<Program, Error> {
        while let Some(ins) = self.instruction()? {
            debug!("{:04}: {}", self.program.instructions.len(), ins);
            if ins.operation.opcode == Opcode::END {
                self.program.end = Some(ins);
                break;
            }
            self.program.instructions.push(ins);
        }
        Ok(self.program)
    }

    /// Gathers labels up to the next opcode, across line breaks and comments.
    /// Returns None once the input is exhausted.
    fn instruction(&mut self) -> Result<Option<Instruction>, Error> {
        let mut labels = Vec::new();

        loop {
            let tok = self.consume()?;
            match tok.kind {
                TokenKind::Eof if labels.is_empty() => return Ok(None),
                TokenKind::Eof => return Err(Error::unexpected("an opcode", tok)),
                TokenKind::Eol | TokenKind::Comment => {}
                TokenKind::Label => {
                    labels.push(tok.text);
                    if self.peek().kind == TokenKind::Comma {
                        self.consume()?;
                        if self.peek().kind != TokenKind::Label {
                            let tok = self.consume()?;
                            return Err(Error::unexpected("a label", tok));
                        }
                    }
                }
                TokenKind::Opcode => return self.operation(labels, tok).map(Some),
                _ => return Err(Error::unexpected("a label or an opcode", tok)),
            }
        }
    }

    fn operation(&mut self, labels: Vec<String>, tok: Token) -> Result<Instruction, Error> {
        let line = tok.line;
        let opcode = match tok.text.parse::<Opcode>() {
            Ok(op) => op,
            Err(_) => return Err(Error::unexpected("an opcode", tok)),
        };

        let modifier = if self.peek().kind == TokenKind::Modifier {
            let tok = self.consume()?;
            match tok.text.parse::<Modifier>() {
                Ok(m) => Some(m),
                Err(_) => return Err(Error::unexpected("a modifier", tok)),
            }
        } else {
            None
        };

        if let Some(modifier) = modifier {
            if opcode.is_pseudo() {
                return Err(Error::ModifierNotAllowed { line, opcode, modifier });
            }
        }

        let mut operands = Vec::with_capacity(2);
        if !self.at_line_end() {
            operands.push(self.operand()?);
            if self.peek().kind == TokenKind::Comma {
                self.consume()?;
                operands.push(self.operand()?);
            }
        }
        self.end_of_line()?;

        let (min, max) = opcode.arity();
        if operands.len() < min || operands.len() > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{} to {}", min, max)
            };
            return Err(Error::OperandCount { line, opcode, expected, found: operands.len() });
        }

        let mut ins = Instruction {
            labels,
            operation: Operation { opcode, modifier },
            operands,
        };
        ins.resolve_modifier();
        Ok(ins)
    }

    fn operand(&mut self) -> Result<Operand, Error> {
        let mode = if self.peek().kind == TokenKind::Mode {
            let tok = self.consume()?;
            match tok.text.chars().next().and_then(AddressingMode::from_char) {
                Some(mode) => Some(mode),
                None => return Err(Error::unexpected("an addressing mode", tok)),
            }
        } else {
            None
        };

        self.depth = 0;
        self.terms = 0;
        let expr = self.expr()?;
        Ok(Operand { mode, expr })
    }

    fn expr(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.term()?;
        while let Some(op) = self.peek_operator() {
            self.consume()?;
            let rhs = self.term()?;
            lhs = Expr::binary(lhs, op, rhs);
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, Error> {
        let tok = self.consume()?;

        self.terms += 1;
        if self.terms > MAX_TERMS {
            return Err(Error::TooManyTerms { line: tok.line, limit: MAX_TERMS });
        }

        match tok.kind {
            TokenKind::Label => Ok(Expr::Label(tok.text)),
            TokenKind::Number => number(&tok, ""),
            TokenKind::Operator if tok.text == "(" => {
                self.depth += 1;
                if self.depth > MAX_NESTING {
                    return Err(Error::NestingTooDeep { line: tok.line, limit: MAX_NESTING });
                }
                let inner = self.expr()?;
                self.depth -= 1;
                let close = self.consume()?;
                if close.kind == TokenKind::Operator && close.text == ")" {
                    Ok(inner)
                } else {
                    Err(Error::unexpected("`)`", close))
                }
            }
            // A sign only ever belongs to a number literal.
            TokenKind::Operator if tok.text == "+" || tok.text == "-" => {
                let num = self.consume()?;
                if num.kind == TokenKind::Number {
                    number(&num, &tok.text)
                } else {
                    Err(Error::unexpected("a number", num))
                }
            }
            _ => Err(Error::unexpected("a label, a number or `(`", tok)),
        }
    }

    /// An instruction ends at an end of line, optionally after a comment.
    /// Running out of input also ends it.
    fn end_of_line(&mut self) -> Result<(), Error> {
        let tok = self.consume()?;
        match tok.kind {
            TokenKind::Eol | TokenKind::Eof => Ok(()),
            TokenKind::Comment => {
                let tok = self.consume()?;
                match tok.kind {
                    TokenKind::Eol | TokenKind::Eof => Ok(()),
                    _ => Err(Error::unexpected("end of line", tok)),
                }
            }
            _ => Err(Error::unexpected("end of line", tok)),
        }
    }

    fn at_line_end(&mut self) -> bool {
        matches!(self.peek().kind, TokenKind::Eol | TokenKind::Comment | TokenKind::Eof)
    }

    fn peek_operator(&mut self) -> Option<Operator> {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Operator => tok.text.chars().next().and_then(Operator::from_char),
            _ => None,
        }
    }

    /// Returns the lookahead token without consuming it.
    fn peek(&mut self) -> &Token {
        let tokens = &mut self.tokens;
        let line = self.line;
        self.peeked.get_or_insert_with(|| pull(tokens, line))
    }

    /// Pops the next token. Error tokens from the scanner surface here as
    /// lexical errors.
    fn consume(&mut self) -> Result<Token, Error> {
        let tok = match self.peeked.take() {
            Some(tok) => tok,
            None => pull(&mut self.tokens, self.line),
        };
        self.line = tok.line;

        match tok.kind {
            TokenKind::Error => Err(Error::Lexical { line: tok.line, text: tok.text }),
            _ => Ok(tok),
        }
    }
}

/// A drained token source reads as an endless end of input.
fn pull<I: Iterator<Item = Token>>(tokens: &mut I, line: usize) -> Token {
    tokens.next().unwrap_or_else(|| Token::new(TokenKind::Eof, "", line, 0))
}

fn number(tok: &Token, sign: &str) -> Result<Expr, Error> {
    let text = format!("{}{}", sign, tok.text);
    match text.parse::<i64>() {
        Ok(n) => Ok(Expr::Number(n)),
        Err(_) => Err(Error::InvalidNumber { line: tok.line, text }),
    }
}
