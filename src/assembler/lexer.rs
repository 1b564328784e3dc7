//! This lexer tokenizes ICWS '94 Redcode.
//!
//! The scanner is a small state machine. Each state consumes some input,
//! queues zero or more tokens and names the state to run next; the driver in
//! `Scanner::next_token` keeps stepping until a token is available. Nothing is
//! scanned before the caller asks for it.
//!
//! Scanning stops for good at the end of the input or at the first malformed
//! number. From then on every call hands back that same terminal token.
use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;

use super::ast;

const COMMENT_DELIM: char = ';';
const ADDRESSING_MODES: &str = "#$@<>";
const OPERATORS: &str = "+-*/%()";
const DIGITS: &str = "0123456789";

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Error,
    Eof,
    Eol,
    Label,
    Opcode,
    Modifier,
    Mode,
    Number,
    Operator,
    Comma,
    Comment,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use TokenKind::*;
        f.write_str(match self {
            Error    => "error",
            Eof      => "end of input",
            Eol      => "end of line",
            Label    => "label",
            Opcode   => "opcode",
            Modifier => "modifier",
            Mode     => "addressing mode",
            Number   => "number",
            Operator => "operator",
            Comma    => "comma",
            Comment  => "comment",
        })
    }
}

/// A classified slice of the source. `text` is exactly the matched input;
/// `offset` is its byte position and `line` the 1-based line it starts on.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub offset: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: &str, line: usize, offset: usize) -> Self {
        Token { kind, text: text.to_string(), line, offset }
    }

    /// Eof and Error end the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, TokenKind::Eof | TokenKind::Error)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "{}", self.kind),
            _ => write!(f, "{} {:?}", self.kind, self.text),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum State {
    Line,
    Instruction,
    Identifier,
    Number,
    Comment,
}

pub struct Scanner<'a> {
    name: String,
    input: &'a str,
    state: Option<State>,
    pos: usize,
    start: usize,
    width: usize,
    last: Option<char>,
    line: usize,
    start_line: usize,
    pending: VecDeque<Token>,
    terminal: Option<Token>,
    finished: bool,
}

impl<'a> Scanner<'a> {
    /// Creates a scanner over one in-memory source text.
    /// `name` is only used to tell inputs apart in the logs.
    pub fn new(name: &str, input: &'a str) -> Self {
        debug!("scanning `{}` ({} bytes)", name, input.len());
        Scanner {
            name: name.to_string(),
            input,
            state: Some(State::Line),
            pos: 0,
            start: 0,
            width: 0,
            last: None,
            line: 1,
            start_line: 1,
            pending: VecDeque::with_capacity(2),
            terminal: None,
            finished: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the next token. Once the stream has ended this keeps
    /// returning the terminal token.
    pub fn next_token(&mut self) -> Token {
        loop {
            if let Some(tok) = self.pending.pop_front() {
                trace!("{}: line {}: {}", self.name, tok.line, tok);
                self.finished |= tok.is_terminal();
                return tok;
            }
            match self.state {
                Some(state) => self.state = self.step(state),
                None => {
                    self.finished = true;
                    return match &self.terminal {
                        Some(tok) => tok.clone(),
                        None => Token::new(TokenKind::Eof, "", self.line, self.pos),
                    }
                }
            }
        }
    }

    fn step(&mut self, state: State) -> Option<State> {
        match state {
            State::Line        => self.lex_line(),
            State::Instruction => self.lex_instruction(),
            State::Identifier  => self.lex_identifier(),
            State::Number      => self.lex_number(),
            State::Comment     => self.lex_comment(),
        }
    }

    /// Skips leading whitespace, blank lines included, and decides whether the
    /// line holds a comment or an instruction.
    fn lex_line(&mut self) -> Option<State> {
        while let Some(c) = self.peek() {
            if !is_space(c) {
                break;
            }
            self.next_char();
            self.ignore();
        }

        match self.peek() {
            Some(COMMENT_DELIM) => {
                self.next_char();
                Some(State::Comment)
            }
            Some(_) => Some(State::Instruction),
            None => {
                self.emit(TokenKind::Eof);
                None
            }
        }
    }

    /// Classifies the next character of an instruction line. A dot only leads
    /// to a modifier when a letter follows it; otherwise it is dropped.
    fn lex_instruction(&mut self) -> Option<State> {
        loop {
            let c = match self.next_char() {
                Some(c) => c,
                // Let lex_line hand out Eof.
                None => return Some(State::Line),
            };

            match c {
                '0'..='9' => {
                    self.backup();
                    return Some(State::Number);
                }
                c if is_alphanumeric(c) => {
                    self.backup();
                    return Some(State::Identifier);
                }
                // The dot only separates an opcode from its modifier.
                '.' => {
                    self.ignore();
                    return match self.peek() {
                        Some(c) if is_alphanumeric(c) && !c.is_ascii_digit() => Some(State::Identifier),
                        _ => Some(State::Instruction),
                    };
                }
                c if ADDRESSING_MODES.contains(c) => {
                    self.emit(TokenKind::Mode);
                    return Some(State::Instruction);
                }
                c if OPERATORS.contains(c) => {
                    self.emit(TokenKind::Operator);
                    return Some(State::Instruction);
                }
                ',' => {
                    self.emit(TokenKind::Comma);
                    return Some(State::Instruction);
                }
                COMMENT_DELIM => return Some(State::Comment),
                '\n' => {
                    self.emit(TokenKind::Eol);
                    return Some(State::Line);
                }
                // Whitespace and anything unclassified.
                _ => self.ignore(),
            }
        }
    }

    /// Scans a label or a keyword. Keywords are matched case-sensitively.
    fn lex_identifier(&mut self) -> Option<State> {
        while let Some(c) = self.peek() {
            if !is_alphanumeric(c) {
                break;
            }
            self.next_char();
        }

        let kind = keyword(&self.input[self.start..self.pos]).unwrap_or(TokenKind::Label);
        self.emit(kind);
        Some(State::Instruction)
    }

    fn lex_number(&mut self) -> Option<State> {
        if !self.scan_number() {
            return self.error();
        }
        self.emit(TokenKind::Number);
        Some(State::Instruction)
    }

    fn scan_number(&mut self) -> bool {
        self.accept("+-");
        self.accept_run(DIGITS);

        // A number running straight into a letter is malformed.
        match self.peek() {
            Some(c) if is_alphanumeric(c) => {
                self.next_char();
                false
            }
            _ => true,
        }
    }

    /// Drops the delimiter and collects the rest of the line. A comment at the
    /// very end of the input gets no Eol after it.
    fn lex_comment(&mut self) -> Option<State> {
        self.ignore();
        loop {
            match self.next_char() {
                Some('\n') => {
                    self.backup();
                    self.emit(TokenKind::Comment);
                    self.next_char();
                    self.emit(TokenKind::Eol);
                    return Some(State::Line);
                }
                None => {
                    self.emit(TokenKind::Comment);
                    return Some(State::Line);
                }
                Some(_) => {}
            }
        }
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.input[self.pos..].chars().next();
        self.width = c.map_or(0, char::len_utf8);
        self.pos += self.width;
        self.last = c;
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    /// Steps back over the last character read. Only valid once per `next_char`.
    fn backup(&mut self) {
        self.pos -= self.width;
        if self.width > 0 && self.last == Some('\n') {
            self.line -= 1;
        }
        self.width = 0;
    }

    fn peek(&mut self) -> Option<char> {
        let c = self.next_char();
        self.backup();
        c
    }

    fn accept(&mut self, valid: &str) -> bool {
        match self.next_char() {
            Some(c) if valid.contains(c) => true,
            _ => {
                self.backup();
                false
            }
        }
    }

    fn accept_run(&mut self, valid: &str) {
        while self.accept(valid) {}
    }

    fn ignore(&mut self) {
        self.start = self.pos;
        self.start_line = self.line;
    }

    fn emit(&mut self, kind: TokenKind) {
        let tok = Token::new(kind, &self.input[self.start..self.pos], self.start_line, self.start);
        if tok.is_terminal() {
            self.terminal = Some(tok.clone());
        }
        self.pending.push_back(tok);
        self.ignore();
    }

    /// Queues an error token carrying the offending text and stops the scan.
    fn error(&mut self) -> Option<State> {
        debug!("{}: line {}: bad number syntax: {:?}",
            self.name, self.start_line, &self.input[self.start..self.pos]);
        self.emit(TokenKind::Error);
        None
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token;

    /// Yields every token up to and including the terminal one, unless
    /// `next_token` has already handed the terminal out.
    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        Some(self.next_token())
    }
}

fn keyword(word: &str) -> Option<TokenKind> {
    if word.parse::<ast::Opcode>().is_ok() {
        Some(TokenKind::Opcode)
    } else if word.parse::<ast::Modifier>().is_ok() {
        Some(TokenKind::Modifier)
    } else {
        None
    }
}

/// CR is plain whitespace; only LF ends a line.
fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

fn is_alphanumeric(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}
