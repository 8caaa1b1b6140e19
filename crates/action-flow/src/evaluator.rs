//! Literal expression evaluator for scripts stored as text
//!
//! Configuration files keep action scripts as literal expressions such as
//!
//! ```text
//! [("get", "https://example.com"),
//!  ("for", "Alice, Bob", [("send_keys", "//input", "element")])]
//! ```
//!
//! The accepted syntax is nested lists `[...]` and tuples `(...)` of single or
//! double quoted strings, numbers and `None`, with optional trailing commas,
//! whitespace and `#` line comments. Every JSON array of strings is valid input.

use serde::Deserialize;

use crate::errors::FlowError;

/// Value produced by evaluating a script expression
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Number(f64),
    Str(String),
    List(Vec<Literal>),
}

impl Literal {
    /// Short name of the value's kind, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::Null => "None",
            Literal::Number(_) => "number",
            Literal::Str(_) => "string",
            Literal::List(_) => "sequence",
        }
    }
}

/// Turns script source text into a [`Literal`]
pub trait ScriptEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str) -> Result<Literal, FlowError>;
}

/// Default evaluator for the literal expression syntax
#[derive(Debug, Default, Clone, Copy)]
pub struct LiteralEvaluator;

impl ScriptEvaluator for LiteralEvaluator {
    fn evaluate(&self, expression: &str) -> Result<Literal, FlowError> {
        Parser::new(expression).parse_document()
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn parse_document(mut self) -> Result<Literal, FlowError> {
        self.skip_trivia();
        if self.peek().is_none() {
            return Err(self.error("empty expression"));
        }
        let value = self.parse_value()?;
        self.skip_trivia();
        if self.peek().is_some() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(value)
    }

    fn parse_value(&mut self) -> Result<Literal, FlowError> {
        match self.peek() {
            Some('[') => self.parse_sequence(']'),
            Some('(') => self.parse_sequence(')'),
            Some(quote @ ('"' | '\'')) => self.parse_string(quote).map(Literal::Str),
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() => self.parse_keyword(),
            Some(c) => Err(self.error(format!("unexpected character {c:?}"))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_sequence(&mut self, close: char) -> Result<Literal, FlowError> {
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(c) if c == close => {
                    self.bump();
                    return Ok(Literal::List(items));
                }
                None => return Err(self.error(format!("unterminated sequence, expected {close:?}"))),
                _ => {}
            }

            items.push(self.parse_value()?);

            self.skip_trivia();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(c) if c == close => {
                    self.bump();
                    return Ok(Literal::List(items));
                }
                Some(c) => return Err(self.error(format!("expected ',' or {close:?}, found {c:?}"))),
                None => return Err(self.error(format!("unterminated sequence, expected {close:?}"))),
            }
        }
    }

    fn parse_string(&mut self, quote: char) -> Result<String, FlowError> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('0') => out.push('\0'),
                    Some(c @ ('\\' | '\'' | '"')) => out.push(c),
                    Some('\n') => {}
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => break,
                },
                Some('\n') => {
                    return Err(FlowError::Evaluation {
                        offset: start,
                        message: "newline inside string literal".to_string(),
                    })
                }
                Some(c) => out.push(c),
                None => break,
            }
        }
        Err(FlowError::Evaluation {
            offset: start,
            message: "unterminated string literal".to_string(),
        })
    }

    fn parse_number(&mut self) -> Result<Literal, FlowError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | '_') {
                self.bump();
            } else {
                break;
            }
        }
        let raw = &self.src[start..self.pos];
        raw.replace('_', "")
            .parse::<f64>()
            .map(Literal::Number)
            .map_err(|_| FlowError::Evaluation {
                offset: start,
                message: format!("invalid number {raw:?}"),
            })
    }

    fn parse_keyword(&mut self) -> Result<Literal, FlowError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        match &self.src[start..self.pos] {
            "None" | "null" => Ok(Literal::Null),
            word => Err(FlowError::Evaluation {
                offset: start,
                message: format!("unknown name {word:?}"),
            }),
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                while !matches!(self.bump(), Some('\n') | None) {}
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> FlowError {
        FlowError::Evaluation {
            offset: self.pos,
            message: message.into(),
        }
    }
}
