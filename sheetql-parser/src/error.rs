//! Parse-time errors. Mirrors the shape of the engine's own `Error`
//! (`kind`/`reason`/`hints`) so the two crates read as one family, without
//! `sheetql-parser` depending on the downstream crate.

use std::fmt;

#[derive(Debug, Clone)]
pub struct ParseError {
    pub reason: String,
    pub position: usize,
}

impl ParseError {
    pub fn new<S: Into<String>>(reason: S, position: usize) -> Self {
        ParseError {
            reason: reason.into(),
            position,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at position {}: {}", self.position, self.reason)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;
