//! Errors for the `Data`/`Job` layers. The value/expression layer never
//! raises — invalid computations surface as [`sheetql_parser::Value::Invalid`]
//! and propagate. This module covers the layer above: mutating a read-only
//! raster, an unresolvable column, and the I/O-shaped failures a `Job`
//! delivers through [`Fallible`].

use std::fmt;

#[derive(Debug, Clone)]
pub struct Error {
    pub reason: Reason,
    pub hints: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Reason {
    Simple(String),
    ColumnNotFound(String),
    ReadOnly,
}

impl Error {
    pub fn new(reason: Reason) -> Self {
        Error {
            reason,
            hints: Vec::new(),
        }
    }

    pub fn simple<S: Into<String>>(message: S) -> Self {
        Error::new(Reason::Simple(message.into()))
    }

    pub fn with_hint<S: Into<String>>(mut self, hint: S) -> Self {
        self.hints.push(hint.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Reason::Simple(s) => write!(f, "{s}"),
            Reason::ColumnNotFound(c) => write!(f, "column not found: {c}"),
            Reason::ReadOnly => write!(f, "raster is read-only"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// I/O-shaped failures reported by `Job` producers: connection errors,
/// server non-2xx statuses, or a source adapter's own read failures. Never
/// raised by the pure value/expression layer.
#[derive(Debug, Clone)]
pub enum JobError {
    Io(String),
    Connection(String),
    ServerStatus { code: u16, message: String },
    Cancelled,
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::Io(msg) => write!(f, "I/O error: {msg}"),
            JobError::Connection(msg) => write!(f, "connection error: {msg}"),
            JobError::ServerStatus { code, message } => {
                write!(f, "server returned {code}: {message}")
            }
            JobError::Cancelled => write!(f, "job was cancelled"),
        }
    }
}

impl std::error::Error for JobError {}

/// Wrapper a `Job` producer hands to its callback: exactly one of a value or
/// a [`JobError`], per fetch.
pub type Fallible<T> = core::result::Result<T, JobError>;
