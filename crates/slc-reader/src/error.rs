use crate::location::Location;
use std::fmt;
use thiserror::Error;

/// The taxonomy of compile-time failures (see spec §7). Every compilation
/// error is one of these kinds, carries a single-line reason, and is
/// reported with the source location that triggered it. There is no
/// recovery or multi-error reporting: the first error wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unbalanced parentheses, trailing garbage, bad char/string literal.
    Syntax,
    /// Integer out of range, bad `u8` literal.
    Value,
    /// Undefined identifier, duplicate variable/function, bad name.
    Name,
    /// Binop/unop mismatch, bad cast, bad return/body type, bad pointer
    /// element, comparison of different pointer types.
    Type,
    /// `break`/`continue` outside a loop, `var` in a non-scope position.
    Scope,
    /// Empty program, empty list, wrong arity, unknown expression.
    Shape,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Syntax => "syntax",
            ErrorKind::Value => "value",
            ErrorKind::Name => "name",
            ErrorKind::Type => "type",
            ErrorKind::Scope => "scope",
            ErrorKind::Shape => "shape",
        };
        f.write_str(s)
    }
}

/// A single-line compilation error, tagged with its taxonomy kind and the
/// source location that triggered it.
#[derive(Debug, Error, Clone)]
#[error("{location}: {kind} error: {message}")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub location: Location,
    pub message: String,
}

impl CompileError {
    pub fn new(kind: ErrorKind, location: Location, message: impl Into<String>) -> Self {
        CompileError {
            kind,
            location,
            message: message.into(),
        }
    }

    pub fn syntax(location: Location, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, location, message)
    }
    pub fn value(location: Location, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Value, location, message)
    }
    pub fn name(location: Location, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Name, location, message)
    }
    pub fn ty(location: Location, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, location, message)
    }
    pub fn scope(location: Location, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Scope, location, message)
    }
    pub fn shape(location: Location, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Shape, location, message)
    }
}

/// Result type used throughout parsing and compilation.
pub type CompileResult<T> = Result<T, CompileError>;
