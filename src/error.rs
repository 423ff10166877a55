// ABOUTME: Error types for reader, evaluator and primitive failures

use crate::value::Obj;
use std::io;
use thiserror::Error;

/// Every failure in the interpreter is fatal at the current call: the
/// driver prints `*** <message>` to stderr and exits with status 1.
#[derive(Error, Debug)]
pub enum SchError {
    /// Malformed token, unterminated string, missing delimiter, unknown
    /// `#`-literal, or end-of-input inside a nested read.
    #[error("{0}")]
    Read(String),

    #[error("unbound variable: {0}")]
    UnboundVariable(String),

    /// Wrong operand tag for a primitive or special form.
    #[error("{function}: expected {expected}, got {actual}")]
    Type {
        function: String,
        expected: String,
        actual: String,
    },

    #[error("{function}: expected {expected} argument{}, got {actual}", if *.expected == "1" { "" } else { "s" })]
    Arity {
        function: String,
        expected: String, // "2", "1-2", "at least 1"
        actual: usize,
    },

    #[error("object is not callable: {0}")]
    NotCallable(String),

    /// Evaluator fault outside the tag/arity categories (malformed
    /// special form, primitive invoked outside its interception point).
    #[error("{function}: {message}")]
    Runtime { function: String, message: String },

    #[error("{context}: {source}")]
    Io { context: String, source: io::Error },

    /// Root stack overflow or similar exhaustion of a fixed capacity.
    #[error("{0}")]
    Resource(String),

    /// Invocation of the `error` primitive.
    #[error("{0}")]
    User(String),
}

impl SchError {
    pub fn read(message: impl Into<String>) -> Self {
        SchError::Read(message.into())
    }

    /// Create a type error naming the operation and the offending value's tag.
    pub fn type_error(function: &str, expected: impl Into<String>, actual: &Obj) -> Self {
        SchError::Type {
            function: function.to_string(),
            expected: expected.into(),
            actual: actual.type_name().to_string(),
        }
    }

    pub fn arity(function: &str, expected: impl Into<String>, actual: usize) -> Self {
        SchError::Arity {
            function: function.to_string(),
            expected: expected.into(),
            actual,
        }
    }

    pub fn runtime(function: &str, message: impl Into<String>) -> Self {
        SchError::Runtime {
            function: function.to_string(),
            message: message.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        SchError::Io {
            context: context.into(),
            source,
        }
    }
}
