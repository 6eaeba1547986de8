//! Error types for the FEEL engine

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal failures: syntax errors and malformed-AST invariants.
///
/// These are the only failures that abort an evaluation (§7 tier 3 in the
/// spec). Domain mismatches and undeclared-reference problems never
/// construct this type — they are represented as plain `Value::Null` or
/// a [`crate::engine::Warning`] instead, so evaluation can keep going.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("parse error: {0}")]
    ParseError(String),

    #[error("internal error: {0}")]
    Internal(String),
}
