//! Error types for flashcard-core.

use thiserror::Error;

/// Errors raised while writing identifiers back into documents.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RewriteError {
    #[error("line {line} is not a flashcard header: {text}")]
    NotAHeader { line: usize, text: String },

    #[error("line {line} is past the end of the document ({len} lines)")]
    OutOfRange { line: usize, len: usize },
}

/// Result type alias using RewriteError.
pub type Result<T> = std::result::Result<T, RewriteError>;
