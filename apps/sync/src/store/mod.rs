//! Document store abstraction.
//!
//! The sync engine reads and writes documents only through
//! [`DocumentStore`], so it runs the same against a vault on disk or an
//! in-memory store.

pub mod vault;

use std::fmt;
use thiserror::Error;

pub use vault::VaultStore;

/// Document store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("invalid front matter in {path}: {message}")]
    FrontMatter { path: String, message: String },
}

/// Opaque reference to one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentHandle(String);

impl DocumentHandle {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage holding the documents flashcards are authored in.
pub trait DocumentStore: Send + Sync {
    /// Every document that may contain flashcards.
    fn list_documents(&self) -> Result<Vec<DocumentHandle>, StoreError>;

    /// The document's lines, without line terminators.
    fn read_lines(&self, handle: &DocumentHandle) -> Result<Vec<String>, StoreError>;

    /// Replace the document's content with `lines`.
    fn write_lines(&self, handle: &DocumentHandle, lines: &[String]) -> Result<(), StoreError>;

    /// The group configured in the document's metadata, trimmed.
    /// Empty or absent values yield `None`.
    fn read_group_metadata(&self, handle: &DocumentHandle) -> Result<Option<String>, StoreError>;
}
