//! Core flashcard library for syncing markdown flashcards with a remote store.
//!
//! Provides:
//! - Callout flashcard parser for markdown documents
//! - Body formatter (text, fenced code and math to HTML)
//! - Reconciliation planning against a remote snapshot
//! - Identifier write-back into document lines
//! - Shared types (FlashcardRecord, RemoteRecord, MutationBatch, etc.)

pub mod error;
pub mod format;
pub mod parser;
pub mod plan;
pub mod rewrite;
pub mod types;

pub use error::{Result, RewriteError};
pub use format::{format_body, segment_body};
pub use parser::{extract_body, parse_document, scan_preamble, Preamble};
pub use plan::{groups_in_use, plan, referenced_ids, CardRef, RemoteSnapshot, SyncPlan};
pub use rewrite::{annotate_header, apply_assignments, IdAssignment, RewriteOutcome};
pub use types::{
    BodySegment, FenceLines, Fields, FlashcardRecord, MutationBatch, NewRecord, RecordId,
    RemoteLookup, RemoteRecord, SyncSummary, BACK_FIELD, FRONT_FIELD,
};
