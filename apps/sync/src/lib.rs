//! Sync markdown flashcards with an AnkiConnect-compatible record store.
//!
//! Flashcards are callout blocks in markdown documents:
//!
//! ```markdown
//! > [!flashcard] What is 2+2?
//! > Four.
//! ```
//!
//! After the first sync the header carries the remote identifier
//! (`> [!flashcard] %%1700000000000%% What is 2+2?`) and later runs update,
//! move or delete the record to match the document.

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod store;
pub mod sync;

pub use client::{AnkiConnectClient, RecordStoreClient};
pub use config::Config;
pub use error::{Result, SyncError};
pub use store::{DocumentHandle, DocumentStore, VaultStore};
pub use sync::{DryRun, SyncEngine, SyncStage, SyncStatus};
