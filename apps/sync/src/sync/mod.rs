//! Sync engine reconciling markdown flashcards with the record store.
//!
//! One run:
//! 1. parse every document into flashcards, remembering a content hash
//! 2. fetch the remote snapshot in one round trip
//! 3. plan the mutations
//! 4. set up the note type and groups, submit creates
//! 5. write new identifiers back into the documents
//! 6. submit updates, group moves, tagging and deletions
//!
//! Cancellation is honoured up to step 4; once the store is being mutated
//! the run completes.

pub mod snapshot;
pub mod submit;

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use flashcard_core::{
    apply_assignments, parse_document, plan, FlashcardRecord, IdAssignment, RecordId,
    RemoteSnapshot, SyncPlan, SyncSummary,
};

use crate::client::{Action, AnkiConnectClient, RecordStoreClient};
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::model::ensure_setup;
use crate::store::{DocumentHandle, DocumentStore, StoreError};

pub use snapshot::fetch_snapshot;
pub use submit::CreateOutcome;

/// Sync status for callers observing a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SyncStatus {
    Idle,
    Syncing { stage: SyncStage },
    Completed { synced_at: String, summary: SyncSummary },
    Failed { error: String },
}

/// Current sync stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "name")]
pub enum SyncStage {
    Parsing,
    FetchingRemote,
    Planning,
    Setup,
    Creating { count: usize },
    WritingIdentifiers,
    Submitting,
}

/// A document as parsed at the start of a run.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub handle: DocumentHandle,
    pub group: String,
    /// Hash of the content the cards were parsed from.
    pub hash: String,
    pub lines: Vec<String>,
    pub cards: Vec<FlashcardRecord>,
}

/// Everything a dry run computed.
#[derive(Debug, Clone)]
pub struct DryRun {
    pub documents: Vec<ParsedDocument>,
    pub plan: SyncPlan,
}

/// Inner state shared across clones.
struct SyncEngineInner {
    client: Arc<dyn RecordStoreClient>,
    config: Config,
    status: Mutex<SyncStatus>,
    running: AtomicBool,
    cancelled: AtomicBool,
}

/// Claim on the engine for the duration of one run.
///
/// Released on drop, so a run whose future is dropped does not keep the
/// engine busy.
struct RunClaim {
    inner: Arc<SyncEngineInner>,
    /// Status left behind if the run is dropped before it settles.
    abandoned: Option<SyncStatus>,
}

impl RunClaim {
    async fn settle(mut self, status: SyncStatus) {
        *self.inner.status.lock().await = status;
        self.abandoned = None;
    }
}

impl Drop for RunClaim {
    fn drop(&mut self) {
        if let Some(status) = self.abandoned.take() {
            match self.inner.status.try_lock() {
                Ok(mut current) => *current = status,
                Err(_) => warn!("status busy; abandoned run not recorded"),
            }
        }
        self.inner.running.store(false, Ordering::SeqCst);
    }
}

/// Sync engine.
///
/// Clone-able; clones share status and the cancellation flag, so one clone
/// can observe or cancel a run driven by another.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<SyncEngineInner>,
}

impl SyncEngine {
    pub fn new(client: Arc<dyn RecordStoreClient>, config: Config) -> Self {
        Self {
            inner: Arc::new(SyncEngineInner {
                client,
                config,
                status: Mutex::new(SyncStatus::Idle),
                running: AtomicBool::new(false),
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Create an engine talking HTTP to the configured endpoint.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let client = AnkiConnectClient::new(
            &config.anki_url,
            config.api_key.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Ok(Self::new(Arc::new(client), config))
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get current sync status.
    pub async fn status(&self) -> SyncStatus {
        self.inner.status.lock().await.clone()
    }

    /// Request cancellation of the active run.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check the store is reachable; returns its protocol version.
    pub async fn check_connectivity(&self) -> Result<u64> {
        let version = self
            .inner
            .client
            .invoke(&Action::Version)
            .await?
            .decode("version")?;
        Ok(version)
    }

    /// Run a full sync against `store`.
    pub async fn sync(&self, store: &dyn DocumentStore) -> Result<SyncSummary> {
        let (claim, _) = self.begin().await?;
        let result = self.run(store).await;

        let status = match &result {
            Ok(summary) => {
                info!(
                    added = summary.added,
                    modified = summary.modified,
                    deleted = summary.deleted,
                    "sync completed"
                );
                SyncStatus::Completed {
                    synced_at: Utc::now().to_rfc3339(),
                    summary: *summary,
                }
            }
            Err(e) => {
                warn!(error = %e, "sync failed");
                SyncStatus::Failed {
                    error: e.to_string(),
                }
            }
        };
        claim.settle(status).await;
        result
    }

    /// Parse, fetch and plan without mutating the store or the documents.
    ///
    /// The status of the previous run is restored afterwards.
    pub async fn dry_run(&self, store: &dyn DocumentStore) -> Result<DryRun> {
        let (mut claim, previous) = self.begin().await?;
        claim.abandoned = Some(previous.clone());
        let result = self.prepare(store).await;
        claim.settle(previous).await;

        let (documents, _, plan) = result?;
        Ok(DryRun { documents, plan })
    }

    /// Claim the engine for a run; returns the claim and the status it replaced.
    async fn begin(&self) -> Result<(RunClaim, SyncStatus)> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Err(SyncError::AlreadyInProgress);
        }
        let claim = RunClaim {
            inner: Arc::clone(&self.inner),
            abandoned: Some(SyncStatus::Failed {
                error: SyncError::Cancelled.to_string(),
            }),
        };
        self.inner.cancelled.store(false, Ordering::SeqCst);

        let previous = std::mem::replace(
            &mut *self.inner.status.lock().await,
            SyncStatus::Syncing {
                stage: SyncStage::Parsing,
            },
        );
        Ok((claim, previous))
    }

    async fn run(&self, store: &dyn DocumentStore) -> Result<SyncSummary> {
        let config = &self.inner.config;
        let client = self.inner.client.as_ref();

        let (documents, snapshot, plan) = self.prepare(store).await?;
        if plan.batch.is_empty() {
            info!("nothing to sync");
            return Ok(plan.summary);
        }

        let mut needed: BTreeSet<String> =
            plan.batch.create.iter().map(|r| r.group.clone()).collect();
        needed.extend(plan.batch.change_group.iter().map(|(_, g)| g.clone()));
        if !needed.is_empty() {
            self.set_stage(SyncStage::Setup).await;
            ensure_setup(client, &config.model_name, &needed).await?;
        }

        if !plan.batch.create.is_empty() {
            self.set_stage(SyncStage::Creating {
                count: plan.batch.create.len(),
            })
            .await;
            let outcome = submit::submit_creates(
                client,
                &plan.batch.create,
                &config.model_name,
                &config.managed_tag,
                config.max_actions_per_request,
            )
            .await;
            info!(created = outcome.created(), "records created");

            // Identifiers of created records are persisted even if some creates failed
            self.set_stage(SyncStage::WritingIdentifiers).await;
            write_back(store, &documents, &plan, &outcome.ids)?;
            if let Some(error) = outcome.error {
                return Err(error);
            }
        }

        let actions = submit::mutation_actions(&plan.batch, &snapshot, &config.managed_tag);
        if !actions.is_empty() {
            self.set_stage(SyncStage::Submitting).await;
            submit::submit_actions(client, actions, config.max_actions_per_request).await?;
        }

        Ok(plan.summary)
    }

    async fn prepare(
        &self,
        store: &dyn DocumentStore,
    ) -> Result<(Vec<ParsedDocument>, RemoteSnapshot, SyncPlan)> {
        let config = &self.inner.config;

        self.set_stage(SyncStage::Parsing).await;
        let documents = parse_documents(store, config)?;
        self.check_cancelled()?;

        self.set_stage(SyncStage::FetchingRemote).await;
        let cards: Vec<Vec<FlashcardRecord>> =
            documents.iter().map(|doc| doc.cards.clone()).collect();
        let snapshot =
            fetch_snapshot(self.inner.client.as_ref(), &cards, &config.managed_tag).await?;
        self.check_cancelled()?;

        self.set_stage(SyncStage::Planning).await;
        let plan = plan(&cards, &snapshot, &config.managed_tag);
        info!(
            documents = documents.len(),
            cards = cards.iter().map(Vec::len).sum::<usize>(),
            create = plan.batch.create.len(),
            update = plan.batch.update_fields.len(),
            move_group = plan.batch.change_group.len(),
            tag = plan.batch.add_tag.len(),
            delete = plan.batch.delete.len(),
            "planned sync"
        );
        self.check_cancelled()?;

        Ok((documents, snapshot, plan))
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }

    async fn set_stage(&self, stage: SyncStage) {
        debug!(?stage, "sync stage");
        self.set_status(SyncStatus::Syncing { stage }).await;
    }

    async fn set_status(&self, status: SyncStatus) {
        *self.inner.status.lock().await = status;
    }
}

/// Parse every document that resolves to a group.
///
/// Any read failure aborts: skipping a document would make its records
/// look orphaned.
pub fn parse_documents(store: &dyn DocumentStore, config: &Config) -> Result<Vec<ParsedDocument>> {
    let mut documents = Vec::new();

    for handle in store.list_documents()? {
        let metadata = store.read_group_metadata(&handle)?;
        let Some(group) = config.resolve_group(metadata) else {
            debug!(document = %handle, "no group configured, skipping");
            continue;
        };

        let lines = store.read_lines(&handle)?;
        let cards = parse_document(&lines, &group);
        if cards.is_empty() {
            continue;
        }
        debug!(document = %handle, cards = cards.len(), %group, "parsed document");

        documents.push(ParsedDocument {
            hash: hash_content(&lines),
            handle,
            group,
            lines,
            cards,
        });
    }
    Ok(documents)
}

/// Write the identifiers of created records into their headers.
///
/// Each document is re-read first. If it changed since it was parsed,
/// headers are located by their text and rank among identical lines;
/// headers that can no longer be found unambiguously are skipped.
fn write_back(
    store: &dyn DocumentStore,
    documents: &[ParsedDocument],
    plan: &SyncPlan,
    ids: &[Option<RecordId>],
) -> Result<()> {
    let mut per_document: BTreeMap<usize, Vec<IdAssignment>> = BTreeMap::new();
    for (origin, id) in plan.origins.iter().zip(ids) {
        let Some(id) = id else { continue };
        let doc = &documents[origin.document];
        let card = &doc.cards[origin.card];
        per_document
            .entry(origin.document)
            .or_default()
            .push(IdAssignment::at(&doc.lines, card.line_index, *id));
    }

    for (index, assignments) in per_document {
        let doc = &documents[index];
        let mut lines = match store.read_lines(&doc.handle) {
            Ok(lines) => lines,
            Err(StoreError::NotFound(_)) => {
                warn!(document = %doc.handle, "document removed during sync; identifiers not written");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let in_place = hash_content(&lines) == doc.hash;
        if !in_place {
            warn!(document = %doc.handle, "document changed during sync; relocating headers");
        }

        let outcome = apply_assignments(&mut lines, &assignments, in_place);
        for missed in &outcome.unplaced {
            warn!(
                document = %doc.handle,
                header = %missed.header,
                id = missed.identifier,
                "header not found or ambiguous; identifier not written"
            );
        }
        if outcome.applied > 0 {
            store.write_lines(&doc.handle, &lines)?;
            debug!(document = %doc.handle, written = outcome.applied, "identifiers written");
        }
    }
    Ok(())
}

/// SHA-256 of a document's lines.
pub fn hash_content(lines: &[String]) -> String {
    let mut hasher = Sha256::new();
    for line in lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}
