//! Reconciliation planning.
//!
//! Diffs one parse pass against a snapshot of remote state and stages the
//! mutations that converge the two. Planning is pure: the snapshot is
//! fetched and the batch is submitted by the caller.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::types::{
    FlashcardRecord, MutationBatch, NewRecord, RecordId, RemoteLookup, SyncSummary,
};

/// Remote state fetched in bulk at the start of a run.
#[derive(Debug, Clone, Default)]
pub struct RemoteSnapshot {
    /// Records carrying the managed tag when the run started.
    pub managed: BTreeSet<RecordId>,
    /// Lookup result for every identifier referenced by a parsed card.
    pub records: HashMap<RecordId, RemoteLookup>,
    /// Members of each group in use, subgroups excluded.
    pub groups: HashMap<String, BTreeSet<RecordId>>,
}

impl RemoteSnapshot {
    pub fn lookup(&self, id: RecordId) -> &RemoteLookup {
        self.records.get(&id).unwrap_or(&RemoteLookup::Missing)
    }

    pub fn is_member(&self, group: &str, id: RecordId) -> bool {
        self.groups.get(group).is_some_and(|members| members.contains(&id))
    }
}

/// Position of a card within the documents passed to [`plan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardRef {
    pub document: usize,
    pub card: usize,
}

/// Staged mutations for one run.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub batch: MutationBatch,
    /// Origin of each staged create, matched by position to `batch.create`.
    pub origins: Vec<CardRef>,
    pub summary: SyncSummary,
}

/// Every identifier referenced by a header.
pub fn referenced_ids(documents: &[Vec<FlashcardRecord>]) -> BTreeSet<RecordId> {
    documents
        .iter()
        .flatten()
        .filter_map(|card| card.identifier)
        .collect()
}

/// Every group a card is synced into.
pub fn groups_in_use(documents: &[Vec<FlashcardRecord>]) -> BTreeSet<String> {
    documents
        .iter()
        .flatten()
        .map(|card| card.group.clone())
        .collect()
}

/// Compute the mutations for one run.
///
/// Cards are visited in document order. A card whose identifier is unknown
/// remotely, fails validation, or was already claimed earlier in the run is
/// recreated. A known record without the managed tag is only re-tagged and
/// counts as modified; its fields and group are synced on the following
/// run. Managed records that no card references are deleted.
pub fn plan(
    documents: &[Vec<FlashcardRecord>],
    snapshot: &RemoteSnapshot,
    managed_tag: &str,
) -> SyncPlan {
    let mut out = SyncPlan::default();
    let mut seen: HashSet<RecordId> = HashSet::new();

    for (document, cards) in documents.iter().enumerate() {
        for (card_idx, card) in cards.iter().enumerate() {
            let origin = CardRef {
                document,
                card: card_idx,
            };

            let Some(id) = card.identifier else {
                stage_create(&mut out, card, origin);
                continue;
            };

            if seen.contains(&id) {
                stage_create(&mut out, card, origin);
                continue;
            }

            let Some(remote) = snapshot.lookup(id).record() else {
                stage_create(&mut out, card, origin);
                continue;
            };
            seen.insert(id);

            if !remote.tags.contains(managed_tag) {
                out.batch.add_tag.push(id);
                out.summary.modified += 1;
                continue;
            }

            let mut modified = false;
            if remote.fields != card.fields {
                out.batch.update_fields.push((id, card.fields.clone()));
                modified = true;
            }
            if !snapshot.is_member(&card.group, id) {
                out.batch.change_group.push((id, card.group.clone()));
                modified = true;
            }
            if modified {
                out.summary.modified += 1;
            }
        }
    }

    out.batch.delete = snapshot
        .managed
        .iter()
        .filter(|id| !seen.contains(id))
        .copied()
        .collect();

    out.summary.added = out.batch.create.len();
    out.summary.deleted = out.batch.delete.len();
    out
}

fn stage_create(out: &mut SyncPlan, card: &FlashcardRecord, origin: CardRef) {
    out.batch.create.push(NewRecord {
        group: card.group.clone(),
        fields: card.fields.clone(),
    });
    out.origins.push(origin);
}
