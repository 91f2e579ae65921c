//! Submission of a mutation batch.
//!
//! Creates go out first and on their own so their identifiers can be
//! written back before anything else runs. The remaining mutations follow
//! in a fixed order: field updates, group moves, tagging, deletion.

use std::collections::BTreeMap;

use flashcard_core::{MutationBatch, NewRecord, RecordId, RemoteSnapshot, BACK_FIELD, FRONT_FIELD};

use crate::client::{Action, NoteFieldsUpdate, NoteOptions, NoteSpec, RecordStoreClient};
use crate::error::{Result, SyncError};

/// Result of submitting the creates of a batch.
#[derive(Debug, Default)]
pub struct CreateOutcome {
    /// Identifier per staged create, by position; `None` where the create
    /// failed or was never sent.
    pub ids: Vec<Option<RecordId>>,
    /// First failure, surfaced after the successful identifiers are persisted.
    pub error: Option<SyncError>,
}

impl CreateOutcome {
    pub fn created(&self) -> usize {
        self.ids.iter().flatten().count()
    }

    fn fail(&mut self, error: SyncError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

/// Build the create request for one staged record.
pub fn add_note(record: &NewRecord, model_name: &str, managed_tag: &str) -> Action {
    Action::AddNote {
        note: NoteSpec {
            deck_name: record.group.clone(),
            model_name: model_name.to_string(),
            fields: BTreeMap::from([
                (FRONT_FIELD.to_string(), record.fields.front.clone()),
                (BACK_FIELD.to_string(), record.fields.back.clone()),
            ]),
            tags: vec![managed_tag.to_string()],
            // Identity is the annotation, not the content.
            options: NoteOptions {
                allow_duplicate: true,
            },
        },
    }
}

/// Submit every staged create, `chunk_size` actions per request.
///
/// Never fails outright: a rejected create or a failed request is recorded
/// in the outcome and stops further requests, keeping whatever was already
/// created.
pub async fn submit_creates(
    client: &dyn RecordStoreClient,
    creates: &[NewRecord],
    model_name: &str,
    managed_tag: &str,
    chunk_size: usize,
) -> CreateOutcome {
    let mut outcome = CreateOutcome {
        ids: vec![None; creates.len()],
        error: None,
    };

    let mut offset = 0;
    for chunk in creates.chunks(chunk_size.max(1)) {
        let actions = chunk
            .iter()
            .map(|record| add_note(record, model_name, managed_tag))
            .collect();
        tracing::debug!(count = chunk.len(), "submitting creates");

        let responses = match client.multi(actions).await {
            Ok(responses) => responses,
            Err(e) => {
                outcome.error = Some(e.into());
                return outcome;
            }
        };

        for (i, response) in responses.into_iter().enumerate() {
            match response.decode::<Option<RecordId>>("addNote") {
                Ok(Some(id)) => outcome.ids[offset + i] = Some(id),
                Ok(None) => outcome.fail(SyncError::Shape(
                    "addNote returned no identifier".to_string(),
                )),
                Err(e) => {
                    tracing::warn!(
                        group = %chunk[i].group,
                        front = %chunk[i].fields.front,
                        error = %e,
                        "create rejected"
                    );
                    outcome.fail(e.into());
                }
            }
        }
        if outcome.error.is_some() {
            return outcome;
        }
        offset += chunk.len();
    }
    outcome
}

/// Requests for everything in the batch except creates, in submission order.
pub fn mutation_actions(
    batch: &MutationBatch,
    snapshot: &RemoteSnapshot,
    managed_tag: &str,
) -> Vec<Action> {
    let mut actions: Vec<Action> = batch
        .update_fields
        .iter()
        .map(|(id, fields)| Action::UpdateNoteFields {
            note: NoteFieldsUpdate {
                id: *id,
                fields: BTreeMap::from([
                    (FRONT_FIELD.to_string(), fields.front.clone()),
                    (BACK_FIELD.to_string(), fields.back.clone()),
                ]),
            },
        })
        .collect();

    // Groups hold cards, not records
    let mut moves: BTreeMap<&str, Vec<u64>> = BTreeMap::new();
    for (id, group) in &batch.change_group {
        if let Some(record) = snapshot.lookup(*id).record() {
            moves
                .entry(group.as_str())
                .or_default()
                .extend(record.cards.iter().copied());
        }
    }
    actions.extend(
        moves
            .into_iter()
            .filter(|(_, cards)| !cards.is_empty())
            .map(|(group, cards)| Action::ChangeDeck {
                cards,
                deck: group.to_string(),
            }),
    );

    if !batch.add_tag.is_empty() {
        actions.push(Action::AddTags {
            notes: batch.add_tag.clone(),
            tags: managed_tag.to_string(),
        });
    }
    if !batch.delete.is_empty() {
        actions.push(Action::DeleteNotes {
            notes: batch.delete.clone(),
        });
    }
    actions
}

/// Submit `actions` in order, `chunk_size` per request, stopping at the
/// first rejected action.
pub async fn submit_actions(
    client: &dyn RecordStoreClient,
    actions: Vec<Action>,
    chunk_size: usize,
) -> Result<()> {
    let mut pending = actions.into_iter().peekable();
    while pending.peek().is_some() {
        let chunk: Vec<Action> = pending.by_ref().take(chunk_size.max(1)).collect();
        let names: Vec<&'static str> = chunk.iter().map(Action::name).collect();
        tracing::debug!(count = chunk.len(), "submitting mutations");

        let responses = client.multi(chunk).await?;
        for (name, response) in names.into_iter().zip(responses) {
            response.into_result(name)?;
        }
    }
    Ok(())
}
