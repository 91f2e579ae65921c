//! Validation of bulk-fetched records.

use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

use flashcard_core::{Fields, RecordId, RemoteLookup, RemoteRecord, BACK_FIELD, FRONT_FIELD};

use super::ClientError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoteInfo {
    note_id: RecordId,
    tags: Vec<String>,
    fields: HashMap<String, FieldValue>,
    cards: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct FieldValue {
    value: String,
}

/// Classify one entry of a bulk fetch response.
///
/// The store answers unknown ids with an empty object; anything that is
/// neither that nor a complete note is invalid.
pub fn validate_record(id: RecordId, value: &Value) -> RemoteLookup {
    match value {
        Value::Null => return RemoteLookup::Missing,
        Value::Object(map) if map.is_empty() => return RemoteLookup::Missing,
        _ => {}
    }

    let note: NoteInfo = match serde_json::from_value(value.clone()) {
        Ok(note) => note,
        Err(e) => return RemoteLookup::Invalid(e.to_string()),
    };
    if note.note_id != id {
        return RemoteLookup::Invalid(format!("requested {id}, received {}", note.note_id));
    }

    let field = |name: &str| note.fields.get(name).map(|f| f.value.clone());
    let (Some(front), Some(back)) = (field(FRONT_FIELD), field(BACK_FIELD)) else {
        return RemoteLookup::Invalid(format!("record {id} lacks {FRONT_FIELD}/{BACK_FIELD}"));
    };

    RemoteLookup::Found(RemoteRecord {
        record_id: id,
        tags: note.tags.into_iter().collect::<BTreeSet<_>>(),
        fields: Fields { front, back },
        cards: note.cards,
    })
}

/// Validate a bulk fetch response against the ids it was requested for.
pub fn validate_notes(
    ids: &[RecordId],
    result: Value,
) -> Result<HashMap<RecordId, RemoteLookup>, ClientError> {
    let Value::Array(entries) = result else {
        return Err(ClientError::Shape("notesInfo result is not a list".to_string()));
    };
    if entries.len() != ids.len() {
        return Err(ClientError::Shape(format!(
            "notesInfo returned {} records for {} ids",
            entries.len(),
            ids.len()
        )));
    }

    Ok(ids
        .iter()
        .zip(entries.iter())
        .map(|(id, entry)| (*id, validate_record(*id, entry)))
        .collect())
}
