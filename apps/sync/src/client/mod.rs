//! Record store client.
//!
//! The remote store speaks an action-oriented request/response protocol:
//! every request names one action with its parameters, every response
//! carries `{result, error}`. A `multi` action wraps a list of actions and
//! answers with one response per action, in order.

pub mod http;
pub mod records;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use flashcard_core::RecordId;

pub use http::AnkiConnectClient;
pub use records::{validate_notes, validate_record};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend error: {status} - {message}")]
    Backend { status: u16, message: String },

    #[error("{action} rejected: {message}")]
    Rejected { action: String, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Shape error: {0}")]
    Shape(String),
}

/// One request to the record store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", content = "params", rename_all = "camelCase")]
pub enum Action {
    Version,
    DeckNames,
    CreateDeck {
        deck: String,
    },
    ModelNames,
    #[serde(rename_all = "camelCase")]
    CreateModel {
        model_name: String,
        in_order_fields: Vec<String>,
        css: String,
        is_cloze: bool,
        card_templates: Vec<CardTemplate>,
    },
    UpdateModelTemplates {
        model: ModelTemplates,
    },
    UpdateModelStyling {
        model: ModelStyling,
    },
    AddNote {
        note: NoteSpec,
    },
    NotesInfo {
        notes: Vec<RecordId>,
    },
    UpdateNoteFields {
        note: NoteFieldsUpdate,
    },
    FindNotes {
        query: String,
    },
    AddTags {
        notes: Vec<RecordId>,
        tags: String,
    },
    ChangeDeck {
        cards: Vec<u64>,
        deck: String,
    },
    DeleteNotes {
        notes: Vec<RecordId>,
    },
    Multi {
        actions: Vec<Action>,
    },
}

impl Action {
    /// Protocol name of the action.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::DeckNames => "deckNames",
            Self::CreateDeck { .. } => "createDeck",
            Self::ModelNames => "modelNames",
            Self::CreateModel { .. } => "createModel",
            Self::UpdateModelTemplates { .. } => "updateModelTemplates",
            Self::UpdateModelStyling { .. } => "updateModelStyling",
            Self::AddNote { .. } => "addNote",
            Self::NotesInfo { .. } => "notesInfo",
            Self::UpdateNoteFields { .. } => "updateNoteFields",
            Self::FindNotes { .. } => "findNotes",
            Self::AddTags { .. } => "addTags",
            Self::ChangeDeck { .. } => "changeDeck",
            Self::DeleteNotes { .. } => "deleteNotes",
            Self::Multi { .. } => "multi",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CardTemplate {
    pub name: String,
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelTemplates {
    pub name: String,
    pub templates: BTreeMap<String, TemplateSides>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateSides {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelStyling {
    pub name: String,
    pub css: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSpec {
    pub deck_name: String,
    pub model_name: String,
    pub fields: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub options: NoteOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteOptions {
    pub allow_duplicate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteFieldsUpdate {
    pub id: RecordId,
    pub fields: BTreeMap<String, String>,
}

/// Response envelope for one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl ActionResponse {
    pub fn ok(result: Value) -> Self {
        Self {
            result,
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            result: Value::Null,
            error: Some(message.into()),
        }
    }

    /// The result value, or the action's error.
    pub fn into_result(self, action: &str) -> Result<Value, ClientError> {
        match self.error {
            Some(message) => Err(ClientError::Rejected {
                action: action.to_string(),
                message,
            }),
            None => Ok(self.result),
        }
    }

    /// Decode the result value as `T`, or return the action's error.
    pub fn decode<T: DeserializeOwned>(self, action: &str) -> Result<T, ClientError> {
        let value = self.into_result(action)?;
        serde_json::from_value(value)
            .map_err(|e| ClientError::Decode(format!("{action}: {e}")))
    }
}

/// Transport to the record store.
#[async_trait]
pub trait RecordStoreClient: Send + Sync {
    /// Send one action and return its response envelope.
    async fn invoke(&self, action: &Action) -> Result<ActionResponse, ClientError>;

    /// Send several actions in one round trip.
    ///
    /// Responses are matched to `actions` by position. A count mismatch is
    /// a shape error; per-action errors are left in the envelopes.
    async fn multi(&self, actions: Vec<Action>) -> Result<Vec<ActionResponse>, ClientError> {
        if actions.is_empty() {
            return Ok(Vec::new());
        }
        let sent = actions.len();
        let responses: Vec<ActionResponse> = self
            .invoke(&Action::Multi { actions })
            .await?
            .decode("multi")?;
        if responses.len() != sent {
            return Err(ClientError::Shape(format!(
                "multi returned {} results for {} actions",
                responses.len(),
                sent
            )));
        }
        Ok(responses)
    }
}
