//! Common test utilities for sync integration tests.
//!
//! - `FakeAnki`: in-memory record store answering the action protocol
//! - `MemoryVault`: in-memory document store
//! - helpers for building engines and documents

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use flashcard_sync::client::{Action, ActionResponse, ClientError, RecordStoreClient};
use flashcard_sync::store::{DocumentHandle, DocumentStore, StoreError};
use flashcard_sync::{Config, SyncEngine};

pub const TAG: &str = "md-flashcard";

/// Actions that change remote state.
pub const MUTATIONS: &[&str] = &[
    "addNote",
    "updateNoteFields",
    "changeDeck",
    "addTags",
    "deleteNotes",
    "createDeck",
    "createModel",
];

#[derive(Debug, Clone, PartialEq)]
pub struct FakeNote {
    pub deck: String,
    pub front: String,
    pub back: String,
    pub tags: BTreeSet<String>,
    pub cards: Vec<u64>,
}

#[derive(Default)]
struct FakeState {
    notes: BTreeMap<u64, FakeNote>,
    decks: BTreeSet<String>,
    models: BTreeSet<String>,
    next_id: u64,
    log: Vec<String>,
    rejected_actions: HashMap<String, String>,
    rejected_fronts: BTreeSet<String>,
}

/// Hook run once, right before the first `addNote` is handled.
type Hook = Box<dyn FnOnce() + Send>;

/// In-memory record store.
pub struct FakeAnki {
    state: Mutex<FakeState>,
    gate: Mutex<Option<Arc<Notify>>>,
    before_add: Mutex<Option<Hook>>,
}

impl Default for FakeAnki {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAnki {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                decks: BTreeSet::from(["Default".to_string()]),
                next_id: 1_700_000_000_000,
                ..Default::default()
            }),
            gate: Mutex::new(None),
            before_add: Mutex::new(None),
        }
    }

    /// Insert a note directly, bypassing the protocol.
    pub fn insert_note(&self, id: u64, deck: &str, front: &str, back: &str, tags: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.decks.insert(deck.to_string());
        state.notes.insert(
            id,
            FakeNote {
                deck: deck.to_string(),
                front: front.to_string(),
                back: back.to_string(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                cards: vec![id + 1],
            },
        );
    }

    pub fn note(&self, id: u64) -> Option<FakeNote> {
        self.state.lock().unwrap().notes.get(&id).cloned()
    }

    pub fn notes(&self) -> BTreeMap<u64, FakeNote> {
        self.state.lock().unwrap().notes.clone()
    }

    pub fn remove_note(&self, id: u64) {
        self.state.lock().unwrap().notes.remove(&id);
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.state.lock().unwrap().models.contains(name)
    }

    pub fn has_deck(&self, name: &str) -> bool {
        self.state.lock().unwrap().decks.contains(name)
    }

    /// Names of every action handled so far, `multi` unrolled.
    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn clear_log(&self) {
        self.state.lock().unwrap().log.clear();
    }

    pub fn mutations(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter(|name| MUTATIONS.contains(&name.as_str()))
            .collect()
    }

    /// Answer every `action` with an error.
    pub fn reject(&self, action: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .rejected_actions
            .insert(action.to_string(), message.to_string());
    }

    /// Reject `addNote` for records with this front.
    pub fn reject_front(&self, front: &str) {
        self.state
            .lock()
            .unwrap()
            .rejected_fronts
            .insert(front.to_string());
    }

    /// Block every request until the returned handle is notified.
    pub fn hold_requests(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn release_requests(&self) {
        *self.gate.lock().unwrap() = None;
    }

    pub fn before_first_add(&self, hook: impl FnOnce() + Send + 'static) {
        *self.before_add.lock().unwrap() = Some(Box::new(hook));
    }

    fn handle(&self, action: &Action) -> ActionResponse {
        if let Action::Multi { actions } = action {
            self.state.lock().unwrap().log.push("multi".to_string());
            let responses: Vec<ActionResponse> = actions.iter().map(|a| self.handle(a)).collect();
            return ActionResponse::ok(serde_json::to_value(responses).unwrap());
        }

        if matches!(action, Action::AddNote { .. }) {
            let hook = self.before_add.lock().unwrap().take();
            if let Some(hook) = hook {
                hook();
            }
        }

        let mut state = self.state.lock().unwrap();
        state.log.push(action.name().to_string());
        if let Some(message) = state.rejected_actions.get(action.name()) {
            return ActionResponse::err(message.clone());
        }

        match action {
            Action::Version => ActionResponse::ok(json!(6)),
            Action::DeckNames => ActionResponse::ok(json!(state.decks)),
            Action::CreateDeck { deck } => {
                state.decks.insert(deck.clone());
                ActionResponse::ok(json!(1))
            }
            Action::ModelNames => ActionResponse::ok(json!(state.models)),
            Action::CreateModel { model_name, .. } => {
                if !state.models.insert(model_name.clone()) {
                    return ActionResponse::err("Model name already exists");
                }
                ActionResponse::ok(json!({ "name": model_name }))
            }
            Action::UpdateModelTemplates { model } if state.models.contains(&model.name) => {
                ActionResponse::ok(Value::Null)
            }
            Action::UpdateModelStyling { model } if state.models.contains(&model.name) => {
                ActionResponse::ok(Value::Null)
            }
            Action::UpdateModelTemplates { .. } | Action::UpdateModelStyling { .. } => {
                ActionResponse::err("model was not found")
            }
            Action::AddNote { note } => {
                if !state.decks.contains(&note.deck_name) {
                    return ActionResponse::err(format!("deck was not found: {}", note.deck_name));
                }
                if !state.models.contains(&note.model_name) {
                    return ActionResponse::err(format!(
                        "model was not found: {}",
                        note.model_name
                    ));
                }
                let front = note.fields.get("Front").cloned().unwrap_or_default();
                if state.rejected_fronts.contains(&front) {
                    return ActionResponse::err("cannot create note");
                }
                let id = state.next_id;
                state.next_id += 10;
                state.notes.insert(
                    id,
                    FakeNote {
                        deck: note.deck_name.clone(),
                        front,
                        back: note.fields.get("Back").cloned().unwrap_or_default(),
                        tags: note.tags.iter().cloned().collect(),
                        cards: vec![id + 1],
                    },
                );
                ActionResponse::ok(json!(id))
            }
            Action::NotesInfo { notes } => {
                let infos: Vec<Value> = notes
                    .iter()
                    .map(|id| match state.notes.get(id) {
                        Some(note) => json!({
                            "noteId": id,
                            "modelName": "Markdown Flashcard",
                            "tags": note.tags,
                            "fields": {
                                "Front": { "value": note.front, "order": 0 },
                                "Back": { "value": note.back, "order": 1 }
                            },
                            "cards": note.cards
                        }),
                        None => json!({}),
                    })
                    .collect();
                ActionResponse::ok(json!(infos))
            }
            Action::UpdateNoteFields { note } => match state.notes.get_mut(&note.id) {
                Some(existing) => {
                    if let Some(front) = note.fields.get("Front") {
                        existing.front = front.clone();
                    }
                    if let Some(back) = note.fields.get("Back") {
                        existing.back = back.clone();
                    }
                    ActionResponse::ok(Value::Null)
                }
                None => ActionResponse::err("note was not found"),
            },
            Action::FindNotes { query } => {
                let ids: Vec<u64> = if let Some(tag) = first_quoted(query, "tag:") {
                    state
                        .notes
                        .iter()
                        .filter(|(_, n)| n.tags.contains(&tag))
                        .map(|(id, _)| *id)
                        .collect()
                } else if let Some(deck) = first_quoted(query, "deck:") {
                    state
                        .notes
                        .iter()
                        .filter(|(_, n)| n.deck == deck)
                        .map(|(id, _)| *id)
                        .collect()
                } else {
                    return ActionResponse::err(format!("unsupported query: {query}"));
                };
                ActionResponse::ok(json!(ids))
            }
            Action::AddTags { notes, tags } => {
                for id in notes {
                    if let Some(note) = state.notes.get_mut(id) {
                        note.tags.extend(tags.split_whitespace().map(str::to_string));
                    }
                }
                ActionResponse::ok(Value::Null)
            }
            Action::ChangeDeck { cards, deck } => {
                state.decks.insert(deck.clone());
                for note in state.notes.values_mut() {
                    if note.cards.iter().any(|c| cards.contains(c)) {
                        note.deck = deck.clone();
                    }
                }
                ActionResponse::ok(Value::Null)
            }
            Action::DeleteNotes { notes } => {
                for id in notes {
                    state.notes.remove(id);
                }
                ActionResponse::ok(Value::Null)
            }
            Action::Multi { .. } => unreachable!("handled above"),
        }
    }
}

/// The unescaped first quoted term after `prefix`.
fn first_quoted(query: &str, prefix: &str) -> Option<String> {
    let rest = query.strip_prefix(prefix)?.strip_prefix('"')?;
    let mut out = String::new();
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            '"' => return Some(out),
            c => out.push(c),
        }
    }
    None
}

#[async_trait]
impl RecordStoreClient for FakeAnki {
    async fn invoke(&self, action: &Action) -> Result<ActionResponse, ClientError> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(self.handle(action))
    }
}

/// In-memory document store: path -> (group, lines).
#[derive(Default)]
pub struct MemoryVault {
    docs: Mutex<BTreeMap<String, (Option<String>, Vec<String>)>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, path: &str, group: Option<&str>, content: &str) {
        self.docs.lock().unwrap().insert(
            path.to_string(),
            (
                group.map(str::to_string),
                content.lines().map(str::to_string).collect(),
            ),
        );
    }

    pub fn set_group(&self, path: &str, group: Option<&str>) {
        if let Some(doc) = self.docs.lock().unwrap().get_mut(path) {
            doc.0 = group.map(str::to_string);
        }
    }

    pub fn lines(&self, path: &str) -> Vec<String> {
        self.docs
            .lock()
            .unwrap()
            .get(path)
            .map(|doc| doc.1.clone())
            .unwrap_or_default()
    }

    pub fn set_lines(&self, path: &str, lines: Vec<String>) {
        if let Some(doc) = self.docs.lock().unwrap().get_mut(path) {
            doc.1 = lines;
        }
    }
}

impl DocumentStore for MemoryVault {
    fn list_documents(&self) -> Result<Vec<DocumentHandle>, StoreError> {
        Ok(self
            .docs
            .lock()
            .unwrap()
            .keys()
            .map(DocumentHandle::new)
            .collect())
    }

    fn read_lines(&self, handle: &DocumentHandle) -> Result<Vec<String>, StoreError> {
        self.docs
            .lock()
            .unwrap()
            .get(handle.as_str())
            .map(|doc| doc.1.clone())
            .ok_or_else(|| StoreError::NotFound(handle.to_string()))
    }

    fn write_lines(&self, handle: &DocumentHandle, lines: &[String]) -> Result<(), StoreError> {
        let mut docs = self.docs.lock().unwrap();
        let doc = docs
            .get_mut(handle.as_str())
            .ok_or_else(|| StoreError::NotFound(handle.to_string()))?;
        doc.1 = lines.to_vec();
        Ok(())
    }

    fn read_group_metadata(&self, handle: &DocumentHandle) -> Result<Option<String>, StoreError> {
        self.docs
            .lock()
            .unwrap()
            .get(handle.as_str())
            .map(|doc| doc.0.clone())
            .ok_or_else(|| StoreError::NotFound(handle.to_string()))
    }
}

pub fn engine(anki: &Arc<FakeAnki>) -> SyncEngine {
    engine_with(anki, Config::default())
}

pub fn engine_with(anki: &Arc<FakeAnki>, config: Config) -> SyncEngine {
    SyncEngine::new(anki.clone(), config)
}

/// The identifier annotated on a header line.
pub fn annotated_id(line: &str) -> Option<u64> {
    let start = line.find("%%")? + 2;
    let end = start + line[start..].find("%%")?;
    line[start..end].parse().ok()
}
