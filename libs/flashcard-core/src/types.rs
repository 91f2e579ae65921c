//! Core types for flashcard synchronization.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Remote record identifier.
pub type RecordId = u64;

/// Name of the field holding the card front.
pub const FRONT_FIELD: &str = "Front";

/// Name of the field holding the card back.
pub const BACK_FIELD: &str = "Back";

/// Front/back field pair as stored remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fields {
    #[serde(rename = "Front")]
    pub front: String,
    #[serde(rename = "Back")]
    pub back: String,
}

/// One flashcard as found in a document.
///
/// Built fresh on every parse pass and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashcardRecord {
    /// Remote identifier, if the card was synced before.
    pub identifier: Option<RecordId>,
    /// Zero-based index of the header line in the document.
    pub line_index: usize,
    pub title: String,
    /// Group (deck) the card belongs to, resolved per document.
    pub group: String,
    pub fields: Fields,
}

impl FlashcardRecord {
    pub fn new(
        identifier: Option<RecordId>,
        line_index: usize,
        title: String,
        back: String,
        group: &str,
    ) -> Self {
        Self {
            identifier,
            line_index,
            fields: Fields {
                front: title.clone(),
                back,
            },
            title,
            group: group.to_string(),
        }
    }
}

/// A record as fetched from the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub record_id: RecordId,
    pub tags: BTreeSet<String>,
    pub fields: Fields,
    /// Card ids belonging to the record, needed to move it between groups.
    pub cards: Vec<u64>,
}

/// Outcome of looking up one identifier in the bulk fetch response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteLookup {
    Found(RemoteRecord),
    /// No record with this id exists remotely.
    Missing,
    /// A record came back but failed structural validation.
    Invalid(String),
}

impl RemoteLookup {
    pub fn record(&self) -> Option<&RemoteRecord> {
        match self {
            Self::Found(record) => Some(record),
            Self::Missing | Self::Invalid(_) => None,
        }
    }
}

/// A contiguous piece of a flashcard body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySegment {
    Text {
        lines: Vec<String>,
    },
    Code {
        language: String,
        lines: Vec<String>,
        fence: FenceLines,
    },
    Math {
        lines: Vec<String>,
        fence: FenceLines,
    },
}

/// The verbatim opening and closing lines of a fenced block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FenceLines {
    pub open: String,
    pub close: String,
}

impl BodySegment {
    /// Inner text of a fenced segment, or the joined lines of a text segment.
    pub fn content(&self) -> String {
        match self {
            Self::Text { lines } | Self::Code { lines, .. } | Self::Math { lines, .. } => {
                lines.join("\n")
            }
        }
    }

    /// Reconstruct the source lines this segment was built from.
    pub fn source_lines(&self) -> Vec<String> {
        match self {
            Self::Text { lines } => lines.clone(),
            Self::Code { lines, fence, .. } | Self::Math { lines, fence } => {
                let mut out = Vec::with_capacity(lines.len() + 2);
                out.push(fence.open.clone());
                out.extend(lines.iter().cloned());
                out.push(fence.close.clone());
                out
            }
        }
    }
}

/// A record staged for creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub group: String,
    pub fields: Fields,
}

/// Pending operations for one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationBatch {
    pub create: Vec<NewRecord>,
    pub update_fields: Vec<(RecordId, Fields)>,
    pub change_group: Vec<(RecordId, String)>,
    pub add_tag: Vec<RecordId>,
    pub delete: Vec<RecordId>,
}

impl MutationBatch {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.update_fields.is_empty()
            && self.change_group.is_empty()
            && self.add_tag.is_empty()
            && self.delete.is_empty()
    }
}

/// Externally observable result of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
}
