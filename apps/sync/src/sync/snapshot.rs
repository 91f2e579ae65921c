//! Bulk fetch of remote state.

use std::collections::{BTreeSet, HashMap};

use flashcard_core::{
    groups_in_use, referenced_ids, FlashcardRecord, RecordId, RemoteLookup, RemoteSnapshot,
};

use crate::client::{validate_notes, Action, RecordStoreClient};
use crate::error::{Result, SyncError};

/// Escape a value for use inside a quoted search term.
///
/// `*` and `_` are wildcards in the store's search syntax and are escaped
/// so group names match literally.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '*' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Search for records carrying `tag`.
pub fn tag_query(tag: &str) -> String {
    format!("tag:\"{}\"", escape(tag))
}

/// Search for the direct members of `group`, subgroups excluded.
pub fn group_query(group: &str) -> String {
    let group = escape(group);
    format!("deck:\"{group}\" -deck:\"{group}::*\"")
}

/// Fetch everything planning needs in one round trip: the managed set,
/// every referenced record, and the members of every group in use.
pub async fn fetch_snapshot(
    client: &dyn RecordStoreClient,
    documents: &[Vec<FlashcardRecord>],
    managed_tag: &str,
) -> Result<RemoteSnapshot> {
    let ids: Vec<RecordId> = referenced_ids(documents).into_iter().collect();
    let groups: Vec<String> = groups_in_use(documents).into_iter().collect();

    let mut actions = vec![
        Action::FindNotes {
            query: tag_query(managed_tag),
        },
        Action::NotesInfo { notes: ids.clone() },
    ];
    actions.extend(groups.iter().map(|group| Action::FindNotes {
        query: group_query(group),
    }));

    tracing::debug!(
        records = ids.len(),
        groups = groups.len(),
        "fetching remote snapshot"
    );
    let mut responses = client.multi(actions).await?.into_iter();
    let mut next = || {
        responses
            .next()
            .ok_or_else(|| SyncError::Shape("snapshot response truncated".to_string()))
    };

    let managed: BTreeSet<RecordId> = next()?.decode("findNotes")?;
    let records = validate_notes(&ids, next()?.into_result("notesInfo")?)?;

    let mut members = HashMap::with_capacity(groups.len());
    for group in groups {
        let ids: BTreeSet<RecordId> = next()?.decode("findNotes")?;
        members.insert(group, ids);
    }

    for (id, lookup) in &records {
        if let RemoteLookup::Invalid(reason) = lookup {
            tracing::warn!(id, %reason, "remote record failed validation; it will be recreated");
        }
    }

    Ok(RemoteSnapshot {
        managed,
        records,
        groups: members,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn group_query_excludes_subgroups() {
        assert_eq!(
            group_query("Rust::Basics"),
            r#"deck:"Rust::Basics" -deck:"Rust::Basics::*""#
        );
    }

    #[test]
    fn group_query_escapes_wildcards() {
        assert_eq!(
            group_query("snake_case*"),
            r#"deck:"snake\_case\*" -deck:"snake\_case\*::*""#
        );
    }

    #[test]
    fn tag_query_is_quoted() {
        assert_eq!(tag_query("md-flashcard"), r#"tag:"md-flashcard""#);
    }
}
