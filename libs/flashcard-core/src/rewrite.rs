//! Identifier write-back into document lines.

use crate::error::{Result, RewriteError};
use crate::parser::HEADER_RE;
use crate::types::RecordId;

/// An identifier to splice into the header it was created from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAssignment {
    /// Header line index at parse time.
    pub line_index: usize,
    /// Header text at parse time, used to find the header if the document moved.
    pub header: String,
    /// Rank of the header among the lines with identical text at parse time.
    pub occurrence: usize,
    /// Number of lines with identical text at parse time.
    pub occurrences: usize,
    pub identifier: RecordId,
}

impl IdAssignment {
    /// Assignment for the header at `line_index` of the lines it was parsed from.
    pub fn at<L: AsRef<str>>(lines: &[L], line_index: usize, identifier: RecordId) -> Self {
        let header = lines
            .get(line_index)
            .map_or("", AsRef::as_ref)
            .to_string();
        let same = |line: &L| line.as_ref() == header;
        Self {
            occurrence: lines[..line_index.min(lines.len())]
                .iter()
                .filter(|line| same(*line))
                .count(),
            occurrences: lines.iter().filter(|line| same(*line)).count(),
            line_index,
            header,
            identifier,
        }
    }
}

/// Result of applying assignments to one document.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub applied: usize,
    /// Assignments whose header could not be found.
    pub unplaced: Vec<IdAssignment>,
}

/// Write `id` into a header line right after the callout marker.
///
/// An existing annotation is replaced; the title is kept as is.
pub fn annotate_header(line: &str, line_index: usize, id: RecordId) -> Result<String> {
    let caps = HEADER_RE
        .captures(line)
        .ok_or_else(|| RewriteError::NotAHeader {
            line: line_index,
            text: line.to_string(),
        })?;
    let annotation = format!("%%{id}%%");

    if let Some(existing) = caps.name("annotation") {
        return Ok(format!(
            "{}{annotation}{}",
            &line[..existing.start()],
            &line[existing.end()..]
        ));
    }

    let marker_end = caps.name("marker").map_or(0, |m| m.end());
    let rest = &line[marker_end..];
    let separator = if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        ""
    } else {
        " "
    };
    Ok(format!(
        "{} {annotation}{separator}{rest}",
        &line[..marker_end]
    ))
}

/// Splice identifiers into `lines`.
///
/// When `in_place` is set the document is known to be unchanged since it
/// was parsed, and each header is taken at its recorded index. Otherwise
/// headers are located by their original text and occurrence rank; a
/// header whose text now appears a different number of times is ambiguous
/// and left unplaced.
pub fn apply_assignments(
    lines: &mut [String],
    assignments: &[IdAssignment],
    in_place: bool,
) -> RewriteOutcome {
    let mut outcome = RewriteOutcome::default();

    // Targets are resolved before any splice changes the text being matched
    let targets: Vec<Option<usize>> = assignments
        .iter()
        .map(|assignment| {
            if in_place {
                Some(assignment.line_index)
            } else {
                relocate(lines, assignment)
            }
        })
        .collect();

    for (assignment, target) in assignments.iter().zip(targets) {
        let spliced = target
            .ok_or(RewriteError::OutOfRange {
                line: assignment.line_index,
                len: lines.len(),
            })
            .and_then(|idx| {
                let line = lines.get(idx).ok_or(RewriteError::OutOfRange {
                    line: idx,
                    len: lines.len(),
                })?;
                annotate_header(line, idx, assignment.identifier).map(|text| (idx, text))
            });

        match spliced {
            Ok((idx, text)) => {
                lines[idx] = text;
                outcome.applied += 1;
            }
            Err(_) => outcome.unplaced.push(assignment.clone()),
        }
    }

    outcome
}

fn relocate(lines: &[String], assignment: &IdAssignment) -> Option<usize> {
    let matches: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| **line == assignment.header)
        .map(|(idx, _)| idx)
        .collect();
    if matches.len() != assignment.occurrences {
        return None;
    }
    matches.get(assignment.occurrence).copied()
}
