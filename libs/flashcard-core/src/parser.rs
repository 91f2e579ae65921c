//! Flashcard block parser for markdown documents.
//!
//! # Format
//! ```markdown
//! > [!flashcard] %%1700000000001%% What is Rust?
//! > A systems programming language.
//! > Multiple quoted lines are supported.
//!
//! > [!flashcard] A card that has not been synced yet
//! > Its answer.
//! ```
//!
//! A card starts at a callout header and owns every following line that
//! begins with `>` up to the first unquoted line or the next header.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::format::format_body;
use crate::types::{FlashcardRecord, RecordId};

/// Callout header grammar. `marker` ends where an identifier annotation is spliced in.
pub(crate) static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<marker>>\s?\[!(?i:flashcard)\][+-]?)(?:\s*(?P<annotation>%%(?P<id>\d+)%%))?\s*(?P<title>.*?)\s*$",
    )
    .expect("header pattern is valid")
});

const QUOTE: char = '>';

/// Identifier and title read from a header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preamble {
    pub identifier: Option<RecordId>,
    pub title: String,
}

/// Recognize a flashcard header line.
///
/// Returns `None` for anything outside the header grammar, including an
/// identifier annotation whose digits do not fit a record id.
pub fn scan_preamble(line: &str) -> Option<Preamble> {
    let caps = HEADER_RE.captures(line)?;
    let identifier = match caps.name("id") {
        Some(digits) => Some(digits.as_str().parse::<RecordId>().ok()?),
        None => None,
    };
    let title = caps.name("title").map_or("", |m| m.as_str()).to_string();
    Some(Preamble { identifier, title })
}

/// Collect the quoted body lines that follow a header.
///
/// Each returned line has its quote marker and at most one following space
/// removed. Stops at the first unquoted line or the next header, including
/// a header whose annotation is not a valid record id.
pub fn extract_body<L: AsRef<str>>(following: &[L]) -> Vec<String> {
    following
        .iter()
        .map(AsRef::as_ref)
        .take_while(|line| line.starts_with(QUOTE) && !HEADER_RE.is_match(line))
        .map(strip_quote)
        .collect()
}

fn strip_quote(line: &str) -> String {
    let rest = &line[QUOTE.len_utf8()..];
    rest.strip_prefix(' ').unwrap_or(rest).to_string()
}

/// Parse every flashcard in a document, in document order.
pub fn parse_document<L: AsRef<str>>(lines: &[L], group: &str) -> Vec<FlashcardRecord> {
    let mut cards = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        let Some(preamble) = scan_preamble(lines[idx].as_ref()) else {
            idx += 1;
            continue;
        };

        // Header without a title
        if preamble.title.is_empty() {
            idx += 1;
            continue;
        }

        let body = extract_body(&lines[idx + 1..]);
        let consumed = body.len();
        cards.push(FlashcardRecord::new(
            preamble.identifier,
            idx,
            preamble.title,
            format_body(&body),
            group,
        ));
        idx += 1 + consumed;
    }

    cards
}
