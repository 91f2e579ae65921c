//! Flashcard body formatting.
//!
//! A body is lexed line by line, grouped into text, code and math
//! segments, and each segment is rendered to the HTML the remote store
//! displays. Unterminated fences stay in the surrounding text.

pub mod inline;
pub mod lexer;
pub mod render;

use crate::types::{BodySegment, FenceLines};
use lexer::{lex, FenceKind, Token};

pub use render::{render_markdown, render_segment};

/// Split body lines into segments, in order.
pub fn segment_body<L: AsRef<str>>(lines: &[L]) -> Vec<BodySegment> {
    let tokens = lex(lines);
    let mut segments = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    let mut idx = 0;

    while idx < tokens.len() {
        let token = tokens[idx];
        let Token::Fence { kind, info, line } = token else {
            pending.push(token.line().to_string());
            idx += 1;
            continue;
        };

        let close = tokens[idx + 1..]
            .iter()
            .position(|t| t.closes(kind))
            .map(|offset| idx + 1 + offset);

        let Some(close) = close else {
            // No matching close: the fence line is ordinary text.
            pending.push(line.to_string());
            idx += 1;
            continue;
        };

        if !pending.is_empty() {
            segments.push(BodySegment::Text {
                lines: std::mem::take(&mut pending),
            });
        }

        let inner: Vec<String> = tokens[idx + 1..close]
            .iter()
            .map(|t| t.line().to_string())
            .collect();
        let fence = FenceLines {
            open: line.to_string(),
            close: tokens[close].line().to_string(),
        };
        segments.push(match kind {
            FenceKind::Math => BodySegment::Math {
                lines: inner,
                fence,
            },
            FenceKind::Backtick | FenceKind::Tilde => BodySegment::Code {
                language: info.split_whitespace().next().unwrap_or_default().to_string(),
                lines: inner,
                fence,
            },
        });
        idx = close + 1;
    }

    if !pending.is_empty() {
        segments.push(BodySegment::Text { lines: pending });
    }

    segments
}

/// Render a flashcard body to HTML.
pub fn format_body<L: AsRef<str>>(lines: &[L]) -> String {
    let rendered: String = segment_body(lines).iter().map(render_segment).collect();
    rendered.trim_end().to_string()
}
