//! HTML rendering of body segments.

use pulldown_cmark::{html, Event, Options, Parser};

use super::inline::protect_math;
use super::lexer::{classify, FenceKind, Token};
use crate::types::BodySegment;

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options
}

/// Render markdown prose to HTML.
///
/// Every source line break is kept as a hard break.
pub fn render_markdown(source: &str) -> String {
    let parser = Parser::new_ext(source, options()).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });
    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Render one segment.
pub fn render_segment(segment: &BodySegment) -> String {
    match segment {
        BodySegment::Text { lines } => {
            let source: Vec<String> = lines.iter().map(|line| literal_fence(line)).collect();
            let protected = protect_math(&source.join("\n"));
            protected.restore(&render_markdown(&protected.text))
        }
        BodySegment::Code { language, .. } => {
            let code = escape_html(&segment.content());
            if language.is_empty() {
                format!("<pre><code>{code}</code></pre>\n")
            } else {
                format!(
                    "<pre><code class=\"language-{}\">{code}</code></pre>\n",
                    escape_html(language)
                )
            }
        }
        BodySegment::Math { .. } => {
            format!("\\[\n{}\n\\]\n", escape_html(&segment.content()))
        }
    }
}

/// A fence line left in text had no partner; keep the markdown renderer
/// from opening a code block that swallows the rest of the body.
fn literal_fence(line: &str) -> String {
    match classify(line) {
        Token::Fence {
            kind: FenceKind::Backtick | FenceKind::Tilde,
            ..
        } => {
            let indent = line.len() - line.trim_start().len();
            format!("{}\\{}", &line[..indent], &line[indent..])
        }
        _ => line.to_string(),
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
