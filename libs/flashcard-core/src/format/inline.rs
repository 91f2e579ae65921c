//! Inline code and math protection.
//!
//! The markdown renderer would treat `_`, `*` and `\` inside math as
//! markup. Inline math spans are swapped for opaque placeholder tokens
//! before rendering and restored afterwards. Inline code spans are left
//! exactly as written so the renderer handles them itself.

use uuid::Uuid;

use super::render::escape_html;

/// Text with its inline math spans replaced by placeholders.
#[derive(Debug)]
pub struct Protected {
    pub text: String,
    substitutions: Vec<(String, String)>,
}

impl Protected {
    /// Replace every placeholder in rendered output with its math wrapper.
    pub fn restore(&self, rendered: &str) -> String {
        self.substitutions
            .iter()
            .fold(rendered.to_string(), |acc, (token, math)| {
                acc.replace(token.as_str(), math)
            })
    }
}

/// Swap inline math spans for placeholders, skipping inline code spans.
pub fn protect_math(input: &str) -> Protected {
    let bytes = input.as_bytes();
    let mut text = String::with_capacity(input.len());
    let mut substitutions = Vec::new();
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'`' if !is_escaped(bytes, i) => {
                let run = run_length(bytes, i, b'`');
                i = match find_code_close(bytes, i + run, run) {
                    Some(close) => close + run,
                    None => i + run,
                };
            }
            b'$' if !is_escaped(bytes, i) => {
                let delim = if bytes.get(i + 1) == Some(&b'$') { 2 } else { 1 };
                match find_math_close(bytes, i + delim, delim) {
                    Some(close) => {
                        text.push_str(&input[copied..i]);
                        let token = placeholder();
                        text.push_str(&token);
                        substitutions.push((token, wrap_math(&input[i + delim..close], delim)));
                        i = close + delim;
                        copied = i;
                    }
                    None => i += delim,
                }
            }
            _ => i += 1,
        }
    }
    text.push_str(&input[copied..]);

    Protected {
        text,
        substitutions,
    }
}

/// A byte is escaped when an odd number of backslashes precede it.
pub fn is_escaped(bytes: &[u8], pos: usize) -> bool {
    let backslashes = bytes[..pos]
        .iter()
        .rev()
        .take_while(|b| **b == b'\\')
        .count();
    backslashes % 2 == 1
}

fn run_length(bytes: &[u8], start: usize, byte: u8) -> usize {
    bytes[start..].iter().take_while(|b| **b == byte).count()
}

fn find_code_close(bytes: &[u8], from: usize, len: usize) -> Option<usize> {
    let mut j = from;
    while j < bytes.len() {
        if bytes[j] != b'`' {
            j += 1;
            continue;
        }
        if is_escaped(bytes, j) {
            j += 1;
            continue;
        }
        let run = run_length(bytes, j, b'`');
        if run == len {
            return Some(j);
        }
        j += run;
    }
    None
}

fn find_math_close(bytes: &[u8], from: usize, delim: usize) -> Option<usize> {
    // `$ 5` and `$5 and $` read as currency, not math.
    if delim == 1 && bytes.get(from).map_or(true, u8::is_ascii_whitespace) {
        return None;
    }

    let mut j = from;
    while j < bytes.len() {
        if bytes[j] != b'$' || is_escaped(bytes, j) {
            j += 1;
            continue;
        }
        if delim == 2 {
            if bytes.get(j + 1) == Some(&b'$') && j > from {
                return Some(j);
            }
            j += 1;
            continue;
        }
        let closes = j > from
            && !bytes[j - 1].is_ascii_whitespace()
            && !bytes.get(j + 1).is_some_and(u8::is_ascii_digit);
        if closes {
            return Some(j);
        }
        j += 1;
    }
    None
}

fn placeholder() -> String {
    format!("MATHPLACEHOLDER{}", Uuid::new_v4().simple())
}

fn wrap_math(latex: &str, delim: usize) -> String {
    let latex = escape_html(latex);
    if delim == 2 {
        format!("\\[{latex}\\]")
    } else {
        format!("\\({latex}\\)")
    }
}
