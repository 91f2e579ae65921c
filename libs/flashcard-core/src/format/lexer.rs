//! Line classification for flashcard bodies.
//!
//! Each line is classified on its own; matching opening and closing fences
//! is left to the segment parser.

/// Fence families. A fence only closes a fence of the same family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceKind {
    Backtick,
    Tilde,
    Math,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Text(&'a str),
    Fence {
        kind: FenceKind,
        /// Text after the fence marker, trimmed.
        info: &'a str,
        line: &'a str,
    },
}

impl<'a> Token<'a> {
    /// The source line this token came from.
    pub fn line(&self) -> &'a str {
        match self {
            Self::Text(line) | Self::Fence { line, .. } => line,
        }
    }

    /// Whether this token can close a fence of `kind`.
    pub fn closes(&self, kind: FenceKind) -> bool {
        matches!(self, Self::Fence { kind: k, info, .. } if *k == kind && info.is_empty())
    }
}

const MATH_FENCE: &str = "$$";
const MIN_FENCE_LEN: usize = 3;

/// Classify every line of a body.
pub fn lex<L: AsRef<str>>(lines: &[L]) -> Vec<Token<'_>> {
    lines.iter().map(|line| classify(line.as_ref())).collect()
}

/// Classify a single line.
pub fn classify(line: &str) -> Token<'_> {
    let trimmed = line.trim();

    if trimmed == MATH_FENCE {
        return Token::Fence {
            kind: FenceKind::Math,
            info: "",
            line,
        };
    }

    let Some((marker, rest)) = split_fence_marker(trimmed) else {
        return Token::Text(line);
    };

    let kind = match marker {
        b'`' => {
            // Backtick fences cannot carry backticks in their info string.
            if rest.contains('`') {
                return Token::Text(line);
            }
            FenceKind::Backtick
        }
        _ => FenceKind::Tilde,
    };

    Token::Fence {
        kind,
        info: rest.trim(),
        line,
    }
}

fn split_fence_marker(trimmed: &str) -> Option<(u8, &str)> {
    let first = *trimmed.as_bytes().first()?;
    if first != b'`' && first != b'~' {
        return None;
    }
    let marker_len = trimmed.bytes().take_while(|byte| *byte == first).count();
    (marker_len >= MIN_FENCE_LEN).then(|| (first, &trimmed[marker_len..]))
}
