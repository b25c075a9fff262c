//! Character spans
//!
//! All offsets in biorel count Unicode scalar values, which is what the
//! corpus annotation formats use. Byte offsets only appear at the moment a
//! `&str` is sliced.

use serde::{Deserialize, Serialize};

use crate::{BiorelError, Result};

/// Half-open character range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Create a new span
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True if `other` lies entirely inside this span
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Move the span right by `offset` characters
    pub fn shift(&self, offset: usize) -> Span {
        Span::new(self.start + offset, self.end + offset)
    }

    /// Move the span left by `offset` characters, `None` if it would underflow
    pub fn unshift(&self, offset: usize) -> Option<Span> {
        Some(Span::new(
            self.start.checked_sub(offset)?,
            self.end.checked_sub(offset)?,
        ))
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Smallest span covering every fragment, `None` for an empty slice
pub fn covering(fragments: &[Span]) -> Option<Span> {
    let start = fragments.iter().map(|s| s.start).min()?;
    let end = fragments.iter().map(|s| s.end).max()?;
    Some(Span::new(start, end))
}

/// Number of characters in `text`
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Slice `text` by a character span
pub fn char_slice(text: &str, span: Span) -> Option<&str> {
    if span.start > span.end {
        return None;
    }
    let start = byte_index(text, span.start)?;
    let end = byte_index(text, span.end)?;
    text.get(start..end)
}

/// Byte index of the `char_idx`-th character; `text.len()` for one past the end
fn byte_index(text: &str, char_idx: usize) -> Option<usize> {
    if char_idx == 0 {
        return Some(0);
    }
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .nth(char_idx)
}

/// Parse a miRNA-style `charOffset` attribute: `"a-b"` or `"a-b;c-d"`.
///
/// With `inclusive_end` the second number names the last character, so one
/// is added to make the span half-open.
pub fn parse_char_offsets(spec: &str, inclusive_end: bool) -> Result<Vec<Span>> {
    parse_fragments(spec, '-', inclusive_end)
}

/// Parse a BioNLP standoff offset list: `"a b"` or `"a b;c d"`
pub fn parse_standoff_offsets(spec: &str) -> Result<Vec<Span>> {
    parse_fragments(spec, ' ', false)
}

/// Parse an Anafora `<span>` value: `"a,b"` or `"a,b;c,d"`
pub fn parse_anafora_span(spec: &str) -> Result<Vec<Span>> {
    parse_fragments(spec, ',', false)
}

fn parse_fragments(spec: &str, separator: char, inclusive_end: bool) -> Result<Vec<Span>> {
    let invalid = || BiorelError::InvalidOffset(spec.to_string());

    let mut fragments = Vec::new();
    for part in spec.split(';') {
        let part = part.trim();
        let (start, end) = part.split_once(separator).ok_or_else(invalid)?;
        let start: usize = start.trim().parse().map_err(|_| invalid())?;
        let mut end: usize = end.trim().parse().map_err(|_| invalid())?;
        if inclusive_end {
            end = end.checked_add(1).ok_or_else(invalid)?;
        }
        if end < start {
            return Err(invalid());
        }
        fragments.push(Span::new(start, end));
    }
    Ok(fragments)
}

// ============================================================================
// Tests
// ============================================================================
