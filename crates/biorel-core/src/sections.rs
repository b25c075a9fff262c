//! Invalid and title section detection
//!
//! Clinical notes are split into sections delimited by marker lines such as
//! `[start section id="20104"]` and `[end section id="20104"]`. Sections
//! whose id is configured as invalid carry no usable annotations.

use tracing::debug;

use crate::document::Document;

/// Section ids excluded by default
pub const DEFAULT_INVALID_SECTIONS: [u32; 4] = [20104, 20105, 20116, 20138];

fn start_marker(section: u32) -> String {
    format!("[start section id=\"{section}\"]")
}

fn end_marker(section: u32) -> String {
    format!("[end section id=\"{section}\"]")
}

/// Recompute the invalid sentences of a document.
///
/// Sentences from a start marker of an invalid section up to and including
/// its end marker are invalid, as is any `[meta ...]` sentence.
pub fn mark_invalid_sections(doc: &mut Document, invalid_sections: &[u32]) {
    let starts: Vec<String> = invalid_sections.iter().copied().map(start_marker).collect();
    let ends: Vec<String> = invalid_sections.iter().copied().map(end_marker).collect();

    doc.invalid_sids.clear();
    let mut valid = true;
    for sentence in &doc.sentences {
        let text = sentence.text.trim();
        if starts.iter().any(|m| m == text) {
            valid = false;
        }
        if !valid || text.starts_with("[meta") {
            doc.invalid_sids.insert(sentence.sid.clone());
        }
        if ends.iter().any(|m| m == text) {
            valid = true;
        }
    }
    debug!(did = %doc.did, invalid = ?doc.invalid_sids, "invalid sentences");
}

/// Recompute the title sentences of a document
pub fn mark_title_sentences(doc: &mut Document) {
    doc.title_sids = doc
        .sentences
        .iter()
        .filter(|s| {
            let text = s.text.trim();
            (text.starts_with('[') && text.ends_with(']')) || is_title_case(text)
        })
        .map(|s| s.sid.clone())
        .collect();
    debug!(did = %doc.did, titles = ?doc.title_sids, "title sentences");
}

/// Title case: every cased run starts with an uppercase letter and continues
/// in lowercase, and at least one cased character is present.
pub fn is_title_case(text: &str) -> bool {
    let mut cased = false;
    let mut previous_cased = false;
    for c in text.chars() {
        if c.is_uppercase() {
            if previous_cased {
                return false;
            }
            previous_cased = true;
            cased = true;
        } else if c.is_lowercase() {
            if !previous_cased {
                return false;
            }
            previous_cased = true;
            cased = true;
        } else {
            previous_cased = false;
        }
    }
    cased
}

// ============================================================================
// Tests
// ============================================================================
