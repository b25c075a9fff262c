//! Document model
//!
//! A [`Document`] owns its text and an ordered list of [`Sentence`]s. Each
//! sentence keeps the entities aligned onto it, grouped by the annotation
//! source that produced them (`goldstandard` for corpus annotations).
//! Entity spans are stored twice: relative to the sentence and relative to
//! the document.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::pair::Pair;
use crate::span::{char_len, char_slice, covering, Span};
use crate::{BiorelError, Result};

/// Annotation source name used for gold-standard corpus annotations
pub const GOLD_STANDARD: &str = "goldstandard";

static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\w+(?:[-']\w+)*|[^\w\s]").expect("token pattern is a valid regex")
});

// ============================================================================
// Tokens and Entities
// ============================================================================

/// A token of a sentence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    /// Sentence-relative character span
    pub span: Span,
    pub lemma: String,
    pub pos: Option<String>,
}

/// A relation edge from an entity to one of its targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTarget {
    /// Target entity id
    pub eid: String,
    /// Relation label, lowercase
    pub relation: String,
}

/// An annotated entity aligned onto a sentence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Internal identifier, `"{sid}.e{n}"`
    pub eid: String,
    pub sid: String,
    pub did: String,
    /// Sentence-relative span covering every fragment
    pub span: Span,
    /// Document-relative span
    pub dspan: Span,
    /// Sentence-relative fragments; more than one for discontinuous entities
    pub fragments: Vec<Span>,
    /// Entity type, lowercase
    pub etype: String,
    pub text: String,
    /// Identifier used by the external annotation file
    pub original_id: Option<String>,
    pub targets: Vec<RelationTarget>,
}

impl Entity {
    /// True if this entity lists `eid` as a target with the given relation
    pub fn has_target(&self, eid: &str, relation: &str) -> bool {
        self.targets
            .iter()
            .any(|t| t.eid == eid && t.relation.eq_ignore_ascii_case(relation))
    }

    pub fn is_multi_span(&self) -> bool {
        self.fragments.len() > 1
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.eid, self.etype, self.text)
    }
}

// ============================================================================
// Sentence
// ============================================================================

/// A sentence of a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sentence {
    pub sid: String,
    pub did: String,
    pub text: String,
    /// Character offset of this sentence inside the document text
    pub offset: usize,
    /// Annotation source -> entities
    pub entities: BTreeMap<String, Vec<Entity>>,
    pub tokens: Vec<Token>,
    next_entity: usize,
}

impl Sentence {
    /// Create a new sentence
    pub fn new(
        text: impl Into<String>,
        offset: usize,
        sid: impl Into<String>,
        did: impl Into<String>,
    ) -> Self {
        Self {
            sid: sid.into(),
            did: did.into(),
            text: text.into(),
            offset,
            entities: BTreeMap::new(),
            tokens: Vec::new(),
            next_entity: 0,
        }
    }

    /// Length of the sentence in characters
    pub fn char_len(&self) -> usize {
        char_len(&self.text)
    }

    /// Document-relative span of the sentence
    pub fn doc_span(&self) -> Span {
        Span::new(self.offset, self.offset + self.char_len())
    }

    /// Entities of one annotation source
    pub fn entities(&self, source: &str) -> &[Entity] {
        self.entities.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tag an entity from sentence-relative fragments; returns its eid.
    ///
    /// When the annotated `text` differs from the sentence slice the
    /// mismatch is logged and the annotated text is kept.
    pub fn tag_entity(
        &mut self,
        fragments: &[Span],
        etype: &str,
        text: Option<&str>,
        original_id: Option<&str>,
        source: &str,
    ) -> Result<String> {
        let span = covering(fragments)
            .ok_or_else(|| BiorelError::InvalidOffset("empty fragment list".to_string()))?;
        let len = self.char_len();
        if span.end > len {
            return Err(BiorelError::SpanOutOfBounds {
                span,
                container: self.sid.clone(),
                len,
            });
        }

        let sentence_text = char_slice(&self.text, span).unwrap_or_default();
        let text = match text {
            Some(annotated) => {
                if fragments.len() == 1 && annotated != sentence_text {
                    warn!(
                        sid = %self.sid,
                        %span,
                        annotated,
                        found = sentence_text,
                        "entity text does not match sentence text"
                    );
                }
                annotated.to_string()
            }
            None => sentence_text.to_string(),
        };

        let eid = format!("{}.e{}", self.sid, self.next_entity);
        self.next_entity += 1;

        let entity = Entity {
            eid: eid.clone(),
            sid: self.sid.clone(),
            did: self.did.clone(),
            span,
            dspan: span.shift(self.offset),
            fragments: fragments.to_vec(),
            etype: etype.to_lowercase(),
            text,
            original_id: original_id.map(str::to_string),
            targets: Vec::new(),
        };
        debug!(entity = %entity, "tagged entity");
        self.entities
            .entry(source.to_string())
            .or_default()
            .push(entity);
        Ok(eid)
    }

    /// Split the sentence into word and punctuation tokens
    pub fn tokenize(&mut self) {
        let mut tokens = Vec::new();
        let mut last_byte = 0;
        let mut chars_before = 0;
        for m in TOKEN_PATTERN.find_iter(&self.text) {
            chars_before += self.text[last_byte..m.start()].chars().count();
            let len = m.as_str().chars().count();
            tokens.push(Token {
                text: m.as_str().to_string(),
                span: Span::new(chars_before, chars_before + len),
                lemma: m.as_str().to_lowercase(),
                pos: None,
            });
            chars_before += len;
            last_byte = m.end();
        }
        self.tokens = tokens;
    }

    /// Indices of the tokens overlapping a sentence-relative span
    pub fn tokens_in(&self, span: Span) -> Vec<usize> {
        self.tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.span.overlaps(&span))
            .map(|(i, _)| i)
            .collect()
    }
}

// ============================================================================
// Document
// ============================================================================

/// A corpus document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub did: String,
    pub text: String,
    pub title: Option<String>,
    pub sentences: Vec<Sentence>,
    pub invalid_sids: BTreeSet<String>,
    pub title_sids: BTreeSet<String>,
    /// Candidate and recognized pairs
    pub pairs: Vec<Pair>,
}

impl Document {
    /// Create a new document without sentences
    pub fn new(did: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            did: did.into(),
            text: text.into(),
            title: None,
            sentences: Vec::new(),
            invalid_sids: BTreeSet::new(),
            title_sids: BTreeSet::new(),
            pairs: Vec::new(),
        }
    }

    /// Set title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Append a sentence, tokenizing it
    pub fn add_sentence(&mut self, mut sentence: Sentence) {
        sentence.tokenize();
        self.sentences.push(sentence);
    }

    pub fn get_sentence(&self, sid: &str) -> Option<&Sentence> {
        self.sentences.iter().find(|s| s.sid == sid)
    }

    pub fn get_sentence_mut(&mut self, sid: &str) -> Option<&mut Sentence> {
        self.sentences.iter_mut().find(|s| s.sid == sid)
    }

    /// Position of a sentence in document order
    pub fn sentence_index(&self, sid: &str) -> Option<usize> {
        self.sentences.iter().position(|s| s.sid == sid)
    }

    pub fn is_valid_sentence(&self, sid: &str) -> bool {
        !self.invalid_sids.contains(sid)
    }

    /// Index of the unique sentence whose range contains a document span.
    ///
    /// Returns `None` when the span crosses a sentence boundary, falls in
    /// the gap between two sentences, or is claimed by more than one sentence.
    pub fn find_sentence_containing(&self, span: Span) -> Option<usize> {
        let mut found = None;
        for (idx, sentence) in self.sentences.iter().enumerate() {
            if sentence.doc_span().contains(&span) {
                if found.is_some() {
                    return None;
                }
                found = Some(idx);
            }
        }
        found
    }

    /// Align a document-relative annotation onto its sentence; returns the eid.
    ///
    /// All fragments must resolve to one sentence and that sentence must not
    /// be invalid.
    pub fn tag_document_entity(
        &mut self,
        fragments: &[Span],
        etype: &str,
        text: Option<&str>,
        original_id: Option<&str>,
        source: &str,
    ) -> Result<String> {
        let span = covering(fragments)
            .ok_or_else(|| BiorelError::InvalidOffset("empty fragment list".to_string()))?;
        let idx = self
            .find_sentence_containing(span)
            .ok_or_else(|| BiorelError::CrossesSentenceBoundary {
                did: self.did.clone(),
                span,
            })?;

        let sentence = &mut self.sentences[idx];
        if self.invalid_sids.contains(&sentence.sid) {
            return Err(BiorelError::InvalidRegion {
                sid: sentence.sid.clone(),
                span,
            });
        }

        let offset = sentence.offset;
        let local: Vec<Span> = fragments
            .iter()
            .map(|f| {
                f.unshift(offset)
                    .ok_or_else(|| BiorelError::CrossesSentenceBoundary {
                        did: sentence.did.clone(),
                        span: *f,
                    })
            })
            .collect::<Result<_>>()?;

        let text = match text {
            Some(t) => Some(t.to_string()),
            None if fragments.len() == 1 => char_slice(&self.text, span).map(str::to_string),
            None => None,
        };
        sentence.tag_entity(&local, etype, text.as_deref(), original_id, source)
    }

    /// Entities of one source in document order
    pub fn get_entities(&self, source: &str) -> Vec<&Entity> {
        let mut entities: Vec<&Entity> = self
            .sentences
            .iter()
            .flat_map(|s| s.entities(source).iter())
            .collect();
        entities.sort_by_key(|e| (e.dspan.start, e.dspan.end));
        entities
    }

    pub fn get_entity(&self, eid: &str, source: &str) -> Option<&Entity> {
        self.sentences
            .iter()
            .flat_map(|s| s.entities(source).iter())
            .find(|e| e.eid == eid)
    }

    pub fn get_entity_mut(&mut self, eid: &str, source: &str) -> Option<&mut Entity> {
        self.sentences
            .iter_mut()
            .filter_map(|s| s.entities.get_mut(source))
            .flat_map(|list| list.iter_mut())
            .find(|e| e.eid == eid)
    }

    pub fn get_entity_by_original_id(&self, original_id: &str, source: &str) -> Option<&Entity> {
        self.sentences
            .iter()
            .flat_map(|s| s.entities(source).iter())
            .find(|e| e.original_id.as_deref() == Some(original_id))
    }

    /// Remove every entity of a source, and the pairs built from them
    pub fn clear_annotations(&mut self, source: &str) {
        for sentence in &mut self.sentences {
            sentence.entities.remove(source);
        }
        self.pairs.clear();
    }

    /// Record a pair between two entities of this document
    pub fn add_relation(
        &mut self,
        source: &Entity,
        target: &Entity,
        relation: &str,
        is_relation: bool,
    ) -> &mut Pair {
        let pid = format!("{}.p{}", self.did, self.pairs.len());
        let pair = Pair::new(pid, source.clone(), target.clone(), relation, is_relation);
        self.pairs.push(pair);
        let last = self.pairs.len() - 1;
        &mut self.pairs[last]
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn two_sentence_doc() -> Document {
        // "miR-21 targets PTEN. It is upregulated."
        let text = "miR-21 targets PTEN. It is upregulated.";
        let mut doc = Document::new("d1", text);
        doc.add_sentence(Sentence::new("miR-21 targets PTEN.", 0, "d1.s0", "d1"));
        doc.add_sentence(Sentence::new("It is upregulated.", 21, "d1.s1", "d1"));
        doc
    }

    #[test]
    fn test_tag_entity_records_both_spans() {
        let mut sentence = Sentence::new("It binds PTEN.", 30, "d1.s2", "d1");
        let eid = sentence
            .tag_entity(&[Span::new(9, 13)], "Protein", None, Some("T1"), GOLD_STANDARD)
            .unwrap();

        assert_eq!(eid, "d1.s2.e0");
        let entity = &sentence.entities(GOLD_STANDARD)[0];
        assert_eq!(entity.text, "PTEN");
        assert_eq!(entity.etype, "protein");
        assert_eq!(entity.dspan, Span::new(39, 43));
        assert_eq!(entity.original_id.as_deref(), Some("T1"));
    }

    #[test]
    fn test_tag_entity_out_of_bounds() {
        let mut sentence = Sentence::new("short", 0, "d.s0", "d");
        let err = sentence
            .tag_entity(&[Span::new(2, 10)], "x", None, None, GOLD_STANDARD)
            .unwrap_err();
        assert!(matches!(err, BiorelError::SpanOutOfBounds { .. }));
    }

    #[test]
    fn test_find_sentence_containing() {
        let doc = two_sentence_doc();
        assert_eq!(doc.find_sentence_containing(Span::new(15, 19)), Some(0));
        assert_eq!(doc.find_sentence_containing(Span::new(21, 23)), Some(1));
        // crosses the boundary
        assert_eq!(doc.find_sentence_containing(Span::new(15, 23)), None);
        // gap between sentences
        assert_eq!(doc.find_sentence_containing(Span::new(20, 21)), None);
    }

    #[test]
    fn test_tag_document_entity_aligns_offsets() {
        let mut doc = two_sentence_doc();
        let eid = doc
            .tag_document_entity(&[Span::new(27, 38)], "EVENT", None, Some("5@e"), GOLD_STANDARD)
            .unwrap();

        let entity = doc.get_entity(&eid, GOLD_STANDARD).unwrap();
        assert_eq!(entity.sid, "d1.s1");
        assert_eq!(entity.span, Span::new(6, 17));
        assert_eq!(entity.text, "upregulated");
        assert_eq!(
            doc.get_entity_by_original_id("5@e", GOLD_STANDARD).map(|e| &e.eid),
            Some(&eid)
        );
    }

    #[test]
    fn test_tag_document_entity_multi_span() {
        let mut doc = two_sentence_doc();
        let eid = doc
            .tag_document_entity(
                &[Span::new(0, 3), Span::new(15, 19)],
                "mirna",
                Some("miR PTEN"),
                None,
                GOLD_STANDARD,
            )
            .unwrap();
        let entity = doc.get_entity(&eid, GOLD_STANDARD).unwrap();
        assert!(entity.is_multi_span());
        assert_eq!(entity.span, Span::new(0, 19));
        assert_eq!(entity.text, "miR PTEN");
    }

    #[test]
    fn test_tag_document_entity_rejects_invalid_region() {
        let mut doc = two_sentence_doc();
        doc.invalid_sids.insert("d1.s1".to_string());
        let err = doc
            .tag_document_entity(&[Span::new(21, 23)], "event", None, None, GOLD_STANDARD)
            .unwrap_err();
        assert!(matches!(err, BiorelError::InvalidRegion { .. }));

        let err = doc
            .tag_document_entity(&[Span::new(15, 23)], "event", None, None, GOLD_STANDARD)
            .unwrap_err();
        assert!(matches!(err, BiorelError::CrossesSentenceBoundary { .. }));
    }

    #[test]
    fn test_tokenize_char_offsets() {
        let mut sentence = Sentence::new("Café-au-lait, miR-21!", 0, "s", "d");
        sentence.tokenize();
        let texts: Vec<&str> = sentence.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Café-au-lait", ",", "miR-21", "!"]);
        assert_eq!(sentence.tokens[2].span, Span::new(14, 20));
        assert_eq!(sentence.tokens[0].lemma, "café-au-lait");
        assert_eq!(sentence.tokens_in(Span::new(14, 17)), vec![2]);
    }

    #[test]
    fn test_entities_in_document_order_and_clear() {
        let mut doc = two_sentence_doc();
        doc.tag_document_entity(&[Span::new(27, 38)], "event", None, None, GOLD_STANDARD)
            .unwrap();
        doc.tag_document_entity(&[Span::new(0, 6)], "mirna", None, None, GOLD_STANDARD)
            .unwrap();
        let order: Vec<&str> = doc
            .get_entities(GOLD_STANDARD)
            .iter()
            .map(|e| e.text.as_str())
            .collect();
        assert_eq!(order, vec!["miR-21", "upregulated"]);

        doc.clear_annotations(GOLD_STANDARD);
        assert!(doc.get_entities(GOLD_STANDARD).is_empty());
    }
}
