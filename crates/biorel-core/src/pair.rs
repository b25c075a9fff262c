//! Candidate pair generation
//!
//! Relation extraction works on ordered entity pairs. The direction of a
//! pair is decided by the source/target type table of its relation type,
//! never by text order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PairType;
use crate::document::{Document, Entity, GOLD_STANDARD};

/// An ordered pair of entities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pair {
    /// Identifier, `"{did}.p{n}"`
    pub pid: String,
    pub did: String,
    pub source: Entity,
    pub target: Entity,
    /// Relation type label
    pub relation: String,
    /// Gold label for candidates, prediction for recognized pairs
    pub is_relation: bool,
    /// Classifier name -> score
    pub recognized_by: BTreeMap<String, f32>,
}

impl Pair {
    /// Create a new pair
    pub fn new(
        pid: impl Into<String>,
        source: Entity,
        target: Entity,
        relation: impl Into<String>,
        is_relation: bool,
    ) -> Self {
        Self {
            pid: pid.into(),
            did: source.did.clone(),
            source,
            target,
            relation: relation.into(),
            is_relation,
            recognized_by: BTreeMap::new(),
        }
    }

    /// Record a classifier's score
    pub fn with_score(mut self, classifier: impl Into<String>, score: f32) -> Self {
        self.recognized_by.insert(classifier.into(), score);
        self
    }

    /// True when both entities lie in the same sentence
    pub fn same_sentence(&self) -> bool {
        self.source.sid == self.target.sid
    }
}

impl std::fmt::Display for Pair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} => {}:{} ({})",
            self.source.eid, self.source.text, self.target.eid, self.target.text, self.relation
        )
    }
}

/// Enumerates candidate pairs of a document
#[derive(Debug, Clone)]
pub struct PairGenerator {
    /// Relation type name, also the positive label
    pub ptype: String,
    pub pair_type: PairType,
    /// 0 keeps same-sentence pairs only
    pub max_sentence_distance: usize,
    /// Annotation source to read entities from
    pub source: String,
    /// Drop pairs with an entity in an invalid sentence
    pub skip_invalid: bool,
}

impl PairGenerator {
    /// Create a same-sentence generator over gold-standard entities
    pub fn new(ptype: impl Into<String>, pair_type: PairType) -> Self {
        Self {
            ptype: ptype.into(),
            pair_type,
            max_sentence_distance: 0,
            source: GOLD_STANDARD.to_string(),
            skip_invalid: true,
        }
    }

    /// Set the maximum sentence distance
    pub fn with_max_sentence_distance(mut self, distance: usize) -> Self {
        self.max_sentence_distance = distance;
        self
    }

    /// Set the annotation source
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Candidate pairs of a document, labelled from the entity targets.
    ///
    /// Each unordered entity pair is visited once and may yield one pair per
    /// orientation the type table accepts.
    pub fn generate(&self, doc: &Document) -> Vec<Pair> {
        let entities: Vec<(usize, &Entity)> = doc
            .get_entities(&self.source)
            .into_iter()
            .filter(|e| !self.skip_invalid || doc.is_valid_sentence(&e.sid))
            .filter_map(|e| doc.sentence_index(&e.sid).map(|idx| (idx, e)))
            .collect();

        let mut pairs = Vec::new();
        for (i, (idx1, e1)) in entities.iter().enumerate() {
            for (idx2, e2) in &entities[i + 1..] {
                if idx1.abs_diff(*idx2) > self.max_sentence_distance {
                    continue;
                }
                for (source, target) in [(*e1, *e2), (*e2, *e1)] {
                    if !self.pair_type.accepts(&source.etype, &target.etype) {
                        continue;
                    }
                    let label = source.has_target(&target.eid, &self.ptype);
                    let pid = format!("{}.p{}", doc.did, pairs.len());
                    pairs.push(Pair::new(
                        pid,
                        source.clone(),
                        target.clone(),
                        &self.ptype,
                        label,
                    ));
                }
            }
        }
        debug!(
            did = %doc.did,
            ptype = %self.ptype,
            candidates = pairs.len(),
            positives = pairs.iter().filter(|p| p.is_relation).count(),
            "generated pairs"
        );
        pairs
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{RelationTarget, Sentence};
    use crate::span::Span;

    fn tlink() -> PairType {
        PairType::new(&["event", "timex3"], &["event", "timex3"])
    }

    fn mirna_protein() -> PairType {
        PairType::new(&["mirna"], &["protein"])
    }

    /// "PTEN is a target of miR-21. Expression rose. miR-155 binds SHIP1."
    fn mirna_doc() -> Document {
        let text = "PTEN is a target of miR-21. Expression rose. miR-155 binds SHIP1.";
        let mut doc = Document::new("d", text);
        doc.add_sentence(Sentence::new("PTEN is a target of miR-21.", 0, "d.s0", "d"));
        doc.add_sentence(Sentence::new("Expression rose.", 28, "d.s1", "d"));
        doc.add_sentence(Sentence::new("miR-155 binds SHIP1.", 45, "d.s2", "d"));
        doc.tag_document_entity(&[Span::new(0, 4)], "protein", None, Some("T1"), GOLD_STANDARD)
            .unwrap();
        doc.tag_document_entity(&[Span::new(20, 26)], "mirna", None, Some("T2"), GOLD_STANDARD)
            .unwrap();
        doc.tag_document_entity(&[Span::new(45, 52)], "mirna", None, Some("T3"), GOLD_STANDARD)
            .unwrap();
        doc.tag_document_entity(&[Span::new(59, 64)], "protein", None, Some("T4"), GOLD_STANDARD)
            .unwrap();
        doc
    }

    #[test]
    fn test_same_sentence_pairs_directed() {
        let doc = mirna_doc();
        let pairs = PairGenerator::new("mirna_protein", mirna_protein()).generate(&doc);

        assert_eq!(pairs.len(), 2);
        for pair in &pairs {
            assert_eq!(pair.source.etype, "mirna");
            assert_eq!(pair.target.etype, "protein");
            assert!(pair.same_sentence());
        }
        assert_eq!(pairs[0].pid, "d.p0");
        assert_eq!(pairs[1].pid, "d.p1");
    }

    #[test]
    fn test_sentence_distance_widens_candidates() {
        let doc = mirna_doc();
        let pairs = PairGenerator::new("mirna_protein", mirna_protein())
            .with_max_sentence_distance(2)
            .generate(&doc);
        // T2-T1, T3-T1, T2-T4, T3-T4
        assert_eq!(pairs.len(), 4);

        let pairs = PairGenerator::new("mirna_protein", mirna_protein())
            .with_max_sentence_distance(1)
            .generate(&doc);
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn test_symmetric_types_yield_both_directions() {
        let text = "Pain began yesterday.";
        let mut doc = Document::new("c", text);
        doc.add_sentence(Sentence::new(text, 0, "c.s0", "c"));
        let pain = doc
            .tag_document_entity(&[Span::new(0, 4)], "event", None, None, GOLD_STANDARD)
            .unwrap();
        let yesterday = doc
            .tag_document_entity(&[Span::new(11, 20)], "timex3", None, None, GOLD_STANDARD)
            .unwrap();
        doc.get_entity_mut(&pain, GOLD_STANDARD)
            .unwrap()
            .targets
            .push(RelationTarget {
                eid: yesterday.clone(),
                relation: "tlink".to_string(),
            });

        let pairs = PairGenerator::new("tlink", tlink()).generate(&doc);
        assert_eq!(pairs.len(), 2);
        let positive: Vec<&Pair> = pairs.iter().filter(|p| p.is_relation).collect();
        assert_eq!(positive.len(), 1);
        assert_eq!(positive[0].source.eid, pain);
        assert_eq!(positive[0].target.eid, yesterday);
    }

    #[test]
    fn test_invalid_sentences_skipped() {
        let mut doc = mirna_doc();
        doc.invalid_sids.insert("d.s2".to_string());
        let pairs = PairGenerator::new("mirna_protein", mirna_protein()).generate(&doc);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].source.original_id.as_deref(), Some("T2"));
    }
}
