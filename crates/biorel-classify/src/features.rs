//! Pair examples and the example formats of the external learners
//!
//! A [`PairExample`] is a candidate pair together with the tokens of the
//! sentences it spans. Token spans are document-relative so a pair across
//! sentences reads as one token sequence.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, warn};

use biorel_core::{Corpus, Document, Pair, PairGenerator, PairType, Token};

/// A candidate pair with its token context
#[derive(Debug, Clone)]
pub struct PairExample {
    pub pair: Pair,
    /// Gold label
    pub label: bool,
    /// Tokens of every spanned sentence, document-relative spans
    pub tokens: Vec<Token>,
    /// Indices of the tokens covering the source entity
    pub source_tokens: BTreeSet<usize>,
    /// Indices of the tokens covering the target entity
    pub target_tokens: BTreeSet<usize>,
    /// Number of sentence boundaries between the two entities
    pub sentence_distance: usize,
}

/// Feature record for learners that take JSON lines
#[derive(Debug, Clone, Serialize)]
pub struct FeatureRecord {
    pub pid: String,
    pub label: u8,
    pub source_type: String,
    pub target_type: String,
    pub source_text: String,
    pub target_text: String,
    pub words_between: Vec<String>,
    pub sentence_distance: usize,
    pub token_distance: usize,
}

/// Token role of an entity in the example formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Agent,
    Target,
    Other,
}

impl PairExample {
    /// Build the example of a pair, `None` when an entity covers no token
    pub fn from_pair(doc: &Document, pair: Pair) -> Option<Self> {
        let first = doc.sentence_index(&pair.source.sid)?;
        let second = doc.sentence_index(&pair.target.sid)?;
        let (lo, hi) = (first.min(second), first.max(second));

        let tokens: Vec<Token> = doc.sentences[lo..=hi]
            .iter()
            .flat_map(|s| {
                s.tokens.iter().map(move |t| Token {
                    span: t.span.shift(s.offset),
                    ..t.clone()
                })
            })
            .collect();

        let covering = |span: biorel_core::Span| -> BTreeSet<usize> {
            tokens
                .iter()
                .enumerate()
                .filter(|(_, t)| t.span.overlaps(&span))
                .map(|(i, _)| i)
                .collect()
        };
        let source_tokens = covering(pair.source.dspan);
        let target_tokens = covering(pair.target.dspan);
        if source_tokens.is_empty() || target_tokens.is_empty() {
            warn!(pid = %pair.pid, "entity without tokens");
            return None;
        }

        Some(Self {
            label: pair.is_relation,
            pair,
            tokens,
            source_tokens,
            target_tokens,
            sentence_distance: hi - lo,
        })
    }

    fn role(&self, idx: usize) -> Role {
        if self.source_tokens.contains(&idx) {
            Role::Agent
        } else if self.target_tokens.contains(&idx) {
            Role::Target
        } else {
            Role::Other
        }
    }

    /// Tokens strictly between the two entities
    fn between(&self) -> std::ops::Range<usize> {
        let source_last = self.source_tokens.iter().max().copied().unwrap_or(0);
        let target_last = self.target_tokens.iter().max().copied().unwrap_or(0);
        let source_first = self.source_tokens.iter().min().copied().unwrap_or(0);
        let target_first = self.target_tokens.iter().min().copied().unwrap_or(0);
        if source_last < target_first {
            source_last + 1..target_first
        } else if target_last < source_first {
            target_last + 1..source_first
        } else {
            0..0
        }
    }

    /// jSRE line: `label\tpid\t` then `i&&word&&lemma&&POS&&type&&A|T|O` tokens
    pub fn to_jsre(&self) -> String {
        let body: Vec<String> = self
            .tokens
            .iter()
            .enumerate()
            .map(|(i, token)| {
                let (etype, role) = match self.role(i) {
                    Role::Agent => (self.pair.source.etype.as_str(), "A"),
                    Role::Target => (self.pair.target.etype.as_str(), "T"),
                    Role::Other => ("O", "O"),
                };
                format!(
                    "{i}&&{}&&{}&&{}&&{etype}&&{role}",
                    jsre_escape(&token.text),
                    jsre_escape(&token.lemma),
                    token.pos.as_deref().unwrap_or("O"),
                )
            })
            .collect();
        format!(
            "{}\t{}\t{}",
            u8::from(self.label),
            self.pair.pid,
            body.join(" ")
        )
    }

    /// SVM-light-TK line with a flat tree marking the entities
    pub fn to_svmlight_tk(&self) -> String {
        let leaves: Vec<String> = self
            .tokens
            .iter()
            .enumerate()
            .map(|(i, token)| {
                let tag = match self.role(i) {
                    Role::Agent => "ENT_A".to_string(),
                    Role::Target => "ENT_T".to_string(),
                    Role::Other => token.pos.clone().unwrap_or_else(|| "W".to_string()),
                };
                format!("({tag} {})", tree_escape(&token.lemma))
            })
            .collect();
        let label = if self.label { "+1" } else { "-1" };
        format!("{label} |BT| (S {}) |ET|", leaves.join(" "))
    }

    /// Feature record for JSON-lines learners
    pub fn to_features(&self) -> FeatureRecord {
        let between = self.between();
        FeatureRecord {
            pid: self.pair.pid.clone(),
            label: u8::from(self.label),
            source_type: self.pair.source.etype.clone(),
            target_type: self.pair.target.etype.clone(),
            source_text: self.pair.source.text.clone(),
            target_text: self.pair.target.text.clone(),
            token_distance: between.len(),
            words_between: self.tokens[between].iter().map(|t| t.lemma.clone()).collect(),
            sentence_distance: self.sentence_distance,
        }
    }
}

fn jsre_escape(text: &str) -> String {
    text.replace("&&", "&")
}

fn tree_escape(text: &str) -> String {
    text.replace('(', "-LRB-").replace(')', "-RRB-")
}

/// Examples of every candidate pair of a corpus, in document order
pub fn build_examples(
    corpus: &Corpus,
    ptype: &str,
    pair_type: &PairType,
    max_sentence_distance: usize,
) -> Vec<PairExample> {
    let generator = PairGenerator::new(ptype, pair_type.clone())
        .with_max_sentence_distance(max_sentence_distance);

    let examples: Vec<PairExample> = corpus
        .documents()
        .flat_map(|doc| {
            generator
                .generate(doc)
                .into_iter()
                .filter_map(move |pair| PairExample::from_pair(doc, pair))
        })
        .collect();
    debug!(
        ptype,
        examples = examples.len(),
        positives = examples.iter().filter(|e| e.label).count(),
        "built examples"
    );
    examples
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use biorel_core::span::Span;
    use biorel_core::{RelationTarget, Sentence, GOLD_STANDARD};

    /// "miR-21 (mature) represses PTEN. SHIP1 is also bound."
    fn annotated_corpus() -> Corpus {
        let text = "miR-21 (mature) represses PTEN. SHIP1 is also bound.";
        let mut doc = Document::new("d1", text);
        doc.add_sentence(Sentence::new("miR-21 (mature) represses PTEN.", 0, "d1.s0", "d1"));
        doc.add_sentence(Sentence::new("SHIP1 is also bound.", 32, "d1.s1", "d1"));
        let mirna = doc
            .tag_document_entity(&[Span::new(0, 6)], "mirna", None, Some("T1"), GOLD_STANDARD)
            .unwrap();
        let pten = doc
            .tag_document_entity(&[Span::new(26, 30)], "protein", None, Some("T2"), GOLD_STANDARD)
            .unwrap();
        doc.tag_document_entity(&[Span::new(32, 37)], "protein", None, Some("T3"), GOLD_STANDARD)
            .unwrap();
        doc.get_entity_mut(&mirna, GOLD_STANDARD)
            .unwrap()
            .targets
            .push(RelationTarget {
                eid: pten,
                relation: "mirna_protein".to_string(),
            });
        let mut corpus = Corpus::new("test");
        corpus.insert(doc);
        corpus
    }

    fn mirna_protein() -> PairType {
        PairType::new(&["mirna"], &["protein"])
    }

    #[test]
    fn test_build_examples_same_sentence() {
        let corpus = annotated_corpus();
        let examples = build_examples(&corpus, "mirna_protein", &mirna_protein(), 0);
        assert_eq!(examples.len(), 1);
        let example = &examples[0];
        assert!(example.label);
        assert_eq!(example.pair.source.text, "miR-21");
        assert_eq!(example.source_tokens.iter().copied().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_cross_sentence_tokens_are_concatenated() {
        let corpus = annotated_corpus();
        let examples = build_examples(&corpus, "mirna_protein", &mirna_protein(), 1);
        assert_eq!(examples.len(), 2);
        let cross = examples.iter().find(|e| e.pair.target.text == "SHIP1").unwrap();
        assert!(!cross.label);
        assert_eq!(cross.sentence_distance, 1);
        let first_of_second = cross.target_tokens.iter().next().copied().unwrap();
        assert_eq!(cross.tokens[first_of_second].text, "SHIP1");
        assert_eq!(cross.tokens[first_of_second].span, Span::new(32, 37));
    }

    #[test]
    fn test_jsre_format() {
        let corpus = annotated_corpus();
        let examples = build_examples(&corpus, "mirna_protein", &mirna_protein(), 0);
        let line = examples[0].to_jsre();
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields[0], "1");
        assert_eq!(fields[1], "d1.p0");
        let tokens: Vec<&str> = fields[2].split(' ').collect();
        assert_eq!(tokens[0], "0&&miR-21&&mir-21&&O&&mirna&&A");
        assert_eq!(tokens[1], "1&&(&&(&&O&&O&&O");
        assert_eq!(tokens[5], "5&&PTEN&&pten&&O&&protein&&T");
    }

    #[test]
    fn test_svmlight_tk_format() {
        let corpus = annotated_corpus();
        let examples = build_examples(&corpus, "mirna_protein", &mirna_protein(), 0);
        assert_eq!(
            examples[0].to_svmlight_tk(),
            "+1 |BT| (S (ENT_A mir-21) (W -LRB-) (W mature) (W -RRB-) (W represses) (ENT_T pten) (W .)) |ET|"
        );
    }

    #[test]
    fn test_feature_record() {
        let corpus = annotated_corpus();
        let examples = build_examples(&corpus, "mirna_protein", &mirna_protein(), 0);
        let record = examples[0].to_features();
        assert_eq!(record.label, 1);
        assert_eq!(record.words_between, vec!["(", "mature", ")", "represses"]);
        assert_eq!(record.token_distance, 4);
        assert_eq!(record.sentence_distance, 0);
    }
}
