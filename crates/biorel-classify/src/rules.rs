//! Rule-based relation classifier
//!
//! Every candidate pair whose entity types fit the pair type is accepted.
//! Candidates are limited to the configured sentence distance (same
//! sentence by default).

use tracing::{debug, info};

use biorel_core::{Corpus, Pair, PairGenerator, PairType};

use crate::results::RelationResults;
use crate::{RelationClassifier, Result};

/// Type-table classifier
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    ptype: String,
    pair_type: PairType,
    max_sentence_distance: usize,
    candidates: Vec<Pair>,
}

impl RuleClassifier {
    /// Create a same-sentence rule classifier
    pub fn new(ptype: impl Into<String>, pair_type: PairType) -> Self {
        Self {
            ptype: ptype.into(),
            pair_type,
            max_sentence_distance: 0,
            candidates: Vec::new(),
        }
    }

    /// Set the maximum sentence distance between pair entities
    pub fn with_max_sentence_distance(mut self, distance: usize) -> Self {
        self.max_sentence_distance = distance;
        self
    }

    /// Pairs accepted by the last `test`
    pub fn candidates(&self) -> &[Pair] {
        &self.candidates
    }
}

impl RelationClassifier for RuleClassifier {
    fn name(&self) -> &str {
        "rules"
    }

    fn ptype(&self) -> &str {
        &self.ptype
    }

    fn train(&mut self, _corpus: &Corpus) -> Result<()> {
        debug!("rule classifier has nothing to train");
        Ok(())
    }

    fn load_classifier(&mut self) -> Result<()> {
        Ok(())
    }

    fn test(&mut self, corpus: &Corpus) -> Result<()> {
        let generator = PairGenerator::new(&self.ptype, self.pair_type.clone())
            .with_max_sentence_distance(self.max_sentence_distance);
        self.candidates = corpus
            .documents()
            .flat_map(|doc| generator.generate(doc))
            .collect();
        info!(ptype = %self.ptype, accepted = self.candidates.len(), "rules applied");
        Ok(())
    }

    fn get_predictions(&self, corpus: &mut Corpus) -> Result<RelationResults> {
        let mut results = RelationResults::new(format!("rules_{}", self.ptype));
        for pair in &self.candidates {
            results.record(corpus, &pair.source, &pair.target, &self.ptype, "rules", 1.0)?;
            info!(
                "{}:{} => {}:{}",
                pair.source.eid, pair.source.text, pair.target.eid, pair.target.text
            );
        }
        Ok(results)
    }
}

// ============================================================================
// Tests
// ============================================================================
