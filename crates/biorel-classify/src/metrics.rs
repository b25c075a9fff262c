//! Evaluation against gold annotations
//!
//! Relations are compared as `(document, source, target, relation)` keys
//! built from the annotation file identifiers, so predictions on a reloaded
//! corpus still line up with the gold standard. Relation arguments are
//! compared as entities, by document-relative span and type.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use biorel_core::{Corpus, Entity, Span, GOLD_STANDARD};

use crate::results::RelationResults;

fn ratio(num: usize, den: usize) -> f32 {
    if den == 0 {
        0.0
    } else {
        num as f32 / den as f32
    }
}

fn harmonic(p: f32, r: f32) -> f32 {
    if p + r == 0.0 {
        0.0
    } else {
        2.0 * p * r / (p + r)
    }
}

// ============================================================================
// Entity Metrics
// ============================================================================

/// Entity recognition counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMetrics {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub gold_total: usize,
    pub predicted_total: usize,
}

impl EntityMetrics {
    /// Compare two entity sets
    pub fn compare<T: Ord>(predicted: &BTreeSet<T>, gold: &BTreeSet<T>) -> Self {
        let true_positives = predicted.intersection(gold).count();
        Self {
            true_positives,
            false_positives: predicted.len() - true_positives,
            false_negatives: gold.len() - true_positives,
            gold_total: gold.len(),
            predicted_total: predicted.len(),
        }
    }

    pub fn precision(&self) -> f32 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> f32 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1_score(&self) -> f32 {
        harmonic(self.precision(), self.recall())
    }
}

/// Key of an entity for span evaluation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub did: String,
    pub span: Span,
    pub etype: String,
}

impl From<&Entity> for EntityKey {
    fn from(entity: &Entity) -> Self {
        Self {
            did: entity.did.clone(),
            span: entity.dspan,
            etype: entity.etype.clone(),
        }
    }
}

/// Gold entities taking part in a relation of type `ptype`
pub fn gold_arguments(corpus: &Corpus, ptype: &str) -> BTreeSet<EntityKey> {
    let mut keys = BTreeSet::new();
    for doc in corpus.documents() {
        for source in doc.get_entities(GOLD_STANDARD) {
            for edge in source.targets.iter().filter(|t| t.relation.eq_ignore_ascii_case(ptype)) {
                if let Some(target) = doc.get_entity(&edge.eid, GOLD_STANDARD) {
                    keys.insert(EntityKey::from(source));
                    keys.insert(EntityKey::from(target));
                }
            }
        }
    }
    keys
}

/// Entities taking part in a predicted relation
pub fn predicted_arguments(results: &RelationResults) -> BTreeSet<EntityKey> {
    results
        .pairs
        .values()
        .flat_map(|p| [EntityKey::from(&p.source), EntityKey::from(&p.target)])
        .collect()
}

// ============================================================================
// Relation Metrics
// ============================================================================

/// Relation extraction counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMetrics {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub gold_total: usize,
    pub predicted_total: usize,
}

impl RelationMetrics {
    pub fn precision(&self) -> f32 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> f32 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1_score(&self) -> f32 {
        harmonic(self.precision(), self.recall())
    }
}

/// A relation as the annotation files name it
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GoldRelation {
    pub did: String,
    pub source: String,
    pub target: String,
    pub relation: String,
}

impl GoldRelation {
    fn new(source: &Entity, target: &Entity, relation: &str) -> Self {
        Self {
            did: source.did.clone(),
            source: external_id(source).to_string(),
            target: external_id(target).to_string(),
            relation: relation.to_lowercase(),
        }
    }
}

fn external_id(entity: &Entity) -> &str {
    entity.original_id.as_deref().unwrap_or(&entity.eid)
}

/// Gold relations of type `ptype` in the corpus
pub fn gold_relations(corpus: &Corpus, ptype: &str) -> BTreeSet<GoldRelation> {
    let mut gold = BTreeSet::new();
    for doc in corpus.documents() {
        for source in doc.get_entities(GOLD_STANDARD) {
            for edge in &source.targets {
                if !edge.relation.eq_ignore_ascii_case(ptype) {
                    continue;
                }
                if let Some(target) = doc.get_entity(&edge.eid, GOLD_STANDARD) {
                    gold.insert(GoldRelation::new(source, target, ptype));
                }
            }
        }
    }
    gold
}

/// Predicted relations of a result set
pub fn predicted_relations(results: &RelationResults) -> BTreeSet<GoldRelation> {
    results
        .pairs
        .values()
        .map(|p| GoldRelation::new(&p.source, &p.target, &p.relation))
        .collect()
}

/// Compare predictions with gold relations
pub fn evaluate_relations(
    results: &RelationResults,
    gold: &BTreeSet<GoldRelation>,
) -> RelationMetrics {
    let predicted = predicted_relations(results);
    let true_positives = predicted.intersection(gold).count();
    RelationMetrics {
        true_positives,
        false_positives: predicted.len() - true_positives,
        false_negatives: gold.len() - true_positives,
        gold_total: gold.len(),
        predicted_total: predicted.len(),
    }
}

// ============================================================================
// Aggregate Metrics
// ============================================================================

/// Summed metrics over several evaluations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub entity_metrics: EntityMetrics,
    pub relation_metrics: RelationMetrics,
    pub num_documents: usize,
}

impl AggregateMetrics {
    pub fn add_entity_metrics(&mut self, metrics: &EntityMetrics) {
        self.entity_metrics.true_positives += metrics.true_positives;
        self.entity_metrics.false_positives += metrics.false_positives;
        self.entity_metrics.false_negatives += metrics.false_negatives;
        self.entity_metrics.gold_total += metrics.gold_total;
        self.entity_metrics.predicted_total += metrics.predicted_total;
    }

    pub fn add_relation_metrics(&mut self, metrics: &RelationMetrics) {
        self.relation_metrics.true_positives += metrics.true_positives;
        self.relation_metrics.false_positives += metrics.false_positives;
        self.relation_metrics.false_negatives += metrics.false_negatives;
        self.relation_metrics.gold_total += metrics.gold_total;
        self.relation_metrics.predicted_total += metrics.predicted_total;
    }

    /// Human-readable summary
    pub fn report(&self) -> String {
        let e = &self.entity_metrics;
        let r = &self.relation_metrics;
        format!(
            "=== Evaluation Report ===\n\n\
             Documents evaluated: {}\n\n\
             Relation arguments:\n\
               Precision: {:.1}%\n\
               Recall:    {:.1}%\n\
               F1 Score:  {:.1}%\n\
               Gold: {} | Predicted: {} | TP: {} | FP: {} | FN: {}\n\n\
             Relations:\n\
               Precision: {:.1}%\n\
               Recall:    {:.1}%\n\
               F1 Score:  {:.1}%\n\
               Gold: {} | Predicted: {} | TP: {} | FP: {} | FN: {}\n",
            self.num_documents,
            e.precision() * 100.0,
            e.recall() * 100.0,
            e.f1_score() * 100.0,
            e.gold_total,
            e.predicted_total,
            e.true_positives,
            e.false_positives,
            e.false_negatives,
            r.precision() * 100.0,
            r.recall() * 100.0,
            r.f1_score() * 100.0,
            r.gold_total,
            r.predicted_total,
            r.true_positives,
            r.false_positives,
            r.false_negatives,
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use biorel_core::{Document, RelationTarget, Sentence};

    /// Gold: T1 -> T2 and T3 -> T2 ("mirna_protein"); T3 also -> T2 ("other")
    fn corpus() -> Corpus {
        let text = "miR-21 and miR-155 target PTEN.";
        let mut doc = Document::new("d1", text);
        doc.add_sentence(Sentence::new(text, 0, "d1.s0", "d1"));
        let mut ids = Vec::new();
        for (span, etype, oid) in [
            (Span::new(0, 6), "mirna", "T1"),
            (Span::new(11, 18), "mirna", "T3"),
            (Span::new(26, 30), "protein", "T2"),
        ] {
            ids.push(
                doc.tag_document_entity(&[span], etype, None, Some(oid), GOLD_STANDARD)
                    .unwrap(),
            );
        }
        for (source, relation) in [(0, "mirna_protein"), (1, "mirna_protein"), (1, "other")] {
            doc.get_entity_mut(&ids[source], GOLD_STANDARD)
                .unwrap()
                .targets
                .push(RelationTarget {
                    eid: ids[2].clone(),
                    relation: relation.to_string(),
                });
        }
        let mut corpus = Corpus::new("gold");
        corpus.insert(doc);
        corpus
    }

    #[test]
    fn test_metric_ratios() {
        let metrics = RelationMetrics {
            true_positives: 80,
            false_positives: 20,
            false_negatives: 20,
            gold_total: 100,
            predicted_total: 100,
        };
        assert!((metrics.precision() - 0.8).abs() < 0.001);
        assert!((metrics.recall() - 0.8).abs() < 0.001);
        assert!((metrics.f1_score() - 0.8).abs() < 0.001);
        assert_eq!(RelationMetrics::default().f1_score(), 0.0);
    }

    #[test]
    fn test_gold_relations_use_annotation_ids() {
        let gold = gold_relations(&corpus(), "mirna_protein");
        let pairs: Vec<_> = gold
            .iter()
            .map(|g| (g.source.as_str(), g.target.as_str()))
            .collect();
        assert_eq!(pairs, vec![("T1", "T2"), ("T3", "T2")]);
        assert_eq!(gold_relations(&corpus(), "other").len(), 1);
    }

    #[test]
    fn test_evaluate_relations() {
        let mut corpus = corpus();
        let gold = gold_relations(&corpus, "mirna_protein");

        let doc = corpus.get("d1").unwrap();
        let entities: Vec<Entity> = doc
            .get_entities(GOLD_STANDARD)
            .into_iter()
            .cloned()
            .collect();
        let (mir21, mir155, pten) = (&entities[0], &entities[1], &entities[2]);

        let mut results = RelationResults::new("rules_mirna_protein");
        results
            .record(&mut corpus, mir21, pten, "mirna_protein", "rules", 1.0)
            .unwrap();
        // wrong direction
        results
            .record(&mut corpus, pten, mir155, "mirna_protein", "rules", 1.0)
            .unwrap();

        let metrics = evaluate_relations(&results, &gold);
        assert_eq!(metrics.true_positives, 1);
        assert_eq!(metrics.false_positives, 1);
        assert_eq!(metrics.false_negatives, 1);
        assert!((metrics.precision() - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_argument_comparison() {
        let mut corpus = corpus();
        let gold = gold_arguments(&corpus, "mirna_protein");
        assert_eq!(gold.len(), 3);
        assert_eq!(gold_arguments(&corpus, "unknown").len(), 0);

        let doc = corpus.get("d1").unwrap();
        let entities: Vec<Entity> = doc
            .get_entities(GOLD_STANDARD)
            .into_iter()
            .cloned()
            .collect();
        let mut results = RelationResults::new("rules_mirna_protein");
        results
            .record(&mut corpus, &entities[0], &entities[2], "mirna_protein", "rules", 1.0)
            .unwrap();
        let predicted = predicted_arguments(&results);
        assert_eq!(predicted.len(), 2);

        let metrics = EntityMetrics::compare(&predicted, &gold);
        assert_eq!(
            (metrics.true_positives, metrics.false_positives, metrics.false_negatives),
            (2, 0, 1)
        );

        let mut aggregate = AggregateMetrics::default();
        aggregate.add_entity_metrics(&metrics);
        assert!(aggregate.report().contains("Gold: 3 | Predicted: 2 | TP: 2"));
    }

    #[test]
    fn test_aggregate_report() {
        let mut aggregate = AggregateMetrics {
            num_documents: 5,
            ..AggregateMetrics::default()
        };
        let metrics = RelationMetrics {
            true_positives: 3,
            false_positives: 1,
            false_negatives: 2,
            gold_total: 5,
            predicted_total: 4,
        };
        aggregate.add_relation_metrics(&metrics);
        aggregate.add_relation_metrics(&metrics);
        assert_eq!(aggregate.relation_metrics.true_positives, 6);

        let report = aggregate.report();
        assert!(report.contains("Documents evaluated: 5"));
        assert!(report.contains("Precision: 75.0%"));
    }
}
