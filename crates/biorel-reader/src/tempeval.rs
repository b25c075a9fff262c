//! Clinical TempEval (THYME) reader
//!
//! The corpus text is a directory of plain-text clinical notes. Gold
//! annotations are Anafora XML files stored as
//! `<ann_dir>/<did>/<did>.Temporal-Relation.gold.completed.xml` (or the
//! `Temporal-Entity` variant when a note has no relations). Anafora spans
//! are document-relative, so each entity is aligned onto the sentence that
//! contains it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use biorel_core::sections::{mark_invalid_sections, mark_title_sentences};
use biorel_core::span::{char_slice, parse_anafora_span, Span};
use biorel_core::{BiorelError, Corpus, Document, RelationTarget, GOLD_STANDARD};

use crate::sentences::split_sentences;
use crate::{read_file, type_selected, AnnotationReport, CorpusFormat, CorpusReader, ReaderError, Result};

/// Anafora entity types kept as gold entities
pub const TEMPORAL_TYPES: [&str; 4] = ["EVENT", "TIMEX3", "SECTIONTIME", "DOCTIME"];

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W").expect("valid regex"));

// ============================================================================
// Anafora XML
// ============================================================================

#[derive(Debug, Deserialize)]
struct AnaforaData {
    #[serde(default)]
    annotations: AnaforaAnnotations,
}

#[derive(Debug, Default, Deserialize)]
struct AnaforaAnnotations {
    #[serde(rename = "entity", default)]
    entities: Vec<AnaforaEntity>,
    #[serde(rename = "relation", default)]
    relations: Vec<AnaforaRelation>,
}

#[derive(Debug, Deserialize)]
struct AnaforaEntity {
    id: String,
    span: String,
    #[serde(rename = "type")]
    etype: String,
}

#[derive(Debug, Deserialize)]
struct AnaforaRelation {
    #[serde(rename = "type")]
    rtype: String,
    #[serde(default)]
    properties: RelationProperties,
}

#[derive(Debug, Default, Deserialize)]
struct RelationProperties {
    #[serde(rename = "Source")]
    source: Option<String>,
    #[serde(rename = "Target")]
    target: Option<String>,
}

fn parse_anafora(path: &Path) -> Result<AnaforaData> {
    let content = read_file(path)?;
    quick_xml::de::from_str(&content).map_err(|e| ReaderError::Xml {
        path: path.display().to_string(),
        source: e,
    })
}

/// Annotation file of one document, preferring the relation file
pub fn annotation_file(ann_dir: &Path, did: &str) -> Option<PathBuf> {
    ["Temporal-Relation", "Temporal-Entity"]
        .iter()
        .map(|kind| ann_dir.join(did).join(format!("{did}.{kind}.gold.completed.xml")))
        .find(|p| p.is_file())
}

// ============================================================================
// Reader
// ============================================================================

/// Reader for TempEval / THYME notes with Anafora annotations
#[derive(Debug, Clone)]
pub struct TempEvalReader {
    invalid_sections: Vec<u32>,
}

impl TempEvalReader {
    /// Create a reader that ignores the given section ids
    pub fn new(invalid_sections: Vec<u32>) -> Self {
        Self { invalid_sections }
    }

    /// Build one document from a note
    pub fn read_document(&self, did: &str, text: &str) -> Document {
        let mut doc = Document::new(did, text).with_title(format!("titulo_{did}"));
        for sentence in split_sentences(did, text) {
            doc.add_sentence(sentence);
        }
        mark_invalid_sections(&mut doc, &self.invalid_sections);
        mark_title_sentences(&mut doc);
        doc
    }

    /// Load annotations and also return the relation statistics of the
    /// annotated documents
    pub fn load_annotations_with_stats(
        &self,
        corpus: &mut Corpus,
        ann_dir: &Path,
        etype: &str,
    ) -> Result<(AnnotationReport, AnnotationStats)> {
        for doc in corpus.documents.values_mut() {
            mark_invalid_sections(doc, &self.invalid_sections);
        }
        info!("cleaning previous annotations");
        corpus.clear_annotations(GOLD_STANDARD);

        let mut report = AnnotationReport::default();
        let mut stats = AnnotationStats::default();

        let mut dirs: Vec<String> = std::fs::read_dir(ann_dir)
            .map_err(|e| ReaderError::io(ann_dir, e))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        dirs.sort();

        let total = dirs.len();
        for (n, did) in dirs.iter().enumerate() {
            let Some(file) = annotation_file(ann_dir, did) else {
                warn!(did = %did, "no annotations for this document");
                report.missing_annotations.push(did.clone());
                continue;
            };
            let Some(doc) = corpus.get_mut(did) else {
                warn!(did = %did, "no text for this document");
                continue;
            };
            debug!(file = %file.display(), "{}/{}", n + 1, total);

            let data = parse_anafora(&file)?;
            load_entities(doc, &data.annotations.entities, etype, &mut report);
            link_relations(doc, &data.annotations.relations, &mut report);
            stats.add_document(doc, GOLD_STANDARD);
        }

        Ok((report, stats))
    }
}

impl Default for TempEvalReader {
    fn default() -> Self {
        Self::new(biorel_core::sections::DEFAULT_INVALID_SECTIONS.to_vec())
    }
}

impl CorpusReader for TempEvalReader {
    fn format(&self) -> CorpusFormat {
        CorpusFormat::TempEval
    }

    fn load_corpus(&self, path: &Path) -> Result<Corpus> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(path)
            .map_err(|e| ReaderError::io(path, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && !p.to_string_lossy().ends_with('~'))
            .collect();
        files.sort();

        let mut corpus = Corpus::new(path.display().to_string());
        for file in files {
            let did = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| ReaderError::MissingAttribute {
                    what: "file name".to_string(),
                    path: file.display().to_string(),
                })?;
            debug!(file = %file.display(), "reading note");
            let text = read_file(&file)?;
            corpus.insert(self.read_document(&did, &text));
        }

        info!(documents = corpus.len(), "loaded TempEval corpus");
        Ok(corpus)
    }

    fn load_annotations(
        &self,
        corpus: &mut Corpus,
        path: &Path,
        etype: &str,
    ) -> Result<AnnotationReport> {
        let (report, stats) = self.load_annotations_with_stats(corpus, path, etype)?;
        stats.log(20);
        info!(
            tagged = report.entities_tagged,
            skipped = report.skipped_total(),
            relations = report.relations_linked,
            "loaded TempEval annotations"
        );
        Ok(report)
    }
}

fn load_entities(
    doc: &mut Document,
    entities: &[AnaforaEntity],
    etype: &str,
    report: &mut AnnotationReport,
) {
    let mut selected: Vec<(Span, &AnaforaEntity)> = Vec::new();
    for entity in entities {
        if entity.span.contains(';') {
            report.skip("discontinuous");
            continue;
        }
        if !TEMPORAL_TYPES.contains(&entity.etype.as_str()) {
            report.skip("unsupported type");
            continue;
        }
        if !type_selected(etype, &entity.etype) {
            report.skip("filtered type");
            continue;
        }
        match parse_anafora_span(&entity.span) {
            Ok(spans) => selected.push((spans[0], entity)),
            Err(e) => {
                warn!(id = %entity.id, error = %e, "bad span");
                report.skip("bad span");
            }
        }
    }
    selected.sort_by_key(|(span, _)| span.start);

    for (span, entity) in selected {
        match doc.tag_document_entity(
            &[span],
            &entity.etype.to_lowercase(),
            None,
            Some(&entity.id),
            GOLD_STANDARD,
        ) {
            Ok(_) => report.entities_tagged += 1,
            Err(BiorelError::InvalidRegion { sid, .. }) => {
                debug!(id = %entity.id, sid = %sid, "entity in invalid section");
                report.skip("invalid section");
            }
            Err(e) => {
                warn!(id = %entity.id, %span, error = %e, "could not find sentence for this span");
                report.skip("no sentence");
            }
        }
    }
}

fn link_relations(doc: &mut Document, relations: &[AnaforaRelation], report: &mut AnnotationReport) {
    let by_original: BTreeMap<String, String> = doc
        .get_entities(GOLD_STANDARD)
        .into_iter()
        .filter_map(|e| e.original_id.clone().map(|id| (id, e.eid.clone())))
        .collect();

    for relation in relations {
        let (Some(source), Some(target)) = (&relation.properties.source, &relation.properties.target)
        else {
            debug!(did = %doc.did, rtype = %relation.rtype, "relation without source or target");
            report.relations_skipped += 1;
            continue;
        };
        let Some(source_eid) = by_original.get(source) else {
            warn!(did = %doc.did, source = %source, "source not in entity list");
            report.relations_skipped += 1;
            continue;
        };
        let Some(target_eid) = by_original.get(target) else {
            warn!(did = %doc.did, target = %target, "target not in entity list");
            report.relations_skipped += 1;
            continue;
        };
        if let Some(entity) = doc.get_entity_mut(source_eid, GOLD_STANDARD) {
            entity.targets.push(RelationTarget {
                eid: target_eid.clone(),
                relation: relation.rtype.to_lowercase(),
            });
            report.relations_linked += 1;
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Relation statistics of one document type
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocTypeStats {
    pub documents: usize,
    pub chars: usize,
    pub entities: usize,
    pub relations: usize,
    /// Summed characters between source end and target start
    pub relation_distance: usize,
    pub multi_sentence: usize,
    pub source_types: BTreeMap<String, usize>,
    pub target_types: BTreeMap<String, usize>,
    /// `"{source type}_{target type}"` -> relations
    pub combinations: BTreeMap<String, usize>,
    /// Type combination -> word -> weight
    #[serde(skip)]
    pub words: BTreeMap<String, BTreeMap<String, f64>>,
}

/// Relation statistics keyed by document type (`path` or `clinic`)
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnnotationStats {
    pub by_doc_type: BTreeMap<String, DocTypeStats>,
}

/// `path` for pathology notes, `clinic` otherwise
pub fn doc_type(did: &str) -> &'static str {
    if did.contains("path") {
        "path"
    } else {
        "clinic"
    }
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    NON_WORD.split(text).filter(|w| !w.trim().is_empty())
}

impl AnnotationStats {
    /// Statistics of every document of a corpus
    pub fn from_corpus(corpus: &Corpus, source: &str) -> Self {
        let mut stats = Self::default();
        for doc in corpus.documents() {
            stats.add_document(doc, source);
        }
        stats
    }

    /// Add one annotated document
    pub fn add_document(&mut self, doc: &Document, source: &str) {
        let stats = self.by_doc_type.entry(doc_type(&doc.did).to_string()).or_default();
        let lower = doc.text.to_lowercase();
        let mut all_words: BTreeMap<&str, usize> = BTreeMap::new();
        for w in words(&lower) {
            *all_words.entry(w).or_default() += 1;
        }

        let entities = doc.get_entities(source);
        stats.documents += 1;
        stats.chars += doc.text.chars().count();
        stats.entities += entities.len();

        for entity in &entities {
            for target in &entity.targets {
                let Some(other) = doc.get_entity(&target.eid, source) else {
                    continue;
                };
                let combination = format!("{}_{}", entity.etype, other.etype);
                let between = Span::new(entity.dspan.end, other.dspan.start.max(entity.dspan.end));

                stats.relations += 1;
                stats.relation_distance += between.len();
                *stats.source_types.entry(entity.etype.clone()).or_default() += 1;
                *stats.target_types.entry(other.etype.clone()).or_default() += 1;
                *stats.combinations.entry(combination.clone()).or_default() += 1;
                if entity.sid != other.sid {
                    stats.multi_sentence += 1;
                }

                let between_text = char_slice(&doc.text, between)
                    .unwrap_or_default()
                    .to_lowercase();
                let weights = stats.words.entry(combination).or_default();
                for w in words(&between_text) {
                    let df = all_words.get(w).copied().unwrap_or(1) as f64;
                    *weights.entry(w.to_string()).or_default() += 1.0 / df;
                }
            }
        }
    }

    /// Highest-weighted words between related entities, per
    /// `"{doc type}_{combination}"`
    pub fn top_words(&self, n: usize) -> BTreeMap<String, Vec<(String, f64)>> {
        let mut top = BTreeMap::new();
        for (doc_type, stats) in &self.by_doc_type {
            for (combination, weights) in &stats.words {
                let mut ranked: Vec<(String, f64)> =
                    weights.iter().map(|(w, s)| (w.clone(), *s)).collect();
                ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                ranked.truncate(n);
                top.insert(format!("{doc_type}_{combination}"), ranked);
            }
        }
        top
    }

    /// Log the statistics at info level
    pub fn log(&self, n: usize) {
        for (doc_type, stats) in &self.by_doc_type {
            info!(
                doc_type = %doc_type,
                documents = stats.documents,
                chars = stats.chars,
                entities = stats.entities,
                relations = stats.relations,
                relation_distance = stats.relation_distance,
                multi_sentence = stats.multi_sentence,
                combinations = ?stats.combinations,
                "annotation statistics"
            );
        }
        for (key, words) in self.top_words(n) {
            info!(combination = %key, words = ?words, "relation words");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
