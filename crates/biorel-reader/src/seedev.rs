//! BioNLP shared-task standoff reader (SeeDev)
//!
//! Each document is a `<did>.txt` file next to `<did>.a1` (entities) and
//! `<did>.a2` (relations, sometimes extra entities):
//!
//! ```text
//! T1	Protein 0 4	PTEN
//! T2	Tissue 19 24;30 35	root tip
//! E1	Is_Localized_In Functional_Molecule:T1 Target_Tissue:T2
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use biorel_core::span::{parse_standoff_offsets, Span};
use biorel_core::{Corpus, Document, RelationTarget, GOLD_STANDARD};

use crate::sentences::split_sentences;
use crate::{read_file, type_selected, AnnotationReport, CorpusFormat, CorpusReader, ReaderError, Result};

/// A text-bound annotation line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBound {
    pub id: String,
    pub etype: String,
    pub fragments: Vec<Span>,
    pub text: String,
}

/// A relation or event line with its first two arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandoffRelation {
    pub id: String,
    pub relation: String,
    pub source: (String, String),
    pub target: (String, String),
}

/// One parsed standoff line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StandoffLine {
    Entity(TextBound),
    Relation(StandoffRelation),
    /// Attributes, normalizations and notes
    Other,
}

fn parse_argument(arg: &str) -> Option<(String, String)> {
    let (role, id) = arg.split_once(':')?;
    Some((role.to_string(), id.to_string()))
}

/// Parse one line of an `.a1` or `.a2` file
pub fn parse_line(line: &str) -> Option<StandoffLine> {
    let mut fields = line.splitn(3, '\t');
    let id = fields.next()?.trim();
    let body = fields.next()?;

    match id.chars().next()? {
        'T' => {
            let (etype, offsets) = body.split_once(' ')?;
            Some(StandoffLine::Entity(TextBound {
                id: id.to_string(),
                etype: etype.to_string(),
                fragments: parse_standoff_offsets(offsets).ok()?,
                text: fields.next().unwrap_or_default().to_string(),
            }))
        }
        'E' | 'R' => {
            let mut parts = body.split_whitespace();
            let head = parts.next()?;
            // event triggers are written `Type:T<n>`
            let relation = head.split(':').next()?.to_string();
            let mut args = parts.filter_map(parse_argument);
            Some(StandoffLine::Relation(StandoffRelation {
                id: id.to_string(),
                relation,
                source: args.next()?,
                target: args.next()?,
            }))
        }
        _ => Some(StandoffLine::Other),
    }
}

fn parse_file(path: &Path) -> Result<Vec<StandoffLine>> {
    let content = read_file(path)?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            parse_line(line).ok_or_else(|| ReaderError::MalformedLine {
                path: path.display().to_string(),
                line: n + 1,
                content: line.to_string(),
            })
        })
        .collect()
}

// ============================================================================
// Reader
// ============================================================================

/// Reader for BioNLP standoff corpora
#[derive(Debug, Default)]
pub struct SeeDevReader;

impl SeeDevReader {
    /// Create a new standoff reader
    pub fn new() -> Self {
        Self
    }

    fn load_document(
        doc: &mut Document,
        lines: Vec<StandoffLine>,
        etype: &str,
        report: &mut AnnotationReport,
    ) {
        let mut relations = Vec::new();
        for line in lines {
            match line {
                StandoffLine::Entity(entity) => {
                    let mapped = entity.etype.to_lowercase();
                    if !type_selected(etype, &mapped) {
                        report.skip("filtered type");
                        continue;
                    }
                    match doc.tag_document_entity(
                        &entity.fragments,
                        &mapped,
                        Some(&entity.text),
                        Some(&entity.id),
                        GOLD_STANDARD,
                    ) {
                        Ok(_) => report.entities_tagged += 1,
                        Err(e) => {
                            warn!(did = %doc.did, id = %entity.id, error = %e, "skipping entity");
                            report.skip("no sentence");
                        }
                    }
                }
                StandoffLine::Relation(relation) => relations.push(relation),
                StandoffLine::Other => {}
            }
        }

        for relation in relations {
            let source = doc
                .get_entity_by_original_id(&relation.source.1, GOLD_STANDARD)
                .map(|e| e.eid.clone());
            let target = doc
                .get_entity_by_original_id(&relation.target.1, GOLD_STANDARD)
                .map(|e| e.eid.clone());
            let (Some(source), Some(target)) = (source, target) else {
                debug!(did = %doc.did, id = %relation.id, "relation arguments not loaded");
                report.relations_skipped += 1;
                continue;
            };
            if let Some(entity) = doc.get_entity_mut(&source, GOLD_STANDARD) {
                entity.targets.push(RelationTarget {
                    eid: target,
                    relation: relation.relation.to_lowercase(),
                });
                report.relations_linked += 1;
            }
        }
    }
}

impl CorpusReader for SeeDevReader {
    fn format(&self) -> CorpusFormat {
        CorpusFormat::SeeDev
    }

    fn load_corpus(&self, path: &Path) -> Result<Corpus> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(path)
            .map_err(|e| ReaderError::io(path, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "txt"))
            .collect();
        files.sort();

        let mut corpus = Corpus::new(path.display().to_string());
        for file in files {
            let Some(did) = file.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            let text = read_file(&file)?;
            let mut doc = Document::new(&did, text.as_str());
            for sentence in split_sentences(&did, &text) {
                doc.add_sentence(sentence);
            }
            debug!(did = %did, sentences = doc.sentences.len(), "loaded document");
            corpus.insert(doc);
        }

        info!(documents = corpus.len(), "loaded standoff corpus");
        Ok(corpus)
    }

    fn load_annotations(
        &self,
        corpus: &mut Corpus,
        path: &Path,
        etype: &str,
    ) -> Result<AnnotationReport> {
        corpus.clear_annotations(GOLD_STANDARD);
        let mut report = AnnotationReport::default();

        for doc in corpus.documents.values_mut() {
            let a1 = path.join(format!("{}.a1", doc.did));
            if !a1.is_file() {
                warn!(did = %doc.did, "no annotations for this document");
                report.missing_annotations.push(doc.did.clone());
                continue;
            }
            let mut lines = parse_file(&a1)?;
            let a2 = path.join(format!("{}.a2", doc.did));
            if a2.is_file() {
                lines.extend(parse_file(&a2)?);
            }
            Self::load_document(doc, lines, etype, &mut report);
        }

        info!(
            tagged = report.entities_tagged,
            relations = report.relations_linked,
            missing = report.missing_annotations.len(),
            "loaded standoff annotations"
        );
        Ok(report)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lines() {
        let line = parse_line("T3\tTissue 19 24;30 35\troots tips").unwrap();
        assert_eq!(
            line,
            StandoffLine::Entity(TextBound {
                id: "T3".to_string(),
                etype: "Tissue".to_string(),
                fragments: vec![Span::new(19, 24), Span::new(30, 35)],
                text: "roots tips".to_string(),
            })
        );

        let StandoffLine::Relation(rel) =
            parse_line("E1\tInteracts_With Agent:T1 Target:T2").unwrap()
        else {
            panic!("expected relation");
        };
        assert_eq!(rel.relation, "Interacts_With");
        assert_eq!(rel.source, ("Agent".to_string(), "T1".to_string()));
        assert_eq!(rel.target.1, "T2");

        assert_eq!(parse_line("A1\tNegation E1"), Some(StandoffLine::Other));
        assert_eq!(parse_line("E2\tBinds Agent:T1"), None);
        assert_eq!(parse_line("garbage"), None);
    }

    fn setup() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("SeeDev-1.txt"),
            "PTEN binds AKT1 in roots. The gene is expressed.",
        )
        .unwrap();
        std::fs::write(dir.path().join("SeeDev-2.txt"), "No annotations here.").unwrap();
        std::fs::write(
            dir.path().join("SeeDev-1.a1"),
            "T1\tProtein 0 4\tPTEN\nT2\tProtein 11 15\tAKT1\nT3\tTissue 19 24\troots\nT4\tGene 15 30\tcrossing\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("SeeDev-1.a2"),
            "E1\tInteracts_With Agent:T1 Target:T2\nE2\tIs_Localized_In Functional_Molecule:T2 Target_Tissue:T3\nE3\tInteracts_With Agent:T1 Target:T9\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_load_corpus_and_annotations() {
        let dir = setup();
        let reader = SeeDevReader::new();
        let mut corpus = reader.load_corpus(dir.path()).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.get("SeeDev-1").unwrap().sentences.len(), 2);

        let report = reader.load_annotations(&mut corpus, dir.path(), "all").unwrap();
        assert_eq!(report.entities_tagged, 3);
        assert_eq!(report.entities_skipped["no sentence"], 1);
        assert_eq!(report.relations_linked, 2);
        assert_eq!(report.relations_skipped, 1);
        assert_eq!(report.missing_annotations, vec!["SeeDev-2".to_string()]);

        let doc = corpus.get("SeeDev-1").unwrap();
        let pten = doc.get_entity_by_original_id("T1", GOLD_STANDARD).unwrap();
        let akt1 = doc.get_entity_by_original_id("T2", GOLD_STANDARD).unwrap();
        assert_eq!(pten.etype, "protein");
        assert_eq!(akt1.dspan, Span::new(11, 15));
        assert!(pten.has_target(&akt1.eid, "interacts_with"));
    }

    #[test]
    fn test_malformed_line() {
        let dir = setup();
        std::fs::write(dir.path().join("SeeDev-1.a1"), "T1\tProtein zero four\tPTEN\n").unwrap();
        let reader = SeeDevReader::new();
        let mut corpus = reader.load_corpus(dir.path()).unwrap();
        let err = reader
            .load_annotations(&mut corpus, dir.path(), "all")
            .unwrap_err();
        assert!(matches!(err, ReaderError::MalformedLine { .. }));
    }
}
