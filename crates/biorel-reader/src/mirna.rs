//! miRNA corpus reader
//!
//! The corpus is a single XML file of sentence-split documents:
//!
//! ```xml
//! <corpus>
//!   <document id="miRNA-corp.d1">
//!     <sentence id="miRNA-corp.d1.s0" text="...">
//!       <entity id="miRNA-corp.d1.s0.e0" charOffset="4-9" type="Specific_miRNAs" text="..."/>
//!     </sentence>
//!   </document>
//! </corpus>
//! ```
//!
//! `charOffset` values are sentence-relative with an inclusive end and may
//! list several fragments separated by `;`.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, warn};

use biorel_core::span::{char_len, parse_char_offsets};
use biorel_core::{BiorelError, Corpus, Document, Sentence, GOLD_STANDARD};

use crate::{read_file, type_selected, AnnotationReport, CorpusFormat, CorpusReader, ReaderError, Result};

/// Map an annotation type to the internal entity type
pub fn map_type(annotated: &str) -> Option<&'static str> {
    match annotated {
        "Specific_miRNAs" | "Non-Specific_miRNAs" => Some("mirna"),
        "Genes/Proteins" => Some("protein"),
        _ => None,
    }
}

// ============================================================================
// XML structure
// ============================================================================

#[derive(Debug, Deserialize)]
struct XmlCorpus {
    #[serde(rename = "document", default)]
    documents: Vec<XmlDocument>,
}

#[derive(Debug, Deserialize)]
struct XmlDocument {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "sentence", default)]
    sentences: Vec<XmlSentence>,
}

#[derive(Debug, Deserialize)]
struct XmlSentence {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@text", default)]
    text: String,
    #[serde(rename = "entity", default)]
    entities: Vec<XmlEntity>,
}

#[derive(Debug, Deserialize)]
struct XmlEntity {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@charOffset")]
    char_offset: String,
    #[serde(rename = "@type")]
    etype: String,
    #[serde(rename = "@text")]
    text: Option<String>,
}

fn parse_xml(path: &Path) -> Result<XmlCorpus> {
    let content = read_file(path)?;
    quick_xml::de::from_str(&content).map_err(|e| ReaderError::Xml {
        path: path.display().to_string(),
        source: e,
    })
}

/// Document-relative offsets of sentences joined by a single space
fn sentence_offsets(sentences: &[XmlSentence]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(sentences.len());
    let mut offset = 0;
    for sentence in sentences {
        offsets.push(offset);
        offset += char_len(&sentence.text) + 1;
    }
    offsets
}

// ============================================================================
// Reader
// ============================================================================

/// Reader for the miRNA XML corpus
#[derive(Debug, Default)]
pub struct MirnaReader;

impl MirnaReader {
    /// Create a new miRNA reader
    pub fn new() -> Self {
        Self
    }
}

impl CorpusReader for MirnaReader {
    fn format(&self) -> CorpusFormat {
        CorpusFormat::Mirna
    }

    fn load_corpus(&self, path: &Path) -> Result<Corpus> {
        let xml = parse_xml(path)?;
        let mut corpus = Corpus::new(path.display().to_string());

        for xml_doc in xml.documents {
            let offsets = sentence_offsets(&xml_doc.sentences);
            let text = xml_doc
                .sentences
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");

            let mut doc = Document::new(&xml_doc.id, text);
            for (sentence, offset) in xml_doc.sentences.iter().zip(offsets) {
                doc.add_sentence(Sentence::new(
                    &sentence.text,
                    offset,
                    &sentence.id,
                    &xml_doc.id,
                ));
            }
            debug!(did = %doc.did, sentences = doc.sentences.len(), "loaded document");
            corpus.insert(doc);
        }

        info!(documents = corpus.len(), "loaded miRNA corpus");
        Ok(corpus)
    }

    fn load_annotations(
        &self,
        corpus: &mut Corpus,
        path: &Path,
        etype: &str,
    ) -> Result<AnnotationReport> {
        info!(path = %path.display(), "loading miRNA annotations");
        let xml = parse_xml(path)?;
        corpus.clear_annotations(GOLD_STANDARD);
        let mut report = AnnotationReport::default();

        for xml_doc in xml.documents {
            let doc = corpus.document_mut(&xml_doc.id)?;
            for xml_sentence in xml_doc.sentences {
                let sentence = doc.get_sentence_mut(&xml_sentence.id).ok_or_else(|| {
                    BiorelError::SentenceNotFound {
                        did: xml_doc.id.clone(),
                        sid: xml_sentence.id.clone(),
                    }
                })?;

                for entity in xml_sentence.entities {
                    let Some(mapped) = map_type(&entity.etype) else {
                        report.skip("unmapped type");
                        continue;
                    };
                    if !type_selected(etype, mapped) {
                        report.skip("filtered type");
                        continue;
                    }

                    let fragments = parse_char_offsets(&entity.char_offset, true)?;
                    match sentence.tag_entity(
                        &fragments,
                        mapped,
                        entity.text.as_deref(),
                        Some(&entity.id),
                        GOLD_STANDARD,
                    ) {
                        Ok(_) => report.entities_tagged += 1,
                        Err(e) => {
                            warn!(eid = %entity.id, error = %e, "skipping entity");
                            report.skip("out of bounds");
                        }
                    }
                }
            }
        }

        info!(
            tagged = report.entities_tagged,
            skipped = report.skipped_total(),
            "loaded miRNA annotations"
        );
        Ok(report)
    }
}

// ============================================================================
// Gold standard
// ============================================================================

/// A gold-standard entity with document-relative offsets
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GoldEntity {
    pub did: String,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Single-span gold entities of one type, with document offsets computed
/// the same way as [`MirnaReader::load_corpus`]
pub fn gold_entities(path: &Path, etype: &str) -> Result<BTreeSet<GoldEntity>> {
    info!(path = %path.display(), "loading gold standard");
    let xml = parse_xml(path)?;
    let mut gold = BTreeSet::new();

    for xml_doc in &xml.documents {
        let offsets = sentence_offsets(&xml_doc.sentences);
        for (sentence, offset) in xml_doc.sentences.iter().zip(offsets) {
            for entity in &sentence.entities {
                if entity.char_offset.contains(';') {
                    continue;
                }
                if !map_type(&entity.etype).is_some_and(|t| type_selected(etype, t)) {
                    continue;
                }
                let span = parse_char_offsets(&entity.char_offset, true)?[0].shift(offset);
                gold.insert(GoldEntity {
                    did: xml_doc.id.clone(),
                    start: span.start,
                    end: span.end,
                    text: entity.text.clone().unwrap_or_default(),
                });
            }
        }
    }
    debug!(count = gold.len(), "gold entities");
    Ok(gold)
}

// ============================================================================
// Tests
// ============================================================================
