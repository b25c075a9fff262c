//! biorel Reader - Gold-standard corpus readers
//!
//! Supports:
//! - miRNA corpus XML (sentence-split documents, inclusive `charOffset`s)
//! - Clinical TempEval / THYME plain text with Anafora XML annotations
//! - BioNLP shared-task standoff (`.txt`, `.a1`, `.a2`), as used by SeeDev
//!
//! Each reader implements the `CorpusReader` trait: it builds a
//! [`Corpus`] from the corpus text, then aligns annotation offsets onto the
//! sentences of that corpus.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use biorel_core::{AppConfig, BiorelError, Corpus};

pub mod mirna;
pub mod seedev;
pub mod sentences;
pub mod tempeval;

pub use mirna::MirnaReader;
pub use seedev::SeeDevReader;
pub use tempeval::{AnnotationStats, TempEvalReader};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while reading corpora
#[derive(Error, Debug)]
pub enum ReaderError {
    /// Corpus format is not supported
    #[error("Unsupported corpus format: {0}")]
    UnknownFormat(String),

    /// IO error while reading a file
    #[error("IO error reading {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// XML could not be deserialized
    #[error("XML error in {path}: {source}")]
    Xml {
        path: String,
        #[source]
        source: quick_xml::DeError,
    },

    /// A line of a standoff file could not be parsed
    #[error("Malformed line {line} in {path}: {content}")]
    MalformedLine {
        path: String,
        line: usize,
        content: String,
    },

    /// Required attribute or element missing
    #[error("Missing {what} in {path}")]
    MissingAttribute { what: String, path: String },

    /// Error from the document model
    #[error(transparent)]
    Core(#[from] BiorelError),
}

impl ReaderError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReaderError>;

/// Read a whole file, mapping the error to `ReaderError::Io`
pub(crate) fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| ReaderError::io(path, e))
}

// ============================================================================
// Formats and Reports
// ============================================================================

/// Supported corpus formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusFormat {
    Mirna,
    TempEval,
    SeeDev,
}

impl std::str::FromStr for CorpusFormat {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mirna" | "ddi-mirna" => Ok(Self::Mirna),
            "tempeval" | "thyme" => Ok(Self::TempEval),
            "seedev" | "bionlp" => Ok(Self::SeeDev),
            _ => Err(ReaderError::UnknownFormat(s.to_string())),
        }
    }
}

impl std::fmt::Display for CorpusFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mirna => write!(f, "mirna"),
            Self::TempEval => write!(f, "tempeval"),
            Self::SeeDev => write!(f, "seedev"),
        }
    }
}

/// What happened while loading annotations
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnnotationReport {
    /// Entities aligned onto sentences
    pub entities_tagged: usize,
    /// Skipped entities by reason
    pub entities_skipped: BTreeMap<String, usize>,
    /// Relation edges attached to source entities
    pub relations_linked: usize,
    /// Relation edges whose target could not be resolved
    pub relations_skipped: usize,
    /// Documents without an annotation file
    pub missing_annotations: Vec<String>,
}

impl AnnotationReport {
    /// Count a skipped entity
    pub fn skip(&mut self, reason: &str) {
        *self.entities_skipped.entry(reason.to_string()).or_default() += 1;
    }

    pub fn skipped_total(&self) -> usize {
        self.entities_skipped.values().sum()
    }

    /// Fold another report into this one
    pub fn absorb(&mut self, other: AnnotationReport) {
        self.entities_tagged += other.entities_tagged;
        self.relations_linked += other.relations_linked;
        self.relations_skipped += other.relations_skipped;
        for (reason, count) in other.entities_skipped {
            *self.entities_skipped.entry(reason).or_default() += count;
        }
        self.missing_annotations.extend(other.missing_annotations);
    }
}

// ============================================================================
// Reader Trait
// ============================================================================

/// Trait for corpus readers
pub trait CorpusReader {
    /// Format handled by this reader
    fn format(&self) -> CorpusFormat;

    /// Build a corpus from the corpus text
    fn load_corpus(&self, path: &Path) -> Result<Corpus>;

    /// Align gold-standard annotations onto a loaded corpus.
    ///
    /// `etype` is `all` or a single entity type to keep.
    fn load_annotations(&self, corpus: &mut Corpus, path: &Path, etype: &str)
        -> Result<AnnotationReport>;
}

/// Reader for a format
pub fn reader_for(format: CorpusFormat, config: &AppConfig) -> Box<dyn CorpusReader> {
    match format {
        CorpusFormat::Mirna => Box::new(MirnaReader::new()),
        CorpusFormat::TempEval => Box::new(TempEvalReader::new(
            config.tempeval.invalid_sections.clone(),
        )),
        CorpusFormat::SeeDev => Box::new(SeeDevReader::new()),
    }
}

/// True when `etype` passes an `all`-or-exact filter
pub(crate) fn type_selected(filter: &str, etype: &str) -> bool {
    filter.eq_ignore_ascii_case("all") || filter.eq_ignore_ascii_case(etype)
}

// ============================================================================
// Tests
// ============================================================================
