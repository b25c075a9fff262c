//! Corpus of documents and its on-disk form

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::document::Document;
use crate::{BiorelError, Result};

/// A set of documents keyed by id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Corpus {
    /// Where the corpus text came from, or a merged name such as `train+dev`
    pub path: String,
    pub documents: BTreeMap<String, Document>,
    pub created_at: DateTime<Utc>,
}

impl Corpus {
    /// Create an empty corpus
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            documents: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Add or replace a document
    pub fn insert(&mut self, doc: Document) {
        self.documents.insert(doc.did.clone(), doc);
    }

    pub fn get(&self, did: &str) -> Option<&Document> {
        self.documents.get(did)
    }

    pub fn get_mut(&mut self, did: &str) -> Option<&mut Document> {
        self.documents.get_mut(did)
    }

    /// Document lookup that fails with `NotFound`
    pub fn document_mut(&mut self, did: &str) -> Result<&mut Document> {
        self.documents
            .get_mut(did)
            .ok_or_else(|| BiorelError::NotFound(format!("document {did}")))
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Take every document of `other`, replacing documents with the same id
    pub fn merge(&mut self, other: Corpus) {
        self.documents.extend(other.documents);
    }

    /// Remove the entities of one annotation source from every document
    pub fn clear_annotations(&mut self, source: &str) {
        for doc in self.documents.values_mut() {
            doc.clear_annotations(source);
        }
    }

    /// Number of entities of a source
    pub fn entity_count(&self, source: &str) -> usize {
        self.documents()
            .flat_map(|d| d.sentences.iter())
            .map(|s| s.entities(source).len())
            .sum()
    }

    /// Number of relation edges between entities of a source
    pub fn relation_count(&self, source: &str) -> usize {
        self.documents()
            .flat_map(|d| d.sentences.iter())
            .flat_map(|s| s.entities(source).iter())
            .map(|e| e.targets.len())
            .sum()
    }

    /// Write the corpus as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        let file = File::create(path).map_err(|e| io_error(path, e))?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        info!(path = %path.display(), documents = self.len(), "saved corpus");
        Ok(())
    }

    /// Read a corpus written by [`Corpus::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| io_error(path, e))?;
        let corpus: Corpus = serde_json::from_reader(BufReader::new(file))?;
        info!(path = %path.display(), documents = corpus.len(), "loaded corpus");
        Ok(corpus)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> BiorelError {
    BiorelError::Io {
        path: path.display().to_string(),
        source,
    }
}

// ============================================================================
// Tests
// ============================================================================
