//! Relation extraction results
//!
//! A [`RelationResults`] holds the pairs a classifier accepted, indexed by
//! pair id and by document. Results are saved as JSON and can be written
//! out as BioNLP `.a2` files.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use biorel_core::{Corpus, Entity, Pair, PairType};

use crate::{ClassifyError, Result};

/// Pairs accepted by a classifier run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationResults {
    /// Run name, usually the output path
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Pair id -> pair
    pub pairs: BTreeMap<String, Pair>,
    /// Document id -> pairs of that document
    pub document_pairs: BTreeMap<String, Vec<Pair>>,
}

impl RelationResults {
    /// Create empty results
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_at: Utc::now(),
            pairs: BTreeMap::new(),
            document_pairs: BTreeMap::new(),
        }
    }

    /// Add a pair
    pub fn add(&mut self, pair: Pair) {
        self.document_pairs
            .entry(pair.did.clone())
            .or_default()
            .push(pair.clone());
        self.pairs.insert(pair.pid.clone(), pair);
    }

    /// Record an accepted pair on its document and in these results
    pub fn record(
        &mut self,
        corpus: &mut Corpus,
        source: &Entity,
        target: &Entity,
        relation: &str,
        classifier: &str,
        score: f32,
    ) -> Result<()> {
        let doc = corpus.document_mut(&source.did)?;
        let pair = doc.add_relation(source, target, relation, true);
        pair.recognized_by.insert(classifier.to_string(), score);
        debug!(pid = %pair.pid, classifier, score, "recorded pair");
        let pair = pair.clone();
        self.add(pair);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Take every pair of `other`
    pub fn merge(&mut self, other: RelationResults) {
        for pair in other.pairs.into_values() {
            self.add(pair);
        }
    }

    /// Save as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ClassifyError::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| ClassifyError::io(path, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(biorel_core::BiorelError::from)?;
        info!(path = %path.display(), pairs = self.len(), "saved results");
        Ok(())
    }

    /// Load results written by [`RelationResults::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ClassifyError::io(path, e))?;
        let results = serde_json::from_reader(BufReader::new(file))
            .map_err(biorel_core::BiorelError::from)?;
        Ok(results)
    }

    /// Write one BioNLP `<did>.a2` file per document into `dir`.
    ///
    /// Argument roles come from the pair type named by each pair's
    /// relation. Returns the number of files written.
    pub fn write_bionlp(
        &self,
        dir: impl AsRef<Path>,
        pair_types: &BTreeMap<String, PairType>,
    ) -> Result<usize> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| ClassifyError::io(dir, e))?;

        for (did, pairs) in &self.document_pairs {
            let path = dir.join(format!("{did}.a2"));
            let file = File::create(&path).map_err(|e| ClassifyError::io(&path, e))?;
            let mut out = BufWriter::new(file);
            for (n, pair) in pairs.iter().enumerate() {
                let line = bionlp_line(n + 1, pair, pair_types)?;
                writeln!(out, "{line}").map_err(|e| ClassifyError::io(&path, e))?;
            }
            out.flush().map_err(|e| ClassifyError::io(&path, e))?;
            debug!(path = %path.display(), pairs = pairs.len(), "wrote a2 file");
        }
        info!(dir = %dir.display(), documents = self.document_pairs.len(), "wrote BioNLP results");
        Ok(self.document_pairs.len())
    }
}

fn original_id(entity: &Entity) -> &str {
    entity.original_id.as_deref().unwrap_or(&entity.eid)
}

/// `E<n>\t<relation> <source role>:<source id> <target role>:<target id>`
pub fn bionlp_line(n: usize, pair: &Pair, pair_types: &BTreeMap<String, PairType>) -> Result<String> {
    let pair_type = pair_types
        .get(&pair.relation)
        .ok_or_else(|| ClassifyError::UnknownPairType(pair.relation.clone()))?;
    Ok(format!(
        "E{n}\t{} {}:{} {}:{}",
        pair.relation,
        pair_type.source_role,
        original_id(&pair.source),
        pair_type.target_role,
        original_id(&pair.target),
    ))
}

// ============================================================================
// Tests
// ============================================================================
