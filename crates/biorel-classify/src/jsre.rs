//! jSRE shallow linguistic kernel
//!
//! Examples are written in jSRE's token format and handed to the Java
//! `Train` and `Predict` entry points. The predicted label file holds one
//! label per example; labels of 1 and above are relations.

use std::path::PathBuf;

use tracing::{info, warn};

use biorel_core::{Corpus, KernelConfig, PairType};

use crate::external::{model_dir, parse_scores, write_lines, ExternalTool, ScoredExamples};
use crate::features::build_examples;
use crate::results::RelationResults;
use crate::{ClassifyError, RelationClassifier, Result};

const TRAIN_CLASS: &str = "org.itc.irst.tcc.sre.Train";
const PREDICT_CLASS: &str = "org.itc.irst.tcc.sre.Predict";

/// jSRE classifier for one pair type
#[derive(Debug)]
pub struct JsreKernel {
    ptype: String,
    pair_type: PairType,
    config: KernelConfig,
    dir: PathBuf,
    scored: ScoredExamples,
}

impl JsreKernel {
    pub fn new(ptype: impl Into<String>, pair_type: PairType, config: &KernelConfig) -> Self {
        let ptype = ptype.into();
        Self {
            dir: model_dir(&config.models_dir, &ptype),
            ptype,
            pair_type,
            config: config.clone(),
            scored: ScoredExamples::default(),
        }
    }

    pub fn model_file(&self) -> PathBuf {
        self.dir.join("jsre.model")
    }

    fn train_file(&self) -> PathBuf {
        self.dir.join("jsre_train.txt")
    }

    fn test_file(&self) -> PathBuf {
        self.dir.join("jsre_test.txt")
    }

    fn output_file(&self) -> PathBuf {
        self.dir.join("jsre_test.out")
    }

    fn java(&self, class: &str) -> ExternalTool {
        ExternalTool::new(&self.config.java)
            .arg(format!("-mx{}", self.config.java_memory))
            .arg("-classpath")
            .arg(&self.config.jsre_classpath)
            .arg(class)
    }
}

impl RelationClassifier for JsreKernel {
    fn name(&self) -> &str {
        "jsre"
    }

    fn ptype(&self) -> &str {
        &self.ptype
    }

    fn train(&mut self, corpus: &Corpus) -> Result<()> {
        let examples = build_examples(
            corpus,
            &self.ptype,
            &self.pair_type,
            self.config.max_sentence_distance,
        );
        if examples.is_empty() {
            warn!(ptype = %self.ptype, "no training examples");
        }
        write_lines(&self.train_file(), &examples, |e| Ok(e.to_jsre()))?;

        self.java(TRAIN_CLASS)
            .args(["-k", self.config.jsre_kernel.as_str()])
            .args(["-n".to_string(), self.config.jsre_ngram.to_string()])
            .args(["-w".to_string(), self.config.jsre_window.to_string()])
            .args(["-c".to_string(), self.config.jsre_cost.to_string()])
            .arg(self.train_file())
            .arg(self.model_file())
            .run()?;
        info!(model = %self.model_file().display(), examples = examples.len(), "trained jSRE model");
        Ok(())
    }

    fn load_classifier(&mut self) -> Result<()> {
        let model = self.model_file();
        if !model.is_file() {
            return Err(ClassifyError::NotTrained(model));
        }
        Ok(())
    }

    fn test(&mut self, corpus: &Corpus) -> Result<()> {
        let examples = build_examples(
            corpus,
            &self.ptype,
            &self.pair_type,
            self.config.max_sentence_distance,
        );
        self.scored = ScoredExamples::default();
        if examples.is_empty() {
            warn!(ptype = %self.ptype, "no candidate pairs");
            return Ok(());
        }
        write_lines(&self.test_file(), &examples, |e| Ok(e.to_jsre()))?;

        self.java(PREDICT_CLASS)
            .arg(self.test_file())
            .arg(self.model_file())
            .arg(self.output_file())
            .run()?;

        let output = std::fs::read_to_string(self.output_file())
            .map_err(|e| ClassifyError::io(self.output_file(), e))?;
        let scores = parse_scores(&output, examples.len(), "jsre")?;
        self.scored = ScoredExamples { examples, scores };
        Ok(())
    }

    fn get_predictions(&self, corpus: &mut Corpus) -> Result<RelationResults> {
        self.scored
            .predictions(corpus, "jsre", &self.ptype, |label| label >= 1.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untrained_model_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = KernelConfig {
            models_dir: dir.path().to_path_buf(),
            ..KernelConfig::default()
        };
        let mut kernel = JsreKernel::new("mirna_protein", PairType::new(&["mirna"], &["protein"]), &config);
        assert!(kernel.model_file().starts_with(dir.path().join("mirna_protein")));
        assert!(matches!(
            kernel.load_classifier(),
            Err(ClassifyError::NotTrained(_))
        ));
    }

    #[test]
    fn test_empty_corpus_scores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = KernelConfig {
            models_dir: dir.path().to_path_buf(),
            ..KernelConfig::default()
        };
        let mut kernel = JsreKernel::new("mirna_protein", PairType::new(&["mirna"], &["protein"]), &config);
        let mut corpus = Corpus::new("empty");
        kernel.test(&corpus).unwrap();
        assert!(kernel.get_predictions(&mut corpus).unwrap().is_empty());
    }
}
