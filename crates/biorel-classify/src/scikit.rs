//! Feature-based learners behind a script interface
//!
//! The scikit-learn and MultiR learners share one calling convention:
//!
//! ```text
//! <command...> train <examples.jsonl> <model>
//! <command...> predict <examples.jsonl> <model>    # one score per line on stdout
//! ```
//!
//! Each example is a JSON feature record; a score above zero is a relation.

use std::path::PathBuf;

use tracing::{info, warn};

use biorel_core::{BiorelError, Corpus, KernelConfig, PairType};

use crate::external::{model_dir, parse_scores, write_lines, ExternalTool, ScoredExamples};
use crate::features::{build_examples, PairExample};
use crate::results::RelationResults;
use crate::{ClassifyError, RelationClassifier, Result};

/// A learner fed with JSON-lines feature records
#[derive(Debug)]
pub struct FeatureKernel {
    name: &'static str,
    command: Vec<String>,
    ptype: String,
    pair_type: PairType,
    max_sentence_distance: usize,
    dir: PathBuf,
    scored: ScoredExamples,
}

impl FeatureKernel {
    /// Kernel running `command` under the provenance `name`
    pub fn new(
        name: &'static str,
        command: Vec<String>,
        ptype: impl Into<String>,
        pair_type: PairType,
        config: &KernelConfig,
    ) -> Self {
        let ptype = ptype.into();
        Self {
            name,
            command,
            dir: model_dir(&config.models_dir, &ptype),
            ptype,
            pair_type,
            max_sentence_distance: config.max_sentence_distance,
            scored: ScoredExamples::default(),
        }
    }

    /// scikit-learn classifier script
    pub fn scikit(ptype: impl Into<String>, pair_type: PairType, config: &KernelConfig) -> Self {
        Self::new("scikit", config.scikit_command.clone(), ptype, pair_type, config)
    }

    /// MultiR learner
    pub fn multir(ptype: impl Into<String>, pair_type: PairType, config: &KernelConfig) -> Self {
        Self::new("multir", config.multir_command.clone(), ptype, pair_type, config)
    }

    pub fn model_file(&self) -> PathBuf {
        self.dir.join(format!("{}.model", self.name))
    }

    fn examples_file(&self, stage: &str) -> PathBuf {
        self.dir.join(format!("{}_{stage}.jsonl", self.name))
    }

    fn write_examples(&self, stage: &str, examples: &[PairExample]) -> Result<PathBuf> {
        let path = self.examples_file(stage);
        write_lines(&path, examples, |e| {
            serde_json::to_string(&e.to_features())
                .map_err(|err| ClassifyError::Core(BiorelError::from(err)))
        })?;
        Ok(path)
    }
}

impl RelationClassifier for FeatureKernel {
    fn name(&self) -> &str {
        self.name
    }

    fn ptype(&self) -> &str {
        &self.ptype
    }

    fn train(&mut self, corpus: &Corpus) -> Result<()> {
        let examples = build_examples(corpus, &self.ptype, &self.pair_type, self.max_sentence_distance);
        if examples.is_empty() {
            warn!(kernel = self.name, ptype = %self.ptype, "no training examples");
        }
        let train = self.write_examples("train", &examples)?;

        ExternalTool::from_command(&self.command)?
            .arg("train")
            .arg(&train)
            .arg(self.model_file())
            .run()?;
        info!(kernel = self.name, model = %self.model_file().display(), "trained model");
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
        let examples = build_examples(corpus, &self.ptype, &self.pair_type, self.max_sentence_distance);
        self.scored = ScoredExamples::default();
        if examples.is_empty() {
            warn!(kernel = self.name, ptype = %self.ptype, "no candidate pairs");
            return Ok(());
        }
        let test = self.write_examples("test", &examples)?;

        let output = ExternalTool::from_command(&self.command)?
            .arg("predict")
            .arg(&test)
            .arg(self.model_file())
            .run()?;
        let scores = parse_scores(&output, examples.len(), self.name)?;
        self.scored = ScoredExamples { examples, scores };
        Ok(())
    }

    fn get_predictions(&self, corpus: &mut Corpus) -> Result<RelationResults> {
        self.scored
            .predictions(corpus, self.name, &self.ptype, |score| score > 0.0)
    }
}
