//! SVM-light-TK tree kernel
//!
//! Each example becomes a flat tree over the lemmas of its sentences with
//! the two entities tagged `ENT_A` and `ENT_T`. `svm_classify` writes one
//! margin per example; a positive margin is a relation.

use std::path::PathBuf;

use tracing::{info, warn};

use biorel_core::{Corpus, KernelConfig, PairType};

use crate::external::{model_dir, parse_scores, write_lines, ExternalTool, ScoredExamples};
use crate::features::build_examples;
use crate::results::RelationResults;
use crate::{ClassifyError, RelationClassifier, Result};

/// SVM-light-TK classifier for one pair type
#[derive(Debug)]
pub struct SvmTkKernel {
    ptype: String,
    pair_type: PairType,
    config: KernelConfig,
    dir: PathBuf,
    scored: ScoredExamples,
}

impl SvmTkKernel {
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
        self.dir.join("svmtk.model")
    }

    fn examples_file(&self, stage: &str) -> PathBuf {
        self.dir.join(format!("svmtk_{stage}.txt"))
    }

    fn predictions_file(&self) -> PathBuf {
        self.dir.join("svmtk_predictions.txt")
    }
}

impl RelationClassifier for SvmTkKernel {
    fn name(&self) -> &str {
        "svmtk"
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
        let train = self.examples_file("train");
        write_lines(&train, &examples, |e| Ok(e.to_svmlight_tk()))?;

        ExternalTool::new(&self.config.svm_learn)
            .args(&self.config.svm_learn_args)
            .arg(&train)
            .arg(self.model_file())
            .run()?;
        info!(model = %self.model_file().display(), examples = examples.len(), "trained SVM-light-TK model");
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
        let test = self.examples_file("test");
        write_lines(&test, &examples, |e| Ok(e.to_svmlight_tk()))?;

        let predictions = self.predictions_file();
        ExternalTool::new(&self.config.svm_classify)
            .arg(&test)
            .arg(self.model_file())
            .arg(&predictions)
            .run()?;

        let output = std::fs::read_to_string(&predictions)
            .map_err(|e| ClassifyError::io(&predictions, e))?;
        let scores = parse_scores(&output, examples.len(), "svm_classify")?;
        self.scored = ScoredExamples { examples, scores };
        Ok(())
    }

    fn get_predictions(&self, corpus: &mut Corpus) -> Result<RelationResults> {
        self.scored
            .predictions(corpus, "svmtk", &self.ptype, |margin| margin > 0.0)
    }
}
