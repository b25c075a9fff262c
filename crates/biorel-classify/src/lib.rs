//! biorel Classify - Relation classification
//!
//! Classifies candidate entity pairs of an annotated corpus. Every kernel
//! implements [`RelationClassifier`]:
//! - `rules`: accepts every same-sentence pair whose types fit the relation
//! - `jsre`: shallow linguistic kernel run through the jSRE Java tool
//! - `svmtk`: tree kernel run through SVM-light-TK
//! - `scikit` / `multir`: feature records handed to an external learner
//!
//! Predictions are collected as [`RelationResults`] and scored against the
//! gold relations with the [`metrics`] module.

use std::path::PathBuf;

use thiserror::Error;

use biorel_core::{AppConfig, BiorelError, Corpus};

pub mod external;
pub mod features;
pub mod jsre;
pub mod metrics;
pub mod results;
pub mod rules;
pub mod scikit;
pub mod svmtk;

pub use features::PairExample;
pub use jsre::JsreKernel;
pub use metrics::{AggregateMetrics, GoldRelation, RelationMetrics};
pub use results::RelationResults;
pub use rules::RuleClassifier;
pub use scikit::FeatureKernel;
pub use svmtk::SvmTkKernel;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while training or applying a classifier
#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error(transparent)]
    Core(#[from] BiorelError),

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Malformed output from {tool}: {message}")]
    MalformedOutput { tool: String, message: String },

    #[error("Unknown kernel: {0}")]
    UnknownKernel(String),

    #[error("Unknown pair type: {0}")]
    UnknownPairType(String),

    #[error("No trained model at {0}")]
    NotTrained(PathBuf),

    #[error("{kernel} does not support {operation}")]
    Unsupported { kernel: String, operation: String },
}

impl ClassifyError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into().display().to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClassifyError>;

// ============================================================================
// Classifier Trait
// ============================================================================

/// A relation classifier for one pair type
pub trait RelationClassifier {
    /// Provenance name recorded on predicted pairs
    fn name(&self) -> &str;

    /// Pair type this classifier decides
    fn ptype(&self) -> &str;

    /// Train on the gold relations of a corpus
    fn train(&mut self, corpus: &Corpus) -> Result<()>;

    /// Prepare a trained model for testing
    fn load_classifier(&mut self) -> Result<()>;

    /// Score the candidate pairs of a corpus
    fn test(&mut self, corpus: &Corpus) -> Result<()>;

    /// Add the pairs accepted by the last `test` to the corpus documents
    fn get_predictions(&self, corpus: &mut Corpus) -> Result<RelationResults>;
}

/// Available kernels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelKind {
    Rules,
    Jsre,
    SvmTk,
    Scikit,
    MultiR,
}

impl std::str::FromStr for KernelKind {
    type Err = ClassifyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "rules" => Ok(Self::Rules),
            "jsre" => Ok(Self::Jsre),
            "svmtk" => Ok(Self::SvmTk),
            "scikit" => Ok(Self::Scikit),
            "multir" => Ok(Self::MultiR),
            _ => Err(ClassifyError::UnknownKernel(s.to_string())),
        }
    }
}

impl std::fmt::Display for KernelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Rules => "rules",
            Self::Jsre => "jsre",
            Self::SvmTk => "svmtk",
            Self::Scikit => "scikit",
            Self::MultiR => "multir",
        };
        write!(f, "{name}")
    }
}

/// Build a classifier of `kind` for a configured pair type
pub fn build_classifier(
    kind: KernelKind,
    ptype: &str,
    config: &AppConfig,
) -> Result<Box<dyn RelationClassifier>> {
    let pair_type = config
        .pair_types
        .get(ptype)
        .cloned()
        .ok_or_else(|| ClassifyError::UnknownPairType(ptype.to_string()))?;
    let kernels = &config.kernels;

    Ok(match kind {
        KernelKind::Rules => Box::new(
            RuleClassifier::new(ptype, pair_type)
                .with_max_sentence_distance(kernels.max_sentence_distance),
        ),
        KernelKind::Jsre => Box::new(JsreKernel::new(ptype, pair_type, kernels)),
        KernelKind::SvmTk => Box::new(SvmTkKernel::new(ptype, pair_type, kernels)),
        KernelKind::Scikit => Box::new(FeatureKernel::scikit(ptype, pair_type, kernels)),
        KernelKind::MultiR => Box::new(FeatureKernel::multir(ptype, pair_type, kernels)),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_kind_parse() {
        assert_eq!("jsre".parse::<KernelKind>().unwrap(), KernelKind::Jsre);
        assert_eq!("SVMTK".parse::<KernelKind>().unwrap(), KernelKind::SvmTk);
        assert_eq!(KernelKind::MultiR.to_string(), "multir");
        assert!(matches!(
            "stanfordre".parse::<KernelKind>(),
            Err(ClassifyError::UnknownKernel(_))
        ));
    }

    #[test]
    fn test_build_classifier() {
        let config = AppConfig::default();
        for kind in [
            KernelKind::Rules,
            KernelKind::Jsre,
            KernelKind::SvmTk,
            KernelKind::Scikit,
            KernelKind::MultiR,
        ] {
            let classifier = build_classifier(kind, "mirna_protein", &config).unwrap();
            assert_eq!(classifier.name(), kind.to_string());
            assert_eq!(classifier.ptype(), "mirna_protein");
        }

        assert!(matches!(
            build_classifier(KernelKind::Rules, "nope", &config),
            Err(ClassifyError::UnknownPairType(_))
        ));
    }
}
