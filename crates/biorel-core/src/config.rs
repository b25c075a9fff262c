//! biorel Configuration Management
//!
//! Handles configuration from a TOML file and environment variables with
//! defaults that work for a local checkout of the corpora.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::sections::DEFAULT_INVALID_SECTIONS;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Gold-standard corpora by name
    pub paths: BTreeMap<String, CorpusPaths>,

    /// Relation types by name
    pub pair_types: BTreeMap<String, PairType>,

    /// External kernel settings
    pub kernels: KernelConfig,

    /// TempEval corpus settings
    pub tempeval: TempEvalConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut pair_types = BTreeMap::new();
        let temporal = ["event", "timex3", "sectiontime", "doctime"];
        pair_types.insert(
            "tlink".to_string(),
            PairType::new(&temporal, &temporal).with_roles("Source", "Target"),
        );
        pair_types.insert(
            "mirna_protein".to_string(),
            PairType::new(&["mirna"], &["protein"]).with_roles("miRNA", "Protein"),
        );

        Self {
            paths: BTreeMap::new(),
            pair_types,
            kernels: KernelConfig::default(),
            tempeval: TempEvalConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that corpora and relation types carry their required fields
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, paths) in &self.paths {
            if paths.format.trim().is_empty() {
                return Err(ConfigError::MissingRequired(format!("paths.{name}.format")));
            }
            if paths.text.as_os_str().is_empty() {
                return Err(ConfigError::MissingRequired(format!("paths.{name}.text")));
            }
            if paths.corpus.as_os_str().is_empty() {
                return Err(ConfigError::MissingRequired(format!("paths.{name}.corpus")));
            }
        }
        for (name, pair_type) in &self.pair_types {
            if pair_type.source_types.is_empty() {
                return Err(ConfigError::MissingRequired(format!(
                    "pair_types.{name}.source_types"
                )));
            }
            if pair_type.target_types.is_empty() {
                return Err(ConfigError::MissingRequired(format!(
                    "pair_types.{name}.target_types"
                )));
            }
        }
        Ok(())
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(level) = std::env::var("BIOREL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(dir) = std::env::var("BIOREL_MODELS_DIR") {
            self.kernels.models_dir = PathBuf::from(dir);
        }
        if let Ok(java) = std::env::var("BIOREL_JAVA") {
            self.kernels.java = java;
        }
        if let Ok(classpath) = std::env::var("BIOREL_JSRE_CLASSPATH") {
            self.kernels.jsre_classpath = classpath;
        }
        if let Ok(distance) = std::env::var("BIOREL_MAX_SENTENCE_DISTANCE") {
            self.kernels.max_sentence_distance =
                distance.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "BIOREL_MAX_SENTENCE_DISTANCE".to_string(),
                    value: distance,
                })?;
        }
        Ok(())
    }

    /// Paths of a configured corpus
    pub fn corpus(&self, name: &str) -> Result<&CorpusPaths, ConfigError> {
        self.paths
            .get(name)
            .ok_or_else(|| ConfigError::UnknownCorpus(name.to_string()))
    }

    /// A configured relation type
    pub fn pair_type(&self, name: &str) -> Result<&PairType, ConfigError> {
        self.pair_types
            .get(name)
            .ok_or_else(|| ConfigError::UnknownPairType(name.to_string()))
    }
}

/// Files of one gold-standard corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusPaths {
    /// Reader format: `mirna`, `tempeval` or `seedev`
    pub format: String,

    /// Corpus text (file or directory, depending on the format)
    pub text: PathBuf,

    /// Annotations; absent for unannotated test sets
    pub annotations: Option<PathBuf>,

    /// Where the processed corpus is saved
    pub corpus: PathBuf,
}

/// Source/target type constraints of a relation type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairType {
    pub source_types: Vec<String>,
    pub target_types: Vec<String>,

    /// Argument role of the source in BioNLP output
    #[serde(default = "default_source_role")]
    pub source_role: String,

    /// Argument role of the target in BioNLP output
    #[serde(default = "default_target_role")]
    pub target_role: String,
}

fn default_source_role() -> String {
    "Source".to_string()
}

fn default_target_role() -> String {
    "Target".to_string()
}

impl PairType {
    /// Create a pair type; types are stored lowercase
    pub fn new(source_types: &[&str], target_types: &[&str]) -> Self {
        Self {
            source_types: source_types.iter().map(|t| t.to_lowercase()).collect(),
            target_types: target_types.iter().map(|t| t.to_lowercase()).collect(),
            source_role: default_source_role(),
            target_role: default_target_role(),
        }
    }

    /// Set BioNLP argument roles
    pub fn with_roles(mut self, source_role: &str, target_role: &str) -> Self {
        self.source_role = source_role.to_string();
        self.target_role = target_role.to_string();
        self
    }

    /// True if an entity of `source` type may point at one of `target` type
    pub fn accepts(&self, source: &str, target: &str) -> bool {
        self.source_types.iter().any(|t| t.eq_ignore_ascii_case(source))
            && self.target_types.iter().any(|t| t.eq_ignore_ascii_case(target))
    }
}

/// External kernel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Directory for example files and trained models
    pub models_dir: PathBuf,

    /// Maximum sentence distance between pair entities
    pub max_sentence_distance: usize,

    /// Java executable
    pub java: String,

    /// Maximum JVM heap, e.g. `4g`
    pub java_memory: String,

    /// Classpath containing jSRE and its libraries
    pub jsre_classpath: String,

    /// jSRE kernel (`SL`, `LC` or `GC`)
    pub jsre_kernel: String,

    /// jSRE n-gram size
    pub jsre_ngram: u32,

    /// jSRE window size
    pub jsre_window: u32,

    /// jSRE cost parameter
    pub jsre_cost: f32,

    /// SVM-light-TK learner binary
    pub svm_learn: String,

    /// SVM-light-TK classifier binary
    pub svm_classify: String,

    /// Extra learner arguments (tree kernel selection)
    pub svm_learn_args: Vec<String>,

    /// Command running the scikit-learn script; gets `train|predict <examples> <model> [output]`
    pub scikit_command: Vec<String>,

    /// Command running the MultiR learner; same calling convention as scikit
    pub multir_command: Vec<String>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            max_sentence_distance: 0,
            java: "java".to_string(),
            java_memory: "4g".to_string(),
            jsre_classpath: "bin/jsre/jsre-1.1/bin:bin/jsre/jsre-1.1/lib/*".to_string(),
            jsre_kernel: "SL".to_string(),
            jsre_ngram: 3,
            jsre_window: 3,
            jsre_cost: 2.0,
            svm_learn: "svm_learn".to_string(),
            svm_classify: "svm_classify".to_string(),
            svm_learn_args: vec!["-t".to_string(), "5".to_string()],
            scikit_command: vec!["python3".to_string(), "bin/scikit_re.py".to_string()],
            multir_command: vec!["python3".to_string(), "bin/multir_re.py".to_string()],
        }
    }
}

/// TempEval corpus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TempEvalConfig {
    /// Section ids whose sentences are excluded
    pub invalid_sections: Vec<u32>,
}

impl Default for TempEvalConfig {
    fn default() -> Self {
        Self {
            invalid_sections: DEFAULT_INVALID_SECTIONS.to_vec(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json_format: false,
            include_location: true,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Unknown corpus: {0}")]
    UnknownCorpus(String),

    #[error("Unknown pair type: {0}")]
    UnknownPairType(String),
}
