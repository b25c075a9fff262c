//! biorel Core - Document model, offset alignment and shared types
//!
//! This crate defines the core abstractions used throughout biorel:
//! - Character spans and offset parsing for external annotation formats
//! - The document/sentence/entity model that annotations are aligned onto
//! - Invalid and title section detection
//! - Candidate pair generation for relation extraction
//! - Corpus persistence
//! - Configuration management

pub mod config;
pub mod corpus;
pub mod document;
pub mod pair;
pub mod sections;
pub mod span;

pub use config::{
    AppConfig, ConfigError, CorpusPaths, KernelConfig, LoggingConfig, PairType, TempEvalConfig,
};
pub use corpus::Corpus;
pub use document::{Document, Entity, RelationTarget, Sentence, Token, GOLD_STANDARD};
pub use pair::{Pair, PairGenerator};
pub use span::Span;

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for biorel operations
#[derive(Error, Debug)]
pub enum BiorelError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Sentence {sid} not found in document {did}")]
    SentenceNotFound { did: String, sid: String },

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Span {span} is outside of {container} (length {len})")]
    SpanOutOfBounds {
        span: Span,
        container: String,
        len: usize,
    },

    #[error("Span {span} of document {did} does not fall inside a single sentence")]
    CrossesSentenceBoundary { did: String, span: Span },

    #[error("Span {span} lies in invalid sentence {sid}")]
    InvalidRegion { sid: String, span: Span },

    #[error("Invalid offset specification: {0}")]
    InvalidOffset(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BiorelError>;
