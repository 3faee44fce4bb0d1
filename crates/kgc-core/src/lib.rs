//! KGC Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout the KGC system:
//! - Triple models (labeled, id-mapped, partial queries, ranked candidates)
//! - Entity/relation vocabularies and the delimited dataset loader
//! - Common error types
//! - The link prediction capability implemented by model backends
//! - Configuration management

pub mod config;
pub mod dataset;

pub use config::{
    AppConfig, ConfigError, DataConfig, InferenceConfig, LoggingConfig, ModelConfig, NerConfig,
    ServerConfig,
};
pub use dataset::{
    load_triples, parse_triples, Dataset, DatasetSummary, LabelIndex, TriplesFactory, Vocabulary,
};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for KGC operations
#[derive(Error, Debug)]
pub enum KgcError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Unknown relation: {0}")]
    UnknownRelation(String),

    #[error("True {target} '{label}' not found among ranked candidates")]
    TargetNotFound { target: Target, label: String },

    #[error("Model returned no {0} candidates")]
    NoCandidates(Target),

    #[error("Malformed line {line} in {path}: {content:?}")]
    MalformedLine {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, KgcError>;

// ============================================================================
// Triple Models
// ============================================================================

/// Element of a triple that a query asks the model to fill in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Head,
    Relation,
    Tail,
}

impl Target {
    /// All targets in triple order
    pub const ALL: [Target; 3] = [Target::Head, Target::Relation, Target::Tail];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Head => "head",
            Self::Relation => "relation",
            Self::Tail => "tail",
        }
    }

    /// Whether candidates for this target are entities (as opposed to relations)
    pub fn is_entity(&self) -> bool {
        !matches!(self, Self::Relation)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Target {
    type Err = KgcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "head" => Ok(Self::Head),
            "relation" => Ok(Self::Relation),
            "tail" => Ok(Self::Tail),
            other => Err(KgcError::InvalidQuery(format!(
                "unknown target '{other}', expected head, relation or tail"
            ))),
        }
    }
}

/// A labeled (head, relation, tail) fact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub head: String,
    pub relation: String,
    pub tail: String,
}

impl Triple {
    pub fn new(
        head: impl Into<String>,
        relation: impl Into<String>,
        tail: impl Into<String>,
    ) -> Self {
        Self {
            head: head.into(),
            relation: relation.into(),
            tail: tail.into(),
        }
    }

    /// Label at the given position
    pub fn get(&self, target: Target) -> &str {
        match target {
            Target::Head => &self.head,
            Target::Relation => &self.relation,
            Target::Tail => &self.tail,
        }
    }

    /// Query that hides the element at `target`
    pub fn mask(&self, target: Target) -> TripleQuery {
        let mut query = TripleQuery::from(self.clone());
        match target {
            Target::Head => query.head = None,
            Target::Relation => query.relation = None,
            Target::Tail => query.tail = None,
        }
        query
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.head, self.relation, self.tail)
    }
}

/// A triple expressed with vocabulary ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MappedTriple {
    pub head: usize,
    pub relation: usize,
    pub tail: usize,
}

impl MappedTriple {
    pub fn new(head: usize, relation: usize, tail: usize) -> Self {
        Self {
            head,
            relation,
            tail,
        }
    }

    /// Copy of this triple with the element at `target` replaced by `id`
    pub fn with(self, target: Target, id: usize) -> Self {
        match target {
            Target::Head => Self { head: id, ..self },
            Target::Relation => Self {
                relation: id,
                ..self
            },
            Target::Tail => Self { tail: id, ..self },
        }
    }
}

/// A triple with missing elements
///
/// Empty (or whitespace-only) labels are the "missing" sentinel on the wire,
/// and become `None` here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripleQuery {
    pub head: Option<String>,
    pub relation: Option<String>,
    pub tail: Option<String>,
}

impl TripleQuery {
    /// Build a query from raw labels, treating empty strings as missing
    pub fn from_labels(head: &str, relation: &str, tail: &str) -> Self {
        fn present(label: &str) -> Option<String> {
            let label = label.trim();
            (!label.is_empty()).then(|| label.to_string())
        }

        Self {
            head: present(head),
            relation: present(relation),
            tail: present(tail),
        }
    }

    pub fn get(&self, target: Target) -> Option<&str> {
        match target {
            Target::Head => self.head.as_deref(),
            Target::Relation => self.relation.as_deref(),
            Target::Tail => self.tail.as_deref(),
        }
    }

    /// Targets with no label
    pub fn missing(&self) -> Vec<Target> {
        Target::ALL
            .into_iter()
            .filter(|t| self.get(*t).is_none())
            .collect()
    }

    /// The single missing element, `None` for a complete triple.
    ///
    /// Fails with `InvalidQuery` when more than one element is missing.
    pub fn target(&self) -> Result<Option<Target>> {
        match self.missing().as_slice() {
            [] => Ok(None),
            [target] => Ok(Some(*target)),
            many => Err(KgcError::InvalidQuery(format!(
                "exactly one of head, relation, tail may be empty, got {} empty ({})",
                many.len(),
                many.iter().map(Target::as_str).collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    /// The single missing element; a complete triple is also an error here
    pub fn require_target(&self) -> Result<Target> {
        self.target()?.ok_or_else(|| {
            KgcError::InvalidQuery("query has no empty element to predict".to_string())
        })
    }

    /// Fill the missing element, producing a complete triple
    pub fn complete(&self, target: Target, label: impl Into<String>) -> Triple {
        let label = label.into();
        let pick = |t: Target| -> String {
            if t == target {
                label.clone()
            } else {
                self.get(t).unwrap_or_default().to_string()
            }
        };
        Triple::new(pick(Target::Head), pick(Target::Relation), pick(Target::Tail))
    }

    /// The query as a complete triple, if nothing is missing
    pub fn to_triple(&self) -> Option<Triple> {
        Some(Triple::new(
            self.head.clone()?,
            self.relation.clone()?,
            self.tail.clone()?,
        ))
    }
}

impl From<Triple> for TripleQuery {
    fn from(triple: Triple) -> Self {
        Self {
            head: Some(triple.head),
            relation: Some(triple.relation),
            tail: Some(triple.tail),
        }
    }
}

impl std::fmt::Display for TripleQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.head.as_deref().unwrap_or("?"),
            self.relation.as_deref().unwrap_or("?"),
            self.tail.as_deref().unwrap_or("?")
        )
    }
}

/// A ranked prediction for the missing element of a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub label: String,
    pub score: f32,
}

impl Candidate {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// 1-indexed rank of `label` within `candidates`
pub fn rank_of(candidates: &[Candidate], label: &str) -> Option<usize> {
    candidates
        .iter()
        .position(|c| c.label == label)
        .map(|idx| idx + 1)
}

// ============================================================================
// Traits
// ============================================================================

/// Link prediction capability of a trained model
///
/// Backends are loaded once at startup and are immutable afterwards, so
/// implementations are shared across request handlers without locking.
pub trait LinkPredictor: Send + Sync {
    /// Rank every candidate for the single missing element of `query`,
    /// best first.
    fn rank_candidates(&self, query: &TripleQuery) -> Result<Vec<Candidate>>;

    /// Plausibility score of a complete triple (higher is better)
    fn score(&self, triple: &Triple) -> Result<f32>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_from_labels_treats_empty_as_missing() {
        let query = TripleQuery::from_labels("A", "r", "");
        assert_eq!(query.head.as_deref(), Some("A"));
        assert_eq!(query.tail, None);
        assert_eq!(query.target().unwrap(), Some(Target::Tail));

        let query = TripleQuery::from_labels("  ", "r", "B");
        assert_eq!(query.target().unwrap(), Some(Target::Head));
    }

    #[test]
    fn test_query_complete_has_no_target() {
        let query = TripleQuery::from_labels("A", "r", "B");
        assert_eq!(query.target().unwrap(), None);
        assert_eq!(query.to_triple(), Some(Triple::new("A", "r", "B")));
        assert!(query.require_target().is_err());
    }

    #[test]
    fn test_query_with_two_missing_is_invalid() {
        let query = TripleQuery::from_labels("", "r", "");
        let err = query.target().unwrap_err();
        assert!(matches!(err, KgcError::InvalidQuery(_)));
        assert!(err.to_string().contains("head, tail"));
    }

    #[test]
    fn test_complete_fills_target() {
        let query = TripleQuery::from_labels("A", "", "B");
        let triple = query.complete(Target::Relation, "r");
        assert_eq!(triple, Triple::new("A", "r", "B"));
    }

    #[test]
    fn test_mask_and_mapped_with() {
        let triple = Triple::new("A", "r", "B");
        assert_eq!(triple.mask(Target::Head).target().unwrap(), Some(Target::Head));

        let mapped = MappedTriple::new(0, 0, 1).with(Target::Tail, 7);
        assert_eq!(mapped, MappedTriple::new(0, 0, 7));
    }

    #[test]
    fn test_target_parse() {
        assert_eq!("Tail".parse::<Target>().unwrap(), Target::Tail);
        assert_eq!("relation".parse::<Target>().unwrap(), Target::Relation);
        assert!("object".parse::<Target>().is_err());
        assert!(Target::Head.is_entity());
        assert!(!Target::Relation.is_entity());
    }

    #[test]
    fn test_rank_of() {
        let candidates = vec![
            Candidate::new("B", 0.9),
            Candidate::new("C", 0.5),
            Candidate::new("A", 0.1),
        ];
        assert_eq!(rank_of(&candidates, "B"), Some(1));
        assert_eq!(rank_of(&candidates, "A"), Some(3));
        assert_eq!(rank_of(&candidates, "Z"), None);
    }
}
