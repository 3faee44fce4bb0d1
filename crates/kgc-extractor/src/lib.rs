//! KGC Extractor - Named entity recognition
//!
//! Tags entity spans in free text. The recognizer is loaded once at startup
//! and shared read-only, like the link prediction model.

use kgc_core::Result;
use serde::{Deserialize, Serialize};

/// Extracted entity from text
///
/// `start` and `end` are byte offsets into the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub text: String,
    pub entity_type: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f32,
}

/// Trait for entity extractors
pub trait EntityExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Result<Vec<ExtractedEntity>>;

    /// Extract and serialize the annotations as a JSON array
    fn annotate(&self, text: &str) -> Result<String> {
        let entities = self.extract(text)?;
        serde_json::to_string(&entities).map_err(|e| kgc_core::KgcError::Other(e.into()))
    }
}

pub mod ner;

pub use ner::{EntityType, RuleBasedNer};
