//! Named Entity Recognition (NER) module
//!
//! Rule-based recognizer combining:
//! - Regex patterns for dates, quantities, amounts and durations
//! - A dictionary of known terms, filled from a gazetteer file and/or the
//!   knowledge graph's entity vocabulary
//!
//! Overlapping matches are resolved by position, then confidence.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::{EntityExtractor, ExtractedEntity};
use kgc_core::{KgcError, NerConfig, Result, Vocabulary};

/// Confidence of an exact dictionary term match
const TERM_CONFIDENCE: f32 = 0.95;

/// Confidence of a dictionary alias match
const ALIAS_CONFIDENCE: f32 = 0.9;

/// Vocabulary labels shorter than this (in chars) are not used as terms
const MIN_VOCABULARY_TERM_CHARS: usize = 2;

/// Compiled size limit for the dictionary alternation
const DICTIONARY_REGEX_SIZE_LIMIT: usize = 64 << 20;

// ============================================================================
// Entity Types
// ============================================================================

/// Entity types produced by the built-in patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Date,
    Time,
    Duration,
    Percent,
    Money,
    Quantity,
    Email,
    Url,
}

impl EntityType {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "Date",
            Self::Time => "Time",
            Self::Duration => "Duration",
            Self::Percent => "Percent",
            Self::Money => "Money",
            Self::Quantity => "Quantity",
            Self::Email => "Email",
            Self::Url => "Url",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Rule-based NER
// ============================================================================

/// Dictionary entry for entity matching
#[derive(Debug, Clone)]
pub struct DictionaryEntry {
    pub term: String,
    pub entity_type: String,
    pub aliases: Vec<String>,
}

/// Rule-based NER using regex patterns and dictionaries
pub struct RuleBasedNer {
    /// Pattern rules (regex -> entity type)
    patterns: Vec<(Regex, EntityType, f32)>,
    /// Dictionary of known terms
    dictionary: HashMap<String, DictionaryEntry>,
    /// Lookup index (lowercase surface form -> (entry key, confidence))
    lookup: HashMap<String, (String, f32)>,
    /// Case-insensitive alternation of every surface form, longest first
    matcher: Option<Regex>,
    /// Annotations below this confidence are dropped
    min_confidence: f32,
}

impl RuleBasedNer {
    /// Create a recognizer with the default patterns and an empty dictionary
    pub fn new() -> Self {
        let mut ner = Self {
            patterns: Vec::new(),
            dictionary: HashMap::new(),
            lookup: HashMap::new(),
            matcher: None,
            min_confidence: 0.0,
        };

        ner.init_patterns();
        ner
    }

    /// Build from configuration, optionally tagging vocabulary entities
    pub fn from_config(config: &NerConfig, vocabulary: Option<&Vocabulary>) -> Result<Self> {
        let mut ner = Self::new().with_min_confidence(config.min_confidence);

        if let Some(path) = &config.gazetteer_path {
            let added = ner.load_gazetteer(path)?;
            tracing::info!(path = %path.display(), terms = added, "Gazetteer loaded");
        }

        if config.include_vocabulary {
            if let Some(vocab) = vocabulary {
                let added = ner.add_vocabulary(vocab, &config.vocabulary_type)?;
                tracing::info!(terms = added, "Vocabulary entities added to NER dictionary");
            }
        }

        Ok(ner)
    }

    /// Drop annotations below `threshold`
    pub fn with_min_confidence(mut self, threshold: f32) -> Self {
        self.min_confidence = threshold.clamp(0.0, 1.0);
        self
    }

    /// Number of dictionary terms
    pub fn num_terms(&self) -> usize {
        self.dictionary.len()
    }

    /// Initialize the built-in regex patterns
    fn init_patterns(&mut self) {
        // Dates
        self.add_pattern(r"\d{4}[-/.]\d{1,2}[-/.]\d{1,2}", EntityType::Date, 0.95);
        self.add_pattern(r"\d{1,2}/\d{1,2}/\d{4}", EntityType::Date, 0.95);
        self.add_pattern(r"\d{4}年\d{1,2}月(\d{1,2}[日号])?", EntityType::Date, 0.95);

        // Times
        self.add_pattern(r"\b\d{1,2}:\d{2}(:\d{2})?\b", EntityType::Time, 0.9);

        // Durations
        self.add_pattern(
            r"\b\d+\s*(hours?|days?|weeks?|months?|years?)\b",
            EntityType::Duration,
            0.85,
        );
        self.add_pattern(r"\d+\s*(小时|天|周|个月|年)", EntityType::Duration, 0.85);

        // Amounts
        self.add_pattern(r"\d+(\.\d+)?\s*%", EntityType::Percent, 0.9);
        self.add_pattern(r"[$€£¥]\s?\d[\d,]*(\.\d+)?", EntityType::Money, 0.9);
        self.add_pattern(r"\d[\d,]*(\.\d+)?\s*(万元|亿元|元)", EntityType::Money, 0.9);

        // Physical quantities (power systems units)
        self.add_pattern(
            r"\b\d+(\.\d+)?\s*(kV|kW|MW|GW|kWh|MWh|MVA|kVA)\b",
            EntityType::Quantity,
            0.85,
        );
        self.add_pattern(r"\d+(\.\d+)?\s*(千伏|千瓦|兆瓦)", EntityType::Quantity, 0.85);

        // Contact
        self.add_pattern(
            r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
            EntityType::Email,
            0.95,
        );
        self.add_pattern(r"https?://[^\s]+", EntityType::Url, 0.95);
    }

    /// Add a regex pattern
    fn add_pattern(&mut self, pattern: &str, entity_type: EntityType, confidence: f32) {
        match Regex::new(pattern) {
            Ok(regex) => self.patterns.push((regex, entity_type, confidence)),
            Err(e) => tracing::warn!(pattern, error = %e, "Skipping invalid NER pattern"),
        }
    }

    /// Add a dictionary term
    pub fn add_term(&mut self, term: &str, entity_type: &str, aliases: Vec<&str>) -> Result<()> {
        self.insert_term(term, entity_type, aliases);
        self.rebuild_matcher()
    }

    fn insert_term(&mut self, term: &str, entity_type: &str, aliases: Vec<&str>) {
        let entry = DictionaryEntry {
            term: term.to_string(),
            entity_type: entity_type.to_string(),
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
        };

        // Add main term to lookup
        self.lookup
            .insert(term.to_lowercase(), (term.to_string(), TERM_CONFIDENCE));

        // Add aliases to lookup, never shadowing a main term
        for alias in &entry.aliases {
            self.lookup
                .entry(alias.to_lowercase())
                .or_insert_with(|| (term.to_string(), ALIAS_CONFIDENCE));
        }

        self.dictionary.insert(term.to_string(), entry);
    }

    /// Load a gazetteer file: `term<TAB>type[<TAB>alias,alias...]` per line.
    ///
    /// Returns the number of terms added.
    pub fn load_gazetteer(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| KgcError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut added = 0;
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            match fields.as_slice() {
                [term, entity_type, rest @ ..]
                    if !term.is_empty() && !entity_type.is_empty() && rest.len() <= 1 =>
                {
                    let aliases = rest
                        .first()
                        .map(|a| a.split(',').map(str::trim).filter(|a| !a.is_empty()).collect())
                        .unwrap_or_default();
                    self.insert_term(term, entity_type, aliases);
                    added += 1;
                }
                _ => {
                    return Err(KgcError::MalformedLine {
                        path: path.to_path_buf(),
                        line: idx + 1,
                        content: line.to_string(),
                    })
                }
            }
        }

        self.rebuild_matcher()?;
        Ok(added)
    }

    /// Add every entity label of a knowledge graph vocabulary.
    ///
    /// Existing gazetteer terms keep their type. Returns the number added.
    pub fn add_vocabulary(&mut self, vocabulary: &Vocabulary, entity_type: &str) -> Result<usize> {
        let mut added = 0;
        for label in vocabulary.entities.labels() {
            if label.chars().count() < MIN_VOCABULARY_TERM_CHARS
                || self.lookup.contains_key(&label.to_lowercase())
            {
                continue;
            }
            self.insert_term(label, entity_type, Vec::new());
            added += 1;
        }

        self.rebuild_matcher()?;
        Ok(added)
    }

    /// Recompile the dictionary alternation
    fn rebuild_matcher(&mut self) -> Result<()> {
        if self.lookup.is_empty() {
            self.matcher = None;
            return Ok(());
        }

        let mut forms: Vec<&String> = self.lookup.keys().collect();
        // Longest first so the leftmost match is also the longest
        forms.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let alternation = forms
            .iter()
            .map(|f| regex::escape(f))
            .collect::<Vec<_>>()
            .join("|");

        let matcher = RegexBuilder::new(&alternation)
            .case_insensitive(true)
            .size_limit(DICTIONARY_REGEX_SIZE_LIMIT)
            .build()
            .map_err(|e| KgcError::Recognition(format!("failed to compile dictionary: {e}")))?;

        self.matcher = Some(matcher);
        Ok(())
    }

    /// Extract entities using pattern matching
    fn extract_by_patterns(&self, text: &str) -> Vec<ExtractedEntity> {
        let mut entities = Vec::new();

        for (regex, entity_type, confidence) in &self.patterns {
            for mat in regex.find_iter(text) {
                entities.push(ExtractedEntity {
                    text: mat.as_str().to_string(),
                    entity_type: entity_type.to_string(),
                    start: mat.start(),
                    end: mat.end(),
                    confidence: *confidence,
                });
            }
        }

        entities
    }

    /// Extract entities using dictionary lookup
    fn extract_by_dictionary(&self, text: &str) -> Vec<ExtractedEntity> {
        let Some(matcher) = &self.matcher else {
            return Vec::new();
        };

        matcher
            .find_iter(text)
            .filter_map(|mat| {
                let (key, confidence) = self.lookup.get(&mat.as_str().to_lowercase())?;
                let entry = self.dictionary.get(key)?;
                Some(ExtractedEntity {
                    text: mat.as_str().to_string(),
                    entity_type: entry.entity_type.clone(),
                    start: mat.start(),
                    end: mat.end(),
                    confidence: *confidence,
                })
            })
            .collect()
    }

    /// Remove duplicate/overlapping entities, keeping highest confidence
    fn deduplicate(&self, mut entities: Vec<ExtractedEntity>) -> Vec<ExtractedEntity> {
        // Sort by start position, then confidence (descending), then length (descending)
        entities.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then(b.confidence.total_cmp(&a.confidence))
                .then((b.end - b.start).cmp(&(a.end - a.start)))
        });

        let mut result = Vec::new();
        let mut covered: HashSet<usize> = HashSet::new();

        for entity in entities {
            // Check if this entity overlaps with already selected ones
            let overlaps = (entity.start..entity.end).any(|i| covered.contains(&i));

            if !overlaps {
                covered.extend(entity.start..entity.end);
                result.push(entity);
            }
        }

        result
    }
}

impl Default for RuleBasedNer {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityExtractor for RuleBasedNer {
    fn extract(&self, text: &str) -> Result<Vec<ExtractedEntity>> {
        let mut entities = self.extract_by_patterns(text);
        entities.extend(self.extract_by_dictionary(text));

        let entities = self
            .deduplicate(entities)
            .into_iter()
            .filter(|e| e.confidence >= self.min_confidence)
            .collect();

        Ok(entities)
    }
}

// ============================================================================
// Tests
// ============================================================================
