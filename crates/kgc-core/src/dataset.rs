//! Triple dataset loading
//!
//! Reads delimited triple files (`head<TAB>relation<TAB>tail`, one per line)
//! and maps labels to integer ids. The vocabulary is built from the training
//! split and shared, never rebuilt, by the testing and validation splits so
//! ids stay consistent across splits.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::DataConfig;
use crate::{KgcError, MappedTriple, Result, Triple};

/// Default field delimiter for triple files
pub const DEFAULT_DELIMITER: char = '\t';

// ============================================================================
// Vocabulary
// ============================================================================

/// Bidirectional label <-> id mapping, ids in order of first appearance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelIndex {
    to_id: HashMap<String, usize>,
    labels: Vec<String>,
}

impl LabelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `label`, assigning the next free id if unseen
    pub fn get_or_insert(&mut self, label: &str) -> usize {
        if let Some(&id) = self.to_id.get(label) {
            return id;
        }
        let id = self.labels.len();
        self.labels.push(label.to_string());
        self.to_id.insert(label.to_string(), id);
        id
    }

    pub fn id(&self, label: &str) -> Option<usize> {
        self.to_id.get(label).copied()
    }

    pub fn label(&self, id: usize) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    /// Labels ordered by id
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Label to id mapping
    pub fn to_id(&self) -> &HashMap<String, usize> {
        &self.to_id
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl FromIterator<String> for LabelIndex {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut index = Self::new();
        for label in iter {
            index.get_or_insert(&label);
        }
        index
    }
}

/// Entity and relation vocabularies of a knowledge graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    pub entities: LabelIndex,
    pub relations: LabelIndex,
}

impl Vocabulary {
    /// Build a vocabulary from triples in file order (head, then tail)
    pub fn from_triples<'a>(triples: impl IntoIterator<Item = &'a Triple>) -> Self {
        let mut vocab = Self::default();
        for triple in triples {
            vocab.entities.get_or_insert(&triple.head);
            vocab.relations.get_or_insert(&triple.relation);
            vocab.entities.get_or_insert(&triple.tail);
        }
        vocab
    }

    pub fn entity_id(&self, label: &str) -> Result<usize> {
        self.entities
            .id(label)
            .ok_or_else(|| KgcError::UnknownEntity(label.to_string()))
    }

    pub fn relation_id(&self, label: &str) -> Result<usize> {
        self.relations
            .id(label)
            .ok_or_else(|| KgcError::UnknownRelation(label.to_string()))
    }

    pub fn entity_label(&self, id: usize) -> Option<&str> {
        self.entities.label(id)
    }

    pub fn relation_label(&self, id: usize) -> Option<&str> {
        self.relations.label(id)
    }

    pub fn num_entities(&self) -> usize {
        self.entities.len()
    }

    pub fn num_relations(&self) -> usize {
        self.relations.len()
    }

    /// Map a labeled triple; every label must already be known
    pub fn map_triple(&self, triple: &Triple) -> Result<MappedTriple> {
        Ok(MappedTriple::new(
            self.entity_id(&triple.head)?,
            self.relation_id(&triple.relation)?,
            self.entity_id(&triple.tail)?,
        ))
    }

    /// Labels of a mapped triple, `None` if an id is out of range
    pub fn label_triple(&self, triple: &MappedTriple) -> Option<Triple> {
        Some(Triple::new(
            self.entity_label(triple.head)?,
            self.relation_label(triple.relation)?,
            self.entity_label(triple.tail)?,
        ))
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse delimited triples from `content`.
///
/// Blank lines and `#` comments are skipped. `source` only labels errors.
pub fn parse_triples(content: &str, delimiter: char, source: &Path) -> Result<Vec<Triple>> {
    let mut triples = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split(delimiter).map(str::trim).collect();
        match fields.as_slice() {
            [head, relation, tail]
                if !head.is_empty() && !relation.is_empty() && !tail.is_empty() =>
            {
                triples.push(Triple::new(*head, *relation, *tail));
            }
            _ => {
                return Err(KgcError::MalformedLine {
                    path: source.to_path_buf(),
                    line: idx + 1,
                    content: line.to_string(),
                })
            }
        }
    }

    Ok(triples)
}

/// Read a delimited triple file
pub fn load_triples(path: impl AsRef<Path>, delimiter: char) -> Result<Vec<Triple>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| KgcError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_triples(&content, delimiter, path)
}

// ============================================================================
// Triples Factory
// ============================================================================

/// One dataset split: id-mapped triples over a (possibly shared) vocabulary
#[derive(Debug, Clone)]
pub struct TriplesFactory {
    vocabulary: Arc<Vocabulary>,
    triples: Vec<MappedTriple>,
    index: HashSet<MappedTriple>,
}

impl TriplesFactory {
    /// Build a split and its own vocabulary
    pub fn from_triples(triples: &[Triple]) -> Self {
        let vocabulary = Arc::new(Vocabulary::from_triples(triples));
        let mapped: Vec<MappedTriple> = triples
            .iter()
            .filter_map(|t| vocabulary.map_triple(t).ok())
            .collect();
        Self::from_parts(vocabulary, mapped)
    }

    /// Build a split over an existing vocabulary.
    ///
    /// Fails with `UnknownEntity` / `UnknownRelation` on the first label the
    /// vocabulary does not contain.
    pub fn from_triples_with_vocabulary(
        triples: &[Triple],
        vocabulary: Arc<Vocabulary>,
    ) -> Result<Self> {
        let mapped = triples
            .iter()
            .map(|t| vocabulary.map_triple(t))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_parts(vocabulary, mapped))
    }

    pub fn from_path(path: impl AsRef<Path>, delimiter: char) -> Result<Self> {
        let triples = load_triples(path.as_ref(), delimiter)?;
        let factory = Self::from_triples(&triples);
        tracing::debug!(
            path = %path.as_ref().display(),
            triples = factory.num_triples(),
            entities = factory.num_entities(),
            relations = factory.num_relations(),
            "Loaded training triples"
        );
        Ok(factory)
    }

    pub fn from_path_with_vocabulary(
        path: impl AsRef<Path>,
        delimiter: char,
        vocabulary: Arc<Vocabulary>,
    ) -> Result<Self> {
        let triples = load_triples(path.as_ref(), delimiter)?;
        let factory = Self::from_triples_with_vocabulary(&triples, vocabulary)?;
        tracing::debug!(
            path = %path.as_ref().display(),
            triples = factory.num_triples(),
            "Loaded triples with shared vocabulary"
        );
        Ok(factory)
    }

    fn from_parts(vocabulary: Arc<Vocabulary>, triples: Vec<MappedTriple>) -> Self {
        let index = triples.iter().copied().collect();
        Self {
            vocabulary,
            triples,
            index,
        }
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocabulary
    }

    pub fn mapped_triples(&self) -> &[MappedTriple] {
        &self.triples
    }

    /// Labeled triples in insertion order
    pub fn labeled_triples(&self) -> impl Iterator<Item = Triple> + '_ {
        self.triples
            .iter()
            .filter_map(|t| self.vocabulary.label_triple(t))
    }

    /// Whether this split contains the triple
    pub fn contains(&self, triple: &MappedTriple) -> bool {
        self.index.contains(triple)
    }

    pub fn num_entities(&self) -> usize {
        self.vocabulary.num_entities()
    }

    pub fn num_relations(&self) -> usize {
        self.vocabulary.num_relations()
    }

    pub fn num_triples(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }
}

// ============================================================================
// Dataset
// ============================================================================

/// Training, testing and optional validation splits over one vocabulary
#[derive(Debug, Clone)]
pub struct Dataset {
    pub training: TriplesFactory,
    pub testing: TriplesFactory,
    pub validation: Option<TriplesFactory>,
}

/// Split sizes for status endpoints and the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub num_entities: usize,
    pub num_relations: usize,
    pub training_triples: usize,
    pub testing_triples: usize,
    pub validation_triples: Option<usize>,
}

impl Dataset {
    /// Load all splits named by `config`, training first
    pub fn load(config: &DataConfig) -> Result<Self> {
        Self::from_paths(
            &config.training_path,
            &config.testing_path,
            config.validation_path.as_deref(),
            config.delimiter,
        )
    }

    pub fn from_paths(
        training: &Path,
        testing: &Path,
        validation: Option<&Path>,
        delimiter: char,
    ) -> Result<Self> {
        let training = TriplesFactory::from_path(training, delimiter)?;
        let vocabulary = training.vocabulary().clone();

        let testing =
            TriplesFactory::from_path_with_vocabulary(testing, delimiter, vocabulary.clone())?;
        let validation = validation
            .map(|path| TriplesFactory::from_path_with_vocabulary(path, delimiter, vocabulary))
            .transpose()?;

        let dataset = Self {
            training,
            testing,
            validation,
        };
        tracing::info!(summary = ?dataset.summary(), "Dataset loaded");
        Ok(dataset)
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        self.training.vocabulary()
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            num_entities: self.training.num_entities(),
            num_relations: self.training.num_relations(),
            training_triples: self.training.num_triples(),
            testing_triples: self.testing.num_triples(),
            validation_triples: self.validation.as_ref().map(TriplesFactory::num_triples),
        }
    }
}

/// Paths of a dataset directory laid out as `train.txt`, `test.txt`, `valid.txt`
pub fn split_paths(dir: impl AsRef<Path>) -> (PathBuf, PathBuf, PathBuf) {
    let dir = dir.as_ref();
    (
        dir.join("train.txt"),
        dir.join("test.txt"),
        dir.join("valid.txt"),
    )
}
