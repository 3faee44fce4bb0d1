//! Embedding model backend
//!
//! Scores triples from entity/relation embedding tables:
//! - TransE: score = -||h + r - t||₂ (higher is better, 0 is perfect)
//! - DistMult: score = Σ h·r·t

use std::path::Path;
use std::sync::Arc;

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use kgc_core::{
    Candidate, KgcError, LinkPredictor, Result, Target, Triple, TripleQuery, Vocabulary,
};

// ============================================================================
// Model File
// ============================================================================

/// Scoring function applied to embedding rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scoring {
    #[default]
    TransE,
    DistMult,
}

impl Scoring {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransE => "transe",
            Self::DistMult => "distmult",
        }
    }

    fn score(&self, h: ArrayView1<f32>, r: ArrayView1<f32>, t: ArrayView1<f32>) -> f32 {
        match self {
            Self::TransE => -(&h + &r - &t).mapv(|x| x * x).sum().sqrt(),
            Self::DistMult => (&h * &r * &t).sum(),
        }
    }
}

impl std::fmt::Display for Scoring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk model format, rows indexed by vocabulary id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    #[serde(default)]
    pub scoring: Scoring,
    pub dim: usize,
    pub entities: Vec<Vec<f32>>,
    pub relations: Vec<Vec<f32>>,
    /// Entity labels in id order, checked against the vocabulary when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_labels: Option<Vec<String>>,
    /// Relation labels in id order, checked against the vocabulary when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_labels: Option<Vec<String>>,
}

fn to_matrix(
    kind: &str,
    rows: Vec<Vec<f32>>,
    expected: usize,
    dim: usize,
) -> Result<Array2<f32>> {
    if rows.len() != expected {
        return Err(KgcError::ModelLoad(format!(
            "model has {} {kind} embeddings, vocabulary has {expected}",
            rows.len()
        )));
    }
    if let Some((idx, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != dim) {
        return Err(KgcError::ModelLoad(format!(
            "{kind} embedding {idx} has dimension {}, expected {dim}",
            row.len()
        )));
    }

    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((expected, dim), flat)
        .map_err(|e| KgcError::ModelLoad(format!("invalid {kind} matrix: {e}")))
}

fn check_labels(kind: &str, labels: Option<&[String]>, known: &[String]) -> Result<()> {
    match labels {
        Some(labels) if labels != known => Err(KgcError::ModelLoad(format!(
            "{kind} labels in model file do not match the training vocabulary"
        ))),
        _ => Ok(()),
    }
}

// ============================================================================
// Embedding Model
// ============================================================================

/// Pre-trained embedding model over a fixed vocabulary
#[derive(Debug, Clone)]
pub struct EmbeddingModel {
    scoring: Scoring,
    vocabulary: Arc<Vocabulary>,
    entities: Array2<f32>,
    relations: Array2<f32>,
    name: String,
}

impl EmbeddingModel {
    /// Create a model from embedding matrices (one row per vocabulary id)
    pub fn new(
        scoring: Scoring,
        vocabulary: Arc<Vocabulary>,
        entities: Array2<f32>,
        relations: Array2<f32>,
    ) -> Result<Self> {
        if entities.nrows() != vocabulary.num_entities() {
            return Err(KgcError::ModelLoad(format!(
                "model has {} entity embeddings, vocabulary has {}",
                entities.nrows(),
                vocabulary.num_entities()
            )));
        }
        if relations.nrows() != vocabulary.num_relations() {
            return Err(KgcError::ModelLoad(format!(
                "model has {} relation embeddings, vocabulary has {}",
                relations.nrows(),
                vocabulary.num_relations()
            )));
        }
        if entities.ncols() != relations.ncols() {
            return Err(KgcError::ModelLoad(format!(
                "entity dimension {} differs from relation dimension {}",
                entities.ncols(),
                relations.ncols()
            )));
        }

        Ok(Self {
            name: format!("{scoring}-{}d", entities.ncols()),
            scoring,
            vocabulary,
            entities,
            relations,
        })
    }

    /// Build from a parsed model file
    pub fn from_model_file(file: ModelFile, vocabulary: Arc<Vocabulary>) -> Result<Self> {
        check_labels("entity", file.entity_labels.as_deref(), vocabulary.entities.labels())?;
        check_labels(
            "relation",
            file.relation_labels.as_deref(),
            vocabulary.relations.labels(),
        )?;

        let entities = to_matrix("entity", file.entities, vocabulary.num_entities(), file.dim)?;
        let relations = to_matrix(
            "relation",
            file.relations,
            vocabulary.num_relations(),
            file.dim,
        )?;

        Self::new(file.scoring, vocabulary, entities, relations)
    }

    /// Load a JSON model file trained over `vocabulary`
    pub fn load(path: impl AsRef<Path>, vocabulary: Arc<Vocabulary>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| KgcError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let file: ModelFile = serde_json::from_str(&content)
            .map_err(|e| KgcError::ModelLoad(format!("{}: {e}", path.display())))?;

        let model = Self::from_model_file(file, vocabulary)?;
        tracing::info!(
            path = %path.display(),
            model = model.name(),
            entities = model.entities.nrows(),
            relations = model.relations.nrows(),
            "Embedding model loaded"
        );
        Ok(model)
    }

    /// Serialize to the on-disk format, labels included
    pub fn to_model_file(&self) -> ModelFile {
        ModelFile {
            scoring: self.scoring,
            dim: self.dim(),
            entities: self.entities.rows().into_iter().map(|r| r.to_vec()).collect(),
            relations: self.relations.rows().into_iter().map(|r| r.to_vec()).collect(),
            entity_labels: Some(self.vocabulary.entities.labels().to_vec()),
            relation_labels: Some(self.vocabulary.relations.labels().to_vec()),
        }
    }

    /// Write the model as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string(&self.to_model_file())
            .map_err(|e| KgcError::Other(e.into()))?;
        std::fs::write(path, json).map_err(|e| KgcError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn scoring(&self) -> Scoring {
        self.scoring
    }

    pub fn dim(&self) -> usize {
        self.entities.ncols()
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocabulary
    }

    fn score_ids(&self, head: usize, relation: usize, tail: usize) -> f32 {
        self.scoring.score(
            self.entities.row(head),
            self.relations.row(relation),
            self.entities.row(tail),
        )
    }

    /// Score every id for `target` with the other two positions fixed
    fn score_all(&self, target: Target, query: &TripleQuery) -> Result<Vec<(usize, f32)>> {
        let vocab = &self.vocabulary;
        let entity = |t: Target| vocab.entity_id(query.get(t).unwrap_or_default());
        let relation = || vocab.relation_id(query.relation.as_deref().unwrap_or_default());

        let scores = match target {
            Target::Head => {
                let (r, t) = (relation()?, entity(Target::Tail)?);
                (0..vocab.num_entities())
                    .map(|h| (h, self.score_ids(h, r, t)))
                    .collect()
            }
            Target::Relation => {
                let (h, t) = (entity(Target::Head)?, entity(Target::Tail)?);
                (0..vocab.num_relations())
                    .map(|r| (r, self.score_ids(h, r, t)))
                    .collect()
            }
            Target::Tail => {
                let (h, r) = (entity(Target::Head)?, relation()?);
                (0..vocab.num_entities())
                    .map(|t| (t, self.score_ids(h, r, t)))
                    .collect()
            }
        };
        Ok(scores)
    }
}

impl LinkPredictor for EmbeddingModel {
    fn rank_candidates(&self, query: &TripleQuery) -> Result<Vec<Candidate>> {
        let target = query.require_target()?;
        let mut scores = self.score_all(target, query)?;

        // Stable sort keeps id order among ties
        scores.sort_by(|a, b| b.1.total_cmp(&a.1));

        let labels = if target.is_entity() {
            &self.vocabulary.entities
        } else {
            &self.vocabulary.relations
        };

        Ok(scores
            .into_iter()
            .filter_map(|(id, score)| labels.label(id).map(|label| Candidate::new(label, score)))
            .collect())
    }

    fn score(&self, triple: &Triple) -> Result<f32> {
        let mapped = self.vocabulary.map_triple(triple)?;
        Ok(self.score_ids(mapped.head, mapped.relation, mapped.tail))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
