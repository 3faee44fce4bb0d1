//! Triple completion
//!
//! Fills the single missing element of a query with the model's top-ranked
//! candidate. In demo mode a [`GroundTruthPolicy`] may instead pick the first
//! candidate that forms a triple of the reference split, with a fixed
//! probability per target kind.

use std::sync::Arc;

use rand::Rng;
use serde::Serialize;

use kgc_core::{
    Candidate, InferenceConfig, KgcError, LinkPredictor, MappedTriple, Result, Target, Triple,
    TripleQuery, TriplesFactory,
};

// ============================================================================
// Ground-truth substitution (demo mode)
// ============================================================================

/// Demo-mode policy that substitutes ground-truth candidates.
///
/// Leaks labels of the reference split into predictions. Never enable it when
/// the output is used to judge the model.
#[derive(Debug, Clone)]
pub struct GroundTruthPolicy {
    reference: TriplesFactory,
    entity_probability: f64,
    relation_probability: f64,
}

impl GroundTruthPolicy {
    pub fn new(
        reference: TriplesFactory,
        entity_probability: f64,
        relation_probability: f64,
    ) -> Self {
        Self {
            reference,
            entity_probability: entity_probability.clamp(0.0, 1.0),
            relation_probability: relation_probability.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(reference: TriplesFactory, config: &InferenceConfig) -> Self {
        Self::new(
            reference,
            config.entity_substitution_probability,
            config.relation_substitution_probability,
        )
    }

    /// Substitution probability for a target kind
    pub fn probability(&self, target: Target) -> f64 {
        if target.is_entity() {
            self.entity_probability
        } else {
            self.relation_probability
        }
    }

    /// First ranked candidate that completes `query` into a reference triple
    pub fn first_known<'c>(
        &self,
        query: &TripleQuery,
        target: Target,
        candidates: &'c [Candidate],
    ) -> Option<&'c Candidate> {
        let vocab = self.reference.vocabulary();
        let id_of = |t: Target, label: &str| {
            if t.is_entity() {
                vocab.entities.id(label)
            } else {
                vocab.relations.id(label)
            }
        };
        // The missing position is overwritten per candidate
        let known = |t: Target| {
            if t == target {
                Some(0)
            } else {
                id_of(t, query.get(t)?)
            }
        };
        let base = MappedTriple::new(
            known(Target::Head)?,
            known(Target::Relation)?,
            known(Target::Tail)?,
        );

        candidates.iter().find(|candidate| {
            id_of(target, &candidate.label)
                .is_some_and(|id| self.reference.contains(&base.with(target, id)))
        })
    }
}

// ============================================================================
// Completer
// ============================================================================

/// Result of completing a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    pub triple: Triple,
    /// Element that was filled in, `None` when the query was already complete
    pub target: Option<Target>,
    /// Model score of the chosen candidate
    pub score: Option<f32>,
    /// Whether demo mode replaced the top-ranked candidate
    pub substituted: bool,
}

/// Top-k candidates for the missing element of a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub target: Target,
    pub candidates: Vec<Candidate>,
}

/// Completes partial triples with a shared, read-only model
#[derive(Clone)]
pub struct TripleCompleter {
    predictor: Arc<dyn LinkPredictor>,
    ground_truth: Option<GroundTruthPolicy>,
}

impl TripleCompleter {
    pub fn new(predictor: Arc<dyn LinkPredictor>) -> Self {
        Self {
            predictor,
            ground_truth: None,
        }
    }

    /// Enable demo-mode ground-truth substitution
    pub fn with_ground_truth(mut self, policy: GroundTruthPolicy) -> Self {
        self.ground_truth = Some(policy);
        self
    }

    pub fn demo_mode(&self) -> bool {
        self.ground_truth.is_some()
    }

    pub fn predictor(&self) -> &Arc<dyn LinkPredictor> {
        &self.predictor
    }

    /// Complete a query using the thread-local RNG for demo-mode draws
    pub fn complete(&self, query: &TripleQuery) -> Result<Completion> {
        self.complete_with_rng(query, &mut rand::thread_rng())
    }

    /// Complete a query.
    ///
    /// - complete triple: returned unchanged
    /// - exactly one missing element: filled with the top-ranked candidate
    ///   (or a ground-truth candidate in demo mode)
    /// - more than one missing element: `InvalidQuery`
    pub fn complete_with_rng<R: Rng>(
        &self,
        query: &TripleQuery,
        rng: &mut R,
    ) -> Result<Completion> {
        let Some(target) = query.target()? else {
            let triple = query
                .to_triple()
                .ok_or_else(|| KgcError::InvalidQuery(format!("incomplete query {query}")))?;
            return Ok(Completion {
                triple,
                target: None,
                score: None,
                substituted: false,
            });
        };

        let candidates = self.predictor.rank_candidates(query)?;
        let top = candidates.first().ok_or(KgcError::NoCandidates(target))?;

        let mut chosen = top;
        let mut substituted = false;
        if let Some(policy) = &self.ground_truth {
            if let Some(known) = policy.first_known(query, target, &candidates) {
                if rng.gen::<f64>() < policy.probability(target) {
                    substituted = known.label != top.label;
                    chosen = known;
                }
            }
        }

        tracing::debug!(
            query = %query,
            target = %target,
            label = %chosen.label,
            score = chosen.score,
            substituted,
            "Completed triple"
        );

        Ok(Completion {
            triple: query.complete(target, chosen.label.clone()),
            target: Some(target),
            score: Some(chosen.score),
            substituted,
        })
    }

    /// Top `k` candidates for the single missing element
    pub fn predict(&self, query: &TripleQuery, k: usize) -> Result<Prediction> {
        let target = query.require_target()?;
        let mut candidates = self.predictor.rank_candidates(query)?;
        candidates.truncate(k);
        Ok(Prediction { target, candidates })
    }
}

impl std::fmt::Debug for TripleCompleter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripleCompleter")
            .field("predictor", &self.predictor.name())
            .field("demo_mode", &self.demo_mode())
            .finish()
    }
}
