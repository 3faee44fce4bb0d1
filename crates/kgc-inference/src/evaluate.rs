//! Rank-based evaluation
//!
//! Ranks every candidate for one element of each held-out triple and
//! accumulates Hits@k and reciprocal-rank statistics over the split.

use serde::{Deserialize, Serialize};

use kgc_core::{rank_of, KgcError, LinkPredictor, Result, Target, Triple, TriplesFactory};

/// Cut-offs reported for Hits@k
pub const HITS_AT_K: [usize; 5] = [1, 3, 5, 10, 100];

// ============================================================================
// Rank Metrics
// ============================================================================

/// Accumulated 1-indexed ranks of the true labels
#[derive(Debug, Clone, Default)]
pub struct RankMetrics {
    ranks: Vec<usize>,
}

impl RankMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the rank of one true label
    pub fn record(&mut self, rank: usize) {
        debug_assert!(rank >= 1, "ranks are 1-indexed");
        self.ranks.push(rank);
    }

    /// Number of evaluated triples
    pub fn total(&self) -> usize {
        self.ranks.len()
    }

    pub fn ranks(&self) -> &[usize] {
        &self.ranks
    }

    /// Fraction of true labels ranked within the top `k`
    pub fn hits_at_k(&self, k: usize) -> f64 {
        if self.ranks.is_empty() {
            0.0
        } else {
            let hits = self.ranks.iter().filter(|&&rank| rank <= k).count();
            hits as f64 / self.ranks.len() as f64
        }
    }

    /// Mean reciprocal rank
    pub fn mrr(&self) -> f64 {
        if self.ranks.is_empty() {
            0.0
        } else {
            let sum: f64 = self.ranks.iter().map(|&rank| 1.0 / rank as f64).sum();
            sum / self.ranks.len() as f64
        }
    }

    pub fn mean_rank(&self) -> f64 {
        if self.ranks.is_empty() {
            0.0
        } else {
            self.ranks.iter().sum::<usize>() as f64 / self.ranks.len() as f64
        }
    }

    /// Summarize for a target element
    pub fn report(&self, target: Target) -> EvaluationReport {
        EvaluationReport {
            target,
            total: self.total(),
            hits_at_1: self.hits_at_k(1),
            hits_at_3: self.hits_at_k(3),
            hits_at_5: self.hits_at_k(5),
            hits_at_10: self.hits_at_k(10),
            hits_at_100: self.hits_at_k(100),
            mrr: self.mrr(),
            mean_rank: self.mean_rank(),
        }
    }
}

impl Extend<usize> for RankMetrics {
    fn extend<I: IntoIterator<Item = usize>>(&mut self, iter: I) {
        self.ranks.extend(iter);
    }
}

/// Evaluation summary for one target element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub target: Target,
    pub total: usize,
    pub hits_at_1: f64,
    pub hits_at_3: f64,
    pub hits_at_5: f64,
    pub hits_at_10: f64,
    pub hits_at_100: f64,
    pub mrr: f64,
    pub mean_rank: f64,
}

impl std::fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== {} prediction ({} triples) ===", self.target, self.total)?;
        for (k, value) in HITS_AT_K.iter().zip([
            self.hits_at_1,
            self.hits_at_3,
            self.hits_at_5,
            self.hits_at_10,
            self.hits_at_100,
        ]) {
            writeln!(f, "  Hits@{k:<3}  {value:.4}")?;
        }
        writeln!(f, "  MRR       {:.4}", self.mrr)?;
        write!(f, "  MeanRank  {:.2}", self.mean_rank)
    }
}

// ============================================================================
// Evaluator
// ============================================================================

/// Ranks held-out triples with a link predictor.
///
/// Always uses the raw model ranking; demo-mode substitution never applies.
pub struct Evaluator<'a> {
    predictor: &'a dyn LinkPredictor,
}

impl<'a> Evaluator<'a> {
    pub fn new(predictor: &'a dyn LinkPredictor) -> Self {
        Self { predictor }
    }

    /// Rank of the true `target` label of a single triple
    pub fn rank(&self, triple: &Triple, target: Target) -> Result<usize> {
        let expected = triple.get(target);
        let candidates = self.predictor.rank_candidates(&triple.mask(target))?;
        rank_of(&candidates, expected).ok_or_else(|| KgcError::TargetNotFound {
            target,
            label: expected.to_string(),
        })
    }

    /// Rank every triple for one target element
    pub fn evaluate<'t>(
        &self,
        triples: impl IntoIterator<Item = &'t Triple>,
        target: Target,
    ) -> Result<RankMetrics> {
        let mut metrics = RankMetrics::new();
        for triple in triples {
            metrics.record(self.rank(triple, target)?);
        }

        tracing::debug!(
            model = self.predictor.name(),
            target = %target,
            total = metrics.total(),
            mrr = metrics.mrr(),
            "Evaluated split"
        );
        Ok(metrics)
    }

    /// Evaluate head, relation and tail prediction over a split
    pub fn evaluate_all(&self, split: &TriplesFactory) -> Result<Vec<EvaluationReport>> {
        let triples: Vec<Triple> = split.labeled_triples().collect();
        let mut reports = Vec::with_capacity(Target::ALL.len());
        for target in Target::ALL {
            reports.push(self.evaluate(&triples, target)?.report(target));
        }
        Ok(reports)
    }
}

/// Tail-prediction `(Hits@1, MRR)` over a split
pub fn benchmark(predictor: &dyn LinkPredictor, split: &TriplesFactory) -> Result<(f64, f64)> {
    let triples: Vec<Triple> = split.labeled_triples().collect();
    let metrics = Evaluator::new(predictor).evaluate(&triples, Target::Tail)?;

    tracing::info!(
        model = predictor.name(),
        triples = metrics.total(),
        hits_at_1 = metrics.hits_at_k(1),
        mrr = metrics.mrr(),
        "Benchmark finished"
    );
    Ok((metrics.hits_at_k(1), metrics.mrr()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedPredictor;
    use proptest::prelude::*;

    #[test]
    fn test_empty_metrics_are_zero() {
        let metrics = RankMetrics::new();
        assert_eq!(metrics.total(), 0);
        assert_eq!(metrics.hits_at_k(1), 0.0);
        assert_eq!(metrics.mrr(), 0.0);
        assert_eq!(metrics.mean_rank(), 0.0);
    }

    #[test]
    fn test_empty_split_benchmark() {
        let predictor = FixedPredictor::new(&["A"], &["r"]);
        let split = TriplesFactory::from_triples(&[]);
        assert_eq!(benchmark(&predictor, &split).unwrap(), (0.0, 0.0));
    }

    #[test]
    fn test_metrics_from_ranks() {
        let mut metrics = RankMetrics::new();
        metrics.extend([1, 2, 4, 1]);

        assert_eq!(metrics.hits_at_k(1), 0.5);
        assert_eq!(metrics.hits_at_k(3), 0.75);
        assert_eq!(metrics.hits_at_k(10), 1.0);
        assert!((metrics.mrr() - (1.0 + 0.5 + 0.25 + 1.0) / 4.0).abs() < 1e-12);
        assert_eq!(metrics.mean_rank(), 2.0);

        let report = metrics.report(Target::Tail);
        assert_eq!(report.total, 4);
        assert_eq!(report.hits_at_1, 0.5);
        assert!(report.to_string().contains("Hits@1"));
    }

    #[test]
    fn test_benchmark_tail() {
        // Tails ranked B, C, A
        let predictor = FixedPredictor::new(&["B", "C", "A"], &["r"]);
        let split = TriplesFactory::from_triples(&[
            Triple::new("A", "r", "B"),
            Triple::new("B", "r", "C"),
        ]);

        let (hits_at_1, mrr) = benchmark(&predictor, &split).unwrap();
        assert_eq!(hits_at_1, 0.5);
        assert!((mrr - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_missing_true_label_is_target_not_found() {
        let predictor = FixedPredictor::new(&["A", "B"], &["r"]);
        let triples = [Triple::new("A", "r", "Z")];

        let err = Evaluator::new(&predictor)
            .evaluate(&triples, Target::Tail)
            .unwrap_err();
        assert!(matches!(
            err,
            KgcError::TargetNotFound { target: Target::Tail, ref label } if label == "Z"
        ));
    }

    #[test]
    fn test_evaluate_all_targets() {
        let predictor = FixedPredictor::new(&["A", "B"], &["s", "r"]);
        let split = TriplesFactory::from_triples(&[Triple::new("A", "r", "B")]);

        let reports = Evaluator::new(&predictor).evaluate_all(&split).unwrap();
        let targets: Vec<Target> = reports.iter().map(|r| r.target).collect();
        assert_eq!(targets, Target::ALL.to_vec());

        assert_eq!(reports[0].hits_at_1, 1.0); // head A ranked first
        assert_eq!(reports[1].mean_rank, 2.0); // relation r ranked second
        assert_eq!(reports[2].mrr, 0.5); // tail B ranked second
    }

    proptest! {
        #[test]
        fn prop_metric_bounds(ranks in proptest::collection::vec(1usize..500, 1..64)) {
            let mut metrics = RankMetrics::new();
            metrics.extend(ranks.iter().copied());

            let ones = ranks.iter().filter(|&&r| r == 1).count() as f64;
            prop_assert!(metrics.hits_at_k(1) <= 1.0);
            prop_assert_eq!(metrics.hits_at_k(1), ones / ranks.len() as f64);
            prop_assert!(metrics.mrr() > 0.0 && metrics.mrr() <= 1.0);
            prop_assert!(metrics.hits_at_k(1) <= metrics.hits_at_k(10));
        }
    }
}
