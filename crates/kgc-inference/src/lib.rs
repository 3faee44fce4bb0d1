//! KGC Inference - Triple completion and evaluation
//!
//! Wraps a `LinkPredictor` to:
//! - fill the single missing element of a triple query
//! - return the top-k candidates for that element
//! - measure ranking quality (Hits@k, MRR) over a held-out split

pub mod complete;
pub mod evaluate;

pub use complete::{Completion, GroundTruthPolicy, Prediction, TripleCompleter};
pub use evaluate::{benchmark, EvaluationReport, Evaluator, RankMetrics, HITS_AT_K};
