//! Application context shared across handlers
//!
//! Author: hephaex@gmail.com

use kgc_core::config::AppConfig;
use kgc_core::{Dataset, LinkPredictor, Result};
use kgc_embed::EmbeddingModel;
use kgc_extractor::{EntityExtractor, RuleBasedNer};
use kgc_inference::{GroundTruthPolicy, TripleCompleter};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OnceCell, RwLock};

/// Per-endpoint request statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct EndpointMetrics {
    /// Requests served
    pub requests: u64,
    /// Response counts keyed by HTTP status
    pub status_counts: BTreeMap<u16, u64>,
    /// Sum of latencies in microseconds
    pub total_latency_us: u64,
    /// Slowest request in microseconds
    pub max_latency_us: u64,
}

impl EndpointMetrics {
    pub fn avg_latency_us(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.total_latency_us as f64 / self.requests as f64
        }
    }
}

/// Application context: model, dataset and recognizer, loaded once at startup
/// and shared read-only
pub struct AppContext {
    /// Application configuration
    pub config: AppConfig,
    /// Training/testing splits and their vocabulary
    pub dataset: Dataset,
    /// Triple completion over the loaded model
    pub completer: TripleCompleter,
    /// Named entity recognizer
    pub ner: Arc<dyn EntityExtractor>,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Per-endpoint metrics
    pub metrics: RwLock<HashMap<String, EndpointMetrics>>,
    /// Tail-prediction `(Hits@1, MRR)` over the testing split, computed once
    pub benchmark: OnceCell<(f64, f64)>,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        dataset: Dataset,
        completer: TripleCompleter,
        ner: Arc<dyn EntityExtractor>,
    ) -> Self {
        Self {
            config,
            dataset,
            completer,
            ner,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            metrics: RwLock::new(HashMap::new()),
            benchmark: OnceCell::new(),
        }
    }

    /// Wrap `predictor` in a completer, with ground-truth substitution when
    /// `config.inference.demo_mode` is set
    pub fn with_predictor(
        config: AppConfig,
        dataset: Dataset,
        predictor: Arc<dyn LinkPredictor>,
        ner: Arc<dyn EntityExtractor>,
    ) -> Self {
        let mut completer = TripleCompleter::new(predictor);
        if config.inference.demo_mode {
            tracing::warn!(
                entity_probability = config.inference.entity_substitution_probability,
                relation_probability = config.inference.relation_substitution_probability,
                "Demo mode enabled: predictions may be replaced with testing-split labels"
            );
            completer = completer.with_ground_truth(GroundTruthPolicy::from_config(
                dataset.testing.clone(),
                &config.inference,
            ));
        }

        Self::new(config, dataset, completer, ner)
    }

    /// Load dataset, model and recognizer named by `config`.
    ///
    /// Any failure here is fatal: the server must not bind with a partial model.
    pub fn load(config: AppConfig) -> Result<Self> {
        let dataset = Dataset::load(&config.data)?;

        let model = EmbeddingModel::load(&config.model.path, dataset.vocabulary().clone())?;
        tracing::info!(
            path = %config.model.path.display(),
            scoring = %model.scoring(),
            dim = model.dim(),
            "Model loaded"
        );

        let ner = RuleBasedNer::from_config(&config.ner, Some(dataset.vocabulary()))?;
        tracing::info!(terms = ner.num_terms(), "NER ready");

        Ok(Self::with_predictor(config, dataset, Arc::new(model), Arc::new(ner)))
    }

    /// Upper bound on a single model call
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.server.request_timeout_secs)
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Record one finished request
    pub async fn record_request(&self, endpoint: String, status: u16, latency_us: u64) {
        let mut metrics = self.metrics.write().await;
        let entry = metrics.entry(endpoint).or_default();
        entry.requests += 1;
        *entry.status_counts.entry(status).or_insert(0) += 1;
        entry.total_latency_us += latency_us;
        entry.max_latency_us = entry.max_latency_us.max(latency_us);
    }

    /// Copy of the per-endpoint metrics
    pub async fn metrics_snapshot(&self) -> BTreeMap<String, EndpointMetrics> {
        self.metrics
            .read()
            .await
            .iter()
            .map(|(endpoint, metrics)| (endpoint.clone(), metrics.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_request() {
        let ctx = crate::testing::toy_context();
        ctx.record_request("/kgc".to_string(), 200, 100).await;
        ctx.record_request("/kgc".to_string(), 400, 300).await;
        ctx.record_request("/ner".to_string(), 200, 50).await;

        let snapshot = ctx.metrics_snapshot().await;
        let kgc = &snapshot["/kgc"];
        assert_eq!(kgc.requests, 2);
        assert_eq!(kgc.status_counts[&200], 1);
        assert_eq!(kgc.status_counts[&400], 1);
        assert_eq!(kgc.max_latency_us, 300);
        assert_eq!(kgc.avg_latency_us(), 200.0);
        assert_eq!(snapshot["/ner"].requests, 1);
    }

    #[test]
    fn test_request_counter() {
        let ctx = crate::testing::toy_context();
        assert_eq!(ctx.increment_requests(), 0);
        assert_eq!(ctx.increment_requests(), 1);
        assert_eq!(ctx.get_request_count(), 2);
        assert_eq!(ctx.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_demo_mode_follows_config() {
        assert!(!crate::testing::toy_context().completer.demo_mode());

        let mut config = AppConfig::default();
        config.inference.demo_mode = true;
        let ctx = crate::testing::toy_context_with_config(config);
        assert!(ctx.completer.demo_mode());
        assert!(ctx.benchmark.get().is_none());
    }
}
