//! In-memory fixtures for router tests
//!
//! A four-entity TransE model in two dimensions where every training triple
//! scores exactly 0:
//!
//! ```text
//! Paris (0,0) --capital_of (1,0)--> France  (1,0)
//! Berlin (0,1) --capital_of-------> Germany (1,1)
//! France       --neighbor_of (0,1)-> Germany
//! ```

use crate::state::AppContext;
use kgc_core::config::AppConfig;
use kgc_core::{Dataset, LinkPredictor, Triple, TriplesFactory};
use kgc_embed::{EmbeddingModel, ModelFile, Scoring};
use kgc_extractor::RuleBasedNer;
use std::sync::Arc;

pub fn toy_dataset() -> Dataset {
    let training = TriplesFactory::from_triples(&[
        Triple::new("Paris", "capital_of", "France"),
        Triple::new("Berlin", "capital_of", "Germany"),
        Triple::new("France", "neighbor_of", "Germany"),
    ]);
    let testing = TriplesFactory::from_triples_with_vocabulary(
        &[
            Triple::new("Paris", "capital_of", "France"),
            Triple::new("Berlin", "capital_of", "Germany"),
        ],
        training.vocabulary().clone(),
    )
    .expect("testing labels are in the training vocabulary");

    Dataset {
        training,
        testing,
        validation: None,
    }
}

pub fn toy_model(dataset: &Dataset) -> EmbeddingModel {
    let file = ModelFile {
        scoring: Scoring::TransE,
        dim: 2,
        // Paris, France, Berlin, Germany in vocabulary order
        entities: vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
        relations: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        entity_labels: None,
        relation_labels: None,
    };
    EmbeddingModel::from_model_file(file, dataset.vocabulary().clone())
        .expect("toy model matches the toy vocabulary")
}

/// Context over the toy dataset with default configuration
pub fn toy_context() -> AppContext {
    toy_context_with_config(AppConfig::default())
}

/// Toy model and dataset under `config`; demo mode applies when enabled
pub fn toy_context_with_config(config: AppConfig) -> AppContext {
    let dataset = toy_dataset();
    let model = Arc::new(toy_model(&dataset));
    context_over(config, dataset, model)
}

/// Context over any dataset and predictor, with NER built from `config`
pub fn context_over(
    config: AppConfig,
    dataset: Dataset,
    predictor: Arc<dyn LinkPredictor>,
) -> AppContext {
    let ner = RuleBasedNer::from_config(&config.ner, Some(dataset.vocabulary()))
        .expect("NER configuration loads");

    AppContext::with_predictor(config, dataset, predictor, Arc::new(ner))
}
