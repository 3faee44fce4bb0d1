//! KGC Embed - Knowledge graph embedding models
//!
//! Loads pre-trained entity and relation embeddings and serves them as a
//! `LinkPredictor`. Training is out of scope: vectors are produced elsewhere
//! and written in the JSON model format defined in [`model::ModelFile`].

pub mod model;

pub use model::{EmbeddingModel, ModelFile, Scoring};
