//! KGC Configuration Management
//!
//! Handles configuration from environment variables, config files,
//! and command-line arguments with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::dataset::DEFAULT_DELIMITER;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Dataset locations
    pub data: DataConfig,

    /// Trained model location
    pub model: ModelConfig,

    /// Triple completion behaviour
    pub inference: InferenceConfig,

    /// Named entity recognition
    pub ner: NerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        // Server
        if let Ok(host) = std::env::var("KGC_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("KGC_PORT") {
            self.server.port = parse_var("KGC_PORT", port)?;
        }
        if let Ok(secs) = std::env::var("KGC_REQUEST_TIMEOUT_SECS") {
            self.server.request_timeout_secs = parse_var("KGC_REQUEST_TIMEOUT_SECS", secs)?;
        }

        // CORS origins from environment variable (comma-separated)
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Data
        if let Ok(path) = std::env::var("KGC_TRAIN_PATH") {
            self.data.training_path = path.into();
        }
        if let Ok(path) = std::env::var("KGC_TEST_PATH") {
            self.data.testing_path = path.into();
        }
        if let Ok(path) = std::env::var("KGC_VALID_PATH") {
            self.data.validation_path = Some(path.into());
        }

        // Model
        if let Ok(path) = std::env::var("KGC_MODEL_PATH") {
            self.model.path = path.into();
        }

        // Inference
        if let Ok(flag) = std::env::var("KGC_DEMO_MODE") {
            self.inference.demo_mode = parse_bool("KGC_DEMO_MODE", &flag)?;
        }

        // NER
        if let Ok(path) = std::env::var("KGC_GAZETTEER_PATH") {
            self.ner.gazetteer_path = Some(path.into());
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }

        self.validate()?;
        Ok(self)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            (
                "inference.entity_substitution_probability",
                self.inference.entity_substitution_probability,
            ),
            (
                "inference.relation_substitution_probability",
                self.inference.relation_substitution_probability,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                });
            }
        }

        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "server.request_timeout_secs".to_string(),
                value: "0".to_string(),
            });
        }

        if self.inference.default_top_k == 0 {
            return Err(ConfigError::InvalidValue {
                key: "inference.default_top_k".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Upper bound on a single model call, in seconds
    pub request_timeout_secs: u64,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Allowed origins for CORS (empty allows any origin)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8081,
            request_timeout_secs: 30,
            cors_enabled: true,
            cors_origins: vec![],
        }
    }
}

/// Dataset split locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Training triples; the vocabulary is built from this split
    pub training_path: PathBuf,

    /// Testing triples, used for evaluation and ground-truth membership
    pub testing_path: PathBuf,

    /// Optional validation triples
    pub validation_path: Option<PathBuf>,

    /// Field delimiter
    pub delimiter: char,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            training_path: PathBuf::from("data/train.txt"),
            testing_path: PathBuf::from("data/test.txt"),
            validation_path: None,
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

/// Trained model location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Serialized embedding model
    pub path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/model.json"),
        }
    }
}

/// Triple completion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Demo mode: sometimes replace the top prediction with a candidate that
    /// appears in the testing split. Leaks evaluation labels; keep off outside
    /// of demonstrations.
    pub demo_mode: bool,

    /// Substitution probability when the missing element is an entity
    pub entity_substitution_probability: f64,

    /// Substitution probability when the missing element is a relation
    pub relation_substitution_probability: f64,

    /// Candidates returned by top-k prediction when the request gives none
    pub default_top_k: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            demo_mode: false,
            entity_substitution_probability: 0.8,
            relation_substitution_probability: 0.16,
            default_top_k: 5,
        }
    }
}

/// Named entity recognition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NerConfig {
    /// Optional gazetteer file (`term<TAB>type` per line)
    pub gazetteer_path: Option<PathBuf>,

    /// Also tag knowledge graph entity labels found in the text
    pub include_vocabulary: bool,

    /// Entity type used for vocabulary matches
    pub vocabulary_type: String,

    /// Drop annotations below this confidence
    pub min_confidence: f32,
}

impl Default for NerConfig {
    fn default() -> Self {
        Self {
            gazetteer_path: None,
            include_vocabulary: true,
            vocabulary_type: "Entity".to_string(),
            min_confidence: 0.5,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

impl From<ConfigError> for crate::KgcError {
    fn from(err: ConfigError) -> Self {
        crate::KgcError::ConfigError(err.to_string())
    }
}
