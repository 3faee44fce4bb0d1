//! KGC CLI - Command-line interface
//!
//! Usage:
//!   kgc ner <text>
//!   kgc complete --head <h> --relation <r> [--tail <t>] [--top-k <n>]
//!   kgc evaluate [--target head|relation|tail|all] [--split test|valid]
//!   kgc stats

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use kgc_core::config::AppConfig;
use kgc_core::dataset::split_paths;
use kgc_core::{Dataset, Target, TripleQuery, TriplesFactory};
use kgc_embed::EmbeddingModel;
use kgc_extractor::{EntityExtractor, RuleBasedNer};
use kgc_inference::{EvaluationReport, Evaluator, GroundTruthPolicy, TripleCompleter};

#[derive(Parser)]
#[command(name = "kgc")]
#[command(about = "Knowledge graph completion CLI")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Dataset directory holding train.txt, test.txt and optionally valid.txt
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Serialized embedding model
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print named entity annotations of a text as JSON
    Ner {
        /// Text to annotate
        text: String,
    },
    /// Fill the single empty element of a triple
    Complete {
        #[arg(long, default_value = "")]
        head: String,
        #[arg(long, default_value = "")]
        relation: String,
        #[arg(long, default_value = "")]
        tail: String,
        /// Print the top N candidates instead of the completed triple
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Rank-based evaluation (Hits@k, MRR) over a held-out split
    Evaluate {
        #[arg(long, value_enum, default_value_t = TargetArg::Tail)]
        target: TargetArg,
        #[arg(long, value_enum, default_value_t = SplitArg::Test)]
        split: SplitArg,
        /// Print reports as JSON
        #[arg(long)]
        json: bool,
    },
    /// Triple, entity and relation counts per split
    Stats,
}

#[derive(Clone, Copy, ValueEnum)]
enum TargetArg {
    Head,
    Relation,
    Tail,
    All,
}

impl TargetArg {
    fn targets(self) -> Vec<Target> {
        match self {
            Self::Head => vec![Target::Head],
            Self::Relation => vec![Target::Relation],
            Self::Tail => vec![Target::Tail],
            Self::All => Target::ALL.to_vec(),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SplitArg {
    Test,
    Valid,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("warn,kgc={}", config.logging.level).into()),
        )
        .init();

    match cli.command {
        Commands::Ner { text } => run_ner(&config, &text),
        Commands::Complete {
            head,
            relation,
            tail,
            top_k,
        } => run_complete(&config, TripleQuery::from_labels(&head, &relation, &tail), top_k),
        Commands::Evaluate {
            target,
            split,
            json,
        } => run_evaluate(&config, target, split, json),
        Commands::Stats => run_stats(&config),
    }
}

/// Config file or defaults, then environment, then global flags
fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };

    if let Some(dir) = &cli.data_dir {
        let (train, test, valid) = split_paths(dir);
        config.data.training_path = train;
        config.data.testing_path = test;
        config.data.validation_path = valid.exists().then_some(valid);
    }
    if let Some(model) = &cli.model {
        config.model.path = model.clone();
    }

    Ok(config)
}

fn load_completer(config: &AppConfig, dataset: &Dataset) -> anyhow::Result<TripleCompleter> {
    let model = EmbeddingModel::load(&config.model.path, dataset.vocabulary().clone())
        .with_context(|| format!("failed to load model {}", config.model.path.display()))?;

    let completer = TripleCompleter::new(Arc::new(model));
    if config.inference.demo_mode {
        tracing::warn!("Demo mode enabled: predictions may be replaced with testing-split labels");
        return Ok(completer.with_ground_truth(GroundTruthPolicy::from_config(
            dataset.testing.clone(),
            &config.inference,
        )));
    }
    Ok(completer)
}

fn run_ner(config: &AppConfig, text: &str) -> anyhow::Result<()> {
    let training = load_ner_vocabulary(config);
    let vocabulary = training.as_ref().map(|t| t.vocabulary().as_ref());

    let ner = RuleBasedNer::from_config(&config.ner, vocabulary)?;
    println!("{}", ner.annotate(text)?);
    Ok(())
}

/// Training split whose labels extend the NER dictionary.
///
/// Best-effort: NER runs without it when the split is absent or unreadable.
fn load_ner_vocabulary(config: &AppConfig) -> Option<TriplesFactory> {
    let path = &config.data.training_path;
    if !config.ner.include_vocabulary || !path.exists() {
        return None;
    }

    match TriplesFactory::from_path(path, config.data.delimiter) {
        Ok(training) => Some(training),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Tagging without vocabulary");
            None
        }
    }
}

fn run_complete(
    config: &AppConfig,
    query: TripleQuery,
    top_k: Option<usize>,
) -> anyhow::Result<()> {
    let dataset = Dataset::load(&config.data)?;
    let completer = load_completer(config, &dataset)?;

    match top_k {
        Some(0) => bail!("--top-k must be positive"),
        Some(k) => {
            let prediction = completer.predict(&query, k)?;
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
        None => {
            let completion = completer.complete(&query)?;
            println!("{}", completion.triple);
        }
    }
    Ok(())
}

fn run_evaluate(
    config: &AppConfig,
    target: TargetArg,
    split: SplitArg,
    json: bool,
) -> anyhow::Result<()> {
    let dataset = Dataset::load(&config.data)?;
    let completer = load_completer(config, &dataset)?;

    let split = match split {
        SplitArg::Test => &dataset.testing,
        SplitArg::Valid => dataset
            .validation
            .as_ref()
            .context("no validation split configured")?,
    };
    let triples: Vec<_> = split.labeled_triples().collect();

    let evaluator = Evaluator::new(completer.predictor().as_ref());
    let mut reports: Vec<EvaluationReport> = Vec::new();
    for t in target.targets() {
        reports.push(evaluator.evaluate(&triples, t)?.report(t));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!("{report}");
        }
    }
    Ok(())
}

fn run_stats(config: &AppConfig) -> anyhow::Result<()> {
    let dataset = Dataset::load(&config.data)?;
    let summary = dataset.summary();

    println!("Entities:   {}", summary.num_entities);
    println!("Relations:  {}", summary.num_relations);
    println!("Training:   {} triples", summary.training_triples);
    println!("Testing:    {} triples", summary.testing_triples);
    if let Some(validation) = summary.validation_triples {
        println!("Validation: {validation} triples");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_complete() {
        let cli = Cli::parse_from([
            "kgc",
            "complete",
            "--head",
            "Paris",
            "--relation",
            "capital_of",
            "--top-k",
            "3",
        ]);
        match cli.command {
            Commands::Complete {
                head,
                relation,
                tail,
                top_k,
            } => {
                assert_eq!(head, "Paris");
                assert_eq!(relation, "capital_of");
                assert!(tail.is_empty());
                assert_eq!(top_k, Some(3));
            }
            _ => panic!("expected complete"),
        }
    }

    #[test]
    fn test_evaluate_all_targets() {
        let cli = Cli::parse_from(["kgc", "evaluate", "--target", "all"]);
        match cli.command {
            Commands::Evaluate { target, .. } => assert_eq!(target.targets(), Target::ALL.to_vec()),
            _ => panic!("expected evaluate"),
        }
    }

    fn config_for(dir: &std::path::Path) -> AppConfig {
        let cli = Cli::parse_from(["kgc", "--data-dir", dir.to_str().unwrap(), "stats"]);
        load_config(&cli).unwrap()
    }

    #[test]
    fn test_ner_vocabulary_needs_only_training_split() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("train.txt"), "Paris\tcapital_of\tFrance\n").unwrap();

        let config = config_for(dir.path());
        let training = load_ner_vocabulary(&config).expect("training split loads");
        assert_eq!(training.num_entities(), 2);

        let vocabulary = training.vocabulary().as_ref();
        let ner = RuleBasedNer::from_config(&config.ner, Some(vocabulary)).unwrap();
        let texts: Vec<String> = ner
            .extract("Paris on 2024-01-02")
            .unwrap()
            .into_iter()
            .map(|e| e.text)
            .collect();
        assert!(texts.contains(&"Paris".to_string()));
    }

    #[test]
    fn test_ner_vocabulary_skips_malformed_training_split() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("train.txt"), "only two\tfields\n").unwrap();

        let config = config_for(dir.path());
        assert!(load_ner_vocabulary(&config).is_none());
        assert!(run_ner(&config, "Paris").is_ok());
    }

    #[test]
    fn test_data_dir_sets_split_paths() {
        let dir = std::env::temp_dir().join("kgc-cli-missing-dataset");
        let cli = Cli::parse_from(["kgc", "--data-dir", dir.to_str().unwrap(), "stats"]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.data.training_path, dir.join("train.txt"));
        assert_eq!(config.data.testing_path, dir.join("test.txt"));
        assert_eq!(config.data.validation_path, None);
    }
}
