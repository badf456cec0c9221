//! Command-line interface for citeval.
//!
//! Provides commands for drawing a stratified sample, validating the
//! sampled places, analyzing the persisted errors, and showing the resolved
//! configuration. Intermediate results are JSON files under the citeval
//! home so each stage can be rerun on its own.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::adapters::{CorpusLoader, ErrorStore, JsonlCorpus, SqliteReference};
use crate::analysis::{self, AnalysisReport};
use crate::config::{self, ResolvedConfig};
use crate::core::{
    self as engine, BatchWriter, CitationValidator, Progress, SampleOutcome, ValidationOutcome,
};

/// citeval - Bluebook citation validation and accuracy extrapolation
#[derive(Parser, Debug)]
#[command(name = "citeval")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Draw a stratified sample of places and write the sample manifest
    Sample {
        /// Number of places to sample (defaults to config)
        #[arg(short, long)]
        size: Option<usize>,

        /// RNG seed (defaults to config)
        #[arg(long)]
        seed: Option<u64>,

        /// Manifest path (defaults to $CITEVAL_HOME/sample.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate the places in a sample manifest
    Validate {
        /// Sample manifest to validate
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Places validated concurrently (defaults to config)
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Records per insert transaction (defaults to config)
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Where to write the run summary
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Analyze persisted errors against a sample and validation run
    Analyze {
        /// Sample manifest
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Validation run summary
        #[arg(short, long)]
        outcome: Option<PathBuf>,
    },

    /// Sample, validate and analyze in one pass
    Run {
        /// Number of places to sample (defaults to config)
        #[arg(short, long)]
        size: Option<usize>,

        /// RNG seed (defaults to config)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let cfg = config::config()?;

        match self.command {
            Commands::Sample { size, seed, output } => {
                let outcome = run_sample(cfg, size, seed).await?;
                let path = output.unwrap_or_else(|| manifest_path(cfg));
                write_json(&path, &outcome)?;
                eprintln!(
                    "Sampled {} of {} places across {} states -> {}",
                    outcome.place_ids.len(),
                    outcome.per_state_counts.values().sum::<usize>(),
                    outcome.per_state_counts.len(),
                    path.display()
                );
                Ok(())
            }
            Commands::Validate {
                manifest,
                concurrency,
                batch_size,
                output,
            } => {
                let manifest = manifest.unwrap_or_else(|| manifest_path(cfg));
                let sample: SampleOutcome = read_json(&manifest)?;
                let outcome = run_validate(cfg, &sample, concurrency, batch_size).await?;
                let path = output.unwrap_or_else(|| outcome_path(cfg));
                write_json(&path, &outcome)?;
                print_json(&outcome)
            }
            Commands::Analyze { manifest, outcome } => {
                let sample: SampleOutcome =
                    read_json(&manifest.unwrap_or_else(|| manifest_path(cfg)))?;
                let outcome: ValidationOutcome =
                    read_json(&outcome.unwrap_or_else(|| outcome_path(cfg)))?;
                print_json(&run_analyze(cfg, &sample, &outcome)?)
            }
            Commands::Run { size, seed } => {
                let sample = run_sample(cfg, size, seed).await?;
                write_json(&manifest_path(cfg), &sample)?;

                let outcome = run_validate(cfg, &sample, None, None).await?;
                write_json(&outcome_path(cfg), &outcome)?;

                print_json(&run_analyze(cfg, &sample, &outcome)?)
            }
            Commands::Config => show_config(cfg),
        }
    }
}

fn manifest_path(cfg: &ResolvedConfig) -> PathBuf {
    cfg.home.join("sample.json")
}

fn outcome_path(cfg: &ResolvedConfig) -> PathBuf {
    cfg.home.join("validation.json")
}

/// Sample places from the configured corpus
async fn run_sample(
    cfg: &ResolvedConfig,
    size: Option<usize>,
    seed: Option<u64>,
) -> Result<SampleOutcome> {
    let size = size.unwrap_or(cfg.sampling.sample_size);
    let seed = seed.unwrap_or(cfg.sampling.seed);

    let corpus = JsonlCorpus::new(&cfg.corpus);
    let place_ids = corpus
        .list_place_ids()
        .await
        .with_context(|| format!("Failed to list places in {}", cfg.corpus.display()))?;

    let reference = Arc::new(SqliteReference::open(&cfg.reference_db)?);
    tokio::task::spawn_blocking(move || engine::sample(&place_ids, reference.as_ref(), size, seed))
        .await
        .context("Sampling task failed")?
        .context("Failed to query reference data while sampling")
}

/// Validate every place in a sample
async fn run_validate(
    cfg: &ResolvedConfig,
    sample: &SampleOutcome,
    concurrency: Option<usize>,
    batch_size: Option<usize>,
) -> Result<ValidationOutcome> {
    let mut settings = cfg.validation.validator_config();
    if let Some(limit) = concurrency {
        settings.max_concurrency = limit;
    }
    if let Some(size) = batch_size {
        settings.insert_batch_size = size;
    }

    let reference = Arc::new(SqliteReference::open(&cfg.reference_db)?);
    let corpus = Arc::new(JsonlCorpus::new(&cfg.corpus));
    let store = ErrorStore::open(&cfg.error_db)?;
    let writer = BatchWriter::new(store, settings.lock_timeout);

    let validator = CitationValidator::new(reference, corpus, writer, settings)
        .with_progress(Arc::new(log_progress));

    validator
        .validate(sample.place_ids.clone())
        .await
        .context("Validation run failed")
}

fn log_progress(progress: Progress) {
    let step = (progress.total / 20).max(1);
    if progress.completed % step == 0 || progress.completed == progress.total {
        info!(
            completed = progress.completed,
            total = progress.total,
            "Validation progress"
        );
    }
}

fn run_analyze(
    cfg: &ResolvedConfig,
    sample: &SampleOutcome,
    outcome: &ValidationOutcome,
) -> Result<AnalysisReport> {
    let store = ErrorStore::open(&cfg.error_db)?;
    analysis::analyze(
        &store,
        &sample.per_state_counts,
        outcome.citations_checked,
        outcome.records_persisted,
        outcome.places_checked(),
    )
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Show resolved configuration
fn show_config(cfg: &ResolvedConfig) -> Result<()> {
    println!("citeval configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:          {}", cfg.home.display());
    println!("  Reference DB:  {}", cfg.reference_db.display());
    println!("  Error DB:      {}", cfg.error_db.display());
    println!("  Corpus:        {}", cfg.corpus.display());
    println!("  Sample:        {}", manifest_path(cfg).display());
    println!();
    println!("Sampling:");
    println!("  Sample size:   {}", cfg.sampling.sample_size);
    println!("  Seed:          {}", cfg.sampling.seed);
    println!();
    println!("Validation:");
    println!("  Concurrency:   {}", cfg.validation.max_concurrency);
    println!("  Batch size:    {}", cfg.validation.insert_batch_size);
    println!("  Lock timeout:  {}s", cfg.validation.lock_timeout_seconds);
    println!("  Document year: {}", cfg.validation.check_document_year);

    Ok(())
}
