//! citeval - Bluebook citation validation and accuracy extrapolation
//!
//! Validates municipal and county code citations against GNIS-style place
//! reference data and the scraped source documents they were drawn from,
//! then estimates corpus-wide citation accuracy from a stratified sample.
//!
//! # Architecture
//!
//! The pipeline runs in three stages:
//! - Sample: stratify places by state and draw a reproducible sample
//! - Validate: run five checkers per citation with bounded concurrency,
//!   persisting error records through a single lock-guarded writer
//! - Analyze: summarize error patterns and extrapolate accuracy with a
//!   heterogeneity-adjusted confidence interval
//!
//! # Modules
//!
//! - `adapters`: Reference data, error store and corpus loading
//! - `analysis`: Error patterns, confusion matrix, extrapolation
//! - `checks`: Geography, code type, section, date and format checkers
//! - `core`: Sampler, worker pool, batch writer, validator
//! - `domain`: Data structures (Citation, Document, ErrorRecord)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Draw a sample and validate it
//! citeval sample --size 500
//! citeval validate
//!
//! # Extrapolate from the persisted errors
//! citeval analyze
//! ```

pub mod adapters;
pub mod analysis;
pub mod checks;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use crate::adapters::{
    CorpusLoader, ErrorStore, JsonlCorpus, MemoryReference, ReferenceLookup, SqliteReference,
};
pub use crate::analysis::{analyze, AnalysisReport};
pub use crate::core::{sample, validate, CitationValidator, SampleOutcome, ValidationOutcome};
pub use crate::domain::{Citation, Document, ErrorRecord, PlaceReference};
