//! Sampling and validation engine.
//!
//! This module contains:
//! - Sampler: stratified sampling of places by state
//! - Pool: bounded-concurrency worker pool
//! - Writer: single-writer batch persistence of error records
//! - Validator: per-place checking driven through the pool

pub mod pool;
pub mod sampler;
pub mod validator;
pub mod writer;

// Re-export commonly used types
pub use pool::{BoundedPool, Progress, ProgressHook};
pub use sampler::{allocate, build_strata, draw, sample, SampleOutcome, SampleStrategy, Strata};
pub use validator::{
    check_place, validate, CitationValidator, PlaceReport, PlaceState, ValidationError,
    ValidationOutcome, ValidatorConfig,
};
pub use writer::{drain, BatchOutcome, BatchWriter, WriteError, WriteStats, DEFAULT_LOCK_TIMEOUT};
