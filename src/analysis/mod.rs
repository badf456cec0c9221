//! Post-validation analysis.
//!
//! Reads the persisted error records back from the store and combines
//! them with the sample's per-state counts to produce:
//! - ErrorPatternSummary: frequency of each error type
//! - ConfusionSummary: detection statistics for the sample
//! - Extrapolation: full-corpus estimate with a confidence interval

pub mod confusion;
pub mod extrapolation;
pub mod patterns;

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, instrument};

use crate::adapters::ErrorStore;

pub use confusion::{ConfusionMatrixStats, ConfusionSummary};
pub use extrapolation::{
    coefficient_of_variation, extrapolate, finite_population_correction, wilson_interval,
    Extrapolation, Reliability,
};
pub use patterns::ErrorPatternSummary;

/// Combined analysis of one validation run
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub error_summary: ErrorPatternSummary,
    pub confusion: ConfusionSummary,
    pub extrapolation: Extrapolation,
}

/// Analyze persisted errors against the sample they came from.
///
/// `total_errors` is the number of citations with at least one error; it is
/// normally the run's `records_persisted`. `sampled_places` is the number of
/// places those citations came from.
#[instrument(skip(error_store, per_state_counts))]
pub fn analyze(
    error_store: &ErrorStore,
    per_state_counts: &BTreeMap<String, usize>,
    total_citations: usize,
    total_errors: usize,
    sampled_places: usize,
) -> Result<AnalysisReport> {
    let records = error_store
        .records()
        .context("Failed to read error records")?;
    let error_summary = ErrorPatternSummary::from_records(&records);

    let matrix = ConfusionMatrixStats::from_totals(total_citations, total_errors);
    let extrapolation = extrapolate(per_state_counts, &matrix, sampled_places);

    info!(
        records = error_summary.total_records,
        accuracy = matrix.accuracy(),
        lower = extrapolation.accuracy_lower,
        upper = extrapolation.accuracy_upper,
        reliability = %extrapolation.reliability,
        "Analysis complete"
    );

    Ok(AnalysisReport {
        error_summary,
        confusion: matrix.summary(),
        extrapolation,
    })
}
