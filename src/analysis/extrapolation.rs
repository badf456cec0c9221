//! Extrapolation of sample accuracy to the full corpus.
//!
//! The sample accuracy gets a 95% Wilson score interval. That interval is
//! widened by the geographic heterogeneity of the population (coefficient
//! of variation of per-state place counts) and narrowed by the finite
//! population correction when the sampled places are a sizeable share of
//! all places. The correction is computed in places, never citations, since
//! the population is only known as a place count.

use std::collections::BTreeMap;

use serde::Serialize;

use super::confusion::ConfusionMatrixStats;

/// z-score for a two-sided 95% interval
pub const Z_95: f64 = 1.96;
/// Interval widening per unit of coefficient of variation
pub const HETEROGENEITY_FACTOR: f64 = 0.1;
/// Sample fraction above which the finite population correction applies
pub const FPC_THRESHOLD: f64 = 0.05;
/// Sample size for a ±5% margin at 95% confidence
pub const HIGH_RELIABILITY_SAMPLE: usize = 385;
pub const MEDIUM_RELIABILITY_SAMPLE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Reliability {
    High,
    Medium,
    Low,
}

impl Reliability {
    pub fn for_sample(sample_size: usize) -> Self {
        if sample_size >= HIGH_RELIABILITY_SAMPLE {
            Reliability::High
        } else if sample_size >= MEDIUM_RELIABILITY_SAMPLE {
            Reliability::Medium
        } else {
            Reliability::Low
        }
    }
}

impl std::fmt::Display for Reliability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reliability::High => write!(f, "high"),
            Reliability::Medium => write!(f, "medium"),
            Reliability::Low => write!(f, "low"),
        }
    }
}

/// Full-corpus estimate derived from one validated sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extrapolation {
    pub sample_size: usize,
    pub sample_accuracy: f64,
    pub sample_error_rate: f64,
    pub confidence_level: f64,
    pub accuracy_lower: f64,
    pub accuracy_upper: f64,
    /// Half-width of the adjusted interval
    pub margin_of_error: f64,
    pub heterogeneity_cv: f64,
    /// Places whose citations were checked
    pub sampled_places: usize,
    /// Correction factor, when applied
    pub finite_population_correction: Option<f64>,
    /// Sum of per-state place counts
    pub estimated_total_records: usize,
    pub estimated_total_errors: usize,
    pub estimated_valid: usize,
    pub estimated_errors_lower: usize,
    pub estimated_errors_upper: usize,
    pub reliability: Reliability,
}

impl Extrapolation {
    pub fn interval_width(&self) -> f64 {
        self.accuracy_upper - self.accuracy_lower
    }
}

/// Wilson score interval as `(center, half_width)`
pub fn wilson_interval(p: f64, n: usize, z: f64) -> (f64, f64) {
    if n == 0 {
        return (0.5, 0.5);
    }
    let n = n as f64;
    let z2 = z * z;
    let denominator = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / denominator;
    let half_width = z * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt() / denominator;
    (center, half_width)
}

/// Population standard deviation over mean; 0 for fewer than two values
pub fn coefficient_of_variation(values: &[usize]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<usize>() as f64 / n;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    variance.sqrt() / mean
}

/// Finite population correction for `sampled` units drawn from `population`.
///
/// `None` below the threshold. Reaches 0 only when every unit was sampled.
pub fn finite_population_correction(sampled: usize, population: usize) -> Option<f64> {
    if population < 2 || sampled == 0 {
        return None;
    }
    let sampled = sampled.min(population);
    if (sampled as f64 / population as f64) <= FPC_THRESHOLD {
        return None;
    }
    let remaining = (population - sampled) as f64;
    Some((remaining / (population - 1) as f64).sqrt())
}

/// Project sample accuracy onto the population described by `per_state_counts`.
///
/// `sampled_places` is the number of places the confusion totals came from.
pub fn extrapolate(
    per_state_counts: &BTreeMap<String, usize>,
    confusion: &ConfusionMatrixStats,
    sampled_places: usize,
) -> Extrapolation {
    let sample_size = confusion.total();
    let accuracy = confusion.accuracy();
    let population: usize = per_state_counts.values().sum();

    let (center, mut half_width) = wilson_interval(accuracy, sample_size, Z_95);

    let counts: Vec<usize> = per_state_counts.values().copied().collect();
    let cv = coefficient_of_variation(&counts);
    half_width *= 1.0 + cv * HETEROGENEITY_FACTOR;

    let finite_population_correction = finite_population_correction(sampled_places, population);
    if let Some(factor) = finite_population_correction {
        half_width *= factor;
    }

    // The Wilson center is pulled toward 0.5; a narrowed interval must still
    // contain the observed accuracy when there is one.
    let mut accuracy_lower = (center - half_width).max(0.0);
    let mut accuracy_upper = (center + half_width).min(1.0);
    if sample_size > 0 {
        accuracy_lower = accuracy_lower.min(accuracy);
        accuracy_upper = accuracy_upper.max(accuracy);
    }

    let scale = |rate: f64| (rate * population as f64).round() as usize;
    let estimated_total_errors = scale(confusion.error_rate()).min(population);

    Extrapolation {
        sample_size,
        sample_accuracy: accuracy,
        sample_error_rate: confusion.error_rate(),
        confidence_level: 0.95,
        accuracy_lower,
        accuracy_upper,
        margin_of_error: half_width,
        heterogeneity_cv: cv,
        sampled_places,
        finite_population_correction,
        estimated_total_records: population,
        estimated_total_errors,
        estimated_valid: population - estimated_total_errors,
        estimated_errors_lower: scale(1.0 - accuracy_upper).min(population),
        estimated_errors_upper: scale(1.0 - accuracy_lower).min(population),
        reliability: Reliability::for_sample(sample_size),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(counts: &[usize]) -> BTreeMap<String, usize> {
        counts
            .iter()
            .enumerate()
            .map(|(i, c)| (format!("S{:02}", i), *c))
            .collect()
    }

    #[test]
    fn test_wilson_known_value() {
        // p = 0.8, n = 100
        let (center, half) = wilson_interval(0.8, 100, Z_95);
        assert!((center - half - 0.7112).abs() < 1e-3);
        assert!((center + half - 0.8666).abs() < 1e-3);
    }

    #[test]
    fn test_heterogeneity_widens_interval() {
        let confusion = ConfusionMatrixStats::from_totals(200, 20);
        let skewed = states(&[1000, 10, 10, 10, 10, 10, 10, 10, 10, 10]);
        let uniform = states(&[109; 10]);

        let wide = extrapolate(&skewed, &confusion, 20);
        let narrow = extrapolate(&uniform, &confusion, 20);

        assert_eq!(wide.estimated_total_records, narrow.estimated_total_records);
        assert!(wide.heterogeneity_cv > 0.0);
        assert_eq!(narrow.heterogeneity_cv, 0.0);
        assert!(wide.interval_width() > narrow.interval_width());
    }

    #[test]
    fn test_finite_population_correction_threshold() {
        let confusion = ConfusionMatrixStats::from_totals(100, 10);

        let large = extrapolate(&states(&[10_000]), &confusion, 100);
        assert!(large.finite_population_correction.is_none());

        let small = extrapolate(&states(&[400]), &confusion, 100);
        let factor = small.finite_population_correction.unwrap();
        assert!((factor - (300.0f64 / 399.0).sqrt()).abs() < 1e-12);
        assert!(small.interval_width() < large.interval_width());
    }

    #[test]
    fn test_citations_outnumbering_places_keep_interval_open() {
        // 500 citations from 20 of 200 places
        let confusion = ConfusionMatrixStats::from_totals(500, 50);
        let result = extrapolate(&states(&[100, 100]), &confusion, 20);

        let factor = result.finite_population_correction.unwrap();
        assert!((factor - (180.0f64 / 199.0).sqrt()).abs() < 1e-12);
        assert!(result.interval_width() > 0.0);
        assert!(result.accuracy_lower <= result.sample_accuracy);
        assert!(result.accuracy_upper >= result.sample_accuracy);
        assert!(result.estimated_errors_lower <= result.estimated_total_errors);
        assert!(result.estimated_errors_upper >= result.estimated_total_errors);
    }

    #[test]
    fn test_full_census_still_contains_estimate() {
        let confusion = ConfusionMatrixStats::from_totals(500, 50);
        let result = extrapolate(&states(&[100, 100]), &confusion, 200);

        assert_eq!(result.finite_population_correction, Some(0.0));
        assert!(result.accuracy_lower <= 0.9 && 0.9 <= result.accuracy_upper);
        assert_eq!(result.estimated_total_errors, 20);
        assert!(result.estimated_errors_lower <= 20 && 20 <= result.estimated_errors_upper);
    }

    #[test]
    fn test_correction_helper_bounds() {
        assert!(finite_population_correction(0, 100).is_none());
        assert!(finite_population_correction(5, 100).is_none());
        assert!(finite_population_correction(10, 1).is_none());
        assert_eq!(finite_population_correction(500, 100), Some(0.0));
    }

    #[test]
    fn test_scaled_estimates() {
        let confusion = ConfusionMatrixStats::from_totals(400, 40);
        let result = extrapolate(&states(&[5000, 5000]), &confusion, 400);

        assert_eq!(result.estimated_total_records, 10_000);
        assert_eq!(result.estimated_total_errors, 1000);
        assert_eq!(result.estimated_valid, 9000);
        assert!(result.estimated_errors_lower < 1000);
        assert!(result.estimated_errors_upper > 1000);
        assert_eq!(result.reliability, Reliability::High);
    }

    #[test]
    fn test_reliability_buckets() {
        assert_eq!(Reliability::for_sample(385), Reliability::High);
        assert_eq!(Reliability::for_sample(384), Reliability::Medium);
        assert_eq!(Reliability::for_sample(100), Reliability::Medium);
        assert_eq!(Reliability::for_sample(99), Reliability::Low);
    }

    #[test]
    fn test_empty_inputs() {
        let result = extrapolate(&BTreeMap::new(), &ConfusionMatrixStats::default(), 0);
        assert_eq!(result.estimated_total_records, 0);
        assert_eq!(result.accuracy_lower, 0.0);
        assert_eq!(result.accuracy_upper, 1.0);
        assert_eq!(result.reliability, Reliability::Low);
    }
}
