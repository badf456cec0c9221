//! Stratified sampling of places by state.
//!
//! The sample size is split across states in proportion to how many places
//! each state contributes, then places are drawn without replacement inside
//! each state. Sampling is reproducible: the same ids, reference data and
//! seed always yield the same sample.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::adapters::{ReferenceError, ReferenceLookup};

/// Maximum number of ids per reference query
pub const LOOKUP_BATCH_SIZE: usize = 100;

/// Per-state sample allocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleStrategy {
    pub allocations: BTreeMap<String, usize>,
}

impl SampleStrategy {
    /// Total number of places to draw
    pub fn total(&self) -> usize {
        self.allocations.values().sum()
    }

    pub fn get(&self, state_code: &str) -> usize {
        self.allocations.get(state_code).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Everything one sampling pass produced
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleOutcome {
    /// Places available per state
    pub per_state_counts: BTreeMap<String, usize>,

    /// Places allocated per state
    pub strategy: SampleStrategy,

    /// Sampled place ids
    pub place_ids: Vec<i64>,

    pub target_size: usize,
    pub seed: u64,
}

/// Place ids grouped by reference state
#[derive(Debug, Clone, Default)]
pub struct Strata {
    pub by_state: BTreeMap<String, Vec<i64>>,
    /// Ids with no row in the reference store
    pub unmatched: usize,
}

impl Strata {
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.by_state
            .iter()
            .map(|(state, ids)| (state.clone(), ids.len()))
            .collect()
    }

    pub fn total(&self) -> usize {
        self.by_state.values().map(Vec::len).sum()
    }

    /// place_id -> state_code
    pub fn state_of(&self) -> HashMap<i64, String> {
        self.by_state
            .iter()
            .flat_map(|(state, ids)| ids.iter().map(move |id| (*id, state.clone())))
            .collect()
    }
}

/// Group distinct place ids by their reference state, querying in batches
pub fn build_strata(
    place_ids: &[i64],
    reference: &dyn ReferenceLookup,
) -> Result<Strata, ReferenceError> {
    let distinct: Vec<i64> = place_ids
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut strata = Strata::default();

    for chunk in distinct.chunks(LOOKUP_BATCH_SIZE) {
        let found = reference.lookup_batch(chunk)?;
        for &place_id in chunk {
            match found.get(&place_id) {
                Some(place) if !place.state_code.trim().is_empty() => {
                    strata
                        .by_state
                        .entry(place.state_code.trim().to_string())
                        .or_default()
                        .push(place_id);
                }
                _ => strata.unmatched += 1,
            }
        }
    }

    if strata.unmatched > 0 {
        debug!(unmatched = strata.unmatched, "Place ids without reference state");
    }

    Ok(strata)
}

/// Split `target_size` across states proportionally to availability.
///
/// Every non-empty state gets at least one slot and never more than it has,
/// and the total equals `min(target_size, total_available)`. When the target
/// is smaller than the number of non-empty states the total wins and the
/// smallest states receive nothing.
pub fn allocate(available: &BTreeMap<String, usize>, target_size: usize) -> SampleStrategy {
    let total_available: usize = available.values().sum();
    let target = target_size.min(total_available);

    if target == 0 {
        return SampleStrategy::default();
    }

    struct Slot<'a> {
        state: &'a str,
        available: usize,
        allocated: usize,
        remainder: f64,
    }

    let mut slots: Vec<Slot<'_>> = available
        .iter()
        .filter(|(_, &count)| count > 0)
        .map(|(state, &count)| {
            let quota = target as f64 * count as f64 / total_available as f64;
            let floor = quota.floor() as usize;
            Slot {
                state: state.as_str(),
                available: count,
                allocated: floor.clamp(1, count),
                remainder: quota - floor as f64,
            }
        })
        .collect();

    let mut allocated: usize = slots.iter().map(|s| s.allocated).sum();

    if allocated < target {
        // Largest fractional remainder first, then larger states
        slots.sort_by(|a, b| {
            b.remainder
                .total_cmp(&a.remainder)
                .then(b.available.cmp(&a.available))
                .then(a.state.cmp(b.state))
        });
        while allocated < target {
            let mut progressed = false;
            for slot in slots.iter_mut() {
                if allocated == target {
                    break;
                }
                if slot.allocated < slot.available {
                    slot.allocated += 1;
                    allocated += 1;
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
    } else if allocated > target {
        // Largest allocations give back first
        while allocated > target {
            let largest = slots.iter_mut().filter(|s| s.allocated > 1).max_by(|a, b| {
                a.allocated
                    .cmp(&b.allocated)
                    .then(a.available.cmp(&b.available))
                    .then(b.state.cmp(a.state))
            });
            match largest {
                Some(slot) => {
                    slot.allocated -= 1;
                    allocated -= 1;
                }
                None => break,
            }
        }
        // More states than slots: the smallest states drop out
        while allocated > target {
            let smallest = slots
                .iter_mut()
                .filter(|s| s.allocated > 0)
                .min_by(|a, b| a.available.cmp(&b.available).then(a.state.cmp(b.state)));
            match smallest {
                Some(slot) => {
                    slot.allocated -= 1;
                    allocated -= 1;
                }
                None => break,
            }
        }
    }

    SampleStrategy {
        allocations: slots
            .into_iter()
            .filter(|s| s.allocated > 0)
            .map(|s| (s.state.to_string(), s.allocated))
            .collect(),
    }
}

/// Draw each state's allocation without replacement
pub fn draw(strata: &Strata, strategy: &SampleStrategy, rng: &mut ChaCha20Rng) -> Vec<i64> {
    let mut sampled = Vec::with_capacity(strategy.total());

    for (state, &count) in &strategy.allocations {
        let Some(ids) = strata.by_state.get(state) else {
            continue;
        };
        let mut pool = ids.clone();
        pool.sort_unstable();
        sampled.extend(pool.choose_multiple(rng, count.min(pool.len())).copied());
    }

    sampled
}

/// Stratified sample of `place_ids` using reference states.
///
/// Zero available places yields an empty outcome rather than an error.
#[instrument(skip(place_ids, reference), fields(ids = place_ids.len()))]
pub fn sample(
    place_ids: &[i64],
    reference: &dyn ReferenceLookup,
    target_size: usize,
    seed: u64,
) -> Result<SampleOutcome, ReferenceError> {
    let strata = build_strata(place_ids, reference)?;
    let per_state_counts = strata.counts();
    let strategy = allocate(&per_state_counts, target_size);

    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let sampled = draw(&strata, &strategy, &mut rng);

    info!(
        states = per_state_counts.len(),
        available = strata.total(),
        sampled = sampled.len(),
        "Stratified sample drawn"
    );

    Ok(SampleOutcome {
        per_state_counts,
        strategy,
        place_ids: sampled,
        target_size,
        seed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryReference;
    use crate::domain::PlaceReference;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counts(pairs: &[(&str, usize)]) -> BTreeMap<String, usize> {
        pairs.iter().map(|(s, c)| (s.to_string(), *c)).collect()
    }

    fn assert_invariants(available: &BTreeMap<String, usize>, target: usize) {
        let strategy = allocate(available, target);
        let total: usize = available.values().sum();
        assert_eq!(strategy.total(), target.min(total), "target {}", target);

        let non_empty = available.values().filter(|&&c| c > 0).count();
        for (state, &count) in available {
            let got = strategy.get(state);
            assert!(got <= count, "{} over capacity", state);
            if count > 0 && target >= non_empty {
                assert!(got >= 1, "{} got no slot", state);
            }
        }
    }

    #[test]
    fn test_allocation_invariants() {
        let skewed = counts(&[("Ark.", 1000), ("Tex.", 7), ("Ga.", 3), ("Vt.", 1), ("Ohio", 0)]);
        for target in [0, 1, 3, 4, 5, 10, 37, 100, 385, 1010, 1011, 5000] {
            assert_invariants(&skewed, target);
        }

        let even = counts(&[("A", 10), ("B", 10), ("C", 10)]);
        for target in [1, 2, 3, 10, 29, 30, 31] {
            assert_invariants(&even, target);
        }
    }

    #[test]
    fn test_allocation_is_proportional() {
        let available = counts(&[("Ark.", 600), ("Tex.", 300), ("Ga.", 100)]);
        let strategy = allocate(&available, 100);
        assert_eq!(strategy.get("Ark."), 60);
        assert_eq!(strategy.get("Tex."), 30);
        assert_eq!(strategy.get("Ga."), 10);
    }

    #[test]
    fn test_target_below_state_count_keeps_largest_states() {
        let available = counts(&[("Ark.", 1000), ("Tex.", 7), ("Ga.", 3), ("Vt.", 1)]);
        let strategy = allocate(&available, 2);
        assert_eq!(strategy.get("Ark."), 1);
        assert_eq!(strategy.get("Tex."), 1);
        assert_eq!(strategy.total(), 2);
    }

    #[test]
    fn test_empty_population() {
        let strategy = allocate(&BTreeMap::new(), 100);
        assert!(strategy.is_empty());

        let outcome = sample(&[], &MemoryReference::new(), 100, 7).unwrap();
        assert!(outcome.place_ids.is_empty());
        assert!(outcome.per_state_counts.is_empty());
    }

    #[test]
    fn test_sample_is_reproducible_and_distinct() {
        let reference: MemoryReference = (1..=500)
            .map(|id| {
                let state = ["Ark.", "Tex.", "Ga.", "Vt."][(id % 4) as usize];
                (id, PlaceReference::new(state, "C1"))
            })
            .collect();
        let ids: Vec<i64> = (1..=500).collect();

        let a = sample(&ids, &reference, 40, 42).unwrap();
        let b = sample(&ids, &reference, 40, 42).unwrap();
        let c = sample(&ids, &reference, 40, 43).unwrap();

        assert_eq!(a.place_ids, b.place_ids);
        assert_ne!(a.place_ids, c.place_ids);
        assert_eq!(a.place_ids.len(), 40);

        let distinct: BTreeSet<_> = a.place_ids.iter().collect();
        assert_eq!(distinct.len(), 40);
    }

    #[test]
    fn test_unknown_places_are_excluded() {
        let reference = MemoryReference::new()
            .with_place(1, "Ark.", "C1")
            .with_place(2, " ", "C1");
        let strata = build_strata(&[1, 1, 2, 3], &reference).unwrap();
        assert_eq!(strata.total(), 1);
        assert_eq!(strata.unmatched, 2);
        assert_eq!(strata.state_of()[&1], "Ark.");
    }

    struct CountingReference {
        inner: MemoryReference,
        batches: AtomicUsize,
        largest: AtomicUsize,
    }

    impl ReferenceLookup for CountingReference {
        fn lookup(&self, place_id: i64) -> Result<Option<PlaceReference>, ReferenceError> {
            self.inner.lookup(place_id)
        }

        fn lookup_batch(
            &self,
            place_ids: &[i64],
        ) -> Result<HashMap<i64, PlaceReference>, ReferenceError> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            self.largest.fetch_max(place_ids.len(), Ordering::SeqCst);
            self.inner.lookup_batch(place_ids)
        }
    }

    #[test]
    fn test_lookups_are_batched() {
        let reference = CountingReference {
            inner: (1..=250).map(|id| (id, PlaceReference::new("Ark.", "C1"))).collect(),
            batches: AtomicUsize::new(0),
            largest: AtomicUsize::new(0),
        };
        let ids: Vec<i64> = (1..=250).collect();

        build_strata(&ids, &reference).unwrap();
        assert_eq!(reference.batches.load(Ordering::SeqCst), 3);
        assert_eq!(reference.largest.load(Ordering::SeqCst), LOOKUP_BATCH_SIZE);
    }
}
