use std::collections::{BTreeSet, HashMap};
use crate::core::error::Result;
use crate::storage::backend::StorageBackend;

/// Admissible number of shared n-grams for a candidate, given the query's
/// n-gram count and the minimum similarity asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountBounds {
    pub min: usize,
    pub max: usize,
}

impl CountBounds {
    pub fn for_query(gram_count: usize, min_similarity: u8) -> Self {
        let similarity = usize::from(min_similarity.min(100));
        CountBounds {
            min: gram_count * similarity / 100,
            max: gram_count * (200 - similarity) / 100,
        }
    }

    pub fn contains(&self, count: usize) -> bool {
        self.min <= count && count <= self.max
    }
}

/// Per-unit count of query n-grams whose posting list holds the unit.
#[derive(Debug, Default)]
pub struct CandidateTally {
    counts: HashMap<String, usize>,
}

impl CandidateTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_posting_list(&mut self, ids: Vec<String>) {
        for id in ids {
            *self.counts.entry(id).or_insert(0) += 1;
        }
    }

    pub fn count(&self, id: &str) -> usize {
        self.counts.get(id).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Candidates within `bounds`, ascending by id.
    pub fn within(self, bounds: CountBounds) -> Vec<String> {
        let mut ids: Vec<String> = self
            .counts
            .into_iter()
            .filter(|(_, count)| bounds.contains(*count))
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        ids
    }
}

/// Coarse filter: units of `lang` sharing a plausible number of n-grams
/// with the query.
pub fn collect_candidates(
    backend: &dyn StorageBackend,
    lang: &str,
    keys: &BTreeSet<u32>,
    min_similarity: u8,
) -> Result<Vec<String>> {
    let mut tally = CandidateTally::new();
    for key in keys {
        tally.add_posting_list(backend.postings(lang, *key)?);
    }
    Ok(tally.within(CountBounds::for_query(keys.len(), min_similarity)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn bounds_follow_similarity() {
        assert_eq!(CountBounds::for_query(10, 70), CountBounds { min: 7, max: 13 });
        assert_eq!(CountBounds::for_query(4, 100), CountBounds { min: 4, max: 4 });
        assert_eq!(CountBounds::for_query(3, 0), CountBounds { min: 0, max: 6 });
    }

    #[test]
    fn tally_counts_shared_grams() {
        let mut tally = CandidateTally::new();
        tally.add_posting_list(ids(&["a", "b"]));
        tally.add_posting_list(ids(&["a"]));
        tally.add_posting_list(ids(&["a", "c"]));

        assert_eq!(tally.count("a"), 3);
        assert_eq!(tally.count("b"), 1);
        assert_eq!(tally.count("z"), 0);
        assert_eq!(tally.len(), 3);
    }

    #[test]
    fn within_keeps_plausible_candidates_sorted() {
        let mut tally = CandidateTally::new();
        tally.add_posting_list(ids(&["9", "2", "5"]));
        tally.add_posting_list(ids(&["9", "2"]));

        let kept = tally.within(CountBounds { min: 2, max: 3 });
        assert_eq!(kept, ids(&["2", "9"]));
    }
}
