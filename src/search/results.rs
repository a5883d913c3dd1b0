use std::cmp::Ordering;
use serde::{Deserialize, Serialize};
use crate::core::types::{Properties, Variant, CREATION_DATE};
use crate::core::utils::parse_tmx_date;

/// One search hit: the matching source variant, its translation, and the
/// unit they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub source: Variant,
    pub target: Variant,
    pub similarity: u8,
    pub origin: String,      // Memory the unit was found in
    pub properties: Properties,
}

impl Match {
    /// Creation date in epoch millis; `None` when absent or unparsable.
    pub fn creation_date(&self) -> Option<i64> {
        self.properties
            .get(CREATION_DATE)
            .and_then(|date| parse_tmx_date(date))
    }

    /// Ranking order: higher similarity first, then newer units, then
    /// origin name. Undated units rank as the oldest.
    pub fn ranking(&self, other: &Match) -> Ordering {
        other
            .similarity
            .cmp(&self.similarity)
            .then_with(|| other.creation_date().cmp(&self.creation_date()))
            .then_with(|| self.origin.cmp(&other.origin))
    }
}

pub fn sort_matches(matches: &mut [Match]) {
    matches.sort_by(|a, b| a.ranking(b));
}

/// Merges result lists from several memories into one ranked list.
pub fn merge_matches<I>(lists: I) -> Vec<Match>
where
    I: IntoIterator<Item = Vec<Match>>,
{
    let mut merged: Vec<Match> = lists.into_iter().flatten().collect();
    sort_matches(&mut merged);
    merged
}
