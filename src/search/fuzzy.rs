use tracing::debug;
use crate::analysis::ngram::ngram_keys;
use crate::core::error::{Error, Result};
use crate::core::types::{SegmentText, Variant};
use crate::index::posting::collect_candidates;
use crate::scoring::similarity::similarity;
use crate::search::results::{sort_matches, Match};
use crate::storage::backend::StorageBackend;

/// Translation lookup: find `text` among the `src_lang` segments and return
/// the `tgt_lang` variants of the units found.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    pub src_lang: String,
    pub tgt_lang: String,
    pub min_similarity: u8,  // 100 asks for exact matches only
    pub case_sensitive: bool,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, src_lang: impl Into<String>, tgt_lang: impl Into<String>) -> Self {
        SearchQuery {
            text: text.into(),
            src_lang: src_lang.into(),
            tgt_lang: tgt_lang.into(),
            min_similarity: 70,
            case_sensitive: false,
        }
    }

    pub fn with_min_similarity(mut self, min_similarity: u8) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }
}

/// Runs `query` against one memory's backend; results come back ranked.
pub fn search(backend: &dyn StorageBackend, origin: &str, query: &SearchQuery) -> Result<Vec<Match>> {
    if query.min_similarity > 100 {
        return Err(Error::invalid(format!(
            "Minimum similarity must be between 0 and 100, got {}",
            query.min_similarity
        )));
    }

    let mut matches = if query.min_similarity == 100 {
        exact_search(backend, origin, query)?
    } else {
        fuzzy_search(backend, origin, query)?
    };
    sort_matches(&mut matches);

    debug!(
        memory = %origin,
        src = %query.src_lang,
        tgt = %query.tgt_lang,
        min_similarity = query.min_similarity,
        hits = matches.len(),
        "Search finished"
    );
    Ok(matches)
}

fn exact_search(backend: &dyn StorageBackend, origin: &str, query: &SearchQuery) -> Result<Vec<Match>> {
    let wanted = query.text.as_str();
    let wanted_lower = wanted.to_lowercase();

    let mut matches = Vec::new();
    for id in backend.exact_candidates(&query.src_lang, wanted)? {
        let Some(source) = backend.get_segment(&query.src_lang, &id)? else {
            continue;
        };
        // The bucket is a hash; always compare the real text
        let stored = source.plain.as_str();
        let equal = if query.case_sensitive {
            stored == wanted
        } else {
            stored.to_lowercase() == wanted_lower
        };
        if !equal {
            continue;
        }
        if let Some(hit) = build_match(backend, origin, query, &id, source, 100)? {
            matches.push(hit);
        }
    }
    Ok(matches)
}

fn fuzzy_search(backend: &dyn StorageBackend, origin: &str, query: &SearchQuery) -> Result<Vec<Match>> {
    let keys = ngram_keys(&query.text);
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    let candidates = collect_candidates(backend, &query.src_lang, &keys, query.min_similarity)?;
    let wanted = if query.case_sensitive {
        query.text.clone()
    } else {
        query.text.to_lowercase()
    };

    let mut matches = Vec::new();
    for id in candidates {
        let Some(source) = backend.get_segment(&query.src_lang, &id)? else {
            continue;
        };
        let score = if query.case_sensitive {
            similarity(&wanted, &source.plain)
        } else {
            similarity(&wanted, &source.plain.to_lowercase())
        };
        if score < query.min_similarity {
            continue;
        }
        if let Some(hit) = build_match(backend, origin, query, &id, source, score)? {
            matches.push(hit);
        }
    }
    Ok(matches)
}

/// `None` when the unit has no variant in the target language.
fn build_match(
    backend: &dyn StorageBackend,
    origin: &str,
    query: &SearchQuery,
    id: &str,
    source: SegmentText,
    score: u8,
) -> Result<Option<Match>> {
    let Some(target) = backend.get_segment(&query.tgt_lang, id)? else {
        return Ok(None);
    };
    let properties = backend.get_unit(id)?.unwrap_or_default();

    Ok(Some(Match {
        source: Variant::from_segment(&query.src_lang, source),
        target: Variant::from_segment(&query.tgt_lang, target),
        similarity: score,
        origin: origin.to_string(),
        properties,
    }))
}
