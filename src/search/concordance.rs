use std::collections::BTreeSet;
use regex::Regex;
use crate::core::error::Result;
use crate::core::types::{Registry, TranslationUnit};
use crate::storage::backend::{load_unit, StorageBackend};

/// Text scan over every segment of one language.
#[derive(Debug, Clone)]
pub struct ConcordanceQuery {
    pub text: String,
    pub lang: String,
    pub limit: usize,  // 0 means no limit
    pub regex: bool,
    pub case_sensitive: bool,
}

impl ConcordanceQuery {
    pub fn new(text: impl Into<String>, lang: impl Into<String>) -> Self {
        ConcordanceQuery {
            text: text.into(),
            lang: lang.into(),
            limit: 0,
            regex: false,
            case_sensitive: false,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn regex(mut self, regex: bool) -> Self {
        self.regex = regex;
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Rejects patterns that don't compile.
    pub fn validate(&self) -> Result<()> {
        TextMatcher::new(self).map(|_| ())
    }
}

enum TextMatcher {
    /// Must match the whole plain text
    Pattern(Regex),
    Substring { needle: String, case_sensitive: bool },
}

impl TextMatcher {
    fn new(query: &ConcordanceQuery) -> Result<Self> {
        if query.regex {
            let pattern = Regex::new(&format!("^(?:{})$", query.text))?;
            return Ok(TextMatcher::Pattern(pattern));
        }
        let needle = if query.case_sensitive {
            query.text.clone()
        } else {
            query.text.to_lowercase()
        };
        Ok(TextMatcher::Substring {
            needle,
            case_sensitive: query.case_sensitive,
        })
    }

    fn is_match(&self, text: &str) -> bool {
        match self {
            TextMatcher::Pattern(pattern) => pattern.is_match(text),
            TextMatcher::Substring { needle, case_sensitive: true } => text.contains(needle.as_str()),
            TextMatcher::Substring { needle, case_sensitive: false } => {
                text.to_lowercase().contains(needle.as_str())
            }
        }
    }
}

/// Ids of the units whose `query.lang` text matches, in stored order.
pub fn concordance_ids(backend: &dyn StorageBackend, query: &ConcordanceQuery) -> Result<Vec<String>> {
    let matcher = TextMatcher::new(query)?;
    let mut ids = Vec::new();
    backend.scan_segments(&query.lang, &mut |id, segment| {
        if matcher.is_match(&segment.plain) {
            ids.push(id.to_string());
        }
        query.limit == 0 || ids.len() < query.limit
    })?;
    Ok(ids)
}

/// Units whose `query.lang` text matches, each with all its variants.
pub fn concordance(backend: &dyn StorageBackend, query: &ConcordanceQuery) -> Result<Vec<TranslationUnit>> {
    let ids = concordance_ids(backend, query)?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let languages: BTreeSet<String> = backend.registry(Registry::Languages)?;
    let mut units = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(unit) = load_unit(backend, &id, &languages)? {
            units.push(unit);
        }
    }
    Ok(units)
}
