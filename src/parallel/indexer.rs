use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use rayon::prelude::*;
use tracing::debug;
use crate::analysis::language::LanguageRegistry;
use crate::analysis::markup::extract_text;
use crate::analysis::ngram::ngram_keys;
use crate::core::error::{Error, Result};
use crate::core::types::{Properties, SegmentText, UnitRecord};

/// Variant ready to be stored: canonical language, extracted text and the
/// n-gram keys to post. `segment` is `None` when the plain text is blank;
/// such a variant still replaces what was stored for its language.
#[derive(Debug, Clone)]
pub struct PreparedVariant {
    pub lang: String,
    pub segment: Option<SegmentText>,
    pub keys: BTreeSet<u32>,
}

#[derive(Debug, Clone)]
pub struct PreparedUnit {
    pub id: Option<String>,
    pub properties: Properties,
    pub variants: Vec<PreparedVariant>,
}

/// CPU side of storing a unit. Variants with unknown language tags are
/// dropped; of several variants for one language the first wins.
pub fn prepare_unit(record: UnitRecord, languages: &LanguageRegistry) -> Result<PreparedUnit> {
    let mut seen = BTreeSet::new();
    let mut variants = Vec::with_capacity(record.variants.len());

    for variant in record.variants {
        let Some(lang) = languages.normalize(&variant.lang) else {
            debug!(lang = %variant.lang, "Skipping variant with invalid language tag");
            continue;
        };
        if !seen.insert(lang.clone()) {
            continue;
        }

        let plain = extract_text(&variant.markup).map_err(|e| {
            let unit = record.id.as_deref().unwrap_or("<new>");
            Error::new(e.kind, format!("Unit {} ({}): {}", unit, lang, e.context))
        })?;
        if plain.trim().is_empty() {
            variants.push(PreparedVariant {
                lang,
                segment: None,
                keys: BTreeSet::new(),
            });
            continue;
        }

        let keys = ngram_keys(&plain);
        variants.push(PreparedVariant {
            lang,
            segment: Some(SegmentText {
                plain,
                markup: variant.markup,
            }),
            keys,
        });
    }

    Ok(PreparedUnit {
        id: record.id,
        properties: record.properties,
        variants,
    })
}

/// Parallel unit preparation for bulk imports
pub struct ParallelIndexer {
    pub progress: Arc<AtomicUsize>,
}

impl Default for ParallelIndexer {
    fn default() -> Self {
        ParallelIndexer::new()
    }
}

impl ParallelIndexer {
    pub fn new() -> Self {
        ParallelIndexer {
            progress: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Units prepared by the current batch so far
    pub fn get_progress(&self) -> usize {
        self.progress.load(Ordering::Relaxed)
    }

    /// Prepares every record on the rayon pool, keeping input order. The
    /// first malformed record fails the whole batch.
    pub fn prepare_batch(
        &self,
        records: Vec<UnitRecord>,
        languages: &LanguageRegistry,
    ) -> Result<Vec<PreparedUnit>> {
        self.progress.store(0, Ordering::Relaxed);
        let total = records.len();

        let prepared = records
            .into_par_iter()
            .map(|record| {
                let unit = prepare_unit(record, languages);
                self.progress.fetch_add(1, Ordering::Relaxed);
                unit
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(units = total, "Prepared import batch");
        Ok(prepared)
    }
}
