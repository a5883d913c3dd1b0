use std::collections::BTreeSet;
use crate::core::config::{BackendConfig, Config};
use crate::core::error::Result;
use crate::core::types::{Properties, Registry, SegmentText, TranslationUnit, Variant};
use crate::storage::embedded::EmbeddedBackend;
use crate::storage::relational::RelationalBackend;

/// Persistence strategy behind one memory: unit store, per-language segment
/// store with exact-match buckets, and per-language n-gram posting index.
///
/// Implementations must behave identically. Reads against a language that
/// has no storage yet return empty results; storage for a language is
/// created on its first write. Writes are visible to later reads on the same
/// handle immediately and survive a restart once `commit` returned.
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> &'static str;

    // Unit store
    fn put_unit(&self, id: &str, properties: &Properties) -> Result<()>;
    fn remove_unit(&self, id: &str) -> Result<Option<Properties>>;
    fn get_unit(&self, id: &str) -> Result<Option<Properties>>;
    /// Every stored unit id, ascending.
    fn unit_ids(&self) -> Result<Vec<String>>;

    // Registries
    fn register(&self, registry: Registry, value: &str) -> Result<()>;
    fn registry(&self, registry: Registry) -> Result<BTreeSet<String>>;

    // Segment store
    fn put_segment(&self, lang: &str, id: &str, segment: &SegmentText) -> Result<()>;
    fn remove_segment(&self, lang: &str, id: &str) -> Result<Option<SegmentText>>;
    fn get_segment(&self, lang: &str, id: &str) -> Result<Option<SegmentText>>;
    /// Ids whose plain text falls in the case-insensitive hash bucket of
    /// `text`. Collisions are possible; callers compare the real text.
    fn exact_candidates(&self, lang: &str, text: &str) -> Result<Vec<String>>;
    /// Visits the language's segments in ascending id order until the visitor
    /// returns `false`. The visitor must not call back into the backend.
    fn scan_segments(
        &self,
        lang: &str,
        visitor: &mut dyn FnMut(&str, &SegmentText) -> bool,
    ) -> Result<()>;

    fn segment_ids(&self, lang: &str) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        self.scan_segments(lang, &mut |id, _| {
            ids.push(id.to_string());
            true
        })?;
        Ok(ids)
    }

    // Fuzzy posting index
    fn add_postings(&self, lang: &str, id: &str, keys: &BTreeSet<u32>) -> Result<()>;
    fn remove_postings(&self, lang: &str, id: &str, keys: &BTreeSet<u32>) -> Result<()>;
    /// Ids posted under `key`, ascending.
    fn postings(&self, lang: &str, key: u32) -> Result<Vec<String>>;

    fn commit(&self) -> Result<()>;
    fn close(&self) -> Result<()>;
    /// Closes the backend and removes everything it stored.
    fn delete_all(&self) -> Result<()>;
}

/// Rebuilds a unit from its properties and its variants in `languages`.
pub fn load_unit(
    backend: &dyn StorageBackend,
    id: &str,
    languages: &BTreeSet<String>,
) -> Result<Option<TranslationUnit>> {
    let Some(properties) = backend.get_unit(id)? else {
        return Ok(None);
    };
    let mut unit = TranslationUnit::new(id, properties);
    for lang in languages {
        if let Some(segment) = backend.get_segment(lang, id)? {
            unit.variants.insert(lang.clone(), Variant::from_segment(lang, segment));
        }
    }
    Ok(Some(unit))
}

/// Opens the backend a memory's descriptor names.
pub fn open_backend(backend: &BackendConfig, config: &Config) -> Result<Box<dyn StorageBackend>> {
    match backend {
        BackendConfig::Embedded { path } => Ok(Box::new(EmbeddedBackend::open(path, config)?)),
        BackendConfig::Relational { database } => Ok(Box::new(RelationalBackend::open(database)?)),
    }
}
