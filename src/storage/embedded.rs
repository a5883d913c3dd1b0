use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use parking_lot::RwLock;
use tracing::{debug, info};
use crate::analysis::ngram::text_hash;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Properties, Registry, SegmentText};
use crate::storage::backend::StorageBackend;
use crate::storage::file_lock::FileLock;
use crate::storage::layout::StorageLayout;
use crate::storage::sorted_map::{MapOptions, SortedMapFile};

type KeyedIds = SortedMapFile<(u32, String), ()>;

/// Ids stored under `key` in a `(key, id)` set, ascending.
fn ids_under(map: &KeyedIds, key: u32) -> Vec<String> {
    map.range((key, String::new())..)
        .take_while(|((k, _), _)| *k == key)
        .map(|((_, id), _)| id.clone())
        .collect()
}

/// Language tags become directory names.
fn check_tag(lang: &str) -> Result<()> {
    let valid = !lang.is_empty()
        && lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::invalid(format!("Invalid language tag: {:?}", lang)))
    }
}

struct LanguageStore {
    segments: SortedMapFile<String, SegmentText>,
    buckets: KeyedIds,
    postings: KeyedIds,
}

impl LanguageStore {
    fn open(layout: &StorageLayout, lang: &str, options: MapOptions) -> Result<Self> {
        Ok(LanguageStore {
            segments: SortedMapFile::open(&layout.segments_dir(lang), options)?,
            buckets: SortedMapFile::open(&layout.buckets_dir(lang), options)?,
            postings: SortedMapFile::open(&layout.postings_dir(lang), options)?,
        })
    }

    fn commit(&mut self) -> Result<()> {
        self.segments.commit()?;
        self.buckets.commit()?;
        self.postings.commit()
    }
}

struct EmbeddedState {
    layout: StorageLayout,
    options: MapOptions,
    units: SortedMapFile<String, Properties>,
    registry: SortedMapFile<(Registry, String), ()>,
    languages: HashMap<String, LanguageStore>,
    _lock: FileLock,
}

impl EmbeddedState {
    fn language(&self, lang: &str) -> Option<&LanguageStore> {
        self.languages.get(lang)
    }

    fn language_mut(&mut self, lang: &str) -> Result<&mut LanguageStore> {
        check_tag(lang)?;
        if !self.languages.contains_key(lang) {
            let store = LanguageStore::open(&self.layout, lang, self.options)?;
            info!(path = %self.layout.base_dir.display(), lang = %lang, "Created language storage");
            self.languages.insert(lang.to_string(), store);
        }
        self.languages
            .get_mut(lang)
            .ok_or_else(|| Error::new(ErrorKind::Internal, format!("Language storage missing: {}", lang)))
    }

    fn uncommitted(&self) -> usize {
        self.units.uncommitted()
            + self.registry.uncommitted()
            + self
                .languages
                .values()
                .map(|store| store.segments.uncommitted() + store.buckets.uncommitted() + store.postings.uncommitted())
                .sum::<usize>()
    }

    fn commit(&mut self) -> Result<()> {
        self.units.commit()?;
        self.registry.commit()?;
        for store in self.languages.values_mut() {
            store.commit()?;
        }
        Ok(())
    }
}

/// Embedded backend: a directory of sorted-map files, locked against other
/// processes while open.
pub struct EmbeddedBackend {
    path: PathBuf,
    state: RwLock<Option<EmbeddedState>>,
}

impl EmbeddedBackend {
    pub fn open(path: &Path, config: &Config) -> Result<Self> {
        let options = MapOptions {
            sync_mode: config.sync_mode,
            compaction_threshold: config.compaction_threshold,
        };

        let layout = StorageLayout::new(path.to_path_buf())?;
        let lock = FileLock::acquire(&layout.lock_path())?;
        let units = SortedMapFile::open(&layout.units_dir, options)?;
        let registry = SortedMapFile::open(&layout.registry_dir, options)?;

        let mut languages = HashMap::new();
        for lang in layout.languages()? {
            let store = LanguageStore::open(&layout, &lang, options)?;
            languages.insert(lang, store);
        }

        info!(
            path = %path.display(),
            units = units.len(),
            languages = languages.len(),
            "Opened embedded backend"
        );

        Ok(EmbeddedBackend {
            path: path.to_path_buf(),
            state: RwLock::new(Some(EmbeddedState {
                layout,
                options,
                units,
                registry,
                languages,
                _lock: lock,
            })),
        })
    }

    fn read<T>(&self, f: impl FnOnce(&EmbeddedState) -> Result<T>) -> Result<T> {
        let guard = self.state.read();
        match guard.as_ref() {
            Some(state) => f(state),
            None => Err(self.closed()),
        }
    }

    fn write<T>(&self, f: impl FnOnce(&mut EmbeddedState) -> Result<T>) -> Result<T> {
        let mut guard = self.state.write();
        match guard.as_mut() {
            Some(state) => f(state),
            None => Err(self.closed()),
        }
    }

    fn closed(&self) -> Error {
        Error::new(
            ErrorKind::InvalidState,
            format!("Embedded backend is closed: {}", self.path.display()),
        )
    }
}

impl StorageBackend for EmbeddedBackend {
    fn kind(&self) -> &'static str {
        "Embedded"
    }

    fn put_unit(&self, id: &str, properties: &Properties) -> Result<()> {
        self.write(|state| {
            state.units.insert(id.to_string(), properties.clone())?;
            Ok(())
        })
    }

    fn remove_unit(&self, id: &str) -> Result<Option<Properties>> {
        self.write(|state| state.units.remove(&id.to_string()))
    }

    fn get_unit(&self, id: &str) -> Result<Option<Properties>> {
        self.read(|state| Ok(state.units.get(id).cloned()))
    }

    fn unit_ids(&self) -> Result<Vec<String>> {
        self.read(|state| Ok(state.units.keys().cloned().collect()))
    }

    fn register(&self, registry: Registry, value: &str) -> Result<()> {
        self.write(|state| {
            let key = (registry, value.to_string());
            if !state.registry.contains_key(&key) {
                state.registry.insert(key, ())?;
            }
            Ok(())
        })
    }

    fn registry(&self, registry: Registry) -> Result<BTreeSet<String>> {
        self.read(|state| {
            Ok(state
                .registry
                .range((registry, String::new())..)
                .take_while(|((kind, _), _)| *kind == registry)
                .map(|((_, value), _)| value.clone())
                .collect())
        })
    }

    fn put_segment(&self, lang: &str, id: &str, segment: &SegmentText) -> Result<()> {
        self.write(|state| {
            let store = state.language_mut(lang)?;
            if let Some(old) = store.segments.insert(id.to_string(), segment.clone())? {
                store.buckets.remove(&(text_hash(&old.plain), id.to_string()))?;
            }
            store.buckets.insert((text_hash(&segment.plain), id.to_string()), ())?;
            Ok(())
        })
    }

    fn remove_segment(&self, lang: &str, id: &str) -> Result<Option<SegmentText>> {
        self.write(|state| {
            let Some(store) = state.languages.get_mut(lang) else {
                return Ok(None);
            };
            let removed = store.segments.remove(&id.to_string())?;
            if let Some(old) = &removed {
                store.buckets.remove(&(text_hash(&old.plain), id.to_string()))?;
            }
            Ok(removed)
        })
    }

    fn get_segment(&self, lang: &str, id: &str) -> Result<Option<SegmentText>> {
        self.read(|state| Ok(state.language(lang).and_then(|store| store.segments.get(id).cloned())))
    }

    fn exact_candidates(&self, lang: &str, text: &str) -> Result<Vec<String>> {
        self.read(|state| {
            Ok(state
                .language(lang)
                .map(|store| ids_under(&store.buckets, text_hash(text)))
                .unwrap_or_default())
        })
    }

    fn scan_segments(
        &self,
        lang: &str,
        visitor: &mut dyn FnMut(&str, &SegmentText) -> bool,
    ) -> Result<()> {
        self.read(|state| {
            if let Some(store) = state.language(lang) {
                for (id, segment) in store.segments.iter() {
                    if !visitor(id, segment) {
                        break;
                    }
                }
            }
            Ok(())
        })
    }

    fn add_postings(&self, lang: &str, id: &str, keys: &BTreeSet<u32>) -> Result<()> {
        self.write(|state| {
            let store = state.language_mut(lang)?;
            for key in keys {
                let entry = (*key, id.to_string());
                if !store.postings.contains_key(&entry) {
                    store.postings.insert(entry, ())?;
                }
            }
            Ok(())
        })
    }

    fn remove_postings(&self, lang: &str, id: &str, keys: &BTreeSet<u32>) -> Result<()> {
        self.write(|state| {
            let Some(store) = state.languages.get_mut(lang) else {
                return Ok(());
            };
            for key in keys {
                store.postings.remove(&(*key, id.to_string()))?;
            }
            Ok(())
        })
    }

    fn postings(&self, lang: &str, key: u32) -> Result<Vec<String>> {
        self.read(|state| {
            Ok(state
                .language(lang)
                .map(|store| ids_under(&store.postings, key))
                .unwrap_or_default())
        })
    }

    fn commit(&self) -> Result<()> {
        self.write(|state| {
            let mutations = state.uncommitted();
            state.commit()?;
            debug!(path = %self.path.display(), mutations, "Committed embedded backend");
            Ok(())
        })
    }

    fn close(&self) -> Result<()> {
        let state = self.state.write().take();
        if let Some(mut state) = state {
            state.commit()?;
            info!(path = %self.path.display(), "Closed embedded backend");
        }
        Ok(())
    }

    fn delete_all(&self) -> Result<()> {
        // Drop the state first so the lock file is released before removal
        drop(self.state.write().take());
        if self.path.exists() {
            fs::remove_dir_all(&self.path)?;
        }
        info!(path = %self.path.display(), "Deleted embedded backend");
        Ok(())
    }
}
