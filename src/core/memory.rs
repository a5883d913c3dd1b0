use std::collections::BTreeSet;
use std::sync::Arc;
use parking_lot::RwLock;
use tracing::{debug, info};
use crate::analysis::ngram::ngram_keys;
use crate::core::config::{BackendConfig, Config};
use crate::core::context::EngineContext;
use crate::core::error::Result;
use crate::core::types::{
    Registry, TranslationUnit, UnitRecord, CREATION_DATE, CREATION_ID, CUSTOMER, FLAG, FLAG_VALUE, PROJECT,
    SUBJECT, TUID,
};
use crate::core::utils::tmx_date;
use crate::parallel::indexer::{prepare_unit, ParallelIndexer, PreparedUnit};
use crate::search::concordance::{concordance, ConcordanceQuery};
use crate::search::fuzzy::{search, SearchQuery};
use crate::search::results::Match;
use crate::storage::backend::{load_unit, open_backend, StorageBackend};
use crate::transfer::export::{ExportHeader, ExportOptions, UnitSink};
use crate::transfer::import::ImportOptions;

/// Values stamped on units while an import runs.
#[derive(Debug, Default)]
struct ImportSession {
    date: Option<String>,
    options: ImportOptions,
}

impl ImportSession {
    fn start(options: ImportOptions) -> Self {
        ImportSession {
            date: Some(tmx_date()),
            options,
        }
    }

    fn overrides(&self) -> [(&'static str, Option<&String>); 3] {
        [
            (PROJECT, self.options.project.as_ref()),
            (CUSTOMER, self.options.customer.as_ref()),
            (SUBJECT, self.options.subject.as_ref()),
        ]
    }
}

fn non_empty(value: Option<&String>) -> Option<&String> {
    value.filter(|v| !v.trim().is_empty())
}

/// One opened translation memory: the matching engine over a storage backend.
pub struct Memory {
    name: RwLock<String>,
    backend: Box<dyn StorageBackend>,
    context: Arc<EngineContext>,
    indexer: ParallelIndexer,
}

impl Memory {
    pub fn new(name: impl Into<String>, backend: Box<dyn StorageBackend>, context: Arc<EngineContext>) -> Self {
        Memory {
            name: RwLock::new(name.into()),
            backend,
            context,
            indexer: ParallelIndexer::new(),
        }
    }

    pub fn open(
        name: impl Into<String>,
        backend: &BackendConfig,
        config: &Config,
        context: Arc<EngineContext>,
    ) -> Result<Self> {
        let name = name.into();
        let backend = open_backend(backend, config)?;
        info!(memory = %name, backend = backend.kind(), "Opened memory");
        Ok(Memory::new(name, backend, context))
    }

    /// Display name, reported as the origin of search matches.
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.write() = name.into();
    }

    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    /// Stores (or replaces) a unit and returns its id. Not committed.
    pub fn store_unit(&self, record: UnitRecord) -> Result<String> {
        let prepared = prepare_unit(record, &self.context.languages)?;
        self.apply_unit(prepared, &ImportSession::default())
    }

    fn apply_unit(&self, unit: PreparedUnit, session: &ImportSession) -> Result<String> {
        let id = match unit.id.filter(|id| !id.trim().is_empty()) {
            Some(id) => id,
            None => self.context.ids.next_id(),
        };

        let mut properties = unit.properties;
        properties.insert(TUID.to_string(), id.clone());
        if non_empty(properties.get(CREATION_DATE)).is_none() {
            let date = session.date.clone().unwrap_or_else(tmx_date);
            properties.insert(CREATION_DATE.to_string(), date);
        }
        if non_empty(properties.get(CREATION_ID)).is_none() {
            properties.insert(CREATION_ID.to_string(), self.context.user.clone());
        }
        for (key, value) in session.overrides() {
            if let Some(value) = non_empty(value) {
                properties.insert(key.to_string(), value.clone());
            }
        }

        for registry in [Registry::Projects, Registry::Customers, Registry::Subjects] {
            let value = registry.property().and_then(|key| non_empty(properties.get(key)));
            if let Some(value) = value {
                self.backend.register(registry, value)?;
            }
        }

        for variant in unit.variants {
            if let Some(old) = self.backend.remove_segment(&variant.lang, &id)? {
                self.backend.remove_postings(&variant.lang, &id, &ngram_keys(&old.plain))?;
            }
            if let Some(segment) = variant.segment {
                self.backend.register(Registry::Languages, &variant.lang)?;
                self.backend.put_segment(&variant.lang, &id, &segment)?;
                self.backend.add_postings(&variant.lang, &id, &variant.keys)?;
            }
        }

        self.backend.put_unit(&id, &properties)?;
        Ok(id)
    }

    /// Removes a unit with all its variants and postings.
    pub fn remove_unit(&self, id: &str) -> Result<bool> {
        let Some(unit) = self.get_unit(id)? else {
            return Ok(false);
        };
        for (lang, variant) in &unit.variants {
            self.backend.remove_segment(lang, id)?;
            self.backend.remove_postings(lang, id, &ngram_keys(&variant.plain_text))?;
        }
        self.backend.remove_unit(id)?;
        debug!(memory = %self.name(), unit = %id, "Removed unit");
        Ok(true)
    }

    pub fn get_unit(&self, id: &str) -> Result<Option<TranslationUnit>> {
        let languages = self.backend.registry(Registry::Languages)?;
        load_unit(self.backend(), id, &languages)
    }

    /// Marks a unit for review. Returns whether the unit exists.
    pub fn flag_unit(&self, id: &str) -> Result<bool> {
        let Some(mut properties) = self.backend.get_unit(id)? else {
            return Ok(false);
        };
        if !properties.contains_key(FLAG) {
            properties.insert(FLAG.to_string(), FLAG_VALUE.to_string());
            self.backend.put_unit(id, &properties)?;
        }
        Ok(true)
    }

    pub fn search(&self, query: &SearchQuery) -> Result<Vec<Match>> {
        search(self.backend(), &self.name(), query)
    }

    pub fn concordance(&self, query: &ConcordanceQuery) -> Result<Vec<TranslationUnit>> {
        concordance(self.backend(), query)
    }

    /// Imports every record and commits once.
    ///
    /// All records are read and prepared before the first write, so a
    /// malformed record rejects the import without touching the memory. A
    /// storage failure while writing leaves the units written so far in
    /// place, uncommitted.
    pub fn import_units<I>(&self, records: I, options: ImportOptions) -> Result<usize>
    where
        I: IntoIterator<Item = Result<UnitRecord>>,
    {
        let records = records.into_iter().collect::<Result<Vec<_>>>()?;
        info!(memory = %self.name(), units = records.len(), "Import started");

        let prepared = self.indexer.prepare_batch(records, &self.context.languages)?;

        let session = ImportSession::start(options);
        let imported = self.write_prepared(prepared, &session)?;
        info!(memory = %self.name(), imported, "Import finished");
        Ok(imported)
    }

    fn write_prepared(&self, prepared: Vec<PreparedUnit>, session: &ImportSession) -> Result<usize> {
        let mut imported = 0;
        for unit in prepared {
            self.apply_unit(unit, session)?;
            imported += 1;
        }
        self.backend.commit()?;
        Ok(imported)
    }

    /// Writes every unit, ascending by id, restricted to the requested
    /// languages. Units left without variants are skipped.
    pub fn export_units(&self, sink: &mut dyn UnitSink, options: &ExportOptions) -> Result<usize> {
        let registered = self.backend.registry(Registry::Languages)?;
        let languages: BTreeSet<String> = match &options.languages {
            Some(wanted) => wanted
                .iter()
                .filter_map(|tag| self.context.languages.normalize(tag))
                .filter(|lang| registered.contains(lang))
                .collect(),
            None => registered,
        };

        sink.begin(&ExportHeader::new(options.src_lang.clone(), options.properties.clone()))?;
        let mut exported = 0;
        for id in self.backend.unit_ids()? {
            let Some(unit) = load_unit(self.backend(), &id, &languages)? else {
                continue;
            };
            if unit.variants.is_empty() {
                continue;
            }
            sink.write_unit(&unit)?;
            exported += 1;
        }
        sink.finish()?;

        info!(memory = %self.name(), exported, "Export finished");
        Ok(exported)
    }

    pub fn registry(&self, registry: Registry) -> Result<BTreeSet<String>> {
        self.backend.registry(registry)
    }

    pub fn languages(&self) -> Result<BTreeSet<String>> {
        self.registry(Registry::Languages)
    }

    pub fn projects(&self) -> Result<BTreeSet<String>> {
        self.registry(Registry::Projects)
    }

    pub fn customers(&self) -> Result<BTreeSet<String>> {
        self.registry(Registry::Customers)
    }

    pub fn subjects(&self) -> Result<BTreeSet<String>> {
        self.registry(Registry::Subjects)
    }

    pub fn commit(&self) -> Result<()> {
        self.backend.commit()
    }

    pub fn close(&self) -> Result<()> {
        self.backend.close()?;
        info!(memory = %self.name(), "Closed memory");
        Ok(())
    }

    /// Closes the memory and removes all its stored data.
    pub fn delete(&self) -> Result<()> {
        self.backend.delete_all()
    }
}
