use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{info, warn};
use crate::core::catalog::{MemoryCatalog, MemoryDescriptor};
use crate::core::config::{BackendConfig, Config};
use crate::core::context::EngineContext;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::memory::Memory;
use crate::core::types::{Registry, TranslationUnit, UnitRecord};
use crate::core::utils::tmx_date;
use crate::parallel::scheduler::TaskScheduler;
use crate::parallel::tasks::{TaskId, TaskOutput, TaskStatus};
use crate::search::concordance::ConcordanceQuery;
use crate::search::fuzzy::SearchQuery;
use crate::storage::backend::open_backend;
use crate::transfer::export::{ExportOptions, JsonLinesSink};
use crate::transfer::import::{ImportOptions, JsonLinesSource};

/// Memory ids name directories of embedded memories.
fn check_memory_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::invalid(format!("Invalid memory id: {:?}", id)))
    }
}

struct OpenMemory {
    memory: Arc<Memory>,
    pinned: bool,   // opened explicitly, stays open without leases
    leases: usize,  // operations currently using the memory
}

/// Open memories by id.
#[derive(Default)]
struct OpenRegistry {
    handles: RwLock<HashMap<String, OpenMemory>>,
}

impl OpenRegistry {
    fn is_open(&self, id: &str) -> bool {
        self.handles.read().contains_key(id)
    }

    fn leases(&self, id: &str) -> usize {
        self.handles.read().get(id).map(|handle| handle.leases).unwrap_or(0)
    }

    /// Returns the open memory, opening it with `opener` first if needed.
    fn acquire(
        &self,
        id: &str,
        pin: bool,
        lease: bool,
        opener: impl FnOnce() -> Result<Memory>,
    ) -> Result<Arc<Memory>> {
        let mut handles = self.handles.write();
        if let Some(handle) = handles.get_mut(id) {
            handle.pinned |= pin;
            if lease {
                handle.leases += 1;
            }
            return Ok(handle.memory.clone());
        }

        let memory = Arc::new(opener()?);
        handles.insert(
            id.to_string(),
            OpenMemory {
                memory: memory.clone(),
                pinned: pin,
                leases: usize::from(lease),
            },
        );
        Ok(memory)
    }

    /// Ends one lease; a memory nobody pinned is closed with its last lease.
    fn release(&self, id: &str) {
        let mut handles = self.handles.write();
        let Some(handle) = handles.get_mut(id) else {
            return;
        };
        handle.leases = handle.leases.saturating_sub(1);
        if handle.leases > 0 || handle.pinned {
            return;
        }
        if let Some(handle) = handles.remove(id) {
            if let Err(err) = handle.memory.close() {
                warn!(memory = %id, error = %err, "Failed to close memory");
            }
        }
    }

    /// Unpins the memory and closes it unless operations still use it.
    fn unpin(&self, id: &str) -> Result<()> {
        let mut handles = self.handles.write();
        let Some(handle) = handles.get_mut(id) else {
            return Ok(());
        };
        handle.pinned = false;
        if handle.leases > 0 {
            return Ok(());
        }
        match handles.remove(id) {
            Some(handle) => handle.memory.close(),
            None => Ok(()),
        }
    }

    fn take(&self, id: &str) -> Option<Arc<Memory>> {
        self.handles.write().remove(id).map(|handle| handle.memory)
    }

    fn drain(&self) -> Vec<(String, Arc<Memory>)> {
        self.handles
            .write()
            .drain()
            .map(|(id, handle)| (id, handle.memory))
            .collect()
    }
}

/// A memory held open for the duration of one operation.
struct MemoryLease {
    registry: Arc<OpenRegistry>,
    id: String,
    memory: Arc<Memory>,
}

impl Deref for MemoryLease {
    type Target = Memory;

    fn deref(&self) -> &Memory {
        &self.memory
    }
}

impl Drop for MemoryLease {
    fn drop(&mut self) {
        self.registry.release(&self.id);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryInfo {
    #[serde(flatten)]
    pub descriptor: MemoryDescriptor,
    pub is_open: bool,
}

/// Entry point for every operation on the memories of one work directory.
///
/// Lifecycle operations run on the caller's thread. Imports, exports,
/// searches, concordance scans, flagging and language listings run on the
/// task scheduler and report through [`MemoryManager::status`].
pub struct MemoryManager {
    config: Config,
    context: Arc<EngineContext>,
    catalog: Mutex<MemoryCatalog>,
    open: Arc<OpenRegistry>,
    scheduler: TaskScheduler,
}

impl MemoryManager {
    pub fn new(config: Config, context: Arc<EngineContext>) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.work_dir)?;
        let catalog = MemoryCatalog::load(&config.work_dir)?;
        let scheduler = TaskScheduler::new(&config)?;

        info!(work_dir = %config.work_dir.display(), memories = catalog.len(), "Memory manager ready");
        Ok(MemoryManager {
            config,
            context,
            catalog: Mutex::new(catalog),
            open: Arc::new(OpenRegistry::default()),
            scheduler,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.context
    }

    /// Registers a new memory and initializes its storage.
    ///
    /// Without an explicit id one is derived from the clock; without a
    /// backend the memory is embedded in a subdirectory of the work dir.
    pub fn create_memory(
        &self,
        id: Option<&str>,
        name: &str,
        backend: Option<BackendConfig>,
    ) -> Result<String> {
        if name.trim().is_empty() {
            return Err(Error::invalid("Memory name is required"));
        }
        let id = match id {
            Some(id) => id.to_string(),
            None => self.context.ids.next_id(),
        };
        check_memory_id(&id)?;

        let mut catalog = self.catalog.lock();
        if catalog.contains(&id) {
            return Err(Error::invalid(format!("Duplicate memory id: {}", id)));
        }

        let backend = backend.unwrap_or_else(|| BackendConfig::Embedded {
            path: self.config.work_dir.join(&id),
        });
        open_backend(&backend, &self.config)?.close()?;

        let descriptor = MemoryDescriptor {
            id: id.clone(),
            name: name.to_string(),
            backend,
            creation_date: tmx_date(),
            owner: self.context.user.clone(),
        };
        info!(memory = %id, name = %name, backend = descriptor.backend.type_name(), "Created memory");
        catalog.insert(descriptor)?;
        catalog.save()?;
        Ok(id)
    }

    fn open_descriptor(&self, descriptor: &MemoryDescriptor) -> Result<Memory> {
        Memory::open(
            descriptor.name.clone(),
            &descriptor.backend,
            &self.config,
            self.context.clone(),
        )
    }

    fn descriptor(&self, id: &str) -> Result<MemoryDescriptor> {
        self.catalog.lock().get(id).cloned()
    }

    /// Opens a memory and keeps it open until `close_memory`.
    pub fn open_memory(&self, id: &str) -> Result<()> {
        let descriptor = self.descriptor(id)?;
        self.open
            .acquire(id, true, false, || self.open_descriptor(&descriptor))?;
        Ok(())
    }

    /// Closes an explicitly opened memory. Running operations keep it open
    /// until the last one finishes.
    pub fn close_memory(&self, id: &str) -> Result<()> {
        self.descriptor(id)?;
        self.open.unpin(id)
    }

    pub fn is_open(&self, id: &str) -> bool {
        self.open.is_open(id)
    }

    pub fn list_memories(&self) -> Vec<MemoryInfo> {
        self.catalog
            .lock()
            .list()
            .into_iter()
            .map(|descriptor| MemoryInfo {
                is_open: self.open.is_open(&descriptor.id),
                descriptor,
            })
            .collect()
    }

    pub fn rename_memory(&self, id: &str, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::invalid("Memory name is required"));
        }
        let mut catalog = self.catalog.lock();
        catalog.rename(id, name)?;
        catalog.save()?;
        if let Some(handle) = self.open.handles.read().get(id) {
            handle.memory.set_name(name);
        }
        Ok(())
    }

    /// Removes a memory and all its data. Rejected while operations run on it.
    pub fn delete_memory(&self, id: &str) -> Result<()> {
        let mut catalog = self.catalog.lock();
        let descriptor = catalog.get(id)?.clone();
        if self.open.leases(id) > 0 {
            return Err(Error::new(
                ErrorKind::InvalidState,
                format!("Memory is busy: {}", id),
            ));
        }

        match self.open.take(id) {
            Some(memory) => memory.delete()?,
            None => open_backend(&descriptor.backend, &self.config)?.delete_all()?,
        }
        catalog.remove(id)?;
        catalog.save()?;
        info!(memory = %id, "Deleted memory");
        Ok(())
    }

    /// Closes every open memory, pinned or not.
    pub fn close_all(&self) -> Result<()> {
        let mut first_error = None;
        for (id, memory) in self.open.drain() {
            if let Err(err) = memory.close() {
                warn!(memory = %id, error = %err, "Failed to close memory");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn lease(&self, id: &str) -> Result<MemoryLease> {
        let descriptor = self.descriptor(id)?;
        let memory = self
            .open
            .acquire(id, false, true, || self.open_descriptor(&descriptor))?;
        Ok(MemoryLease {
            registry: self.open.clone(),
            id: id.to_string(),
            memory,
        })
    }

    /// Runs `job` on the scheduler with the memory held open.
    fn submit<F>(&self, id: &str, job: F) -> Result<TaskId>
    where
        F: FnOnce(&Memory) -> Result<TaskOutput> + Send + 'static,
    {
        let lease = self.lease(id)?;
        let task = self.scheduler.submit(move || job(&lease))?;
        info!(memory = %id, task = %task, "Task submitted");
        Ok(task)
    }

    pub fn status(&self, task: &TaskId) -> Result<TaskStatus> {
        self.scheduler.status(task)
    }

    pub fn wait(&self, task: &TaskId, timeout: std::time::Duration) -> Result<TaskStatus> {
        self.scheduler.wait(task, timeout)
    }

    /// Imports a JSON-lines file of unit records.
    pub fn import_file(&self, id: &str, path: &Path, options: ImportOptions) -> Result<TaskId> {
        if !path.is_file() {
            return Err(Error::not_found(format!("Import file not found: {}", path.display())));
        }
        let path = path.to_path_buf();
        self.submit(id, move |memory| {
            let source = JsonLinesSource::new(BufReader::new(File::open(&path)?));
            memory.import_units(source, options).map(TaskOutput::Imported)
        })
    }

    pub fn import_records(&self, id: &str, records: Vec<UnitRecord>, options: ImportOptions) -> Result<TaskId> {
        self.submit(id, move |memory| {
            memory
                .import_units(records.into_iter().map(Ok), options)
                .map(TaskOutput::Imported)
        })
    }

    /// Exports to a JSON-lines file.
    pub fn export(&self, id: &str, destination: PathBuf, options: ExportOptions) -> Result<TaskId> {
        self.submit(id, move |memory| {
            let mut sink = JsonLinesSink::new(BufWriter::new(File::create(&destination)?));
            memory.export_units(&mut sink, &options).map(TaskOutput::Exported)
        })
    }

    pub fn search(&self, id: &str, query: SearchQuery) -> Result<TaskId> {
        if query.min_similarity > 100 {
            return Err(Error::invalid(format!(
                "Minimum similarity must be between 0 and 100, got {}",
                query.min_similarity
            )));
        }
        self.submit(id, move |memory| memory.search(&query).map(TaskOutput::Matches))
    }

    pub fn concordance(&self, id: &str, query: ConcordanceQuery) -> Result<TaskId> {
        query.validate()?;
        self.submit(id, move |memory| memory.concordance(&query).map(TaskOutput::Units))
    }

    pub fn flag(&self, id: &str, unit_id: &str) -> Result<TaskId> {
        let unit_id = unit_id.to_string();
        self.submit(id, move |memory| {
            let flagged = memory.flag_unit(&unit_id)?;
            memory.commit()?;
            Ok(TaskOutput::Flagged(flagged))
        })
    }

    pub fn languages(&self, id: &str) -> Result<TaskId> {
        self.submit(id, |memory| memory.languages().map(TaskOutput::Languages))
    }

    /// Stores one unit and commits.
    pub fn store_unit(&self, id: &str, record: UnitRecord) -> Result<String> {
        let memory = self.lease(id)?;
        let unit_id = memory.store_unit(record)?;
        memory.commit()?;
        Ok(unit_id)
    }

    /// Removes one unit and commits. Returns whether the unit existed.
    pub fn remove_unit(&self, id: &str, unit_id: &str) -> Result<bool> {
        let memory = self.lease(id)?;
        let removed = memory.remove_unit(unit_id)?;
        memory.commit()?;
        Ok(removed)
    }

    pub fn get_unit(&self, id: &str, unit_id: &str) -> Result<Option<TranslationUnit>> {
        self.lease(id)?.get_unit(unit_id)
    }

    pub fn list_registry(&self, id: &str, registry: Registry) -> Result<BTreeSet<String>> {
        self.lease(id)?.registry(registry)
    }
}

impl Drop for MemoryManager {
    fn drop(&mut self) {
        self.scheduler.shutdown();
        if let Err(err) = self.close_all() {
            warn!(error = %err, "Failed to close memories on shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> MemoryManager {
        let config = Config {
            workers: 2,
            ..Config::with_work_dir(dir.path())
        };
        MemoryManager::new(config, Arc::new(EngineContext::default())).unwrap()
    }

    #[test]
    fn memory_ids_are_checked() {
        assert!(check_memory_id("tm-2024_01").is_ok());
        assert!(check_memory_id("").is_err());
        assert!(check_memory_id("../escape").is_err());
    }

    #[test]
    fn leases_close_transient_memories() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let id = manager.create_memory(Some("tm"), "Test", None).unwrap();

        {
            let lease = manager.lease(&id).unwrap();
            assert!(manager.is_open(&id));
            assert_eq!(manager.open.leases(&id), 1);
            drop(lease);
        }
        assert!(!manager.is_open(&id));

        manager.open_memory(&id).unwrap();
        drop(manager.lease(&id).unwrap());
        assert!(manager.is_open(&id));
        manager.close_memory(&id).unwrap();
        assert!(!manager.is_open(&id));
    }

    #[test]
    fn busy_memory_cannot_be_deleted() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let id = manager.create_memory(Some("tm"), "Test", None).unwrap();

        let lease = manager.lease(&id).unwrap();
        let err = manager.delete_memory(&id).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidState);
        drop(lease);

        manager.delete_memory(&id).unwrap();
        assert!(manager.list_memories().is_empty());
        assert!(!dir.path().join("tm").exists());
    }
}
