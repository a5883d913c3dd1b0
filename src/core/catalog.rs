use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::core::config::BackendConfig;
use crate::core::error::{Error, Result};

pub const CATALOG_FILE: &str = "memories.json";

/// Catalog entry of one memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryDescriptor {
    pub id: String,
    pub name: String,
    pub backend: BackendConfig,
    pub creation_date: String,
    pub owner: String,
}

/// The registry of known memories, persisted as pretty-printed JSON.
#[derive(Debug)]
pub struct MemoryCatalog {
    path: PathBuf,
    memories: BTreeMap<String, MemoryDescriptor>,
}

impl MemoryCatalog {
    /// Loads the catalog in `work_dir`; a missing file is an empty catalog.
    pub fn load(work_dir: &Path) -> Result<Self> {
        let path = work_dir.join(CATALOG_FILE);
        let memories = if path.exists() {
            let data = fs::read(&path)?;
            serde_json::from_slice(&data)?
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), memories = memories.len(), "Loaded memory catalog");
        Ok(MemoryCatalog { path, memories })
    }

    pub fn save(&self) -> Result<()> {
        let data = serde_json::to_vec_pretty(&self.memories)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&MemoryDescriptor> {
        self.memories
            .get(id)
            .ok_or_else(|| Error::not_found(format!("Unknown memory: {}", id)))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.memories.contains_key(id)
    }

    pub fn insert(&mut self, descriptor: MemoryDescriptor) -> Result<()> {
        if self.memories.contains_key(&descriptor.id) {
            return Err(Error::invalid(format!("Duplicate memory id: {}", descriptor.id)));
        }
        self.memories.insert(descriptor.id.clone(), descriptor);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<MemoryDescriptor> {
        self.memories
            .remove(id)
            .ok_or_else(|| Error::not_found(format!("Unknown memory: {}", id)))
    }

    pub fn rename(&mut self, id: &str, name: &str) -> Result<()> {
        let descriptor = self
            .memories
            .get_mut(id)
            .ok_or_else(|| Error::not_found(format!("Unknown memory: {}", id)))?;
        descriptor.name = name.to_string();
        Ok(())
    }

    pub fn list(&self) -> Vec<MemoryDescriptor> {
        self.memories.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use tempfile::TempDir;

    fn descriptor(id: &str) -> MemoryDescriptor {
        MemoryDescriptor {
            id: id.to_string(),
            name: format!("Memory {}", id),
            backend: BackendConfig::Embedded {
                path: PathBuf::from(format!("/data/{}", id)),
            },
            creation_date: "20240101T000000Z".to_string(),
            owner: "tester".to_string(),
        }
    }

    #[test]
    fn saved_catalog_loads_back() {
        let dir = TempDir::new().unwrap();
        let mut catalog = MemoryCatalog::load(dir.path()).unwrap();
        assert!(catalog.is_empty());

        catalog.insert(descriptor("a")).unwrap();
        catalog.insert(descriptor("b")).unwrap();
        catalog.rename("b", "Renamed").unwrap();
        catalog.save().unwrap();

        let loaded = MemoryCatalog::load(dir.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get("b").unwrap().name, "Renamed");
        assert_eq!(loaded.get("a").unwrap(), &descriptor("a"));
    }

    #[test]
    fn duplicate_and_unknown_ids() {
        let dir = TempDir::new().unwrap();
        let mut catalog = MemoryCatalog::load(dir.path()).unwrap();
        catalog.insert(descriptor("a")).unwrap();

        assert_eq!(catalog.insert(descriptor("a")).unwrap_err().kind, ErrorKind::InvalidArgument);
        assert_eq!(catalog.get("zzz").unwrap_err().kind, ErrorKind::NotFound);
        assert_eq!(catalog.remove("zzz").unwrap_err().kind, ErrorKind::NotFound);
    }

    #[test]
    fn unknown_backend_type_fails_to_load() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CATALOG_FILE),
            r#"{"x":{"id":"x","name":"X","backend":{"type":"Oracle"},"creation_date":"","owner":""}}"#,
        )
        .unwrap();
        let err = MemoryCatalog::load(dir.path()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
    }
}
