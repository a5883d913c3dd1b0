use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fs;
use std::ops::RangeBounds;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use crate::core::error::Result;
use crate::storage::checkpoint::Checkpoint;
use crate::storage::layout::StorageLayout;
use crate::storage::wal::{SyncMode, Wal};

#[derive(Debug, Clone, Copy)]
pub struct MapOptions {
    pub sync_mode: SyncMode,
    pub compaction_threshold: usize,
}

impl Default for MapOptions {
    fn default() -> Self {
        MapOptions {
            sync_mode: SyncMode::OnCommit,
            compaction_threshold: 10_000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
enum MapOp<K, V> {
    Put(K, V),
    Delete(K),
}

/// Durable ordered map: the whole map lives in memory, mutations are applied
/// at once and held back until `commit` writes them to the log, and the log is
/// folded into a checkpoint once it grows past the compaction threshold.
/// Dropping the map without a commit loses everything since the last one.
pub struct SortedMapFile<K, V> {
    dir: PathBuf,
    map: BTreeMap<K, V>,
    wal: Wal,
    pending: Vec<MapOp<K, V>>,
    options: MapOptions,
}

impl<K, V> SortedMapFile<K, V>
where
    K: Ord + Clone + Serialize + DeserializeOwned,
    V: Clone + Serialize + DeserializeOwned,
{
    pub fn open(dir: &Path, options: MapOptions) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let mut map = Checkpoint::<BTreeMap<K, V>>::load(&StorageLayout::checkpoint_path(dir))?
            .map(|checkpoint| checkpoint.data)
            .unwrap_or_default();

        let (wal, ops) = Wal::open::<MapOp<K, V>>(&StorageLayout::wal_path(dir), options.sync_mode)?;
        let replayed = ops.len();
        for op in ops {
            match op {
                MapOp::Put(key, value) => {
                    map.insert(key, value);
                }
                MapOp::Delete(key) => {
                    map.remove(&key);
                }
            }
        }
        debug!(dir = %dir.display(), entries = map.len(), replayed, "Opened sorted map");

        Ok(SortedMapFile {
            dir: dir.to_path_buf(),
            map,
            wal,
            pending: Vec::new(),
            options,
        })
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.map.get(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.map.contains_key(key)
    }

    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        self.pending.push(MapOp::Put(key.clone(), value.clone()));
        Ok(self.map.insert(key, value))
    }

    pub fn remove(&mut self, key: &K) -> Result<Option<V>> {
        let removed = self.map.remove(key);
        if removed.is_some() {
            self.pending.push(MapOp::Delete(key.clone()));
        }
        Ok(removed)
    }

    pub fn range<R>(&self, range: R) -> btree_map::Range<'_, K, V>
    where
        R: RangeBounds<K>,
    {
        self.map.range(range)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, K, V> {
        self.map.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, K, V> {
        self.map.keys()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Mutations made since the last commit.
    pub fn uncommitted(&self) -> usize {
        self.pending.len()
    }

    /// Makes every mutation so far durable. A log that would grow past the
    /// compaction threshold is replaced by a checkpoint instead.
    pub fn commit(&mut self) -> Result<()> {
        if self.wal.len() + self.pending.len() > self.options.compaction_threshold {
            return self.compact();
        }
        for op in &self.pending {
            self.wal.append(op)?;
        }
        self.wal.sync()?;
        self.pending.clear();
        Ok(())
    }

    /// Writes the whole map as a checkpoint and empties the log. Commits
    /// pending mutations as a side effect.
    pub fn compact(&mut self) -> Result<()> {
        let logged = self.wal.len() + self.pending.len();
        Checkpoint::new(&self.map, self.map.len()).save(&StorageLayout::checkpoint_path(&self.dir))?;
        self.wal.reset()?;
        self.pending.clear();
        info!(dir = %self.dir.display(), entries = self.map.len(), logged, "Compacted sorted map");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(threshold: usize) -> MapOptions {
        MapOptions {
            sync_mode: SyncMode::OnCommit,
            compaction_threshold: threshold,
        }
    }

    #[test]
    fn committed_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("map");

        let mut map = SortedMapFile::<String, u32>::open(&path, options(100)).unwrap();
        map.insert("b".into(), 2).unwrap();
        map.insert("a".into(), 1).unwrap();
        map.insert("c".into(), 3).unwrap();
        map.remove(&"c".to_string()).unwrap();
        map.commit().unwrap();
        drop(map);

        let map = SortedMapFile::<String, u32>::open(&path, options(100)).unwrap();
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(map.get("b"), Some(&2));
    }

    #[test]
    fn compaction_folds_log_into_checkpoint() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("map");

        let mut map = SortedMapFile::<u32, String>::open(&path, options(3)).unwrap();
        for i in 0..5 {
            map.insert(i, format!("v{}", i)).unwrap();
        }
        map.commit().unwrap();
        assert!(StorageLayout::checkpoint_path(&path).exists());
        assert_eq!(fs::metadata(StorageLayout::wal_path(&path)).unwrap().len(), 0);

        map.insert(9, "late".into()).unwrap();
        map.commit().unwrap();
        drop(map);

        let map = SortedMapFile::<u32, String>::open(&path, options(3)).unwrap();
        assert_eq!(map.len(), 6);
        assert_eq!(map.get(&9).map(String::as_str), Some("late"));
    }

    #[test]
    fn removing_absent_key_logs_nothing() {
        let dir = TempDir::new().unwrap();
        let mut map = SortedMapFile::<u32, u32>::open(&dir.path().join("map"), options(10)).unwrap();
        assert_eq!(map.remove(&1).unwrap(), None);
        assert_eq!(map.uncommitted(), 0);
    }

    #[test]
    fn uncommitted_mutations_are_lost_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("map");

        let mut map = SortedMapFile::<String, u32>::open(&path, options(100)).unwrap();
        map.insert("kept".into(), 1).unwrap();
        map.commit().unwrap();
        map.insert("lost".into(), 2).unwrap();
        map.remove(&"kept".to_string()).unwrap();
        assert_eq!(map.uncommitted(), 2);
        assert!(map.get("lost").is_some());
        drop(map);

        let map = SortedMapFile::<String, u32>::open(&path, options(100)).unwrap();
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["kept"]);
    }

    #[test]
    fn tuple_keys_range() {
        let dir = TempDir::new().unwrap();
        let mut map = SortedMapFile::<(u32, String), ()>::open(&dir.path().join("map"), options(10)).unwrap();
        map.insert((1, "x".into()), ()).unwrap();
        map.insert((2, "a".into()), ()).unwrap();
        map.insert((2, "b".into()), ()).unwrap();
        map.insert((3, "a".into()), ()).unwrap();

        let ids: Vec<_> = map
            .range((2, String::new())..)
            .take_while(|((key, _), _)| *key == 2)
            .map(|((_, id), _)| id.clone())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
