use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};
use crate::analysis::ngram::text_hash;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Properties, Registry, SegmentText};
use crate::storage::backend::StorageBackend;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tu (
    tuid TEXT PRIMARY KEY
);
CREATE TABLE IF NOT EXISTS tuprop (
    tuid TEXT NOT NULL,
    prop_type TEXT NOT NULL,
    content TEXT NOT NULL,
    PRIMARY KEY (tuid, prop_type)
);
CREATE TABLE IF NOT EXISTS tuv (
    tuid TEXT NOT NULL,
    lang TEXT NOT NULL,
    seg TEXT NOT NULL,
    pure_text TEXT NOT NULL,
    text_hash INTEGER NOT NULL,
    PRIMARY KEY (lang, tuid)
);
CREATE INDEX IF NOT EXISTS tuv_hash ON tuv (lang, text_hash);
CREATE TABLE IF NOT EXISTS registry (
    kind TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (kind, value)
);
CREATE TABLE IF NOT EXISTS index_tables (
    lang TEXT PRIMARY KEY,
    table_id INTEGER NOT NULL UNIQUE
);
";

fn fuzzy_table(table_id: i64) -> String {
    format!("fuzzy_{}", table_id)
}

struct RelationalState {
    conn: Connection,
    tables: HashMap<String, i64>,
}

impl RelationalState {
    fn index_table(&self, lang: &str) -> Option<String> {
        self.tables.get(lang).map(|id| fuzzy_table(*id))
    }

    /// Posting table of `lang`, created on first use.
    fn index_table_or_create(&mut self, lang: &str) -> Result<String> {
        if let Some(table) = self.index_table(lang) {
            return Ok(table);
        }

        let table_id: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(table_id), 0) + 1 FROM index_tables",
            [],
            |row| row.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO index_tables (lang, table_id) VALUES (?1, ?2)",
            params![lang, table_id],
        )?;
        let table = fuzzy_table(table_id);
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                ngram INTEGER NOT NULL,
                tuid TEXT NOT NULL,
                PRIMARY KEY (ngram, tuid)
            ) WITHOUT ROWID",
            table
        ))?;
        info!(lang = %lang, table = %table, "Created posting table");

        self.tables.insert(lang.to_string(), table_id);
        Ok(table)
    }

    fn unit_exists(&self, id: &str) -> Result<bool> {
        Ok(self
            .conn
            .query_row("SELECT 1 FROM tu WHERE tuid = ?1", params![id], |_| Ok(()))
            .optional()?
            .is_some())
    }

    fn properties(&self, id: &str) -> Result<Properties> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT prop_type, content FROM tuprop WHERE tuid = ?1")?;
        let properties = stmt
            .query_map(params![id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Properties, _>>()?;
        Ok(properties)
    }

    fn segment(&self, lang: &str, id: &str) -> Result<Option<SegmentText>> {
        Ok(self
            .conn
            .query_row(
                "SELECT pure_text, seg FROM tuv WHERE lang = ?1 AND tuid = ?2",
                params![lang, id],
                |row| {
                    Ok(SegmentText {
                        plain: row.get(0)?,
                        markup: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    fn ids(&self, sql: &str, lang: &str, key: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let ids = stmt
            .query_map(params![lang, key], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}

/// Relational backend: one SQLite database file per memory.
///
/// A transaction is always open; `commit` ends it and starts the next one,
/// so nothing written since the last commit survives a crash.
pub struct RelationalBackend {
    database: PathBuf,
    state: Mutex<Option<RelationalState>>,
}

impl RelationalBackend {
    pub fn open(database: &Path) -> Result<Self> {
        if let Some(parent) = database.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(database)?;
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA)?;

        let tables = {
            let mut stmt = conn.prepare("SELECT lang, table_id FROM index_tables")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<std::result::Result<HashMap<_, _>, _>>()?;
            rows
        };
        conn.execute_batch("BEGIN")?;

        info!(
            database = %database.display(),
            languages = tables.len(),
            "Opened relational backend"
        );

        Ok(RelationalBackend {
            database: database.to_path_buf(),
            state: Mutex::new(Some(RelationalState { conn, tables })),
        })
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut RelationalState) -> Result<T>) -> Result<T> {
        let mut guard = self.state.lock();
        match guard.as_mut() {
            Some(state) => f(state),
            None => Err(Error::new(
                ErrorKind::InvalidState,
                format!("Relational backend is closed: {}", self.database.display()),
            )),
        }
    }

    fn database_files(&self) -> Vec<PathBuf> {
        let name = self.database.as_os_str().to_string_lossy();
        vec![
            self.database.clone(),
            PathBuf::from(format!("{}-wal", name)),
            PathBuf::from(format!("{}-shm", name)),
        ]
    }
}

impl StorageBackend for RelationalBackend {
    fn kind(&self) -> &'static str {
        "Relational"
    }

    fn put_unit(&self, id: &str, properties: &Properties) -> Result<()> {
        self.with_state(|state| {
            state
                .conn
                .execute("INSERT OR IGNORE INTO tu (tuid) VALUES (?1)", params![id])?;
            state.conn.execute("DELETE FROM tuprop WHERE tuid = ?1", params![id])?;
            let mut stmt = state
                .conn
                .prepare_cached("INSERT INTO tuprop (tuid, prop_type, content) VALUES (?1, ?2, ?3)")?;
            for (key, value) in properties {
                stmt.execute(params![id, key, value])?;
            }
            Ok(())
        })
    }

    fn remove_unit(&self, id: &str) -> Result<Option<Properties>> {
        self.with_state(|state| {
            if !state.unit_exists(id)? {
                return Ok(None);
            }
            let properties = state.properties(id)?;
            state.conn.execute("DELETE FROM tuprop WHERE tuid = ?1", params![id])?;
            state.conn.execute("DELETE FROM tu WHERE tuid = ?1", params![id])?;
            Ok(Some(properties))
        })
    }

    fn get_unit(&self, id: &str) -> Result<Option<Properties>> {
        self.with_state(|state| {
            if !state.unit_exists(id)? {
                return Ok(None);
            }
            state.properties(id).map(Some)
        })
    }

    fn unit_ids(&self) -> Result<Vec<String>> {
        self.with_state(|state| {
            let mut stmt = state.conn.prepare("SELECT tuid FROM tu ORDER BY tuid")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(ids)
        })
    }

    fn register(&self, registry: Registry, value: &str) -> Result<()> {
        self.with_state(|state| {
            state.conn.execute(
                "INSERT OR IGNORE INTO registry (kind, value) VALUES (?1, ?2)",
                params![registry.as_str(), value],
            )?;
            Ok(())
        })
    }

    fn registry(&self, registry: Registry) -> Result<BTreeSet<String>> {
        self.with_state(|state| {
            let mut stmt = state
                .conn
                .prepare_cached("SELECT value FROM registry WHERE kind = ?1")?;
            let values = stmt
                .query_map(params![registry.as_str()], |row| row.get(0))?
                .collect::<std::result::Result<BTreeSet<String>, _>>()?;
            Ok(values)
        })
    }

    fn put_segment(&self, lang: &str, id: &str, segment: &SegmentText) -> Result<()> {
        self.with_state(|state| {
            state.conn.execute(
                "INSERT OR REPLACE INTO tuv (tuid, lang, seg, pure_text, text_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, lang, segment.markup, segment.plain, text_hash(&segment.plain) as i64],
            )?;
            Ok(())
        })
    }

    fn remove_segment(&self, lang: &str, id: &str) -> Result<Option<SegmentText>> {
        self.with_state(|state| {
            let removed = state.segment(lang, id)?;
            if removed.is_some() {
                state.conn.execute(
                    "DELETE FROM tuv WHERE lang = ?1 AND tuid = ?2",
                    params![lang, id],
                )?;
            }
            Ok(removed)
        })
    }

    fn get_segment(&self, lang: &str, id: &str) -> Result<Option<SegmentText>> {
        self.with_state(|state| state.segment(lang, id))
    }

    fn exact_candidates(&self, lang: &str, text: &str) -> Result<Vec<String>> {
        self.with_state(|state| {
            state.ids(
                "SELECT tuid FROM tuv WHERE lang = ?1 AND text_hash = ?2 ORDER BY tuid",
                lang,
                text_hash(text) as i64,
            )
        })
    }

    fn scan_segments(
        &self,
        lang: &str,
        visitor: &mut dyn FnMut(&str, &SegmentText) -> bool,
    ) -> Result<()> {
        self.with_state(|state| {
            let mut stmt = state
                .conn
                .prepare("SELECT tuid, pure_text, seg FROM tuv WHERE lang = ?1 ORDER BY tuid")?;
            let mut rows = stmt.query(params![lang])?;
            while let Some(row) = rows.next()? {
                let id: String = row.get(0)?;
                let segment = SegmentText {
                    plain: row.get(1)?,
                    markup: row.get(2)?,
                };
                if !visitor(&id, &segment) {
                    break;
                }
            }
            Ok(())
        })
    }

    fn add_postings(&self, lang: &str, id: &str, keys: &BTreeSet<u32>) -> Result<()> {
        self.with_state(|state| {
            let table = state.index_table_or_create(lang)?;
            let mut stmt = state.conn.prepare_cached(&format!(
                "INSERT OR IGNORE INTO {} (ngram, tuid) VALUES (?1, ?2)",
                table
            ))?;
            for key in keys {
                stmt.execute(params![*key as i64, id])?;
            }
            Ok(())
        })
    }

    fn remove_postings(&self, lang: &str, id: &str, keys: &BTreeSet<u32>) -> Result<()> {
        self.with_state(|state| {
            let Some(table) = state.index_table(lang) else {
                return Ok(());
            };
            let mut stmt = state.conn.prepare_cached(&format!(
                "DELETE FROM {} WHERE ngram = ?1 AND tuid = ?2",
                table
            ))?;
            for key in keys {
                stmt.execute(params![*key as i64, id])?;
            }
            Ok(())
        })
    }

    fn postings(&self, lang: &str, key: u32) -> Result<Vec<String>> {
        self.with_state(|state| {
            let Some(table) = state.index_table(lang) else {
                return Ok(Vec::new());
            };
            let mut stmt = state.conn.prepare_cached(&format!(
                "SELECT tuid FROM {} WHERE ngram = ?1 ORDER BY tuid",
                table
            ))?;
            let ids = stmt
                .query_map(params![key as i64], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(ids)
        })
    }

    fn commit(&self) -> Result<()> {
        self.with_state(|state| {
            state.conn.execute_batch("COMMIT; BEGIN")?;
            debug!(database = %self.database.display(), "Committed relational backend");
            Ok(())
        })
    }

    fn close(&self) -> Result<()> {
        let state = self.state.lock().take();
        if let Some(state) = state {
            state.conn.execute_batch("COMMIT")?;
            state.conn.close().map_err(|(_, err)| Error::from(err))?;
            info!(database = %self.database.display(), "Closed relational backend");
        }
        Ok(())
    }

    fn delete_all(&self) -> Result<()> {
        // Uncommitted work is rolled back when the connection drops
        drop(self.state.lock().take());
        for file in self.database_files() {
            if file.exists() {
                fs::remove_file(&file)?;
            }
        }
        info!(database = %self.database.display(), "Deleted relational backend");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn keys(values: &[u32]) -> BTreeSet<u32> {
        values.iter().copied().collect()
    }

    #[test]
    fn posting_tables_are_created_per_language() {
        let dir = TempDir::new().unwrap();
        let backend = RelationalBackend::open(&dir.path().join("tm.db")).unwrap();

        assert!(backend.postings("en", 1).unwrap().is_empty());
        backend.add_postings("en", "1", &keys(&[1, 2])).unwrap();
        backend.add_postings("fr", "1", &keys(&[1])).unwrap();
        backend.add_postings("en", "2", &keys(&[1])).unwrap();

        let tables = backend
            .with_state(|state| Ok(state.tables.clone()))
            .unwrap();
        assert_eq!(tables.len(), 2);
        assert_ne!(tables["en"], tables["fr"]);
        assert_eq!(backend.postings("en", 1).unwrap(), vec!["1", "2"]);
    }

    #[test]
    fn posting_tables_are_found_after_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tm.db");

        let backend = RelationalBackend::open(&path).unwrap();
        backend.add_postings("de", "7", &keys(&[42])).unwrap();
        backend.close().unwrap();

        let backend = RelationalBackend::open(&path).unwrap();
        assert_eq!(backend.postings("de", 42).unwrap(), vec!["7"]);
        backend.add_postings("it", "7", &keys(&[42])).unwrap();
        let tables = backend.with_state(|state| Ok(state.tables.clone())).unwrap();
        assert_eq!(tables.len(), 2);
    }

    #[test]
    fn delete_all_removes_database_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tm.db");

        let backend = RelationalBackend::open(&path).unwrap();
        backend.put_unit("1", &Properties::new()).unwrap();
        backend.commit().unwrap();
        backend.delete_all().unwrap();

        assert!(!path.exists());
        assert!(backend.unit_ids().is_err());
    }
}
