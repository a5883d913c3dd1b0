use std::fs;
use std::path::PathBuf;
use crate::core::error::Result;

/// Directory structure of an embedded memory
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,      // Root directory, one per memory
    pub units_dir: PathBuf,     // Unit properties map
    pub registry_dir: PathBuf,  // Languages/projects/customers/subjects
    pub lang_dir: PathBuf,      // One subdirectory per language tag
}

impl StorageLayout {
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        let units_dir = base_dir.join("units");
        let registry_dir = base_dir.join("registry");
        let lang_dir = base_dir.join("lang");

        fs::create_dir_all(&units_dir)?;
        fs::create_dir_all(&registry_dir)?;
        fs::create_dir_all(&lang_dir)?;

        Ok(StorageLayout {
            base_dir,
            units_dir,
            registry_dir,
            lang_dir,
        })
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base_dir.join(".lock")
    }

    pub fn language_dir(&self, lang: &str) -> PathBuf {
        self.lang_dir.join(lang)
    }

    pub fn segments_dir(&self, lang: &str) -> PathBuf {
        self.language_dir(lang).join("segments")
    }

    pub fn buckets_dir(&self, lang: &str) -> PathBuf {
        self.language_dir(lang).join("buckets")
    }

    pub fn postings_dir(&self, lang: &str) -> PathBuf {
        self.language_dir(lang).join("postings")
    }

    /// Languages that already have storage on disk.
    pub fn languages(&self) -> Result<Vec<String>> {
        let mut languages = Vec::new();
        for entry in fs::read_dir(&self.lang_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    languages.push(name.to_string());
                }
            }
        }
        languages.sort();
        Ok(languages)
    }

    pub fn checkpoint_path(map_dir: &std::path::Path) -> PathBuf {
        map_dir.join("checkpoint.bin")
    }

    pub fn wal_path(map_dir: &std::path::Path) -> PathBuf {
        map_dir.join("wal.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lists_language_directories() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path().join("tm")).unwrap();
        assert!(layout.languages().unwrap().is_empty());

        fs::create_dir_all(layout.segments_dir("fr")).unwrap();
        fs::create_dir_all(layout.segments_dir("en-US")).unwrap();
        assert_eq!(layout.languages().unwrap(), vec!["en-US", "fr"]);
    }
}
