use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use crate::core::error::{Error, ErrorKind, Result};

const MAGIC: &[u8; 4] = b"TMCP";

/// Point-in-time image of a sorted-map file.
///
/// On disk: magic, crc32 of the body, then the body as lz4 compressed bincode.
/// Saving writes a temporary file and renames it over the old checkpoint, so
/// a crash leaves either the previous or the new image, never a mix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint<T> {
    pub timestamp: DateTime<Utc>,
    pub entry_count: usize,
    pub data: T,
}

impl<T> Checkpoint<T> {
    pub fn new(data: T, entry_count: usize) -> Self {
        Checkpoint {
            timestamp: Utc::now(),
            entry_count,
            data,
        }
    }
}

impl<T: Serialize> Checkpoint<T> {
    pub fn save(&self, path: &Path) -> Result<()> {
        let encoded = bincode::serialize(self)?;
        let body = lz4_flex::compress_prepend_size(&encoded);

        let tmp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(MAGIC)?;
            file.write_all(&crc32fast::hash(&body).to_le_bytes())?;
            file.write_all(&body)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

impl<T: DeserializeOwned> Checkpoint<T> {
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(path)?;
        if bytes.len() < 8 || &bytes[..4] != MAGIC {
            return Err(Error::new(
                ErrorKind::Storage,
                format!("Not a checkpoint file: {}", path.display()),
            ));
        }

        let crc = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let body = &bytes[8..];
        if crc32fast::hash(body) != crc {
            return Err(Error::new(
                ErrorKind::Storage,
                format!("Checkpoint checksum mismatch: {}", path.display()),
            ));
        }

        let encoded = lz4_flex::decompress_size_prepended(body).map_err(|e| {
            Error::new(ErrorKind::Storage, format!("Checkpoint decompression failed: {}", e))
        })?;
        Ok(Some(bincode::deserialize(&encoded)?))
    }
}
