use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use crate::core::error::{Error, ErrorKind, Result};

/// Frame header: payload length + crc32 of the payload, both little endian.
const HEADER_LEN: usize = 8;
const MAX_ENTRY_LEN: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    Immediate, // fsync after every append
    #[default]
    OnCommit,  // fsync on explicit sync only
}

/// Append-only write-ahead log of bincode-encoded entries.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    sync_mode: SyncMode,
    entries: usize,
    position: u64,
}

impl Wal {
    /// Opens (or creates) the log and returns every intact entry in it.
    ///
    /// A torn or corrupt tail, as left by a crash mid-append, is cut off so
    /// that new entries are appended right after the last good one.
    pub fn open<T: DeserializeOwned>(path: &Path, sync_mode: SyncMode) -> Result<(Self, Vec<T>)> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let (entries, good_len) = Self::decode_entries::<T>(&data);
        if good_len < data.len() {
            warn!(
                path = %path.display(),
                discarded = data.len() - good_len,
                "Truncating torn write-ahead log tail"
            );
            file.set_len(good_len as u64)?;
            file.sync_all()?;
        }
        debug!(path = %path.display(), entries = entries.len(), "Replayed write-ahead log");

        let wal = Wal {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            sync_mode,
            entries: entries.len(),
            position: good_len as u64,
        };
        Ok((wal, entries))
    }

    fn decode_entries<T: DeserializeOwned>(data: &[u8]) -> (Vec<T>, usize) {
        let mut entries = Vec::new();
        let mut offset = 0;

        while data.len() - offset >= HEADER_LEN {
            let len = u32::from_le_bytes([
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ]) as usize;
            let crc = u32::from_le_bytes([
                data[offset + 4],
                data[offset + 5],
                data[offset + 6],
                data[offset + 7],
            ]);
            let start = offset + HEADER_LEN;
            if len > MAX_ENTRY_LEN || data.len() - start < len {
                break;
            }
            let payload = &data[start..start + len];
            if crc32fast::hash(payload) != crc {
                break;
            }
            match bincode::deserialize::<T>(payload) {
                Ok(entry) => entries.push(entry),
                Err(_) => break,
            }
            offset = start + len;
        }

        (entries, offset)
    }

    pub fn append<T: Serialize>(&mut self, entry: &T) -> Result<()> {
        let data = bincode::serialize(entry)?;
        if data.len() > MAX_ENTRY_LEN {
            return Err(Error::new(
                ErrorKind::Storage,
                format!("WAL entry of {} bytes is too large", data.len()),
            ));
        }

        self.writer.write_all(&(data.len() as u32).to_le_bytes())?;
        self.writer.write_all(&crc32fast::hash(&data).to_le_bytes())?;
        self.writer.write_all(&data)?;

        self.entries += 1;
        self.position += (HEADER_LEN + data.len()) as u64;

        if self.sync_mode == SyncMode::Immediate {
            self.sync()?;
        }
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    /// Drops every entry; called once their effect is captured in a snapshot.
    pub fn reset(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().set_len(0)?;
        self.writer.get_ref().sync_all()?;
        self.entries = 0;
        self.position = 0;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
