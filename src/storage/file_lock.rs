use std::fs::{File, OpenOptions};
use std::path::Path;
use crate::core::error::{Error, ErrorKind, Result};

/// Exclusive advisory lock on a memory directory: one process at a time.
pub struct FileLock {
    pub file: File,
}

impl FileLock {
    pub fn acquire(lock_path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_EX, LOCK_NB};

            let fd = file.as_raw_fd();
            unsafe {
                if flock(fd, LOCK_EX | LOCK_NB) != 0 {
                    return Err(Error::new(
                        ErrorKind::InvalidState,
                        format!("Memory is locked by another process: {}", lock_path.display()),
                    ));
                }
            }
        }

        Ok(FileLock { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_UN};

            let fd = self.file.as_raw_fd();
            unsafe {
                flock(fd, LOCK_UN);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[test]
    fn second_lock_fails_until_released() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".lock");

        let first = FileLock::acquire(&path).unwrap();
        // flock locks belong to the open file description, so a second open conflicts
        let err = FileLock::acquire(&path).err().unwrap();
        assert_eq!(err.kind, ErrorKind::InvalidState);

        drop(first);
        assert!(FileLock::acquire(&path).is_ok());
    }
}
