use crate::paths::VigilPaths;
use fs2::FileExt;
use std::fs::{File, OpenOptions};

/// Exclusive append lock backed by `.vigil/LOCK`.
/// Serializes ledger writers; released on drop.
pub struct LedgerLock {
    _file: File,
}

impl LedgerLock {
    /// Acquire the lock, blocking until the current holder releases it.
    pub fn acquire(paths: &VigilPaths) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&paths.lock_file)
            .map_err(|e| {
                anyhow::anyhow!("cannot open lock file {}: {}", paths.lock_file.display(), e)
            })?;
        file.lock_exclusive()?;
        Ok(Self { _file: file })
    }

    /// Try to acquire without blocking. Errors if another writer holds it.
    pub fn try_acquire(paths: &VigilPaths) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&paths.lock_file)?;
        file.try_lock_exclusive().map_err(|_| {
            anyhow::anyhow!(
                "ledger is locked by another process ({})",
                paths.lock_file.display()
            )
        })?;
        Ok(Self { _file: file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_acquire_fails_while_held() {
        let tmp = tempfile::tempdir().unwrap();
        let p = VigilPaths::discover(tmp.path());
        p.ensure_layout().unwrap();

        let lock = LedgerLock::try_acquire(&p).unwrap();
        assert!(LedgerLock::try_acquire(&p).is_err());
        drop(lock);
        let _lock2 = LedgerLock::try_acquire(&p).unwrap();
    }
}
