use std::path::{Path, PathBuf};

/// All well-known paths under `.vigil/`.
#[derive(Debug, Clone)]
pub struct VigilPaths {
    pub root: PathBuf,
    pub vigil_dir: PathBuf,
    pub ledger_dir: PathBuf,
    pub runs_jsonl: PathBuf,
    pub dashboard_md: PathBuf,
    pub lock_file: PathBuf,
    pub config_json: PathBuf,
}

impl VigilPaths {
    /// Derive all paths from a repo root. Pure computation, no I/O.
    pub fn discover(repo_root: impl Into<PathBuf>) -> Self {
        let root = repo_root.into();
        let vigil_dir = root.join(".vigil");
        let ledger_dir = vigil_dir.join("ledger");
        Self {
            runs_jsonl: ledger_dir.join("runs.jsonl"),
            dashboard_md: root.join("STATUS.md"),
            lock_file: vigil_dir.join("LOCK"),
            config_json: vigil_dir.join("config.json"),
            ledger_dir,
            vigil_dir,
            root,
        }
    }

    /// Create all required directories. Idempotent.
    pub fn ensure_layout(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.ledger_dir)?;
        Ok(())
    }

    /// Check whether `.vigil/` exists.
    pub fn is_initialized(&self) -> bool {
        self.vigil_dir.is_dir()
    }

    /// Walk up from `start` looking for a directory containing `.vigil/`.
    /// Returns `None` if not found.
    pub fn find_root(start: &Path) -> Option<PathBuf> {
        let mut cur = start.to_path_buf();
        loop {
            if cur.join(".vigil").is_dir() {
                return Some(cur);
            }
            if !cur.pop() {
                return None;
            }
        }
    }
}
