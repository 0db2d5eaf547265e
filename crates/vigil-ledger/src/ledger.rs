use crate::lock::LedgerLock;
use crate::paths::VigilPaths;
use std::io::{BufRead, Write};
use std::path::Path;
use vigil_core::RunReport;

/// Persistence failures surfaced to the runner. `Conflict` is the
/// optimistic-concurrency signal: the head advanced between the caller's
/// read and its append, so the caller must rebuild against the new head
/// and retry.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("ledger head moved to version {head}, expected {expected}")]
    Conflict { expected: u64, head: u64 },
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

/// The append-only run ledger backed by `runs.jsonl`.
/// Past entries never mutate; one serialized `RunReport` per line.
pub struct Ledger {
    pub paths: VigilPaths,
}

impl Ledger {
    /// Open an existing workspace. Fails if `.vigil/` does not exist.
    pub fn open(repo_root: impl Into<std::path::PathBuf>) -> anyhow::Result<Self> {
        let paths = VigilPaths::discover(repo_root);
        if !paths.is_initialized() {
            anyhow::bail!(
                "not a vigil workspace ({}/.vigil not found). Run `vigil init` first.",
                paths.root.display()
            );
        }
        Ok(Self { paths })
    }

    /// Convenience: open from a Path ref (avoids Into<PathBuf> ambiguity).
    pub fn open_path(repo_root: &Path) -> anyhow::Result<Self> {
        Self::open(repo_root.to_path_buf())
    }

    /// Current head version = number of appended entries.
    pub fn head_version(&self) -> anyhow::Result<u64> {
        if !self.paths.runs_jsonl.exists() {
            return Ok(0);
        }
        let content = std::fs::read_to_string(&self.paths.runs_jsonl)?;
        Ok(content.lines().filter(|l| !l.trim().is_empty()).count() as u64)
    }

    /// Append a run report at `expected_version`. Takes the writer lock,
    /// re-checks the head under it, and fails with `StoreError::Conflict`
    /// if another run appended in between. Returns the new head version.
    pub fn append_run(
        &self,
        report: &RunReport,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let _lock = LedgerLock::acquire(&self.paths)?;
        self.append_locked(report, expected_version)
    }

    /// Append the report and publish the rendered document under one
    /// writer lock. Holding the lock across both writes keeps the
    /// published document at the ledger head: a writer that lost the
    /// append race cannot overwrite a newer document afterwards.
    pub fn append_and_publish(
        &self,
        report: &RunReport,
        doc: &str,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let _lock = LedgerLock::acquire(&self.paths)?;
        let version = self.append_locked(report, expected_version)?;
        crate::document::write_report_document(&self.paths, doc)?;
        Ok(version)
    }

    fn append_locked(&self, report: &RunReport, expected_version: u64) -> Result<u64, StoreError> {
        let head = self.head_version()?;
        if head != expected_version {
            tracing::warn!(expected = expected_version, head, "ledger append conflict");
            return Err(StoreError::Conflict {
                expected: expected_version,
                head,
            });
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.paths.runs_jsonl)
            .map_err(anyhow::Error::from)?;
        // One write call per entry: lock-free readers never see a torn line.
        let mut line = serde_json::to_string(report).map_err(anyhow::Error::from)?;
        line.push('\n');
        file.write_all(line.as_bytes()).map_err(anyhow::Error::from)?;
        file.sync_all().map_err(anyhow::Error::from)?;
        Ok(head + 1)
    }

    /// Iterate over all run reports in append order.
    pub fn iter_runs(&self) -> anyhow::Result<Vec<RunReport>> {
        if !self.paths.runs_jsonl.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.paths.runs_jsonl)?;
        let reader = std::io::BufReader::new(file);
        let mut runs = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let report: RunReport = serde_json::from_str(&line)?;
            runs.push(report);
        }
        Ok(runs)
    }

    /// The most recent run report, or `None` if the ledger is empty.
    pub fn latest(&self) -> anyhow::Result<Option<RunReport>> {
        Ok(self.iter_runs()?.pop())
    }

    /// Run reports generated at or after `since` (RFC 3339). Both sides
    /// are parsed and compared as instants; string comparison would
    /// misorder timestamps with mixed sub-second precision.
    pub fn history(&self, since: &str) -> anyhow::Result<Vec<RunReport>> {
        let cutoff = parse_rfc3339(since)
            .map_err(|e| anyhow::anyhow!("invalid since timestamp {since:?}: {e}"))?;
        let mut out = Vec::new();
        for run in self.iter_runs()? {
            let generated = parse_rfc3339(&run.generated_at)
                .map_err(|e| anyhow::anyhow!("bad generated_at on {}: {e}", run.run_id))?;
            if generated >= cutoff {
                out.push(run);
            }
        }
        Ok(out)
    }
}

fn parse_rfc3339(ts: &str) -> Result<time::OffsetDateTime, time::error::Parse> {
    time::OffsetDateTime::parse(ts, &time::format_description::well_known::Rfc3339)
}

/// Initialize a new workspace from `VigilPaths`. Used by `vigil init`.
pub fn init_workspace(paths: &VigilPaths) -> anyhow::Result<()> {
    paths.ensure_layout()?;
    Ok(())
}
