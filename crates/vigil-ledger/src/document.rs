use crate::paths::VigilPaths;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Atomic write: write to a temp file in the same dir, then rename.
/// A concurrent reader sees either the old document or the new one,
/// never a partial write.
pub fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("no parent dir for {}", path.display()))?;
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

/// Publish the rendered dashboard document.
pub fn write_report_document(paths: &VigilPaths, doc: &str) -> anyhow::Result<()> {
    write_atomic(&paths.dashboard_md, doc.as_bytes())
}

/// Read the current dashboard document, or `None` if never published.
pub fn read_report_document(paths: &VigilPaths) -> anyhow::Result<Option<String>> {
    if !paths.dashboard_md.exists() {
        return Ok(None);
    }
    Ok(Some(fs::read_to_string(&paths.dashboard_md)?))
}
