use std::path::Path;

use vigil_ledger::Ledger;

/// `vigil history [--since TS] [--json]`: read API over the run ledger.
pub fn execute(repo_root: &Path, since: Option<&str>, json: bool) -> anyhow::Result<()> {
    let ledger = Ledger::open_path(repo_root)?;
    let runs = match since {
        Some(ts) => ledger.history(ts)?,
        None => ledger.iter_runs()?,
    };

    if runs.is_empty() {
        if !json {
            println!("No runs recorded.");
        }
        return Ok(());
    }

    for run in runs {
        if json {
            println!("{}", serde_json::to_string(&run)?);
        } else {
            println!(
                "{}  {}  {}  ({} checks, {} issues)",
                run.generated_at,
                run.run_id,
                run.overall_status.as_str(),
                run.checks.len(),
                run.issues.len()
            );
        }
    }
    Ok(())
}
