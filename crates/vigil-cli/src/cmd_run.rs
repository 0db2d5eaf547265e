use std::path::Path;

use vigil_ledger::Ledger;
use vigil_remote::HttpStatusSource;
use vigil_runner::{run_once, CancelToken};

use crate::config;

/// One pipeline invocation. Exit status signals the host scheduler:
/// returning an error makes the process exit non-zero without blocking
/// subsequent scheduled runs.
pub fn execute(repo_root: &Path) -> anyhow::Result<()> {
    let ledger = Ledger::open_path(repo_root)?;
    let workspace = config::load(&ledger.paths)?;

    let token = std::env::var("VIGIL_TOKEN").map_err(|_| {
        anyhow::anyhow!("VIGIL_TOKEN not set. Export a tracker token with read access.")
    })?;
    let source = HttpStatusSource::new(workspace.remote.clone(), token);

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())?;

    let outcome = run_once(&ledger, &source, &workspace.retry.policy(), &cancel);
    match outcome.report {
        Some(report) => {
            println!(
                "Run {} finished: {} ({} checks, {} issues)",
                report.run_id,
                report.overall_status.as_str(),
                report.checks.len(),
                report.issues.len()
            );
            println!("Dashboard written to {}", ledger.paths.dashboard_md.display());
            Ok(())
        }
        None => {
            let detail = outcome.error.unwrap_or_else(|| "unknown failure".to_string());
            anyhow::bail!("run failed: {detail}")
        }
    }
}
