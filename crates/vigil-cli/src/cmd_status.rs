use std::path::Path;

use vigil_ledger::{read_report_document, Ledger};
use vigil_render::parse_component_table;

pub fn execute(repo_root: &Path) -> anyhow::Result<()> {
    let ledger = Ledger::open_path(repo_root)?;

    let Some(latest) = ledger.latest()? else {
        println!("No runs recorded yet. Run `vigil run` first.");
        return Ok(());
    };

    println!(
        "Overall: {} {}",
        latest.overall_status.glyph(),
        latest.overall_status.as_str()
    );
    println!("Generated: {}", latest.generated_at);
    println!("Run: {}", latest.run_id);
    for check in &latest.checks {
        println!("  {} — {}", check.name, check.status.as_str());
    }
    if !latest.issues.is_empty() {
        println!("Open issues: {}", latest.issues.len());
    }

    // Cross-check the published dashboard against the ledger head.
    if let Some(doc) = read_report_document(&ledger.paths)? {
        let published = parse_component_table(&doc);
        let expected: Vec<(String, vigil_core::CheckStatus)> = latest
            .checks
            .iter()
            .map(|c| (c.name.clone(), c.status))
            .collect();
        if published != expected {
            println!(
                "Note: {} is out of sync with the ledger (last run may have failed).",
                ledger.paths.dashboard_md.display()
            );
        }
    } else {
        println!("Dashboard not published yet.");
    }

    Ok(())
}
