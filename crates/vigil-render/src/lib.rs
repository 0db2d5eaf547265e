//! Dashboard document rendering.
//!
//! `render` is deterministic and side-effect free: the same report always
//! yields byte-identical output, so the checked-in document stays
//! human-diffable across runs. Section order is fixed.

use vigil_core::{CheckStatus, Fixes, RunReport};

/// Document title line. The `vigil status` command keys off this to
/// recognize a dashboard it owns.
pub const TITLE: &str = "# Vigil Status Dashboard";

/// Escape free text so it cannot break a markdown table row.
fn escape_cell(text: &str) -> String {
    text.replace('\r', " ").replace('\n', " ").replace('|', "\\|")
}

fn unescape_cell(text: &str) -> String {
    text.replace("\\|", "|")
}

fn check_glyph(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Passed => "✅",
        CheckStatus::Failed => "❌",
        CheckStatus::Pending => "⏳",
    }
}

/// Render a run report into the dashboard document.
pub fn render(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str(TITLE);
    out.push_str("\n\n");
    out.push_str(&format!("- Generated: {}\n", report.generated_at));
    out.push_str(&format!(
        "- Overall: {} {}\n",
        report.overall_status.glyph(),
        report.overall_status.as_str()
    ));

    out.push_str("\n## Components\n\n");
    out.push_str("| Component | Status | Details |\n");
    out.push_str("|-----------|--------|--------|\n");
    for check in &report.checks {
        out.push_str(&format!(
            "| {} | {} {} | {} |\n",
            escape_cell(&check.name),
            check_glyph(check.status),
            check.status.as_str(),
            escape_cell(&check.details)
        ));
    }

    out.push_str("\n## Issues\n\n");
    if report.issues.is_empty() {
        out.push_str("No open issues.\n");
    } else {
        for issue in &report.issues {
            out.push_str(&format!(
                "- [{}] `{}` — {}\n",
                issue.severity.as_str(),
                issue.id,
                escape_cell(&issue.description)
            ));
        }
    }

    out.push_str("\n## Fixes\n\n");
    match &report.fixes {
        Fixes::None => out.push_str("No fixes needed.\n"),
        Fixes::List(fixes) => {
            for fix in fixes {
                out.push_str(&format!("- `{}` — {}\n", fix.id, escape_cell(&fix.description)));
            }
        }
    }

    if !report.next_steps.is_empty() {
        out.push_str("\n## Next Steps\n\n");
        for step in &report.next_steps {
            out.push_str(&format!("- {}\n", escape_cell(step)));
        }
    }

    out
}

/// Prepend a failure banner to the last successful document. A failed run
/// publishes this instead of a blank or partial dashboard.
pub fn render_failure_banner(last_good: &str, failed_at: &str, error: &str) -> String {
    format!(
        "> ⚠️ Run failed at {failed_at}: {error}\n> Showing the last successful report below.\n\n{last_good}"
    )
}

/// Parse the component table back out of a rendered document.
/// Inverse of `render` for the (name, status) pairs.
pub fn parse_component_table(doc: &str) -> Vec<(String, CheckStatus)> {
    let mut pairs = Vec::new();
    for line in doc.lines() {
        let line = line.trim();
        if !line.starts_with('|') {
            continue;
        }
        let cells: Vec<&str> = split_row(line);
        if cells.len() < 2 {
            continue;
        }
        let name = cells[0].trim();
        if name == "Component" || name.chars().all(|c| c == '-') {
            continue;
        }
        // Status cell is "<glyph> <keyword>"; the keyword is what we parse.
        let status_word = cells[1].split_whitespace().last().unwrap_or("");
        if let Some(status) = CheckStatus::parse(status_word) {
            pairs.push((unescape_cell(name), status));
        }
    }
    pairs
}

/// Split a table row on unescaped pipes, dropping the empty outer cells
/// produced by the leading and trailing `|`.
fn split_row(line: &str) -> Vec<&str> {
    let mut cells = Vec::new();
    let bytes = line.as_bytes();
    let mut start = 0;
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'|' && (i == 0 || bytes[i - 1] != b'\\') {
            cells.push(&line[start..i]);
            start = i + 1;
        }
    }
    cells.push(&line[start..]);
    if cells.first().is_some_and(|c| c.trim().is_empty()) {
        cells.remove(0);
    }
    if cells.last().is_some_and(|c| c.trim().is_empty()) {
        cells.pop();
    }
    cells
}
