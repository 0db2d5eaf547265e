use crate::types::{
    CheckStatus, ComponentCheck, Fix, Fixes, Issue, OverallStatus, RunReport, Severity,
};

fn new_run_id() -> String {
    format!("run_{}", ulid::Ulid::new().to_string().to_lowercase())
}

pub fn now_rfc3339() -> String {
    let now = time::OffsetDateTime::now_utc();
    now.format(&time::format_description::well_known::Rfc3339)
        .expect("RFC3339 formatting should not fail")
}

/// Derive the overall status for a run. Pure and total:
/// Failed if any check failed, Partial if none failed but at least one
/// is pending, Passed otherwise (including the empty check list).
pub fn compute_overall_status(checks: &[ComponentCheck]) -> OverallStatus {
    if checks.iter().any(|c| c.status == CheckStatus::Failed) {
        return OverallStatus::Failed;
    }
    if checks.iter().any(|c| c.status == CheckStatus::Pending) {
        return OverallStatus::Partial;
    }
    OverallStatus::Passed
}

/// Issues that appeared and issues that went away between two runs,
/// compared by identity (`Issue.id`). Order within each list follows
/// the detection order of the run the issue came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueDiff {
    pub new: Vec<Issue>,
    pub resolved: Vec<Issue>,
}

pub fn diff_issues(previous: &[Issue], current: &[Issue]) -> IssueDiff {
    let new = current
        .iter()
        .filter(|c| !previous.iter().any(|p| p.id == c.id))
        .cloned()
        .collect();
    let resolved = previous
        .iter()
        .filter(|p| !current.iter().any(|c| c.id == p.id))
        .cloned()
        .collect();
    IssueDiff { new, resolved }
}

/// Map resolved issues to fix records. An empty input yields the explicit
/// `Fixes::None` sentinel, never an empty list.
pub fn classify_fixes(resolved: &[Issue]) -> Fixes {
    if resolved.is_empty() {
        return Fixes::None;
    }
    let fixes = resolved
        .iter()
        .map(|issue| Fix {
            id: issue.id.clone(),
            description: format!("Resolved: {}", issue.description),
        })
        .collect();
    Fixes::List(fixes)
}

/// Synthesize an issue for a failed component so that a failure always
/// surfaces in the Issues section even when the remote tracker has no
/// matching entry. The id is stable across runs for the same component.
fn issue_for_failed_check(check: &ComponentCheck) -> Issue {
    let description = if check.details.is_empty() {
        format!("{} is failing", check.name)
    } else {
        format!("{}: {}", check.name, check.details)
    };
    Issue {
        id: format!("check:{}", check.name),
        description,
        severity: Severity::Error,
    }
}

/// Merge remote-reported issues with issues synthesized from failed checks.
/// Remote order comes first; synthesized entries are appended, skipping any
/// component already referenced by a remote issue id.
pub fn collect_issues(checks: &[ComponentCheck], remote_issues: &[Issue]) -> Vec<Issue> {
    let mut issues: Vec<Issue> = remote_issues.to_vec();
    for check in checks.iter().filter(|c| c.status == CheckStatus::Failed) {
        let id = format!("check:{}", check.name);
        if !issues.iter().any(|i| i.id == id) {
            issues.push(issue_for_failed_check(check));
        }
    }
    issues
}

fn next_steps_for(checks: &[ComponentCheck]) -> Vec<String> {
    let mut steps = Vec::new();
    for check in checks {
        match check.status {
            CheckStatus::Failed => steps.push(format!("Investigate failure: {}", check.name)),
            CheckStatus::Pending => {
                steps.push(format!("Follow up on pending component: {}", check.name))
            }
            CheckStatus::Passed => {}
        }
    }
    steps
}

/// Assemble the report for one run from fresh observations and the
/// previous run's issue list. `previous_issues` is empty on the first run.
pub fn build_report(
    checks: Vec<ComponentCheck>,
    remote_issues: Vec<Issue>,
    previous_issues: &[Issue],
) -> RunReport {
    let issues = collect_issues(&checks, &remote_issues);
    let diff = diff_issues(previous_issues, &issues);
    let fixes = classify_fixes(&diff.resolved);
    let overall_status = compute_overall_status(&checks);
    let next_steps = next_steps_for(&checks);
    RunReport {
        run_id: new_run_id(),
        generated_at: now_rfc3339(),
        overall_status,
        checks,
        issues,
        fixes,
        next_steps,
    }
}
