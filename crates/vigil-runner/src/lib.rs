//! One invocation of the aggregation pipeline.
//!
//! `run_once` drives the phases Idle → Fetching → Aggregating → Rendering
//! → Persisting → Done, with Failed terminal from any of them. Transient
//! remote failures are retried with exponential backoff; ledger append
//! conflicts are retried by re-fetching and re-aggregating against the
//! fresh head. A failed or cancelled run never leaves a partial write.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use vigil_core::{build_report, now_rfc3339, ComponentCheck, Issue, RunReport};
use vigil_ledger::{write_report_document, Ledger, StoreError};
use vigil_remote::{RemoteError, StatusSource};
use vigil_render::{render, render_failure_banner};

// ── State machine ──

/// Pipeline phases. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Fetching,
    Aggregating,
    Rendering,
    Persisting,
    Done,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Fetching => "fetching",
            RunState::Aggregating => "aggregating",
            RunState::Rendering => "rendering",
            RunState::Persisting => "persisting",
            RunState::Done => "done",
            RunState::Failed => "failed",
        }
    }
}

/// Bounded retry budgets. `backoff_base` is injectable so tests do not
/// sleep for real.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub fetch_attempts: u32,
    pub persist_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            fetch_attempts: 3,
            persist_attempts: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// Cooperative cancellation flag, shared with the host's signal handler.
/// A cancelled run abandons before the persist write phase.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What one invocation produced. `error` carries the human-readable
/// failure description the host reports and the next run can diff against.
#[derive(Debug)]
pub struct RunOutcome {
    pub state: RunState,
    pub report: Option<RunReport>,
    pub error: Option<String>,
}

impl RunOutcome {
    pub fn is_done(&self) -> bool {
        self.state == RunState::Done
    }

    /// Exit status for the host scheduler: 0 = Done, 1 = Failed.
    pub fn exit_code(&self) -> i32 {
        if self.is_done() {
            0
        } else {
            1
        }
    }

    fn done(report: RunReport) -> Self {
        Self {
            state: RunState::Done,
            report: Some(report),
            error: None,
        }
    }

    fn failed(phase: RunState, error: String) -> Self {
        Self {
            state: RunState::Failed,
            report: None,
            error: Some(format!("{} phase: {error}", phase.as_str())),
        }
    }
}

// ── Phases ──

/// Fetch checks and open issues, retrying `Unavailable` with exponential
/// backoff. `Malformed` fails fast: the payload will not improve on retry.
fn fetch_all<S: StatusSource>(
    source: &S,
    policy: &RetryPolicy,
) -> Result<(Vec<ComponentCheck>, Vec<Issue>), RemoteError> {
    let mut attempt = 1u32;
    loop {
        let result = source
            .fetch_component_statuses()
            .and_then(|checks| source.fetch_open_issues().map(|issues| (checks, issues)));
        match result {
            Ok(fetched) => return Ok(fetched),
            Err(RemoteError::Unavailable(msg)) if attempt < policy.fetch_attempts => {
                let delay = policy.backoff_base * 2u32.saturating_pow(attempt - 1);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %msg,
                    "remote unavailable, backing off"
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn aggregate(
    ledger: &Ledger,
    checks: Vec<ComponentCheck>,
    remote_issues: Vec<Issue>,
) -> anyhow::Result<RunReport> {
    let previous_issues = match ledger.latest()? {
        Some(previous) => previous.issues,
        None => Vec::new(),
    };
    Ok(build_report(checks, remote_issues, &previous_issues))
}

/// Append the report at `expected_version` and publish the document in
/// one locked step, so the published dashboard always matches the ledger
/// head. On `Conflict` the report is rebuilt against the fresh base
/// (re-fetch, re-aggregate) and the append retried against the new head,
/// bounded by the persist budget.
fn persist_phase<S: StatusSource>(
    ledger: &Ledger,
    source: &S,
    policy: &RetryPolicy,
    mut report: RunReport,
    mut doc: String,
    mut expected_version: u64,
) -> anyhow::Result<RunReport> {
    for attempt in 1..=policy.persist_attempts {
        match ledger.append_and_publish(&report, &doc, expected_version) {
            Ok(version) => {
                tracing::info!(version, run_id = %report.run_id, "run persisted");
                return Ok(report);
            }
            Err(StoreError::Conflict { head, .. }) => {
                if attempt == policy.persist_attempts {
                    anyhow::bail!("append conflict persisted through {attempt} attempts");
                }
                tracing::warn!(attempt, head, "ledger conflict, rebuilding against new head");
                let (checks, remote_issues) = fetch_all(source, policy)
                    .map_err(|e| anyhow::anyhow!("re-fetch after conflict: {e}"))?;
                report = aggregate(ledger, checks, remote_issues)?;
                doc = render(&report);
                expected_version = head;
            }
            Err(StoreError::Io(e)) => return Err(e),
        }
    }
    unreachable!("persist loop always returns or bails")
}

/// Publish the last successful report with a failure banner on top.
/// When no successful run exists yet, the existing document (if any) is
/// left untouched; a failed run never publishes a blank dashboard.
fn publish_failure_banner(ledger: &Ledger, error: &str) {
    match ledger.latest() {
        Ok(Some(last)) => {
            let doc = render_failure_banner(&render(&last), &now_rfc3339(), error);
            if let Err(e) = write_report_document(&ledger.paths, &doc) {
                tracing::error!(error = %e, "failed to publish failure banner");
            }
        }
        Ok(None) => {}
        Err(e) => tracing::error!(error = %e, "cannot read ledger for failure banner"),
    }
}

// ── Entry point ──

/// Record a phase transition in the trace stream.
fn advance(state: &mut RunState, to: RunState) {
    tracing::debug!(from = state.as_str(), to = to.as_str(), "phase transition");
    *state = to;
}

/// Execute one run against the ledger. Returns the terminal outcome;
/// never panics on remote or persistence failure.
pub fn run_once<S: StatusSource>(
    ledger: &Ledger,
    source: &S,
    policy: &RetryPolicy,
    cancel: &CancelToken,
) -> RunOutcome {
    let mut state = RunState::Idle;

    advance(&mut state, RunState::Fetching);
    let (checks, remote_issues) = match fetch_all(source, policy) {
        Ok(fetched) => fetched,
        Err(e) => {
            let outcome = RunOutcome::failed(state, e.to_string());
            publish_failure_banner(ledger, outcome.error.as_deref().unwrap_or_default());
            return outcome;
        }
    };

    // Pure apart from reading the previous entry.
    advance(&mut state, RunState::Aggregating);
    let report = match aggregate(ledger, checks, remote_issues) {
        Ok(report) => report,
        Err(e) => {
            let outcome = RunOutcome::failed(state, e.to_string());
            publish_failure_banner(ledger, outcome.error.as_deref().unwrap_or_default());
            return outcome;
        }
    };

    advance(&mut state, RunState::Rendering);
    let doc = render(&report);

    advance(&mut state, RunState::Persisting);
    // A cancelled run must never enter the persist write phase.
    if cancel.is_cancelled() {
        tracing::warn!("run cancelled before persist");
        return RunOutcome::failed(state, "cancelled before persist".into());
    }

    let expected_version = match ledger.head_version() {
        Ok(v) => v,
        Err(e) => {
            let outcome = RunOutcome::failed(state, e.to_string());
            publish_failure_banner(ledger, outcome.error.as_deref().unwrap_or_default());
            return outcome;
        }
    };
    match persist_phase(ledger, source, policy, report, doc, expected_version) {
        Ok(report) => RunOutcome::done(report),
        Err(e) => {
            let outcome = RunOutcome::failed(state, e.to_string());
            publish_failure_banner(ledger, outcome.error.as_deref().unwrap_or_default());
            outcome
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use vigil_core::{CheckStatus, Fixes, OverallStatus};
    use vigil_ledger::{init_workspace, read_report_document, VigilPaths};

    struct FakeSource {
        script: RefCell<VecDeque<Result<Vec<ComponentCheck>, RemoteError>>>,
        default: Vec<ComponentCheck>,
        issues: Vec<Issue>,
    }

    impl FakeSource {
        fn ok(checks: Vec<ComponentCheck>) -> Self {
            Self {
                script: RefCell::new(VecDeque::new()),
                default: checks,
                issues: Vec::new(),
            }
        }

        fn scripted(
            script: Vec<Result<Vec<ComponentCheck>, RemoteError>>,
            default: Vec<ComponentCheck>,
        ) -> Self {
            Self {
                script: RefCell::new(script.into()),
                default,
                issues: Vec::new(),
            }
        }

        fn remaining(&self) -> usize {
            self.script.borrow().len()
        }
    }

    impl StatusSource for FakeSource {
        fn fetch_component_statuses(&self) -> Result<Vec<ComponentCheck>, RemoteError> {
            match self.script.borrow_mut().pop_front() {
                Some(step) => step,
                None => Ok(self.default.clone()),
            }
        }

        fn fetch_open_issues(&self) -> Result<Vec<Issue>, RemoteError> {
            Ok(self.issues.clone())
        }
    }

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            backoff_base: Duration::ZERO,
            ..RetryPolicy::default()
        }
    }

    fn setup_ledger() -> (tempfile::TempDir, Ledger) {
        let tmp = tempfile::tempdir().unwrap();
        init_workspace(&VigilPaths::discover(tmp.path())).unwrap();
        let ledger = Ledger::open(tmp.path()).unwrap();
        (tmp, ledger)
    }

    fn check(name: &str, status: CheckStatus) -> ComponentCheck {
        ComponentCheck::new(name, status, "")
    }

    fn unavailable() -> RemoteError {
        RemoteError::Unavailable("503 service unavailable".into())
    }

    #[test]
    fn happy_path_persists_run_and_document() {
        let (_tmp, ledger) = setup_ledger();
        let source = FakeSource::ok(vec![check("Workflows", CheckStatus::Passed)]);
        let outcome = run_once(&ledger, &source, &quick_policy(), &CancelToken::new());

        assert!(outcome.is_done());
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(ledger.head_version().unwrap(), 1);
        let doc = read_report_document(&ledger.paths).unwrap().unwrap();
        assert!(doc.contains("| Workflows | ✅ Passed |"));
    }

    #[test]
    fn transient_failures_then_success_completes_as_done() {
        // Scenario: unavailable on attempts 1 and 2, data arrives on attempt 3.
        let (_tmp, ledger) = setup_ledger();
        let source = FakeSource::scripted(
            vec![
                Err(unavailable()),
                Err(unavailable()),
                Ok(vec![check("Flow", CheckStatus::Passed)]),
            ],
            Vec::new(),
        );
        let outcome = run_once(&ledger, &source, &quick_policy(), &CancelToken::new());

        assert!(outcome.is_done());
        let report = outcome.report.unwrap();
        assert_eq!(report.checks[0].name, "Flow");
        assert_eq!(ledger.head_version().unwrap(), 1);
    }

    #[test]
    fn exhausted_retry_budget_fails_and_leaves_ledger_untouched() {
        let (_tmp, ledger) = setup_ledger();
        let source = FakeSource::scripted(
            vec![Err(unavailable()), Err(unavailable()), Err(unavailable())],
            vec![check("Flow", CheckStatus::Passed)],
        );
        let outcome = run_once(&ledger, &source, &quick_policy(), &CancelToken::new());

        assert_eq!(outcome.state, RunState::Failed);
        assert_eq!(outcome.exit_code(), 1);
        assert!(outcome.error.unwrap().contains("fetching"));
        assert_eq!(ledger.head_version().unwrap(), 0);
        // No successful run yet, so no document gets published either.
        assert_eq!(read_report_document(&ledger.paths).unwrap(), None);
    }

    #[test]
    fn malformed_response_fails_fast_without_retries() {
        let (_tmp, ledger) = setup_ledger();
        let source = FakeSource::scripted(
            vec![
                Err(RemoteError::Malformed("not json".into())),
                Ok(vec![check("Flow", CheckStatus::Passed)]),
            ],
            Vec::new(),
        );
        let outcome = run_once(&ledger, &source, &quick_policy(), &CancelToken::new());

        assert_eq!(outcome.state, RunState::Failed);
        // The queued success was never consumed: no retry happened.
        assert_eq!(source.remaining(), 1);
        assert_eq!(ledger.head_version().unwrap(), 0);
    }

    #[test]
    fn cancelled_run_never_writes() {
        let (_tmp, ledger) = setup_ledger();
        let source = FakeSource::ok(vec![check("Flow", CheckStatus::Passed)]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let outcome = run_once(&ledger, &source, &quick_policy(), &cancel);

        assert_eq!(outcome.state, RunState::Failed);
        assert_eq!(ledger.head_version().unwrap(), 0);
        assert_eq!(read_report_document(&ledger.paths).unwrap(), None);
    }

    #[test]
    fn identical_runs_are_idempotent_modulo_timestamps() {
        let (_tmp, ledger) = setup_ledger();
        let checks = vec![
            check("Core Repositories", CheckStatus::Passed),
            check("Wave 2 Agents", CheckStatus::Pending),
        ];
        let source = FakeSource::ok(checks);
        let policy = quick_policy();
        let cancel = CancelToken::new();

        let first = run_once(&ledger, &source, &policy, &cancel);
        let doc_first = read_report_document(&ledger.paths).unwrap().unwrap();
        let second = run_once(&ledger, &source, &policy, &cancel);
        let doc_second = read_report_document(&ledger.paths).unwrap().unwrap();

        let (a, b) = (first.report.unwrap(), second.report.unwrap());
        assert_ne!(a.run_id, b.run_id);
        assert_eq!(a.checks, b.checks);
        assert_eq!(a.issues, b.issues);
        assert_eq!(a.fixes, b.fixes);
        assert_eq!(a.next_steps, b.next_steps);

        let strip_ts = |doc: &str| -> String {
            doc.lines()
                .filter(|l| !l.starts_with("- Generated:"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        assert_eq!(strip_ts(&doc_first), strip_ts(&doc_second));
        assert_eq!(ledger.head_version().unwrap(), 2);
    }

    #[test]
    fn resolved_issue_shows_up_as_fix_on_next_run() {
        let (_tmp, ledger) = setup_ledger();
        let failing = FakeSource::ok(vec![check("Flow", CheckStatus::Failed)]);
        let policy = quick_policy();
        let cancel = CancelToken::new();
        let first = run_once(&ledger, &failing, &policy, &cancel);
        assert_eq!(
            first.report.unwrap().overall_status,
            OverallStatus::Failed
        );

        let healthy = FakeSource::ok(vec![check("Flow", CheckStatus::Passed)]);
        let second = run_once(&ledger, &healthy, &policy, &cancel);
        let report = second.report.unwrap();
        assert_eq!(report.overall_status, OverallStatus::Passed);
        match report.fixes {
            Fixes::List(ref fixes) => assert_eq!(fixes[0].id, "check:Flow"),
            Fixes::None => panic!("expected the resolved issue to classify as a fix"),
        }
    }

    #[test]
    fn stale_persist_conflicts_once_then_succeeds_against_new_head() {
        let (_tmp, ledger) = setup_ledger();
        let source = FakeSource::ok(vec![check("Flow", CheckStatus::Passed)]);
        let policy = quick_policy();

        // Another run lands after our version read: expected 0 is stale.
        let interloper = build_report(vec![check("Other", CheckStatus::Passed)], Vec::new(), &[]);
        ledger.append_run(&interloper, 0).unwrap();

        let report = build_report(vec![check("Flow", CheckStatus::Passed)], Vec::new(), &[]);
        let doc = render(&report);
        let persisted = persist_phase(&ledger, &source, &policy, report, doc, 0).unwrap();

        let runs = ledger.iter_runs().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].run_id, persisted.run_id);
        // The published document belongs to the retried run, not the one
        // that won the earlier append.
        let doc = read_report_document(&ledger.paths).unwrap().unwrap();
        assert!(doc.contains("| Flow | ✅ Passed |"));
    }

    #[test]
    fn phases_advance_from_idle_in_order() {
        let mut state = RunState::Idle;
        for next in [
            RunState::Fetching,
            RunState::Aggregating,
            RunState::Rendering,
            RunState::Persisting,
            RunState::Done,
        ] {
            advance(&mut state, next);
            assert_eq!(state, next);
        }
    }

    #[test]
    fn overlapping_runs_never_lose_an_entry() {
        let (tmp, _ledger) = setup_ledger();
        let policy = quick_policy();
        let root = tmp.path();
        let policy = &policy;

        std::thread::scope(|s| {
            for name in ["a", "b"] {
                s.spawn(move || {
                    let ledger = Ledger::open_path(root).unwrap();
                    let source = FakeSource::ok(vec![check(name, CheckStatus::Passed)]);
                    let outcome = run_once(&ledger, &source, policy, &CancelToken::new());
                    assert!(outcome.is_done());
                });
            }
        });

        let ledger = Ledger::open_path(root).unwrap();
        let runs = ledger.iter_runs().unwrap();
        assert_eq!(runs.len(), 2);
        assert_ne!(runs[0].run_id, runs[1].run_id);
        assert_eq!(ledger.head_version().unwrap(), 2);
    }

    #[test]
    fn failed_run_publishes_banner_over_last_good_report() {
        let (_tmp, ledger) = setup_ledger();
        let policy = quick_policy();
        let cancel = CancelToken::new();

        let healthy = FakeSource::ok(vec![check("Workflows", CheckStatus::Passed)]);
        run_once(&ledger, &healthy, &policy, &cancel);
        let good_doc = read_report_document(&ledger.paths).unwrap().unwrap();

        let broken = FakeSource::scripted(
            vec![Err(unavailable()), Err(unavailable()), Err(unavailable())],
            Vec::new(),
        );
        let outcome = run_once(&ledger, &broken, &policy, &cancel);
        assert_eq!(outcome.state, RunState::Failed);

        let doc = read_report_document(&ledger.paths).unwrap().unwrap();
        assert!(doc.starts_with("> ⚠️ Run failed at"));
        assert!(doc.contains("| Workflows | ✅ Passed |"));
        // The previous run's table survives intact under the banner.
        assert!(doc.ends_with(&good_doc));
        assert_eq!(ledger.head_version().unwrap(), 1);
    }
}
