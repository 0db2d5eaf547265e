use serde::{Deserialize, Serialize};

/// Run ID format: `run_<ulid>`
pub type RunId = String;

/// Status of a single tracked component for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    Passed,
    Failed,
    Pending,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Passed => "Passed",
            CheckStatus::Failed => "Failed",
            CheckStatus::Pending => "Pending",
        }
    }

    /// Parse a status keyword as it appears in the remote payload and
    /// in the rendered component table. Case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "passed" | "pass" | "ok" => Some(CheckStatus::Passed),
            "failed" | "fail" | "error" => Some(CheckStatus::Failed),
            "pending" | "running" | "in_progress" => Some(CheckStatus::Pending),
            _ => None,
        }
    }
}

/// One component observation for one run. Identity = `name`.
/// Immutable once recorded in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: CheckStatus,
    #[serde(default)]
    pub details: String,
}

impl ComponentCheck {
    pub fn new(name: impl Into<String>, status: CheckStatus, details: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            details: details.into(),
        }
    }
}

/// Severity of a tracked issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

/// An open issue observed during a run. Identity = `id`; list order
/// is detection order and is preserved through the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub description: String,
    pub severity: Severity,
}

/// A fix derived from a resolved issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fix {
    pub id: String,
    pub description: String,
}

/// Fixes for a run. `None` is the explicit "no fixes needed" outcome and
/// must stay distinguishable from absent data, so it is a tagged variant
/// rather than an empty list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "entries", rename_all = "snake_case")]
pub enum Fixes {
    None,
    List(Vec<Fix>),
}

impl Fixes {
    pub fn is_none(&self) -> bool {
        matches!(self, Fixes::None)
    }
}

/// Derived classification summarizing all component checks for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallStatus {
    Passed,
    Partial,
    Failed,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Passed => "Passed",
            OverallStatus::Partial => "Partial",
            OverallStatus::Failed => "Failed",
        }
    }

    /// Glyph used in the rendered dashboard header.
    pub fn glyph(&self) -> &'static str {
        match self {
            OverallStatus::Passed => "✅",
            OverallStatus::Partial => "⚠️",
            OverallStatus::Failed => "❌",
        }
    }
}

/// Aggregate root for one run of the pipeline (one JSONL line in runs.jsonl).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub generated_at: String,
    pub overall_status: OverallStatus,
    pub checks: Vec<ComponentCheck>,
    pub issues: Vec<Issue>,
    pub fixes: Fixes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_steps: Vec<String>,
}
