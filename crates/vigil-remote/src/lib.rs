//! Client over the remote status tracker.
//!
//! The tracker exposes per-component status records and a flat list of open
//! issues. This crate owns the wire shapes and their translation into the
//! core model; retry policy deliberately lives in the runner, not here.

use std::time::Duration;

use serde::Deserialize;
use vigil_core::{CheckStatus, ComponentCheck, Issue, Severity};

/// Per-call timeout for remote requests.
const TIMEOUT: Duration = Duration::from_secs(30);

// ── Errors ──

/// Failure modes of the remote API. `Unavailable` is transient and worth
/// retrying; `Malformed` is not, the payload will not get better.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("remote unavailable: {0}")]
    Unavailable(String),
    #[error("malformed remote response: {0}")]
    Malformed(String),
}

// ── Config ──

/// Remote endpoint configuration, stored in `.vigil/config.json` under
/// key `remote`. The credential is never stored here; it comes from the
/// `VIGIL_TOKEN` environment variable at invocation time.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,
    #[serde(default)]
    pub components: Vec<String>,
}

// ── Capability seam ──

/// Capability-typed source of component statuses and open issues.
/// The runner is generic over this so tests can swap in a fake.
pub trait StatusSource {
    fn fetch_component_statuses(&self) -> Result<Vec<ComponentCheck>, RemoteError>;
    fn fetch_open_issues(&self) -> Result<Vec<Issue>, RemoteError>;
}

// ── Wire shapes ──

#[derive(Debug, Deserialize)]
struct StatusRecord {
    component: String,
    status: String,
    #[serde(default)]
    details: String,
}

#[derive(Debug, Deserialize)]
struct IssueRecord {
    id: String,
    description: String,
    #[serde(default)]
    severity: Option<String>,
}

fn check_from_record(record: StatusRecord) -> Result<ComponentCheck, RemoteError> {
    let status = CheckStatus::parse(&record.status).ok_or_else(|| {
        RemoteError::Malformed(format!(
            "unknown status {:?} for component {:?}",
            record.status, record.component
        ))
    })?;
    Ok(ComponentCheck::new(record.component, status, record.details))
}

fn severity_from_str(s: Option<&str>) -> Severity {
    match s.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("error") => Severity::Error,
        Some("warning") | Some("warn") => Severity::Warning,
        _ => Severity::Info,
    }
}

fn issue_from_record(record: IssueRecord) -> Issue {
    Issue {
        severity: severity_from_str(record.severity.as_deref()),
        id: record.id,
        description: record.description,
    }
}

/// Parse a status-endpoint body into checks.
pub fn parse_status_body(body: &str) -> Result<Vec<ComponentCheck>, RemoteError> {
    let records: Vec<StatusRecord> =
        serde_json::from_str(body).map_err(|e| RemoteError::Malformed(e.to_string()))?;
    records.into_iter().map(check_from_record).collect()
}

/// Parse an issues-endpoint body into issues, preserving payload order.
pub fn parse_issues_body(body: &str) -> Result<Vec<Issue>, RemoteError> {
    let records: Vec<IssueRecord> =
        serde_json::from_str(body).map_err(|e| RemoteError::Malformed(e.to_string()))?;
    Ok(records.into_iter().map(issue_from_record).collect())
}

// ── HTTP implementation ──

/// `StatusSource` over HTTP. One agent with a global timeout per client;
/// auth uses the `token` header scheme the tracker expects.
pub struct HttpStatusSource {
    config: RemoteConfig,
    token: String,
    agent: ureq::Agent,
}

impl HttpStatusSource {
    pub fn new(config: RemoteConfig, token: impl Into<String>) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(TIMEOUT))
            .build()
            .new_agent();
        Self {
            config,
            token: token.into(),
            agent,
        }
    }

    fn get(&self, url: &str) -> Result<String, RemoteError> {
        tracing::debug!(url, "remote GET");
        let mut response = self
            .agent
            .get(url)
            .header("Authorization", &format!("token {}", self.token))
            .header("Accept", "application/json")
            .call()
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        response
            .body_mut()
            .read_to_string()
            .map_err(|e| RemoteError::Unavailable(e.to_string()))
    }
}

impl StatusSource for HttpStatusSource {
    fn fetch_component_statuses(&self) -> Result<Vec<ComponentCheck>, RemoteError> {
        let mut checks = Vec::new();
        for component in &self.config.components {
            let url = format!(
                "{}/components/{}/status",
                self.config.base_url.trim_end_matches('/'),
                component
            );
            let body = self.get(&url)?;
            checks.extend(parse_status_body(&body)?);
        }
        Ok(checks)
    }

    fn fetch_open_issues(&self) -> Result<Vec<Issue>, RemoteError> {
        let url = format!(
            "{}/issues?components={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.components.join(",")
        );
        let body = self.get(&url)?;
        parse_issues_body(&body)
    }
}
