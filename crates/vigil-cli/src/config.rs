use std::time::Duration;

use serde::Deserialize;
use vigil_ledger::VigilPaths;
use vigil_remote::RemoteConfig;
use vigil_runner::RetryPolicy;

/// Workspace configuration, read from `.vigil/config.json`.
/// The remote credential is deliberately absent: it comes from the
/// `VIGIL_TOKEN` environment variable at invocation time.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceConfig {
    pub remote: RemoteConfig,
    #[serde(default)]
    pub retry: RetrySettings,
}

/// Retry budgets, overridable per workspace.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub fetch_attempts: u32,
    pub persist_attempts: u32,
    pub backoff_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            fetch_attempts: policy.fetch_attempts,
            persist_attempts: policy.persist_attempts,
            backoff_secs: policy.backoff_base.as_secs(),
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            fetch_attempts: self.fetch_attempts,
            persist_attempts: self.persist_attempts,
            backoff_base: Duration::from_secs(self.backoff_secs),
        }
    }
}

/// Load the workspace config. Fails with guidance when the file is missing
/// or does not parse; a run without a remote endpoint cannot do anything.
pub fn load(paths: &VigilPaths) -> anyhow::Result<WorkspaceConfig> {
    let content = std::fs::read_to_string(&paths.config_json).map_err(|e| {
        anyhow::anyhow!(
            "cannot read {} ({e}). Run `vigil init` and fill in remote.base_url.",
            paths.config_json.display()
        )
    })?;
    let config: WorkspaceConfig = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", paths.config_json.display()))?;
    Ok(config)
}

/// The config written by `vigil init`. base_url is a placeholder the
/// operator must edit before the first run.
pub fn default_config_json() -> String {
    serde_json::to_string_pretty(&serde_json::json!({
        "remote": {
            "base_url": "https://tracker.example/api",
            "components": ["Workflows", "Core Repositories", "Wave 2 Agents", "End-to-End Flow"],
        },
        "retry": {
            "fetch_attempts": 3,
            "persist_attempts": 3,
            "backoff_secs": 1,
        },
    }))
    .expect("static config serializes")
}
