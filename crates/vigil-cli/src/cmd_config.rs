use clap::Subcommand;
use std::path::Path;
use vigil_ledger::{write_atomic, VigilPaths};

// ── CLI Schema ──

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Set a config value (dot notation, e.g. remote.base_url)
    Set {
        /// Config key
        key: String,
        /// Config value (true/false/number/string)
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List the full config
    List,
}

// ── Dispatch ──

pub fn run(cmd: ConfigCmd, repo_root: &Path) -> anyhow::Result<()> {
    match cmd {
        ConfigCmd::Set { key, value } => set(repo_root, &key, &value),
        ConfigCmd::Get { key } => get(repo_root, &key),
        ConfigCmd::List => list(repo_root),
    }
}

// ── Command Implementations ──

fn open_paths(repo_root: &Path) -> anyhow::Result<VigilPaths> {
    let paths = VigilPaths::discover(repo_root);
    if !paths.is_initialized() {
        anyhow::bail!("No .vigil/ workspace found. Run `vigil init` first.");
    }
    Ok(paths)
}

fn read_config(paths: &VigilPaths) -> anyhow::Result<serde_json::Value> {
    if !paths.config_json.exists() {
        return Ok(serde_json::json!({}));
    }
    let content = std::fs::read_to_string(&paths.config_json)?;
    Ok(serde_json::from_str(&content)?)
}

/// Parse a string value into an appropriate JSON value (bool/number/string).
fn parse_value(s: &str) -> serde_json::Value {
    match s {
        "true" => serde_json::Value::Bool(true),
        "false" => serde_json::Value::Bool(false),
        _ => {
            if let Ok(n) = s.parse::<i64>() {
                serde_json::Value::Number(n.into())
            } else if let Ok(f) = s.parse::<f64>() {
                serde_json::json!(f)
            } else {
                serde_json::Value::String(s.to_string())
            }
        }
    }
}

/// Walk a dot-notation key, creating intermediate objects as needed,
/// and set the leaf.
fn set_path(root: &mut serde_json::Value, key: &str, value: serde_json::Value) {
    let mut current = root;
    let parts: Vec<&str> = key.split('.').collect();
    for (i, part) in parts.iter().enumerate() {
        if i == parts.len() - 1 {
            current[part] = value;
            return;
        }
        if !current[*part].is_object() {
            current[*part] = serde_json::json!({});
        }
        current = &mut current[*part];
    }
}

fn get_path<'a>(root: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
    let mut current = root;
    for part in key.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

pub fn set(repo_root: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let paths = open_paths(repo_root)?;
    let mut config = read_config(&paths)?;
    set_path(&mut config, key, parse_value(value));
    write_atomic(
        &paths.config_json,
        serde_json::to_string_pretty(&config)?.as_bytes(),
    )?;
    println!("{key} = {value}");
    Ok(())
}

pub fn get(repo_root: &Path, key: &str) -> anyhow::Result<()> {
    let paths = open_paths(repo_root)?;
    let config = read_config(&paths)?;
    match get_path(&config, key) {
        Some(value) => println!("{value}"),
        None => anyhow::bail!("config key {key:?} not set"),
    }
    Ok(())
}

pub fn list(repo_root: &Path) -> anyhow::Result<()> {
    let paths = open_paths(repo_root)?;
    let config = read_config(&paths)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
