use std::path::Path;
use vigil_ledger::{init_workspace, VigilPaths};

use crate::config::default_config_json;

pub fn execute(repo_root: &Path) -> anyhow::Result<()> {
    let paths = VigilPaths::discover(repo_root);

    if paths.is_initialized() {
        // Heal a partially created .vigil/ without touching existing config.
        init_workspace(&paths)?;
        println!("Already initialized at {}", paths.vigil_dir.display());
        return Ok(());
    }

    init_workspace(&paths)?;
    if !paths.config_json.exists() {
        std::fs::write(&paths.config_json, default_config_json())?;
    }

    println!("Initialized vigil workspace at {}", paths.vigil_dir.display());
    println!(
        "Edit {} (remote.base_url, components) and set VIGIL_TOKEN before the first run.",
        paths.config_json.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_layout_and_config() {
        let tmp = tempfile::tempdir().unwrap();
        execute(tmp.path()).unwrap();
        let paths = VigilPaths::discover(tmp.path());
        assert!(paths.is_initialized());
        assert!(paths.ledger_dir.is_dir());
        assert!(paths.config_json.exists());
    }

    #[test]
    fn init_twice_preserves_config() {
        let tmp = tempfile::tempdir().unwrap();
        execute(tmp.path()).unwrap();
        let paths = VigilPaths::discover(tmp.path());
        std::fs::write(&paths.config_json, r#"{"remote":{"base_url":"https://mine"}}"#).unwrap();
        execute(tmp.path()).unwrap();
        let content = std::fs::read_to_string(&paths.config_json).unwrap();
        assert!(content.contains("https://mine"));
    }
}
