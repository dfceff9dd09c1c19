//! User-level settings for the forja CLI.
//!
//! Loaded from `~/.config/forja/config.toml` when present. Settings only
//! provide defaults; command-line flags always win.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("forja"))
}

/// User settings
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Default number of parallel jobs for apply
    #[serde(default)]
    pub jobs: Option<usize>,

    /// Default failure policy: "rollback" or "halt"
    #[serde(default)]
    pub on_failure: Option<String>,
}

impl Settings {
    /// Load settings from ~/.config/forja/config.toml, or defaults if the
    /// file does not exist.
    pub fn load() -> Result<Self> {
        let path = config_dir()?.join("config.toml");

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;

        toml::from_str(&content).context("Invalid TOML format in forja config")
    }

    /// Parse the configured failure policy, if any.
    pub fn failure_policy(&self) -> Result<Option<converge::RollbackPolicy>> {
        match self.on_failure.as_deref() {
            None => Ok(None),
            Some("rollback") => Ok(Some(converge::RollbackPolicy::Rollback)),
            Some("halt") => Ok(Some(converge::RollbackPolicy::Halt)),
            Some(other) => anyhow::bail!(
                "invalid on_failure setting '{other}' (expected \"rollback\" or \"halt\")"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_settings() {
        let settings: Settings = toml::from_str("jobs = 8\non_failure = \"halt\"").unwrap();
        assert_eq!(settings.jobs, Some(8));
        assert_eq!(
            settings.failure_policy().unwrap(),
            Some(converge::RollbackPolicy::Halt)
        );
    }

    #[test]
    fn test_empty_settings() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.jobs, None);
        assert_eq!(settings.failure_policy().unwrap(), None);
    }

    #[test]
    fn test_invalid_failure_policy() {
        let settings: Settings = toml::from_str("on_failure = \"explode\"").unwrap();
        assert!(settings.failure_policy().is_err());
    }
}
