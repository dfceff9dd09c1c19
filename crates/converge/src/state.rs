//! State snapshot - the last-applied record of every realized resource
//!
//! The snapshot maps resource addresses to the attributes the provider
//! actually realized (including provider-assigned ids) plus the dependency
//! edges recorded at apply time, which keep destroys correctly ordered even
//! after the declarations that produced them are gone. The snapshot is owned
//! by the engine between runs and is never mutated by declarations.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Current snapshot format version
pub const STATE_VERSION: u32 = 1;

/// A realized resource as recorded after the last apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizedResource {
    pub kind: String,
    pub name: String,
    /// Provider-assigned identifier
    pub id: String,
    /// Realized attributes, inputs and computed values together
    pub attrs: serde_json::Map<String, serde_json::Value>,
    /// Addresses this resource depended on when it was applied
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Last-applied state for a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub version: u32,
    /// Incremented on every save
    pub serial: u64,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub resources: BTreeMap<String, RealizedResource>,
    #[serde(default)]
    pub outputs: BTreeMap<String, serde_json::Value>,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            serial: 0,
            last_updated: Utc::now(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }
}

impl StateSnapshot {
    /// Load a snapshot from disk, or return an empty one if the file does
    /// not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("state file does not exist, starting from empty state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        anyhow::ensure!(
            state.version <= STATE_VERSION,
            "state file {} has format version {} (this build supports up to {})",
            path.display(),
            state.version,
            STATE_VERSION,
        );

        log::debug!("loaded state serial {} from {}", state.serial, path.display());
        Ok(state)
    }

    /// Save the snapshot, bumping its serial.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.serial += 1;
        self.last_updated = Utc::now();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create state directory: {}", parent.display()))?;
        }

        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize state")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("saved state serial {} to {}", self.serial, path.display());
        Ok(())
    }

    /// Look up a realized resource by address.
    pub fn get(&self, address: &str) -> Option<&RealizedResource> {
        self.resources.get(address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.resources.contains_key(address)
    }

    /// Insert or replace a realized resource.
    pub fn upsert(&mut self, resource: RealizedResource) {
        let address = format!("{}.{}", resource.kind, resource.name);
        self.resources.insert(address, resource);
    }

    /// Remove a realized resource, returning it if present.
    pub fn remove(&mut self, address: &str) -> Option<RealizedResource> {
        self.resources.remove(address)
    }

    /// Addresses of every realized resource.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn realized(kind: &str, name: &str, id: &str) -> RealizedResource {
        RealizedResource {
            kind: kind.to_string(),
            name: name.to_string(),
            id: id.to_string(),
            attrs: serde_json::Map::new(),
            dependencies: Vec::new(),
        }
    }

    #[test]
    fn test_default_state_is_empty() {
        let state = StateSnapshot::default();
        assert!(state.is_empty());
        assert_eq!(state.serial, 0);
        assert_eq!(state.version, STATE_VERSION);
    }

    #[test]
    fn test_upsert_and_remove() {
        let mut state = StateSnapshot::default();
        state.upsert(realized("storage_bucket", "assets", "b-1"));

        assert!(state.contains("storage_bucket.assets"));
        assert_eq!(state.get("storage_bucket.assets").unwrap().id, "b-1");

        let removed = state.remove("storage_bucket.assets").unwrap();
        assert_eq!(removed.id, "b-1");
        assert!(state.is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forja.state.json");

        let mut state = StateSnapshot::default();
        let mut resource = realized("pubsub_topic", "events", "t-1");
        resource.attrs.insert("labels".to_string(), json!({"env": "dev"}));
        resource.dependencies.push("storage_bucket.assets".to_string());
        state.upsert(resource);
        state.outputs.insert("topic_id".to_string(), json!("t-1"));
        state.save(&path).unwrap();
        assert_eq!(state.serial, 1);

        let loaded = StateSnapshot::load(&path).unwrap();
        assert_eq!(loaded.serial, 1);
        assert_eq!(loaded.get("pubsub_topic.events").unwrap().id, "t-1");
        assert_eq!(
            loaded.get("pubsub_topic.events").unwrap().dependencies,
            vec!["storage_bucket.assets".to_string()]
        );
        assert_eq!(loaded.outputs["topic_id"], json!("t-1"));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateSnapshot::load(&dir.path().join("nope.json")).unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn test_serial_increments_on_each_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forja.state.json");

        let mut state = StateSnapshot::default();
        state.save(&path).unwrap();
        state.save(&path).unwrap();
        assert_eq!(state.serial, 2);

        let loaded = StateSnapshot::load(&path).unwrap();
        assert_eq!(loaded.serial, 2);
    }

    #[test]
    fn test_load_rejects_newer_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forja.state.json");

        let mut state = StateSnapshot::default();
        state.version = STATE_VERSION + 1;
        let content = serde_json::to_string_pretty(&state).unwrap();
        fs::write(&path, content).unwrap();

        assert!(StateSnapshot::load(&path).is_err());
    }
}
