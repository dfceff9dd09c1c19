//! Saved plans - a change-set pinned to the configuration that produced it.
//!
//! A plan records the change-set in execution order, the resolved variable
//! values, and a content hash of the declaration files. Applying a saved
//! plan is refused when the configuration has changed since the plan was
//! computed.

use crate::diff::{PlanSummary, ResourceChange};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Current plan file format version
pub const PLAN_VERSION: u32 = 1;

/// A computed change-set, optionally saved to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    /// Content hash of the declaration files the plan was computed from
    pub config_hash: String,
    /// Resolved variable values the plan was computed with
    pub variables: BTreeMap<String, serde_json::Value>,
    /// Changes in execution order: destroys first, then creates/updates in
    /// dependency order
    pub changes: Vec<ResourceChange>,
}

impl Plan {
    pub fn new(
        config_hash: impl Into<String>,
        variables: BTreeMap<String, serde_json::Value>,
        changes: Vec<ResourceChange>,
    ) -> Self {
        Self {
            format_version: PLAN_VERSION,
            created_at: Utc::now(),
            config_hash: config_hash.into(),
            variables,
            changes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary::from_changes(&self.changes)
    }

    /// Save the plan as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize plan")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write plan file: {}", path.display()))?;
        log::debug!("saved plan with {} changes to {}", self.changes.len(), path.display());
        Ok(())
    }

    /// Load a plan from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan file: {}", path.display()))?;
        let plan: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse plan file: {}", path.display()))?;

        anyhow::ensure!(
            plan.format_version <= PLAN_VERSION,
            "plan file {} has format version {} (this build supports up to {})",
            path.display(),
            plan.format_version,
            PLAN_VERSION,
        );

        Ok(plan)
    }

    /// Check the plan against the current configuration hash.
    pub fn matches_config(&self, config_hash: &str) -> bool {
        self.config_hash == config_hash
    }
}
