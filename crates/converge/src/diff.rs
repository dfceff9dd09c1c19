//! Diff engine - declared state vs last-applied state.
//!
//! Produces the change-set a run must apply: create for declared resources
//! missing from state, update when resolved attributes drift from the
//! recorded ones (provider-assigned attributes are ignored), destroy for
//! state resources nothing declares anymore.

use crate::resolve::ResolvedValue;
use crate::schema::SchemaRegistry;
use crate::state::StateSnapshot;
use crate::types::{Address, Module};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Placeholder rendered for values that only exist after apply
pub const KNOWN_AFTER_APPLY: &str = "(known after apply)";

/// The action a change performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Update,
    Destroy,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Destroy => "destroy",
        };
        write!(f, "{name}")
    }
}

/// One entry of a change-set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub address: Address,
    pub action: ChangeAction,
    /// Recorded attributes before the change (update/destroy)
    pub before: Option<serde_json::Map<String, serde_json::Value>>,
    /// Planned attributes after the change (create/update); values that are
    /// only known after apply hold [`KNOWN_AFTER_APPLY`]
    pub after: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Aggregate counts for a change-set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub creates: usize,
    pub updates: usize,
    pub destroys: usize,
}

impl PlanSummary {
    /// Create a summary from a list of changes
    pub fn from_changes(changes: &[ResourceChange]) -> Self {
        let mut summary = Self::default();
        for change in changes {
            match change.action {
                ChangeAction::Create => summary.creates += 1,
                ChangeAction::Update => summary.updates += 1,
                ChangeAction::Destroy => summary.destroys += 1,
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.creates + self.updates + self.destroys
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Compute the change-set for a run.
///
/// `resolved` holds the resolved attributes per declared address, `topo` the
/// forward dependency order of declared resources. Destroys come first in
/// the result, ordered so dependents are destroyed before the resources
/// they depended on.
pub fn compute_changes(
    module: &Module,
    resolved: &BTreeMap<String, BTreeMap<String, ResolvedValue>>,
    state: &StateSnapshot,
    registry: &SchemaRegistry,
    topo: &[Address],
) -> Vec<ResourceChange> {
    let mut changes = Vec::new();

    // Resources in state that nothing declares anymore
    let stale: BTreeSet<String> = state
        .addresses()
        .filter(|address| !module.has_resource(address))
        .map(ToString::to_string)
        .collect();

    for address in destroy_order(state, &stale) {
        let before = state.get(&address).map(|r| r.attrs.clone());
        if let Some(parsed) = Address::parse(&address) {
            changes.push(ResourceChange {
                address: parsed,
                action: ChangeAction::Destroy,
                before,
                after: None,
            });
        }
    }

    for address in topo {
        let key = address.to_string();
        let Some(attrs) = resolved.get(&key) else {
            continue;
        };

        let computed: BTreeSet<&str> = registry
            .kind(&address.kind)
            .map(|schema| schema.computed_attrs().collect())
            .unwrap_or_default();

        match state.get(&key) {
            None => changes.push(ResourceChange {
                address: address.clone(),
                action: ChangeAction::Create,
                before: None,
                after: Some(render_attrs(attrs)),
            }),
            Some(recorded) => {
                if attrs_differ(attrs, &recorded.attrs, &computed) {
                    changes.push(ResourceChange {
                        address: address.clone(),
                        action: ChangeAction::Update,
                        before: Some(recorded.attrs.clone()),
                        after: Some(render_attrs(attrs)),
                    });
                }
            }
        }
    }

    changes
}

/// Whether resolved attributes drift from the recorded ones.
///
/// Provider-assigned attributes are ignored; an unknown resolved value is
/// conservatively treated as a change.
fn attrs_differ(
    resolved: &BTreeMap<String, ResolvedValue>,
    recorded: &serde_json::Map<String, serde_json::Value>,
    computed: &BTreeSet<&str>,
) -> bool {
    for (attr, value) in resolved {
        match value {
            ResolvedValue::Unknown => return true,
            ResolvedValue::Known(value) => {
                if recorded.get(attr) != Some(value) {
                    return true;
                }
            }
        }
    }

    // Attributes removed from the declaration
    recorded
        .keys()
        .any(|attr| !computed.contains(attr.as_str()) && !resolved.contains_key(attr))
}

fn render_attrs(
    attrs: &BTreeMap<String, ResolvedValue>,
) -> serde_json::Map<String, serde_json::Value> {
    attrs
        .iter()
        .map(|(name, value)| {
            let rendered = match value {
                ResolvedValue::Known(v) => v.clone(),
                ResolvedValue::Unknown => {
                    serde_json::Value::String(KNOWN_AFTER_APPLY.to_string())
                }
            };
            (name.clone(), rendered)
        })
        .collect()
}

/// Order addresses for destruction: dependents before their dependencies,
/// using the dependency edges recorded in the state snapshot.
pub fn destroy_order(state: &StateSnapshot, addresses: &BTreeSet<String>) -> Vec<String> {
    // Forward topological order (dependencies first) over recorded edges,
    // then reversed so dependents are destroyed first.
    let mut remaining: BTreeMap<&str, BTreeSet<&str>> = addresses
        .iter()
        .map(|address| {
            let deps: BTreeSet<&str> = state
                .get(address)
                .map(|r| {
                    r.dependencies
                        .iter()
                        .map(String::as_str)
                        .filter(|d| addresses.contains(*d))
                        .collect()
                })
                .unwrap_or_default();
            (address.as_str(), deps)
        })
        .collect();

    let mut forward: Vec<String> = Vec::with_capacity(addresses.len());
    let mut done: BTreeSet<&str> = BTreeSet::new();

    while !remaining.is_empty() {
        let ready: Vec<&str> = remaining
            .iter()
            .filter(|(_, deps)| deps.iter().all(|d| done.contains(d)))
            .map(|(node, _)| *node)
            .collect();

        if ready.is_empty() {
            // Recorded edges should never cycle; fall back to address order
            log::warn!("cycle in recorded state dependencies, using address order");
            forward.extend(remaining.keys().map(ToString::to_string));
            break;
        }

        for node in ready {
            remaining.remove(node);
            done.insert(node);
            forward.push(node.to_string());
        }
    }

    forward.reverse();
    forward
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttrType, KindSchema};
    use crate::state::RealizedResource;
    use crate::types::ResourceDecl;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.register_kind(
            KindSchema::new("storage_bucket", "local")
                .required("location", AttrType::String)
                .optional("versioning", AttrType::Bool)
                .computed("id", AttrType::String)
                .computed("url", AttrType::String),
        );
        registry
    }

    fn module_with_bucket() -> (Module, BTreeMap<String, BTreeMap<String, ResolvedValue>>) {
        let mut module = Module::new();
        module
            .add_resource(ResourceDecl {
                address: Address::new("storage_bucket", "assets"),
                attrs: BTreeMap::new(),
                line: 1,
            })
            .unwrap();

        let resolved = [(
            "storage_bucket.assets".to_string(),
            [(
                "location".to_string(),
                ResolvedValue::Known(json!("us-central1")),
            )]
            .into_iter()
            .collect(),
        )]
        .into_iter()
        .collect();

        (module, resolved)
    }

    fn realized_bucket(location: &str) -> RealizedResource {
        let mut attrs = serde_json::Map::new();
        attrs.insert("location".to_string(), json!(location));
        attrs.insert("id".to_string(), json!("b-1"));
        attrs.insert("url".to_string(), json!("local://assets"));
        RealizedResource {
            kind: "storage_bucket".to_string(),
            name: "assets".to_string(),
            id: "b-1".to_string(),
            attrs,
            dependencies: Vec::new(),
        }
    }

    #[test]
    fn test_create_when_not_in_state() {
        let (module, resolved) = module_with_bucket();
        let state = StateSnapshot::default();
        let topo = vec![Address::new("storage_bucket", "assets")];

        let changes = compute_changes(&module, &resolved, &state, &registry(), &topo);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, ChangeAction::Create);
        assert_eq!(changes[0].after.as_ref().unwrap()["location"], json!("us-central1"));
        assert!(changes[0].before.is_none());
    }

    #[test]
    fn test_no_change_when_in_sync() {
        let (module, resolved) = module_with_bucket();
        let mut state = StateSnapshot::default();
        state.upsert(realized_bucket("us-central1"));
        let topo = vec![Address::new("storage_bucket", "assets")];

        let changes = compute_changes(&module, &resolved, &state, &registry(), &topo);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_update_when_attr_drifts() {
        let (module, resolved) = module_with_bucket();
        let mut state = StateSnapshot::default();
        state.upsert(realized_bucket("europe-west1"));
        let topo = vec![Address::new("storage_bucket", "assets")];

        let changes = compute_changes(&module, &resolved, &state, &registry(), &topo);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, ChangeAction::Update);
        assert_eq!(changes[0].before.as_ref().unwrap()["location"], json!("europe-west1"));
    }

    #[test]
    fn test_update_when_attr_removed_from_declaration() {
        // State recorded versioning, but the declaration no longer sets it
        let (module, resolved) = module_with_bucket();
        let mut state = StateSnapshot::default();
        let mut recorded = realized_bucket("us-central1");
        recorded.attrs.insert("versioning".to_string(), json!(true));
        state.upsert(recorded);
        let topo = vec![Address::new("storage_bucket", "assets")];

        let changes = compute_changes(&module, &resolved, &state, &registry(), &topo);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, ChangeAction::Update);
    }

    #[test]
    fn test_unknown_value_forces_update_and_renders_placeholder() {
        let (module, mut resolved) = module_with_bucket();
        resolved
            .get_mut("storage_bucket.assets")
            .unwrap()
            .insert("versioning".to_string(), ResolvedValue::Unknown);
        let mut state = StateSnapshot::default();
        state.upsert(realized_bucket("us-central1"));
        let topo = vec![Address::new("storage_bucket", "assets")];

        let changes = compute_changes(&module, &resolved, &state, &registry(), &topo);
        assert_eq!(changes[0].action, ChangeAction::Update);
        assert_eq!(
            changes[0].after.as_ref().unwrap()["versioning"],
            json!(KNOWN_AFTER_APPLY)
        );
    }

    #[test]
    fn test_destroy_when_no_longer_declared() {
        let module = Module::new();
        let resolved = BTreeMap::new();
        let mut state = StateSnapshot::default();
        state.upsert(realized_bucket("us-central1"));

        let changes = compute_changes(&module, &resolved, &state, &registry(), &[]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, ChangeAction::Destroy);
        assert_eq!(changes[0].address.to_string(), "storage_bucket.assets");
        assert!(changes[0].after.is_none());
    }

    #[test]
    fn test_destroy_order_dependents_first() {
        let mut state = StateSnapshot::default();
        let mut bucket = realized_bucket("us-central1");
        bucket.name = "a".to_string();
        state.upsert(bucket);
        state.upsert(RealizedResource {
            kind: "compute_instance".to_string(),
            name: "web".to_string(),
            id: "i-1".to_string(),
            attrs: serde_json::Map::new(),
            dependencies: vec!["storage_bucket.a".to_string()],
        });

        let set: BTreeSet<String> = state.addresses().map(ToString::to_string).collect();
        let order = destroy_order(&state, &set);
        assert_eq!(
            order,
            vec!["compute_instance.web".to_string(), "storage_bucket.a".to_string()]
        );
    }

    #[test]
    fn test_summary_counts() {
        let changes = vec![
            ResourceChange {
                address: Address::new("storage_bucket", "a"),
                action: ChangeAction::Create,
                before: None,
                after: Some(serde_json::Map::new()),
            },
            ResourceChange {
                address: Address::new("storage_bucket", "b"),
                action: ChangeAction::Destroy,
                before: Some(serde_json::Map::new()),
                after: None,
            },
        ];
        let summary = PlanSummary::from_changes(&changes);
        assert_eq!(summary.creates, 1);
        assert_eq!(summary.destroys, 1);
        assert_eq!(summary.total(), 2);
        assert!(summary.has_changes());
    }
}
