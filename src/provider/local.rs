//! Local development provider.
//!
//! Realizes resources as JSON records on disk (by default under
//! `.forja/resources/` in the project directory). Useful for exercising the
//! whole plan/apply/refresh cycle without any cloud account: deleting or
//! editing a record file shows up as drift on the next refresh.

use converge::{AttrMap, Provider, ProviderError, ProviderResult, Realized};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Provider that realizes resources as local JSON records
pub struct LocalProvider {
    root: PathBuf,
    project: String,
}

/// On-disk form of a realized resource
#[derive(Debug, Serialize, Deserialize)]
struct Record {
    id: String,
    kind: String,
    name: String,
    attrs: AttrMap,
}

impl LocalProvider {
    pub fn new(project_dir: &Path) -> Self {
        Self {
            root: project_dir.join(".forja").join("resources"),
            project: "default".to_string(),
        }
    }

    fn record_path(&self, kind: &str, name: &str) -> PathBuf {
        self.root.join(kind).join(format!("{name}.json"))
    }

    /// Resolve the record path for a provider-assigned id
    /// (`local/<project>/<kind>/<name>`).
    fn path_for_id(&self, id: &str) -> ProviderResult<PathBuf> {
        let segments: Vec<&str> = id.split('/').collect();
        match segments.as_slice() {
            ["local", _, kind, name] => Ok(self.record_path(kind, name)),
            _ => Err(ProviderError::InvalidRequest {
                message: format!("malformed resource id '{id}'"),
            }),
        }
    }

    fn make_id(&self, kind: &str, name: &str) -> String {
        format!("local/{}/{kind}/{name}", self.project)
    }

    fn write_record(&self, record: &Record) -> ProviderResult<()> {
        let path = self.record_path(&record.kind, &record.name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(record)?)?;
        Ok(())
    }

    fn read_record(&self, path: &Path) -> ProviderResult<Option<Record>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Attributes the platform assigns on top of the inputs.
    fn computed_attrs(kind: &str, name: &str, id: &str) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert("id".to_string(), serde_json::Value::String(id.to_string()));
        match kind {
            "compute_instance" => {
                let hash = blake3::hash(id.as_bytes());
                let bytes = hash.as_bytes();
                attrs.insert(
                    "ip_address".to_string(),
                    serde_json::Value::String(format!(
                        "10.{}.{}.{}",
                        bytes[0], bytes[1], bytes[2]
                    )),
                );
            }
            "storage_bucket" => {
                attrs.insert(
                    "url".to_string(),
                    serde_json::Value::String(format!("local://{name}")),
                );
            }
            _ => {}
        }
        attrs
    }

    fn realize(kind: &str, name: &str, id: &str, inputs: &AttrMap) -> AttrMap {
        let mut attrs = inputs.clone();
        attrs.extend(Self::computed_attrs(kind, name, id));
        attrs
    }
}

impl Provider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn configure(&mut self, config: &AttrMap) -> ProviderResult<()> {
        if let Some(root) = config.get("root").and_then(|v| v.as_str()) {
            let expanded = shellexpand::tilde(root);
            self.root = PathBuf::from(expanded.as_ref());
        }
        if let Some(project) = config.get("project").and_then(|v| v.as_str()) {
            if project.contains('/') {
                return Err(ProviderError::InvalidRequest {
                    message: format!("project name '{project}' may not contain '/'"),
                });
            }
            self.project = project.to_string();
        }
        Ok(())
    }

    fn create(&self, kind: &str, name: &str, attrs: &AttrMap) -> ProviderResult<Realized> {
        let path = self.record_path(kind, name);
        if path.exists() {
            return Err(ProviderError::Conflict {
                message: format!("{kind} '{name}' already exists"),
            });
        }

        let id = self.make_id(kind, name);
        let realized = Self::realize(kind, name, &id, attrs);
        self.write_record(&Record {
            id: id.clone(),
            kind: kind.to_string(),
            name: name.to_string(),
            attrs: realized.clone(),
        })?;

        log::debug!("created {kind} '{name}' as {id}");
        Ok(Realized { id, attrs: realized })
    }

    fn update(&self, kind: &str, id: &str, attrs: &AttrMap) -> ProviderResult<Realized> {
        let path = self.path_for_id(id)?;
        let Some(record) = self.read_record(&path)? else {
            return Err(ProviderError::NotFound { id: id.to_string() });
        };

        let realized = Self::realize(kind, &record.name, id, attrs);
        self.write_record(&Record {
            id: id.to_string(),
            kind: kind.to_string(),
            name: record.name,
            attrs: realized.clone(),
        })?;

        log::debug!("updated {id}");
        Ok(Realized {
            id: id.to_string(),
            attrs: realized,
        })
    }

    fn destroy(&self, _kind: &str, id: &str) -> ProviderResult<()> {
        let path = self.path_for_id(id)?;
        if !path.exists() {
            return Err(ProviderError::NotFound { id: id.to_string() });
        }
        fs::remove_file(&path)?;
        log::debug!("destroyed {id}");
        Ok(())
    }

    fn read(&self, _kind: &str, id: &str) -> ProviderResult<Option<Realized>> {
        let path = self.path_for_id(id)?;
        Ok(self.read_record(&path)?.map(|record| Realized {
            id: record.id,
            attrs: record.attrs,
        }))
    }
}
