//! Provider construction for a run.
//!
//! Builds the configured provider set from the module's `provider` blocks.
//! Provider configuration may reference variables but never resources.

use anyhow::{bail, Context, Result};
use converge::{
    AttrMap, EvalContext, Module, Provider, ProviderMap, ResolvedValue, StateSnapshot,
};
use std::collections::BTreeMap;
use std::path::Path;

pub mod local;

pub use local::LocalProvider;

/// Build and configure the providers for a run.
pub fn build_providers(
    module: &Module,
    variables: &BTreeMap<String, serde_json::Value>,
    project_dir: &Path,
) -> Result<ProviderMap> {
    let mut providers: ProviderMap = BTreeMap::new();

    let mut local = LocalProvider::new(project_dir);
    if let Some(decl) = module.provider("local") {
        let config = eval_provider_config(decl, variables)?;
        local
            .configure(&config)
            .context("Failed to configure provider 'local'")?;
    }
    providers.insert("local".to_string(), Box::new(local));

    Ok(providers)
}

/// Evaluate a provider block's configuration attributes.
fn eval_provider_config(
    decl: &converge::ProviderDecl,
    variables: &BTreeMap<String, serde_json::Value>,
) -> Result<AttrMap> {
    let state = StateSnapshot::default();
    let ctx = EvalContext { variables, state: &state };
    let context = format!("provider '{}'", decl.name);

    let mut config = AttrMap::new();
    for (attr, expr) in &decl.config {
        match converge::eval_expr(expr, &ctx, &context)
            .with_context(|| format!("in provider '{}' configuration", decl.name))?
        {
            ResolvedValue::Known(value) => {
                config.insert(attr.clone(), value);
            }
            ResolvedValue::Unknown => {
                bail!(
                    "provider '{}' configuration attribute '{attr}' may not reference resources",
                    decl.name,
                );
            }
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge::ProviderDecl;
    use declkit::{Expr, Reference, Template};
    use serde_json::json;

    #[test]
    fn test_build_default_local_provider() {
        let dir = tempfile::tempdir().unwrap();
        let providers = build_providers(&Module::new(), &BTreeMap::new(), dir.path()).unwrap();
        assert!(providers.contains_key("local"));
    }

    #[test]
    fn test_provider_config_uses_variables() {
        let dir = tempfile::tempdir().unwrap();
        let mut module = Module::new();
        module
            .add_provider(ProviderDecl {
                name: "local".to_string(),
                config: [(
                    "project".to_string(),
                    Expr::Ref(Reference::Var("project".to_string())),
                )]
                .into_iter()
                .collect(),
                line: 1,
            })
            .unwrap();

        let variables = [("project".to_string(), json!("acme"))].into_iter().collect();
        let providers = build_providers(&module, &variables, dir.path()).unwrap();

        let realized = providers["local"]
            .create("pubsub_topic", "events", &AttrMap::new())
            .unwrap();
        assert_eq!(realized.id, "local/acme/pubsub_topic/events");
    }

    #[test]
    fn test_provider_config_rejects_resource_refs() {
        let dir = tempfile::tempdir().unwrap();
        let mut module = Module::new();
        module
            .add_provider(ProviderDecl {
                name: "local".to_string(),
                config: [(
                    "project".to_string(),
                    Expr::Str(Template {
                        parts: vec![declkit::TemplatePart::Interp(Reference::Attr {
                            kind: "storage_bucket".to_string(),
                            name: "assets".to_string(),
                            path: vec!["id".to_string()],
                        })],
                    }),
                )]
                .into_iter()
                .collect(),
                line: 1,
            })
            .unwrap();

        let err = build_providers(&module, &BTreeMap::new(), dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("may not reference resources"));
    }
}
