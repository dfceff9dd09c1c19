//! Command implementations and the shared run pipeline.

pub mod apply;
pub mod destroy;
pub mod fmt;
pub mod graph;
pub mod plan;
pub mod refresh;
pub mod show;
pub mod validate;

use crate::{catalog, loader, ui, vars};
use anyhow::{bail, Result};
use converge::{
    DependencyGraph, Module, Plan, ResolvedValue, SchemaRegistry, StateSnapshot,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Everything a planning or applying command needs
pub struct Prepared {
    pub dir: PathBuf,
    pub module: Module,
    pub registry: SchemaRegistry,
    pub graph: DependencyGraph,
    pub variables: BTreeMap<String, serde_json::Value>,
    pub state: StateSnapshot,
    pub hash: String,
}

/// Load, validate and resolve a project directory.
pub fn prepare(dir: &Path, var_flags: &[String], var_file: Option<&Path>) -> Result<Prepared> {
    let loaded = loader::load_dir(dir)?;
    let registry = catalog::builtin_registry();

    let graph = match converge::validate_module(&loaded.module, &registry) {
        Ok(graph) => graph,
        Err(errors) => return fail_validation(&errors),
    };

    let supplied = vars::collect(&loaded.module, var_flags, var_file)?;
    let variables = match converge::resolve_variables(&loaded.module, &supplied) {
        Ok(values) => values,
        Err(errors) => return fail_validation(&errors),
    };

    let state = StateSnapshot::load(&loader::state_path(dir))?;

    Ok(Prepared {
        dir: dir.to_path_buf(),
        module: loaded.module,
        registry,
        graph,
        variables,
        state,
        hash: loaded.hash,
    })
}

fn fail_validation<T>(errors: &[converge::Error]) -> Result<T> {
    for error in errors {
        ui::error(&error.to_string());
    }
    bail!(
        "configuration is not valid ({} error{})",
        errors.len(),
        if errors.len() == 1 { "" } else { "s" }
    );
}

/// Resolve every resource and compute the change-set as a plan.
pub fn compute_plan(prepared: &Prepared) -> Result<Plan> {
    let topo = prepared
        .graph
        .topo_order()
        .map_err(anyhow::Error::from)?;

    let ctx = converge::EvalContext {
        variables: &prepared.variables,
        state: &prepared.state,
    };

    let mut resolved: BTreeMap<String, BTreeMap<String, ResolvedValue>> = BTreeMap::new();
    for decl in prepared.module.resources() {
        resolved.insert(
            decl.address.to_string(),
            converge::resolve_resource(decl, &ctx)?,
        );
    }

    let changes = converge::compute_changes(
        &prepared.module,
        &resolved,
        &prepared.state,
        &prepared.registry,
        &topo,
    );

    Ok(Plan::new(prepared.hash.clone(), prepared.variables.clone(), changes))
}
