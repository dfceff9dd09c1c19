//! Plan executor - applies a change-set in dependency order.
//!
//! Destroys run first (dependents before their dependencies, sequentially),
//! then creates and updates walk the dependency levels; independent changes
//! within a level run on a bounded rayon pool. Attributes are re-resolved
//! immediately before each apply so references to freshly created
//! dependencies see their realized values.
//!
//! On the first hard failure the executor stops scheduling further work and
//! applies the failure policy: `Rollback` walks the journal of applied
//! steps in reverse (created resources are destroyed, updated resources
//! restored, destroyed resources re-created from their recorded
//! attributes); `Halt` keeps whatever already landed.

use crate::context::{ConfirmCallback, ProgressCallback};
use crate::diff::ChangeAction;
use crate::error::Error;
use crate::graph::DependencyGraph;
use crate::plan::Plan;
use crate::provider::{with_retry, AttrMap, ProviderMap, RetryConfig};
use crate::resolve::{resolve_resource, EvalContext, ResolvedValue};
use crate::schema::SchemaRegistry;
use crate::state::{RealizedResource, StateSnapshot};
use crate::types::{Address, ApplyResult, ExecuteOptions, ExecuteSummary, Module, RollbackPolicy};
use anyhow::Result;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Everything the executor needs besides the plan and the state
pub struct Execution<'a> {
    pub module: &'a Module,
    pub registry: &'a SchemaRegistry,
    pub graph: &'a DependencyGraph,
    pub variables: &'a BTreeMap<String, serde_json::Value>,
    pub providers: &'a ProviderMap,
    pub retry: RetryConfig,
}

/// One applied step, recorded for rollback
#[derive(Debug)]
struct Step {
    address: Address,
    action: ChangeAction,
    /// Recorded state before the step (update/destroy)
    before: Option<RealizedResource>,
}

/// Execute a plan against the given state.
///
/// The state snapshot is updated as each change lands; on return it reflects
/// exactly what was realized, including partial progress under `Halt`.
pub fn execute<P, C>(
    exec: &Execution,
    plan: &Plan,
    state: &mut StateSnapshot,
    opts: &ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteSummary>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let mut summary = ExecuteSummary::default();

    if plan.is_empty() {
        return Ok(summary);
    }

    if !confirm.confirm("Apply these changes?")? {
        summary.skipped = plan.changes.len();
        return Ok(summary);
    }

    let destroys: Vec<&Address> = plan
        .changes
        .iter()
        .filter(|c| c.action == ChangeAction::Destroy)
        .map(|c| &c.address)
        .collect();
    let forward: BTreeMap<String, ChangeAction> = plan
        .changes
        .iter()
        .filter(|c| c.action != ChangeAction::Destroy)
        .map(|c| (c.address.to_string(), c.action))
        .collect();

    let shared = Mutex::new(std::mem::take(state));
    let journal: Mutex<Vec<Step>> = Mutex::new(Vec::new());
    let mut attempted = 0usize;
    let mut failed = false;

    // Destroy phase: dependents first, sequentially
    if !destroys.is_empty() {
        progress.on_phase_start(destroys.len(), "destroy");
        for address in &destroys {
            progress.on_change_start(address, ChangeAction::Destroy);
            let result = destroy_one(exec, address, &shared, &journal);
            progress.on_change_complete(address, &result);
            attempted += 1;
            if !result.is_success() {
                failed = true;
            }
            summary.add_result(&result);
            if failed {
                break;
            }
        }
        progress.on_phase_complete();
    }

    // Apply phase: forward dependency levels, parallel within a level
    if !failed && !forward.is_empty() {
        let levels = exec.graph.levels().map_err(anyhow::Error::from)?;

        progress.on_phase_start(forward.len(), "apply");
        'levels: for level in levels {
            let batch: Vec<(Address, ChangeAction)> = level
                .into_iter()
                .filter_map(|address| {
                    forward
                        .get(&address.to_string())
                        .map(|action| (address, *action))
                })
                .collect();

            if batch.is_empty() {
                continue;
            }

            let results = run_batch(exec, &batch, opts, &shared, &journal, progress)?;
            for result in &results {
                attempted += 1;
                if !result.is_success() {
                    failed = true;
                }
                summary.add_result(result);
            }
            if failed {
                break 'levels;
            }
        }
        progress.on_phase_complete();
    }

    summary.skipped += plan.changes.len() - attempted;

    if failed {
        match opts.on_failure {
            RollbackPolicy::Rollback => {
                summary.rolled_back = rollback(exec, &shared, &journal, progress);
            }
            RollbackPolicy::Halt => {
                log::warn!("halting after failure; partial changes kept in state");
            }
        }
    } else {
        record_outputs(exec, &shared);
    }

    *state = shared.into_inner().unwrap_or_else(|p| p.into_inner());
    Ok(summary)
}

/// Run one dependency level, in parallel when allowed.
fn run_batch<P: ProgressCallback>(
    exec: &Execution,
    batch: &[(Address, ChangeAction)],
    opts: &ExecuteOptions,
    shared: &Mutex<StateSnapshot>,
    journal: &Mutex<Vec<Step>>,
    progress: &mut P,
) -> Result<Vec<ApplyResult>> {
    if opts.jobs <= 1 || batch.len() == 1 {
        let mut results = Vec::with_capacity(batch.len());
        for (address, action) in batch {
            progress.on_change_start(address, *action);
            let result = apply_one(exec, address, *action, shared, journal);
            progress.on_change_complete(address, &result);
            results.push(result);
        }
        return Ok(results);
    }

    // Progress cannot be driven from worker threads; report after the batch.
    let collected: Mutex<Vec<(Address, ApplyResult)>> = Mutex::new(Vec::new());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {e}"))?;

    pool.install(|| {
        batch.par_iter().for_each(|(address, action)| {
            let result = apply_one(exec, address, *action, shared, journal);
            lock_unpoisoned(&collected).push((address.clone(), result));
        });
    });

    let mut collected = collected.into_inner().unwrap_or_else(|p| p.into_inner());
    // Deterministic reporting order regardless of scheduling
    collected.sort_by(|a, b| a.0.cmp(&b.0));

    let mut results = Vec::with_capacity(collected.len());
    for (address, result) in collected {
        progress.on_change_complete(&address, &result);
        results.push(result);
    }
    Ok(results)
}

/// Apply a single create or update.
fn apply_one(
    exec: &Execution,
    address: &Address,
    action: ChangeAction,
    shared: &Mutex<StateSnapshot>,
    journal: &Mutex<Vec<Step>>,
) -> ApplyResult {
    let key = address.to_string();

    let Some(decl) = exec.module.resource(address) else {
        return failed(format!("resource {address} is not declared"));
    };

    // Re-resolve against the live snapshot so dependency outputs are visible
    let snapshot = lock_unpoisoned(shared).clone();
    let ctx = EvalContext {
        variables: exec.variables,
        state: &snapshot,
    };
    let resolved = match resolve_resource(decl, &ctx) {
        Ok(resolved) => resolved,
        Err(e) => return failed(e.to_string()),
    };

    let mut attrs = AttrMap::new();
    for (attr, value) in resolved {
        match value {
            ResolvedValue::Known(value) => {
                attrs.insert(attr, value);
            }
            ResolvedValue::Unknown => {
                return failed(
                    Error::UnresolvedValue {
                        address: address.clone(),
                        attr,
                    }
                    .to_string(),
                );
            }
        }
    }

    let Some(kind_schema) = exec.registry.kind(&address.kind) else {
        return failed(format!("unknown resource kind '{}'", address.kind));
    };

    // Last line of schema checking before the provider call
    for (attr, value) in &attrs {
        if let Some(attr_schema) = kind_schema.attrs.get(attr)
            && !attr_schema.attr_type.check(value)
        {
            return failed(
                Error::TypeMismatch {
                    address: address.clone(),
                    attr: attr.clone(),
                    expected: attr_schema.attr_type.to_string(),
                    found: crate::schema::value_type_name(value).to_string(),
                }
                .to_string(),
            );
        }
    }

    let Some(provider) = exec.providers.get(&kind_schema.provider) else {
        return failed(format!("no provider configured for '{}'", kind_schema.provider));
    };

    match action {
        ChangeAction::Create => {
            match with_retry(&exec.retry, || {
                provider.create(&address.kind, &address.name, &attrs)
            }) {
                Ok(realized) => {
                    let resource = RealizedResource {
                        kind: address.kind.clone(),
                        name: address.name.clone(),
                        id: realized.id,
                        attrs: realized.attrs,
                        dependencies: exec.graph.dependencies_of(&key),
                    };
                    lock_unpoisoned(shared).upsert(resource);
                    lock_unpoisoned(journal).push(Step {
                        address: address.clone(),
                        action,
                        before: None,
                    });
                    ApplyResult::Created
                }
                Err(e) => failed(e.to_string()),
            }
        }
        ChangeAction::Update => {
            let Some(before) = snapshot.get(&key).cloned() else {
                return failed(format!("resource {address} is not in state"));
            };
            match with_retry(&exec.retry, || {
                provider.update(&address.kind, &before.id, &attrs)
            }) {
                Ok(realized) => {
                    let resource = RealizedResource {
                        kind: address.kind.clone(),
                        name: address.name.clone(),
                        id: realized.id,
                        attrs: realized.attrs,
                        dependencies: exec.graph.dependencies_of(&key),
                    };
                    lock_unpoisoned(shared).upsert(resource);
                    lock_unpoisoned(journal).push(Step {
                        address: address.clone(),
                        action,
                        before: Some(before),
                    });
                    ApplyResult::Updated
                }
                Err(e) => failed(e.to_string()),
            }
        }
        ChangeAction::Destroy => failed("destroys are not applied in the forward phase".into()),
    }
}

/// Destroy a single resource recorded in state.
fn destroy_one(
    exec: &Execution,
    address: &Address,
    shared: &Mutex<StateSnapshot>,
    journal: &Mutex<Vec<Step>>,
) -> ApplyResult {
    let key = address.to_string();
    let Some(before) = lock_unpoisoned(shared).get(&key).cloned() else {
        return failed(format!("resource {address} is not in state"));
    };

    let provider_name = match exec.registry.kind(&before.kind) {
        Some(schema) => schema.provider.clone(),
        None => return failed(format!("unknown resource kind '{}'", before.kind)),
    };
    let Some(provider) = exec.providers.get(&provider_name) else {
        return failed(format!("no provider configured for '{provider_name}'"));
    };

    match with_retry(&exec.retry, || provider.destroy(&before.kind, &before.id)) {
        Ok(()) => {}
        // Already gone on the platform: converge by dropping it from state
        Err(e) if !e.is_retryable() && matches!(e.category(), crate::provider::ErrorCategory::NotFound) => {
            log::info!("{address} already absent, removing from state");
        }
        Err(e) => return failed(e.to_string()),
    }

    lock_unpoisoned(shared).remove(&key);
    lock_unpoisoned(journal).push(Step {
        address: address.clone(),
        action: ChangeAction::Destroy,
        before: Some(before),
    });
    ApplyResult::Destroyed
}

/// Undo applied steps in reverse order. Returns how many were undone;
/// individual rollback failures are logged and do not cascade.
fn rollback<P: ProgressCallback>(
    exec: &Execution,
    shared: &Mutex<StateSnapshot>,
    journal: &Mutex<Vec<Step>>,
    progress: &mut P,
) -> usize {
    let steps = std::mem::take(&mut *lock_unpoisoned(journal));
    if steps.is_empty() {
        return 0;
    }

    progress.on_phase_start(steps.len(), "rollback");
    let mut rolled_back = 0;

    for step in steps.iter().rev() {
        match rollback_step(exec, step, shared) {
            Ok(()) => {
                rolled_back += 1;
                log::info!("rolled back {} of {}", step.action, step.address);
            }
            Err(e) => {
                log::error!("failed to roll back {} of {}: {e}", step.action, step.address);
            }
        }
    }

    progress.on_phase_complete();
    rolled_back
}

fn rollback_step(exec: &Execution, step: &Step, shared: &Mutex<StateSnapshot>) -> Result<()> {
    let key = step.address.to_string();
    let provider_name = exec
        .registry
        .kind(&step.address.kind)
        .map(|schema| schema.provider.clone())
        .ok_or_else(|| anyhow::anyhow!("unknown resource kind '{}'", step.address.kind))?;
    let provider = exec
        .providers
        .get(&provider_name)
        .ok_or_else(|| anyhow::anyhow!("no provider configured for '{provider_name}'"))?;

    match step.action {
        ChangeAction::Create => {
            let current = lock_unpoisoned(shared).get(&key).cloned();
            if let Some(current) = current {
                provider.destroy(&current.kind, &current.id)?;
                lock_unpoisoned(shared).remove(&key);
            }
        }
        ChangeAction::Update => {
            let before = step
                .before
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("update step has no prior state"))?;
            provider.update(&before.kind, &before.id, &before.attrs)?;
            lock_unpoisoned(shared).upsert(before.clone());
        }
        ChangeAction::Destroy => {
            let before = step
                .before
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("destroy step has no prior state"))?;
            let realized = provider.create(&before.kind, &before.name, &before.attrs)?;
            lock_unpoisoned(shared).upsert(RealizedResource {
                kind: before.kind.clone(),
                name: before.name.clone(),
                id: realized.id,
                attrs: realized.attrs,
                dependencies: before.dependencies.clone(),
            });
        }
    }

    Ok(())
}

/// Evaluate declared outputs against the final state.
fn record_outputs(exec: &Execution, shared: &Mutex<StateSnapshot>) {
    let snapshot = lock_unpoisoned(shared).clone();
    let ctx = EvalContext {
        variables: exec.variables,
        state: &snapshot,
    };

    let mut outputs = BTreeMap::new();
    for output in exec.module.outputs() {
        let context = format!("output '{}'", output.name);
        match crate::resolve::eval_expr(&output.value, &ctx, &context) {
            Ok(ResolvedValue::Known(value)) => {
                outputs.insert(output.name.clone(), value);
            }
            Ok(ResolvedValue::Unknown) => {
                log::warn!("output '{}' is still unknown after apply", output.name);
            }
            Err(e) => log::error!("failed to evaluate output '{}': {e}", output.name),
        }
    }

    lock_unpoisoned(shared).outputs = outputs;
}

fn failed(error: String) -> ApplyResult {
    ApplyResult::Failed { error }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}
