//! Full-module validation - everything that must hold before provider calls.
//!
//! Composes the three validation phases: schema checks, reference checks,
//! and graph construction with cycle detection. All errors are collected
//! rather than failing on the first.

use crate::error::Error;
use crate::graph::{self, DependencyGraph};
use crate::schema::SchemaRegistry;
use crate::types::Module;

/// Validate a module end to end.
///
/// On success returns the dependency graph, ready for planning and
/// execution. On failure returns every error found.
pub fn validate_module(
    module: &Module,
    registry: &SchemaRegistry,
) -> std::result::Result<DependencyGraph, Vec<Error>> {
    let mut errors = registry.validate_module(module);
    errors.extend(graph::validate_references(module, registry));

    let graph = graph::build(module);
    if let Err(cycle) = graph.topo_order() {
        errors.push(cycle);
    }

    if errors.is_empty() {
        Ok(graph)
    } else {
        Err(errors)
    }
}
