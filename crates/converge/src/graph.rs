//! Dependency graph over declared resources.
//!
//! Edges are inferred from attribute references: `A -> B` when an attribute
//! of A references an attribute of B. Variable references do not create
//! edges; variables are resolved before the graph is built. The graph must
//! be a DAG; cycles are reported with their full path.

use crate::error::Error;
use crate::schema::SchemaRegistry;
use crate::types::{Address, Module};
use declkit::Reference;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

/// Dependency graph of declared resources
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<Address>,
    /// address -> addresses it depends on
    deps: BTreeMap<String, BTreeSet<String>>,
}

/// Validate every reference in a module against declarations and schemas.
///
/// Covers resource attributes and output values: referenced variables must
/// be declared, referenced resources must be declared, and the referenced
/// attribute must exist in the resource kind's schema.
pub fn validate_references(module: &Module, registry: &SchemaRegistry) -> Vec<Error> {
    let mut errors = Vec::new();

    let mut sites: Vec<(String, Vec<Reference>)> = Vec::new();
    for decl in module.resources() {
        let mut refs = Vec::new();
        for expr in decl.attrs.values() {
            expr.references(&mut refs);
        }
        sites.push((decl.address.to_string(), refs));
    }
    for output in module.outputs() {
        let mut refs = Vec::new();
        output.value.references(&mut refs);
        sites.push((format!("output '{}'", output.name), refs));
    }

    for (site, refs) in sites {
        for reference in refs {
            match &reference {
                Reference::Var(name) => {
                    if module.variable(name).is_none() {
                        errors.push(Error::UndefinedVariable {
                            name: name.clone(),
                            referenced_by: site.clone(),
                        });
                    }
                }
                Reference::Attr { kind, name, path } => {
                    let address = format!("{kind}.{name}");
                    if !module.has_resource(&address) {
                        errors.push(Error::UndefinedResource {
                            reference: reference.to_string(),
                            referenced_by: site.clone(),
                        });
                        continue;
                    }
                    if let Some(schema) = registry.kind(kind)
                        && !schema.has_attr(&path[0])
                    {
                        errors.push(Error::UnknownReferenceAttribute {
                            reference: reference.to_string(),
                            attr: path[0].clone(),
                        });
                    }
                }
            }
        }
    }

    errors
}

/// Build the dependency graph for a module.
///
/// Only edges to declared resources are recorded; dangling references are
/// the business of [`validate_references`].
pub fn build(module: &Module) -> DependencyGraph {
    let mut graph = DependencyGraph::default();

    for decl in module.resources() {
        let address = decl.address.to_string();
        let mut refs = Vec::new();
        for expr in decl.attrs.values() {
            expr.references(&mut refs);
        }

        let deps: BTreeSet<String> = refs
            .into_iter()
            .filter_map(|r| match r {
                Reference::Attr { kind, name, .. } => {
                    let target = format!("{kind}.{name}");
                    module.has_resource(&target).then_some(target)
                }
                Reference::Var(_) => None,
            })
            .collect();

        graph.nodes.push(decl.address.clone());
        graph.deps.insert(address, deps);
    }

    graph.nodes.sort();
    graph
}

impl DependencyGraph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Addresses a resource depends on.
    pub fn dependencies_of(&self, address: &str) -> Vec<String> {
        self.deps
            .get(address)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Deterministic topological order: dependencies before dependents,
    /// ties broken by address.
    pub fn topo_order(&self) -> Result<Vec<Address>, Error> {
        let mut order = Vec::with_capacity(self.nodes.len());
        for level in self.levels()? {
            order.extend(level);
        }
        Ok(order)
    }

    /// Partition nodes into dependency levels. All dependencies of a level
    /// member sit in earlier levels, so members of one level are safe to
    /// apply in parallel.
    pub fn levels(&self) -> Result<Vec<Vec<Address>>, Error> {
        let mut remaining: BTreeMap<&str, BTreeSet<&str>> = self
            .deps
            .iter()
            .map(|(node, deps)| {
                (
                    node.as_str(),
                    deps.iter().map(String::as_str).collect::<BTreeSet<_>>(),
                )
            })
            .collect();

        let mut levels = Vec::new();
        let mut done: BTreeSet<&str> = BTreeSet::new();

        while !remaining.is_empty() {
            let ready: Vec<&str> = remaining
                .iter()
                .filter(|(_, deps)| deps.iter().all(|d| done.contains(d)))
                .map(|(node, _)| *node)
                .collect();

            if ready.is_empty() {
                return Err(self.find_cycle(&remaining));
            }

            for &node in &ready {
                remaining.remove(node);
                done.insert(node);
            }

            levels.push(
                ready
                    .iter()
                    .map(|node| Address::parse(node).expect("node addresses are well-formed"))
                    .collect(),
            );
        }

        Ok(levels)
    }

    /// Extract one cycle from the stuck remainder of a topological sort.
    fn find_cycle(&self, remaining: &BTreeMap<&str, BTreeSet<&str>>) -> Error {
        let start = remaining
            .keys()
            .next()
            .copied()
            .expect("find_cycle called with nodes remaining");

        let mut path: Vec<&str> = vec![start];
        let mut seen: BTreeMap<&str, usize> = BTreeMap::from([(start, 0)]);
        let mut current = start;

        loop {
            // Follow any unmet dependency that is itself stuck
            let next = remaining[current]
                .iter()
                .find(|d| remaining.contains_key(*d))
                .copied()
                .expect("stuck nodes always have a stuck dependency");

            if let Some(&first) = seen.get(next) {
                let mut cycle: Vec<String> =
                    path[first..].iter().map(ToString::to_string).collect();
                cycle.push(next.to_string());
                return Error::Cycle { path: cycle };
            }

            seen.insert(next, path.len());
            path.push(next);
            current = next;
        }
    }

    /// Render the graph in DOT format. An edge `a -> b` means a depends
    /// on b.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph dependencies {\n");
        out.push_str("  rankdir = \"BT\";\n");

        for node in &self.nodes {
            writeln!(out, "  \"{node}\";").unwrap();
        }
        for (node, deps) in &self.deps {
            for dep in deps {
                writeln!(out, "  \"{node}\" -> \"{dep}\";").unwrap();
            }
        }

        out.push_str("}\n");
        out
    }
}
