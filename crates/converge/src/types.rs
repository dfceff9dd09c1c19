//! Core types for the provisioning engine

use crate::error::{Error, Result};
use declkit::Expr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Addresses
// ============================================================================

/// The identity of a declared resource: `<kind>.<name>`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Address {
    pub kind: String,
    pub name: String,
}

impl Address {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Parse an address from its `kind.name` form.
    pub fn parse(s: &str) -> Option<Self> {
        let (kind, name) = s.split_once('.')?;
        if kind.is_empty() || name.is_empty() || name.contains('.') {
            return None;
        }
        Some(Self::new(kind, name))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.name)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl TryFrom<String> for Address {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| format!("invalid resource address: '{s}'"))
    }
}

// ============================================================================
// Declarations
// ============================================================================

/// A declared resource: kind, local name, attribute expressions
#[derive(Debug, Clone)]
pub struct ResourceDecl {
    pub address: Address,
    pub attrs: BTreeMap<String, Expr>,
    /// Line the declaration starts on in its source file (1-indexed)
    pub line: usize,
}

/// Declared type of an input variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    String,
    Number,
    Bool,
    List,
    Map,
}

impl VarType {
    /// Parse a type name as written in a `variable` block.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "bool" => Some(Self::Bool),
            "list" => Some(Self::List),
            "map" => Some(Self::Map),
            _ => None,
        }
    }

    /// Check a resolved value against this type.
    pub fn check(&self, value: &serde_json::Value) -> bool {
        use serde_json::Value;
        matches!(
            (self, value),
            (Self::String, Value::String(_))
                | (Self::Number, Value::Number(_))
                | (Self::Bool, Value::Bool(_))
                | (Self::List, Value::Array(_))
                | (Self::Map, Value::Object(_))
        )
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Bool => "bool",
            Self::List => "list",
            Self::Map => "map",
        };
        write!(f, "{name}")
    }
}

/// A declared input variable
#[derive(Debug, Clone)]
pub struct VariableDecl {
    pub name: String,
    pub var_type: VarType,
    /// Default value expression; must be a literal
    pub default: Option<Expr>,
    pub description: Option<String>,
}

/// A provider configuration block
#[derive(Debug, Clone)]
pub struct ProviderDecl {
    pub name: String,
    pub config: BTreeMap<String, Expr>,
    pub line: usize,
}

/// A declared output value
#[derive(Debug, Clone)]
pub struct OutputDecl {
    pub name: String,
    pub value: Expr,
    pub description: Option<String>,
}

// ============================================================================
// Module - all declarations loaded for a run
// ============================================================================

/// Every declaration loaded from a project directory
#[derive(Debug, Clone, Default)]
pub struct Module {
    resources: BTreeMap<String, ResourceDecl>,
    variables: BTreeMap<String, VariableDecl>,
    providers: BTreeMap<String, ProviderDecl>,
    outputs: BTreeMap<String, OutputDecl>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource declaration, rejecting duplicates.
    pub fn add_resource(&mut self, decl: ResourceDecl) -> Result<()> {
        let key = decl.address.to_string();
        if self.resources.contains_key(&key) {
            return Err(Error::DuplicateResource {
                address: decl.address,
            });
        }
        self.resources.insert(key, decl);
        Ok(())
    }

    /// Add a variable declaration, rejecting duplicates.
    pub fn add_variable(&mut self, decl: VariableDecl) -> Result<()> {
        if self.variables.contains_key(&decl.name) {
            return Err(Error::DuplicateVariable { name: decl.name });
        }
        self.variables.insert(decl.name.clone(), decl);
        Ok(())
    }

    /// Add a provider configuration, rejecting duplicates.
    pub fn add_provider(&mut self, decl: ProviderDecl) -> Result<()> {
        if self.providers.contains_key(&decl.name) {
            return Err(Error::DuplicateProvider { name: decl.name });
        }
        self.providers.insert(decl.name.clone(), decl);
        Ok(())
    }

    /// Add an output declaration, rejecting duplicates.
    pub fn add_output(&mut self, decl: OutputDecl) -> Result<()> {
        if self.outputs.contains_key(&decl.name) {
            return Err(Error::DuplicateOutput { name: decl.name });
        }
        self.outputs.insert(decl.name.clone(), decl);
        Ok(())
    }

    pub fn resource(&self, address: &Address) -> Option<&ResourceDecl> {
        self.resources.get(&address.to_string())
    }

    pub fn has_resource(&self, address: &str) -> bool {
        self.resources.contains_key(address)
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceDecl> {
        self.resources.values()
    }

    pub fn variable(&self, name: &str) -> Option<&VariableDecl> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = &VariableDecl> {
        self.variables.values()
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderDecl> {
        self.providers.get(name)
    }

    pub fn providers(&self) -> impl Iterator<Item = &ProviderDecl> {
        self.providers.values()
    }

    pub fn outputs(&self) -> impl Iterator<Item = &OutputDecl> {
        self.outputs.values()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.outputs.is_empty()
    }
}

// ============================================================================
// Execution results
// ============================================================================

/// Result of applying a single change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// Resource was created
    Created,
    /// Resource was updated in place
    Updated,
    /// Resource was destroyed
    Destroyed,
    /// Apply failed
    Failed { error: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub destroyed: usize,
    pub failed: usize,
    /// Changes not attempted (declined confirmation, or halted after a failure)
    pub skipped: usize,
    /// Changes undone by the rollback policy
    pub rolled_back: usize,
}

impl ExecuteSummary {
    /// Total number of changes that landed
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.destroyed
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::Created => self.created += 1,
            ApplyResult::Updated => self.updated += 1,
            ApplyResult::Destroyed => self.destroyed += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
        }
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ExecuteSummary) {
        self.created += other.created;
        self.updated += other.updated;
        self.destroyed += other.destroyed;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.rolled_back += other.rolled_back;
    }
}

/// What to do when a change fails mid-plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollbackPolicy {
    /// Undo every change applied in this run, in reverse order
    #[default]
    Rollback,
    /// Stop scheduling new changes but keep what already landed
    Halt,
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Number of parallel jobs within a dependency level
    pub jobs: usize,
    /// Failure policy
    pub on_failure: RollbackPolicy,
    /// Verbose output
    pub verbose: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            jobs: 4,
            on_failure: RollbackPolicy::Rollback,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_and_display() {
        let address = Address::parse("compute_instance.web").unwrap();
        assert_eq!(address.kind, "compute_instance");
        assert_eq!(address.name, "web");
        assert_eq!(address.to_string(), "compute_instance.web");

        assert!(Address::parse("no_dot").is_none());
        assert!(Address::parse("too.many.dots").is_none());
        assert!(Address::parse(".empty").is_none());
    }

    #[test]
    fn test_var_type_check() {
        use serde_json::json;
        assert!(VarType::String.check(&json!("x")));
        assert!(!VarType::String.check(&json!(1)));
        assert!(VarType::Number.check(&json!(1.5)));
        assert!(VarType::Bool.check(&json!(true)));
        assert!(VarType::List.check(&json!(["a"])));
        assert!(VarType::Map.check(&json!({"k": "v"})));
        assert!(!VarType::Map.check(&json!(["a"])));
    }

    #[test]
    fn test_module_rejects_duplicates() {
        let mut module = Module::new();
        let decl = ResourceDecl {
            address: Address::new("storage_bucket", "assets"),
            attrs: BTreeMap::new(),
            line: 1,
        };
        module.add_resource(decl.clone()).unwrap();
        let err = module.add_resource(decl).unwrap_err();
        assert!(matches!(err, Error::DuplicateResource { .. }));
    }

    #[test]
    fn test_summary_add_and_merge() {
        let mut summary = ExecuteSummary::default();
        summary.add_result(&ApplyResult::Created);
        summary.add_result(&ApplyResult::Updated);
        summary.add_result(&ApplyResult::Failed {
            error: "boom".to_string(),
        });
        assert_eq!(summary.total_changes(), 2);
        assert!(!summary.is_success());

        let mut other = ExecuteSummary::default();
        other.add_result(&ApplyResult::Destroyed);
        summary.merge(&other);
        assert_eq!(summary.destroyed, 1);
        assert_eq!(summary.total_changes(), 3);
    }
}
