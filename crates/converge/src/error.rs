//! Validation and resolution errors.
//!
//! Everything here is raised before any provider call is made. Errors from
//! provider operations live in [`crate::provider::ProviderError`] and carry
//! their own retryability categories.

use crate::types::Address;
use thiserror::Error;

/// Errors from schema validation and reference resolution
#[derive(Debug, Error)]
pub enum Error {
    /// Two resource declarations share a kind and local name
    #[error("duplicate resource: {address}")]
    DuplicateResource { address: Address },

    /// Two variable declarations share a name
    #[error("duplicate variable: {name}")]
    DuplicateVariable { name: String },

    /// Two provider blocks share a name
    #[error("duplicate provider: {name}")]
    DuplicateProvider { name: String },

    /// Two output declarations share a name
    #[error("duplicate output: {name}")]
    DuplicateOutput { name: String },

    /// Resource declared with a kind the registry does not know
    #[error("unknown resource kind '{}' ({address})", address.kind)]
    UnknownKind { address: Address },

    /// Attribute not present in the kind's schema
    #[error("unknown attribute '{attr}' on {address}")]
    UnknownAttribute { address: Address, attr: String },

    /// Declaration assigns a provider-assigned attribute
    #[error("attribute '{attr}' on {address} is provider-assigned and cannot be set")]
    ComputedAttribute { address: Address, attr: String },

    /// Required attribute missing from a declaration
    #[error("missing required attribute '{attr}' on {address}")]
    MissingRequired { address: Address, attr: String },

    /// Attribute value does not match its schema type
    #[error("type mismatch for '{attr}' on {address}: expected {expected}, found {found}")]
    TypeMismatch {
        address: Address,
        attr: String,
        expected: String,
        found: String,
    },

    /// Provider block has no registered schema
    #[error("unknown provider '{name}'")]
    UnknownProvider { name: String },

    /// Attribute not present in the provider's schema
    #[error("unknown attribute '{attr}' for provider '{provider}'")]
    UnknownProviderAttribute { provider: String, attr: String },

    /// Reference to a variable that is not declared
    #[error("undefined variable 'var.{name}' referenced by {referenced_by}")]
    UndefinedVariable {
        name: String,
        referenced_by: String,
    },

    /// Variable has no default and no supplied value
    #[error("variable '{name}' has no value: supply --var {name}=... or add a default")]
    UnsetVariable { name: String },

    /// Supplied value does not match the variable's declared type
    #[error("invalid value for variable '{name}': expected {expected}")]
    InvalidVariableValue { name: String, expected: String },

    /// Value supplied for a variable nothing declares
    #[error("value supplied for undeclared variable '{name}'")]
    UndeclaredVariableValue { name: String },

    /// Variable default contains references
    #[error("default for variable '{name}' must be a literal value")]
    NonLiteralDefault { name: String },

    /// Reference to a resource that is not declared
    #[error("undefined resource '{reference}' referenced by {referenced_by}")]
    UndefinedResource {
        reference: String,
        referenced_by: String,
    },

    /// Reference names an attribute the kind's schema does not have
    #[error("reference '{reference}' names unknown attribute '{attr}'")]
    UnknownReferenceAttribute { reference: String, attr: String },

    /// Dependency graph contains a cycle
    #[error("dependency cycle: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    /// Expression cannot be evaluated in this position
    #[error("invalid expression in {context}: {message}")]
    InvalidExpression { context: String, message: String },

    /// A value was still unknown when it had to be concrete
    #[error("value of '{attr}' on {address} is not known yet")]
    UnresolvedValue { address: Address, attr: String },
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;
