//! # converge
//!
//! The provisioning engine behind forja: declared state in, realized
//! infrastructure out.
//!
//! ## Core concepts
//!
//! - **Module**: every declaration loaded for a run (resources, variables,
//!   providers, outputs)
//! - **SchemaRegistry**: the legal attributes and types per resource kind
//! - **DependencyGraph**: reference-derived edges between resources; must be
//!   a DAG
//! - **Plan**: the change-set (create/update/destroy per resource) produced
//!   by diffing declarations against the state snapshot
//! - **Provider**: the seam to a target platform (create/update/destroy/read)
//! - **StateSnapshot**: the last-applied record of realized resources
//!
//! ## Pipeline
//!
//! ```text
//! parse (declkit) -> validate (schema + references + graph)
//!                 -> resolve (variables, then attribute expressions)
//!                 -> diff against state -> plan
//!                 -> execute (dependency order, rollback on failure)
//! ```
//!
//! Validation runs to completion before any provider call: unknown kinds and
//! attributes, missing required attributes, type mismatches, undefined
//! references, and dependency cycles are all reported up front.
//!
//! ## Provider traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`Provider`]: realizes resources on a target platform
//! - [`ProgressCallback`]: receives execution progress
//! - [`ConfirmCallback`]: handles user confirmations
//!
//! This keeps the engine free of terminal UI and cloud API dependencies.

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod graph;
pub mod plan;
pub mod provider;
pub mod resolve;
pub mod schema;
pub mod state;
pub mod types;
pub mod validate;

// Re-export main types at crate root
pub use context::{
    AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback,
};
pub use diff::{
    compute_changes, destroy_order, ChangeAction, PlanSummary, ResourceChange,
    KNOWN_AFTER_APPLY,
};
pub use error::{Error, Result};
pub use executor::{execute, Execution};
pub use graph::DependencyGraph;
pub use plan::{Plan, PLAN_VERSION};
pub use provider::{
    with_retry, AttrMap, ErrorCategory, Provider, ProviderError, ProviderMap, ProviderResult,
    Realized, RetryConfig,
};
pub use resolve::{eval_expr, resolve_resource, resolve_variables, EvalContext, ResolvedValue};
pub use schema::{AttrSchema, AttrType, KindSchema, ProviderSchema, SchemaRegistry};
pub use state::{RealizedResource, StateSnapshot, STATE_VERSION};
pub use types::{
    Address, ApplyResult, ExecuteOptions, ExecuteSummary, Module, OutputDecl, ProviderDecl,
    ResourceDecl, RollbackPolicy, VarType, VariableDecl,
};
pub use validate::validate_module;
