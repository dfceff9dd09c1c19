use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "forja")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative cloud-resource provisioning", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check declarations against schemas, references and the dependency graph
    Validate(DirArgs),

    /// Show the change-set a run would apply
    Plan(PlanArgs),

    /// Apply changes so realized state matches the declarations
    Apply(ApplyArgs),

    /// Destroy every resource recorded in state
    Destroy(DestroyArgs),

    /// Reconcile state with what the provider actually has
    Refresh(RefreshArgs),

    /// Show the state snapshot and recorded outputs
    Show(DirArgs),

    /// Print the dependency graph in DOT format
    Graph(DirArgs),

    /// Rewrite declaration files in canonical form
    Fmt(FmtArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Shared argument groups
// ============================================================================

#[derive(Parser)]
pub struct DirArgs {
    /// Project directory holding the declaration files
    #[arg(default_value = ".")]
    pub dir: PathBuf,
}

#[derive(Parser)]
pub struct VarArgs {
    /// Set a variable value (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE")]
    pub vars: Vec<String>,

    /// Read variable values from a TOML file
    #[arg(long = "var-file", value_name = "FILE")]
    pub var_file: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FailurePolicy {
    /// Undo this run's changes in reverse order
    Rollback,
    /// Keep whatever already landed
    Halt,
}

impl From<FailurePolicy> for converge::RollbackPolicy {
    fn from(policy: FailurePolicy) -> Self {
        match policy {
            FailurePolicy::Rollback => Self::Rollback,
            FailurePolicy::Halt => Self::Halt,
        }
    }
}

// ============================================================================
// Per-command arguments
// ============================================================================

#[derive(Parser)]
pub struct PlanArgs {
    /// Project directory holding the declaration files
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    #[command(flatten)]
    pub vars: VarArgs,

    /// Save the computed plan to a file
    #[arg(short, long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Project directory holding the declaration files
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    #[command(flatten)]
    pub vars: VarArgs,

    /// Apply a previously saved plan file
    #[arg(long, value_name = "FILE")]
    pub plan: Option<PathBuf>,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub auto_approve: bool,

    /// Number of parallel jobs within a dependency level
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// What to do when a change fails mid-run
    #[arg(long, value_enum)]
    pub on_failure: Option<FailurePolicy>,
}

#[derive(Parser)]
pub struct DestroyArgs {
    /// Project directory holding the declaration files
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    #[command(flatten)]
    pub vars: VarArgs,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub auto_approve: bool,

    /// What to do when a change fails mid-run
    #[arg(long, value_enum)]
    pub on_failure: Option<FailurePolicy>,
}

#[derive(Parser)]
pub struct RefreshArgs {
    /// Project directory holding the declaration files
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    #[command(flatten)]
    pub vars: VarArgs,
}

#[derive(Parser)]
pub struct FmtArgs {
    /// Project directory holding the declaration files
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Check formatting without rewriting files
    #[arg(long)]
    pub check: bool,
}
