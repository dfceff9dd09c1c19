//! `forja apply` - converge realized state to the declarations.

use crate::cli::ApplyArgs;
use crate::commands::{compute_plan, prepare, Prepared};
use crate::config::Settings;
use crate::progress::ApplyProgress;
use crate::{loader, provider, ui, Context};
use anyhow::{bail, Result};
use colored::Colorize;
use converge::{
    ConfirmCallback, ExecuteOptions, ExecuteSummary, Execution, Plan, RetryConfig,
    RollbackPolicy,
};

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    ui::header("Apply");

    let mut prepared = prepare(&args.dir, &args.vars.vars, args.vars.var_file.as_deref())?;

    let plan = match &args.plan {
        Some(path) => {
            let plan = Plan::load(path)?;
            if !plan.matches_config(&prepared.hash) {
                bail!(
                    "saved plan is stale: declaration files changed since it was computed \
                     (run 'forja plan' again)"
                );
            }
            ui::info(&format!(
                "Using saved plan from {} (created {})",
                path.display(),
                plan.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            ));
            // Apply with the variable values the plan was computed with
            prepared.variables = plan.variables.clone();
            plan
        }
        None => compute_plan(&prepared)?,
    };

    if plan.is_empty() {
        println!();
        ui::success("No changes - realized state matches the declarations");
        return Ok(());
    }

    super::plan::display_plan(ctx, &plan, &prepared.registry);
    println!();

    let settings = Settings::load()?;
    let opts = ExecuteOptions {
        jobs: args.jobs.or(settings.jobs).unwrap_or(4),
        on_failure: args
            .on_failure
            .map(RollbackPolicy::from)
            .or(settings.failure_policy()?)
            .unwrap_or_default(),
        verbose: ctx.verbose > 0,
    };

    let summary = execute_plan(ctx, &mut prepared, &plan, &opts, args.auto_approve)?;

    if summary.total_changes() > 0 || summary.rolled_back > 0 {
        prepared
            .state
            .save(&loader::state_path(&prepared.dir))?;
    }

    print_summary(&summary);

    if summary.is_success() && !prepared.state.outputs.is_empty() {
        ui::section("Outputs");
        for (name, value) in &prepared.state.outputs {
            ui::kv(name, &ui::render_value(value));
        }
    }

    if !summary.is_success() {
        bail!("apply finished with {} failed change(s)", summary.failed);
    }

    Ok(())
}

/// Run the executor with CLI-backed progress and confirmation.
pub fn execute_plan(
    ctx: &Context,
    prepared: &mut Prepared,
    plan: &Plan,
    opts: &ExecuteOptions,
    auto_approve: bool,
) -> Result<ExecuteSummary> {
    let providers =
        provider::build_providers(&prepared.module, &prepared.variables, &prepared.dir)?;

    let execution = Execution {
        module: &prepared.module,
        registry: &prepared.registry,
        graph: &prepared.graph,
        variables: &prepared.variables,
        providers: &providers,
        retry: RetryConfig::default(),
    };

    let mut progress = ApplyProgress::new(!ctx.quiet);
    let mut confirm = PromptConfirm { auto: auto_approve };

    converge::execute(
        &execution,
        plan,
        &mut prepared.state,
        opts,
        &mut progress,
        &mut confirm,
    )
}

/// Confirmation via dialoguer, with an auto-approve escape hatch
pub struct PromptConfirm {
    pub auto: bool,
}

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        if self.auto {
            return Ok(true);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;
        Ok(confirmed)
    }
}

/// Print the final execution summary.
pub fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        if summary.total_changes() == 0 {
            ui::info("Nothing was applied");
        } else {
            ui::success(&format!(
                "Applied: {} created, {} updated, {} destroyed",
                summary.created.to_string().green(),
                summary.updated.to_string().yellow(),
                summary.destroyed.to_string().red(),
            ));
        }
    } else {
        ui::error(&format!(
            "{} change(s) failed, {} applied, {} rolled back, {} skipped",
            summary.failed,
            summary.total_changes(),
            summary.rolled_back,
            summary.skipped,
        ));
    }
}
