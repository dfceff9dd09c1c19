//! `forja destroy` - tear down everything recorded in state.

use crate::cli::DestroyArgs;
use crate::commands::apply::{execute_plan, print_summary};
use crate::commands::prepare;
use crate::config::Settings;
use crate::{loader, ui, Context};
use anyhow::{bail, Result};
use colored::Colorize;
use converge::{
    Address, ChangeAction, ExecuteOptions, Plan, ResourceChange, RollbackPolicy,
};
use std::collections::BTreeSet;

pub fn run(ctx: &Context, args: &DestroyArgs) -> Result<()> {
    ui::header("Destroy");

    let mut prepared = prepare(&args.dir, &args.vars.vars, args.vars.var_file.as_deref())?;

    if prepared.state.is_empty() {
        println!();
        ui::success("Nothing to destroy - state is empty");
        return Ok(());
    }

    let all: BTreeSet<String> = prepared
        .state
        .addresses()
        .map(ToString::to_string)
        .collect();

    let changes: Vec<ResourceChange> = converge::destroy_order(&prepared.state, &all)
        .into_iter()
        .filter_map(|address| {
            let before = prepared.state.get(&address).map(|r| r.attrs.clone());
            Address::parse(&address).map(|parsed| ResourceChange {
                address: parsed,
                action: ChangeAction::Destroy,
                before,
                after: None,
            })
        })
        .collect();

    let plan = Plan::new(prepared.hash.clone(), prepared.variables.clone(), changes);

    println!();
    ui::warn(&format!(
        "The following {} resource(s) will be destroyed:",
        plan.changes.len()
    ));
    for change in &plan.changes {
        println!(
            "  {} {}",
            ui::change_symbol(change.action),
            change.address.to_string().bold()
        );
    }
    println!();

    let settings = Settings::load()?;
    let opts = ExecuteOptions {
        jobs: 1,
        on_failure: args
            .on_failure
            .map(RollbackPolicy::from)
            .or(settings.failure_policy()?)
            .unwrap_or_default(),
        verbose: ctx.verbose > 0,
    };

    let summary = execute_plan(ctx, &mut prepared, &plan, &opts, args.auto_approve)?;

    if summary.total_changes() > 0 || summary.rolled_back > 0 {
        prepared.state.save(&loader::state_path(&prepared.dir))?;
    }

    print_summary(&summary);

    if !summary.is_success() {
        bail!("destroy finished with {} failed change(s)", summary.failed);
    }

    Ok(())
}
