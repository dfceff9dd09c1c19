//! `forja refresh` - reconcile state with what the provider actually has.
//!
//! Reads every realized resource back from its provider: attributes that
//! changed out of band are adopted into the snapshot, resources that are
//! gone are dropped from it. The next plan then shows what it would take to
//! converge back to the declarations.

use crate::cli::RefreshArgs;
use crate::commands::prepare;
use crate::{loader, provider, ui, Context};
use anyhow::Result;
use colored::Colorize;

pub fn run(ctx: &Context, args: &RefreshArgs) -> Result<()> {
    ui::header("Refresh");

    let mut prepared = prepare(&args.dir, &args.vars.vars, args.vars.var_file.as_deref())?;
    let providers =
        provider::build_providers(&prepared.module, &prepared.variables, &prepared.dir)?;

    if prepared.state.is_empty() {
        println!();
        ui::success("State is empty - nothing to refresh");
        return Ok(());
    }

    let mut drifted = 0usize;
    let mut removed = 0usize;

    println!();
    for (address, recorded) in prepared.state.resources.clone() {
        let Some(schema) = prepared.registry.kind(&recorded.kind) else {
            ui::warn(&format!("{address}: unknown kind, skipping"));
            continue;
        };
        let Some(provider) = providers.get(&schema.provider) else {
            ui::warn(&format!("{address}: no provider '{}', skipping", schema.provider));
            continue;
        };

        match provider.read(&recorded.kind, &recorded.id)? {
            None => {
                prepared.state.remove(&address);
                removed += 1;
                println!("  {} {} {}", "-".red(), address.bold(), "(gone)".dimmed());
            }
            Some(realized) if realized.attrs != recorded.attrs => {
                let mut updated = recorded.clone();
                updated.attrs = realized.attrs;
                prepared.state.upsert(updated);
                drifted += 1;
                println!("  {} {} {}", "~".yellow(), address.bold(), "(drifted)".dimmed());
            }
            Some(_) => {
                if ctx.verbose > 0 {
                    ui::dim(&format!("{address} unchanged"));
                }
            }
        }
    }

    println!();
    if drifted + removed > 0 {
        prepared
            .state
            .save(&loader::state_path(&prepared.dir))?;
        ui::warn(&format!(
            "State refreshed: {drifted} drifted, {removed} gone - run 'forja plan' to see what changed"
        ));
    } else {
        ui::success("State is up to date with the provider");
    }

    Ok(())
}
