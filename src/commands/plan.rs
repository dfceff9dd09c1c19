//! `forja plan` - compute and display the change-set.

use crate::cli::PlanArgs;
use crate::commands::{compute_plan, prepare};
use crate::{ui, Context};
use anyhow::Result;
use colored::Colorize;
use converge::{ChangeAction, Plan, SchemaRegistry};
use std::collections::BTreeSet;

pub fn run(ctx: &Context, args: &PlanArgs) -> Result<()> {
    ui::header("Plan");

    let prepared = prepare(&args.dir, &args.vars.vars, args.vars.var_file.as_deref())?;
    let plan = compute_plan(&prepared)?;

    if plan.is_empty() {
        println!();
        ui::success("No changes - realized state matches the declarations");
    } else {
        display_plan(ctx, &plan, &prepared.registry);
    }

    if let Some(out) = &args.out {
        plan.save(out)?;
        println!();
        ui::info(&format!("Plan saved to {}", out.display()));
    }

    Ok(())
}

/// Render a change-set, grouped per resource with attribute details.
pub fn display_plan(ctx: &Context, plan: &Plan, registry: &SchemaRegistry) {
    for change in &plan.changes {
        println!();
        println!(
            "  {} {} {}",
            ui::change_symbol(change.action),
            change.address.to_string().bold(),
            format!("({})", change.action).dimmed(),
        );

        match change.action {
            ChangeAction::Create => {
                if let Some(after) = &change.after {
                    for (attr, value) in after {
                        println!(
                            "      {attr} = {}",
                            ui::render_value(value).green()
                        );
                    }
                }
            }
            ChangeAction::Update => display_update(ctx, change, registry),
            ChangeAction::Destroy => {
                if ctx.verbose > 0
                    && let Some(before) = &change.before
                {
                    for (attr, value) in before {
                        println!("      {}", format!("{attr} = {}", ui::render_value(value)).dimmed());
                    }
                }
            }
        }
    }

    let summary = plan.summary();
    println!();
    println!(
        "Plan: {} to create, {} to update, {} to destroy.",
        summary.creates.to_string().green(),
        summary.updates.to_string().yellow(),
        summary.destroys.to_string().red(),
    );
}

fn display_update(
    ctx: &Context,
    change: &converge::ResourceChange,
    registry: &SchemaRegistry,
) {
    let empty = serde_json::Map::new();
    let before = change.before.as_ref().unwrap_or(&empty);
    let after = change.after.as_ref().unwrap_or(&empty);

    let computed: BTreeSet<&str> = registry
        .kind(&change.address.kind)
        .map(|schema| schema.computed_attrs().collect())
        .unwrap_or_default();

    let mut attrs: BTreeSet<&String> = after.keys().collect();
    attrs.extend(before.keys().filter(|k| !computed.contains(k.as_str())));

    for attr in attrs {
        let old = before.get(attr.as_str());
        let new = after.get(attr.as_str());
        if old == new {
            continue;
        }

        match (old, new) {
            (Some(old), Some(new)) => {
                if ctx.verbose > 0 && is_multiline(old) && is_multiline(new) {
                    println!("      ~ {attr}:");
                    show_text_diff(old, new);
                } else {
                    println!(
                        "      ~ {attr}: {} -> {}",
                        ui::render_value(old).red(),
                        ui::render_value(new).green(),
                    );
                }
            }
            (None, Some(new)) => {
                println!("      + {attr} = {}", ui::render_value(new).green());
            }
            (Some(old), None) => {
                println!("      - {attr} (was {})", ui::render_value(old).red());
            }
            (None, None) => {}
        }
    }
}

fn is_multiline(value: &serde_json::Value) -> bool {
    value.as_str().is_some_and(|s| s.contains('\n'))
}

/// Line diff for multi-line string attributes
fn show_text_diff(old: &serde_json::Value, new: &serde_json::Value) {
    let (Some(old), Some(new)) = (old.as_str(), new.as_str()) else {
        return;
    };

    let diff = similar::TextDiff::from_lines(old, new);
    for line in diff.iter_all_changes() {
        match line.tag() {
            similar::ChangeTag::Delete => print!("        {}", format!("- {line}").red()),
            similar::ChangeTag::Insert => print!("        {}", format!("+ {line}").green()),
            similar::ChangeTag::Equal => {}
        }
    }
}
