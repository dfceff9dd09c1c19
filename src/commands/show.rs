//! `forja show` - render the state snapshot.

use crate::cli::DirArgs;
use crate::{loader, ui, Context};
use anyhow::Result;
use colored::Colorize;
use converge::StateSnapshot;

pub fn run(ctx: &Context, args: &DirArgs) -> Result<()> {
    let state = StateSnapshot::load(&loader::state_path(&args.dir))?;

    if state.is_empty() && state.outputs.is_empty() {
        ui::info("State is empty - nothing has been applied yet");
        return Ok(());
    }

    ui::header("State");
    ui::kv("Serial", &state.serial.to_string());
    ui::kv(
        "Last updated",
        &state.last_updated.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );
    ui::kv("Resources", &state.resources.len().to_string());

    for (address, resource) in &state.resources {
        ui::section(address);
        ui::kv("id", &resource.id);
        if !resource.dependencies.is_empty() {
            ui::kv("depends on", &resource.dependencies.join(", "));
        }
        if ctx.verbose > 0 {
            for (attr, value) in &resource.attrs {
                if attr != "id" {
                    println!("  {attr} = {}", ui::render_value(value));
                }
            }
        } else {
            ui::dim(&format!("{} attribute(s)", resource.attrs.len()));
        }
    }

    if !state.outputs.is_empty() {
        ui::section("Outputs");
        for (name, value) in &state.outputs {
            println!("  {} = {}", name.bold(), ui::render_value(value));
        }
    }

    Ok(())
}
