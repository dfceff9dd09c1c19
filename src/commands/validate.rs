//! `forja validate` - structural validation without touching providers.

use crate::cli::DirArgs;
use crate::{catalog, loader, ui, Context};
use anyhow::{bail, Result};

pub fn run(_ctx: &Context, args: &DirArgs) -> Result<()> {
    ui::header("Validate");

    let loaded = loader::load_dir(&args.dir)?;
    let registry = catalog::builtin_registry();

    match converge::validate_module(&loaded.module, &registry) {
        Ok(graph) => {
            println!();
            ui::success(&format!(
                "Configuration is valid: {} resource(s), {} variable(s), {} output(s) in {} file(s)",
                graph.node_count(),
                loaded.module.variables().count(),
                loaded.module.outputs().count(),
                loaded.files.len(),
            ));
            Ok(())
        }
        Err(errors) => {
            println!();
            for error in &errors {
                ui::error(&error.to_string());
            }
            bail!(
                "configuration is not valid ({} error{})",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            );
        }
    }
}
