//! `forja graph` - dependency graph in DOT format.

use crate::cli::DirArgs;
use crate::{catalog, loader, ui, Context};
use anyhow::{bail, Result};

pub fn run(_ctx: &Context, args: &DirArgs) -> Result<()> {
    let loaded = loader::load_dir(&args.dir)?;
    let registry = catalog::builtin_registry();

    match converge::validate_module(&loaded.module, &registry) {
        Ok(graph) => {
            print!("{}", graph.to_dot());
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                ui::error(&error.to_string());
            }
            bail!("cannot build graph from an invalid configuration");
        }
    }
}
