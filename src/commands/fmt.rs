//! `forja fmt` - rewrite declaration files in canonical form.

use crate::cli::FmtArgs;
use crate::{loader, ui, Context};
use anyhow::{bail, Context as AnyhowContext, Result};
use std::fs;

pub fn run(_ctx: &Context, args: &FmtArgs) -> Result<()> {
    let files = loader::find_decl_files(&args.dir)?;
    if files.is_empty() {
        bail!(
            "no declaration files (*.{}) found in {}",
            loader::DECL_EXT,
            args.dir.display()
        );
    }

    let mut changed = Vec::new();

    for file in &files {
        let content = fs::read_to_string(file)
            .with_context(|| format!("Could not read {}", file.display()))?;
        let document = declkit::parse_string(&content)
            .with_context(|| format!("Failed to parse {}", file.display()))?;
        let formatted = declkit::write_string(&document);

        if formatted != content {
            if !args.check {
                fs::write(file, formatted)
                    .with_context(|| format!("Could not write {}", file.display()))?;
            }
            changed.push(file);
        }
    }

    if args.check {
        if changed.is_empty() {
            ui::success("All declaration files are canonically formatted");
            return Ok(());
        }
        for file in &changed {
            println!("  {}", file.display());
        }
        bail!("{} file(s) need formatting", changed.len());
    }

    if changed.is_empty() {
        ui::success("All declaration files already canonical");
    } else {
        for file in &changed {
            ui::dim(&format!("{}", file.display()));
        }
        ui::success(&format!("Formatted {} file(s)", changed.len()));
    }

    Ok(())
}
