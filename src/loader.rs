//! Declaration loading - discover, parse and assemble a module.
//!
//! Declaration files (`*.fja`) are discovered non-recursively in the project
//! directory, parsed with declkit, and assembled into a [`Module`]. The
//! loader also computes the blake3 content hash that pins plans to the
//! configuration they were computed from.

use anyhow::{bail, Context, Result};
use converge::{
    Address, Module, OutputDecl, ProviderDecl, ResourceDecl, VarType, VariableDecl,
};
use declkit::{Block, Expr};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extension of declaration files
pub const DECL_EXT: &str = "fja";

/// State snapshot file name within a project directory
pub const STATE_FILE: &str = "forja.state.json";

/// A loaded project configuration
pub struct LoadedConfig {
    pub module: Module,
    pub files: Vec<PathBuf>,
    /// blake3 hash over the declaration files
    pub hash: String,
}

/// Path of the state snapshot for a project directory.
pub fn state_path(dir: &Path) -> PathBuf {
    dir.join(STATE_FILE)
}

/// Find declaration files in a project directory, sorted by name.
pub fn find_decl_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("not a directory: {}", dir.display());
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| {
            entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == DECL_EXT)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    Ok(files)
}

/// Load every declaration file in a directory into a module.
pub fn load_dir(dir: &Path) -> Result<LoadedConfig> {
    let files = find_decl_files(dir)?;
    if files.is_empty() {
        bail!(
            "no declaration files (*.{DECL_EXT}) found in {}",
            dir.display()
        );
    }

    let mut module = Module::new();
    for file in &files {
        let document = declkit::parse_file(file)
            .with_context(|| format!("Failed to parse {}", file.display()))?;
        for block in &document.blocks {
            add_block(&mut module, block)
                .with_context(|| format!("{}:{}", file.display(), block.line))?;
        }
    }

    let hash = config_hash(&files)?;
    log::debug!(
        "loaded {} resources from {} files (hash {})",
        module.resource_count(),
        files.len(),
        &hash[..8],
    );

    Ok(LoadedConfig {
        module,
        files,
        hash,
    })
}

/// Hash the declaration files that make up a configuration.
pub fn config_hash(files: &[PathBuf]) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    for file in files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let content = std::fs::read(file)
            .with_context(|| format!("Could not read {}", file.display()))?;
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
        hasher.update(&content);
        hasher.update(&[0]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Convert a parsed block into a module entry.
fn add_block(module: &mut Module, block: &Block) -> Result<()> {
    match block.keyword.as_str() {
        "resource" => {
            let [kind, name] = block.labels.as_slice() else {
                bail!("resource block requires kind and name labels");
            };
            let attrs = block
                .body
                .to_attr_exprs()
                .into_iter()
                .map(|(name, expr, _)| (name, expr))
                .collect();
            module.add_resource(ResourceDecl {
                address: Address::new(kind.clone(), name.clone()),
                attrs,
                line: block.line,
            })?;
        }
        "variable" => {
            let [name] = block.labels.as_slice() else {
                bail!("variable block requires a name label");
            };
            module.add_variable(parse_variable(name, block)?)?;
        }
        "provider" => {
            let [name] = block.labels.as_slice() else {
                bail!("provider block requires a name label");
            };
            let config = block
                .body
                .to_attr_exprs()
                .into_iter()
                .map(|(name, expr, _)| (name, expr))
                .collect();
            module.add_provider(ProviderDecl {
                name: name.clone(),
                config,
                line: block.line,
            })?;
        }
        "output" => {
            let [name] = block.labels.as_slice() else {
                bail!("output block requires a name label");
            };
            let mut value = None;
            let mut description = None;
            for (attr, expr, line) in block.body.to_attr_exprs() {
                match attr.as_str() {
                    "value" => value = Some(expr),
                    "description" => description = Some(literal_string(&expr, line)?),
                    other => bail!("unsupported attribute '{other}' in output block"),
                }
            }
            let Some(value) = value else {
                bail!("output '{name}' is missing its value attribute");
            };
            module.add_output(OutputDecl {
                name: name.clone(),
                value,
                description,
            })?;
        }
        other => bail!("unknown block type '{other}'"),
    }

    Ok(())
}

fn parse_variable(name: &str, block: &Block) -> Result<VariableDecl> {
    let mut var_type = VarType::String;
    let mut default = None;
    let mut description = None;

    for (attr, expr, line) in block.body.to_attr_exprs() {
        match attr.as_str() {
            "type" => {
                let type_name = match &expr {
                    Expr::Ident(ident) => ident.clone(),
                    other => literal_string(other, line)?,
                };
                var_type = VarType::parse(&type_name).with_context(|| {
                    format!("unknown variable type '{type_name}' (line {line})")
                })?;
            }
            "default" => default = Some(expr),
            "description" => description = Some(literal_string(&expr, line)?),
            other => bail!("unsupported attribute '{other}' in variable block"),
        }
    }

    Ok(VariableDecl {
        name: name.to_string(),
        var_type,
        default,
        description,
    })
}

fn literal_string(expr: &Expr, line: usize) -> Result<String> {
    expr.as_literal_str()
        .map(str::to_string)
        .with_context(|| format!("expected a literal string (line {line})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_dir_assembles_module() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "main.fja",
            r#"
provider "local" {
  root = ".forja"
}

resource "storage_bucket" "assets" {
  location = var.region
}
"#,
        );
        write_file(
            dir.path(),
            "variables.fja",
            r#"
variable "region" {
  type    = string
  default = "us-central1"
}

output "bucket_id" {
  value       = storage_bucket.assets.id
  description = "Provider-assigned bucket id"
}
"#,
        );
        // Files with other extensions are ignored
        write_file(dir.path(), "notes.txt", "not a declaration");

        let loaded = load_dir(dir.path()).unwrap();
        assert_eq!(loaded.files.len(), 2);
        assert_eq!(loaded.module.resource_count(), 1);
        assert!(loaded.module.variable("region").is_some());
        assert!(loaded.module.provider("local").is_some());
        assert_eq!(loaded.module.outputs().count(), 1);
    }

    #[test]
    fn test_load_dir_empty_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_dir(dir.path()).is_err());
    }

    #[test]
    fn test_duplicate_resource_across_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "a.fja",
            "resource \"pubsub_topic\" \"events\" {}\n",
        );
        write_file(
            dir.path(),
            "b.fja",
            "resource \"pubsub_topic\" \"events\" {}\n",
        );

        let err = load_dir(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate resource"));
    }

    #[test]
    fn test_bad_label_count() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.fja", "resource \"only_kind\" {}\n");

        let err = load_dir(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("kind and name labels"));
    }

    #[test]
    fn test_variable_defaults_to_string_type() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "a.fja",
            "variable \"region\" { default = \"us\" }\n",
        );

        let loaded = load_dir(dir.path()).unwrap();
        assert_eq!(
            loaded.module.variable("region").unwrap().var_type,
            VarType::String
        );
    }

    #[test]
    fn test_unknown_variable_type() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.fja", "variable \"x\" { type = tuple }\n");
        assert!(load_dir(dir.path()).is_err());
    }

    #[test]
    fn test_output_requires_value() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "a.fja",
            "output \"x\" { description = \"no value\" }\n",
        );
        let err = load_dir(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("missing its value"));
    }

    #[test]
    fn test_config_hash_changes_with_content() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "a.fja", "provider \"local\" {}\n");
        let first = config_hash(&[file.clone()]).unwrap();

        fs::write(&file, "provider \"local\" { root = \"elsewhere\" }\n").unwrap();
        let second = config_hash(&[file]).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_nested_directories_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.fja", "provider \"local\" {}\n");
        fs::create_dir(dir.path().join("modules")).unwrap();
        write_file(
            &dir.path().join("modules"),
            "b.fja",
            "provider \"other\" {}\n",
        );

        let files = find_decl_files(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
    }
}
