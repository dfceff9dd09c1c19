//! Variable-value collection from the command line.
//!
//! Values come from a TOML var-file (`--var-file`) and repeated `--var`
//! flags; flags win over file entries. Flag values are coerced using the
//! declared variable type, so `--var replicas=3` becomes a number for a
//! `number` variable and stays a string for a `string` one.

use anyhow::{Context, Result};
use converge::{Module, VarType};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Collect supplied variable values from flags and an optional var-file.
pub fn collect(
    module: &Module,
    var_flags: &[String],
    var_file: Option<&Path>,
) -> Result<BTreeMap<String, Value>> {
    let mut values = BTreeMap::new();

    if let Some(path) = var_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read var file: {}", path.display()))?;
        let table: toml::Table = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in var file: {}", path.display()))?;
        for (name, value) in table {
            values.insert(name, toml_to_json(value));
        }
    }

    for flag in var_flags {
        let (name, raw) = flag
            .split_once('=')
            .with_context(|| format!("invalid --var '{flag}' (expected NAME=VALUE)"))?;
        let declared = module.variable(name).map(|v| v.var_type);
        let value = coerce(raw, declared)
            .with_context(|| format!("invalid --var value for '{name}'"))?;
        values.insert(name.to_string(), value);
    }

    Ok(values)
}

/// Coerce a raw flag value using the declared variable type.
///
/// Undeclared variables keep the raw string; the engine reports them.
fn coerce(raw: &str, declared: Option<VarType>) -> Result<Value> {
    match declared {
        Some(VarType::Number) => {
            let n: f64 = raw
                .parse()
                .with_context(|| format!("'{raw}' is not a number"))?;
            if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                Ok(Value::from(n as i64))
            } else {
                Ok(serde_json::Number::from_f64(n)
                    .map_or(Value::Null, Value::Number))
            }
        }
        Some(VarType::Bool) => match raw {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => anyhow::bail!("'{raw}' is not a bool (expected true or false)"),
        },
        Some(VarType::List | VarType::Map) => {
            serde_json::from_str(raw).with_context(|| format!("'{raw}' is not valid JSON"))
        }
        Some(VarType::String) | None => Ok(Value::String(raw.to_string())),
    }
}

/// Convert a TOML value into its JSON counterpart.
fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge::VariableDecl;
    use serde_json::json;
    use std::io::Write;

    fn module() -> Module {
        let mut module = Module::new();
        for (name, var_type) in [
            ("region", VarType::String),
            ("replicas", VarType::Number),
            ("versioning", VarType::Bool),
            ("tags", VarType::List),
            ("labels", VarType::Map),
        ] {
            module
                .add_variable(VariableDecl {
                    name: name.to_string(),
                    var_type,
                    default: None,
                    description: None,
                })
                .unwrap();
        }
        module
    }

    #[test]
    fn test_flag_coercion_by_declared_type() {
        let values = collect(
            &module(),
            &[
                "region=us-central1".to_string(),
                "replicas=3".to_string(),
                "versioning=true".to_string(),
                "tags=[\"a\",\"b\"]".to_string(),
            ],
            None,
        )
        .unwrap();

        assert_eq!(values["region"], json!("us-central1"));
        assert_eq!(values["replicas"], json!(3));
        assert_eq!(values["versioning"], json!(true));
        assert_eq!(values["tags"], json!(["a", "b"]));
    }

    #[test]
    fn test_undeclared_flag_stays_string() {
        let values = collect(&module(), &["ghost=boo".to_string()], None).unwrap();
        assert_eq!(values["ghost"], json!("boo"));
    }

    #[test]
    fn test_invalid_flag_format() {
        assert!(collect(&module(), &["no-equals".to_string()], None).is_err());
    }

    #[test]
    fn test_invalid_number() {
        assert!(collect(&module(), &["replicas=three".to_string()], None).is_err());
    }

    #[test]
    fn test_var_file_and_flag_precedence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "region = \"europe-west1\"\nreplicas = 2").unwrap();

        let values = collect(
            &module(),
            &["region=us-central1".to_string()],
            Some(file.path()),
        )
        .unwrap();

        // Flag wins over file; file-only entries survive
        assert_eq!(values["region"], json!("us-central1"));
        assert_eq!(values["replicas"], json!(2));
    }

    #[test]
    fn test_var_file_tables_become_maps() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[labels]\nenv = \"dev\"\nteam = \"core\"").unwrap();

        let values = collect(&module(), &[], Some(file.path())).unwrap();
        assert_eq!(values["labels"], json!({"env": "dev", "team": "core"}));
    }
}
