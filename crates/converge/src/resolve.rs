//! Variable and reference resolution.
//!
//! Variables are resolved once per run: supplied values win over declared
//! defaults, and both are type-checked against the declared type. Attribute
//! expressions are then evaluated against the variable values and the state
//! snapshot; a reference to an attribute of a resource that is not in state
//! yet evaluates to [`ResolvedValue::Unknown`] ("known after apply").

use crate::error::{Error, Result};
use crate::state::StateSnapshot;
use crate::types::{Module, ResourceDecl};
use declkit::{Expr, Reference, Template, TemplatePart};
use serde_json::Value;
use std::collections::BTreeMap;

/// A value after resolution: concrete, or only known after apply
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    Known(Value),
    Unknown,
}

impl ResolvedValue {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn as_known(&self) -> Option<&Value> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unknown => None,
        }
    }
}

// ============================================================================
// Variable resolution
// ============================================================================

/// Resolve every declared variable to a concrete value.
///
/// `supplied` holds values from the CLI (`--var`, `--var-file`), already
/// parsed into JSON values. Returns all errors found.
pub fn resolve_variables(
    module: &Module,
    supplied: &BTreeMap<String, Value>,
) -> std::result::Result<BTreeMap<String, Value>, Vec<Error>> {
    let mut errors = Vec::new();
    let mut values = BTreeMap::new();

    for name in supplied.keys() {
        if module.variable(name).is_none() {
            errors.push(Error::UndeclaredVariableValue { name: name.clone() });
        }
    }

    for variable in module.variables() {
        let value = if let Some(value) = supplied.get(&variable.name) {
            Some(value.clone())
        } else if let Some(default) = &variable.default {
            match eval_literal(default, &variable.name) {
                Ok(value) => Some(value),
                Err(e) => {
                    errors.push(e);
                    None
                }
            }
        } else {
            errors.push(Error::UnsetVariable {
                name: variable.name.clone(),
            });
            None
        };

        if let Some(value) = value {
            if variable.var_type.check(&value) {
                values.insert(variable.name.clone(), value);
            } else {
                errors.push(Error::InvalidVariableValue {
                    name: variable.name.clone(),
                    expected: variable.var_type.to_string(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(values)
    } else {
        Err(errors)
    }
}

/// Evaluate an expression that must not contain references.
fn eval_literal(expr: &Expr, variable: &str) -> Result<Value> {
    let empty_vars = BTreeMap::new();
    let empty_state = StateSnapshot::default();
    let ctx = EvalContext {
        variables: &empty_vars,
        state: &empty_state,
    };
    match eval_expr(expr, &ctx, &format!("default of variable '{variable}'")) {
        Ok(ResolvedValue::Known(value)) => Ok(value),
        Ok(ResolvedValue::Unknown) | Err(_) => Err(Error::NonLiteralDefault {
            name: variable.to_string(),
        }),
    }
}

// ============================================================================
// Expression evaluation
// ============================================================================

/// Context for expression evaluation
pub struct EvalContext<'a> {
    pub variables: &'a BTreeMap<String, Value>,
    pub state: &'a StateSnapshot,
}

/// Evaluate an attribute expression.
///
/// `context` names the evaluation site for error messages (e.g. an address).
pub fn eval_expr(expr: &Expr, ctx: &EvalContext, context: &str) -> Result<ResolvedValue> {
    match expr {
        Expr::Null => Ok(ResolvedValue::Known(Value::Null)),
        Expr::Bool(b) => Ok(ResolvedValue::Known(Value::Bool(*b))),
        Expr::Number(n) => Ok(ResolvedValue::Known(number_value(*n))),
        Expr::Str(template) => eval_template(template, ctx, context),
        Expr::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match eval_expr(item, ctx, context)? {
                    ResolvedValue::Known(value) => out.push(value),
                    ResolvedValue::Unknown => return Ok(ResolvedValue::Unknown),
                }
            }
            Ok(ResolvedValue::Known(Value::Array(out)))
        }
        Expr::Object(fields) => {
            let mut out = serde_json::Map::new();
            for (key, value) in fields {
                match eval_expr(value, ctx, context)? {
                    ResolvedValue::Known(value) => {
                        out.insert(key.clone(), value);
                    }
                    ResolvedValue::Unknown => return Ok(ResolvedValue::Unknown),
                }
            }
            Ok(ResolvedValue::Known(Value::Object(out)))
        }
        Expr::Ref(reference) => eval_reference(reference, ctx, context),
        Expr::Ident(ident) => Err(Error::InvalidExpression {
            context: context.to_string(),
            message: format!("bare identifier '{ident}' is not a value"),
        }),
    }
}

fn eval_template(template: &Template, ctx: &EvalContext, context: &str) -> Result<ResolvedValue> {
    // A plain literal string stays as-is
    if let Some(literal) = template.as_literal() {
        return Ok(ResolvedValue::Known(Value::String(literal.to_string())));
    }

    let mut out = String::new();
    for part in &template.parts {
        match part {
            TemplatePart::Lit(s) => out.push_str(s),
            TemplatePart::Interp(reference) => {
                match eval_reference(reference, ctx, context)? {
                    ResolvedValue::Unknown => return Ok(ResolvedValue::Unknown),
                    ResolvedValue::Known(value) => out.push_str(&stringify(&value)),
                }
            }
        }
    }

    Ok(ResolvedValue::Known(Value::String(out)))
}

fn eval_reference(
    reference: &Reference,
    ctx: &EvalContext,
    context: &str,
) -> Result<ResolvedValue> {
    match reference {
        Reference::Var(name) => match ctx.variables.get(name) {
            Some(value) => Ok(ResolvedValue::Known(value.clone())),
            None => Err(Error::UndefinedVariable {
                name: name.clone(),
                referenced_by: context.to_string(),
            }),
        },
        Reference::Attr { kind, name, path } => {
            let address = format!("{kind}.{name}");
            let Some(resource) = ctx.state.get(&address) else {
                // Not realized yet: the value exists only after apply
                return Ok(ResolvedValue::Unknown);
            };

            let mut current = resource.attrs.get(&path[0]);
            for segment in &path[1..] {
                current = current.and_then(|v| v.get(segment));
            }

            match current {
                Some(value) => Ok(ResolvedValue::Known(value.clone())),
                None => Ok(ResolvedValue::Unknown),
            }
        }
    }
}

/// Render an interpolated value into a string.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Convert a parsed number into a JSON number, preserving integers.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

// ============================================================================
// Resource resolution
// ============================================================================

/// Resolve every attribute of a resource declaration.
///
/// Attributes that evaluate to a known `null` are dropped, matching the
/// behavior of omitting them.
pub fn resolve_resource(
    decl: &ResourceDecl,
    ctx: &EvalContext,
) -> Result<BTreeMap<String, ResolvedValue>> {
    let context = decl.address.to_string();
    let mut resolved = BTreeMap::new();

    for (attr, expr) in &decl.attrs {
        match eval_expr(expr, ctx, &context)? {
            ResolvedValue::Known(Value::Null) => {}
            value => {
                resolved.insert(attr.clone(), value);
            }
        }
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RealizedResource;
    use crate::types::{Address, VarType, VariableDecl};
    use serde_json::json;

    fn module_with_var(name: &str, var_type: VarType, default: Option<Expr>) -> Module {
        let mut module = Module::new();
        module
            .add_variable(VariableDecl {
                name: name.to_string(),
                var_type,
                default,
                description: None,
            })
            .unwrap();
        module
    }

    #[test]
    fn test_variable_default_used() {
        let module = module_with_var(
            "region",
            VarType::String,
            Some(Expr::Str(Template::literal("us-central1"))),
        );
        let values = resolve_variables(&module, &BTreeMap::new()).unwrap();
        assert_eq!(values["region"], json!("us-central1"));
    }

    #[test]
    fn test_supplied_value_wins_over_default() {
        let module = module_with_var(
            "region",
            VarType::String,
            Some(Expr::Str(Template::literal("us-central1"))),
        );
        let supplied = [("region".to_string(), json!("europe-west1"))]
            .into_iter()
            .collect();
        let values = resolve_variables(&module, &supplied).unwrap();
        assert_eq!(values["region"], json!("europe-west1"));
    }

    #[test]
    fn test_unset_variable_is_error() {
        let module = module_with_var("region", VarType::String, None);
        let errors = resolve_variables(&module, &BTreeMap::new()).unwrap_err();
        assert!(matches!(errors[0], Error::UnsetVariable { ref name } if name == "region"));
    }

    #[test]
    fn test_variable_type_checked() {
        let module = module_with_var("count_hint", VarType::Number, None);
        let supplied = [("count_hint".to_string(), json!("three"))]
            .into_iter()
            .collect();
        let errors = resolve_variables(&module, &supplied).unwrap_err();
        assert!(matches!(
            errors[0],
            Error::InvalidVariableValue { ref expected, .. } if expected == "number"
        ));
    }

    #[test]
    fn test_undeclared_supplied_value_is_error() {
        let module = Module::new();
        let supplied = [("ghost".to_string(), json!("boo"))].into_iter().collect();
        let errors = resolve_variables(&module, &supplied).unwrap_err();
        assert!(matches!(errors[0], Error::UndeclaredVariableValue { .. }));
    }

    fn eval_ctx<'a>(
        variables: &'a BTreeMap<String, Value>,
        state: &'a StateSnapshot,
    ) -> EvalContext<'a> {
        EvalContext { variables, state }
    }

    #[test]
    fn test_eval_template_concatenation() {
        let variables: BTreeMap<String, Value> =
            [("prefix".to_string(), json!("acme"))].into_iter().collect();
        let state = StateSnapshot::default();
        let ctx = eval_ctx(&variables, &state);

        let template = Template {
            parts: vec![
                TemplatePart::Interp(Reference::Var("prefix".to_string())),
                TemplatePart::Lit("-assets".to_string()),
            ],
        };
        let value = eval_expr(&Expr::Str(template), &ctx, "test").unwrap();
        assert_eq!(value, ResolvedValue::Known(json!("acme-assets")));
    }

    #[test]
    fn test_eval_reference_from_state() {
        let variables = BTreeMap::new();
        let mut state = StateSnapshot::default();
        let mut attrs = serde_json::Map::new();
        attrs.insert("id".to_string(), json!("b-42"));
        state.upsert(RealizedResource {
            kind: "storage_bucket".to_string(),
            name: "assets".to_string(),
            id: "b-42".to_string(),
            attrs,
            dependencies: Vec::new(),
        });
        let ctx = eval_ctx(&variables, &state);

        let expr = Expr::Ref(Reference::Attr {
            kind: "storage_bucket".to_string(),
            name: "assets".to_string(),
            path: vec!["id".to_string()],
        });
        let value = eval_expr(&expr, &ctx, "test").unwrap();
        assert_eq!(value, ResolvedValue::Known(json!("b-42")));
    }

    #[test]
    fn test_eval_reference_not_in_state_is_unknown() {
        let variables = BTreeMap::new();
        let state = StateSnapshot::default();
        let ctx = eval_ctx(&variables, &state);

        let expr = Expr::Ref(Reference::Attr {
            kind: "compute_instance".to_string(),
            name: "web".to_string(),
            path: vec!["id".to_string()],
        });
        assert_eq!(
            eval_expr(&expr, &ctx, "test").unwrap(),
            ResolvedValue::Unknown
        );
    }

    #[test]
    fn test_unknown_propagates_through_template_and_list() {
        let variables = BTreeMap::new();
        let state = StateSnapshot::default();
        let ctx = eval_ctx(&variables, &state);

        let unknown_ref = Reference::Attr {
            kind: "compute_instance".to_string(),
            name: "web".to_string(),
            path: vec!["id".to_string()],
        };

        let template = Expr::Str(Template {
            parts: vec![
                TemplatePart::Lit("id=".to_string()),
                TemplatePart::Interp(unknown_ref.clone()),
            ],
        });
        assert!(eval_expr(&template, &ctx, "t").unwrap().is_unknown());

        let list = Expr::List(vec![Expr::Bool(true), Expr::Ref(unknown_ref)]);
        assert!(eval_expr(&list, &ctx, "t").unwrap().is_unknown());
    }

    #[test]
    fn test_undefined_variable_reference_is_error() {
        let variables = BTreeMap::new();
        let state = StateSnapshot::default();
        let ctx = eval_ctx(&variables, &state);

        let expr = Expr::Ref(Reference::Var("ghost".to_string()));
        let err = eval_expr(&expr, &ctx, "pubsub_topic.events").unwrap_err();
        assert!(matches!(err, Error::UndefinedVariable { .. }));
    }

    #[test]
    fn test_resolve_resource_drops_null() {
        let variables = BTreeMap::new();
        let state = StateSnapshot::default();
        let ctx = eval_ctx(&variables, &state);

        let decl = ResourceDecl {
            address: Address::new("pubsub_topic", "events"),
            attrs: [
                ("retention".to_string(), Expr::Null),
                ("enabled".to_string(), Expr::Bool(true)),
            ]
            .into_iter()
            .collect(),
            line: 1,
        };

        let resolved = resolve_resource(&decl, &ctx).unwrap();
        assert!(!resolved.contains_key("retention"));
        assert_eq!(
            resolved["enabled"],
            ResolvedValue::Known(json!(true))
        );
    }

    #[test]
    fn test_numbers_preserve_integers() {
        let variables = BTreeMap::new();
        let state = StateSnapshot::default();
        let ctx = eval_ctx(&variables, &state);

        assert_eq!(
            eval_expr(&Expr::Number(50.0), &ctx, "t").unwrap(),
            ResolvedValue::Known(json!(50))
        );
        assert_eq!(
            eval_expr(&Expr::Number(0.5), &ctx, "t").unwrap(),
            ResolvedValue::Known(json!(0.5))
        );
    }
}
