//! Schema registry - the legal attributes and types for each resource kind
//!
//! Kinds and provider configuration schemas are registered up front; the
//! registry then checks declarations structurally (unknown kinds, unknown or
//! provider-assigned attributes, missing required attributes, literal type
//! mismatches) before anything is resolved or applied.

use crate::error::Error;
use crate::types::Module;
use declkit::Expr;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Attribute types
// ============================================================================

/// Type of a resource or provider attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrType {
    String,
    Number,
    Bool,
    List(Box<AttrType>),
    Map(Box<AttrType>),
    /// Accepts any value; used for free-form metadata
    Any,
}

impl AttrType {
    /// Check a resolved JSON value against this type.
    pub fn check(&self, value: &serde_json::Value) -> bool {
        use serde_json::Value;
        match (self, value) {
            (Self::Any, _) => true,
            (Self::String, Value::String(_)) => true,
            (Self::Number, Value::Number(_)) => true,
            (Self::Bool, Value::Bool(_)) => true,
            (Self::List(elem), Value::Array(items)) => items.iter().all(|i| elem.check(i)),
            (Self::Map(elem), Value::Object(fields)) => fields.values().all(|v| elem.check(v)),
            _ => false,
        }
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Number => write!(f, "number"),
            Self::Bool => write!(f, "bool"),
            Self::List(elem) => write!(f, "list({elem})"),
            Self::Map(elem) => write!(f, "map({elem})"),
            Self::Any => write!(f, "any"),
        }
    }
}

/// Describe a JSON value's type for error messages.
pub fn value_type_name(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

// ============================================================================
// Kind and provider schemas
// ============================================================================

/// Schema for one attribute
#[derive(Debug, Clone)]
pub struct AttrSchema {
    pub attr_type: AttrType,
    pub required: bool,
    /// Provider-assigned; may not be set in declarations
    pub computed: bool,
}

/// Schema for a resource kind
#[derive(Debug, Clone)]
pub struct KindSchema {
    pub kind: String,
    /// Name of the provider that serves this kind
    pub provider: String,
    pub attrs: BTreeMap<String, AttrSchema>,
}

impl KindSchema {
    pub fn new(kind: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            provider: provider.into(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn required(mut self, name: &str, attr_type: AttrType) -> Self {
        self.attrs.insert(
            name.to_string(),
            AttrSchema {
                attr_type,
                required: true,
                computed: false,
            },
        );
        self
    }

    pub fn optional(mut self, name: &str, attr_type: AttrType) -> Self {
        self.attrs.insert(
            name.to_string(),
            AttrSchema {
                attr_type,
                required: false,
                computed: false,
            },
        );
        self
    }

    pub fn computed(mut self, name: &str, attr_type: AttrType) -> Self {
        self.attrs.insert(
            name.to_string(),
            AttrSchema {
                attr_type,
                required: false,
                computed: true,
            },
        );
        self
    }

    /// Names of provider-assigned attributes.
    pub fn computed_attrs(&self) -> impl Iterator<Item = &str> {
        self.attrs
            .iter()
            .filter(|(_, schema)| schema.computed)
            .map(|(name, _)| name.as_str())
    }

    /// Whether an attribute exists in the schema (input or computed).
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }
}

/// Schema for a provider configuration block
#[derive(Debug, Clone)]
pub struct ProviderSchema {
    pub name: String,
    pub attrs: BTreeMap<String, AttrSchema>,
}

impl ProviderSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn optional(mut self, name: &str, attr_type: AttrType) -> Self {
        self.attrs.insert(
            name.to_string(),
            AttrSchema {
                attr_type,
                required: false,
                computed: false,
            },
        );
        self
    }

    pub fn required(mut self, name: &str, attr_type: AttrType) -> Self {
        self.attrs.insert(
            name.to_string(),
            AttrSchema {
                attr_type,
                required: true,
                computed: false,
            },
        );
        self
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Registry of every known resource kind and provider schema
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    kinds: BTreeMap<String, KindSchema>,
    providers: BTreeMap<String, ProviderSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_kind(&mut self, schema: KindSchema) {
        self.kinds.insert(schema.kind.clone(), schema);
    }

    pub fn register_provider(&mut self, schema: ProviderSchema) {
        self.providers.insert(schema.name.clone(), schema);
    }

    pub fn kind(&self, name: &str) -> Option<&KindSchema> {
        self.kinds.get(name)
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderSchema> {
        self.providers.get(name)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &KindSchema> {
        self.kinds.values()
    }

    /// Structurally validate every declaration in a module.
    ///
    /// Returns all errors found, not just the first; an empty vec means the
    /// module is schema-valid.
    pub fn validate_module(&self, module: &Module) -> Vec<Error> {
        let mut errors = Vec::new();

        for decl in module.resources() {
            let Some(schema) = self.kind(&decl.address.kind) else {
                errors.push(Error::UnknownKind {
                    address: decl.address.clone(),
                });
                continue;
            };

            for (attr, expr) in &decl.attrs {
                match schema.attrs.get(attr) {
                    None => errors.push(Error::UnknownAttribute {
                        address: decl.address.clone(),
                        attr: attr.clone(),
                    }),
                    Some(attr_schema) if attr_schema.computed => {
                        errors.push(Error::ComputedAttribute {
                            address: decl.address.clone(),
                            attr: attr.clone(),
                        });
                    }
                    Some(attr_schema) => {
                        if let Some(found) = literal_mismatch(expr, &attr_schema.attr_type) {
                            errors.push(Error::TypeMismatch {
                                address: decl.address.clone(),
                                attr: attr.clone(),
                                expected: attr_schema.attr_type.to_string(),
                                found,
                            });
                        }
                    }
                }
            }

            for (attr, attr_schema) in &schema.attrs {
                if attr_schema.required && !decl.attrs.contains_key(attr) {
                    errors.push(Error::MissingRequired {
                        address: decl.address.clone(),
                        attr: attr.clone(),
                    });
                }
            }
        }

        for provider in module.providers() {
            let Some(schema) = self.provider(&provider.name) else {
                errors.push(Error::UnknownProvider {
                    name: provider.name.clone(),
                });
                continue;
            };

            for attr in provider.config.keys() {
                if !schema.attrs.contains_key(attr) {
                    errors.push(Error::UnknownProviderAttribute {
                        provider: provider.name.clone(),
                        attr: attr.clone(),
                    });
                }
            }
        }

        for variable in module.variables() {
            if let Some(default) = &variable.default {
                let mut refs = Vec::new();
                default.references(&mut refs);
                if !refs.is_empty() {
                    errors.push(Error::NonLiteralDefault {
                        name: variable.name.clone(),
                    });
                }
            }
        }

        errors
    }
}

/// Check a literal expression against a schema type.
///
/// Returns `Some(found_type)` when the expression is a literal that cannot
/// match; `None` when it matches or when the type can only be known after
/// resolution (references, interpolated strings).
fn literal_mismatch(expr: &Expr, expected: &AttrType) -> Option<String> {
    if matches!(expected, AttrType::Any) {
        return None;
    }

    let found = match expr {
        Expr::Null | Expr::Ref(_) => return None,
        Expr::Str(template) if template.has_interpolation() => return None,
        Expr::Str(_) => "string",
        Expr::Number(_) => "number",
        Expr::Bool(_) => "bool",
        Expr::List(_) => "list",
        Expr::Object(_) => "map",
        Expr::Ident(_) => "identifier",
    };

    let matches = matches!(
        (expected, found),
        (AttrType::String, "string")
            | (AttrType::Number, "number")
            | (AttrType::Bool, "bool")
            | (AttrType::List(_), "list")
            | (AttrType::Map(_), "map")
    );

    if matches {
        None
    } else {
        Some(found.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, ProviderDecl, ResourceDecl, VarType, VariableDecl};
    use declkit::{Expr, Reference, Template};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn test_registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.register_kind(
            KindSchema::new("storage_bucket", "local")
                .required("location", AttrType::String)
                .optional("versioning", AttrType::Bool)
                .optional("labels", AttrType::Map(Box::new(AttrType::String)))
                .computed("id", AttrType::String),
        );
        registry.register_provider(
            ProviderSchema::new("local").optional("root", AttrType::String),
        );
        registry
    }

    fn bucket(attrs: Vec<(&str, Expr)>) -> ResourceDecl {
        ResourceDecl {
            address: Address::new("storage_bucket", "assets"),
            attrs: attrs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            line: 1,
        }
    }

    #[test]
    fn test_valid_resource_passes() {
        let registry = test_registry();
        let mut module = Module::new();
        module
            .add_resource(bucket(vec![
                ("location", Expr::Str(Template::literal("us-central1"))),
                ("versioning", Expr::Bool(true)),
            ]))
            .unwrap();

        assert!(registry.validate_module(&module).is_empty());
    }

    #[test]
    fn test_unknown_kind() {
        let registry = test_registry();
        let mut module = Module::new();
        module
            .add_resource(ResourceDecl {
                address: Address::new("mystery_widget", "x"),
                attrs: BTreeMap::new(),
                line: 1,
            })
            .unwrap();

        let errors = registry.validate_module(&module);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], Error::UnknownKind { .. }));
    }

    #[test]
    fn test_unknown_attribute() {
        let registry = test_registry();
        let mut module = Module::new();
        module
            .add_resource(bucket(vec![
                ("location", Expr::Str(Template::literal("us"))),
                ("colour", Expr::Str(Template::literal("blue"))),
            ]))
            .unwrap();

        let errors = registry.validate_module(&module);
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, Error::UnknownAttribute { attr, .. } if attr == "colour"))
        );
    }

    #[test]
    fn test_computed_attribute_rejected() {
        let registry = test_registry();
        let mut module = Module::new();
        module
            .add_resource(bucket(vec![
                ("location", Expr::Str(Template::literal("us"))),
                ("id", Expr::Str(Template::literal("forced"))),
            ]))
            .unwrap();

        let errors = registry.validate_module(&module);
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, Error::ComputedAttribute { attr, .. } if attr == "id"))
        );
    }

    #[test]
    fn test_missing_required() {
        let registry = test_registry();
        let mut module = Module::new();
        module.add_resource(bucket(vec![])).unwrap();

        let errors = registry.validate_module(&module);
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, Error::MissingRequired { attr, .. } if attr == "location"))
        );
    }

    #[test]
    fn test_literal_type_mismatch() {
        let registry = test_registry();
        let mut module = Module::new();
        module
            .add_resource(bucket(vec![("location", Expr::Number(7.0))]))
            .unwrap();

        let errors = registry.validate_module(&module);
        assert!(errors.iter().any(|e| matches!(
            e,
            Error::TypeMismatch { expected, found, .. }
                if expected == "string" && found == "number"
        )));
    }

    #[test]
    fn test_references_skip_literal_check() {
        let registry = test_registry();
        let mut module = Module::new();
        module
            .add_resource(bucket(vec![(
                "location",
                Expr::Ref(Reference::Var("region".to_string())),
            )]))
            .unwrap();
        module
            .add_variable(VariableDecl {
                name: "region".to_string(),
                var_type: VarType::String,
                default: Some(Expr::Str(Template::literal("us"))),
                description: None,
            })
            .unwrap();

        assert!(registry.validate_module(&module).is_empty());
    }

    #[test]
    fn test_unknown_provider_attribute() {
        let registry = test_registry();
        let mut module = Module::new();
        module
            .add_provider(ProviderDecl {
                name: "local".to_string(),
                config: [(
                    "zone".to_string(),
                    Expr::Str(Template::literal("us-central1-a")),
                )]
                .into_iter()
                .collect(),
                line: 1,
            })
            .unwrap();

        let errors = registry.validate_module(&module);
        assert!(matches!(
            errors[0],
            Error::UnknownProviderAttribute { ref attr, .. } if attr == "zone"
        ));
    }

    #[test]
    fn test_non_literal_default() {
        let registry = test_registry();
        let mut module = Module::new();
        module
            .add_variable(VariableDecl {
                name: "zone".to_string(),
                var_type: VarType::String,
                default: Some(Expr::Ref(Reference::Var("region".to_string()))),
                description: None,
            })
            .unwrap();

        let errors = registry.validate_module(&module);
        assert!(matches!(errors[0], Error::NonLiteralDefault { ref name } if name == "zone"));
    }

    #[test]
    fn test_attr_type_check() {
        assert!(AttrType::List(Box::new(AttrType::String)).check(&json!(["a", "b"])));
        assert!(!AttrType::List(Box::new(AttrType::String)).check(&json!(["a", 1])));
        assert!(AttrType::Map(Box::new(AttrType::String)).check(&json!({"k": "v"})));
        assert!(AttrType::Any.check(&json!({"anything": [1, 2]})));
    }
}
