//! AST for declaration files
//!
//! A document is a flat list of labeled blocks. Block bodies hold
//! `name = expr` attributes and nested blocks; nested blocks are sugar for
//! object-valued attributes (repeated nested blocks aggregate into a list).

use std::fmt;

/// A parsed declaration file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    /// Iterate over blocks with the given keyword (e.g. "resource")
    pub fn blocks_of(&self, keyword: &str) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(move |b| b.keyword == keyword)
    }
}

/// A top-level block: `keyword "label" ... { body }`
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Block keyword ("resource", "variable", "provider", "output")
    pub keyword: String,
    /// Quoted labels following the keyword
    pub labels: Vec<String>,
    pub body: Body,
    /// Line the block header starts on (1-indexed)
    pub line: usize,
}

/// The body of a block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Body {
    pub entries: Vec<BodyEntry>,
}

/// A single entry in a block body
#[derive(Debug, Clone, PartialEq)]
pub enum BodyEntry {
    Attr(Attribute),
    Block(NestedBlock),
}

/// An attribute assignment: `name = expr`
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: Expr,
    pub line: usize,
}

/// A nested block inside a body: `name { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct NestedBlock {
    pub name: String,
    pub body: Body,
    pub line: usize,
}

impl Body {
    /// Find an attribute by name.
    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.entries.iter().find_map(|e| match e {
            BodyEntry::Attr(a) if a.name == name => Some(a),
            _ => None,
        })
    }

    /// Flatten the body into `(name, expr, line)` triples.
    ///
    /// Nested blocks become object-valued attributes; repeated nested blocks
    /// with the same name aggregate into a list of objects.
    pub fn to_attr_exprs(&self) -> Vec<(String, Expr, usize)> {
        let mut out: Vec<(String, Expr, usize)> = Vec::new();

        for entry in &self.entries {
            match entry {
                BodyEntry::Attr(attr) => {
                    out.push((attr.name.clone(), attr.value.clone(), attr.line));
                }
                BodyEntry::Block(block) => {
                    let object = Expr::Object(
                        block
                            .body
                            .to_attr_exprs()
                            .into_iter()
                            .map(|(name, expr, _)| (name, expr))
                            .collect(),
                    );

                    // Aggregate repeated nested blocks into a list
                    if let Some((_, existing, _)) =
                        out.iter_mut().find(|(name, _, _)| *name == block.name)
                    {
                        match existing {
                            Expr::List(items) => items.push(object),
                            other => {
                                let first = other.clone();
                                *other = Expr::List(vec![first, object]);
                            }
                        }
                    } else {
                        out.push((block.name.clone(), object, block.line));
                    }
                }
            }
        }

        out
    }
}

/// An attribute value expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Number(f64),
    /// A string literal, possibly containing `${...}` interpolations
    Str(Template),
    List(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    /// A bare reference path (`var.region`, `compute_instance.web.id`)
    Ref(Reference),
    /// A bare identifier (only meaningful as a variable type name)
    Ident(String),
}

impl Expr {
    /// Collect every reference occurring in this expression.
    pub fn references(&self, out: &mut Vec<Reference>) {
        match self {
            Self::Ref(r) => out.push(r.clone()),
            Self::Str(template) => {
                for part in &template.parts {
                    if let TemplatePart::Interp(r) = part {
                        out.push(r.clone());
                    }
                }
            }
            Self::List(items) => {
                for item in items {
                    item.references(out);
                }
            }
            Self::Object(fields) => {
                for (_, value) in fields {
                    value.references(out);
                }
            }
            Self::Null | Self::Bool(_) | Self::Number(_) | Self::Ident(_) => {}
        }
    }

    /// The string content if this is a plain literal string.
    pub fn as_literal_str(&self) -> Option<&str> {
        match self {
            Self::Str(t) => t.as_literal(),
            _ => None,
        }
    }
}

/// A string template: literal runs interleaved with interpolations
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    pub parts: Vec<TemplatePart>,
}

/// One segment of a string template
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Lit(String),
    Interp(Reference),
}

impl Template {
    /// Build a template holding a single literal run.
    pub fn literal(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            Self::default()
        } else {
            Self {
                parts: vec![TemplatePart::Lit(s)],
            }
        }
    }

    /// The literal content if this template has no interpolations.
    pub fn as_literal(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [] => Some(""),
            [TemplatePart::Lit(s)] => Some(s),
            _ => None,
        }
    }

    /// Whether the template contains at least one interpolation.
    pub fn has_interpolation(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, TemplatePart::Interp(_)))
    }
}

/// A reference to a declared entity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    /// `var.<name>`
    Var(String),
    /// `<kind>.<local_name>.<attr>[.<nested>...]`
    Attr {
        kind: String,
        name: String,
        path: Vec<String>,
    },
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(name) => write!(f, "var.{name}"),
            Self::Attr { kind, name, path } => {
                write!(f, "{kind}.{name}")?;
                for segment in path {
                    write!(f, ".{segment}")?;
                }
                Ok(())
            }
        }
    }
}
