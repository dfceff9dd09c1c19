//! Writer for generating canonically formatted declaration files.
//!
//! Used by `forja fmt`: attribute names within a run are aligned on '=',
//! bodies use two-space indentation, and top-level blocks are separated by
//! a single blank line.

use crate::ast::{Block, Body, BodyEntry, Document, Expr, Template, TemplatePart};
use std::fmt::Write;
use std::path::Path;

/// Write a document to a file in canonical form.
pub fn write_file(document: &Document, path: &Path) -> std::io::Result<()> {
    std::fs::write(path, write_string(document))
}

/// Render a document to a canonically formatted string.
pub fn write_string(document: &Document) -> String {
    let mut output = String::new();

    for (i, block) in document.blocks.iter().enumerate() {
        if i > 0 {
            output.push('\n');
        }
        write_block(&mut output, block, 0);
    }

    output
}

fn write_block(output: &mut String, block: &Block, indent: usize) {
    let pad = "  ".repeat(indent);
    write!(output, "{pad}{}", block.keyword).unwrap();
    for label in &block.labels {
        write!(output, " \"{}\"", escape(label)).unwrap();
    }

    if block.body.entries.is_empty() {
        output.push_str(" {}\n");
    } else {
        output.push_str(" {\n");
        write_body(output, &block.body, indent + 1);
        writeln!(output, "{pad}}}").unwrap();
    }
}

fn write_body(output: &mut String, body: &Body, indent: usize) {
    let pad = "  ".repeat(indent);

    // Width of the longest attribute name in each run of consecutive
    // attributes, so '=' aligns within the run.
    let mut i = 0;
    let mut first = true;
    while i < body.entries.len() {
        match &body.entries[i] {
            BodyEntry::Attr(_) => {
                let run_end = body.entries[i..]
                    .iter()
                    .position(|e| matches!(e, BodyEntry::Block(_)))
                    .map_or(body.entries.len(), |p| i + p);
                let width = body.entries[i..run_end]
                    .iter()
                    .filter_map(|e| match e {
                        BodyEntry::Attr(a) => Some(a.name.len()),
                        BodyEntry::Block(_) => None,
                    })
                    .max()
                    .unwrap_or(0);

                for entry in &body.entries[i..run_end] {
                    if let BodyEntry::Attr(attr) = entry {
                        writeln!(
                            output,
                            "{pad}{:<width$} = {}",
                            attr.name,
                            render_expr(&attr.value),
                        )
                        .unwrap();
                    }
                }
                i = run_end;
            }
            BodyEntry::Block(nested) => {
                if !first {
                    output.push('\n');
                }
                write!(output, "{pad}{}", nested.name).unwrap();
                if nested.body.entries.is_empty() {
                    output.push_str(" {}\n");
                } else {
                    output.push_str(" {\n");
                    write_body(output, &nested.body, indent + 1);
                    writeln!(output, "{pad}}}").unwrap();
                }
                i += 1;
            }
        }
        first = false;
    }
}

fn render_expr(expr: &Expr) -> String {
    match expr {
        Expr::Null => "null".to_string(),
        Expr::Bool(b) => b.to_string(),
        Expr::Number(n) => render_number(*n),
        Expr::Str(template) => render_template(template),
        Expr::List(items) => {
            let rendered: Vec<String> = items.iter().map(render_expr).collect();
            format!("[{}]", rendered.join(", "))
        }
        Expr::Object(fields) => {
            if fields.is_empty() {
                "{}".to_string()
            } else {
                let rendered: Vec<String> = fields
                    .iter()
                    .map(|(k, v)| format!("{} = {}", render_key(k), render_expr(v)))
                    .collect();
                format!("{{ {} }}", rendered.join(", "))
            }
        }
        Expr::Ref(reference) => reference.to_string(),
        Expr::Ident(ident) => ident.clone(),
    }
}

fn render_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn render_key(key: &str) -> String {
    let mut chars = key.chars();
    let plain = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if plain {
        key.to_string()
    } else {
        format!("\"{}\"", escape(key))
    }
}

fn render_template(template: &Template) -> String {
    let mut out = String::from("\"");
    for part in &template.parts {
        match part {
            TemplatePart::Lit(s) => out.push_str(&escape(s)),
            TemplatePart::Interp(reference) => {
                write!(out, "${{{reference}}}").unwrap();
            }
        }
    }
    out.push('"');
    out
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '$' if chars.peek() == Some(&'{') => out.push_str("$$"),
            _ => out.push(c),
        }
    }
    out
}

/// Check whether file content is already in canonical form.
pub fn is_canonical(content: &str) -> crate::error::Result<bool> {
    let document = crate::parser::parse_string(content)?;
    Ok(write_string(&document) == content)
}
