//! Parser for forja declaration files.
//!
//! Handles the block-structured declaration format:
//! ```text
//! provider "local" {
//!   root = ".forja"
//! }
//!
//! variable "region" {
//!   type    = string
//!   default = "us-central1"
//! }
//!
//! resource "compute_instance" "web" {
//!   machine_type = var.machine_type
//!   zone         = "${var.region}-a"
//! }
//! ```

use crate::ast::{
    Attribute, Block, Body, BodyEntry, Document, Expr, NestedBlock, Reference, Template,
    TemplatePart,
};
use crate::error::{Error, Result};
use std::path::Path;

/// Parse a declaration file from a file path.
pub fn parse_file(path: &Path) -> Result<Document> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    parse_string(&content)
}

/// Parse a declaration file from a string.
pub fn parse_string(content: &str) -> Result<Document> {
    let mut parser = Parser::new(content);
    parser.parse_document()
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Parser {
    fn new(content: &str) -> Self {
        Self {
            chars: content.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    // ========================================================================
    // Low-level scanning
    // ========================================================================

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    /// Skip whitespace and `#`/`//` comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => self.skip_to_eol(),
                Some('/') if self.peek_at(1) == Some('/') => self.skip_to_eol(),
                _ => break,
            }
        }
    }

    fn skip_to_eol(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(Error::syntax(
                self.line,
                format!("expected '{expected}', found '{c}'"),
            )),
            None => Err(Error::syntax(
                self.line,
                format!("expected '{expected}', found end of file"),
            )),
        }
    }

    fn is_ident_start(c: char) -> bool {
        c.is_ascii_alphabetic() || c == '_'
    }

    fn is_ident_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_' || c == '-'
    }

    fn parse_ident(&mut self) -> Result<String> {
        match self.peek() {
            Some(c) if Self::is_ident_start(c) => {}
            Some(c) => {
                return Err(Error::syntax(
                    self.line,
                    format!("expected identifier, found '{c}'"),
                ));
            }
            None => {
                return Err(Error::syntax(
                    self.line,
                    "expected identifier, found end of file",
                ));
            }
        }

        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if Self::is_ident_char(c) {
                ident.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Ok(ident)
    }

    // ========================================================================
    // Document structure
    // ========================================================================

    fn parse_document(&mut self) -> Result<Document> {
        let mut document = Document::default();

        loop {
            self.skip_trivia();
            if self.peek().is_none() {
                break;
            }
            document.blocks.push(self.parse_block()?);
        }

        Ok(document)
    }

    fn parse_block(&mut self) -> Result<Block> {
        let line = self.line;
        let keyword = self.parse_ident()?;

        let mut labels = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some('"') => {
                    let label_line = self.line;
                    let template = self.parse_string_template()?;
                    match template.as_literal() {
                        Some(label) => labels.push(label.to_string()),
                        None => {
                            return Err(Error::syntax(
                                label_line,
                                "interpolation is not allowed in block labels",
                            ));
                        }
                    }
                }
                Some('{') => break,
                Some(c) => {
                    return Err(Error::syntax(
                        self.line,
                        format!("expected quoted label or '{{' after '{keyword}', found '{c}'"),
                    ));
                }
                None => {
                    return Err(Error::syntax(
                        self.line,
                        format!("unexpected end of file in '{keyword}' block header"),
                    ));
                }
            }
        }

        self.expect('{')?;
        let body = self.parse_body()?;

        Ok(Block {
            keyword,
            labels,
            body,
            line,
        })
    }

    /// Parse a block body up to and including the closing '}'.
    fn parse_body(&mut self) -> Result<Body> {
        let mut body = Body::default();

        loop {
            self.skip_trivia();
            match self.peek() {
                Some('}') => {
                    self.bump();
                    return Ok(body);
                }
                Some(c) if Self::is_ident_start(c) => {
                    let line = self.line;
                    let name = self.parse_ident()?;
                    self.skip_trivia();

                    match self.peek() {
                        Some('=') => {
                            self.bump();
                            self.skip_trivia();
                            let value = self.parse_expr()?;
                            body.entries.push(BodyEntry::Attr(Attribute {
                                name,
                                value,
                                line,
                            }));
                        }
                        Some('{') => {
                            self.bump();
                            let nested = self.parse_body()?;
                            body.entries.push(BodyEntry::Block(NestedBlock {
                                name,
                                body: nested,
                                line,
                            }));
                        }
                        Some(c) => {
                            return Err(Error::syntax(
                                self.line,
                                format!("expected '=' or '{{' after '{name}', found '{c}'"),
                            ));
                        }
                        None => {
                            return Err(Error::syntax(
                                self.line,
                                format!("unexpected end of file after '{name}'"),
                            ));
                        }
                    }
                }
                Some(c) => {
                    return Err(Error::syntax(
                        self.line,
                        format!("expected attribute or '}}', found '{c}'"),
                    ));
                }
                None => {
                    return Err(Error::syntax(self.line, "unclosed block, expected '}'"));
                }
            }
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn parse_expr(&mut self) -> Result<Expr> {
        match self.peek() {
            Some('"') => Ok(Expr::Str(self.parse_string_template()?)),
            Some('[') => self.parse_list(),
            Some('{') => self.parse_object(),
            Some(c) if c.is_ascii_digit() || c == '-' => self.parse_number(),
            Some(c) if Self::is_ident_start(c) => self.parse_path_expr(),
            Some(c) => Err(Error::syntax(
                self.line,
                format!("expected expression, found '{c}'"),
            )),
            None => Err(Error::syntax(
                self.line,
                "expected expression, found end of file",
            )),
        }
    }

    fn parse_number(&mut self) -> Result<Expr> {
        let line = self.line;
        let mut text = String::new();

        if self.peek() == Some('-') {
            text.push('-');
            self.bump();
        }

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' {
                text.push(c);
                self.bump();
                // Allow a sign directly after an exponent marker
                if (text.ends_with('e') || text.ends_with('E'))
                    && let Some(sign @ ('+' | '-')) = self.peek()
                {
                    text.push(sign);
                    self.bump();
                }
            } else {
                break;
            }
        }

        text.parse::<f64>()
            .map(Expr::Number)
            .map_err(|_| Error::syntax(line, format!("invalid number: '{text}'")))
    }

    fn parse_list(&mut self) -> Result<Expr> {
        self.expect('[')?;
        let mut items = Vec::new();

        loop {
            self.skip_trivia();
            match self.peek() {
                Some(']') => {
                    self.bump();
                    return Ok(Expr::List(items));
                }
                Some(_) => {
                    items.push(self.parse_expr()?);
                    self.skip_trivia();
                    if self.peek() == Some(',') {
                        self.bump();
                    }
                }
                None => {
                    return Err(Error::syntax(self.line, "unclosed list, expected ']'"));
                }
            }
        }
    }

    fn parse_object(&mut self) -> Result<Expr> {
        self.expect('{')?;
        let mut fields = Vec::new();

        loop {
            self.skip_trivia();
            match self.peek() {
                Some('}') => {
                    self.bump();
                    return Ok(Expr::Object(fields));
                }
                Some(c) => {
                    let key_line = self.line;
                    let key = if c == '"' {
                        let template = self.parse_string_template()?;
                        template
                            .as_literal()
                            .map(str::to_string)
                            .ok_or_else(|| {
                                Error::syntax(key_line, "interpolation is not allowed in object keys")
                            })?
                    } else {
                        self.parse_ident()?
                    };

                    self.skip_trivia();
                    self.expect('=')?;
                    self.skip_trivia();
                    let value = self.parse_expr()?;
                    fields.push((key, value));

                    self.skip_trivia();
                    if self.peek() == Some(',') {
                        self.bump();
                    }
                }
                None => {
                    return Err(Error::syntax(self.line, "unclosed object, expected '}'"));
                }
            }
        }
    }

    /// Parse a bare path: keyword literal, identifier, or reference.
    fn parse_path_expr(&mut self) -> Result<Expr> {
        let line = self.line;
        let mut segments = vec![self.parse_ident()?];

        while self.peek() == Some('.') {
            self.bump();
            segments.push(self.parse_ident()?);
        }

        if segments.len() == 1 {
            return Ok(match segments[0].as_str() {
                "true" => Expr::Bool(true),
                "false" => Expr::Bool(false),
                "null" => Expr::Null,
                _ => Expr::Ident(segments.remove(0)),
            });
        }

        classify_reference(&segments, line).map(Expr::Ref)
    }

    // ========================================================================
    // Strings and interpolation
    // ========================================================================

    /// Parse a double-quoted string into a template. Assumes the cursor is
    /// on the opening quote.
    fn parse_string_template(&mut self) -> Result<Template> {
        let start_line = self.line;
        self.expect('"')?;

        let mut parts = Vec::new();
        let mut literal = String::new();

        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => match self.bump() {
                    Some('n') => literal.push('\n'),
                    Some('t') => literal.push('\t'),
                    Some('r') => literal.push('\r'),
                    Some('\\') => literal.push('\\'),
                    Some('"') => literal.push('"'),
                    Some(c) => {
                        return Err(Error::syntax(
                            self.line,
                            format!("invalid escape sequence '\\{c}'"),
                        ));
                    }
                    None => return Err(Error::syntax(start_line, "unclosed string")),
                },
                Some('$') if self.peek() == Some('$') && self.peek_at(1) == Some('{') => {
                    // "$${" escapes a literal "${"
                    self.bump();
                    self.bump();
                    literal.push_str("${");
                }
                Some('$') if self.peek() == Some('{') => {
                    self.bump();
                    if !literal.is_empty() {
                        parts.push(TemplatePart::Lit(std::mem::take(&mut literal)));
                    }
                    parts.push(TemplatePart::Interp(self.parse_interpolation()?));
                }
                Some('\n') => return Err(Error::syntax(start_line, "unclosed string")),
                Some(c) => literal.push(c),
                None => return Err(Error::syntax(start_line, "unclosed string")),
            }
        }

        if !literal.is_empty() {
            parts.push(TemplatePart::Lit(literal));
        }

        Ok(Template { parts })
    }

    /// Parse the reference inside `${...}`. Assumes "${" is consumed.
    fn parse_interpolation(&mut self) -> Result<Reference> {
        let line = self.line;
        let mut text = String::new();

        loop {
            match self.bump() {
                Some('}') => break,
                Some('\n') | None => {
                    return Err(Error::syntax(line, "unclosed interpolation, expected '}'"));
                }
                Some(c) => text.push(c),
            }
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(Error::syntax(line, "empty interpolation"));
        }

        let segments: Vec<String> = text.split('.').map(str::to_string).collect();
        for segment in &segments {
            let mut chars = segment.chars();
            let valid = chars
                .next()
                .is_some_and(Self::is_ident_start)
                && chars.all(Self::is_ident_char);
            if !valid {
                return Err(Error::syntax(
                    line,
                    format!("invalid reference '{text}' in interpolation"),
                ));
            }
        }

        classify_reference(&segments, line)
    }
}

/// Classify a dotted path into a reference. `segments` has length >= 2,
/// except when called from interpolation where a single segment is invalid.
fn classify_reference(segments: &[String], line: usize) -> Result<Reference> {
    match segments {
        [] => Err(Error::syntax(line, "empty reference")),
        [single] => Err(Error::syntax(
            line,
            format!("incomplete reference '{single}'"),
        )),
        [first, name] if first == "var" => Ok(Reference::Var(name.clone())),
        [first, ..] if first == "var" => Err(Error::syntax(
            line,
            "variable references take a single name (var.<name>)",
        )),
        [_, name_only] => Err(Error::syntax(
            line,
            format!(
                "reference must name an attribute: '{}.{}.<attr>'",
                segments[0], name_only
            ),
        )),
        [kind, name, path @ ..] => Ok(Reference::Attr {
            kind: kind.clone(),
            name: name.clone(),
            path: path.to_vec(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_provider_block() {
        let doc = parse_string(r#"provider "local" { root = ".forja" }"#).unwrap();
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(doc.blocks[0].keyword, "provider");
        assert_eq!(doc.blocks[0].labels, vec!["local".to_string()]);
        assert_eq!(
            doc.blocks[0].body.attr("root").unwrap().value,
            Expr::Str(Template::literal(".forja"))
        );
    }

    #[test]
    fn test_parse_resource_block() {
        let doc = parse_string(
            r#"
resource "compute_instance" "web" {
  machine_type = "e2-medium"
  zone         = "us-central1-a"
}
"#,
        )
        .unwrap();

        let block = &doc.blocks[0];
        assert_eq!(block.keyword, "resource");
        assert_eq!(block.labels, vec!["compute_instance", "web"]);
        assert_eq!(block.body.entries.len(), 2);
        assert_eq!(block.line, 2);
    }

    #[test]
    fn test_parse_variable_block() {
        let doc = parse_string(
            r#"
variable "region" {
  type        = string
  default     = "us-central1"
  description = "Deployment region"
}
"#,
        )
        .unwrap();

        let block = &doc.blocks[0];
        assert_eq!(block.keyword, "variable");
        assert_eq!(
            block.body.attr("type").unwrap().value,
            Expr::Ident("string".to_string())
        );
    }

    #[test]
    fn test_parse_scalars() {
        let doc = parse_string(
            r#"
resource "pubsub_topic" "events" {
  count_hint = 3
  ratio      = 0.5
  negative   = -12
  enabled    = true
  disabled   = false
  missing    = null
}
"#,
        )
        .unwrap();

        let body = &doc.blocks[0].body;
        assert_eq!(body.attr("count_hint").unwrap().value, Expr::Number(3.0));
        assert_eq!(body.attr("ratio").unwrap().value, Expr::Number(0.5));
        assert_eq!(body.attr("negative").unwrap().value, Expr::Number(-12.0));
        assert_eq!(body.attr("enabled").unwrap().value, Expr::Bool(true));
        assert_eq!(body.attr("disabled").unwrap().value, Expr::Bool(false));
        assert_eq!(body.attr("missing").unwrap().value, Expr::Null);
    }

    #[test]
    fn test_parse_list_and_object() {
        let doc = parse_string(
            r#"
resource "compute_instance" "web" {
  tags   = ["web", "prod"]
  labels = { env = "dev", "team" = "core" }
}
"#,
        )
        .unwrap();

        let body = &doc.blocks[0].body;
        assert_eq!(
            body.attr("tags").unwrap().value,
            Expr::List(vec![
                Expr::Str(Template::literal("web")),
                Expr::Str(Template::literal("prod")),
            ])
        );
        assert_eq!(
            body.attr("labels").unwrap().value,
            Expr::Object(vec![
                ("env".to_string(), Expr::Str(Template::literal("dev"))),
                ("team".to_string(), Expr::Str(Template::literal("core"))),
            ])
        );
    }

    #[test]
    fn test_parse_references() {
        let doc = parse_string(
            r#"
resource "compute_instance" "web" {
  zone   = var.zone
  bucket = storage_bucket.assets.id
}
"#,
        )
        .unwrap();

        let body = &doc.blocks[0].body;
        assert_eq!(
            body.attr("zone").unwrap().value,
            Expr::Ref(Reference::Var("zone".to_string()))
        );
        assert_eq!(
            body.attr("bucket").unwrap().value,
            Expr::Ref(Reference::Attr {
                kind: "storage_bucket".to_string(),
                name: "assets".to_string(),
                path: vec!["id".to_string()],
            })
        );
    }

    #[test]
    fn test_parse_interpolation() {
        let doc = parse_string(
            r#"
resource "storage_bucket" "assets" {
  location = "${var.region}"
  name     = "${var.prefix}-assets"
}
"#,
        )
        .unwrap();

        let body = &doc.blocks[0].body;
        match &body.attr("name").unwrap().value {
            Expr::Str(template) => {
                assert_eq!(template.parts.len(), 2);
                assert_eq!(
                    template.parts[0],
                    TemplatePart::Interp(Reference::Var("prefix".to_string()))
                );
                assert_eq!(template.parts[1], TemplatePart::Lit("-assets".to_string()));
            }
            other => panic!("expected string template, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_escaped_interpolation() {
        let doc = parse_string(r#"resource "pubsub_topic" "t" { note = "cost: $${var.x}" }"#)
            .unwrap();
        assert_eq!(
            doc.blocks[0].body.attr("note").unwrap().value,
            Expr::Str(Template::literal("cost: ${var.x}"))
        );
    }

    #[test]
    fn test_parse_string_escapes() {
        let doc = parse_string(r#"resource "pubsub_topic" "t" { s = "a\nb\t\"c\"" }"#).unwrap();
        assert_eq!(
            doc.blocks[0].body.attr("s").unwrap().value,
            Expr::Str(Template::literal("a\nb\t\"c\""))
        );
    }

    #[test]
    fn test_parse_nested_block() {
        let doc = parse_string(
            r#"
resource "compute_instance" "web" {
  machine_type = "e2-medium"

  boot_disk {
    image   = "debian-12"
    size_gb = 50
  }
}
"#,
        )
        .unwrap();

        let attrs = doc.blocks[0].body.to_attr_exprs();
        let boot_disk = attrs.iter().find(|(n, _, _)| n == "boot_disk").unwrap();
        match &boot_disk.1 {
            Expr::Object(fields) => assert_eq!(fields.len(), 2),
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_comments() {
        let doc = parse_string(
            r#"
# leading comment
resource "pubsub_topic" "events" {
  // inline style
  labels = { env = "dev" } # trailing
}
"#,
        )
        .unwrap();
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(doc.blocks[0].body.entries.len(), 1);
    }

    #[test]
    fn test_parse_multiple_blocks() {
        let doc = parse_string(
            r#"
provider "local" {}

variable "region" { default = "us-central1" }

resource "storage_bucket" "a" { location = var.region }
resource "storage_bucket" "b" { location = var.region }
"#,
        )
        .unwrap();
        assert_eq!(doc.blocks.len(), 4);
        assert_eq!(doc.blocks_of("resource").count(), 2);
    }

    #[test]
    fn test_error_unclosed_string() {
        let err = parse_string("resource \"pubsub_topic\" \"t\" { s = \"oops }").unwrap_err();
        match err {
            Error::Syntax { message, .. } => assert!(message.contains("unclosed string")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_error_unclosed_block_reports_line() {
        let err = parse_string("resource \"pubsub_topic\" \"t\" {\n  a = 1\n").unwrap_err();
        match err {
            Error::Syntax { line, message } => {
                assert_eq!(line, 3);
                assert!(message.contains("unclosed block"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_error_two_segment_reference() {
        let err =
            parse_string("resource \"pubsub_topic\" \"t\" { x = storage_bucket.assets }")
                .unwrap_err();
        match err {
            Error::Syntax { message, .. } => {
                assert!(message.contains("must name an attribute"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_error_var_reference_with_path() {
        let err = parse_string("resource \"pubsub_topic\" \"t\" { x = var.a.b }").unwrap_err();
        match err {
            Error::Syntax { message, .. } => {
                assert!(message.contains("single name"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_error_label_interpolation() {
        let err = parse_string(r#"resource "pubsub_topic" "${var.x}" {}"#).unwrap_err();
        match err {
            Error::Syntax { message, .. } => {
                assert!(message.contains("not allowed in block labels"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_line_numbers_track_attrs() {
        let doc = parse_string("resource \"pubsub_topic\" \"t\" {\n  a = 1\n  b = 2\n}\n").unwrap();
        let body = &doc.blocks[0].body;
        assert_eq!(body.attr("a").unwrap().line, 2);
        assert_eq!(body.attr("b").unwrap().line, 3);
    }
}
