//! # declkit
//!
//! Parser and writer for forja declaration files.
//!
//! A declaration file is a list of labeled blocks describing desired
//! infrastructure state:
//!
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
//!
//! This crate owns the surface syntax only: blocks, attributes, literal
//! values, reference paths (`var.name`, `kind.name.attr`), and `${...}`
//! string interpolation. What the blocks *mean* (schemas, resolution,
//! diffing, execution) lives in the `converge` crate.
//!
//! ## Example
//!
//! ```
//! use declkit::parse_string;
//!
//! let doc = parse_string(r#"
//! resource "storage_bucket" "assets" {
//!   location = "us-central1"
//! }
//! "#).unwrap();
//!
//! let block = &doc.blocks[0];
//! assert_eq!(block.keyword, "resource");
//! assert_eq!(block.labels, vec!["storage_bucket", "assets"]);
//! assert_eq!(
//!     block.body.attr("location").unwrap().value.as_literal_str(),
//!     Some("us-central1"),
//! );
//! ```

pub mod ast;
pub mod error;
pub mod parser;
pub mod writer;

// Re-export main types at crate root
pub use ast::{
    Attribute, Block, Body, BodyEntry, Document, Expr, NestedBlock, Reference, Template,
    TemplatePart,
};
pub use error::{Error, Result};
pub use parser::{parse_file, parse_string};
pub use writer::{is_canonical, write_file, write_string};
