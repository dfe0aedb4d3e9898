//! Toolgate OpenAPI - Spec Ingest and Tool Translation
//!
//! This crate turns raw OpenAPI 3.x content into the gateway's in-memory
//! [`Document`](toolgate_core::Document) model and translates each operation
//! into the JSON-Schema input of an MCP tool. Validation is best-effort:
//! structural problems reject the document at ingest, everything else
//! degrades to a warning.

mod escape;
mod filter;
mod parse;
mod translate;

pub use escape::{escape_parameter_name, needs_escape};
pub use filter::OperationFilter;
pub use parse::parse_document;
pub use translate::{build_input_schema, build_tool, TranslatedSchema};
