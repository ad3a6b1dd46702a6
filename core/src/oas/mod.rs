#![deny(missing_docs)]

//! # OpenAPI Documents
//!
//! - **document**: Loading documents and their operations.
//! - **reference**: `$ref` resolution with cycle detection.
//! - **ref_utils**: Reference string and JSON Pointer helpers.

pub mod document;
pub(crate) mod ref_utils;
pub mod reference;

pub use document::SchemaDocument;
pub use reference::ReferenceResolver;
