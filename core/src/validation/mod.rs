#![deny(missing_docs)]

//! # Validation
//!
//! - **keywords**: Structural keywords allowed directly on parameters.
//! - **schema**: Full JSON-Schema validation with discriminator support.

pub mod keywords;
pub mod schema;

pub use keywords::{validate_structural, ValidationKeys, VALIDATION_KEYWORDS};
pub use schema::{validate_against_schema, SchemaValidator};
