#![deny(missing_docs)]

//! # Parameters
//!
//! - **descriptor**: Typed parameter and operation definitions.
//! - **collection**: Splitting delimited array values.
//! - **cast**: Type/format driven conversion of raw values.
//! - **source**: Where raw values come from.
//! - **reader**: The per-operation extraction pipeline.

pub mod cast;
pub mod collection;
pub mod descriptor;
pub mod reader;
pub mod source;

pub use collection::CollectionFormat;
pub use descriptor::{Format, Location, OperationDescriptor, ParamType, ParameterDescriptor};
pub use reader::{cast_parameter_value, read_parameters, ParameterMap};
pub use source::{RequestBody, RequestValues, ValueSource};
