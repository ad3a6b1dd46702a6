#![deny(missing_docs)]

//! # OAS Params Core
//!
//! Extraction, casting and validation of Swagger 2.0 operation parameters.
//!
//! A [`SchemaDocument`] is loaded once; each request then runs through
//! [`read_parameters`] with a [`ValueSource`] describing the request.

/// Shared error types.
pub mod error;

/// Engine configuration.
pub mod config;

/// Raw and cast parameter values.
pub mod value;

/// OpenAPI (OAS) documents and reference resolution.
pub mod oas;

/// Parameter descriptors, casting and the extraction pipeline.
pub mod params;

/// Structural and JSON-Schema validation.
pub mod validation;

pub use config::EngineConfig;
pub use error::{
    EngineError, EngineResult, ErroneousParameters, ParameterFailure, PipelineError, Violation,
};
pub use oas::SchemaDocument;
pub use params::{
    cast_parameter_value, read_parameters, CollectionFormat, Location, OperationDescriptor,
    ParameterDescriptor, ParameterMap, RequestValues, ValueSource,
};
pub use validation::validate_against_schema;
pub use value::{ParamValue, RawValue, UploadedFile};
