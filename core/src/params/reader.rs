#![deny(missing_docs)]

//! # Parameter Reader
//!
//! Runs every parameter of an operation through fetch, cast and validation,
//! collecting recoverable failures per parameter and aborting on fatal ones.

use crate::error::{
    EngineError, EngineResult, ErroneousParameters, ParameterFailure, PipelineError, Violation,
};
use crate::oas::document::SchemaDocument;
use crate::params::cast::cast_primitive;
use crate::params::collection::arrayfy;
use crate::params::descriptor::{OperationDescriptor, ParameterDescriptor};
use crate::params::source::ValueSource;
use crate::validation::keywords::validate_structural;
use crate::validation::schema::validate_against_schema;
use crate::value::{ParamValue, RawValue};
use indexmap::IndexMap;
use tracing::{debug, warn};

/// Extracted values by parameter name, in declaration order.
pub type ParameterMap = IndexMap<String, ParamValue>;

/// Extracts, casts and validates every parameter of `operation`.
///
/// # Errors
///
/// * `Erroneous` - one or more parameters failed recoverably; the report carries
///   the failures and the parameters that did succeed.
/// * Any other variant - a fatal condition that aborted the extraction.
pub fn read_parameters<S: ValueSource + ?Sized>(
    document: &SchemaDocument,
    operation: &OperationDescriptor,
    source: &S,
) -> EngineResult<ParameterMap> {
    debug!(operation = %operation, "reading parameters");
    let mut parameters = ParameterMap::new();
    let mut errors: IndexMap<String, ParameterFailure> = IndexMap::new();

    for descriptor in operation.parameters() {
        let name = descriptor.name();
        let outcome = match source.fetch(operation, descriptor) {
            Ok(Some(raw)) => cast_parameter_value(document, descriptor, raw).map(Some),
            Ok(None) => absent_value(descriptor),
            Err(err) => Err(PipelineError::Fatal(err)),
        };

        match outcome {
            Ok(Some(value)) => {
                parameters.insert(name.to_string(), value);
            }
            Ok(None) => {}
            Err(PipelineError::Failure(failure)) => {
                debug!(parameter = name, kind = failure.kind(), "{}", failure);
                errors.entry(name.to_string()).or_insert(failure);
            }
            Err(PipelineError::Fatal(err)) => {
                warn!(operation = %operation, parameter = name, error = %err, "parameter extraction aborted");
                return Err(err);
            }
        }
    }

    debug!(
        operation = %operation,
        parsed = parameters.len(),
        failed = errors.len(),
        "finished reading parameters"
    );
    if errors.is_empty() {
        Ok(parameters)
    } else {
        Err(EngineError::Erroneous(ErroneousParameters { errors, parameters }))
    }
}

/// Casts and validates one raw value against its descriptor.
///
/// Arrays are split (unless already a sequence) and each element goes through the
/// `items` descriptor; the array as a whole is then checked against its `schema` if
/// there is one, otherwise against the parameter's own keywords. Values of other
/// parameters with a `schema` are validated against it and returned as
/// [`ParamValue::Json`].
pub fn cast_parameter_value(
    document: &SchemaDocument,
    descriptor: &ParameterDescriptor,
    raw: RawValue,
) -> Result<ParamValue, PipelineError> {
    let name = descriptor.name();

    if let Some(items) = descriptor.items().filter(|_| descriptor.is_array()) {
        let mut values = Vec::new();
        for item in arrayfy(name, descriptor.collection_format(), raw)? {
            values.push(cast_parameter_value(document, items, item)?);
        }
        let array = ParamValue::Array(values);
        // A declared schema replaces the parameter-level keywords.
        if let Some(schema) = descriptor.schema() {
            if let Some(instance) = array.to_json() {
                let violations = validate_against_schema(document, &instance, schema)?;
                check_violations(name, violations)?;
            }
            return Ok(array);
        }
        check_violations(name, validate_structural(&array, descriptor.validation_keys()))?;
        return Ok(array);
    }

    if let Some(schema) = descriptor.schema() {
        let Some(instance) = raw.into_json() else {
            return Err(schema_failure(
                name,
                vec![Violation::new(
                    "",
                    "type",
                    "a file upload cannot be validated against a schema",
                )],
            ));
        };
        let violations = validate_against_schema(document, &instance, schema)?;
        check_violations(name, violations)?;
        return Ok(ParamValue::Json(instance));
    }

    let value = cast_primitive(descriptor.param_type(), descriptor.format(), raw)
        .map_err(|e| e.into_failure(name))?;
    check_violations(name, validate_structural(&value, descriptor.validation_keys()))?;
    Ok(value)
}

fn absent_value(descriptor: &ParameterDescriptor) -> Result<Option<ParamValue>, PipelineError> {
    if let Some(default) = descriptor.default() {
        return Ok(Some(ParamValue::from_json(default)));
    }
    if descriptor.required() {
        return Err(ParameterFailure::Missing {
            name: descriptor.name().to_string(),
        }
        .into());
    }
    Ok(None)
}

fn check_violations(name: &str, violations: Vec<Violation>) -> Result<(), PipelineError> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(schema_failure(name, violations))
    }
}

fn schema_failure(name: &str, violations: Vec<Violation>) -> PipelineError {
    ParameterFailure::SchemaValidation {
        name: name.to_string(),
        violations,
    }
    .into()
}
