#![deny(missing_docs)]

//! # Parameter Descriptors
//!
//! Read-only, typed projections of Swagger 2.0 parameter definitions.
//! Built once when an operation is loaded and shared freely afterwards.

use crate::error::{EngineError, EngineResult};
use crate::params::collection::CollectionFormat;
use crate::validation::keywords::ValidationKeys;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::fmt;

/// Where a parameter's value comes from (`in`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Location {
    /// Templated path segment.
    Path,
    /// Query string.
    Query,
    /// Request header.
    Header,
    /// Form field or file upload.
    FormData,
    /// Request body.
    Body,
}

impl Location {
    /// The spelling used in documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::FormData => "formData",
            Self::Body => "body",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared primitive `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// `string`.
    String,
    /// `integer`.
    Integer,
    /// `number`.
    Number,
    /// `boolean`.
    Boolean,
    /// `array`.
    Array,
    /// `file`.
    File,
    /// `object`.
    Object,
    /// Any other type name; values pass through uncast.
    #[serde(other)]
    Unknown,
}

/// Declared `format`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum Format {
    /// `int32`.
    Int32,
    /// `int64` (also `long`).
    Int64,
    /// `float`.
    Float,
    /// `double`.
    Double,
    /// `byte`: base64 encoded characters.
    Byte,
    /// `binary`: any sequence of octets.
    Binary,
    /// `date`: ISO 8601 full-date.
    Date,
    /// `dateTime` (also `date-time`): ISO 8601 timestamp.
    DateTime,
    /// Anything else (`password`, `uuid`, ...). Has no effect on casting.
    Other(String),
}

impl From<String> for Format {
    fn from(value: String) -> Self {
        match value.as_str() {
            "int32" => Self::Int32,
            "int64" | "long" => Self::Int64,
            "float" => Self::Float,
            "double" => Self::Double,
            "byte" => Self::Byte,
            "binary" => Self::Binary,
            "date" => Self::Date,
            "dateTime" | "date-time" => Self::DateTime,
            _ => Self::Other(value),
        }
    }
}

/// The typed part of a parameter (or `items`) definition.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShimParameter {
    #[serde(rename = "type")]
    param_type: Option<ParamType>,
    format: Option<Format>,
    collection_format: Option<CollectionFormat>,
    items: Option<JsonValue>,
    schema: Option<JsonValue>,
    #[serde(default)]
    required: bool,
}

/// Name and location of a top-level parameter.
#[derive(Deserialize)]
struct ShimHeader {
    name: String,
    #[serde(rename = "in")]
    location: Location,
}

/// One operation parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    name: String,
    location: Location,
    param_type: Option<ParamType>,
    format: Option<Format>,
    collection_format: Option<CollectionFormat>,
    items: Option<Box<ParameterDescriptor>>,
    schema: Option<JsonValue>,
    required: bool,
    default: Option<JsonValue>,
    validation_keys: ValidationKeys,
}

impl ParameterDescriptor {
    /// Builds a descriptor from a (resolved) parameter definition object.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` when `name`/`in` are missing or unsupported, when an array
    /// lacks `items`, or when a validation keyword is malformed.
    pub fn from_value(definition: &JsonValue) -> EngineResult<Self> {
        let header: ShimHeader = serde_json::from_value(definition.clone()).map_err(|e| {
            EngineError::InvalidParameter {
                name: definition
                    .get("name")
                    .and_then(JsonValue::as_str)
                    .unwrap_or("<unnamed>")
                    .to_string(),
                reason: e.to_string(),
            }
        })?;
        Self::from_fragment(&header.name, header.location, definition)
    }

    /// Builds a descriptor for a definition fragment that carries no `name`/`in`
    /// of its own, such as `items`.
    pub fn from_fragment(name: &str, location: Location, fragment: &JsonValue) -> EngineResult<Self> {
        let invalid = |reason: String| EngineError::InvalidParameter {
            name: name.to_string(),
            reason,
        };
        let map = fragment
            .as_object()
            .ok_or_else(|| invalid("definition must be an object".into()))?;
        let shim: ShimParameter =
            serde_json::from_value(fragment.clone()).map_err(|e| invalid(e.to_string()))?;

        let items = match (&shim.param_type, &shim.items) {
            (_, Some(items)) => Some(Box::new(Self::from_fragment(name, location, items)?)),
            (Some(ParamType::Array), None) if shim.schema.is_none() => {
                return Err(invalid("array parameters must declare 'items'".into()));
            }
            _ => None,
        };
        let validation_keys = ValidationKeys::from_map(map).map_err(invalid)?;

        Ok(Self {
            name: name.to_string(),
            location,
            param_type: shim.param_type,
            format: shim.format,
            collection_format: shim.collection_format,
            items,
            schema: shim.schema,
            required: shim.required || location == Location::Path,
            default: map.get("default").cloned(),
            validation_keys,
        })
    }

    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the value comes from.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Declared `type`.
    pub fn param_type(&self) -> Option<&ParamType> {
        self.param_type.as_ref()
    }

    /// Whether `type: array`.
    pub fn is_array(&self) -> bool {
        self.param_type == Some(ParamType::Array)
    }

    /// Whether `type: file`.
    pub fn is_file(&self) -> bool {
        self.param_type == Some(ParamType::File)
    }

    /// Declared `format`.
    pub fn format(&self) -> Option<&Format> {
        self.format.as_ref()
    }

    /// Declared `collectionFormat`, as written.
    pub fn declared_collection_format(&self) -> Option<&CollectionFormat> {
        self.collection_format.as_ref()
    }

    /// Effective `collectionFormat` (`csv` unless declared).
    pub fn collection_format(&self) -> &CollectionFormat {
        self.collection_format.as_ref().unwrap_or(&CollectionFormat::Csv)
    }

    /// Descriptor of array elements.
    pub fn items(&self) -> Option<&ParameterDescriptor> {
        self.items.as_deref()
    }

    /// JSON Schema for structured values.
    pub fn schema(&self) -> Option<&JsonValue> {
        self.schema.as_ref()
    }

    /// Whether absence is an error. Path parameters are always required.
    pub fn required(&self) -> bool {
        self.required
    }

    /// Whether a `default` is declared (even `null`).
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// The declared `default`.
    pub fn default(&self) -> Option<&JsonValue> {
        self.default.as_ref()
    }

    /// The structural validation keywords of this definition.
    pub fn validation_keys(&self) -> &ValidationKeys {
        &self.validation_keys
    }
}

/// One operation: its parameters and accepted body media types.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    path: String,
    method: String,
    operation_id: Option<String>,
    parameters: Vec<ParameterDescriptor>,
    consumes: Vec<String>,
}

impl OperationDescriptor {
    /// Creates an operation. `method` is stored upper-cased.
    pub fn new(
        path: impl Into<String>,
        method: impl AsRef<str>,
        parameters: Vec<ParameterDescriptor>,
        consumes: Vec<String>,
    ) -> Self {
        Self {
            path: path.into(),
            method: method.as_ref().to_ascii_uppercase(),
            operation_id: None,
            parameters,
            consumes,
        }
    }

    /// Sets the `operationId`.
    pub fn with_operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    /// Path template.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Upper-cased HTTP method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// `operationId`, if declared.
    pub fn operation_id(&self) -> Option<&str> {
        self.operation_id.as_deref()
    }

    /// Parameters in declaration order.
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// Looks a parameter up by name.
    pub fn parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Media types accepted for the request body.
    pub fn consumes(&self) -> &[String] {
        &self.consumes
    }
}

impl fmt::Display for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::keywords::ExclusiveBound;
    use serde_json::json;

    #[test]
    fn test_basic_projection() {
        let p = ParameterDescriptor::from_value(&json!({
            "name": "greeting",
            "in": "query",
            "type": "string",
            "default": "henlo",
            "maxLength": 10,
            "description": "not a validation key"
        }))
        .unwrap();
        assert_eq!(p.name(), "greeting");
        assert_eq!(p.location(), Location::Query);
        assert_eq!(p.param_type(), Some(&ParamType::String));
        assert!(!p.required());
        assert!(p.has_default());
        assert_eq!(p.default(), Some(&json!("henlo")));
        assert_eq!(p.validation_keys().max_length, Some(10));
        assert_eq!(p.validation_keys().min_length, None);
    }

    #[test]
    fn test_null_default_counts() {
        let p = ParameterDescriptor::from_value(&json!({
            "name": "x", "in": "query", "type": "string", "default": null
        }))
        .unwrap();
        assert!(p.has_default());
    }

    #[test]
    fn test_array_items_and_collection_format() {
        let p = ParameterDescriptor::from_value(&json!({
            "name": "tag",
            "in": "query",
            "type": "array",
            "items": {"type": "integer", "format": "int64", "minimum": 1, "exclusiveMinimum": true}
        }))
        .unwrap();
        assert!(p.is_array());
        assert_eq!(p.collection_format(), &CollectionFormat::Csv);
        assert_eq!(p.declared_collection_format(), None);
        let items = p.items().unwrap();
        assert_eq!(items.name(), "tag");
        assert_eq!(items.format(), Some(&Format::Int64));
        assert_eq!(items.validation_keys().exclusive_minimum, Some(ExclusiveBound::Flag(true)));
    }

    #[test]
    fn test_unknown_collection_format_loads() {
        let p = ParameterDescriptor::from_value(&json!({
            "name": "blep", "in": "query", "type": "array",
            "collectionFormat": "blorp", "items": {"type": "string"}
        }))
        .unwrap();
        assert_eq!(p.collection_format(), &CollectionFormat::Unsupported("blorp".into()));
    }

    #[test]
    fn test_array_without_items_rejected() {
        let err = ParameterDescriptor::from_value(&json!({
            "name": "tag", "in": "query", "type": "array"
        }))
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { ref name, .. } if name == "tag"));
    }

    #[test]
    fn test_unsupported_location_rejected() {
        let err = ParameterDescriptor::from_value(&json!({
            "name": "sid", "in": "cookie", "type": "string"
        }))
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { ref name, .. } if name == "sid"));
    }

    #[test]
    fn test_path_parameters_required() {
        let p = ParameterDescriptor::from_value(&json!({
            "name": "id", "in": "path", "type": "integer"
        }))
        .unwrap();
        assert!(p.required());
    }

    #[test]
    fn test_formats_and_unknown_types() {
        assert_eq!(Format::from("date-time".to_string()), Format::DateTime);
        assert_eq!(Format::from("uuid".to_string()), Format::Other("uuid".into()));
        let p = ParameterDescriptor::from_value(&json!({
            "name": "x", "in": "query", "type": "whatever"
        }))
        .unwrap();
        assert_eq!(p.param_type(), Some(&ParamType::Unknown));
    }

    #[test]
    fn test_body_schema() {
        let p = ParameterDescriptor::from_value(&json!({
            "name": "pet", "in": "body", "required": true,
            "schema": {"$ref": "#/definitions/Pet"}
        }))
        .unwrap();
        assert_eq!(p.location(), Location::Body);
        assert_eq!(p.schema(), Some(&json!({"$ref": "#/definitions/Pet"})));
        assert!(p.param_type().is_none());
    }

    #[test]
    fn test_operation_lookup() {
        let p = ParameterDescriptor::from_value(&json!({"name": "a", "in": "query"})).unwrap();
        let op = OperationDescriptor::new("/add", "get", vec![p], vec![]).with_operation_id("add");
        assert_eq!(op.method(), "GET");
        assert_eq!(op.to_string(), "GET /add");
        assert!(op.parameter("a").is_some());
        assert!(op.parameter("b").is_none());
        assert_eq!(op.operation_id(), Some("add"));
    }
}
