#![deny(missing_docs)]

//! # Values
//!
//! [`RawValue`] is what a [`ValueSource`](crate::params::source::ValueSource) hands over,
//! [`ParamValue`] is what comes out of the cast pipeline.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde_json::{Number, Value as JsonValue};
use std::fmt;

/// An uploaded file as delivered by the web layer.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Client supplied file name.
    pub file_name: String,
    /// Declared content type of the part, if any.
    pub content_type: Option<String>,
    /// File contents.
    pub content: Vec<u8>,
}

impl UploadedFile {
    /// Creates a file handle from a name and its contents.
    pub fn new(file_name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            content: content.into(),
        }
    }

    /// Sets the part's content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Size of the contents in bytes.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Whether the file is empty.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

// Contents are elided; uploads can be large.
impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.content.len())
            .finish()
    }
}

/// An untyped value fetched from a request.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// A single textual value (path segment, query value, header...).
    Text(String),
    /// A native sequence, e.g. repeated query keys for `collectionFormat: multi`.
    List(Vec<String>),
    /// A negotiated, parsed request body.
    Json(JsonValue),
    /// An uploaded file.
    File(UploadedFile),
}

impl RawValue {
    /// Converts to JSON for schema validation. Files have no JSON form.
    pub fn into_json(self) -> Option<JsonValue> {
        match self {
            Self::Text(text) => Some(JsonValue::String(text)),
            Self::List(items) => Some(JsonValue::Array(
                items.into_iter().map(JsonValue::String).collect(),
            )),
            Self::Json(value) => Some(value),
            Self::File(_) => None,
        }
    }

    /// Renders the value for error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::List(items) => format!("{:?}", items),
            Self::Json(JsonValue::String(text)) => text.clone(),
            Self::Json(value) => value.to_string(),
            Self::File(file) => format!("<file {}>", file.file_name),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for RawValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<JsonValue> for RawValue {
    fn from(value: JsonValue) -> Self {
        Self::Json(value)
    }
}

impl From<UploadedFile> for RawValue {
    fn from(value: UploadedFile) -> Self {
        Self::File(value)
    }
}

/// A typed parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// JSON `null` (only reachable through declared defaults).
    Null,
    /// `type: boolean`.
    Bool(bool),
    /// `type: integer` or an integer format.
    Integer(i64),
    /// `type: number` or a float format.
    Number(f64),
    /// `type: string` without a special format.
    String(String),
    /// `format: byte` (decoded) or `format: binary`.
    Bytes(Vec<u8>),
    /// `format: date`.
    Date(NaiveDate),
    /// `format: dateTime`.
    DateTime(DateTime<FixedOffset>),
    /// `type: array`, always ordered.
    Array(Vec<ParamValue>),
    /// A schema-validated structured value, or an uncast JSON passthrough.
    Json(JsonValue),
    /// `type: file`.
    File(UploadedFile),
}

impl ParamValue {
    /// Maps a declared `default` to a typed value.
    ///
    /// Scalars map to their scalar variants, arrays to [`ParamValue::Array`],
    /// objects stay JSON.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Self::String(s.clone()),
            JsonValue::Array(items) => Self::Array(items.iter().map(Self::from_json).collect()),
            JsonValue::Object(_) => Self::Json(value.clone()),
        }
    }

    /// JSON view used for keyword and schema validation.
    ///
    /// Returns `None` for bytes, dates, timestamps and files (and arrays holding
    /// them): those have no JSON counterpart the validation keywords apply to.
    pub fn to_json(&self) -> Option<JsonValue> {
        match self {
            Self::Null => Some(JsonValue::Null),
            Self::Bool(b) => Some(JsonValue::Bool(*b)),
            Self::Integer(i) => Some(JsonValue::from(*i)),
            Self::Number(n) => Number::from_f64(*n).map(JsonValue::Number),
            Self::String(s) => Some(JsonValue::String(s.clone())),
            Self::Array(items) => items
                .iter()
                .map(Self::to_json)
                .collect::<Option<Vec<_>>>()
                .map(JsonValue::Array),
            Self::Json(value) => Some(value.clone()),
            Self::Bytes(_) | Self::Date(_) | Self::DateTime(_) | Self::File(_) => None,
        }
    }

    /// Returns the text of a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer of an integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns a numeric value as float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the flag of a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the elements of an array value.
    pub fn as_array(&self) -> Option<&[ParamValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the bytes of a `byte`/`binary` value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Returns the uploaded file of a `file` value.
    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            Self::File(file) => Some(file),
            _ => None,
        }
    }

    /// Returns the JSON of a structured value.
    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}
