//! # Collection Formats
//!
//! Swagger 2.0 `collectionFormat` handling: turning one delimited value into the
//! ordered raw items of an array parameter.

use crate::error::{EngineError, ParameterFailure, PipelineError};
use crate::value::RawValue;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::fmt;

/// Swagger 2.0 `collectionFormat`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum CollectionFormat {
    /// Comma separated (`a,b,c`), the default.
    Csv,
    /// Space separated.
    Ssv,
    /// Tab separated.
    Tsv,
    /// Pipe separated.
    Pipes,
    /// Repeated keys; the source delivers a native sequence.
    Multi,
    /// Anything else. Kept so the document loads, rejected when splitting.
    Unsupported(String),
}

impl CollectionFormat {
    /// Delimiter of the splitting formats (`None` for `multi` and unsupported ones).
    pub fn delimiter(&self) -> Option<char> {
        match self {
            Self::Csv => Some(','),
            Self::Ssv => Some(' '),
            Self::Tsv => Some('\t'),
            Self::Pipes => Some('|'),
            Self::Multi | Self::Unsupported(_) => None,
        }
    }

    /// The spelling used in documents.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Ssv => "ssv",
            Self::Tsv => "tsv",
            Self::Pipes => "pipes",
            Self::Multi => "multi",
            Self::Unsupported(other) => other,
        }
    }
}

impl From<String> for CollectionFormat {
    fn from(value: String) -> Self {
        match value.as_str() {
            "csv" => Self::Csv,
            "ssv" => Self::Ssv,
            "tsv" => Self::Tsv,
            "pipes" => Self::Pipes,
            "multi" => Self::Multi,
            _ => Self::Unsupported(value),
        }
    }
}

impl fmt::Display for CollectionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Splits a delimited text value.
///
/// `multi` yields the text as a single item; the source is responsible for
/// delivering repeated values as a [`RawValue::List`].
///
/// # Errors
///
/// `UnsupportedCollectionFormat` for formats without a splitter. This is a defect
/// of the API document, so it is fatal rather than a per-parameter failure.
pub fn split(name: &str, format: &CollectionFormat, text: &str) -> Result<Vec<String>, EngineError> {
    match format {
        CollectionFormat::Multi => Ok(vec![text.to_string()]),
        CollectionFormat::Unsupported(other) => Err(EngineError::UnsupportedCollectionFormat {
            name: name.to_string(),
            format: other.clone(),
        }),
        splittable => {
            let delimiter = splittable.delimiter().unwrap_or(',');
            Ok(text.split(delimiter).map(str::to_string).collect())
        }
    }
}

/// Turns a raw value into the ordered raw items of an array parameter.
///
/// Native sequences are never re-split.
pub fn arrayfy(
    name: &str,
    format: &CollectionFormat,
    raw: RawValue,
) -> Result<Vec<RawValue>, PipelineError> {
    match raw {
        RawValue::List(items) => Ok(items.into_iter().map(RawValue::Text).collect()),
        RawValue::Json(JsonValue::Array(items)) => Ok(items.into_iter().map(RawValue::Json).collect()),
        RawValue::Text(text) | RawValue::Json(JsonValue::String(text)) => {
            Ok(split(name, format, &text)?
                .into_iter()
                .map(RawValue::Text)
                .collect())
        }
        other => Err(ParameterFailure::Cast {
            name: name.to_string(),
            raw: other.describe(),
            reason: "expected a sequence or a delimited string".into(),
        }
        .into()),
    }
}
