//! # Error Handling
//!
//! Two tiers of failure:
//!
//! - [`ParameterFailure`]: recoverable, recorded per parameter and folded into
//!   [`ErroneousParameters`].
//! - [`EngineError`]: aborts the whole extraction (malformed API document,
//!   unsupported request shape, or the aggregate report itself).

use crate::value::ParamValue;
use derive_more::{Display, From};
use indexmap::IndexMap;
use std::fmt;

/// A single violated schema constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// JSON pointer to the offending part of the instance (`""` is the instance itself).
    pub instance_path: String,
    /// The keyword that failed, e.g. `maxLength`.
    pub keyword: String,
    /// Human readable description.
    pub message: String,
}

impl Violation {
    /// Creates a new violation.
    pub fn new(
        instance_path: impl Into<String>,
        keyword: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            instance_path: instance_path.into(),
            keyword: keyword.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "{} ({})", self.message, self.keyword)
        } else {
            write!(
                f,
                "{} ({} at '{}')",
                self.message, self.keyword, self.instance_path
            )
        }
    }
}

/// Recoverable, per-parameter failure.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum ParameterFailure {
    /// A required parameter without a default was absent from its source.
    #[display("parameter {name} is required but missing")]
    Missing {
        /// Parameter name.
        name: String,
    },
    /// The raw value could not be converted to the declared type/format.
    #[display("parameter {name}: cannot cast {raw:?}: {reason}")]
    Cast {
        /// Parameter name.
        name: String,
        /// The offending raw value, rendered as text.
        raw: String,
        /// Why the conversion failed.
        reason: String,
    },
    /// The value was cast but violates its schema or validation keywords.
    #[display("parameter {name} is invalid: {}", join(violations, "; "))]
    SchemaValidation {
        /// Parameter name.
        name: String,
        /// Every violated constraint, in discovery order.
        violations: Vec<Violation>,
    },
}

impl ParameterFailure {
    /// The parameter this failure belongs to.
    pub fn name(&self) -> &str {
        match self {
            Self::Missing { name }
            | Self::Cast { name, .. }
            | Self::SchemaValidation { name, .. } => name,
        }
    }

    /// Short machine-friendly kind, suitable for field-by-field error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Missing { .. } => "missing",
            Self::Cast { .. } => "cast",
            Self::SchemaValidation { .. } => "validation",
        }
    }

    /// The violated constraints (empty unless this is a validation failure).
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::SchemaValidation { violations, .. } => violations,
            _ => &[],
        }
    }
}

impl std::error::Error for ParameterFailure {}

/// Aggregate report of every recoverable failure in one extraction.
///
/// `parameters` holds whatever did succeed so callers can report only the
/// parameters that actually failed.
#[derive(Debug, Clone, PartialEq, Default, Display)]
#[display("Erroneous parameters: {}", join(errors.keys(), ", "))]
pub struct ErroneousParameters {
    /// Parameter name to its (first) failure, in declaration order.
    pub errors: IndexMap<String, ParameterFailure>,
    /// Successfully extracted parameters.
    pub parameters: IndexMap<String, ParamValue>,
}

impl std::error::Error for ErroneousParameters {}

/// The engine's fatal error enum.
///
/// Everything here aborts an extraction immediately.
#[derive(Debug, Display, From)]
pub enum EngineError {
    /// An array parameter declares a `collectionFormat` with no splitter.
    #[from(ignore)]
    #[display("Unsupported collection format '{format}' in parameter '{name}'")]
    UnsupportedCollectionFormat {
        /// Parameter name.
        name: String,
        /// The declared format.
        format: String,
    },

    /// A `$ref` pointer does not exist in the document (or is external).
    #[from(ignore)]
    #[display("Unresolved reference: {_0}")]
    UnresolvedReference(String),

    /// A `$ref` chain loops back on itself or exceeds the configured depth.
    #[from(ignore)]
    #[display("Cyclic reference: {_0}")]
    CyclicReference(String),

    /// The request body's content type is not accepted by the operation.
    #[from(ignore)]
    #[display("Content-type {content_type} is not supported ({consumes:?} are)")]
    UnsupportedContentType {
        /// Content type of the request.
        content_type: String,
        /// Media types the operation consumes.
        consumes: Vec<String>,
    },

    /// The request body could not be parsed per its content type.
    #[from(ignore)]
    #[display("Unable to parse this body as {content_type}: {reason}")]
    MalformedBody {
        /// Negotiated content type.
        content_type: String,
        /// Parser error.
        reason: String,
    },

    /// The API document is not usable.
    #[from(ignore)]
    #[display("Invalid document: {_0}")]
    InvalidDocument(String),

    /// A parameter definition is malformed.
    #[from(ignore)]
    #[display("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name (or `<unnamed>`).
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// No such path/method in the document.
    #[from(ignore)]
    #[display("Unknown operation {method} {path}")]
    UnknownOperation {
        /// HTTP method.
        method: String,
        /// Path template.
        path: String,
    },

    /// Engine configuration is invalid.
    #[from(ignore)]
    #[display("Config Error: {_0}")]
    Config(String),

    /// One or more parameters failed recoverably.
    #[display("{_0}")]
    Erroneous(ErroneousParameters),
}

impl EngineError {
    /// The aggregate report, if this error is one.
    pub fn as_erroneous(&self) -> Option<&ErroneousParameters> {
        match self {
            Self::Erroneous(report) => Some(report),
            _ => None,
        }
    }
}

/// Manual implementation of the standard Error trait.
impl std::error::Error for EngineError {}

fn join<T: fmt::Display>(items: impl IntoIterator<Item = T>, separator: &str) -> String {
    items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Helper type alias for Result using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

/// Why a single parameter's pipeline did not produce a value.
///
/// `Failure` is collected by the reader, `Fatal` propagates.
#[derive(Debug, Display, From)]
pub enum PipelineError {
    /// Recoverable failure for this parameter.
    #[display("{_0}")]
    Failure(ParameterFailure),
    /// Abort the extraction.
    #[display("{_0}")]
    Fatal(EngineError),
}

impl std::error::Error for PipelineError {}
