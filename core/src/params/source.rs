//! # Value Sources
//!
//! [`ValueSource`] is the seam to the web layer: it hands out raw values by
//! parameter. [`RequestValues`] is an in-memory implementation holding an already
//! decomposed request, including content-type negotiation for bodies.

use crate::error::{EngineError, EngineResult};
use crate::params::collection::CollectionFormat;
use crate::params::descriptor::{Location, OperationDescriptor, ParameterDescriptor};
use crate::value::{RawValue, UploadedFile};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tracing::debug;

/// Supplies raw parameter values for one request.
pub trait ValueSource {
    /// Fetches the raw value of `parameter`.
    ///
    /// `Ok(None)` means the value is absent. Errors are fatal for the whole
    /// extraction (e.g. an unsupported body content type).
    fn fetch(
        &self,
        operation: &OperationDescriptor,
        parameter: &ParameterDescriptor,
    ) -> EngineResult<Option<RawValue>>;
}

/// Raw request body plus its `Content-Type`.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    /// Full `Content-Type` header, parameters included.
    pub content_type: String,
    /// Body bytes.
    pub bytes: Vec<u8>,
}

/// An already decomposed request.
#[derive(Debug, Clone, Default)]
pub struct RequestValues {
    path: HashMap<String, String>,
    query: IndexMap<String, Vec<String>>,
    headers: Vec<(String, String)>,
    form: IndexMap<String, Vec<String>>,
    files: HashMap<String, UploadedFile>,
    body: Option<RequestBody>,
}

impl RequestValues {
    /// Creates an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a matched path template variable.
    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path.insert(name.into(), value.into());
        self
    }

    /// Appends a query value. Repeating a key builds a multi-valued entry.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Appends every pair of a raw (percent-encoded) query string.
    pub fn with_query_string(mut self, query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            self.query
                .entry(name.into_owned())
                .or_default()
                .push(value.into_owned());
        }
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Appends a form field value.
    pub fn with_form(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Adds an uploaded file under a form field name.
    pub fn with_file(mut self, name: impl Into<String>, file: UploadedFile) -> Self {
        self.files.insert(name.into(), file);
        self
    }

    /// Sets the raw body and its `Content-Type`.
    pub fn with_body(mut self, content_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.body = Some(RequestBody {
            content_type: content_type.into(),
            bytes: bytes.into(),
        });
        self
    }

    /// Header lookup: case-insensitive, `-` and `_` are equivalent.
    pub fn header(&self, name: &str) -> Option<&str> {
        let wanted = header_key(name);
        self.headers
            .iter()
            .find(|(key, _)| header_key(key) == wanted)
            .map(|(_, value)| value.as_str())
    }

    /// Reads and negotiates the body against the operation's `consumes`.
    ///
    /// # Errors
    ///
    /// * `UnsupportedContentType` - the media type is not consumed, or no reader exists for it.
    /// * `MalformedBody` - the body does not parse as its media type.
    pub fn read_body(&self, operation: &OperationDescriptor) -> EngineResult<Option<RawValue>> {
        let Some(body) = self.body.as_ref().filter(|b| !b.bytes.is_empty()) else {
            return Ok(None);
        };
        let media = MediaType::parse(&body.content_type);
        let consumed = operation
            .consumes()
            .iter()
            .any(|c| MediaType::parse(c).essence == media.essence);
        if !consumed {
            return Err(EngineError::UnsupportedContentType {
                content_type: media.essence,
                consumes: operation.consumes().to_vec(),
            });
        }

        let malformed = |reason: String| EngineError::MalformedBody {
            content_type: media.essence.clone(),
            reason,
        };
        if media.is_json() {
            ensure_utf8_charset(&media).map_err(malformed)?;
            let value: JsonValue =
                serde_json::from_slice(&body.bytes).map_err(|e| malformed(e.to_string()))?;
            return Ok(Some(RawValue::Json(value)));
        }
        if media.essence == "text/plain" {
            ensure_utf8_charset(&media).map_err(malformed)?;
            let text = String::from_utf8(body.bytes.clone()).map_err(|e| malformed(e.to_string()))?;
            return Ok(Some(RawValue::Json(JsonValue::String(text))));
        }
        Err(EngineError::UnsupportedContentType {
            content_type: media.essence,
            consumes: operation.consumes().to_vec(),
        })
    }

    fn multi_valued(
        source: &IndexMap<String, Vec<String>>,
        parameter: &ParameterDescriptor,
    ) -> Option<RawValue> {
        let values = source.get(parameter.name())?;
        let wants_list = parameter.is_array()
            && parameter.declared_collection_format() == Some(&CollectionFormat::Multi);
        if wants_list {
            Some(RawValue::List(values.clone()))
        } else {
            // The last value wins, as with most form decoders.
            values.last().cloned().map(RawValue::Text)
        }
    }
}

impl ValueSource for RequestValues {
    fn fetch(
        &self,
        operation: &OperationDescriptor,
        parameter: &ParameterDescriptor,
    ) -> EngineResult<Option<RawValue>> {
        let name = parameter.name();
        let raw = match parameter.location() {
            Location::FormData if parameter.is_file() => {
                self.files.get(name).cloned().map(RawValue::File)
            }
            Location::Query => Self::multi_valued(&self.query, parameter),
            Location::FormData => Self::multi_valued(&self.form, parameter),
            Location::Path => self.path.get(name).cloned().map(RawValue::Text),
            Location::Header => self.header(name).map(|v| RawValue::Text(v.to_string())),
            Location::Body => self.read_body(operation)?,
        };
        if raw.is_none() {
            debug!(parameter = name, location = %parameter.location(), "parameter absent from request");
        }
        Ok(raw)
    }
}

/// `type/subtype` plus the parameters we care about.
struct MediaType {
    essence: String,
    charset: Option<String>,
}

impl MediaType {
    fn parse(header: &str) -> Self {
        let mut parts = header.split(';');
        let essence = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        let charset = parts.find_map(|part| {
            let (key, value) = part.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim().trim_matches('"').to_ascii_lowercase())
        });
        Self { essence, charset }
    }

    fn is_json(&self) -> bool {
        self.essence == "application/json" || self.essence.ends_with("+json")
    }
}

fn ensure_utf8_charset(media: &MediaType) -> Result<(), String> {
    match media.charset.as_deref() {
        None | Some("utf-8") | Some("utf8") | Some("us-ascii") => Ok(()),
        Some(other) => Err(format!("unsupported charset {}", other)),
    }
}

fn header_key(name: &str) -> String {
    name.to_ascii_uppercase().replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn param(definition: JsonValue) -> ParameterDescriptor {
        ParameterDescriptor::from_value(&definition).unwrap()
    }

    fn op(consumes: &[&str]) -> OperationDescriptor {
        OperationDescriptor::new(
            "/x",
            "post",
            vec![],
            consumes.iter().map(|c| c.to_string()).collect(),
        )
    }

    #[test]
    fn test_query_single_and_multi() {
        let request = RequestValues::new().with_query_string("tag=a&tag=b&tag=c&q=x%20y");
        let multi = param(json!({
            "name": "tag", "in": "query", "type": "array",
            "collectionFormat": "multi", "items": {"type": "string"}
        }));
        assert_eq!(
            request.fetch(&op(&[]), &multi).unwrap(),
            Some(RawValue::List(vec!["a".into(), "b".into(), "c".into()]))
        );
        let single = param(json!({"name": "q", "in": "query", "type": "string"}));
        assert_eq!(request.fetch(&op(&[]), &single).unwrap(), Some("x y".into()));
        let absent = param(json!({"name": "nope", "in": "query", "type": "string"}));
        assert_eq!(request.fetch(&op(&[]), &absent).unwrap(), None);
    }

    #[test]
    fn test_header_lookup_normalized() {
        let request = RequestValues::new().with_header("X-Request-Id", "abc");
        assert_eq!(request.header("x_request_id"), Some("abc"));
        let p = param(json!({"name": "x-request-id", "in": "header", "type": "string"}));
        assert_eq!(request.fetch(&op(&[]), &p).unwrap(), Some("abc".into()));
    }

    #[test]
    fn test_form_and_files() {
        let file = UploadedFile::new("foo.txt", b"foo".to_vec());
        let request = RequestValues::new()
            .with_form("title", "hi")
            .with_file("file", file.clone());
        let file_param = param(json!({"name": "file", "in": "formData", "type": "file"}));
        assert_eq!(
            request.fetch(&op(&[]), &file_param).unwrap(),
            Some(RawValue::File(file))
        );
        let title = param(json!({"name": "title", "in": "formData", "type": "string"}));
        assert_eq!(request.fetch(&op(&[]), &title).unwrap(), Some("hi".into()));
    }

    #[test]
    fn test_path() {
        let request = RequestValues::new().with_path_param("id", "7");
        let p = param(json!({"name": "id", "in": "path", "type": "integer"}));
        assert_eq!(request.fetch(&op(&[]), &p).unwrap(), Some("7".into()));
    }

    #[test]
    fn test_body_json_negotiated() {
        let request =
            RequestValues::new().with_body("application/json; charset=UTF-8", r#"{"a": 1}"#);
        let body = request.read_body(&op(&["application/json"])).unwrap();
        assert_eq!(body, Some(RawValue::Json(json!({"a": 1}))));
    }

    #[test]
    fn test_body_text() {
        let request = RequestValues::new().with_body("text/plain", "hello");
        let body = request.read_body(&op(&["text/plain"])).unwrap();
        assert_eq!(body, Some(RawValue::Json(json!("hello"))));
    }

    #[test]
    fn test_body_not_consumed() {
        let request = RequestValues::new().with_body("text/plain", "hello");
        let err = request.read_body(&op(&["application/json"])).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedContentType { ref content_type, .. } if content_type == "text/plain"));
    }

    #[test]
    fn test_body_malformed() {
        let request = RequestValues::new().with_body("application/json", "{nope");
        let err = request.read_body(&op(&["application/json"])).unwrap_err();
        assert!(matches!(err, EngineError::MalformedBody { .. }));

        let request = RequestValues::new().with_body("application/json; charset=latin-1", "{}");
        let err = request.read_body(&op(&["application/json"])).unwrap_err();
        assert!(matches!(err, EngineError::MalformedBody { .. }));
    }

    #[test]
    fn test_body_without_reader() {
        let request = RequestValues::new().with_body("application/xml", "<a/>");
        let err = request.read_body(&op(&["application/xml"])).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedContentType { .. }));
    }

    #[test]
    fn test_empty_body_is_absent() {
        let request = RequestValues::new().with_body("text/plain", "");
        assert_eq!(request.read_body(&op(&["application/json"])).unwrap(), None);
        assert_eq!(RequestValues::new().read_body(&op(&[])).unwrap(), None);
    }
}
