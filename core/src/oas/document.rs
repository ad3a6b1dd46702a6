#![deny(missing_docs)]

//! # API Documents
//!
//! [`SchemaDocument`] owns a parsed Swagger 2.0 (or OpenAPI 3) document and is the
//! read-only context every extraction runs against: it resolves references, names
//! the definitions container and loads [`OperationDescriptor`]s.
//!
//! Documents never change after loading and can be shared between threads.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::oas::ref_utils::local_ref_to_pointer;
use crate::oas::reference::ReferenceResolver;
use crate::params::descriptor::{OperationDescriptor, ParameterDescriptor};
use crate::validation::schema::CompiledSchemas;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use tracing::debug;
use url::Url;

/// HTTP methods that may appear under a path item.
const METHODS: [&str; 7] = ["get", "put", "post", "delete", "options", "head", "patch"];

const SWAGGER_DEFINITIONS: &str = "#/definitions/";
const OPENAPI_SCHEMAS: &str = "#/components/schemas/";

/// A loaded API document.
#[derive(Debug)]
pub struct SchemaDocument {
    root: JsonValue,
    config: EngineConfig,
    definitions_prefix: String,
    resolver: ReferenceResolver,
    compiled: CompiledSchemas,
}

impl SchemaDocument {
    /// Wraps an already parsed document using the default configuration.
    pub fn from_value(root: JsonValue) -> EngineResult<Self> {
        Self::from_value_with_config(root, EngineConfig::default())
    }

    /// Wraps an already parsed document.
    ///
    /// # Errors
    ///
    /// * `Config` - the configuration does not validate.
    /// * `InvalidDocument` - the root is not an object or declares an unusable base URI.
    pub fn from_value_with_config(root: JsonValue, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        if !root.is_object() {
            return Err(EngineError::InvalidDocument(
                "document root must be an object".into(),
            ));
        }

        let definitions_prefix = match &config.definitions_prefix {
            Some(prefix) => prefix.clone(),
            None if root.get("openapi").is_some() => OPENAPI_SCHEMAS.to_string(),
            None => SWAGGER_DEFINITIONS.to_string(),
        };

        let declared_base = root
            .get("x-base-uri")
            .or_else(|| root.get("$self"))
            .and_then(JsonValue::as_str);
        let base_uri = match config.base_uri.as_deref().or(declared_base) {
            Some(raw) => Some(Url::parse(raw).map_err(|e| {
                EngineError::InvalidDocument(format!("invalid base URI '{}': {}", raw, e))
            })?),
            None => None,
        };
        let resolver = ReferenceResolver::new(base_uri, config.max_reference_depth);

        Ok(Self {
            root,
            config,
            definitions_prefix,
            resolver,
            compiled: CompiledSchemas::default(),
        })
    }

    /// Parses a YAML (or JSON) document.
    pub fn from_yaml_str(yaml: &str) -> EngineResult<Self> {
        let root: JsonValue = serde_yaml::from_str(yaml)
            .map_err(|e| EngineError::InvalidDocument(format!("Failed to parse YAML: {}", e)))?;
        Self::from_value(root)
    }

    /// Parses a JSON document.
    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        let root: JsonValue = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidDocument(format!("Failed to parse JSON: {}", e)))?;
        Self::from_value(root)
    }

    /// The raw document.
    pub fn root(&self) -> &JsonValue {
        &self.root
    }

    /// The configuration this document was loaded with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reference prefix of named schemas, e.g. `#/definitions/`.
    pub fn definitions_prefix(&self) -> &str {
        &self.definitions_prefix
    }

    /// The document's base URI, from the configuration or the document itself.
    pub fn base_uri(&self) -> Option<&Url> {
        self.resolver.base_uri()
    }

    /// The named schema, looked up as a direct child of the definitions container.
    ///
    /// `name` is taken literally: no pointer escapes, no percent decoding.
    pub fn definition(&self, name: &str) -> Option<&JsonValue> {
        let container = local_ref_to_pointer(self.definitions_prefix.trim_end_matches('/'));
        self.root.pointer(&container)?.get(name)
    }

    /// Resolves a `$ref` string within this document.
    pub fn resolve(&self, reference: &str) -> EngineResult<&JsonValue> {
        self.resolver.resolve(&self.root, reference)
    }

    /// Resolves a `$ref` string, also returning the JSON pointer it ends at.
    pub fn resolve_pointer(&self, reference: &str) -> EngineResult<(String, &JsonValue)> {
        self.resolver.resolve_pointer(&self.root, reference)
    }

    /// Resolves `node` if it is a reference object, otherwise returns it.
    pub fn resolve_node<'a>(&'a self, node: &'a JsonValue) -> EngineResult<&'a JsonValue> {
        self.resolver.resolve_node(&self.root, node)
    }

    /// Loads the operation at `path` (as templated in the document) and `method`.
    ///
    /// Path-level parameters are merged in; an operation-level parameter with the
    /// same name and location replaces the path-level one. `consumes` falls back to
    /// the document's, then to the configured default.
    ///
    /// # Errors
    ///
    /// * `UnknownOperation` - no such path or method.
    /// * `InvalidDocument` - duplicated parameters, malformed parameter lists.
    /// * `InvalidParameter` - a parameter definition does not load.
    /// * `UnresolvedReference`/`CyclicReference` - from parameter `$ref`s.
    pub fn operation(&self, path: &str, method: &str) -> EngineResult<OperationDescriptor> {
        let unknown = || EngineError::UnknownOperation {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
        };
        let method_key = method.to_ascii_lowercase();
        if !METHODS.contains(&method_key.as_str()) {
            return Err(unknown());
        }
        let path_item = self
            .root
            .get("paths")
            .and_then(|paths| paths.get(path))
            .ok_or_else(unknown)?;
        let path_item = self.resolve_node(path_item)?;
        let operation = path_item.get(&method_key).ok_or_else(unknown)?;

        let mut merged: IndexMap<(String, String), ParameterDescriptor> = IndexMap::new();
        for parameter in self.parameter_list(path_item)? {
            merged.insert(key_of(&parameter), parameter);
        }
        for parameter in self.parameter_list(operation)? {
            merged.insert(key_of(&parameter), parameter);
        }

        let mut parameters: Vec<ParameterDescriptor> = Vec::with_capacity(merged.len());
        for parameter in merged.into_values() {
            if parameters.iter().any(|p| p.name() == parameter.name()) {
                return Err(EngineError::InvalidDocument(format!(
                    "{} {}: parameter name '{}' is declared in more than one location",
                    method_key.to_ascii_uppercase(),
                    path,
                    parameter.name()
                )));
            }
            parameters.push(parameter);
        }

        let consumes = string_list(operation.get("consumes"))
            .or_else(|| string_list(self.root.get("consumes")))
            .unwrap_or_else(|| self.config.default_consumes.clone());

        let mut descriptor = OperationDescriptor::new(path, &method_key, parameters, consumes);
        if let Some(id) = operation.get("operationId").and_then(JsonValue::as_str) {
            descriptor = descriptor.with_operation_id(id);
        }
        debug!(
            operation = %descriptor,
            parameters = descriptor.parameters().len(),
            "loaded operation"
        );
        Ok(descriptor)
    }

    /// Loads every operation, in document order.
    pub fn operations(&self) -> EngineResult<Vec<OperationDescriptor>> {
        let Some(paths) = self.root.get("paths").and_then(JsonValue::as_object) else {
            return Ok(Vec::new());
        };
        let mut operations = Vec::new();
        for (path, item) in paths {
            if path.starts_with("x-") {
                continue;
            }
            let item = self.resolve_node(item)?;
            for method in METHODS {
                if item.get(method).is_some() {
                    operations.push(self.operation(path, method)?);
                }
            }
        }
        Ok(operations)
    }

    pub(crate) fn compiled_schemas(&self) -> &CompiledSchemas {
        &self.compiled
    }

    fn parameter_list(&self, owner: &JsonValue) -> EngineResult<Vec<ParameterDescriptor>> {
        let Some(list) = owner.get("parameters") else {
            return Ok(Vec::new());
        };
        let list = self.resolve_node(list)?.as_array().ok_or_else(|| {
            EngineError::InvalidDocument("'parameters' must be an array".into())
        })?;

        let mut loaded: Vec<ParameterDescriptor> = Vec::with_capacity(list.len());
        for entry in list {
            let parameter = ParameterDescriptor::from_value(self.resolve_node(entry)?)?;
            if loaded.iter().any(|p| key_of(p) == key_of(&parameter)) {
                return Err(EngineError::InvalidDocument(format!(
                    "parameter '{}' in {} is declared twice",
                    parameter.name(),
                    parameter.location()
                )));
            }
            loaded.push(parameter);
        }
        Ok(loaded)
    }
}

fn key_of(parameter: &ParameterDescriptor) -> (String, String) {
    (
        parameter.name().to_string(),
        parameter.location().as_str().to_string(),
    )
}

fn string_list(value: Option<&JsonValue>) -> Option<Vec<String>> {
    let list = value?.as_array()?;
    Some(
        list.iter()
            .filter_map(JsonValue::as_str)
            .map(str::to_string)
            .collect(),
    )
}
