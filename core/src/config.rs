//! # Engine Configuration
//!
//! Knobs that belong to a loaded document rather than to a single extraction.
//! Deserializable from YAML/JSON with camelCase keys; every field has a default.

use crate::error::{EngineError, EngineResult};
use serde::Deserialize;
use url::Url;

const DEFAULT_MAX_REFERENCE_DEPTH: usize = 64;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct EngineConfig {
    /// Reference prefix under which discriminator tags are looked up.
    /// `None` derives it from the document (`#/definitions/` for Swagger 2.0,
    /// `#/components/schemas/` for OpenAPI 3).
    pub definitions_prefix: Option<String>,
    /// Maximum number of `$ref` hops (and schema-combinator hops at one instance
    /// location) before resolution is declared cyclic.
    pub max_reference_depth: usize,
    /// Media types consumed by operations when neither the operation nor the
    /// document declares `consumes`.
    pub default_consumes: Vec<String>,
    /// URI the document was retrieved from. References whose document part matches
    /// it are resolved locally. Overrides `x-base-uri` / `$self` in the document.
    pub base_uri: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            definitions_prefix: None,
            max_reference_depth: DEFAULT_MAX_REFERENCE_DEPTH,
            default_consumes: vec!["application/json".to_string()],
            base_uri: None,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a configuration from YAML (JSON is valid YAML).
    pub fn from_yaml_str(yaml: &str) -> EngineResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values for consistency.
    pub fn validate(&self) -> EngineResult<()> {
        if self.max_reference_depth == 0 {
            return Err(EngineError::Config(
                "maxReferenceDepth must be at least 1".into(),
            ));
        }
        if let Some(prefix) = &self.definitions_prefix {
            if !prefix.starts_with('#') {
                return Err(EngineError::Config(format!(
                    "definitionsPrefix '{}' must be a local reference starting with '#'",
                    prefix
                )));
            }
        }
        if let Some(base) = &self.base_uri {
            Url::parse(base).map_err(|e| {
                EngineError::Config(format!("baseUri '{}' is not an absolute URI: {}", base, e))
            })?;
        }
        Ok(())
    }
}
