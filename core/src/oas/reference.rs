#![deny(missing_docs)]

//! # Reference Resolution
//!
//! Resolves `$ref` strings against a document root, following chains of nodes that
//! are themselves references. Chains are bounded by a visited set and a depth limit.
//!
//! Successful resolutions are memoized as `reference -> final pointer`. The memo
//! only ever derives from the immutable root, so concurrent readers may share it.

use crate::error::{EngineError, EngineResult};
use crate::oas::ref_utils::{local_ref_to_pointer, normalize_ref_to_local};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use url::Url;

/// Resolves references within one document.
#[derive(Debug)]
pub struct ReferenceResolver {
    base_uri: Option<Url>,
    max_depth: usize,
    memo: RwLock<HashMap<String, String>>,
}

impl ReferenceResolver {
    /// Creates a resolver for a document retrieved from `base_uri`.
    pub fn new(base_uri: Option<Url>, max_depth: usize) -> Self {
        Self {
            base_uri,
            max_depth: max_depth.max(1),
            memo: RwLock::new(HashMap::new()),
        }
    }

    /// The document's base URI, if known.
    pub fn base_uri(&self) -> Option<&Url> {
        self.base_uri.as_ref()
    }

    /// Resolves `reference` to the node it designates, following nested `$ref`s.
    ///
    /// # Errors
    ///
    /// * `UnresolvedReference` - the pointer is external or does not exist.
    /// * `CyclicReference` - the chain revisits a pointer or exceeds the depth limit.
    pub fn resolve<'a>(&self, root: &'a JsonValue, reference: &str) -> EngineResult<&'a JsonValue> {
        self.resolve_pointer(root, reference).map(|(_, node)| node)
    }

    /// Like [`resolve`](Self::resolve), also returning the JSON pointer of the final node.
    pub fn resolve_pointer<'a>(
        &self,
        root: &'a JsonValue,
        reference: &str,
    ) -> EngineResult<(String, &'a JsonValue)> {
        if let Some(pointer) = self.memoized(reference) {
            if let Some(node) = root.pointer(&pointer) {
                return Ok((pointer, node));
            }
        }

        let mut chain: Vec<String> = Vec::new();
        let mut current = reference.to_string();
        loop {
            let local = normalize_ref_to_local(&current, self.base_uri.as_ref())
                .ok_or_else(|| EngineError::UnresolvedReference(current.clone()))?;
            let pointer = local_ref_to_pointer(&local);

            if chain.contains(&pointer) || chain.len() >= self.max_depth {
                chain.push(pointer);
                return Err(EngineError::CyclicReference(format!(
                    "{} ({})",
                    reference,
                    chain.join(" -> ")
                )));
            }

            let node = root
                .pointer(&pointer)
                .ok_or_else(|| EngineError::UnresolvedReference(current.clone()))?;

            match node.get("$ref").and_then(JsonValue::as_str) {
                Some(next) => {
                    chain.push(pointer);
                    current = next.to_string();
                }
                None => {
                    self.remember(reference, pointer.clone());
                    return Ok((pointer, node));
                }
            }
        }
    }

    /// Resolves `node` if it is a `{"$ref": ...}` object, otherwise returns it as is.
    pub fn resolve_node<'a>(
        &self,
        root: &'a JsonValue,
        node: &'a JsonValue,
    ) -> EngineResult<&'a JsonValue> {
        match node.get("$ref").and_then(JsonValue::as_str) {
            Some(reference) => self.resolve(root, reference),
            None => Ok(node),
        }
    }

    fn memoized(&self, reference: &str) -> Option<String> {
        let memo = self.memo.read().unwrap_or_else(PoisonError::into_inner);
        memo.get(reference).cloned()
    }

    fn remember(&self, reference: &str, pointer: String) {
        let mut memo = self.memo.write().unwrap_or_else(PoisonError::into_inner);
        memo.insert(reference.to_string(), pointer);
    }
}
