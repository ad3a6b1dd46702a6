#![deny(missing_docs)]

//! # Reference Utilities
//!
//! Shared helpers for turning `$ref` strings into JSON Pointers.
//!
//! Nothing here fetches external documents: absolute or relative references are only
//! treated as local when their document part matches the document's base URI.

use percent_encoding::percent_decode_str;
use url::Url;

/// Normalizes a `$ref` to a local reference (`#/...`) if it targets the current document.
///
/// Returns `None` if the reference is external or lacks a fragment.
pub(crate) fn normalize_ref_to_local(ref_str: &str, base_uri: Option<&Url>) -> Option<String> {
    if ref_str == "#" || ref_str.starts_with("#/") {
        return Some(ref_str.to_string());
    }

    let base = base_uri?;
    let target = base.join(ref_str).ok()?;
    let fragment = target.fragment()?;
    if !same_document(&target, base) {
        return None;
    }
    if fragment.is_empty() || fragment.starts_with('/') {
        Some(format!("#{}", fragment))
    } else {
        None
    }
}

/// Converts a local reference (`#/a/b%20c`) into a JSON Pointer (`/a/b c`).
///
/// `~0`/`~1` escapes are left for `serde_json::Value::pointer` to decode.
pub(crate) fn local_ref_to_pointer(local: &str) -> String {
    let fragment = local.strip_prefix('#').unwrap_or(local);
    percent_decode_str(fragment)
        .decode_utf8_lossy()
        .into_owned()
}

/// Escapes a single JSON Pointer segment (`~` → `~0`, `/` → `~1`).
pub(crate) fn encode_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn same_document(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host() == b.host()
        && a.port_or_known_default() == b.port_or_known_default()
        && a.path() == b.path()
}
