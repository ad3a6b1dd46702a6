#![deny(missing_docs)]

//! # Structural Keywords
//!
//! The JSON-Schema validation keywords Swagger 2.0 allows directly on parameters,
//! parsed into [`ValidationKeys`] and checked against JSON instances.
//!
//! Each keyword only applies to the instance kind it describes: `maxLength` ignores
//! numbers, `maximum` ignores strings, and so on.

use crate::error::Violation;
use crate::value::ParamValue;
use regex::Regex;
use serde_json::{Map, Value as JsonValue};

/// Keywords copied from a parameter definition into its [`ValidationKeys`].
pub const VALIDATION_KEYWORDS: [&str; 12] = [
    "maximum",
    "exclusiveMaximum",
    "minimum",
    "exclusiveMinimum",
    "maxLength",
    "minLength",
    "pattern",
    "maxItems",
    "minItems",
    "uniqueItems",
    "enum",
    "multipleOf",
];

/// `exclusiveMaximum`/`exclusiveMinimum` in either the draft-4 flag form or the
/// later numeric form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExclusiveBound {
    /// Swagger 2.0 / draft 4: modifies `maximum`/`minimum`.
    Flag(bool),
    /// Draft 6+: a bound of its own.
    Limit(f64),
}

/// A compiled `pattern`.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    /// Compiles a pattern.
    pub fn new(source: &str) -> Result<Self, String> {
        Regex::new(source)
            .map(Self)
            .map_err(|e| format!("invalid pattern {:?}: {}", source, e))
    }

    /// The pattern source.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Unanchored search, as JSON Schema prescribes.
    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// Typed subset of a schema restricted to the structural keywords.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationKeys {
    /// `maximum`.
    pub maximum: Option<f64>,
    /// `exclusiveMaximum`.
    pub exclusive_maximum: Option<ExclusiveBound>,
    /// `minimum`.
    pub minimum: Option<f64>,
    /// `exclusiveMinimum`.
    pub exclusive_minimum: Option<ExclusiveBound>,
    /// `maxLength`.
    pub max_length: Option<u64>,
    /// `minLength`.
    pub min_length: Option<u64>,
    /// `pattern`.
    pub pattern: Option<Pattern>,
    /// `maxItems`.
    pub max_items: Option<u64>,
    /// `minItems`.
    pub min_items: Option<u64>,
    /// `uniqueItems`.
    pub unique_items: bool,
    /// `enum`.
    pub enum_values: Option<Vec<JsonValue>>,
    /// `multipleOf`.
    pub multiple_of: Option<f64>,
}

impl ValidationKeys {
    /// Extracts the structural keywords from a schema or parameter object.
    ///
    /// Unrelated keys are ignored. Returns an error message for keywords with
    /// values of the wrong shape.
    pub fn from_map(map: &Map<String, JsonValue>) -> Result<Self, String> {
        let mut keys = Self::default();
        for keyword in VALIDATION_KEYWORDS {
            let Some(value) = map.get(keyword) else {
                continue;
            };
            match keyword {
                "maximum" => keys.maximum = Some(number(keyword, value)?),
                "minimum" => keys.minimum = Some(number(keyword, value)?),
                "exclusiveMaximum" => keys.exclusive_maximum = Some(bound(keyword, value)?),
                "exclusiveMinimum" => keys.exclusive_minimum = Some(bound(keyword, value)?),
                "maxLength" => keys.max_length = Some(count(keyword, value)?),
                "minLength" => keys.min_length = Some(count(keyword, value)?),
                "maxItems" => keys.max_items = Some(count(keyword, value)?),
                "minItems" => keys.min_items = Some(count(keyword, value)?),
                "pattern" => {
                    let source = value
                        .as_str()
                        .ok_or_else(|| format!("'{}' must be a string", keyword))?;
                    keys.pattern = Some(Pattern::new(source)?);
                }
                "uniqueItems" => {
                    keys.unique_items = value
                        .as_bool()
                        .ok_or_else(|| format!("'{}' must be a boolean", keyword))?;
                }
                "enum" => {
                    let values = value
                        .as_array()
                        .ok_or_else(|| format!("'{}' must be an array", keyword))?;
                    keys.enum_values = Some(values.clone());
                }
                "multipleOf" => {
                    let divisor = number(keyword, value)?;
                    if divisor <= 0.0 {
                        return Err(format!("'{}' must be strictly positive", keyword));
                    }
                    keys.multiple_of = Some(divisor);
                }
                _ => {}
            }
        }
        Ok(keys)
    }

    /// Whether no keyword is set (validation is then a no-op).
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Checks a JSON instance, appending every violation to `out`.
    pub fn check(&self, instance: &JsonValue, path: &str, out: &mut Vec<Violation>) {
        if let Some(allowed) = &self.enum_values {
            if !allowed.iter().any(|candidate| json_equal(candidate, instance)) {
                out.push(Violation::new(
                    path,
                    "enum",
                    format!("{} is not one of {}", instance, JsonValue::Array(allowed.clone())),
                ));
            }
        }

        match instance {
            JsonValue::Number(n) => {
                if let Some(x) = n.as_f64() {
                    self.check_number(x, instance, path, out);
                }
            }
            JsonValue::String(text) => self.check_string(text, instance, path, out),
            JsonValue::Array(items) => self.check_array(items, instance, path, out),
            _ => {}
        }
    }

    fn check_number(&self, x: f64, instance: &JsonValue, path: &str, out: &mut Vec<Violation>) {
        if let Some(max) = self.maximum {
            let exclusive = self.exclusive_maximum == Some(ExclusiveBound::Flag(true));
            if (exclusive && x >= max) || (!exclusive && x > max) {
                let relation = if exclusive { "greater than or equal to" } else { "greater than" };
                out.push(Violation::new(
                    path,
                    "maximum",
                    format!("{} is {} the maximum of {}", instance, relation, max),
                ));
            }
        }
        if let Some(ExclusiveBound::Limit(limit)) = self.exclusive_maximum {
            if x >= limit {
                out.push(Violation::new(
                    path,
                    "exclusiveMaximum",
                    format!("{} is greater than or equal to the maximum of {}", instance, limit),
                ));
            }
        }
        if let Some(min) = self.minimum {
            let exclusive = self.exclusive_minimum == Some(ExclusiveBound::Flag(true));
            if (exclusive && x <= min) || (!exclusive && x < min) {
                let relation = if exclusive { "less than or equal to" } else { "less than" };
                out.push(Violation::new(
                    path,
                    "minimum",
                    format!("{} is {} the minimum of {}", instance, relation, min),
                ));
            }
        }
        if let Some(ExclusiveBound::Limit(limit)) = self.exclusive_minimum {
            if x <= limit {
                out.push(Violation::new(
                    path,
                    "exclusiveMinimum",
                    format!("{} is less than or equal to the minimum of {}", instance, limit),
                ));
            }
        }
        if let Some(divisor) = self.multiple_of {
            let quotient = x / divisor;
            if !quotient.is_finite() || (quotient - quotient.round()).abs() > 1e-9 {
                out.push(Violation::new(
                    path,
                    "multipleOf",
                    format!("{} is not a multiple of {}", instance, divisor),
                ));
            }
        }
    }

    fn check_string(&self, text: &str, instance: &JsonValue, path: &str, out: &mut Vec<Violation>) {
        let length = text.chars().count() as u64;
        if let Some(max) = self.max_length {
            if length > max {
                out.push(Violation::new(path, "maxLength", format!("{} is too long", instance)));
            }
        }
        if let Some(min) = self.min_length {
            if length < min {
                out.push(Violation::new(path, "minLength", format!("{} is too short", instance)));
            }
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(text) {
                out.push(Violation::new(
                    path,
                    "pattern",
                    format!("{} does not match {:?}", instance, pattern.as_str()),
                ));
            }
        }
    }

    fn check_array(
        &self,
        items: &[JsonValue],
        instance: &JsonValue,
        path: &str,
        out: &mut Vec<Violation>,
    ) {
        let length = items.len() as u64;
        if let Some(max) = self.max_items {
            if length > max {
                out.push(Violation::new(path, "maxItems", format!("{} is too long", instance)));
            }
        }
        if let Some(min) = self.min_items {
            if length < min {
                out.push(Violation::new(path, "minItems", format!("{} is too short", instance)));
            }
        }
        if self.unique_items {
            let duplicated = items
                .iter()
                .enumerate()
                .any(|(i, a)| items[i + 1..].iter().any(|b| json_equal(a, b)));
            if duplicated {
                out.push(Violation::new(
                    path,
                    "uniqueItems",
                    format!("{} has non-unique elements", instance),
                ));
            }
        }
    }
}

/// Applies the structural keywords to a cast parameter value.
///
/// Values without a JSON form (bytes, dates, files) are not checked.
pub fn validate_structural(value: &ParamValue, keys: &ValidationKeys) -> Vec<Violation> {
    let mut violations = Vec::new();
    if keys.is_empty() {
        return violations;
    }
    if let Some(instance) = value.to_json() {
        keys.check(&instance, "", &mut violations);
    }
    violations
}

/// JSON equality where `1` and `1.0` are the same number.
pub fn json_equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i == j,
            _ => x.as_f64() == y.as_f64(),
        },
        (JsonValue::Array(xs), JsonValue::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_equal(x, y))
        }
        (JsonValue::Object(xs), JsonValue::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| json_equal(x, y)))
        }
        _ => a == b,
    }
}

fn number(keyword: &str, value: &JsonValue) -> Result<f64, String> {
    value
        .as_f64()
        .ok_or_else(|| format!("'{}' must be a number", keyword))
}

fn count(keyword: &str, value: &JsonValue) -> Result<u64, String> {
    value
        .as_u64()
        .ok_or_else(|| format!("'{}' must be a non-negative integer", keyword))
}

fn bound(keyword: &str, value: &JsonValue) -> Result<ExclusiveBound, String> {
    match value {
        JsonValue::Bool(flag) => Ok(ExclusiveBound::Flag(*flag)),
        JsonValue::Number(n) => n
            .as_f64()
            .map(ExclusiveBound::Limit)
            .ok_or_else(|| format!("'{}' must be a boolean or a number", keyword)),
        _ => Err(format!("'{}' must be a boolean or a number", keyword)),
    }
}
