#![deny(missing_docs)]

//! # Schema Validation
//!
//! Validates `serde_json` values against the JSON Schemas (draft 4, as used by
//! Swagger 2.0) of a [`SchemaDocument`] with the `jsonschema` crate. Each schema is
//! compiled once per document, embedded in the document root so local `$ref`s
//! such as `#/definitions/Pet` resolve.
//!
//! Before compiling, every reachable `$ref` is resolved through the document and
//! the reference graph is checked for recursion that never descends into the
//! instance (e.g. `A: {allOf: [$ref: A]}`), which would otherwise never terminate.
//!
//! Polymorphism is a second phase on top: when the top-level schema declares a
//! `discriminator`, the instance is validated again against the subtype the
//! discriminator names.

use crate::error::{EngineError, EngineResult, Violation};
use crate::oas::document::SchemaDocument;
use crate::oas::ref_utils::encode_pointer_segment;
use jsonschema::{Draft, ValidationError, Validator};
use serde_json::{Map, Value as JsonValue};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Keywords whose subschemas apply to the same instance location.
const IN_PLACE: [&str; 4] = ["allOf", "anyOf", "oneOf", "not"];
/// Keywords whose subschemas apply to a member or an element.
const NESTED: [&str; 5] = [
    "properties",
    "patternProperties",
    "additionalProperties",
    "items",
    "additionalItems",
];

/// Validators compiled against one document, keyed by schema text.
#[derive(Default)]
pub(crate) struct CompiledSchemas {
    compiled: RwLock<HashMap<String, Arc<Validator>>>,
}

impl CompiledSchemas {
    fn get(&self, key: &str) -> Option<Arc<Validator>> {
        let compiled = self.compiled.read().unwrap_or_else(PoisonError::into_inner);
        compiled.get(key).cloned()
    }

    fn insert(&self, key: String, validator: Validator) -> Arc<Validator> {
        let mut compiled = self.compiled.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(compiled.entry(key).or_insert_with(|| Arc::new(validator)))
    }
}

impl fmt::Debug for CompiledSchemas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let compiled = self.compiled.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("CompiledSchemas")
            .field("schemas", &compiled.len())
            .finish()
    }
}

/// Validates instances against schemas of one document.
pub struct SchemaValidator<'d> {
    document: &'d SchemaDocument,
    max_hops: usize,
}

impl<'d> SchemaValidator<'d> {
    /// Creates a validator resolving references in `document`.
    pub fn new(document: &'d SchemaDocument) -> Self {
        Self {
            document,
            max_hops: document.config().max_reference_depth,
        }
    }

    /// Validates `instance` against `schema`, returning every violation found.
    ///
    /// An empty result means the instance is valid. Errors are reserved for defects
    /// of the document itself (unresolvable or cyclic references, schemas that do
    /// not compile).
    pub fn validate(&self, instance: &JsonValue, schema: &JsonValue) -> EngineResult<Vec<Violation>> {
        let validator = self.compiled(schema)?;
        Ok(validator.iter_errors(instance).map(|e| violation(&e)).collect())
    }

    fn compiled(&self, schema: &JsonValue) -> EngineResult<Arc<Validator>> {
        let key = schema.to_string();
        let cache = self.document.compiled_schemas();
        if let Some(validator) = cache.get(&key) {
            return Ok(validator);
        }

        self.check_references(schema)?;
        let validator = jsonschema::options()
            .with_draft(Draft::Draft4)
            .should_validate_formats(false)
            .build(&self.embed(schema)?)
            .map_err(|e| EngineError::InvalidDocument(format!("schema does not compile: {}", e)))?;
        Ok(cache.insert(key, validator))
    }

    /// The document root with `schema`'s keywords on top, identified by the base URI.
    fn embed(&self, schema: &JsonValue) -> EngineResult<JsonValue> {
        let JsonValue::Object(keywords) = schema else {
            return Err(EngineError::InvalidDocument(format!(
                "schema must be an object, got {}",
                schema
            )));
        };
        let mut embedded = self.document.root().as_object().cloned().unwrap_or_default();
        for (keyword, value) in keywords {
            // `#/definitions/...` always designates the document's container.
            if keyword != "definitions" {
                embedded.insert(keyword.clone(), value.clone());
            }
        }
        if let Some(base) = self.document.base_uri() {
            embedded.insert("id".into(), JsonValue::String(base.to_string()));
        }
        Ok(JsonValue::Object(embedded))
    }

    /// Resolves every `$ref` reachable from `schema` and rejects recursion that
    /// stays at one instance location.
    fn check_references(&self, schema: &JsonValue) -> EngineResult<()> {
        let mut in_place: HashMap<String, Vec<String>> = HashMap::new();
        let mut pending = Vec::new();
        let mut entry = Vec::new();
        self.collect_references(schema, false, &mut entry, &mut pending)?;
        pending.extend(entry.iter().cloned());

        while let Some(pointer) = pending.pop() {
            if in_place.contains_key(&pointer) {
                continue;
            }
            let node = self
                .document
                .root()
                .pointer(&pointer)
                .ok_or_else(|| EngineError::UnresolvedReference(format!("#{}", pointer)))?;
            let mut targets = Vec::new();
            self.collect_references(node, false, &mut targets, &mut pending)?;
            pending.extend(targets.iter().cloned());
            in_place.insert(pointer, targets);
        }

        let mut finished = HashSet::new();
        for pointer in in_place.keys() {
            self.find_cycle(pointer, &in_place, &mut Vec::new(), &mut finished)?;
        }
        Ok(())
    }

    /// Collects the pointers `node` refers to, split by whether they apply at the
    /// same instance location or below it.
    fn collect_references(
        &self,
        node: &JsonValue,
        nested: bool,
        same_location: &mut Vec<String>,
        below: &mut Vec<String>,
    ) -> EngineResult<()> {
        let JsonValue::Object(map) = node else {
            return Ok(());
        };
        // Siblings of `$ref` are ignored.
        if let Some(reference) = map.get("$ref").and_then(JsonValue::as_str) {
            let (pointer, _) = self.document.resolve_pointer(reference)?;
            if nested {
                below.push(pointer);
            } else {
                same_location.push(pointer);
            }
            return Ok(());
        }

        for (keyword, value) in map {
            let nested = if IN_PLACE.contains(&keyword.as_str()) {
                nested
            } else if NESTED.contains(&keyword.as_str()) {
                true
            } else {
                continue;
            };
            let subschemas: Vec<&JsonValue> = match (keyword.as_str(), value) {
                ("properties" | "patternProperties", JsonValue::Object(named)) => {
                    named.values().collect()
                }
                (_, JsonValue::Array(list)) => list.iter().collect(),
                (_, JsonValue::Object(_)) => vec![value],
                _ => Vec::new(),
            };
            for subschema in subschemas {
                self.collect_references(subschema, nested, same_location, below)?;
            }
        }
        Ok(())
    }

    fn find_cycle(
        &self,
        pointer: &str,
        in_place: &HashMap<String, Vec<String>>,
        path: &mut Vec<String>,
        finished: &mut HashSet<String>,
    ) -> EngineResult<()> {
        if finished.contains(pointer) {
            return Ok(());
        }
        if path.iter().any(|p| p == pointer) || path.len() >= self.max_hops {
            path.push(pointer.to_string());
            return Err(EngineError::CyclicReference(format!(
                "schema recursion without descending into the instance: {}",
                path.join(" -> ")
            )));
        }
        path.push(pointer.to_string());
        for next in in_place.get(pointer).into_iter().flatten() {
            self.find_cycle(next, in_place, path, finished)?;
        }
        path.pop();
        finished.insert(pointer.to_string());
        Ok(())
    }
}

fn violation(error: &ValidationError<'_>) -> Violation {
    let schema_path = error.schema_path.to_string();
    let keyword = schema_path
        .rsplit('/')
        .find(|segment| !segment.is_empty() && !segment.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or_default();
    Violation::new(error.instance_path.to_string(), keyword, error.to_string())
}

/// Validates `instance` against `schema`, including discriminator-based
/// re-validation against the named subtype.
///
/// Returns the violations found (empty when valid). A missing discriminator
/// property or an unknown subtype is a violation; a broken base reference is an error.
pub fn validate_against_schema(
    document: &SchemaDocument,
    instance: &JsonValue,
    schema: &JsonValue,
) -> EngineResult<Vec<Violation>> {
    let resolved = document.resolve_node(schema)?;
    let validator = SchemaValidator::new(document);
    let mut violations = validator.validate(instance, resolved)?;
    if !violations.is_empty() {
        return Ok(violations);
    }

    let Some(discriminator) = Discriminator::from_schema(resolved) else {
        return Ok(violations);
    };
    let subtype = match discriminator.subtype(document, instance) {
        Ok(Subtype::Definition(node)) => node,
        Ok(Subtype::Reference(reference)) => match document.resolve(reference) {
            Ok(node) => node,
            Err(EngineError::UnresolvedReference(_)) => {
                violations.push(Violation::new(
                    format!("/{}", encode_pointer_segment(discriminator.property())),
                    "discriminator",
                    format!("unknown subtype: '{}' does not resolve", reference),
                ));
                return Ok(violations);
            }
            Err(other) => return Err(other),
        },
        Err(violation) => {
            violations.push(violation);
            return Ok(violations);
        }
    };
    violations.extend(validator.validate(instance, subtype)?);
    Ok(violations)
}

/// A schema's `discriminator`.
enum Discriminator<'s> {
    /// Swagger 2.0: the name of the tag property.
    Property(&'s str),
    /// OpenAPI 3: `{propertyName, mapping}`.
    Object {
        property: &'s str,
        mapping: Option<&'s Map<String, JsonValue>>,
    },
}

/// Where the subtype named by a discriminator lives.
enum Subtype<'a> {
    /// A schema of the definitions container.
    Definition(&'a JsonValue),
    /// A reference taken from an OpenAPI 3 `mapping`.
    Reference(&'a str),
}

impl<'s> Discriminator<'s> {
    fn from_schema(schema: &'s JsonValue) -> Option<Self> {
        match schema.get("discriminator")? {
            JsonValue::String(property) => Some(Self::Property(property)),
            JsonValue::Object(object) => Some(Self::Object {
                property: object.get("propertyName")?.as_str()?,
                mapping: object.get("mapping").and_then(JsonValue::as_object),
            }),
            _ => None,
        }
    }

    fn property(&self) -> &'s str {
        match self {
            Self::Property(property) | Self::Object { property, .. } => *property,
        }
    }

    /// The subtype the instance's tag names. Tags are definition names, never
    /// reference fragments.
    fn subtype<'a>(
        &self,
        document: &'a SchemaDocument,
        instance: &JsonValue,
    ) -> Result<Subtype<'a>, Violation>
    where
        's: 'a,
    {
        let property = self.property();
        let object = instance.as_object().ok_or_else(|| {
            Violation::new(
                "",
                "discriminator",
                format!("{} is not an object, cannot read '{}'", instance, property),
            )
        })?;
        let child = format!("/{}", encode_pointer_segment(property));
        let tag = match object.get(property) {
            Some(JsonValue::String(tag)) => tag,
            Some(other) => {
                return Err(Violation::new(
                    child,
                    "discriminator",
                    format!("{} is not a valid type name", other),
                ))
            }
            None => {
                return Err(Violation::new(
                    "",
                    "discriminator",
                    format!("'{}' is a required property", property),
                ))
            }
        };

        let mapped = match self {
            Self::Object {
                mapping: Some(mapping),
                ..
            } => {
                let mapping: &'s Map<String, JsonValue> = *mapping;
                mapping.get(tag).and_then(JsonValue::as_str)
            }
            _ => None,
        };
        let name = match mapped {
            Some(target) if target.contains('/') || target.starts_with('#') => {
                return Ok(Subtype::Reference(target))
            }
            Some(name) => name,
            None => tag.as_str(),
        };
        document.definition(name).map(Subtype::Definition).ok_or_else(|| {
            Violation::new(
                child,
                "discriminator",
                format!("unknown subtype: '{}' is not a definition", name),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> SchemaDocument {
        SchemaDocument::from_yaml_str(
            r#"
swagger: "2.0"
info: {title: Pets, version: "1.0"}
paths: {}
definitions:
  Pet:
    type: object
    discriminator: petType
    required: [name, petType]
    properties:
      name: {type: string}
      petType: {type: string}
  Cat:
    allOf:
      - $ref: '#/definitions/Pet'
      - type: object
        required: [huntingSkill]
        properties:
          huntingSkill:
            type: string
            enum: [clueless, lazy, adventurous, aggressive]
  Dog:
    allOf:
      - $ref: '#/definitions/Pet'
      - type: object
        required: [packSize]
        properties:
          packSize: {type: integer, minimum: 0}
  Tree:
    type: object
    properties:
      value: {type: integer}
      children:
        type: array
        items: {$ref: '#/definitions/Tree'}
  Spin:
    allOf:
      - $ref: '#/definitions/Spin'
"#,
        )
        .unwrap()
    }

    fn keywords(violations: &[Violation]) -> Vec<&str> {
        let mut keywords: Vec<&str> = violations.iter().map(|v| v.keyword.as_str()).collect();
        keywords.sort_unstable();
        keywords
    }

    #[test]
    fn test_valid_base_and_subtype() {
        let doc = document();
        let cat = json!({"name": "Tom", "petType": "Cat", "huntingSkill": "lazy"});
        let schema = json!({"$ref": "#/definitions/Pet"});
        assert!(validate_against_schema(&doc, &cat, &schema).unwrap().is_empty());
    }

    #[test]
    fn test_subtype_constraints_applied() {
        let doc = document();
        let schema = json!({"$ref": "#/definitions/Pet"});
        let cat = json!({"name": "Tom", "petType": "Cat", "huntingSkill": "sleepy"});
        let violations = validate_against_schema(&doc, &cat, &schema).unwrap();
        assert_eq!(keywords(&violations), ["enum"]);
        assert_eq!(violations[0].instance_path, "/huntingSkill");

        let dog = json!({"name": "Rex", "petType": "Dog"});
        let violations = validate_against_schema(&doc, &dog, &schema).unwrap();
        assert_eq!(keywords(&violations), ["required"]);
    }

    #[test]
    fn test_unknown_subtype_is_violation() {
        let doc = document();
        let schema = json!({"$ref": "#/definitions/Pet"});
        let lizard = json!({"name": "Liz", "petType": "Lizard"});
        let violations = validate_against_schema(&doc, &lizard, &schema).unwrap();
        assert_eq!(keywords(&violations), ["discriminator"]);
        assert_eq!(violations[0].instance_path, "/petType");
    }

    #[test]
    fn test_discriminator_tag_is_a_name_not_a_pointer() {
        let doc = document();
        let schema = json!({"$ref": "#/definitions/Pet"});
        for tag in ["Pet%2Fproperties", "Pet/properties", "%44og", "Pet~1properties"] {
            let instance = json!({"name": "Liz", "petType": tag});
            let violations = validate_against_schema(&doc, &instance, &schema).unwrap();
            assert_eq!(keywords(&violations), ["discriminator"], "{}", tag);
        }
    }

    #[test]
    fn test_subtypes_compiled_once() {
        let doc = document();
        let schema = json!({"$ref": "#/definitions/Pet"});
        for n in 0..3 {
            let dog = json!({"name": "Rex", "petType": "Dog", "packSize": n});
            assert!(validate_against_schema(&doc, &dog, &schema).unwrap().is_empty());
        }
        let lizard = json!({"name": "Liz", "petType": "Lizard"});
        validate_against_schema(&doc, &lizard, &schema).unwrap();
        // The Pet base schema and the Dog subtype.
        assert_eq!(format!("{:?}", doc.compiled_schemas()), "CompiledSchemas { schemas: 2 }");
    }

    #[test]
    fn test_discriminator_value_must_be_string() {
        let doc = document();
        let schema = json!({
            "type": "object",
            "discriminator": "kind"
        });
        let violations = validate_against_schema(&doc, &json!({"kind": 3}), &schema).unwrap();
        assert_eq!(keywords(&violations), ["discriminator"]);
        let violations = validate_against_schema(&doc, &json!({}), &schema).unwrap();
        assert_eq!(keywords(&violations), ["discriminator"]);
    }

    #[test]
    fn test_base_failure_short_circuits() {
        let doc = document();
        let schema = json!({"$ref": "#/definitions/Pet"});
        let violations = validate_against_schema(&doc, &json!({"petType": "Cat"}), &schema).unwrap();
        assert_eq!(keywords(&violations), ["required"]);
    }

    #[test]
    fn test_oas3_mapping() {
        let doc = SchemaDocument::from_yaml_str(
            r#"
openapi: 3.0.0
info: {title: Shapes, version: "1.0"}
paths: {}
components:
  schemas:
    Shape:
      type: object
      required: [kind]
      discriminator:
        propertyName: kind
        mapping:
          round: '#/components/schemas/Circle'
          square: Square
    Circle:
      type: object
      required: [radius]
    Square:
      type: object
      required: [side]
"#,
        )
        .unwrap();
        let schema = json!({"$ref": "#/components/schemas/Shape"});
        let ok = validate_against_schema(&doc, &json!({"kind": "round", "radius": 1}), &schema).unwrap();
        assert!(ok.is_empty());
        let bad = validate_against_schema(&doc, &json!({"kind": "square"}), &schema).unwrap();
        assert_eq!(keywords(&bad), ["required"]);
    }

    #[test]
    fn test_recursive_schema_terminates_with_data() {
        let doc = document();
        let validator = SchemaValidator::new(&doc);
        let tree = json!({"value": 1, "children": [{"value": 2, "children": [{"value": "x"}]}]});
        let violations = validator.validate(&tree, &json!({"$ref": "#/definitions/Tree"})).unwrap();
        assert_eq!(keywords(&violations), ["type"]);
        assert_eq!(violations[0].instance_path, "/children/0/children/0/value");
    }

    #[test]
    fn test_combinator_cycle_is_fatal() {
        let doc = document();
        let validator = SchemaValidator::new(&doc);
        let err = validator
            .validate(&json!({}), &json!({"$ref": "#/definitions/Spin"}))
            .unwrap_err();
        assert!(matches!(err, EngineError::CyclicReference(_)));

        // Reachable only below the instance root, still never terminates.
        let nested = json!({"properties": {"spin": {"$ref": "#/definitions/Spin"}}});
        let err = validator.validate(&json!({}), &nested).unwrap_err();
        assert!(matches!(err, EngineError::CyclicReference(_)));
    }

    #[test]
    fn test_unresolved_base_is_fatal() {
        let doc = document();
        let err = validate_against_schema(&doc, &json!({}), &json!({"$ref": "#/definitions/Nope"}))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnresolvedReference(_)));
    }

    #[test]
    fn test_object_keywords() {
        let doc = document();
        let validator = SchemaValidator::new(&doc);
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "integer"}},
            "patternProperties": {"^x-": {"type": "string"}},
            "additionalProperties": false,
            "maxProperties": 3
        });
        assert!(validator.validate(&json!({"a": 1, "x-b": "ok"}), &schema).unwrap().is_empty());
        let violations = validator
            .validate(&json!({"a": 1.5, "x-b": 2, "c": true}), &schema)
            .unwrap();
        assert_eq!(keywords(&violations), ["additionalProperties", "type", "type"]);
    }

    #[test]
    fn test_array_keywords() {
        let doc = document();
        let validator = SchemaValidator::new(&doc);
        let tuple = json!({"items": [{"type": "string"}, {"type": "integer"}], "additionalItems": false});
        assert!(validator.validate(&json!(["a", 1]), &tuple).unwrap().is_empty());
        assert_eq!(
            keywords(&validator.validate(&json!(["a", 1, 2]), &tuple).unwrap()),
            ["additionalItems"]
        );
        let list = json!({"type": "array", "items": {"type": "string", "maxLength": 3}, "uniqueItems": true});
        assert_eq!(
            keywords(&validator.validate(&json!(["abc", "abc", "toolong"]), &list).unwrap()),
            ["maxLength", "uniqueItems"]
        );
    }

    #[test]
    fn test_any_one_not() {
        let doc = document();
        let validator = SchemaValidator::new(&doc);
        let any = json!({"anyOf": [{"type": "string"}, {"type": "integer"}]});
        assert!(validator.validate(&json!(3), &any).unwrap().is_empty());
        assert_eq!(keywords(&validator.validate(&json!(null), &any).unwrap()), ["anyOf"]);

        let one = json!({"oneOf": [{"type": "number"}, {"type": "integer"}]});
        assert!(validator.validate(&json!(1.5), &one).unwrap().is_empty());
        assert_eq!(keywords(&validator.validate(&json!(1), &one).unwrap()), ["oneOf"]);

        let not = json!({"not": {"type": "string"}});
        assert_eq!(keywords(&validator.validate(&json!("s"), &not).unwrap()), ["not"]);
        assert!(validator.validate(&json!(1), &not).unwrap().is_empty());
    }

    #[test]
    fn test_type_lists() {
        let doc = document();
        let validator = SchemaValidator::new(&doc);
        let nullable = json!({"type": ["string", "null"]});
        assert!(validator.validate(&json!(null), &nullable).unwrap().is_empty());
        assert_eq!(keywords(&validator.validate(&json!(1), &nullable).unwrap()), ["type"]);
    }

    #[test]
    fn test_draft4_exclusive_bounds() {
        let doc = document();
        let validator = SchemaValidator::new(&doc);
        let schema = json!({"type": "number", "minimum": 0, "exclusiveMinimum": true});
        assert!(validator.validate(&json!(0.5), &schema).unwrap().is_empty());
        let violations = validator.validate(&json!(0), &schema).unwrap();
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn test_non_object_schema_is_invalid() {
        let doc = document();
        let validator = SchemaValidator::new(&doc);
        let err = validator.validate(&json!(1), &json!("string")).unwrap_err();
        assert!(matches!(err, EngineError::InvalidDocument(_)));
    }

    #[test]
    fn test_refs_relative_to_base_uri() {
        let doc = SchemaDocument::from_value(json!({
            "x-base-uri": "https://api.example.com/swagger.yaml",
            "definitions": {"Id": {"type": "integer"}}
        }))
        .unwrap();
        let validator = SchemaValidator::new(&doc);
        let schema = json!({"$ref": "https://api.example.com/swagger.yaml#/definitions/Id"});
        assert!(validator.validate(&json!(3), &schema).unwrap().is_empty());
        assert_eq!(keywords(&validator.validate(&json!("x"), &schema).unwrap()), ["type"]);
        let external = json!({"$ref": "https://elsewhere.example.com/swagger.yaml#/definitions/Id"});
        assert!(matches!(
            validator.validate(&json!(3), &external).unwrap_err(),
            EngineError::UnresolvedReference(_)
        ));
    }

    #[test]
    fn test_does_not_mutate_instance() {
        let doc = document();
        let cat = json!({"name": "Tom", "petType": "Cat", "huntingSkill": "lazy"});
        let before = cat.clone();
        validate_against_schema(&doc, &cat, &json!({"$ref": "#/definitions/Pet"})).unwrap();
        assert_eq!(cat, before);
    }
}
