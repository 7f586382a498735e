use crate::errors::{Error, Errors, Stage};
use models::{DataSchema, DocumentKey, SchemaRef};
use serde_json::json;
use std::collections::BTreeMap;

// DataSchema names under these prefixes are reserved for the built-in
// meta-schemas and cannot be registered by users.
const RESERVED_PREFIXES: &[&str] = &["deckhand/", "metadata/"];

/// SchemaRegistry answers "what JSON schema applies to document D?" by the
/// full `namespace/Kind/version` triple. It is built once per render from
/// the revision's DataSchema control documents plus the built-in
/// meta-schemas for control document payloads.
pub struct SchemaRegistry {
    schemas: BTreeMap<SchemaRef, jsonschema::Validator>,
}

impl SchemaRegistry {
    pub fn build(registrations: &[(DocumentKey, DataSchema)], errors: &mut Errors) -> SchemaRegistry {
        let mut schemas = BTreeMap::new();

        for (target, schema) in builtin_schemas() {
            let compiled = jsonschema::validator_for(&schema)
                .expect("built-in meta-schemas are statically valid");
            schemas.insert(SchemaRef::new(target), compiled);
        }

        for (key, registration) in registrations {
            let target = &registration.target;

            if RESERVED_PREFIXES
                .iter()
                .any(|prefix| target.as_str().starts_with(prefix))
            {
                Error::ReservedDataSchemaName {
                    name: target.to_string(),
                }
                .push(Some(key), Stage::Schema, errors);
                continue;
            }
            if schemas.contains_key(target) {
                Error::DuplicateDataSchema {
                    target: target.to_string(),
                }
                .push(Some(key), Stage::Schema, errors);
                continue;
            }

            match jsonschema::validator_for(&registration.schema) {
                Ok(compiled) => {
                    schemas.insert(target.clone(), compiled);
                }
                Err(err) => {
                    Error::InvalidSchemaDefinition {
                        target: target.to_string(),
                        detail: err.to_string(),
                    }
                    .push(Some(key), Stage::Schema, errors);
                }
            }
        }

        SchemaRegistry { schemas }
    }

    /// Look up the compiled schema for the full `schema` triple.
    pub fn get(&self, schema: &SchemaRef) -> Option<&jsonschema::Validator> {
        self.schemas.get(schema)
    }
}

// Built-in meta-schemas covering the payloads of control documents. The
// envelope itself is enforced by typed deserialization at the wire.
fn builtin_schemas() -> Vec<(&'static str, serde_json::Value)> {
    vec![
        (
            models::LAYERING_POLICY_SCHEMA,
            json!({
                "type": "object",
                "properties": {
                    "layerOrder": {
                        "type": "array",
                        "items": {"type": "string"},
                        "minItems": 1,
                    },
                },
                "required": ["layerOrder"],
                "additionalProperties": false,
            }),
        ),
        (
            models::VALIDATION_POLICY_SCHEMA,
            json!({
                "type": "object",
                "properties": {
                    "validations": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {"name": {"type": "string"}},
                            "required": ["name"],
                            "additionalProperties": false,
                        },
                    },
                },
                "additionalProperties": false,
            }),
        ),
        (
            models::DATA_SCHEMA_SCHEMA,
            // A registered schema payload is itself a JSON schema document.
            json!({"type": ["object", "boolean"]}),
        ),
    ]
}
