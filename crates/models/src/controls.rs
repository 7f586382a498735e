use crate::{Document, SchemaRef};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Control documents steer the engine rather than describing site
// configuration. They are classified by `metadata.schema:
// metadata/Control/v1` and one of the schema tags below.

pub const LAYERING_POLICY_SCHEMA: &str = "deckhand/LayeringPolicy/v1";
pub const DATA_SCHEMA_SCHEMA: &str = "deckhand/DataSchema/v1";
pub const VALIDATION_POLICY_SCHEMA: &str = "deckhand/ValidationPolicy/v1";

/// ControlDocument is the parsed payload of a control document.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlDocument {
    LayeringPolicy(LayeringPolicy),
    DataSchema(DataSchema),
    ValidationPolicy(ValidationPolicy),
}

#[derive(thiserror::Error, Debug)]
pub enum ControlError {
    #[error("{schema} is not a recognized control document schema")]
    UnknownControl { schema: SchemaRef },
    #[error("control document payload is malformed: {detail}")]
    MalformedPayload { detail: String },
}

impl ControlDocument {
    /// Parse the control payload of `doc`, or None if `doc` is not a
    /// control document.
    pub fn from_document(doc: &Document) -> Result<Option<ControlDocument>, ControlError> {
        if !doc.is_control() {
            return Ok(None);
        }
        let parsed = match doc.schema.as_str() {
            LAYERING_POLICY_SCHEMA => ControlDocument::LayeringPolicy(parse(&doc.data)?),
            VALIDATION_POLICY_SCHEMA => ControlDocument::ValidationPolicy(parse(&doc.data)?),
            DATA_SCHEMA_SCHEMA => ControlDocument::DataSchema(DataSchema {
                target: SchemaRef::new(doc.metadata.name.clone()),
                schema: doc.data.clone(),
            }),
            _ => {
                return Err(ControlError::UnknownControl {
                    schema: doc.schema.clone(),
                })
            }
        };
        Ok(Some(parsed))
    }
}

fn parse<T: serde::de::DeserializeOwned>(data: &Value) -> Result<T, ControlError> {
    serde_json::from_value(data.clone()).map_err(|err| ControlError::MalformedPayload {
        detail: err.to_string(),
    })
}

/// LayeringPolicy defines the total ordering of layer names, from most
/// abstract to most concrete. A revision holds at most one.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct LayeringPolicy {
    /// # Ordered layer names, most abstract first.
    pub layer_order: Vec<String>,
}

/// DataSchema registers a JSON schema against the `schema` tag named by the
/// control document's `metadata.name`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSchema {
    /// The `schema` tag this registration applies to.
    pub target: SchemaRef,
    /// The registered JSON schema, as carried in the control document's
    /// `data`.
    pub schema: Value,
}

/// ValidationPolicy names the validations a revision is expected to carry
/// before it is considered healthy.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ValidationPolicy {
    #[serde(default)]
    pub validations: Vec<ExpectedValidation>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ExpectedValidation {
    pub name: String,
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_layering_policy_parses() {
        let yaml = r#"
schema: deckhand/LayeringPolicy/v1
metadata:
  schema: metadata/Control/v1
  name: layering-policy
data:
  layerOrder: [global, region, site]
"#;
        let doc: Document = serde_yaml::from_str(yaml).unwrap();

        let Some(ControlDocument::LayeringPolicy(policy)) =
            ControlDocument::from_document(&doc).unwrap()
        else {
            panic!("expected a layering policy");
        };
        assert_eq!(policy.layer_order, vec!["global", "region", "site"]);
    }

    #[test]
    fn test_data_schema_targets_metadata_name() {
        let yaml = r#"
schema: deckhand/DataSchema/v1
metadata:
  schema: metadata/Control/v1
  name: armada/Chart/v1
data:
  type: object
  required: [chart]
"#;
        let doc: Document = serde_yaml::from_str(yaml).unwrap();

        let Some(ControlDocument::DataSchema(registration)) =
            ControlDocument::from_document(&doc).unwrap()
        else {
            panic!("expected a data schema");
        };
        assert_eq!(registration.target.as_str(), "armada/Chart/v1");
        assert_eq!(registration.schema["required"][0], "chart");
    }

    #[test]
    fn test_unknown_control_is_an_error() {
        let yaml = r#"
schema: deckhand/Mystery/v1
metadata:
  schema: metadata/Control/v1
  name: mystery
data: {}
"#;
        let doc: Document = serde_yaml::from_str(yaml).unwrap();
        ControlDocument::from_document(&doc).unwrap_err();
    }

    #[test]
    fn test_normal_document_is_not_control() {
        let yaml = r#"
schema: armada/Chart/v1
metadata:
  schema: metadata/Document/v1
  name: ucp
data: {}
"#;
        let doc: Document = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(ControlDocument::from_document(&doc).unwrap(), None);
    }
}
