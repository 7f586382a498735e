use crate::{is_false, DocumentKey, Labels, SchemaRef};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Document is the atomic unit of configuration: a YAML envelope of
/// `schema`, `metadata` and `data`, stored within a bucket and versioned by
/// revisions. Unknown envelope keys are rejected at the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Document {
    /// # Schema tag of this document.
    /// A three-part `namespace/Kind/version` tag, e.g.
    /// `deckhand/Certificate/v1`, which selects the registered JSON schema
    /// its `data` is validated against.
    pub schema: SchemaRef,
    pub metadata: Metadata,
    /// # Payload of this document.
    /// Arbitrary YAML. For encrypted documents this is the opaque reference
    /// token resolved through the secret store.
    #[serde(default)]
    pub data: Value,
    /// Assigned at ingestion and immutable within a revision; absent on
    /// documents which have not yet been stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl Document {
    /// The `(schema, name)` identity of this document.
    pub fn key(&self) -> DocumentKey {
        DocumentKey {
            schema: self.schema.clone(),
            name: self.metadata.name.clone(),
        }
    }

    pub fn is_control(&self) -> bool {
        self.metadata.schema == MetaSchema::Control
    }

    /// The declared layer, if this document has a layering definition.
    pub fn layer(&self) -> Option<&str> {
        self.metadata
            .layering_definition
            .as_ref()
            .map(|ld| ld.layer.as_str())
    }

    pub fn is_abstract(&self) -> bool {
        self.metadata
            .layering_definition
            .as_ref()
            .map(|ld| ld.is_abstract)
            .unwrap_or(false)
    }

    pub fn is_encrypted(&self) -> bool {
        self.metadata.storage_policy == StoragePolicy::Encrypted
    }

    pub fn bucket(&self) -> Option<&str> {
        self.status.as_ref().map(|s| s.bucket.as_str())
    }
}

/// Metadata classifies and names a document, and carries its layering and
/// substitution definitions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Metadata {
    /// # Meta-schema classifying this document.
    /// `metadata/Document/v1` for normal documents, `metadata/Control/v1`
    /// for control documents such as `LayeringPolicy` and `DataSchema`.
    pub schema: MetaSchema,
    /// # Name of this document, unique per schema within a revision.
    pub name: String,
    #[serde(default)]
    pub storage_policy: StoragePolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layering_definition: Option<LayeringDefinition>,
    /// # Labels of this document.
    /// Consulted by the `parentSelector` of documents in the adjacent
    /// lower layer.
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
    /// # Marks this document as replacing its parent.
    /// Requires the same `schema` and `name` as the parent, in a
    /// different layer.
    #[serde(default, skip_serializing_if = "is_false")]
    pub replacement: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub substitutions: Vec<Substitution>,
}

/// MetaSchema is the schema of a document's metadata.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub enum MetaSchema {
    #[serde(rename = "metadata/Document/v1")]
    Document,
    #[serde(rename = "metadata/Control/v1")]
    Control,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StoragePolicy {
    #[default]
    Cleartext,
    Encrypted,
}

/// LayeringDefinition places a document within the layering policy's
/// ordering and states how it composes atop its selected parent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct LayeringDefinition {
    /// # Layer of this document.
    /// Must exist in the layering policy's `layerOrder`.
    pub layer: String,
    /// # Abstract documents participate in layering but are not emitted.
    #[serde(default, rename = "abstract", skip_serializing_if = "is_false")]
    pub is_abstract: bool,
    /// # Labels which select this document's parent.
    /// The parent is the single document of the adjacent higher layer
    /// carrying every one of these labels.
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub parent_selector: Labels,
    /// # Merge actions applied atop the parent's data, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<LayeringAction>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LayeringAction {
    pub method: ActionMethod,
    /// Data path the action applies at, e.g. `.` or `.chart.values`.
    pub path: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActionMethod {
    Merge,
    Replace,
    Delete,
}

/// Substitution injects a value read from a source document into this
/// document's data.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Substitution {
    pub src: SubstitutionSource,
    pub dest: SubstitutionDest,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SubstitutionSource {
    /// # Schema of the source document.
    pub schema: SchemaRef,
    /// # Name of the source document.
    pub name: String,
    /// # Path within the source's rendered data; `.` is the whole payload.
    #[serde(default = "SubstitutionSource::default_path")]
    pub path: String,
}

impl SubstitutionSource {
    fn default_path() -> String {
        ".".to_string()
    }

    pub fn key(&self) -> DocumentKey {
        DocumentKey {
            schema: self.schema.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SubstitutionDest {
    /// # Path within this document's data to inject at.
    pub path: String,
    /// # Optional regex applied to the string at `path`.
    /// When present, the first match is replaced by the source value's
    /// string form instead of replacing the whole value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// Status is assigned by the revision store at ingestion.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Status {
    /// # Bucket of record which owns this document.
    pub bucket: String,
}
