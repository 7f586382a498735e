use lazy_static::lazy_static;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// This module contains the typed references by which documents address one
// another. They use the newtype pattern for strong type safety.

lazy_static! {
    /// SCHEMA_RE matches a three-part `namespace/Kind/version` schema tag,
    /// such as `deckhand/Certificate/v1`.
    pub static ref SCHEMA_RE: Regex =
        Regex::new(r"^([A-Za-z0-9_.\-]+)/([A-Za-z0-9_.\-]+)/(v[0-9]+)$").unwrap();
}

/// SchemaRef is a three-part `namespace/Kind/version` schema tag. The wire
/// accepts any string here; structural conformance is checked by the
/// document validator so that a malformed tag surfaces in the validation
/// report rather than as a parse failure.
#[derive(
    Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
pub struct SchemaRef(String);

impl SchemaRef {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into `(namespace, kind, version)`, or None if the tag does not
    /// conform to SCHEMA_RE.
    pub fn parts(&self) -> Option<(&str, &str, &str)> {
        let captures = SCHEMA_RE.captures(&self.0)?;
        Some((
            captures.get(1).unwrap().as_str(),
            captures.get(2).unwrap().as_str(),
            captures.get(3).unwrap().as_str(),
        ))
    }

    pub fn is_well_formed(&self) -> bool {
        SCHEMA_RE.is_match(&self.0)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.parts().map(|(namespace, _, _)| namespace)
    }
}

impl std::ops::Deref for SchemaRef {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SchemaRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SchemaRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// DocumentKey is the `(schema, name)` identity under which a document is
/// addressed by substitutions and by the revision store. Within a revision
/// it is unique, except that a replacement document deliberately shares the
/// key of the parent it supplants.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
pub struct DocumentKey {
    pub schema: SchemaRef,
    pub name: String,
}

impl DocumentKey {
    pub fn new(schema: impl Into<SchemaRef>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.schema, self.name)
    }
}
