mod controls;
mod documents;
mod labels;
mod references;
mod revision;
mod wire;

pub use controls::{
    ControlDocument, ControlError, DataSchema, ExpectedValidation, LayeringPolicy,
    ValidationPolicy, DATA_SCHEMA_SCHEMA, LAYERING_POLICY_SCHEMA, VALIDATION_POLICY_SCHEMA,
};
pub use documents::{
    ActionMethod, Document, LayeringAction, LayeringDefinition, MetaSchema, Metadata, Status,
    StoragePolicy, Substitution, SubstitutionDest, SubstitutionSource,
};
pub use labels::{selector_matches, Labels};
pub use references::{DocumentKey, SchemaRef, SCHEMA_RE};
pub use revision::{diff, DiffEntry, Revision, RevisionId};
pub use wire::{from_yaml_stream, to_yaml_stream, WireError};

pub(crate) fn is_false(b: &bool) -> bool {
    !*b
}
