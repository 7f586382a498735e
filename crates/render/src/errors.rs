use models::DocumentKey;
use schemars::JsonSchema;
use serde::Serialize;

/// Severity classifies how an error affects a render.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    /// The render aborts and returns the report only.
    FatalRevision,
    /// The offending document and its descendants are excluded from
    /// output; other documents continue.
    FatalDocument,
    /// Recorded in the report without affecting output.
    Advisory,
}

/// Stage names the rendering stage an error was detected in.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Schema,
    Policy,
    Layering,
    Substitution,
    Replacement,
    Secrets,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("document envelope is malformed: {detail}")]
    InvalidDocumentFormat { detail: String },
    #[error("{key} appears {count} times within the revision")]
    DuplicateDocument { key: DocumentKey, count: usize },
    #[error("DataSchema name {name:?} is under a reserved prefix")]
    ReservedDataSchemaName { name: String },
    #[error("multiple DataSchema documents register {target}")]
    DuplicateDataSchema { target: String },
    #[error("DataSchema for {target} is not a valid JSON schema: {detail}")]
    InvalidSchemaDefinition { target: String, detail: String },
    #[error("no DataSchema is registered for {schema}")]
    UnregisteredSchema { schema: String },
    #[error("document data does not conform to the registered schema: {detail}")]
    SchemaValidationFailed { detail: String, path: String },

    #[error("document declares layer {layer:?} but the revision has no layering policy")]
    LayeringPolicyNotFound { layer: String },
    #[error("revision contains {count} layering policies; at most one is allowed")]
    MultipleLayeringPolicies { count: usize },
    #[error("layer {layer:?} is not named by the layering policy order {order:?}")]
    UnknownLayer { layer: String, order: Vec<String> },
    #[error("no document of layer {parent_layer:?} matches parent selector {selector:?}")]
    MissingParent {
        parent_layer: String,
        selector: String,
    },
    #[error("parent selector matches {count} documents of layer {parent_layer:?}")]
    IndeterminateDocumentParent {
        parent_layer: String,
        count: usize,
    },
    #[error("{method} action path {path:?} does not exist in the document")]
    MissingDocumentKey { method: String, path: String },

    #[error("substitution failed: {detail}")]
    SubstitutionFailure { detail: String, path: String },
    #[error("substitution pattern {pattern:?} has no match at {path:?}")]
    MissingDocumentPattern { pattern: String, path: String },
    #[error("substitution references form a cycle: {}", cycle.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(" -> "))]
    SubstitutionCycle { cycle: Vec<DocumentKey> },

    #[error("replacement document has no parent of the same schema and name: {detail}")]
    InvalidReplacement { detail: String },
    #[error("{key} replaces a document which is itself a replacement")]
    SingletonReplacement { key: DocumentKey },

    #[error("secret reference {reference:?} was not found by the secret store")]
    SecretNotFound { reference: String },
    #[error("encrypted document carries a malformed secret reference: {detail}")]
    InvalidSecretReference { detail: String },

    #[error("policy does not authorize access: {detail}")]
    PolicyNotAuthorized { detail: String },

    #[error("validation policy {name:?} names no expected validations")]
    EmptyValidationPolicy { name: String },
}

impl Error {
    pub fn severity(&self) -> Severity {
        use Severity::*;

        match self {
            Error::InvalidDocumentFormat { .. }
            | Error::DuplicateDocument { .. }
            | Error::ReservedDataSchemaName { .. }
            | Error::DuplicateDataSchema { .. }
            | Error::InvalidSchemaDefinition { .. }
            | Error::LayeringPolicyNotFound { .. }
            | Error::MultipleLayeringPolicies { .. }
            | Error::IndeterminateDocumentParent { .. }
            | Error::SubstitutionCycle { .. }
            | Error::InvalidReplacement { .. }
            | Error::SingletonReplacement { .. } => FatalRevision,

            Error::UnknownLayer { .. }
            | Error::MissingParent { .. }
            | Error::MissingDocumentKey { .. }
            | Error::SubstitutionFailure { .. }
            | Error::MissingDocumentPattern { .. }
            | Error::SecretNotFound { .. }
            | Error::InvalidSecretReference { .. } => FatalDocument,

            Error::UnregisteredSchema { .. }
            | Error::SchemaValidationFailed { .. }
            | Error::PolicyNotAuthorized { .. }
            | Error::EmptyValidationPolicy { .. } => Advisory,
        }
    }

    /// The stable error kind surfaced to the HTTP edge.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidDocumentFormat { .. }
            | Error::DuplicateDocument { .. }
            | Error::ReservedDataSchemaName { .. }
            | Error::DuplicateDataSchema { .. }
            | Error::InvalidSchemaDefinition { .. }
            | Error::UnregisteredSchema { .. }
            | Error::SchemaValidationFailed { .. } => "InvalidDocumentFormat",

            Error::LayeringPolicyNotFound { .. } => "LayeringPolicyNotFound",
            Error::MultipleLayeringPolicies { .. } => "MultipleLayeringPolicies",
            Error::UnknownLayer { .. } => "UnknownLayer",
            Error::MissingParent { .. } => "MissingParent",
            Error::IndeterminateDocumentParent { .. } => "IndeterminateDocumentParent",
            Error::MissingDocumentKey { .. } => "MissingDocumentKey",

            Error::SubstitutionFailure { .. } => "SubstitutionFailure",
            Error::MissingDocumentPattern { .. } => "MissingDocumentPattern",
            Error::SubstitutionCycle { .. } => "SubstitutionCycle",

            Error::InvalidReplacement { .. } => "InvalidReplacement",
            Error::SingletonReplacement { .. } => "SingletonReplacement",

            Error::SecretNotFound { .. } | Error::InvalidSecretReference { .. } => {
                "BarbicanException"
            }
            Error::PolicyNotAuthorized { .. } => "PolicyNotAuthorized",
            Error::EmptyValidationPolicy { .. } => "EmptyValidationPolicy",
        }
    }

    /// Warnings surface in the report but do not fail the revision's
    /// internal validations: an unregistered schema means "nothing to
    /// check", not "the check failed".
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Error::UnregisteredSchema { .. } | Error::EmptyValidationPolicy { .. }
        )
    }

    /// The data path the error concerns, where one applies.
    pub fn path(&self) -> Option<&str> {
        match self {
            Error::SchemaValidationFailed { path, .. }
            | Error::MissingDocumentKey { path, .. }
            | Error::SubstitutionFailure { path, .. }
            | Error::MissingDocumentPattern { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Record this error against `document` at `stage`.
    pub fn push(self, document: Option<&DocumentKey>, stage: Stage, errors: &mut Errors) {
        errors.0.push(ErrorEntry {
            document: document.cloned(),
            stage,
            severity: self.severity(),
            kind: self.kind(),
            warning: self.is_warning(),
            path: self.path().map(str::to_string),
            message: self.to_string(),
        });
    }
}

/// ErrorEntry is one structured row of the validation report's error list.
#[derive(Serialize, Debug, Clone, PartialEq, JsonSchema)]
pub struct ErrorEntry {
    /// Identity of the document the error concerns, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentKey>,
    pub stage: Stage,
    pub severity: Severity,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub warning: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Errors accumulates ErrorEntry rows across rendering stages.
#[derive(Default, Debug)]
pub struct Errors(Vec<ErrorEntry>);

impl Errors {
    pub fn new() -> Errors {
        Errors::default()
    }

    pub fn has_fatal_revision(&self) -> bool {
        self.0
            .iter()
            .any(|entry| entry.severity == Severity::FatalRevision)
    }

    pub fn into_entries(self) -> Vec<ErrorEntry> {
        self.0
    }

    /// True if `stage` recorded any non-warning finding, of any severity.
    pub fn failed_at_stage(&self, stage: Stage) -> bool {
        self.0
            .iter()
            .any(|entry| entry.stage == stage && !entry.warning)
    }
}

impl std::ops::Deref for Errors {
    type Target = [ErrorEntry];

    fn deref(&self) -> &[ErrorEntry] {
        &self.0
    }
}
