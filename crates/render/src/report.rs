use crate::errors::{ErrorEntry, Errors, Stage};
use models::{RevisionId, ValidationPolicy};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name under which the engine records schema validation outcomes.
pub const SCHEMA_VALIDATION: &str = "deckhand-schema-validation";
/// Legacy alias of SCHEMA_VALIDATION still honoured when a
/// ValidationPolicy expects it.
pub const SCHEMA_VALIDATION_ALIAS: &str = "deckhand-document-schema-validation";
/// Name under which the engine records policy conformance outcomes.
pub const POLICY_VALIDATION: &str = "deckhand-policy-validation";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Success,
    Failure,
    Expired,
}

/// ValidationEntry is one named validation outcome for a revision: the
/// engine's internal entries, or one posted by an external service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
pub struct ValidationEntry {
    pub name: String,
    pub status: ValidationStatus,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RollupStatus {
    Success,
    Failure,
}

/// RollupEntry is one expected validation's resolved state within a
/// policy roll-up. `status` is the joined entry's status, or "missing"
/// when no entry of that name exists.
#[derive(Serialize, Debug, Clone, PartialEq, JsonSchema)]
pub struct RollupEntry {
    pub name: String,
    pub status: String,
}

/// PolicyRollup reports one ValidationPolicy's verdict over the joined
/// validation entries.
#[derive(Serialize, Debug, Clone, PartialEq, JsonSchema)]
pub struct PolicyRollup {
    /// Name of the ValidationPolicy control document.
    pub policy: String,
    pub status: RollupStatus,
    pub validations: Vec<RollupEntry>,
}

/// ValidationReport is the structured per-revision health surfaced to the
/// HTTP edge alongside (or instead of) rendered documents.
#[derive(Serialize, Debug, Clone, PartialEq, JsonSchema)]
pub struct ValidationReport {
    pub revision: RevisionId,
    pub errors: Vec<ErrorEntry>,
    /// Joined validation entries: internal then external, latest entry
    /// per name winning, ordered by name.
    pub validations: Vec<ValidationEntry>,
    pub rollups: Vec<PolicyRollup>,
}

/// Aggregate stage errors and external entries into the revision report.
pub fn build_report(
    revision: RevisionId,
    errors: Errors,
    external: &[ValidationEntry],
    policies: &[(String, ValidationPolicy)],
) -> ValidationReport {
    // Internal validations derive from the stages that ran: schema
    // validation fails on any schema-stage finding, policy validation on
    // any policy-stage finding.
    let internal = [
        (SCHEMA_VALIDATION, Stage::Schema),
        (POLICY_VALIDATION, Stage::Policy),
    ]
    .map(|(name, stage)| ValidationEntry {
        name: name.to_string(),
        status: if errors.failed_at_stage(stage) {
            ValidationStatus::Failure
        } else {
            ValidationStatus::Success
        },
    });

    // Join by name; external entries are posted after the render's own,
    // so a later entry of the same name wins.
    let mut joined: BTreeMap<String, ValidationStatus> = BTreeMap::new();
    for entry in internal.iter().chain(external) {
        joined.insert(entry.name.clone(), entry.status);
    }

    let rollups = policies
        .iter()
        .map(|(policy, spec)| rollup(policy, spec, &joined))
        .collect();

    ValidationReport {
        revision,
        errors: errors.into_entries(),
        validations: joined
            .into_iter()
            .map(|(name, status)| ValidationEntry { name, status })
            .collect(),
        rollups,
    }
}

fn rollup(
    policy: &str,
    spec: &ValidationPolicy,
    joined: &BTreeMap<String, ValidationStatus>,
) -> PolicyRollup {
    let validations: Vec<RollupEntry> = spec
        .validations
        .iter()
        .map(|expected| {
            let status = joined
                .get(canonical_name(&expected.name))
                .or_else(|| joined.get(expected.name.as_str()));
            RollupEntry {
                name: expected.name.clone(),
                status: match status {
                    Some(ValidationStatus::Success) => "success".to_string(),
                    Some(ValidationStatus::Failure) => "failure".to_string(),
                    Some(ValidationStatus::Expired) => "expired".to_string(),
                    None => "missing".to_string(),
                },
            }
        })
        .collect();

    let status = if validations.iter().all(|v| v.status == "success") {
        RollupStatus::Success
    } else {
        RollupStatus::Failure
    };

    PolicyRollup {
        policy: policy.to_string(),
        status,
        validations,
    }
}

// The source material used two names for the internal schema validation
// over its lifetime; expectations written against the legacy name resolve
// to the current one.
fn canonical_name(name: &str) -> &str {
    if name == SCHEMA_VALIDATION_ALIAS {
        SCHEMA_VALIDATION
    } else {
        name
    }
}
