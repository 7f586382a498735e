mod common;

use common::{data_of, kinds, run};
use models::{from_yaml_stream, Revision, RevisionId};
use pretty_assertions::assert_eq;
use render::{validate_revision, RollupStatus, ValidationStatus};
use serde_json::json;

#[test]
fn test_missing_layering_policy_is_fatal_when_layers_are_declared() {
    let fixture = r#"
---
schema: example/Settings/v1
metadata:
  schema: metadata/Document/v1
  name: lonely
  layeringDefinition:
    layer: global
data: {}
"#;
    let outcome = run(fixture);

    assert!(kinds(&outcome).contains(&"LayeringPolicyNotFound"));
    assert!(outcome.documents.is_empty());
}

#[test]
fn test_documents_without_layers_need_no_policy() {
    let fixture = r#"
---
schema: example/Settings/v1
metadata:
  schema: metadata/Document/v1
  name: standalone
data:
  a: 1
"#;
    let outcome = run(fixture);

    assert!(!kinds(&outcome).contains(&"LayeringPolicyNotFound"));
    assert_eq!(
        data_of(&outcome, "example/Settings/v1", "standalone"),
        &json!({"a": 1}),
    );
}

#[test]
fn test_multiple_layering_policies() {
    let fixture = r#"
---
schema: deckhand/LayeringPolicy/v1
metadata:
  schema: metadata/Control/v1
  name: one
data:
  layerOrder: [global]
---
schema: deckhand/LayeringPolicy/v1
metadata:
  schema: metadata/Control/v1
  name: two
data:
  layerOrder: [site]
"#;
    let outcome = run(fixture);

    assert!(kinds(&outcome).contains(&"MultipleLayeringPolicies"));
    assert!(outcome.documents.is_empty());
}

#[test]
fn test_duplicate_identity() {
    let fixture = r#"
---
schema: example/Settings/v1
metadata:
  schema: metadata/Document/v1
  name: twin
data: {}
---
schema: example/Settings/v1
metadata:
  schema: metadata/Document/v1
  name: twin
data: {}
"#;
    let outcome = run(fixture);

    assert!(kinds(&outcome).contains(&"DuplicateDocument"));
    assert!(outcome.documents.is_empty());
}

#[test]
fn test_indeterminate_parent() {
    let fixture = r#"
---
schema: deckhand/LayeringPolicy/v1
metadata:
  schema: metadata/Control/v1
  name: layering-policy
data:
  layerOrder: [global, site]
---
schema: example/Settings/v1
metadata:
  schema: metadata/Document/v1
  name: first
  labels:
    tier: global
  layeringDefinition:
    layer: global
data: {}
---
schema: example/Settings/v1
metadata:
  schema: metadata/Document/v1
  name: second
  labels:
    tier: global
  layeringDefinition:
    layer: global
data: {}
---
schema: example/Settings/v1
metadata:
  schema: metadata/Document/v1
  name: child
  layeringDefinition:
    layer: site
    parentSelector:
      tier: global
data: {}
"#;
    let outcome = run(fixture);

    assert!(kinds(&outcome).contains(&"IndeterminateDocumentParent"));
    assert!(outcome.documents.is_empty());
}

#[test]
fn test_unknown_layer_fails_the_document_only() {
    let fixture = r#"
---
schema: deckhand/LayeringPolicy/v1
metadata:
  schema: metadata/Control/v1
  name: layering-policy
data:
  layerOrder: [global]
---
schema: example/Settings/v1
metadata:
  schema: metadata/Document/v1
  name: stray
  layeringDefinition:
    layer: zone
data: {}
---
schema: example/Settings/v1
metadata:
  schema: metadata/Document/v1
  name: fine
  layeringDefinition:
    layer: global
data:
  a: 1
"#;
    let outcome = run(fixture);

    assert!(kinds(&outcome).contains(&"UnknownLayer"));
    assert!(!outcome.documents.iter().any(|doc| doc.metadata.name == "stray"));
    assert_eq!(data_of(&outcome, "example/Settings/v1", "fine"), &json!({"a": 1}));
}

#[test]
fn test_invalid_replacement_without_parent() {
    let fixture = r#"
---
schema: example/Settings/v1
metadata:
  schema: metadata/Document/v1
  name: orphan
  replacement: true
data: {}
"#;
    let outcome = run(fixture);

    assert!(kinds(&outcome).contains(&"InvalidReplacement"));
    assert!(outcome.documents.is_empty());
}

#[test]
fn test_singleton_replacement() {
    let fixture = r#"
---
schema: deckhand/LayeringPolicy/v1
metadata:
  schema: metadata/Control/v1
  name: layering-policy
data:
  layerOrder: [global, site]
---
schema: example/Settings/v1
metadata:
  schema: metadata/Document/v1
  name: target
  replacement: true
  labels:
    tier: global
  layeringDefinition:
    layer: global
data: {}
---
schema: example/Settings/v1
metadata:
  schema: metadata/Document/v1
  name: target
  replacement: true
  layeringDefinition:
    layer: site
    parentSelector:
      tier: global
data: {}
"#;
    let outcome = run(fixture);

    assert!(kinds(&outcome).contains(&"SingletonReplacement"));
    assert!(outcome.documents.is_empty());
}

#[test]
fn test_substitution_missing_source() {
    let fixture = r#"
---
schema: example/Chart/v1
metadata:
  schema: metadata/Document/v1
  name: wanting
  substitutions:
    - src:
        schema: deckhand/Passphrase/v1
        name: never-stored
      dest:
        path: .secret
data: {}
---
schema: example/Chart/v1
metadata:
  schema: metadata/Document/v1
  name: fine
data:
  a: 1
"#;
    let outcome = run(fixture);

    assert!(kinds(&outcome).contains(&"SubstitutionFailure"));
    assert!(!outcome.documents.iter().any(|doc| doc.metadata.name == "wanting"));
    assert_eq!(data_of(&outcome, "example/Chart/v1", "fine"), &json!({"a": 1}));
}

#[test]
fn test_unrecognized_control_document() {
    let fixture = r#"
---
schema: deckhand/Mystery/v1
metadata:
  schema: metadata/Control/v1
  name: mystery
data: {}
"#;
    let outcome = run(fixture);

    assert!(kinds(&outcome).contains(&"InvalidDocumentFormat"));
    assert!(outcome.documents.is_empty());
}

#[test]
fn test_malformed_action_path() {
    let fixture = r#"
---
schema: example/Settings/v1
metadata:
  schema: metadata/Document/v1
  name: bad-path
  layeringDefinition:
    layer: global
    actions:
      - method: merge
        path: no-leading-dot
data: {}
---
schema: deckhand/LayeringPolicy/v1
metadata:
  schema: metadata/Control/v1
  name: layering-policy
data:
  layerOrder: [global]
"#;
    let outcome = run(fixture);

    assert!(kinds(&outcome).contains(&"InvalidDocumentFormat"));
    assert!(outcome.documents.is_empty());
}

#[test]
fn test_registered_schema_validation_is_advisory() {
    let fixture = r#"
---
schema: deckhand/DataSchema/v1
metadata:
  schema: metadata/Control/v1
  name: example/Chart/v1
data:
  type: object
  required: [chart]
---
schema: example/Chart/v1
metadata:
  schema: metadata/Document/v1
  name: incomplete
data:
  other: 1
"#;
    let outcome = run(fixture);

    // The mismatch is recorded, the schema validation is marked failed,
    // and rendering still emits the document.
    assert!(kinds(&outcome).contains(&"InvalidDocumentFormat"));
    assert_eq!(
        data_of(&outcome, "example/Chart/v1", "incomplete"),
        &json!({"other": 1}),
    );

    let schema_validation = outcome
        .report
        .validations
        .iter()
        .find(|entry| entry.name == render::SCHEMA_VALIDATION)
        .unwrap();
    assert_eq!(schema_validation.status, ValidationStatus::Failure);
}

#[test]
fn test_reserved_data_schema_name() {
    let fixture = r#"
---
schema: deckhand/DataSchema/v1
metadata:
  schema: metadata/Control/v1
  name: deckhand/Sneaky/v1
data:
  type: object
"#;
    let outcome = run(fixture);

    assert!(kinds(&outcome).contains(&"InvalidDocumentFormat"));
    assert!(outcome.documents.is_empty());
}

#[test]
fn test_validation_policy_rollup() {
    let fixture = r#"
---
schema: deckhand/ValidationPolicy/v1
metadata:
  schema: metadata/Control/v1
  name: site-deploy-ready
data:
  validations:
    - name: deckhand-schema-validation
    - name: deckhand-policy-validation
---
schema: example/Settings/v1
metadata:
  schema: metadata/Document/v1
  name: healthy
data:
  a: 1
"#;
    let outcome = run(fixture);

    let rollup = &outcome.report.rollups[0];
    assert_eq!(rollup.policy, "site-deploy-ready");
    assert_eq!(rollup.status, RollupStatus::Success);
}

#[test]
fn test_validate_runs_early_stages_only() {
    let fixture = r#"
---
schema: example/Settings/v1
metadata:
  schema: metadata/Document/v1
  name: wanting
  substitutions:
    - src:
        schema: deckhand/Passphrase/v1
        name: never-stored
      dest:
        path: .secret
data: {}
"#;
    let documents = from_yaml_stream(fixture).unwrap();
    let revision = Revision::new(RevisionId(4), documents);

    let report = validate_revision(&revision, &[]);

    // Structural and policy stages pass; the dangling substitution source
    // is a rendering concern, not a validation one.
    assert_eq!(report.revision, RevisionId(4));
    assert!(!report.errors.iter().any(|e| e.kind == "SubstitutionFailure"));
}
