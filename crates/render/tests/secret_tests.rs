mod common;

use common::{data_of, kinds, run_with_secrets};
use models::{from_yaml_stream, Revision, RevisionId};
use pretty_assertions::assert_eq;
use render::{
    render_revision, Cancel, EngineError, SecretError, SecretStore, StaticSecrets,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

const ENCRYPTED_FIXTURE: &str = r#"
---
schema: deckhand/Passphrase/v1
metadata:
  schema: metadata/Document/v1
  name: admin-password
  storagePolicy: encrypted
data: ref-7c2a
---
schema: example/Chart/v1
metadata:
  schema: metadata/Document/v1
  name: web
  substitutions:
    - src:
        schema: deckhand/Passphrase/v1
        name: admin-password
      dest:
        path: .values.password
data:
  values: {}
"#;

#[test]
fn test_secret_dereference_and_substitution() {
    let secrets = StaticSecrets::new([("ref-7c2a", "s3cret")]);
    let outcome = run_with_secrets(ENCRYPTED_FIXTURE, &secrets);

    // The encrypted document emits its cleartext, and the substitution
    // observes the dereferenced value rather than the token.
    assert_eq!(
        data_of(&outcome, "deckhand/Passphrase/v1", "admin-password"),
        &json!("s3cret"),
    );
    assert_eq!(
        data_of(&outcome, "example/Chart/v1", "web"),
        &json!({"values": {"password": "s3cret"}}),
    );
}

struct CountingSecrets(StaticSecrets, AtomicUsize);

impl SecretStore for CountingSecrets {
    fn fetch(&self, reference: &str) -> Result<bytes::Bytes, SecretError> {
        self.1.fetch_add(1, Ordering::SeqCst);
        self.0.fetch(reference)
    }
}

#[test]
fn test_one_fetch_per_reference_per_render() {
    // Two substitutions read the same encrypted source, which is also
    // emitted itself: one fetch covers all three uses.
    let fixture = r#"
---
schema: deckhand/Passphrase/v1
metadata:
  schema: metadata/Document/v1
  name: admin-password
  storagePolicy: encrypted
data: ref-7c2a
---
schema: example/Chart/v1
metadata:
  schema: metadata/Document/v1
  name: web
  substitutions:
    - src:
        schema: deckhand/Passphrase/v1
        name: admin-password
      dest:
        path: .first
    - src:
        schema: deckhand/Passphrase/v1
        name: admin-password
      dest:
        path: .second
data: {}
"#;
    let secrets = CountingSecrets(
        StaticSecrets::new([("ref-7c2a", "s3cret")]),
        AtomicUsize::new(0),
    );
    let outcome = run_with_secrets(fixture, &secrets);

    assert_eq!(
        data_of(&outcome, "example/Chart/v1", "web"),
        &json!({"first": "s3cret", "second": "s3cret"}),
    );
    assert_eq!(secrets.1.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unused_abstract_secret_is_never_fetched() {
    let fixture = r#"
---
schema: deckhand/LayeringPolicy/v1
metadata:
  schema: metadata/Control/v1
  name: layering-policy
data:
  layerOrder: [global]
---
schema: deckhand/Passphrase/v1
metadata:
  schema: metadata/Document/v1
  name: dormant
  storagePolicy: encrypted
  layeringDefinition:
    layer: global
    abstract: true
data: ref-dormant
"#;
    let secrets = CountingSecrets(StaticSecrets::default(), AtomicUsize::new(0));
    let outcome = run_with_secrets(fixture, &secrets);

    assert_eq!(secrets.1.load(Ordering::SeqCst), 0);
    assert!(!kinds(&outcome).contains(&"BarbicanException"));
}

#[test]
fn test_secret_not_found_fails_the_document() {
    let outcome = run_with_secrets(ENCRYPTED_FIXTURE, &StaticSecrets::default());

    assert!(kinds(&outcome).contains(&"BarbicanException"));
    assert!(!outcome
        .documents
        .iter()
        .any(|doc| doc.metadata.name == "admin-password"));
    // The dependant substitution fails in turn.
    assert!(!outcome.documents.iter().any(|doc| doc.metadata.name == "web"));
}

struct FlakySecrets;

impl SecretStore for FlakySecrets {
    fn fetch(&self, reference: &str) -> Result<bytes::Bytes, SecretError> {
        Err(SecretError::Transient {
            reference: reference.to_string(),
            detail: "connection reset".to_string(),
        })
    }
}

#[test]
fn test_transient_secret_failure_aborts_the_render() {
    let documents = from_yaml_stream(ENCRYPTED_FIXTURE).unwrap();
    let revision = Revision::new(RevisionId(1), documents);

    let result = render_revision(&revision, &[], &FlakySecrets, &Cancel::new());
    match result {
        Err(EngineError::Secret(SecretError::Transient { reference, .. })) => {
            assert_eq!(reference, "ref-7c2a");
        }
        other => panic!("expected a transient secret failure, got {other:?}"),
    }
}

#[test]
fn test_cancellation() {
    let documents = from_yaml_stream(ENCRYPTED_FIXTURE).unwrap();
    let revision = Revision::new(RevisionId(1), documents);

    let cancel = Cancel::new();
    cancel.cancel();

    let result = render_revision(&revision, &[], &StaticSecrets::default(), &cancel);
    assert!(matches!(result, Err(EngineError::Cancelled)));
}
