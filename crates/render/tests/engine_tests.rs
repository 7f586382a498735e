use models::{from_yaml_stream, Document, RevisionId};
use pretty_assertions::assert_eq;
use render::{
    Cancel, Engine, Snapshots, StaticSecrets, ValidationEntry, ValidationStatus,
};
use std::collections::BTreeMap;

// An in-memory revision store standing in for the durable one.
#[derive(Default)]
struct FixtureStore {
    revisions: BTreeMap<RevisionId, Vec<Document>>,
    entries: BTreeMap<RevisionId, Vec<ValidationEntry>>,
}

impl Snapshots for FixtureStore {
    fn revision_documents(&self, revision: RevisionId) -> anyhow::Result<Vec<Document>> {
        self.revisions
            .get(&revision)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such revision {revision}"))
    }

    fn validation_entries(&self, revision: RevisionId) -> anyhow::Result<Vec<ValidationEntry>> {
        Ok(self.entries.get(&revision).cloned().unwrap_or_default())
    }
}

fn store_with(fixture: &str) -> FixtureStore {
    let mut store = FixtureStore::default();
    store
        .revisions
        .insert(RevisionId(7), from_yaml_stream(fixture).unwrap());
    store
}

const FIXTURE: &str = r#"
---
schema: deckhand/ValidationPolicy/v1
metadata:
  schema: metadata/Control/v1
  name: deploy-ready
data:
  validations:
    - name: deckhand-schema-validation
    - name: promenade-site-lint
---
schema: example/Settings/v1
metadata:
  schema: metadata/Document/v1
  name: site-settings
data:
  region: nordix
"#;

#[test]
fn test_engine_render_and_validate() {
    let mut store = store_with(FIXTURE);
    store.entries.insert(
        RevisionId(7),
        vec![ValidationEntry {
            name: "promenade-site-lint".to_string(),
            status: ValidationStatus::Success,
        }],
    );
    let engine = Engine::new(store, StaticSecrets::default());

    let outcome = engine.render(RevisionId(7), &Cancel::new()).unwrap();
    assert_eq!(outcome.documents.len(), 2);

    // The externally posted entry joins the roll-up.
    let rollup = &outcome.report.rollups[0];
    assert_eq!(rollup.policy, "deploy-ready");
    assert!(rollup.validations.iter().all(|v| v.status == "success"));

    let report = engine.validate(RevisionId(7)).unwrap();
    assert_eq!(report.revision, RevisionId(7));

    // An unknown revision surfaces as a snapshot error.
    engine.render(RevisionId(9), &Cancel::new()).unwrap_err();
}
