use models::{from_yaml_stream, Document, Revision, RevisionId};
use render::{render_revision, Cancel, RenderOutcome, SecretStore, StaticSecrets};

/// Render a multi-document YAML fixture as revision 1 with no secrets.
#[allow(dead_code)]
pub fn run(fixture: &str) -> RenderOutcome {
    run_with_secrets(fixture, &StaticSecrets::default())
}

#[allow(dead_code)]
pub fn run_with_secrets(fixture: &str, secrets: &dyn SecretStore) -> RenderOutcome {
    let documents = from_yaml_stream(fixture).unwrap();
    let revision = Revision::new(RevisionId(1), documents);
    render_revision(&revision, &[], secrets, &Cancel::new()).unwrap()
}

/// The error kinds the report carries, in report order.
#[allow(dead_code)]
pub fn kinds(outcome: &RenderOutcome) -> Vec<&'static str> {
    outcome.report.errors.iter().map(|entry| entry.kind).collect()
}

/// Find an output document by schema and name.
#[allow(dead_code)]
pub fn output<'o>(outcome: &'o RenderOutcome, schema: &str, name: &str) -> &'o Document {
    outcome
        .documents
        .iter()
        .find(|doc| doc.schema.as_str() == schema && doc.metadata.name == name)
        .unwrap_or_else(|| panic!("no output document {schema}/{name}"))
}

#[allow(dead_code)]
pub fn data_of<'o>(outcome: &'o RenderOutcome, schema: &str, name: &str) -> &'o serde_json::Value {
    &output(outcome, schema, name).data
}
