// The rendering engine: the deterministic computation which turns a
// revision's stored documents into the concrete documents a downstream
// consumer will apply. Layering composes documents down the layer order,
// substitution injects values across documents, replacement lets a child
// supplant its parent, and the validation report carries everything the
// stages found.
//
// Rendering is total, deterministic and idempotent: every iteration that
// reaches output is ordered by (schema, name, layer), and a rendered set
// re-renders to itself.

use models::{
    ControlDocument, DataSchema, Document, DocumentKey, LayeringPolicy, Revision, RevisionId,
    ValidationPolicy,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Structured errors, their severities, and the per-render accumulator.
pub mod errors;
pub use errors::{Error, ErrorEntry, Errors, Severity, Stage};

// Adjacency tables keyed by stable document identifiers.
mod index;
pub use index::{DocId, DocumentIndex};

// The rendering stages, leaves-first.
mod registry;
pub use registry::SchemaRegistry;
mod validate;
mod policy;
pub use policy::LayerOrder;
mod parent;
mod replacement;
mod layering;
mod substitution;

// The seam onto the external secret store, and its per-render cache.
pub mod secrets;
pub use secrets::{SecretCache, SecretError, SecretStore, StaticSecrets};

// The validation report consumed by the HTTP edge.
pub mod report;
pub use report::{
    PolicyRollup, RollupEntry, RollupStatus, ValidationEntry, ValidationReport, ValidationStatus,
    POLICY_VALIDATION, SCHEMA_VALIDATION, SCHEMA_VALIDATION_ALIAS,
};

/// EngineError is a failure of the render call itself, as opposed to a
/// finding about the revision (which lands in the report).
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("rendering was cancelled")]
    Cancelled,
    #[error(transparent)]
    Secret(#[from] SecretError),
    #[error("failed to read the revision snapshot")]
    Snapshot(#[source] anyhow::Error),
}

/// Cancel is a cooperative cancellation signal, checked between documents
/// and before each secret dereference.
#[derive(Clone, Debug, Default)]
pub struct Cancel(Arc<AtomicBool>);

impl Cancel {
    pub fn new() -> Cancel {
        Cancel::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub(crate) fn check(&self) -> Result<(), EngineError> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// DocumentState is a document's terminal position in the rendering state
/// machine: Ingested -> Validated -> Layered -> Substituted -> Finalized,
/// with Suppressed for replaced parents and abstract documents, and Failed
/// for any document a fatal stage excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Ingested,
    Validated,
    Layered,
    Substituted,
    Finalized,
    Suppressed,
    Failed,
}

/// RenderOutcome is the rendered concrete document set plus the report.
/// On a fatal revision error `documents` is empty and the report carries
/// the findings.
#[derive(Debug)]
pub struct RenderOutcome {
    pub documents: Vec<Document>,
    pub report: ValidationReport,
    pub states: BTreeMap<DocId, DocumentState>,
}

/// Snapshots is the seam onto the durable revision store: an immutable
/// per-revision document snapshot, plus any externally posted validation
/// entries for the revision.
pub trait Snapshots {
    fn revision_documents(&self, revision: RevisionId) -> anyhow::Result<Vec<Document>>;
    fn validation_entries(&self, revision: RevisionId) -> anyhow::Result<Vec<ValidationEntry>>;
}

/// Engine wires the rendering pipeline to its collaborators and offers the
/// two entry points the HTTP edge consumes.
pub struct Engine<S, K> {
    snapshots: S,
    secrets: K,
}

impl<S: Snapshots, K: SecretStore> Engine<S, K> {
    pub fn new(snapshots: S, secrets: K) -> Engine<S, K> {
        Engine { snapshots, secrets }
    }

    /// Fully render a revision: all ten stages, documents plus report.
    pub fn render(
        &self,
        revision: RevisionId,
        cancel: &Cancel,
    ) -> Result<RenderOutcome, EngineError> {
        let documents = self
            .snapshots
            .revision_documents(revision)
            .map_err(EngineError::Snapshot)?;
        let external = self
            .snapshots
            .validation_entries(revision)
            .map_err(EngineError::Snapshot)?;
        let revision = Revision::new(revision, documents);
        render_revision(&revision, &external, &self.secrets, cancel)
    }

    /// Run validation stages only and return the report.
    pub fn validate(&self, revision: RevisionId) -> Result<ValidationReport, EngineError> {
        let documents = self
            .snapshots
            .revision_documents(revision)
            .map_err(EngineError::Snapshot)?;
        let external = self
            .snapshots
            .validation_entries(revision)
            .map_err(EngineError::Snapshot)?;
        let revision = Revision::new(revision, documents);
        Ok(validate_revision(&revision, &external))
    }
}

/// Render a revision snapshot into its concrete document set.
pub fn render_revision(
    revision: &Revision,
    external: &[ValidationEntry],
    secrets: &dyn SecretStore,
    cancel: &Cancel,
) -> Result<RenderOutcome, EngineError> {
    let span = tracing::debug_span!("render", revision = %revision.id);
    let _entered = span.enter();

    let mut errors = Errors::new();
    let mut failed: BTreeSet<DocId> = BTreeSet::new();

    let mut prepared = prepare(revision, &mut failed, &mut errors);

    let mut states: BTreeMap<DocId, DocumentState> = prepared
        .index
        .ids()
        .cloned()
        .map(|id| (id, DocumentState::Validated))
        .collect();
    for id in &failed {
        states.insert(id.clone(), DocumentState::Failed);
    }

    if errors.has_fatal_revision() {
        let report = report::build_report(
            revision.id,
            errors,
            external,
            &prepared.validation_policies,
        );
        return Ok(RenderOutcome {
            documents: Vec::new(),
            report,
            states,
        });
    }

    let parents = parent::walk_parents(
        &prepared.index,
        &prepared.layer_order,
        &mut failed,
        &mut errors,
    );
    if !errors.has_fatal_revision() {
        let suppressed = replacement::walk_replacements(&mut prepared.index, &parents, &mut errors);

        if !errors.has_fatal_revision() {
            cancel.check()?;
            let mut rendered =
                layering::walk_layering(&prepared.index, &parents, &mut failed, &mut errors);
            for id in rendered.keys() {
                if !failed.contains(id) {
                    states.insert(id.clone(), DocumentState::Layered);
                }
            }

            let cache = SecretCache::new(secrets);
            secrets::walk_secrets(
                &prepared.index,
                &suppressed,
                &mut rendered,
                &mut failed,
                &prepared.registry,
                &cache,
                cancel,
                &mut errors,
            )?;

            substitution::walk_substitutions(
                &prepared.index,
                &mut rendered,
                &mut failed,
                cancel,
                &mut errors,
            )?;

            if !errors.has_fatal_revision() {
                let output = assemble(
                    &prepared,
                    &rendered,
                    &suppressed,
                    &failed,
                    &mut states,
                );
                tracing::debug!(
                    documents = output.len(),
                    errors = errors.len(),
                    "rendered revision"
                );
                let report = report::build_report(
                    revision.id,
                    errors,
                    external,
                    &prepared.validation_policies,
                );
                return Ok(RenderOutcome {
                    documents: output,
                    report,
                    states,
                });
            }
        }
    }

    // A fatal revision error surfaced mid-pipeline: report only.
    for id in &failed {
        states.insert(id.clone(), DocumentState::Failed);
    }
    let report = report::build_report(
        revision.id,
        errors,
        external,
        &prepared.validation_policies,
    );
    Ok(RenderOutcome {
        documents: Vec::new(),
        report,
        states,
    })
}

/// Run validation stages only (structural and policy conformance) and
/// build the report. Encrypted payloads are not dereferenced, so their
/// registered-schema checks are deferred to a full render.
pub fn validate_revision(revision: &Revision, external: &[ValidationEntry]) -> ValidationReport {
    let mut errors = Errors::new();
    let mut failed: BTreeSet<DocId> = BTreeSet::new();

    let prepared = prepare(revision, &mut failed, &mut errors);
    report::build_report(
        revision.id,
        errors,
        external,
        &prepared.validation_policies,
    )
}

// Everything stages 1-2 produce: the partitioned revision, resolved layer
// order, compiled schema registry, and the validated document index.
struct Prepared<'a> {
    controls: Vec<&'a Document>,
    validation_policies: Vec<(String, ValidationPolicy)>,
    registry: SchemaRegistry,
    layer_order: LayerOrder,
    index: DocumentIndex<'a>,
}

fn prepare<'a>(
    revision: &'a Revision,
    failed: &mut BTreeSet<DocId>,
    errors: &mut Errors,
) -> Prepared<'a> {
    // Iteration order everywhere downstream derives from this sort.
    let mut documents: Vec<&Document> = revision.documents.iter().collect();
    documents.sort_by(|lhs, rhs| {
        (&lhs.schema, &lhs.metadata.name, lhs.layer())
            .cmp(&(&rhs.schema, &rhs.metadata.name, rhs.layer()))
    });

    let mut controls: Vec<&Document> = Vec::new();
    let mut normals: Vec<&Document> = Vec::new();
    let mut policies: Vec<(DocumentKey, LayeringPolicy)> = Vec::new();
    let mut registrations: Vec<(DocumentKey, DataSchema)> = Vec::new();
    let mut validation_policies: Vec<(String, ValidationPolicy)> = Vec::new();
    let mut control_keys: BTreeSet<DocumentKey> = BTreeSet::new();

    for &doc in &documents {
        match ControlDocument::from_document(doc) {
            Ok(None) => normals.push(doc),
            Ok(Some(control)) => {
                if !control_keys.insert(doc.key()) {
                    Error::DuplicateDocument {
                        key: doc.key(),
                        count: 2,
                    }
                    .push(Some(&doc.key()), Stage::Schema, errors);
                }
                controls.push(doc);

                match control {
                    ControlDocument::LayeringPolicy(policy) => policies.push((doc.key(), policy)),
                    ControlDocument::DataSchema(registration) => {
                        registrations.push((doc.key(), registration))
                    }
                    ControlDocument::ValidationPolicy(policy) => {
                        if policy.validations.is_empty() {
                            Error::EmptyValidationPolicy {
                                name: doc.metadata.name.clone(),
                            }
                            .push(Some(&doc.key()), Stage::Policy, errors);
                        }
                        validation_policies.push((doc.metadata.name.clone(), policy));
                    }
                }
            }
            Err(err) => {
                Error::InvalidDocumentFormat {
                    detail: err.to_string(),
                }
                .push(Some(&doc.key()), Stage::Schema, errors);
            }
        }
    }

    let registry = SchemaRegistry::build(&registrations, errors);
    let layer_order = LayerOrder::resolve(&policies, &normals, errors);
    let index = DocumentIndex::build(&normals, errors);

    validate::walk_documents(
        &documents,
        &index,
        &registry,
        &layer_order,
        failed,
        errors,
    );
    validate::log_summary(&documents, errors);

    Prepared {
        controls,
        validation_policies,
        registry,
        layer_order,
        index,
    }
}

// Stage 9-10: drop abstract and suppressed documents, attach rendered data
// to everything that survived, and emit in (schema, name, layer) order.
// Control documents pass through unchanged so that a rendered set remains
// a complete, re-ingestable revision.
fn assemble(
    prepared: &Prepared,
    rendered: &BTreeMap<DocId, serde_json::Value>,
    suppressed: &BTreeSet<DocId>,
    failed: &BTreeSet<DocId>,
    states: &mut BTreeMap<DocId, DocumentState>,
) -> Vec<Document> {
    let mut output: Vec<Document> = prepared.controls.iter().map(|doc| (*doc).clone()).collect();

    for (id, doc) in prepared.index.iter() {
        if failed.contains(id) {
            states.insert(id.clone(), DocumentState::Failed);
            continue;
        }
        if doc.is_abstract() || suppressed.contains(id) {
            states.insert(id.clone(), DocumentState::Suppressed);
            continue;
        }
        let Some(data) = rendered.get(id) else {
            states.insert(id.clone(), DocumentState::Failed);
            continue;
        };

        let mut out = doc.clone();
        out.data = data.clone();
        output.push(out);
        states.insert(id.clone(), DocumentState::Finalized);
    }

    output.sort_by(|lhs, rhs| {
        (&lhs.schema, &lhs.metadata.name, lhs.layer())
            .cmp(&(&rhs.schema, &rhs.metadata.name, rhs.layer()))
    });
    output
}
