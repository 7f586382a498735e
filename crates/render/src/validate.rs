use crate::errors::{Error, Errors, Stage};
use crate::index::{DocId, DocumentIndex};
use crate::policy::LayerOrder;
use crate::registry::SchemaRegistry;
use doc::Path;
use itertools::Itertools;
use models::Document;
use std::collections::BTreeSet;

/// Walk every document of the revision, validating structural
/// well-formedness and policy conformance. Structural failures are fatal
/// to the revision; registered-schema mismatches are advisory so that
/// consumers can introspect partially valid revisions.
pub fn walk_documents(
    documents: &[&Document],
    index: &DocumentIndex,
    registry: &SchemaRegistry,
    layer_order: &LayerOrder,
    failed: &mut BTreeSet<DocId>,
    errors: &mut Errors,
) {
    for &doc in documents {
        walk_document(doc, registry, layer_order, failed, errors);
    }

    // A replacement pair is only coherent when both members exist; a lone
    // replacement-marked document is caught against its selector parent by
    // the replacement resolver, while structural conformance of the pair's
    // layers is checked here.
    for (id, doc) in index.iter() {
        if doc.metadata.replacement && doc.metadata.layering_definition.is_none() {
            Error::InvalidReplacement {
                detail: format!("{} declares no layering definition", id),
            }
            .push(Some(&id.key()), Stage::Replacement, errors);
        }
    }
}

fn walk_document(
    doc: &Document,
    registry: &SchemaRegistry,
    layer_order: &LayerOrder,
    failed: &mut BTreeSet<DocId>,
    errors: &mut Errors,
) {
    let key = doc.key();
    let id = DocId::of(doc);

    // Structural checks: the schema tag, every declared path, and every
    // substitution pattern must parse.
    if !doc.schema.is_well_formed() {
        Error::InvalidDocumentFormat {
            detail: format!("schema tag {:?} is not namespace/Kind/version", doc.schema),
        }
        .push(Some(&key), Stage::Schema, errors);
    }

    if let Some(layering) = &doc.metadata.layering_definition {
        for action in &layering.actions {
            if let Err(err) = action.path.parse::<Path>() {
                Error::InvalidDocumentFormat {
                    detail: err.to_string(),
                }
                .push(Some(&key), Stage::Schema, errors);
            }
        }
    }

    for substitution in &doc.metadata.substitutions {
        for path in [&substitution.src.path, &substitution.dest.path] {
            if let Err(err) = path.parse::<Path>() {
                Error::InvalidDocumentFormat {
                    detail: err.to_string(),
                }
                .push(Some(&key), Stage::Schema, errors);
            }
        }
        if let Some(pattern) = &substitution.dest.pattern {
            if let Err(err) = regex::Regex::new(pattern) {
                Error::InvalidDocumentFormat {
                    detail: format!("pattern {pattern:?} is not a valid regex: {err}"),
                }
                .push(Some(&key), Stage::Schema, errors);
            }
        }
    }

    // Registered-schema validation of cleartext payloads. Encrypted
    // payloads are validated after dereferencing, once cleartext exists.
    match registry.get(&doc.schema) {
        Some(validator) if !doc.is_encrypted() => {
            for err in validator.iter_errors(&doc.data).take(5) {
                Error::SchemaValidationFailed {
                    detail: err.to_string(),
                    path: err.instance_path.to_string(),
                }
                .push(Some(&key), Stage::Schema, errors);
            }
        }
        Some(_) => {}
        None if !doc.is_control() && !doc.is_abstract() => {
            Error::UnregisteredSchema {
                schema: doc.schema.to_string(),
            }
            .push(Some(&key), Stage::Schema, errors);
        }
        None => {}
    }

    // Policy conformance: a declared layer must be named by the layering
    // policy. Absence of any policy at all is reported once, during policy
    // resolution.
    if let Some(layer) = doc.layer() {
        if !layer_order.is_empty() && layer_order.index_of(layer).is_none() {
            Error::UnknownLayer {
                layer: layer.to_string(),
                order: layer_order.as_slice().to_vec(),
            }
            .push(Some(&key), Stage::Policy, errors);
            failed.insert(id);
        }
    }
}

/// Log a per-revision summary of what validation found.
pub fn log_summary(documents: &[&Document], errors: &Errors) {
    let (fatal, advisory): (Vec<_>, Vec<_>) = errors
        .iter()
        .partition(|entry| entry.severity != crate::errors::Severity::Advisory);

    tracing::debug!(
        documents = documents.len(),
        fatal = fatal.len(),
        advisory = advisory.len(),
        kinds = %errors.iter().map(|e| e.kind).unique().join(","),
        "validated revision documents"
    );
}
