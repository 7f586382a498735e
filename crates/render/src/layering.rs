use crate::errors::{Error, Errors, Stage};
use crate::index::{DocId, DocumentIndex};
use doc::{deep_merge, Path};
use models::{ActionMethod, Document, LayeringAction};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Walk the parent forest root-first, computing each document's
/// intermediate data: a deep copy of the parent's already-layered data with
/// the document's ordered merge actions applied. Abstract documents
/// participate fully; they are only excluded from output later.
///
/// `parents` is the selector-derived relation. Edges into a replaced
/// parent are re-routed to its replacement, except for the replacement
/// document itself, which layers atop the document it supplants.
pub fn walk_layering(
    index: &DocumentIndex,
    parents: &BTreeMap<DocId, DocId>,
    failed: &mut BTreeSet<DocId>,
    errors: &mut Errors,
) -> BTreeMap<DocId, Value> {
    let mut effective_parents: BTreeMap<DocId, DocId> = BTreeMap::new();
    for (child, parent) in parents {
        let parent = match index.replacement_of(&parent.key()) {
            Some(replacement) if replacement != child => replacement.clone(),
            _ => parent.clone(),
        };
        effective_parents.insert(child.clone(), parent);
    }

    // Process the redirected forest root-first. Every document has at most
    // one parent, so a document becomes ready exactly when its parent has
    // been processed. Sets iterate in (schema, name, layer) order, keeping
    // the traversal deterministic.
    let mut dependants: BTreeMap<DocId, Vec<DocId>> = BTreeMap::new();
    let mut pending: BTreeSet<DocId> = BTreeSet::new();
    let mut ready: BTreeSet<DocId> = BTreeSet::new();

    for id in index.ids() {
        match effective_parents.get(id) {
            Some(parent) => {
                pending.insert(id.clone());
                dependants
                    .entry(parent.clone())
                    .or_default()
                    .push(id.clone());
            }
            None => {
                ready.insert(id.clone());
            }
        }
    }

    let mut rendered: BTreeMap<DocId, Value> = BTreeMap::new();

    while let Some(id) = ready.pop_first() {
        let Some(doc) = index.get(&id) else { continue };

        let parent = effective_parents.get(&id);
        let parent_failed = parent.map(|p| failed.contains(p)).unwrap_or(false);

        if parent_failed || failed.contains(&id) {
            // Descendants of a failed document fail in turn, without an
            // error entry of their own.
            failed.insert(id.clone());
        } else if let Some(data) = layer_one(&id, doc, parent, &rendered, errors) {
            rendered.insert(id.clone(), data);
        } else {
            failed.insert(id.clone());
        }

        for dependant in dependants.remove(&id).unwrap_or_default() {
            if pending.remove(&dependant) {
                ready.insert(dependant);
            }
        }
    }

    // Anything still pending hangs from an edge that never resolved (for
    // example a parent which was reported as a duplicate identity): fail it
    // rather than emit partially-layered data.
    for id in pending {
        failed.insert(id);
    }

    rendered
}

fn layer_one(
    id: &DocId,
    doc: &Document,
    parent: Option<&DocId>,
    rendered: &BTreeMap<DocId, Value>,
    errors: &mut Errors,
) -> Option<Value> {
    let Some(parent) = parent else {
        // Roots render as their own data.
        return Some(doc.data.clone());
    };
    let parent_data = rendered.get(parent)?;

    let mut data = parent_data.clone();
    let actions = doc
        .metadata
        .layering_definition
        .as_ref()
        .map(|ld| ld.actions.as_slice())
        .unwrap_or_default();

    for action in actions {
        if !apply_action(id, doc, action, &mut data, errors) {
            return None;
        }
    }
    Some(data)
}

// Apply one layering action against the parent-derived `data`, in terms of
// the document's own `data` at the action path. Returns false on a fatal
// document error.
fn apply_action(
    id: &DocId,
    doc: &Document,
    action: &LayeringAction,
    data: &mut Value,
    errors: &mut Errors,
) -> bool {
    let path: Path = match action.path.parse() {
        Ok(path) => path,
        // Unparseable paths were already reported as fatal by the validator.
        Err(_) => return false,
    };

    let missing_key = |errors: &mut Errors| {
        Error::MissingDocumentKey {
            method: format!("{:?}", action.method).to_lowercase(),
            path: action.path.clone(),
        }
        .push(Some(&id.key()), Stage::Layering, errors);
    };

    match action.method {
        ActionMethod::Merge => {
            let Some(own) = path.query(&doc.data) else {
                missing_key(errors);
                return false;
            };
            let own = own.clone();
            let Some(target) = path.create(data) else {
                missing_key(errors);
                return false;
            };
            deep_merge(target, &own);
        }
        ActionMethod::Replace => {
            let Some(own) = path.query(&doc.data) else {
                missing_key(errors);
                return false;
            };
            // Replace requires the location to already exist on the parent
            // side.
            if path.query(data).is_none() {
                missing_key(errors);
                return false;
            }
            let own = own.clone();
            path.set(data, own);
        }
        ActionMethod::Delete => {
            if path.remove(data).is_none() {
                missing_key(errors);
                return false;
            }
        }
    }
    true
}
