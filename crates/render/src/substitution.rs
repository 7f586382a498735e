use crate::errors::{Error, Errors, Stage};
use crate::index::{DocId, DocumentIndex};
use crate::{Cancel, EngineError};
use doc::Path;
use models::Substitution;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Apply every substitution across the revision's concrete documents.
///
/// Substitutions are modelled as directed edges, destination depending on
/// source, and applied in topological order so that a destination always
/// observes its source's post-substitution data. Within one document the
/// declared list order applies. A cycle is fatal to the revision.
pub fn walk_substitutions(
    index: &DocumentIndex,
    rendered: &mut BTreeMap<DocId, Value>,
    failed: &mut BTreeSet<DocId>,
    cancel: &Cancel,
    errors: &mut Errors,
) -> Result<(), EngineError> {
    // Nodes are concrete documents carrying substitutions; edges exist
    // only between nodes, because any other source's data is already
    // final when this pass begins.
    let nodes: BTreeSet<DocId> = index
        .iter()
        .filter(|(_, doc)| !doc.is_abstract() && !doc.metadata.substitutions.is_empty())
        .map(|(id, _)| id.clone())
        .collect();

    let mut dependants: BTreeMap<DocId, BTreeSet<DocId>> = BTreeMap::new();
    let mut in_degree: BTreeMap<DocId, usize> = BTreeMap::new();

    for id in &nodes {
        in_degree.entry(id.clone()).or_insert(0);

        let doc = index.get(id).expect("node is indexed");
        for substitution in &doc.metadata.substitutions {
            let Some(source) = index.effective(&substitution.src.key()) else {
                continue;
            };
            if source == id {
                // A self-edge can never be satisfied; count it so the
                // document surfaces as a cycle below.
                *in_degree.entry(id.clone()).or_insert(0) += 1;
                continue;
            }
            if !nodes.contains(source) {
                continue;
            }
            if dependants
                .entry(source.clone())
                .or_default()
                .insert(id.clone())
            {
                *in_degree.entry(id.clone()).or_insert(0) += 1;
            }
        }
    }

    let mut ready: BTreeSet<DocId> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| id.clone())
        .collect();
    let mut remaining = in_degree.len();

    while let Some(id) = ready.pop_first() {
        cancel.check()?;
        remaining -= 1;

        apply_document(&id, index, rendered, failed, errors);

        for dependant in dependants.remove(&id).unwrap_or_default() {
            let degree = in_degree.get_mut(&dependant).expect("dependant is a node");
            *degree -= 1;
            if *degree == 0 {
                ready.insert(dependant);
            }
        }
    }

    if remaining > 0 {
        let cycle: Vec<_> = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(id, _)| id.key())
            .collect();
        Error::SubstitutionCycle { cycle }.push(None, Stage::Substitution, errors);
    }
    Ok(())
}

fn apply_document(
    id: &DocId,
    index: &DocumentIndex,
    rendered: &mut BTreeMap<DocId, Value>,
    failed: &mut BTreeSet<DocId>,
    errors: &mut Errors,
) {
    if failed.contains(id) {
        return;
    }
    let Some(doc) = index.get(id) else { return };

    // Take the destination out of the table so sources can be read from it
    // while the destination is mutated.
    let Some(mut data) = rendered.remove(id) else {
        failed.insert(id.clone());
        return;
    };

    for substitution in &doc.metadata.substitutions {
        if let Err(err) = apply_substitution(substitution, &mut data, index, rendered, failed) {
            err.push(Some(&id.key()), Stage::Substitution, errors);
            failed.insert(id.clone());
            return;
        }
    }
    rendered.insert(id.clone(), data);
}

fn apply_substitution(
    substitution: &Substitution,
    data: &mut Value,
    index: &DocumentIndex,
    rendered: &BTreeMap<DocId, Value>,
    failed: &BTreeSet<DocId>,
) -> Result<(), Error> {
    let source_key = substitution.src.key();
    let dest_path_str = substitution.dest.path.clone();

    let failure = |detail: String| Error::SubstitutionFailure {
        detail,
        path: dest_path_str.clone(),
    };

    let src_path: Path = substitution
        .src
        .path
        .parse()
        .map_err(|err| failure(format!("source path: {err}")))?;
    let dest_path: Path = substitution
        .dest
        .path
        .parse()
        .map_err(|err| failure(format!("destination path: {err}")))?;

    let source = index
        .effective(&source_key)
        .ok_or_else(|| failure(format!("source {source_key} is not present in the revision")))?;
    if failed.contains(source) {
        return Err(failure(format!("source {source_key} failed to render")));
    }
    let source_data = rendered
        .get(source)
        .ok_or_else(|| failure(format!("source {source_key} has no rendered data")))?;

    let value = src_path.query(source_data).ok_or_else(|| {
        failure(format!(
            "source {source_key} has no value at {:?}",
            substitution.src.path
        ))
    })?;

    let Some(pattern) = &substitution.dest.pattern else {
        let value = value.clone();
        dest_path
            .set(data, value)
            .ok_or_else(|| failure(format!("destination {dest_path_str:?} is incompatible")))?;
        return Ok(());
    };

    // Pattern injection: the destination must hold a string, whose first
    // pattern match is replaced by the source value's string form.
    let pattern_re = regex::Regex::new(pattern)
        .map_err(|err| failure(format!("pattern {pattern:?}: {err}")))?;

    let target = dest_path
        .query(data)
        .ok_or_else(|| failure(format!("destination {dest_path_str:?} does not exist")))?;
    let Value::String(target) = target else {
        return Err(failure(format!(
            "destination {dest_path_str:?} is not a string"
        )));
    };

    if !pattern_re.is_match(target) {
        return Err(Error::MissingDocumentPattern {
            pattern: pattern.clone(),
            path: dest_path_str,
        });
    }

    let injected = string_form(value);
    let replaced = pattern_re
        .replace(target, regex::NoExpand(&injected))
        .into_owned();
    dest_path.set(data, Value::String(replaced));
    Ok(())
}

// The string form a value takes when injected into a pattern match:
// strings verbatim, everything else in its JSON rendering.
fn string_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
