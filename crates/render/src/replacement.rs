use crate::errors::{Error, Errors, Stage};
use crate::index::{DocId, DocumentIndex};
use std::collections::{BTreeMap, BTreeSet};

/// Enforce replacement semantics over the selected parent relation, and
/// record the re-routing table: a replaced parent is suppressed from
/// output, while lookups of its `(schema, name)` resolve to the
/// replacement document instead.
///
/// Returns the set of suppressed (replaced) documents.
pub fn walk_replacements(
    index: &mut DocumentIndex,
    parents: &BTreeMap<DocId, DocId>,
    errors: &mut Errors,
) -> BTreeSet<DocId> {
    let mut suppressed = BTreeSet::new();

    let replacement_ids: Vec<DocId> = index
        .iter()
        .filter(|(_, doc)| doc.metadata.replacement)
        .map(|(id, _)| id.clone())
        .collect();

    for id in replacement_ids {
        let Some(parent) = parents.get(&id) else {
            Error::InvalidReplacement {
                detail: format!("{id} selects no parent document"),
            }
            .push(Some(&id.key()), Stage::Replacement, errors);
            continue;
        };

        // The parent must carry the identical (schema, name) in another
        // layer; anything else is not a replacement but a collision.
        if parent.key() != id.key() || parent.layer == id.layer {
            Error::InvalidReplacement {
                detail: format!(
                    "{id} must replace a same-named parent of another layer, not {parent}"
                ),
            }
            .push(Some(&id.key()), Stage::Replacement, errors);
            continue;
        }

        // A replacement is never itself replaced.
        let parent_doc = index.get(parent);
        if parent_doc.map(|d| d.metadata.replacement).unwrap_or(false) {
            Error::SingletonReplacement { key: id.key() }.push(
                Some(&id.key()),
                Stage::Replacement,
                errors,
            );
            continue;
        }

        suppressed.insert(parent.clone());
        index.record_replacement(id.key(), id.clone());
    }

    suppressed
}
