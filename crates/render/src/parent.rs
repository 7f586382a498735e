use crate::errors::{Error, Errors, Stage};
use crate::index::{DocId, DocumentIndex};
use crate::policy::LayerOrder;
use models::selector_matches;
use std::collections::{BTreeMap, BTreeSet};

/// Select at most one parent for every document carrying a parentSelector.
/// Candidates are the documents of the adjacent higher layer whose labels
/// include every selector pair. The resulting relation is a forest: layer
/// index strictly decreases toward each root.
pub fn walk_parents(
    index: &DocumentIndex,
    layer_order: &LayerOrder,
    failed: &mut BTreeSet<DocId>,
    errors: &mut Errors,
) -> BTreeMap<DocId, DocId> {
    let mut parents = BTreeMap::new();

    for (id, doc) in index.iter() {
        let Some(layering) = &doc.metadata.layering_definition else {
            continue;
        };
        if layering.parent_selector.is_empty() {
            continue;
        }
        // Documents at the top layer are roots; their selector is ignored,
        // as are documents of a layer the validator already flagged.
        let Some(parent_layer) = layer_order.parent_layer_of(&layering.layer) else {
            continue;
        };

        let candidates: Vec<&DocId> = index
            .iter()
            .filter(|(_, candidate)| candidate.layer() == Some(parent_layer))
            .filter(|(_, candidate)| {
                selector_matches(&layering.parent_selector, &candidate.metadata.labels)
            })
            .map(|(candidate_id, _)| candidate_id)
            .collect();

        match candidates.as_slice() {
            [] => {
                Error::MissingParent {
                    parent_layer: parent_layer.to_string(),
                    selector: format!("{:?}", layering.parent_selector),
                }
                .push(Some(&id.key()), Stage::Layering, errors);
                failed.insert(id.clone());
            }
            [parent] => {
                parents.insert(id.clone(), (*parent).clone());
            }
            many => {
                Error::IndeterminateDocumentParent {
                    parent_layer: parent_layer.to_string(),
                    count: many.len(),
                }
                .push(Some(&id.key()), Stage::Layering, errors);
            }
        }
    }

    parents
}
