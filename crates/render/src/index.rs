use crate::errors::{Error, Errors, Stage};
use models::{Document, DocumentKey, SchemaRef};
use std::collections::BTreeMap;

/// DocId uniquely identifies a document within a revision. It extends
/// DocumentKey with the declared layer, because a replacement pair shares
/// its `(schema, name)` key while occupying two distinct layers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocId {
    pub schema: SchemaRef,
    pub name: String,
    pub layer: Option<String>,
}

impl DocId {
    pub fn of(doc: &Document) -> DocId {
        DocId {
            schema: doc.schema.clone(),
            name: doc.metadata.name.clone(),
            layer: doc.layer().map(str::to_string),
        }
    }

    pub fn key(&self) -> DocumentKey {
        DocumentKey {
            schema: self.schema.clone(),
            name: self.name.clone(),
        }
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.layer {
            Some(layer) => write!(f, "{}/{} ({layer})", self.schema, self.name),
            None => write!(f, "{}/{}", self.schema, self.name),
        }
    }
}

/// DocumentIndex is the adjacency backbone of a render: every normal
/// (non-control) document keyed by DocId, plus the by-key lookup through
/// which substitution sources and replacement re-routing resolve.
pub struct DocumentIndex<'a> {
    documents: BTreeMap<DocId, &'a Document>,
    by_key: BTreeMap<DocumentKey, Vec<DocId>>,
    // Replaced key -> the DocId of its replacement. Populated by the
    // replacement resolver after parent selection.
    replacements: BTreeMap<DocumentKey, DocId>,
}

impl<'a> DocumentIndex<'a> {
    /// Index `documents`, recording duplicate identities. A `(schema, name)`
    /// pair may recur only as a replacement pair: two documents in distinct
    /// layers, at least one marked as a replacement. Whether that pair is
    /// coherent (parenthood, chains) is the replacement resolver's check.
    pub fn build(documents: &[&'a Document], errors: &mut Errors) -> DocumentIndex<'a> {
        let mut index = DocumentIndex {
            documents: BTreeMap::new(),
            by_key: BTreeMap::new(),
            replacements: BTreeMap::new(),
        };

        for &doc in documents {
            let id = DocId::of(doc);
            index.by_key.entry(id.key()).or_default().push(id.clone());

            if index.documents.insert(id.clone(), doc).is_some() {
                Error::DuplicateDocument {
                    key: id.key(),
                    count: 2,
                }
                .push(Some(&id.key()), Stage::Schema, errors);
            }
        }

        for (key, ids) in &index.by_key {
            if ids.len() < 2 {
                continue;
            }
            // An exact identity collision was already reported above.
            if ids.len() == 2 && ids[0] == ids[1] {
                continue;
            }
            let replacement_count = ids
                .iter()
                .filter(|id| index.documents[*id].metadata.replacement)
                .count();

            if ids.len() > 2 || replacement_count == 0 {
                Error::DuplicateDocument {
                    key: key.clone(),
                    count: ids.len(),
                }
                .push(Some(key), Stage::Schema, errors);
            }
        }

        index
    }

    pub fn get(&self, id: &DocId) -> Option<&'a Document> {
        self.documents.get(id).copied()
    }

    /// Iterate all indexed documents in `(schema, name, layer)` order.
    pub fn iter(&self) -> impl Iterator<Item = (&DocId, &'a Document)> + '_ {
        self.documents.iter().map(|(id, doc)| (id, *doc))
    }

    pub fn ids(&self) -> impl Iterator<Item = &DocId> + '_ {
        self.documents.keys()
    }

    pub fn record_replacement(&mut self, replaced: DocumentKey, replacement: DocId) {
        self.replacements.insert(replaced, replacement);
    }

    pub fn replacement_of(&self, key: &DocumentKey) -> Option<&DocId> {
        self.replacements.get(key)
    }

    /// Resolve `key` to the document which effectively carries it: the
    /// replacement document where one exists, and the sole holder of the
    /// key otherwise.
    pub fn effective(&self, key: &DocumentKey) -> Option<&DocId> {
        if let Some(replacement) = self.replacements.get(key) {
            return Some(replacement);
        }
        match self.by_key.get(key)?.as_slice() {
            [sole] => Some(sole),
            // An unresolved replacement pair; prefer the marked replacement
            // so lookups stay deterministic.
            ids => ids
                .iter()
                .find(|id| self.documents[*id].metadata.replacement),
        }
    }
}
