use crate::Document;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// RevisionId numbers an immutable revision. Revision 0 is the
/// distinguished empty revision.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    JsonSchema,
)]
pub struct RevisionId(pub u64);

impl RevisionId {
    pub const EMPTY: RevisionId = RevisionId(0);
}

impl std::fmt::Display for RevisionId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Revision is an immutable snapshot of every document across all buckets.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
pub struct Revision {
    pub id: RevisionId,
    pub documents: Vec<Document>,
}

impl Revision {
    pub fn new(id: RevisionId, documents: Vec<Document>) -> Revision {
        Revision { id, documents }
    }

    pub fn empty() -> Revision {
        Revision {
            id: RevisionId::EMPTY,
            documents: Vec::new(),
        }
    }
}

/// DiffEntry is the status of one bucket in a revision diff.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DiffEntry {
    Created,
    Deleted,
    Modified,
    Unmodified,
}

/// Diff the buckets of `rhs` against those of `lhs`. A bucket present only
/// in `rhs` was created; present only in `lhs`, deleted; present in both
/// with identical documents, unmodified; otherwise modified. Documents not
/// yet assigned a bucket group under the empty bucket name.
pub fn diff(lhs: &Revision, rhs: &Revision) -> BTreeMap<String, DiffEntry> {
    let lhs = buckets_of(lhs);
    let rhs = buckets_of(rhs);

    let mut out = BTreeMap::new();

    for (bucket, lhs_documents) in &lhs {
        let entry = match rhs.get(bucket) {
            None => DiffEntry::Deleted,
            Some(rhs_documents) if lhs_documents == rhs_documents => DiffEntry::Unmodified,
            Some(_) => DiffEntry::Modified,
        };
        out.insert(bucket.clone(), entry);
    }
    for bucket in rhs.keys() {
        if !lhs.contains_key(bucket) {
            out.insert(bucket.clone(), DiffEntry::Created);
        }
    }
    out
}

// Group documents by bucket, ordered by (schema, name, layer) so that
// bucket comparison is insensitive to snapshot ordering.
fn buckets_of(revision: &Revision) -> BTreeMap<String, Vec<&Document>> {
    let mut buckets: BTreeMap<String, Vec<&Document>> = BTreeMap::new();

    for doc in &revision.documents {
        buckets
            .entry(doc.bucket().unwrap_or_default().to_string())
            .or_default()
            .push(doc);
    }
    for documents in buckets.values_mut() {
        documents.sort_by(|lhs, rhs| {
            (&lhs.schema, &lhs.metadata.name, lhs.layer())
                .cmp(&(&rhs.schema, &rhs.metadata.name, rhs.layer()))
        });
    }
    buckets
}
