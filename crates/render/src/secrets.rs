use crate::errors::{Error, Errors, Stage};
use crate::index::{DocId, DocumentIndex};
use crate::registry::SchemaRegistry;
use crate::{Cancel, EngineError};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

/// SecretStore is the seam onto the external secret service. Documents
/// with `storagePolicy: encrypted` carry an opaque reference token in
/// place of `data`; the store resolves tokens to payload bytes.
pub trait SecretStore {
    fn fetch(&self, reference: &str) -> Result<bytes::Bytes, SecretError>;
}

#[derive(thiserror::Error, Debug)]
pub enum SecretError {
    /// The reference does not exist. Fatal for the owning document.
    #[error("secret reference {reference:?} was not found")]
    NotFound { reference: String },
    /// The store could not be reached. The engine performs no retries;
    /// the edge may retry the whole render.
    #[error("transient failure fetching secret {reference:?}: {detail}")]
    Transient { reference: String, detail: String },
}

/// SecretCache is the per-render read-through cache over a SecretStore:
/// exactly one fetch per unique reference token, with entries immutable
/// once populated. Its lifetime is bounded by the render call.
pub struct SecretCache<'a> {
    store: &'a dyn SecretStore,
    cache: RefCell<BTreeMap<String, String>>,
}

impl<'a> SecretCache<'a> {
    pub fn new(store: &'a dyn SecretStore) -> SecretCache<'a> {
        SecretCache {
            store,
            cache: RefCell::new(BTreeMap::new()),
        }
    }

    /// Resolve a reference token to its cleartext, fetching on first use.
    pub fn resolve(&self, reference: &str) -> Result<String, SecretError> {
        if let Some(hit) = self.cache.borrow().get(reference) {
            return Ok(hit.clone());
        }

        tracing::debug!(%reference, "dereferencing secret");
        let payload = self.store.fetch(reference)?;
        let cleartext = String::from_utf8_lossy(&payload).into_owned();

        self.cache
            .borrow_mut()
            .insert(reference.to_string(), cleartext.clone());
        Ok(cleartext)
    }
}

/// Dereference the secrets a render needs: every encrypted document bound
/// for output, plus every encrypted document some substitution reads from.
/// Abstract encrypted documents nothing reads are never fetched.
///
/// Cleartext replaces the reference token as the document's rendered data,
/// and is then validated against any registered schema (advisory, like any
/// other registered-schema mismatch).
pub fn walk_secrets(
    index: &DocumentIndex,
    suppressed: &BTreeSet<DocId>,
    rendered: &mut BTreeMap<DocId, Value>,
    failed: &mut BTreeSet<DocId>,
    registry: &SchemaRegistry,
    cache: &SecretCache,
    cancel: &Cancel,
    errors: &mut Errors,
) -> Result<(), EngineError> {
    let mut needed: BTreeSet<DocId> = BTreeSet::new();

    for (id, doc) in index.iter() {
        if failed.contains(id) {
            continue;
        }
        if doc.is_encrypted() && !doc.is_abstract() && !suppressed.contains(id) {
            needed.insert(id.clone());
        }
        if doc.is_abstract() {
            continue;
        }
        for substitution in &doc.metadata.substitutions {
            let Some(source) = index.effective(&substitution.src.key()) else {
                continue;
            };
            let encrypted = index.get(source).map(|d| d.is_encrypted()).unwrap_or(false);
            if encrypted && !failed.contains(source) {
                needed.insert(source.clone());
            }
        }
    }

    for id in needed {
        cancel.check()?;

        let key = id.key();
        let Some(reference) = rendered.get(&id).and_then(Value::as_str) else {
            Error::InvalidSecretReference {
                detail: format!("{id} data is not a reference token string"),
            }
            .push(Some(&key), Stage::Secrets, errors);
            failed.insert(id);
            continue;
        };

        match cache.resolve(reference) {
            Ok(cleartext) => {
                let cleartext = Value::String(cleartext);
                if let Some(validator) = registry.get(&id.schema) {
                    for err in validator.iter_errors(&cleartext).take(5) {
                        Error::SchemaValidationFailed {
                            detail: err.to_string(),
                            path: err.instance_path.to_string(),
                        }
                        .push(Some(&key), Stage::Schema, errors);
                    }
                }
                rendered.insert(id, cleartext);
            }
            Err(SecretError::NotFound { reference }) => {
                Error::SecretNotFound { reference }.push(Some(&key), Stage::Secrets, errors);
                failed.insert(id);
            }
            Err(transient) => return Err(EngineError::Secret(transient)),
        }
    }
    Ok(())
}

/// StaticSecrets is an in-memory SecretStore over fixed reference/payload
/// pairs. It backs tests and offline validation runs, where rendering may
/// not reach a live secret service.
#[derive(Default)]
pub struct StaticSecrets(BTreeMap<String, bytes::Bytes>);

impl StaticSecrets {
    pub fn new<I, K, V>(entries: I) -> StaticSecrets
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<bytes::Bytes>,
    {
        StaticSecrets(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl SecretStore for StaticSecrets {
    fn fetch(&self, reference: &str) -> Result<bytes::Bytes, SecretError> {
        self.0
            .get(reference)
            .cloned()
            .ok_or_else(|| SecretError::NotFound {
                reference: reference.to_string(),
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStore(AtomicUsize);

    impl SecretStore for CountingStore {
        fn fetch(&self, reference: &str) -> Result<bytes::Bytes, SecretError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(bytes::Bytes::from(format!("payload-for-{reference}")))
        }
    }

    #[test]
    fn test_one_fetch_per_reference() {
        let store = CountingStore(AtomicUsize::new(0));
        let cache = SecretCache::new(&store);

        assert_eq!(cache.resolve("ref-1").unwrap(), "payload-for-ref-1");
        assert_eq!(cache.resolve("ref-1").unwrap(), "payload-for-ref-1");
        assert_eq!(cache.resolve("ref-2").unwrap(), "payload-for-ref-2");
        assert_eq!(store.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_static_secrets_not_found() {
        let store = StaticSecrets::new([("known", "value")]);
        store.fetch("known").unwrap();

        match store.fetch("unknown") {
            Err(SecretError::NotFound { reference }) => assert_eq!(reference, "unknown"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
