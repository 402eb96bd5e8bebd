use crate::{
    common::{query, reference, value},
    error::{Error, Result},
    store::{self, Snapshot, Store, WriteOperation},
    write::bulk,
};

use async_trait::async_trait;
use std::{
    collections,
    sync::{
        Mutex, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

type Collections = collections::BTreeMap<String, collections::BTreeMap<String, Entry>>;

#[derive(Clone, Debug)]
struct Entry {
    fields: value::Fields,
    version: u64,
}

/// Settings of a [`MemoryStore`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemoryStoreConfig {
    /// The maximum number of operations per committed batch.
    pub batch_capacity: usize,
    /// Attempts of a read-modify-write before reporting contention.
    pub max_transaction_attempts: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            batch_capacity: bulk::MAX_OPERATIONS_PER_BATCH,
            max_transaction_attempts: store::MAX_TRANSACTION_ATTEMPTS,
        }
    }
}

/// A document store held in process memory.
///
/// Documents are kept ordered by id. Every write bumps a per-document version
/// so read-modify-writes detect concurrent changes and retry. The size of each
/// committed batch is recorded, see [`MemoryStore::committed_batches`].
///
/// ```rust
/// use document_crud::{Client, store::memory::MemoryStore};
///
/// let client = Client::new(MemoryStore::new());
/// let users = client.collection("users");
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
    commits: Mutex<Vec<usize>>,
    config: MemoryStoreConfig,
    next_version: AtomicU64,
}

impl MemoryStore {
    /// An empty store with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty store with the given settings.
    pub fn with_config(config: MemoryStoreConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// The number of operations of every batch committed so far, in commit order.
    pub fn committed_batches(&self) -> Result<Vec<usize>> {
        let commits = self
            .commits
            .lock()
            .map_err(|_| Error::LockPoisoned("commit log read"))?;
        Ok(commits.clone())
    }

    /// The number of documents currently in a collection.
    pub fn len(&self, collection: &str) -> Result<usize> {
        let collections = self.read("len")?;
        Ok(collections
            .get(collection)
            .map_or(0, |documents| documents.len()))
    }

    fn read(
        &self,
        operation: &'static str,
    ) -> Result<std::sync::RwLockReadGuard<'_, Collections>> {
        self.collections
            .read()
            .map_err(|_| Error::LockPoisoned(operation))
    }

    fn write_lock(
        &self,
        operation: &'static str,
    ) -> Result<std::sync::RwLockWriteGuard<'_, Collections>> {
        self.collections
            .write()
            .map_err(|_| Error::LockPoisoned(operation))
    }

    fn version(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::Relaxed)
    }

    fn apply(&self, collections: &mut Collections, operation: WriteOperation) {
        let version = self.version();
        match operation {
            WriteOperation::Set { reference, fields } => {
                collections
                    .entry(reference.collection().to_string())
                    .or_default()
                    .insert(reference.id().to_string(), Entry { fields, version });
            }
            WriteOperation::Merge { reference, fields } => {
                let entry = collections
                    .entry(reference.collection().to_string())
                    .or_default()
                    .entry(reference.id().to_string())
                    .or_insert_with(|| Entry {
                        fields: value::Fields::new(),
                        version,
                    });
                entry.fields.extend(fields);
                entry.version = version;
            }
            WriteOperation::Delete { reference } => {
                if let Some(documents) = collections.get_mut(reference.collection()) {
                    documents.remove(reference.id());
                    if documents.is_empty() {
                        collections.remove(reference.collection());
                    }
                }
            }
        }
    }
}

fn entry<'a>(collections: &'a Collections, reference: &reference::DocumentRef) -> Option<&'a Entry> {
    collections
        .get(reference.collection())
        .and_then(|documents| documents.get(reference.id()))
}

#[async_trait]
impl Store for MemoryStore {
    fn max_batch_operations(&self) -> usize {
        self.config.batch_capacity
    }

    async fn get(&self, reference: &reference::DocumentRef) -> Result<Option<value::Fields>> {
        let collections = self.read("get")?;
        Ok(entry(&collections, reference).map(|entry| entry.fields.clone()))
    }

    async fn write(&self, operation: WriteOperation) -> Result<()> {
        operation.ensure_finite()?;
        let mut collections = self.write_lock("write")?;
        self.apply(&mut collections, operation);
        Ok(())
    }

    async fn document_refs(&self, collection: &str) -> Result<Vec<reference::DocumentRef>> {
        let collections = self.read("document_refs")?;
        let references = collections
            .get(collection)
            .map(|documents| {
                documents
                    .keys()
                    .map(|id| reference::DocumentRef::new(collection, id.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(references)
    }

    async fn query(&self, collection: &str, query: &query::Query) -> Result<Vec<Snapshot>> {
        let snapshots = {
            let collections = self.read("query")?;
            collections
                .get(collection)
                .map(|documents| {
                    documents
                        .iter()
                        .map(|(id, entry)| Snapshot {
                            reference: reference::DocumentRef::new(collection, id.clone()),
                            fields: entry.fields.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default()
        };
        Ok(query.apply(snapshots))
    }

    async fn commit(&self, operations: Vec<WriteOperation>) -> Result<()> {
        if operations.len() > self.config.batch_capacity {
            return Err(Error::BatchCapacityExceeded {
                operations: operations.len(),
                capacity: self.config.batch_capacity,
            });
        }
        operations
            .iter()
            .try_for_each(WriteOperation::ensure_finite)?;
        let count = operations.len();
        {
            let mut collections = self.write_lock("commit")?;
            for operation in operations {
                self.apply(&mut collections, operation);
            }
        }
        self.commits
            .lock()
            .map_err(|_| Error::LockPoisoned("commit log write"))?
            .push(count);
        Ok(())
    }

    async fn transform_field<F>(
        &self,
        reference: &reference::DocumentRef,
        field: &str,
        mut transform: F,
    ) -> Result<value::Value>
    where
        F: FnMut(Option<&value::Value>) -> Result<value::Value> + Send,
    {
        for _ in 0..self.config.max_transaction_attempts {
            let (current, version) = {
                let collections = self.read("transaction read")?;
                let existing = entry(&collections, reference)
                    .ok_or_else(|| Error::DocumentNotFound(reference.to_string()))?;
                (existing.fields.get(field).cloned(), existing.version)
            };
            let next = transform(current.as_ref())?;
            value::ensure_finite(&next)?;
            let mut collections = self.write_lock("transaction write")?;
            let document = collections
                .get_mut(reference.collection())
                .and_then(|documents| documents.get_mut(reference.id()));
            match document {
                Some(entry) if entry.version == version => {
                    entry.fields.insert(field.to_string(), next.clone());
                    entry.version = self.version();
                    return Ok(next);
                }
                Some(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(document = %reference, field, "transaction conflict, retrying");
                }
                None => return Err(Error::DocumentNotFound(reference.to_string())),
            }
        }
        Err(Error::TransactionContention {
            document: reference.to_string(),
            attempts: self.config.max_transaction_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    fn fields(pairs: &[(&str, value::Value)]) -> value::Fields {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_merge_keeps_other_fields() {
        let store = MemoryStore::new();
        let reference = reference::DocumentRef::new("users", "jsmith");
        store
            .write(WriteOperation::Set {
                reference: reference.clone(),
                fields: fields(&[("name", "John".into()), ("age", 40.into())]),
            })
            .await
            .unwrap();
        store
            .write(WriteOperation::Merge {
                reference: reference.clone(),
                fields: fields(&[("age", 41.into())]),
            })
            .await
            .unwrap();
        let actual = store.get(&reference).await.unwrap().unwrap();
        assert_eq!(actual, fields(&[("name", "John".into()), ("age", 41.into())]));
    }

    #[tokio::test]
    async fn test_document_refs_in_id_order() {
        let store = MemoryStore::new();
        for id in ["c", "a", "b"] {
            store
                .write(WriteOperation::Set {
                    reference: reference::DocumentRef::new("users", id),
                    fields: value::Fields::new(),
                })
                .await
                .unwrap();
        }
        let references = store.document_refs("users").await.unwrap();
        let ids: Vec<_> = references.iter().map(|reference| reference.id()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(store.document_refs("groups").await.unwrap().is_empty());
    }

    #[rstest]
    #[case::at_capacity(3, true)]
    #[case::over_capacity(4, false)]
    #[tokio::test]
    async fn test_commit_respects_capacity(#[case] operations: usize, #[case] accepted: bool) {
        let store = MemoryStore::with_config(MemoryStoreConfig {
            batch_capacity: 3,
            ..Default::default()
        });
        let batch = (0..operations)
            .map(|index| WriteOperation::Set {
                reference: reference::DocumentRef::new("users", index.to_string()),
                fields: value::Fields::new(),
            })
            .collect();
        let result = store.commit(batch).await;
        assert_eq!(result.is_ok(), accepted);
        let expected = if accepted { operations } else { 0 };
        assert_eq!(store.len("users").unwrap(), expected);
    }

    #[tokio::test]
    async fn test_non_finite_numbers_are_not_stored() {
        let store = MemoryStore::new();
        let reference = reference::DocumentRef::new("users", "jsmith");
        let write = store
            .write(WriteOperation::Set {
                reference: reference.clone(),
                fields: fields(&[("score", f64::NAN.into())]),
            })
            .await;
        assert!(matches!(write, Err(Error::UnsupportedValue(_))));
        let commit = store
            .commit(vec![
                WriteOperation::Set {
                    reference: reference.clone(),
                    fields: fields(&[("name", "John".into())]),
                },
                WriteOperation::Merge {
                    reference: reference.clone(),
                    fields: fields(&[("score", f64::INFINITY.into())]),
                },
            ])
            .await;
        assert!(matches!(commit, Err(Error::UnsupportedValue(_))));
        assert_eq!(store.get(&reference).await.unwrap(), None);
        assert!(store.committed_batches().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transform_field_on_missing_document() {
        let store = MemoryStore::new();
        let reference = reference::DocumentRef::new("users", "ghost");
        let result = store
            .transform_field(&reference, "count", |_| Ok(value::Value::Integer(1)))
            .await;
        assert!(matches!(result, Err(Error::DocumentNotFound(_))));
    }

    #[tokio::test]
    async fn test_transform_field_reports_contention() {
        let store = MemoryStore::with_config(MemoryStoreConfig {
            max_transaction_attempts: 2,
            ..Default::default()
        });
        let reference = reference::DocumentRef::new("users", "busy");
        store
            .write(WriteOperation::Set {
                reference: reference.clone(),
                fields: value::Fields::new(),
            })
            .await
            .unwrap();
        // every attempt races with a write bumping the version
        let result = store
            .transform_field(&reference, "count", |_| {
                let mut collections = store.collections.write().unwrap();
                let version = store.version();
                if let Some(entry) = collections
                    .get_mut("users")
                    .and_then(|documents| documents.get_mut("busy"))
                {
                    entry.version = version;
                }
                Ok(value::Value::Integer(1))
            })
            .await;
        assert!(matches!(
            result,
            Err(Error::TransactionContention { attempts: 2, .. })
        ));
    }
}
