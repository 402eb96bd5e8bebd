use crate::{
    error::{Error, Result},
    store::{Store, WriteOperation},
};

/// A group of writes committed atomically.
///
/// A batch is filled through the `*_in` variants of document and field writes,
/// then either committed or cancelled. Both consume it, so a batch is never
/// reused and a batch that was not started cannot be committed.
///
/// ```rust,no_run
/// use document_crud::{Client, store::memory::MemoryStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new(MemoryStore::new());
/// let mut batch = client.batch();
/// client.document("users", "jsmith").string("name").update_in(&mut batch, "John");
/// client.document("users", "ghost").delete_in(&mut batch);
/// batch.commit().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct WriteBatch<'a, S> {
    operations: Vec<WriteOperation>,
    store: &'a S,
}

impl<'a, S: Store> WriteBatch<'a, S> {
    /// An empty batch bound to a store.
    pub fn new(store: &'a S) -> Self {
        Self {
            operations: Vec::new(),
            store,
        }
    }

    /// Append an operation.
    pub fn push(&mut self, operation: WriteOperation) {
        self.operations.push(operation);
    }

    /// The pending operations, in the order they were added.
    pub fn operations(&self) -> &[WriteOperation] {
        &self.operations
    }

    /// The number of pending operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether no operation is pending.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Whether the batch reached the store's per-batch ceiling.
    pub fn is_full(&self) -> bool {
        self.operations.len() >= self.store.max_batch_operations()
    }

    /// Apply every pending operation as one atomic unit.
    ///
    /// An empty batch commits nothing. A batch above the store's ceiling is
    /// rejected without contacting the store.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "document_crud.commit",
            skip(self),
            fields(operations = self.operations.len()),
            err
        )
    )]
    pub async fn commit(self) -> Result<()> {
        if self.operations.is_empty() {
            return Ok(());
        }
        let capacity = self.store.max_batch_operations();
        if self.operations.len() > capacity {
            return Err(Error::BatchCapacityExceeded {
                operations: self.operations.len(),
                capacity,
            });
        }
        self.store.commit(self.operations).await
    }

    /// Discard every pending operation without touching the store.
    pub fn cancel(self) {
        #[cfg(feature = "tracing")]
        tracing::debug!(operations = self.operations.len(), "write batch cancelled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::{reference::DocumentRef, value},
        store::memory::{MemoryStore, MemoryStoreConfig},
    };

    fn set(id: &str) -> WriteOperation {
        WriteOperation::Set {
            reference: DocumentRef::new("users", id),
            fields: value::Fields::new(),
        }
    }

    #[tokio::test]
    async fn test_commit_applies_all_operations_at_once() {
        let store = MemoryStore::new();
        store.write(set("gone")).await.unwrap();
        let mut batch = WriteBatch::new(&store);
        batch.push(set("a"));
        batch.push(set("b"));
        batch.push(WriteOperation::Delete {
            reference: DocumentRef::new("users", "gone"),
        });
        assert_eq!(batch.len(), 3);
        batch.commit().await.unwrap();
        assert_eq!(store.committed_batches().unwrap(), vec![3]);
        let ids: Vec<_> = store
            .document_refs("users")
            .await
            .unwrap()
            .into_iter()
            .map(|reference| reference.id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_cancel_discards_operations() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new(&store);
        batch.push(set("a"));
        batch.cancel();
        assert_eq!(store.len("users").unwrap(), 0);
        assert!(store.committed_batches().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_commits_nothing() {
        let store = MemoryStore::new();
        WriteBatch::new(&store).commit().await.unwrap();
        assert!(store.committed_batches().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_batch_is_rejected() {
        let store = MemoryStore::with_config(MemoryStoreConfig {
            batch_capacity: 2,
            ..Default::default()
        });
        let mut batch = WriteBatch::new(&store);
        for id in ["a", "b"] {
            batch.push(set(id));
        }
        assert!(batch.is_full());
        batch.push(set("c"));
        let result = batch.commit().await;
        assert!(matches!(
            result,
            Err(Error::BatchCapacityExceeded {
                operations: 3,
                capacity: 2
            })
        ));
        assert_eq!(store.len("users").unwrap(), 0);
    }
}
