use crate::{
    common::{reference, value},
    error::Result,
    store::{Store, WriteOperation},
    write::batch::WriteBatch,
};

/// The per-batch operation ceiling of the reference store.
pub const MAX_OPERATIONS_PER_BATCH: usize = 500;

/// The number of batches of [`MAX_OPERATIONS_PER_BATCH`] needed for `operation_count` operations.
///
/// ```rust
/// use document_crud::write::bulk;
///
/// assert_eq!(bulk::required_batches(0), 0);
/// assert_eq!(bulk::required_batches(500), 1);
/// assert_eq!(bulk::required_batches(501), 2);
/// ```
pub fn required_batches(operation_count: usize) -> usize {
    required_batches_with_capacity(operation_count, MAX_OPERATIONS_PER_BATCH)
}

/// The number of batches of `capacity` operations needed for `operation_count` operations.
pub fn required_batches_with_capacity(operation_count: usize, capacity: usize) -> usize {
    operation_count.div_ceil(capacity.max(1))
}

/// The write applied to every document of a collection.
#[derive(Clone, Debug, PartialEq)]
pub enum BulkAction {
    /// Merge-write one field, leaving the other fields untouched.
    Set {
        /// The field to write.
        field: String,
        /// The value every document receives.
        value: value::Value,
    },
    /// Delete the document.
    Delete,
}

impl BulkAction {
    fn operation(&self, reference: reference::DocumentRef) -> WriteOperation {
        match self {
            Self::Set { field, value } => WriteOperation::Merge {
                reference,
                fields: value::Fields::from([(field.clone(), value.clone())]),
            },
            Self::Delete => WriteOperation::Delete { reference },
        }
    }
}

/// Applies one action to every document of a collection with the fewest batches.
///
/// Batches are committed in enumeration order. A failing commit stops the run
/// and is returned; batches committed before it stay applied. Merge-writes and
/// deletes are idempotent, so running the action again completes the job.
#[derive(Debug)]
pub struct BulkWriter<'a, S> {
    store: &'a S,
}

impl<'a, S: Store> BulkWriter<'a, S> {
    /// A writer issuing batches against a store.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Spread one operation per reference over batches filled to capacity in order.
    pub fn partition(
        &self,
        references: Vec<reference::DocumentRef>,
        action: &BulkAction,
    ) -> Vec<WriteBatch<'a, S>> {
        let capacity = self.store.max_batch_operations().max(1);
        let batch_count = required_batches_with_capacity(references.len(), capacity);
        let mut batches: Vec<_> = (0..batch_count)
            .map(|_| WriteBatch::new(self.store))
            .collect();
        let mut current_batch = 0;
        let mut current_batch_operations = 0;
        for reference in references {
            if current_batch_operations == capacity {
                current_batch += 1;
                current_batch_operations = 0;
            }
            current_batch_operations += 1;
            batches[current_batch].push(action.operation(reference));
        }
        batches
    }

    /// Apply `action` to every document currently in `collection`.
    ///
    /// Returns the number of documents written.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "document_crud.bulk_write", skip(self, action), err)
    )]
    pub async fn run(&self, collection: &str, action: &BulkAction) -> Result<usize> {
        let references = self.store.document_refs(collection).await?;
        let document_count = references.len();
        let batches = self.partition(references, action);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            documents = document_count,
            batches = batches.len(),
            "bulk write planned"
        );
        for batch in batches {
            #[cfg(feature = "tracing")]
            tracing::debug!(operations = batch.len(), "committing batch");
            batch.commit().await?;
        }
        Ok(document_count)
    }
}
