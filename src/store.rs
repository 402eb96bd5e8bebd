//! The seam between this crate and the underlying document database.
//!
//! Every network round trip goes through the [`Store`] trait:
//! - [`memory::MemoryStore`] keeps documents in process
//! - [`dynamodb::DynamoStore`] persists them in an Amazon DynamoDB table

/// Amazon DynamoDB backed store.
pub mod dynamodb;

/// In-process store.
pub mod memory;

use crate::{
    common::{query, reference, value},
    error::Result,
    write::bulk,
};

use async_trait::async_trait;

/// Number of times a read-modify-write is attempted before giving up.
pub const MAX_TRANSACTION_ATTEMPTS: usize = 5;

/// A document read from the store.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// Where the document lives.
    pub reference: reference::DocumentRef,
    /// The document's fields.
    pub fields: value::Fields,
}

/// A single pending write.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOperation {
    /// Replace the whole document.
    Set {
        /// The target document.
        reference: reference::DocumentRef,
        /// The new content.
        fields: value::Fields,
    },
    /// Overwrite the named top-level fields, leaving the others untouched.
    Merge {
        /// The target document.
        reference: reference::DocumentRef,
        /// The fields to overwrite.
        fields: value::Fields,
    },
    /// Remove the document.
    Delete {
        /// The target document.
        reference: reference::DocumentRef,
    },
}

impl WriteOperation {
    /// The document this operation targets.
    pub fn reference(&self) -> &reference::DocumentRef {
        match self {
            Self::Set { reference, .. }
            | Self::Merge { reference, .. }
            | Self::Delete { reference } => reference,
        }
    }

    /// Reject numbers no store can persist before anything is written.
    pub(crate) fn ensure_finite(&self) -> Result<()> {
        match self {
            Self::Set { fields, .. } | Self::Merge { fields, .. } => {
                fields.values().try_for_each(value::ensure_finite)
            }
            Self::Delete { .. } => Ok(()),
        }
    }
}

/// A document database this crate can drive.
///
/// Implementations own connection management, consistency and retries of
/// transient failures; errors are returned to callers unmodified.
#[async_trait]
pub trait Store: Send + Sync {
    /// The maximum number of operations one [`Store::commit`] accepts.
    fn max_batch_operations(&self) -> usize {
        bulk::MAX_OPERATIONS_PER_BATCH
    }

    /// Read a document, `None` when it does not exist.
    async fn get(&self, reference: &reference::DocumentRef) -> Result<Option<value::Fields>>;

    /// Apply one write immediately.
    async fn write(&self, operation: WriteOperation) -> Result<()>;

    /// Enumerate the documents currently in a collection, ordered by id.
    async fn document_refs(&self, collection: &str) -> Result<Vec<reference::DocumentRef>>;

    /// Read the documents of a collection satisfying a query.
    async fn query(&self, collection: &str, query: &query::Query) -> Result<Vec<Snapshot>>;

    /// Apply every operation atomically: all of them or none.
    async fn commit(&self, operations: Vec<WriteOperation>) -> Result<()>;

    /// Serializable read-modify-write of one field.
    ///
    /// `transform` receives the current value (`None` when the field is absent)
    /// and returns the value to write. When a concurrent writer changes the
    /// field in between, the whole closure runs again on the fresh value. The
    /// written value is returned.
    async fn transform_field<F>(
        &self,
        reference: &reference::DocumentRef,
        field: &str,
        transform: F,
    ) -> Result<value::Value>
    where
        F: FnMut(Option<&value::Value>) -> Result<value::Value> + Send;
}
