//! Collections of documents.
//!
//! A [`Collection`] addresses the documents stored under one path. It hands
//! out document handles, reads the collection through queries and rewrites
//! every document at once with as few batches as possible.

use crate::{
    common::{query, reference, value},
    document::Document,
    error::Result,
    store::{Snapshot, Store},
    write::bulk::{BulkAction, BulkWriter},
};

use serde::de::DeserializeOwned;

/// Handle on the collection at one path.
///
/// ```rust,no_run
/// use document_crud::{Client, common::query::{Condition, Query}, store::memory::MemoryStore};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new(MemoryStore::new());
/// let users = client.collection("users");
/// users.document("jsmith").create(&json!({"name": "John", "age": 42})).await?;
/// let adults: Vec<serde_json::Value> = users
///     .retrieve_with(&Query::new().filter("age", Condition::GreaterThanOrEqual(18.into())))
///     .await?;
/// users.set_for_all("active", true).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Collection<'a, S> {
    path: String,
    store: &'a S,
}

impl<'a, S: Store> Collection<'a, S> {
    /// A handle on the collection at `path`; surrounding `/` are ignored.
    pub fn new(store: &'a S, path: &str) -> Self {
        Self {
            path: reference::normalize_path(path),
            store,
        }
    }

    /// The normalized collection path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Handle on the document `id` of this collection.
    pub fn document(&self, id: impl Into<String>) -> Document<'a, S> {
        Document::new(self.store, reference::DocumentRef::new(&self.path, id))
    }

    /// Handle on a new document with a random id.
    ///
    /// The id is drawn once; every call on the returned handle targets the
    /// same document.
    pub fn document_with_generated_id(&self) -> Document<'a, S> {
        Document::new(self.store, reference::DocumentRef::generated(&self.path))
    }

    /// References to every document currently in the collection, ordered by id.
    pub async fn document_refs(&self) -> Result<Vec<reference::DocumentRef>> {
        self.store.document_refs(&self.path).await
    }

    /// The documents satisfying `query`, with their references.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "document_crud.collection.snapshots",
            skip_all,
            fields(collection = %self.path),
            err
        )
    )]
    pub async fn snapshots(&self, query: &query::Query) -> Result<Vec<Snapshot>> {
        self.store.query(&self.path, query).await
    }

    /// Decode every document of the collection.
    pub async fn retrieve<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.retrieve_with(&query::Query::new()).await
    }

    /// Decode the documents satisfying `query`, in the query's order.
    ///
    /// No match yields an empty vector.
    pub async fn retrieve_with<T: DeserializeOwned>(&self, query: &query::Query) -> Result<Vec<T>> {
        self.snapshots(query)
            .await?
            .into_iter()
            .map(|snapshot| value::from_fields(snapshot.fields))
            .collect()
    }

    /// Merge-write `field` with `value` on every document, returning how many
    /// documents were written.
    ///
    /// Batches are filled to the store's ceiling and committed in order. On a
    /// failed commit, the batches committed before it stay applied.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "document_crud.collection.set_for_all",
            skip_all,
            fields(collection = %self.path),
            err
        )
    )]
    pub async fn set_for_all(
        &self,
        field: impl Into<String>,
        value: impl Into<value::Value>,
    ) -> Result<usize> {
        let action = BulkAction::Set {
            field: field.into(),
            value: value.into(),
        };
        BulkWriter::new(self.store).run(&self.path, &action).await
    }

    /// Delete every document, returning how many were deleted.
    ///
    /// Same batching and failure behavior as [`Collection::set_for_all`].
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "document_crud.collection.delete_all",
            skip_all,
            fields(collection = %self.path),
            err
        )
    )]
    pub async fn delete_all(&self) -> Result<usize> {
        BulkWriter::new(self.store)
            .run(&self.path, &BulkAction::Delete)
            .await
    }
}
