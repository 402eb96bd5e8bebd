#![deny(missing_docs)]
#![deny(warnings)]

//! # Document CRUD
//!
//! A type-safe, ergonomic interface for documents, typed fields and collections
//! stored in a document database.
//!
//! ## Overview
//!
//! This library wraps a document store behind a small, strongly typed API that:
//! - Creates, retrieves, checks and deletes whole documents through serde
//! - Reads and writes single fields with typed accessors
//! - Increments, decrements and appends inside transactions, so concurrent callers never lose updates
//! - Groups writes into explicit batches committed atomically
//! - Rewrites or deletes whole collections with the fewest batches the store allows
//!
//! ## Quick Example
//!
//! ```no_run
//! use document_crud::{Client, Value, store::memory::MemoryStore};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new(MemoryStore::new());
//! let user = client.document("users", "jsmith");
//! user.create(&json!({"name": "John", "visits": 0})).await?;
//!
//! // transactional read-modify-write
//! let visits = user.number("visits").increment().await?;
//! user.array("tags").append(vec![Value::from("admin")]).await?;
//!
//! // atomic batch across documents
//! let mut batch = client.batch();
//! user.string("name").update_in(&mut batch, "Johnny");
//! client.document("users", "ghost").delete_in(&mut batch);
//! batch.commit().await?;
//!
//! // bulk write over the whole collection
//! client.collection("users").set_for_all("active", true).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`mod@common`] - Values, references and queries
//! - [`mod@document`] - Document handles and typed field accessors
//! - [`mod@collection`] - Collection handles, queries and bulk writes
//! - [`mod@write`] - Write batches and batch sizing
//! - [`mod@store`] - The store seam, with in-memory and DynamoDB backends
//! - [`mod@error`] - The error type

/// Collection handles.
pub mod collection;

/// Dynamic values, document references and queries.
pub mod common;

/// Document handles and typed field accessors.
pub mod document;

/// Error type shared by every operation.
pub mod error;

/// Document stores this crate can drive.
pub mod store;

/// Write batches and bulk writes.
pub mod write;

pub use collection::Collection;
pub use common::{reference::DocumentRef, value::Value};
pub use document::Document;
pub use error::{Error, Result};
pub use write::batch::WriteBatch;

/// Entry point binding handles to one store.
///
/// Handles borrow the client's store, so a client shared between tasks is
/// usually wrapped in an [`std::sync::Arc`].
///
/// ```rust
/// use document_crud::{Client, store::memory::MemoryStore};
///
/// let client = Client::new(MemoryStore::new());
/// let users = client.collection("/users/");
/// assert_eq!(users.path(), "users");
/// assert_eq!(client.document("users", "jsmith").reference().to_string(), "users/jsmith");
/// ```
#[derive(Debug, Default)]
pub struct Client<S> {
    store: S,
}

impl<S: store::Store> Client<S> {
    /// A client over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Handle on the collection at `path`.
    pub fn collection(&self, path: &str) -> Collection<'_, S> {
        Collection::new(&self.store, path)
    }

    /// Handle on the document `id` of the collection at `path`.
    pub fn document(&self, path: &str, id: impl Into<String>) -> Document<'_, S> {
        Document::new(&self.store, DocumentRef::new(path, id))
    }

    /// Handle on a new document with a random id in the collection at `path`.
    pub fn document_with_generated_id(&self, path: &str) -> Document<'_, S> {
        Document::new(&self.store, DocumentRef::generated(path))
    }

    /// An empty batch committed against this client's store.
    pub fn batch(&self) -> WriteBatch<'_, S> {
        WriteBatch::new(&self.store)
    }
}
