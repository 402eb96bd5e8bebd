//! Documents and their typed fields.
//!
//! A [`Document`] addresses one document of a collection. It creates, reads,
//! checks and deletes the document, and hands out field accessors bound to one
//! named field:
//! - [`field::Field`] for untyped values
//! - [`scalar::StringField`] and [`scalar::BooleanField`]
//! - [`number::NumberField`] with transactional increment and decrement
//! - [`array::ArrayField`] with transactional append
//! - [`map::MapField`]
//! - [`timestamp::TimestampField`] converting to IANA time zones

/// Array fields.
pub mod array;

/// Untyped field accessor shared by the typed ones.
pub mod field;

/// Map fields.
pub mod map;

/// Number fields.
pub mod number;

/// String and boolean fields.
pub mod scalar;

/// Timestamp fields.
pub mod timestamp;

use crate::{
    common::{reference, value},
    error::{Error, Result},
    store::{Store, WriteOperation},
    write::batch::WriteBatch,
};

use serde::{Serialize, de::DeserializeOwned};

/// Handle on one document.
///
/// The handle holds no data: every call goes to the store.
///
/// ```rust,no_run
/// use document_crud::{Client, store::memory::MemoryStore};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new(MemoryStore::new());
/// let document = client.document("users", "jsmith");
/// document.create(&json!({"name": "John", "age": 42})).await?;
/// let user: serde_json::Value = document.retrieve().await?;
/// assert!(document.exists().await);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Document<'a, S> {
    reference: reference::DocumentRef,
    store: &'a S,
}

impl<'a, S: Store> Document<'a, S> {
    /// A handle on the referenced document.
    pub fn new(store: &'a S, reference: reference::DocumentRef) -> Self {
        Self { reference, store }
    }

    /// Where the document lives.
    pub fn reference(&self) -> &reference::DocumentRef {
        &self.reference
    }

    /// The document id.
    pub fn id(&self) -> &str {
        self.reference.id()
    }

    fn set_operation<T: Serialize>(&self, value: &T) -> Result<WriteOperation> {
        let fields = value::to_fields(value)?;
        Ok(WriteOperation::Set {
            reference: self.reference.clone(),
            fields,
        })
    }

    /// Write the whole document, replacing any previous content.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "document_crud.create",
            skip_all,
            fields(document = %self.reference),
            err
        )
    )]
    pub async fn create<T: Serialize>(&self, value: &T) -> Result<()> {
        let operation = self.set_operation(value)?;
        self.store.write(operation).await
    }

    /// Queue the whole-document write in a batch instead of writing now.
    pub fn create_in<T: Serialize>(&self, batch: &mut WriteBatch<'_, S>, value: &T) -> Result<()> {
        let operation = self.set_operation(value)?;
        batch.push(operation);
        Ok(())
    }

    /// Read the document's fields, failing when the document does not exist.
    pub async fn fields(&self) -> Result<value::Fields> {
        self.store
            .get(&self.reference)
            .await?
            .ok_or_else(|| Error::DocumentNotFound(self.reference.to_string()))
    }

    /// Read and decode the document.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "document_crud.retrieve",
            skip_all,
            fields(document = %self.reference),
            err
        )
    )]
    pub async fn retrieve<T: DeserializeOwned>(&self) -> Result<T> {
        let fields = self.fields().await?;
        value::from_fields(fields)
    }

    /// Whether the document exists.
    ///
    /// Any failure, not only absence, yields `false`; use
    /// [`Document::try_exists`] to tell them apart.
    pub async fn exists(&self) -> bool {
        self.try_exists().await.unwrap_or(false)
    }

    /// Whether the document exists, surfacing store failures.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "document_crud.exists",
            skip_all,
            fields(document = %self.reference),
            err
        )
    )]
    pub async fn try_exists(&self) -> Result<bool> {
        let fields = self.store.get(&self.reference).await?;
        Ok(fields.is_some())
    }

    /// Remove the document; removing a missing document succeeds.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "document_crud.delete",
            skip_all,
            fields(document = %self.reference),
            err
        )
    )]
    pub async fn delete(&self) -> Result<()> {
        self.store
            .write(WriteOperation::Delete {
                reference: self.reference.clone(),
            })
            .await
    }

    /// Queue the removal in a batch instead of removing now.
    pub fn delete_in(&self, batch: &mut WriteBatch<'_, S>) {
        batch.push(WriteOperation::Delete {
            reference: self.reference.clone(),
        });
    }

    /// Untyped accessor for a field.
    pub fn field(&self, name: impl Into<String>) -> field::Field<'a, S> {
        field::Field::new(self.store, self.reference.clone(), name.into())
    }

    /// Accessor for a string field.
    pub fn string(&self, name: impl Into<String>) -> scalar::StringField<'a, S> {
        scalar::StringField::new(self.field(name))
    }

    /// Accessor for a boolean field.
    pub fn boolean(&self, name: impl Into<String>) -> scalar::BooleanField<'a, S> {
        scalar::BooleanField::new(self.field(name))
    }

    /// Accessor for a number field.
    pub fn number(&self, name: impl Into<String>) -> number::NumberField<'a, S> {
        number::NumberField::new(self.field(name))
    }

    /// Accessor for an array field.
    pub fn array(&self, name: impl Into<String>) -> array::ArrayField<'a, S> {
        array::ArrayField::new(self.field(name))
    }

    /// Accessor for a map field.
    pub fn map(&self, name: impl Into<String>) -> map::MapField<'a, S> {
        map::MapField::new(self.field(name))
    }

    /// Accessor for a timestamp field.
    pub fn timestamp(&self, name: impl Into<String>) -> timestamp::TimestampField<'a, S> {
        timestamp::TimestampField::new(self.field(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    use serde::Deserialize;
    use std::collections;

    #[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
    struct User {
        first_name: String,
        last_name: String,
        tokens: collections::BTreeMap<String, String>,
    }

    fn user() -> User {
        User {
            first_name: "John".to_string(),
            last_name: "Smith".to_string(),
            tokens: collections::BTreeMap::from([
                ("android".to_string(), "AND_123".to_string()),
                ("ios".to_string(), "IOS_123".to_string()),
            ]),
        }
    }

    #[tokio::test]
    async fn test_create_then_retrieve() {
        let store = MemoryStore::new();
        let document = Document::new(&store, reference::DocumentRef::new("users", "jsmith"));
        document.create(&user()).await.unwrap();
        let actual: User = document.retrieve().await.unwrap();
        assert_eq!(actual, user());
        assert!(document.exists().await);
    }

    #[tokio::test]
    async fn test_create_replaces_previous_content() {
        let store = MemoryStore::new();
        let document = Document::new(&store, reference::DocumentRef::new("users", "jsmith"));
        document.field("legacy").update(true).await.unwrap();
        document.create(&user()).await.unwrap();
        let fields = document.fields().await.unwrap();
        assert!(!fields.contains_key("legacy"));
    }

    #[tokio::test]
    async fn test_missing_document() {
        let store = MemoryStore::new();
        let document = Document::new(&store, reference::DocumentRef::new("users", "ghost"));
        let result = document.retrieve::<User>().await;
        assert!(matches!(result, Err(Error::DocumentNotFound(ref path)) if path == "users/ghost"));
        assert!(!document.exists().await);
        assert!(!document.try_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        let document = Document::new(&store, reference::DocumentRef::new("users", "jsmith"));
        document.create(&user()).await.unwrap();
        document.delete().await.unwrap();
        document.delete().await.unwrap();
        assert!(!document.exists().await);
    }

    #[tokio::test]
    async fn test_batched_writes_wait_for_commit() {
        let store = MemoryStore::new();
        let first = Document::new(&store, reference::DocumentRef::new("users", "a"));
        let second = Document::new(&store, reference::DocumentRef::new("users", "b"));
        let doomed = Document::new(&store, reference::DocumentRef::new("users", "c"));
        doomed.create(&user()).await.unwrap();

        let mut batch = WriteBatch::new(&store);
        first.create_in(&mut batch, &user()).unwrap();
        second.field("active").update_in(&mut batch, true);
        doomed.delete_in(&mut batch);
        assert!(!first.exists().await);
        assert!(doomed.exists().await);

        batch.commit().await.unwrap();
        assert!(first.exists().await);
        assert_eq!(second.boolean("active").retrieve().await.unwrap(), true);
        assert!(!doomed.exists().await);
        assert_eq!(store.committed_batches().unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn test_cancelled_batch_has_no_effect() {
        let store = MemoryStore::new();
        let first = Document::new(&store, reference::DocumentRef::new("users", "a"));
        let doomed = Document::new(&store, reference::DocumentRef::new("users", "c"));
        doomed.create(&user()).await.unwrap();

        let mut batch = WriteBatch::new(&store);
        first.create_in(&mut batch, &user()).unwrap();
        first.string("nickname").update_in(&mut batch, "Johnny");
        doomed.delete_in(&mut batch);
        batch.cancel();

        assert!(!first.exists().await);
        assert!(doomed.exists().await);
    }
}
