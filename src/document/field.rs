use crate::{
    common::{reference, value},
    error::{Error, Result},
    store::{Store, WriteOperation},
    write::batch::WriteBatch,
};

use serde::Serialize;

/// Accessor bound to one named field of one document.
///
/// Writes are merge-writes: the other fields of the document stay untouched
/// and a missing document is created holding just this field.
///
/// ```rust,no_run
/// use document_crud::{Client, Value, store::memory::MemoryStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new(MemoryStore::new());
/// let field = client.document("users", "jsmith").field("nickname");
/// field.update("Johnny").await?;
/// assert_eq!(field.retrieve().await?, Value::from("Johnny"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Field<'a, S> {
    name: String,
    reference: reference::DocumentRef,
    store: &'a S,
}

impl<'a, S: Store> Field<'a, S> {
    pub(crate) fn new(store: &'a S, reference: reference::DocumentRef, name: String) -> Self {
        Self {
            name,
            reference,
            store,
        }
    }

    /// The field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The document holding the field.
    pub fn reference(&self) -> &reference::DocumentRef {
        &self.reference
    }

    pub(crate) fn missing(&self) -> Error {
        Error::FieldMissing {
            document: self.reference.to_string(),
            field: self.name.clone(),
        }
    }

    pub(crate) fn overflow(&self) -> Error {
        Error::NumberOverflow {
            document: self.reference.to_string(),
            field: self.name.clone(),
        }
    }

    pub(crate) fn mismatch(&self, expected: value::ValueKind, actual: &value::Value) -> Error {
        Error::FieldType {
            document: self.reference.to_string(),
            field: self.name.clone(),
            expected,
            actual: actual.kind(),
        }
    }

    pub(crate) fn merge_operation(&self, value: value::Value) -> WriteOperation {
        WriteOperation::Merge {
            reference: self.reference.clone(),
            fields: value::Fields::from([(self.name.clone(), value)]),
        }
    }

    /// Read the current value.
    ///
    /// Fails with [`Error::DocumentNotFound`] or [`Error::FieldMissing`].
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "document_crud.field.retrieve",
            skip_all,
            fields(document = %self.reference, field = %self.name),
            err
        )
    )]
    pub async fn retrieve(&self) -> Result<value::Value> {
        let mut fields = self
            .store
            .get(&self.reference)
            .await?
            .ok_or_else(|| Error::DocumentNotFound(self.reference.to_string()))?;
        fields.swap_remove(&self.name).ok_or_else(|| self.missing())
    }

    /// Read the current value and extract it as `expected`.
    pub(crate) async fn retrieve_as<T>(
        &self,
        expected: value::ValueKind,
        extract: fn(value::Value) -> Result<T, value::Value>,
    ) -> Result<T> {
        let current = self.retrieve().await?;
        extract(current).map_err(|other| self.mismatch(expected, &other))
    }

    /// Merge-write the field.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "document_crud.field.update",
            skip_all,
            fields(document = %self.reference, field = %self.name),
            err
        )
    )]
    pub async fn update(&self, value: impl Into<value::Value>) -> Result<()> {
        let operation = self.merge_operation(value.into());
        self.store.write(operation).await
    }

    /// Merge-write any serializable value into the field.
    pub async fn update_with<T: Serialize>(&self, value: &T) -> Result<()> {
        let value = value::to_value(value)?;
        self.update(value).await
    }

    /// Queue the merge-write in a batch instead of writing now.
    pub fn update_in(&self, batch: &mut WriteBatch<'_, S>, value: impl Into<value::Value>) {
        batch.push(self.merge_operation(value.into()));
    }

    /// Atomic read-modify-write of the field, see [`Store::transform_field`].
    pub(crate) async fn transform<F>(&self, transform: F) -> Result<value::Value>
    where
        F: FnMut(Option<&value::Value>) -> Result<value::Value> + Send,
    {
        self.store
            .transform_field(&self.reference, &self.name, transform)
            .await
    }
}
