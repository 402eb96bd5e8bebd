use crate::{
    common::value::{Value, ValueKind},
    document::field::Field,
    error::Result,
    store::Store,
    write::batch::WriteBatch,
};

/// Accessor for a string field.
#[derive(Debug)]
pub struct StringField<'a, S> {
    field: Field<'a, S>,
}

impl<'a, S: Store> StringField<'a, S> {
    pub(crate) fn new(field: Field<'a, S>) -> Self {
        Self { field }
    }

    /// The untyped accessor of the same field.
    pub fn field(&self) -> &Field<'a, S> {
        &self.field
    }

    /// Read the string.
    pub async fn retrieve(&self) -> Result<String> {
        self.field
            .retrieve_as(ValueKind::String, Value::into_string)
            .await
    }

    /// Merge-write the string.
    pub async fn update(&self, value: impl Into<String>) -> Result<()> {
        self.field.update(Value::String(value.into())).await
    }

    /// Queue the merge-write in a batch.
    pub fn update_in(&self, batch: &mut WriteBatch<'_, S>, value: impl Into<String>) {
        self.field.update_in(batch, Value::String(value.into()));
    }
}

/// Accessor for a boolean field.
#[derive(Debug)]
pub struct BooleanField<'a, S> {
    field: Field<'a, S>,
}

impl<'a, S: Store> BooleanField<'a, S> {
    pub(crate) fn new(field: Field<'a, S>) -> Self {
        Self { field }
    }

    /// The untyped accessor of the same field.
    pub fn field(&self) -> &Field<'a, S> {
        &self.field
    }

    /// Read the boolean.
    pub async fn retrieve(&self) -> Result<bool> {
        self.field
            .retrieve_as(ValueKind::Boolean, Value::into_boolean)
            .await
    }

    /// Merge-write the boolean.
    pub async fn update(&self, value: bool) -> Result<()> {
        self.field.update(value).await
    }

    /// Queue the merge-write in a batch.
    pub fn update_in(&self, batch: &mut WriteBatch<'_, S>, value: bool) {
        self.field.update_in(batch, value);
    }
}

#[cfg(test)]
mod tests {
    use crate::{Client, Error, common::value::ValueKind, store::memory::MemoryStore};

    #[tokio::test]
    async fn test_string_round_trip_keeps_other_fields() {
        let client = Client::new(MemoryStore::new());
        let document = client.document("users", "jsmith");
        document.boolean("admin").update(true).await.unwrap();
        document.string("name").update("John").await.unwrap();
        assert_eq!(document.string("name").retrieve().await.unwrap(), "John");
        assert!(document.boolean("admin").retrieve().await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_type_is_reported() {
        let client = Client::new(MemoryStore::new());
        let document = client.document("users", "jsmith");
        document.number("name").update(7).await.unwrap();
        let result = document.string("name").retrieve().await;
        assert!(matches!(
            result,
            Err(Error::FieldType {
                expected: ValueKind::String,
                actual: ValueKind::Integer,
                ..
            })
        ));
    }
}
