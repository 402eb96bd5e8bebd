use crate::{
    common::value::{Value, ValueKind},
    document::field::Field,
    error::Result,
    store::Store,
    write::batch::WriteBatch,
};

/// Accessor for an array field.
#[derive(Debug)]
pub struct ArrayField<'a, S> {
    field: Field<'a, S>,
}

impl<'a, S: Store> ArrayField<'a, S> {
    pub(crate) fn new(field: Field<'a, S>) -> Self {
        Self { field }
    }

    /// The untyped accessor of the same field.
    pub fn field(&self) -> &Field<'a, S> {
        &self.field
    }

    /// Read the array.
    pub async fn retrieve(&self) -> Result<Vec<Value>> {
        self.field
            .retrieve_as(ValueKind::Array, Value::into_array)
            .await
    }

    /// Replace the whole array.
    pub async fn overwrite(&self, values: Vec<Value>) -> Result<()> {
        self.field.update(values).await
    }

    /// Queue the replacement in a batch.
    pub fn overwrite_in(&self, batch: &mut WriteBatch<'_, S>, values: Vec<Value>) {
        self.field.update_in(batch, values);
    }

    /// Append `values` at the end, in order, and return the resulting array.
    ///
    /// Runs as a transaction: concurrent appends all land. The document must
    /// exist; an absent or null field starts out empty.
    ///
    /// ```rust,no_run
    /// use document_crud::{Client, Value, store::memory::MemoryStore};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = Client::new(MemoryStore::new());
    /// let tags = client.document("posts", "p1").array("tags");
    /// tags.overwrite(vec![Value::from("rust")]).await?;
    /// let all = tags.append(vec![Value::from("async")]).await?;
    /// assert_eq!(all.len(), 2);
    /// # Ok(())
    /// # }
    /// ```
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "document_crud.array.append",
            skip_all,
            fields(
                document = %self.field.reference(),
                field = %self.field.name(),
                values = values.len()
            ),
            err
        )
    )]
    pub async fn append(&self, values: Vec<Value>) -> Result<Vec<Value>> {
        let next = self
            .field
            .transform(|current| {
                let mut array = match current {
                    None | Some(Value::Null) => Vec::with_capacity(values.len()),
                    Some(Value::Array(array)) => array.clone(),
                    Some(other) => return Err(self.field.mismatch(ValueKind::Array, other)),
                };
                array.extend(values.iter().cloned());
                Ok(Value::Array(array))
            })
            .await?;
        next.into_array()
            .map_err(|other| self.field.mismatch(ValueKind::Array, &other))
    }
}
