use crate::{
    common::value::{Value, ValueKind},
    document::field::Field,
    error::Result,
    store::Store,
    write::batch::WriteBatch,
};

/// Accessor for an integer field.
///
/// Increment and decrement run as transactions, so concurrent callers never
/// lose an update. An absent or null field increments to 1 and decrements
/// to 0. Stepping past `i64::MAX` or `i64::MIN` fails and leaves the field as
/// it was.
///
/// ```rust,no_run
/// use document_crud::{Client, store::memory::MemoryStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new(MemoryStore::new());
/// let visits = client.document("pages", "home").number("visits");
/// visits.update(41).await?;
/// assert_eq!(visits.increment().await?, 42);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct NumberField<'a, S> {
    field: Field<'a, S>,
}

impl<'a, S: Store> NumberField<'a, S> {
    pub(crate) fn new(field: Field<'a, S>) -> Self {
        Self { field }
    }

    /// The untyped accessor of the same field.
    pub fn field(&self) -> &Field<'a, S> {
        &self.field
    }

    /// Read the integer.
    pub async fn retrieve(&self) -> Result<i64> {
        self.field
            .retrieve_as(ValueKind::Integer, Value::into_integer)
            .await
    }

    /// Merge-write the integer.
    pub async fn update(&self, value: i64) -> Result<()> {
        self.field.update(value).await
    }

    /// Queue the merge-write in a batch.
    pub fn update_in(&self, batch: &mut WriteBatch<'_, S>, value: i64) {
        self.field.update_in(batch, value);
    }

    async fn step(&self, delta: i64, absent: i64) -> Result<i64> {
        let next = self
            .field
            .transform(|current| match current {
                None | Some(Value::Null) => Ok(Value::Integer(absent)),
                Some(Value::Integer(value)) => value
                    .checked_add(delta)
                    .map(Value::Integer)
                    .ok_or_else(|| self.field.overflow()),
                Some(other) => Err(self.field.mismatch(ValueKind::Integer, other)),
            })
            .await?;
        next.into_integer()
            .map_err(|other| self.field.mismatch(ValueKind::Integer, &other))
    }

    /// Add one and return the new value.
    ///
    /// The document must exist; an absent field becomes 1.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "document_crud.number.increment",
            skip_all,
            fields(document = %self.field.reference(), field = %self.field.name()),
            err
        )
    )]
    pub async fn increment(&self) -> Result<i64> {
        self.step(1, 1).await
    }

    /// Subtract one and return the new value.
    ///
    /// The document must exist; an absent field becomes 0.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "document_crud.number.decrement",
            skip_all,
            fields(document = %self.field.reference(), field = %self.field.name()),
            err
        )
    )]
    pub async fn decrement(&self) -> Result<i64> {
        self.step(-1, 0).await
    }
}

#[cfg(test)]
mod tests {
    use crate::{Client, Error, common::value::ValueKind, store::memory::MemoryStore};

    use rstest::rstest;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_increment_and_decrement() {
        let client = Client::new(MemoryStore::new());
        let counter = client.document("counters", "c").number("count");
        counter.update(5).await.unwrap();
        assert_eq!(counter.increment().await.unwrap(), 6);
        assert_eq!(counter.retrieve().await.unwrap(), 6);
        assert_eq!(counter.decrement().await.unwrap(), 5);
        assert_eq!(counter.retrieve().await.unwrap(), 5);
    }

    #[rstest]
    #[case::increment(true, 1)]
    #[case::decrement(false, 0)]
    #[tokio::test]
    async fn test_absent_field_starts_from_zero(#[case] increment: bool, #[case] expected: i64) {
        let client = Client::new(MemoryStore::new());
        let document = client.document("counters", "c");
        document.string("label").update("clicks").await.unwrap();
        let counter = document.number("count");
        let actual = if increment {
            counter.increment().await.unwrap()
        } else {
            counter.decrement().await.unwrap()
        };
        assert_eq!(actual, expected);
        assert_eq!(counter.retrieve().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_increment_on_missing_document() {
        let client = Client::new(MemoryStore::new());
        let result = client.document("counters", "ghost").number("count").increment().await;
        assert!(matches!(result, Err(Error::DocumentNotFound(_))));
        assert!(!client.document("counters", "ghost").exists().await);
    }

    #[tokio::test]
    async fn test_increment_of_a_string_is_rejected() {
        let client = Client::new(MemoryStore::new());
        let document = client.document("counters", "c");
        document.string("count").update("many").await.unwrap();
        let result = document.number("count").increment().await;
        assert!(matches!(
            result,
            Err(Error::FieldType {
                expected: ValueKind::Integer,
                actual: ValueKind::String,
                ..
            })
        ));
        assert_eq!(document.string("count").retrieve().await.unwrap(), "many");
    }

    #[rstest]
    #[case::increment_past_max(i64::MAX, true)]
    #[case::decrement_past_min(i64::MIN, false)]
    #[tokio::test]
    async fn test_overflow_is_rejected(#[case] start: i64, #[case] increment: bool) {
        let client = Client::new(MemoryStore::new());
        let counter = client.document("counters", "c").number("count");
        counter.update(start).await.unwrap();
        let result = if increment {
            counter.increment().await
        } else {
            counter.decrement().await
        };
        assert!(matches!(
            result,
            Err(Error::NumberOverflow { ref document, ref field })
                if document == "counters/c" && field == "count"
        ));
        assert_eq!(counter.retrieve().await.unwrap(), start);
        assert!(client.store().committed_batches().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let client = Arc::new(Client::new(MemoryStore::new()));
        client.document("counters", "c").number("count").update(0).await.unwrap();
        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let client = Arc::clone(&client);
                tokio::spawn(async move {
                    // conflicts past the attempt budget surface as errors, so retry them
                    loop {
                        match client.document("counters", "c").number("count").increment().await {
                            Ok(_) => break,
                            Err(Error::TransactionContention { .. }) => continue,
                            Err(error) => panic!("{error}"),
                        }
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        let count = client.document("counters", "c").number("count").retrieve().await.unwrap();
        assert_eq!(count, 20);
    }
}
