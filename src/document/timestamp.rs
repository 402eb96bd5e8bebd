use crate::{
    common::value::{Value, ValueKind},
    document::field::Field,
    error::{Error, Result},
    store::Store,
    write::batch::WriteBatch,
};

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Resolve an IANA time zone name such as `Europe/Rome`.
pub fn time_zone(location: &str) -> Result<Tz> {
    location
        .parse::<Tz>()
        .map_err(|_| Error::InvalidTimeZone(location.to_string()))
}

/// Accessor for a timestamp field.
///
/// Instants are stored in UTC and converted to a named time zone on read.
///
/// ```rust,no_run
/// use chrono::Utc;
/// use document_crud::{Client, store::memory::MemoryStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new(MemoryStore::new());
/// let seen = client.document("users", "jsmith").timestamp("last_seen");
/// seen.update(Utc::now()).await?;
/// let local = seen.retrieve("America/New_York").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TimestampField<'a, S> {
    field: Field<'a, S>,
}

impl<'a, S: Store> TimestampField<'a, S> {
    pub(crate) fn new(field: Field<'a, S>) -> Self {
        Self { field }
    }

    /// The untyped accessor of the same field.
    pub fn field(&self) -> &Field<'a, S> {
        &self.field
    }

    /// Read the instant as UTC.
    pub async fn retrieve_utc(&self) -> Result<DateTime<Utc>> {
        self.field
            .retrieve_as(ValueKind::Timestamp, Value::into_timestamp)
            .await
    }

    /// Read the instant and express it in the time zone `location`.
    ///
    /// An unknown zone fails with [`Error::InvalidTimeZone`] before the store
    /// is contacted.
    pub async fn retrieve(&self, location: &str) -> Result<DateTime<Tz>> {
        let zone = time_zone(location)?;
        let instant = self.retrieve_utc().await?;
        Ok(instant.with_timezone(&zone))
    }

    /// Merge-write the instant.
    pub async fn update<Z: TimeZone>(&self, instant: DateTime<Z>) -> Result<()> {
        self.field.update(instant.with_timezone(&Utc)).await
    }

    /// Queue the merge-write in a batch.
    pub fn update_in<Z: TimeZone>(&self, batch: &mut WriteBatch<'_, S>, instant: DateTime<Z>) {
        self.field.update_in(batch, instant.with_timezone(&Utc));
    }
}
