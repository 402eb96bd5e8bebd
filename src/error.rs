use crate::common::value::ValueKind;

use std::error;

/// Result type returned by every fallible operation of this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by documents, fields, collections, batches and stores.
///
/// Transport failures of the underlying store are wrapped in [`Error::Store`]
/// without being inspected or retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested document does not exist.
    #[error("document `{0}` does not exist")]
    DocumentNotFound(String),
    /// The document exists but does not hold the requested field.
    #[error("field `{field}` is missing from document `{document}`")]
    FieldMissing {
        /// Path of the document.
        document: String,
        /// Name of the missing field.
        field: String,
    },
    /// The field exists but holds a value of another type.
    #[error("field `{field}` of document `{document}` holds {actual}, expected {expected}")]
    FieldType {
        /// Path of the document.
        document: String,
        /// Name of the field.
        field: String,
        /// The type the caller asked for.
        expected: ValueKind,
        /// The type actually stored.
        actual: ValueKind,
    },
    /// Incrementing or decrementing would leave the 64-bit integer range.
    #[error("field `{field}` of document `{document}` would overflow")]
    NumberOverflow {
        /// Path of the document.
        document: String,
        /// Name of the field.
        field: String,
    },
    /// The time zone is not part of the IANA database.
    #[error("unknown time zone `{0}`")]
    InvalidTimeZone(String),
    /// A batch holds more operations than the store accepts in one commit.
    #[error("batch holds {operations} operations but the store accepts at most {capacity}")]
    BatchCapacityExceeded {
        /// Number of pending operations.
        operations: usize,
        /// The store's per-batch ceiling.
        capacity: usize,
    },
    /// A read-modify-write kept conflicting with concurrent writers.
    #[error("transaction on `{document}` aborted after {attempts} conflicting attempts")]
    TransactionContention {
        /// Path of the document.
        document: String,
        /// Number of attempts made.
        attempts: usize,
    },
    /// The store returned a value with no counterpart in [`crate::Value`].
    #[error("unsupported value: {0}")]
    UnsupportedValue(String),
    /// Application data could not be encoded or decoded.
    #[error(transparent)]
    Serialization(#[from] serde_dynamo::Error),
    /// A lock guarding in-process state was poisoned.
    #[error("store lock poisoned during {0}")]
    LockPoisoned(&'static str),
    /// Failure reported by the underlying store, propagated verbatim.
    #[error(transparent)]
    Store(Box<dyn error::Error + Send + Sync>),
}

impl Error {
    pub(crate) fn store<E>(error: E) -> Self
    where
        E: Into<Box<dyn error::Error + Send + Sync>>,
    {
        Self::Store(error.into())
    }

    /// Whether the error means the document does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::DocumentNotFound(_))
    }
}
