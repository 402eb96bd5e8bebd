//! Write operations spanning several documents.
//!
//! This module provides:
//! - Explicit write batches committed atomically
//! - Bulk set-for-all and delete-all over a whole collection

/// Write batch collecting operations committed as one atomic unit.
pub mod batch;

/// Batch sizing and bulk writes across a collection.
pub mod bulk;
