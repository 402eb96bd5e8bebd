use crate::{
    common::value::{Fields, Value, ValueKind},
    document::field::Field,
    error::Result,
    store::Store,
    write::batch::WriteBatch,
};

/// Accessor for a map field.
///
/// Both [`MapField::merge`] and [`MapField::overwrite`] merge-write the
/// document with the map under the field name: the other fields of the
/// document are kept and the map value itself is replaced.
#[derive(Debug)]
pub struct MapField<'a, S> {
    field: Field<'a, S>,
}

impl<'a, S: Store> MapField<'a, S> {
    pub(crate) fn new(field: Field<'a, S>) -> Self {
        Self { field }
    }

    /// The untyped accessor of the same field.
    pub fn field(&self) -> &Field<'a, S> {
        &self.field
    }

    /// Read the map.
    pub async fn retrieve(&self) -> Result<Fields> {
        self.field.retrieve_as(ValueKind::Map, Value::into_map).await
    }

    /// Merge-write the map into the document.
    pub async fn merge(&self, map: Fields) -> Result<()> {
        self.field.update(map).await
    }

    /// Queue the merge-write in a batch.
    pub fn merge_in(&self, batch: &mut WriteBatch<'_, S>, map: Fields) {
        self.field.update_in(batch, map);
    }

    /// Write the map, same effect as [`MapField::merge`].
    pub async fn overwrite(&self, map: Fields) -> Result<()> {
        self.merge(map).await
    }

    /// Queue the write in a batch, same effect as [`MapField::merge_in`].
    pub fn overwrite_in(&self, batch: &mut WriteBatch<'_, S>, map: Fields) {
        self.merge_in(batch, map);
    }
}
