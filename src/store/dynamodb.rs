use crate::{
    common::{self, query, reference, value},
    error::{Error, Result},
    store::{self, Snapshot, Store, WriteOperation},
};

use async_trait::async_trait;
use aws_sdk_dynamodb::{Client, types};
use indexmap::IndexMap;
use std::collections;

/// Maximum number of items of one TransactWriteItems call.
pub const MAX_TRANSACT_ITEMS: usize = 100;

const COLLECTION_PLACEHOLDER: &str = "#collection";
const ID_PLACEHOLDER: &str = "#id";

type Item = collections::HashMap<String, types::AttributeValue>;

/// Settings of a [`DynamoStore`].
///
/// Every collection shares one table: the collection path is the partition
/// key and the document id the sort key, both stored as strings. Documents
/// must not use either attribute name as a field.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct DynamoStoreConfig {
    /// The table holding the documents.
    pub table_name: String,
    /// The partition key attribute, holding the collection path.
    pub collection_attribute: String,
    /// The sort key attribute, holding the document id.
    pub id_attribute: String,
    /// Attempts of a read-modify-write before reporting contention.
    pub max_transaction_attempts: usize,
}

impl Default for DynamoStoreConfig {
    fn default() -> Self {
        Self {
            table_name: "documents".to_string(),
            collection_attribute: "__collection".to_string(),
            id_attribute: "__id".to_string(),
            max_transaction_attempts: store::MAX_TRANSACTION_ATTEMPTS,
        }
    }
}

impl DynamoStoreConfig {
    fn key(&self, reference: &reference::DocumentRef) -> Item {
        collections::HashMap::from([
            (
                self.collection_attribute.clone(),
                types::AttributeValue::S(reference.collection().to_string()),
            ),
            (
                self.id_attribute.clone(),
                types::AttributeValue::S(reference.id().to_string()),
            ),
        ])
    }

    fn item(&self, reference: &reference::DocumentRef, fields: value::Fields) -> Item {
        let mut item = value::fields_to_attributes(fields);
        item.extend(self.key(reference));
        item
    }

    fn snapshot(&self, mut item: Item) -> Result<Snapshot> {
        let collection = item.remove(&self.collection_attribute);
        let id = item.remove(&self.id_attribute);
        let reference = match (collection, id) {
            (Some(types::AttributeValue::S(collection)), Some(types::AttributeValue::S(id))) => {
                reference::DocumentRef::new(&collection, id)
            }
            _ => {
                return Err(Error::UnsupportedValue(format!(
                    "item without `{}` and `{}` string keys",
                    self.collection_attribute, self.id_attribute
                )));
            }
        };
        Ok(Snapshot {
            reference,
            fields: value::attributes_to_fields(item)?,
        })
    }

    fn key_condition(&self, collection: &str) -> common::ExpressionInput {
        common::ExpressionInput {
            expression: format!("{COLLECTION_PLACEHOLDER} = :collection"),
            expression_attribute_names: collections::HashMap::from([(
                COLLECTION_PLACEHOLDER.to_string(),
                self.collection_attribute.clone(),
            )]),
            expression_attribute_values: collections::HashMap::from([(
                ":collection".to_string(),
                types::AttributeValue::S(collection.to_string()),
            )]),
        }
    }

    /// Condition holding while the field still has the value read at the start
    /// of a read-modify-write, and the document still exists.
    fn guard(&self, field: &str, expected: Option<&value::Value>) -> common::ExpressionInput {
        match expected {
            Some(expected) => common::ExpressionInput {
                expression: "#field = :expected".to_string(),
                expression_attribute_names: collections::HashMap::from([(
                    "#field".to_string(),
                    field.to_string(),
                )]),
                expression_attribute_values: collections::HashMap::from([(
                    ":expected".to_string(),
                    expected.clone().into(),
                )]),
            },
            None => common::ExpressionInput {
                expression: format!(
                    "attribute_exists({COLLECTION_PLACEHOLDER}) AND attribute_not_exists(#field)"
                ),
                expression_attribute_names: collections::HashMap::from([
                    (
                        COLLECTION_PLACEHOLDER.to_string(),
                        self.collection_attribute.clone(),
                    ),
                    ("#field".to_string(), field.to_string()),
                ]),
                ..Default::default()
            },
        }
    }
}

/// `SET` expression overwriting the given top-level fields, `None` when empty.
fn merge_expression(fields: value::Fields) -> Option<common::ExpressionInput> {
    if fields.is_empty() {
        return None;
    }
    let assignments = fields
        .into_iter()
        .enumerate()
        .map(|(index, (name, value))| common::ExpressionInput {
            expression: format!("#merge{index} = :merge{index}"),
            expression_attribute_names: collections::HashMap::from([(
                format!("#merge{index}"),
                name,
            )]),
            expression_attribute_values: collections::HashMap::from([(
                format!(":merge{index}"),
                value.into(),
            )]),
        })
        .collect();
    let mut update = common::ExpressionInput::merge(", ", assignments);
    update.expression = format!("SET {}", update.expression);
    Some(update)
}

/// Fold the operations of a batch into at most one per document, in the order
/// documents first appear.
///
/// TransactWriteItems rejects two actions on the same item. Later operations
/// win: a delete drops what came before, a set replaces it, and a merge extends
/// a pending set or merge. A merge after a delete leaves just the merged
/// fields, so it becomes a set.
fn coalesce(operations: Vec<WriteOperation>) -> Vec<WriteOperation> {
    let mut pending: IndexMap<reference::DocumentRef, WriteOperation> = IndexMap::new();
    for operation in operations {
        let Some(previous) = pending.get_mut(operation.reference()) else {
            pending.insert(operation.reference().clone(), operation);
            continue;
        };
        match operation {
            WriteOperation::Merge { reference, fields } => match previous {
                WriteOperation::Set { fields: existing, .. }
                | WriteOperation::Merge { fields: existing, .. } => existing.extend(fields),
                WriteOperation::Delete { .. } => {
                    *previous = WriteOperation::Set { reference, fields }
                }
            },
            operation => *previous = operation,
        }
    }
    pending.into_values().collect()
}

/// A document store backed by one Amazon DynamoDB table.
///
/// Reads are strongly consistent. Batches are committed with
/// TransactWriteItems, hence hold at most [`MAX_TRANSACT_ITEMS`] operations,
/// and field transactions are conditional updates retried on conflict.
///
/// ```rust,no_run
/// use aws_sdk_dynamodb::Client as DynamoClient;
/// use document_crud::{Client, store::dynamodb::{DynamoStore, DynamoStoreConfig}};
///
/// # async fn example(dynamodb: DynamoClient) -> Result<(), Box<dyn std::error::Error>> {
/// let store = DynamoStore::new(
///     dynamodb,
///     DynamoStoreConfig {
///         table_name: "app".to_string(),
///         ..Default::default()
///     },
/// );
/// let client = Client::new(store);
/// client.collection("users").set_for_all("active", true).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct DynamoStore {
    client: Client,
    config: DynamoStoreConfig,
}

impl DynamoStore {
    /// A store issuing requests through `client`.
    pub fn new(client: Client, config: DynamoStoreConfig) -> Self {
        Self { client, config }
    }

    /// The store settings.
    pub fn config(&self) -> &DynamoStoreConfig {
        &self.config
    }

    async fn query_items(
        &self,
        collection: &str,
        filter: Option<common::ExpressionInput>,
        projection: Option<String>,
    ) -> Result<Vec<Item>> {
        let key_condition = self.config.key_condition(collection);
        let key_condition_expression = key_condition.expression.clone();
        let (filter_expression, conditions) = match filter {
            Some(filter) => (Some(filter.expression.clone()), vec![key_condition, filter]),
            None => (None, vec![key_condition]),
        };
        // only the placeholders of the merged expression are sent
        let mut expression = common::ExpressionInput::merge(" AND ", conditions);
        if projection.is_some() {
            expression
                .expression_attribute_names
                .insert(ID_PLACEHOLDER.to_string(), self.config.id_attribute.clone());
        }
        let (names, values) = expression.placeholders();
        let mut paginator = self
            .client
            .query()
            .table_name(&self.config.table_name)
            .consistent_read(true)
            .key_condition_expression(key_condition_expression)
            .set_filter_expression(filter_expression)
            .set_projection_expression(projection)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .into_paginator()
            .send();
        let mut items = Vec::new();
        while let Some(page) = paginator.next().await {
            let page = page.map_err(|error| Error::store(aws_sdk_dynamodb::Error::from(error)))?;
            if let Some(page_items) = page.items {
                items.extend(page_items);
            }
        }
        Ok(items)
    }

    fn transact_item(&self, operation: WriteOperation) -> Result<Option<types::TransactWriteItem>> {
        let item = match operation {
            WriteOperation::Set { reference, fields } => {
                let put = types::Put::builder()
                    .table_name(&self.config.table_name)
                    .set_item(Some(self.config.item(&reference, fields)))
                    .build()
                    .map_err(Error::store)?;
                types::TransactWriteItem::builder().put(put).build()
            }
            WriteOperation::Merge { reference, fields } => {
                // an update needs at least one assignment
                let Some(update) = merge_expression(fields) else {
                    return Ok(None);
                };
                let (names, values) = update.placeholders();
                let update = types::Update::builder()
                    .table_name(&self.config.table_name)
                    .set_key(Some(self.config.key(&reference)))
                    .update_expression(update.expression)
                    .set_expression_attribute_names(names)
                    .set_expression_attribute_values(values)
                    .build()
                    .map_err(Error::store)?;
                types::TransactWriteItem::builder().update(update).build()
            }
            WriteOperation::Delete { reference } => {
                let delete = types::Delete::builder()
                    .table_name(&self.config.table_name)
                    .set_key(Some(self.config.key(&reference)))
                    .build()
                    .map_err(Error::store)?;
                types::TransactWriteItem::builder().delete(delete).build()
            }
        };
        Ok(Some(item))
    }
}

#[async_trait]
impl Store for DynamoStore {
    fn max_batch_operations(&self) -> usize {
        MAX_TRANSACT_ITEMS
    }

    async fn get(&self, reference: &reference::DocumentRef) -> Result<Option<value::Fields>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.config.table_name)
            .set_key(Some(self.config.key(reference)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|error| Error::store(aws_sdk_dynamodb::Error::from(error)))?;
        output
            .item
            .map(|item| self.config.snapshot(item).map(|snapshot| snapshot.fields))
            .transpose()
    }

    async fn write(&self, operation: WriteOperation) -> Result<()> {
        operation.ensure_finite()?;
        match operation {
            WriteOperation::Set { reference, fields } => {
                self.client
                    .put_item()
                    .table_name(&self.config.table_name)
                    .set_item(Some(self.config.item(&reference, fields)))
                    .send()
                    .await
                    .map_err(|error| Error::store(aws_sdk_dynamodb::Error::from(error)))?;
            }
            WriteOperation::Merge { reference, fields } => {
                // without an update expression the item is created holding just its key
                let update = merge_expression(fields).unwrap_or_default();
                let (names, values) = update.placeholders();
                let update_expression = (!update.expression.is_empty()).then_some(update.expression);
                self.client
                    .update_item()
                    .table_name(&self.config.table_name)
                    .set_key(Some(self.config.key(&reference)))
                    .set_update_expression(update_expression)
                    .set_expression_attribute_names(names)
                    .set_expression_attribute_values(values)
                    .send()
                    .await
                    .map_err(|error| Error::store(aws_sdk_dynamodb::Error::from(error)))?;
            }
            WriteOperation::Delete { reference } => {
                self.client
                    .delete_item()
                    .table_name(&self.config.table_name)
                    .set_key(Some(self.config.key(&reference)))
                    .send()
                    .await
                    .map_err(|error| Error::store(aws_sdk_dynamodb::Error::from(error)))?;
            }
        }
        Ok(())
    }

    async fn document_refs(&self, collection: &str) -> Result<Vec<reference::DocumentRef>> {
        let items = self
            .query_items(collection, None, Some(ID_PLACEHOLDER.to_string()))
            .await?;
        items
            .into_iter()
            .map(|mut item| match item.remove(&self.config.id_attribute) {
                Some(types::AttributeValue::S(id)) => Ok(reference::DocumentRef::new(collection, id)),
                _ => Err(Error::UnsupportedValue(format!(
                    "item without `{}` string key",
                    self.config.id_attribute
                ))),
            })
            .collect()
    }

    async fn query(&self, collection: &str, query: &query::Query) -> Result<Vec<Snapshot>> {
        let items = self
            .query_items(collection, query.filter_expression(), None)
            .await?;
        let snapshots = items
            .into_iter()
            .map(|item| self.config.snapshot(item))
            .collect::<Result<Vec<_>>>()?;
        Ok(query.arrange(snapshots))
    }

    async fn commit(&self, operations: Vec<WriteOperation>) -> Result<()> {
        if operations.len() > MAX_TRANSACT_ITEMS {
            return Err(Error::BatchCapacityExceeded {
                operations: operations.len(),
                capacity: MAX_TRANSACT_ITEMS,
            });
        }
        operations
            .iter()
            .try_for_each(WriteOperation::ensure_finite)?;
        let operations = coalesce(operations);
        let mut transact_items = Vec::with_capacity(operations.len());
        for operation in operations {
            if let Some(item) = self.transact_item(operation)? {
                transact_items.push(item);
            }
        }
        if transact_items.is_empty() {
            return Ok(());
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(items = transact_items.len(), "transact write items");
        self.client
            .transact_write_items()
            .set_transact_items(Some(transact_items))
            .send()
            .await
            .map_err(|error| Error::store(aws_sdk_dynamodb::Error::from(error)))?;
        Ok(())
    }

    async fn transform_field<F>(
        &self,
        reference: &reference::DocumentRef,
        field: &str,
        mut transform: F,
    ) -> Result<value::Value>
    where
        F: FnMut(Option<&value::Value>) -> Result<value::Value> + Send,
    {
        for _ in 0..self.config.max_transaction_attempts {
            let fields = self
                .get(reference)
                .await?
                .ok_or_else(|| Error::DocumentNotFound(reference.to_string()))?;
            let current = fields.get(field);
            let next = transform(current)?;
            value::ensure_finite(&next)?;
            let mut condition = self.config.guard(field, current);
            condition
                .expression_attribute_values
                .insert(":next".to_string(), next.clone().into());
            let (names, values) = condition.placeholders();
            let result = self
                .client
                .update_item()
                .table_name(&self.config.table_name)
                .set_key(Some(self.config.key(reference)))
                .update_expression("SET #field = :next")
                .condition_expression(condition.expression)
                .set_expression_attribute_names(names)
                .set_expression_attribute_values(values)
                .send()
                .await;
            match result {
                Ok(_) => return Ok(next),
                Err(error)
                    if error
                        .as_service_error()
                        .is_some_and(|error| error.is_conditional_check_failed_exception()) =>
                {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(document = %reference, field, "transaction conflict, retrying");
                }
                Err(error) => return Err(Error::store(aws_sdk_dynamodb::Error::from(error))),
            }
        }
        Err(Error::TransactionContention {
            document: reference.to_string(),
            attempts: self.config.max_transaction_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    fn config() -> DynamoStoreConfig {
        DynamoStoreConfig {
            table_name: "t".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_item_carries_key_attributes() {
        let reference = reference::DocumentRef::new("users", "jsmith");
        let item = config().item(
            &reference,
            value::Fields::from([("name".to_string(), value::Value::from("John"))]),
        );
        assert_eq!(
            item,
            collections::HashMap::from([
                (
                    "__collection".to_string(),
                    types::AttributeValue::S("users".to_string())
                ),
                (
                    "__id".to_string(),
                    types::AttributeValue::S("jsmith".to_string())
                ),
                (
                    "name".to_string(),
                    types::AttributeValue::S("John".to_string())
                ),
            ])
        );
    }

    #[test]
    fn test_snapshot_strips_key_attributes() {
        let reference = reference::DocumentRef::new("users/u1/bookmarks", "b1");
        let fields = value::Fields::from([("url".to_string(), value::Value::from("https://x"))]);
        let snapshot = config()
            .snapshot(config().item(&reference, fields.clone()))
            .unwrap();
        assert_eq!(snapshot, Snapshot { reference, fields });
    }

    #[test]
    fn test_snapshot_without_key_is_rejected() {
        let item = collections::HashMap::from([(
            "name".to_string(),
            types::AttributeValue::S("John".to_string()),
        )]);
        assert!(matches!(
            config().snapshot(item),
            Err(Error::UnsupportedValue(_))
        ));
    }

    #[rstest]
    #[case::empty(vec![], None)]
    #[case::single(vec![("a", value::Value::Integer(1))], Some("SET #merge0 = :merge0"))]
    #[case::many(
        vec![
            ("a", value::Value::Integer(1)),
            ("b", value::Value::Boolean(true)),
        ],
        Some("SET #merge0 = :merge0, #merge1 = :merge1")
    )]
    fn test_merge_expression(
        #[case] fields: Vec<(&str, value::Value)>,
        #[case] expected: Option<&str>,
    ) {
        let fields: value::Fields = fields
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        let count = fields.len();
        let update = merge_expression(fields);
        assert_eq!(
            update.as_ref().map(|update| update.expression.as_str()),
            expected
        );
        if let Some(update) = update {
            assert_eq!(update.expression_attribute_names.len(), count);
            assert_eq!(update.expression_attribute_values.len(), count);
        }
    }

    #[rstest]
    #[case::present(
        Some(value::Value::Integer(3)),
        "#field = :expected",
        1
    )]
    #[case::absent(
        None,
        "attribute_exists(#collection) AND attribute_not_exists(#field)",
        0
    )]
    fn test_guard(
        #[case] expected: Option<value::Value>,
        #[case] expression: &str,
        #[case] values: usize,
    ) {
        let guard = config().guard("count", expected.as_ref());
        assert_eq!(guard.expression, expression);
        assert_eq!(
            guard.expression_attribute_names.get("#field").map(String::as_str),
            Some("count")
        );
        assert_eq!(guard.expression_attribute_values.len(), values);
    }

    fn set(id: &str, pairs: &[(&str, i64)]) -> WriteOperation {
        WriteOperation::Set {
            reference: reference::DocumentRef::new("users", id),
            fields: pairs
                .iter()
                .map(|(name, number)| (name.to_string(), value::Value::Integer(*number)))
                .collect(),
        }
    }

    fn merge(id: &str, pairs: &[(&str, i64)]) -> WriteOperation {
        match set(id, pairs) {
            WriteOperation::Set { reference, fields } => WriteOperation::Merge { reference, fields },
            other => other,
        }
    }

    fn delete(id: &str) -> WriteOperation {
        WriteOperation::Delete {
            reference: reference::DocumentRef::new("users", id),
        }
    }

    #[rstest]
    #[case::distinct_documents(
        vec![set("a", &[("x", 1)]), merge("b", &[("y", 2)]), delete("c")],
        vec![set("a", &[("x", 1)]), merge("b", &[("y", 2)]), delete("c")]
    )]
    #[case::merge_into_set(
        vec![set("a", &[("x", 1)]), merge("a", &[("x", 2), ("y", 3)])],
        vec![set("a", &[("x", 2), ("y", 3)])]
    )]
    #[case::merge_into_merge(
        vec![merge("a", &[("x", 1)]), merge("a", &[("y", 2)])],
        vec![merge("a", &[("x", 1), ("y", 2)])]
    )]
    #[case::delete_wins(
        vec![set("a", &[("x", 1)]), merge("a", &[("y", 2)]), delete("a")],
        vec![delete("a")]
    )]
    #[case::merge_after_delete(
        vec![delete("a"), merge("a", &[("y", 2)])],
        vec![set("a", &[("y", 2)])]
    )]
    #[case::set_replaces(
        vec![merge("a", &[("x", 1)]), set("a", &[("y", 2)])],
        vec![set("a", &[("y", 2)])]
    )]
    #[case::keeps_first_position(
        vec![set("a", &[("x", 1)]), delete("b"), merge("a", &[("y", 2)])],
        vec![set("a", &[("x", 1), ("y", 2)]), delete("b")]
    )]
    fn test_coalesce(#[case] operations: Vec<WriteOperation>, #[case] expected: Vec<WriteOperation>) {
        assert_eq!(coalesce(operations), expected);
    }

    #[test]
    fn test_key_condition() {
        let condition = config().key_condition("users");
        assert_eq!(condition.expression, "#collection = :collection");
        assert_eq!(
            condition.expression_attribute_values.get(":collection"),
            Some(&types::AttributeValue::S("users".to_string()))
        );
    }
}
