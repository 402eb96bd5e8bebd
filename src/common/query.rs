use crate::{common, common::value, store};

use aws_sdk_dynamodb::types;
use std::{cmp, collections};

/// Sort direction of an ordering clause.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Direction {
    /// Smallest values first.
    #[default]
    Ascending,
    /// Largest values first.
    Descending,
}

/// Condition a field must satisfy for a document to match.
///
/// ```rust
/// use document_crud::common::{query, value::Value};
///
/// let eq = query::Condition::Equals(Value::from("active"));
/// let gt = query::Condition::GreaterThan(Value::from(100));
/// let absent = query::Condition::Null;
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    /// The field is a string starting with the prefix.
    BeginsWith(String),
    /// The field lies between both bounds (inclusive).
    Between(value::Value, value::Value),
    /// The field is an array holding the value, or a string holding the substring.
    Contains(value::Value),
    /// The field equals the value.
    Equals(value::Value),
    /// The field is greater than the value.
    GreaterThan(value::Value),
    /// The field is greater than or equal to the value.
    GreaterThanOrEqual(value::Value),
    /// The field equals one of the values.
    In(Vec<value::Value>),
    /// The field is less than the value.
    LessThan(value::Value),
    /// The field is less than or equal to the value.
    LessThanOrEqual(value::Value),
    /// The field is present and differs from the value.
    NotEqual(value::Value),
    /// The field is present.
    NotNull,
    /// The field is absent.
    Null,
}

/// Order two values of compatible types; integers and floats compare numerically.
pub(crate) fn compare(left: &value::Value, right: &value::Value) -> Option<cmp::Ordering> {
    use value::Value;

    match (left, right) {
        (Value::Null, Value::Null) => Some(cmp::Ordering::Equal),
        (Value::Boolean(left), Value::Boolean(right)) => Some(left.cmp(right)),
        (Value::Integer(left), Value::Integer(right)) => Some(left.cmp(right)),
        (Value::Integer(left), Value::Float(right)) => (*left as f64).partial_cmp(right),
        (Value::Float(left), Value::Integer(right)) => left.partial_cmp(&(*right as f64)),
        (Value::Float(left), Value::Float(right)) => left.partial_cmp(right),
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        (Value::Timestamp(left), Value::Timestamp(right)) => Some(left.cmp(right)),
        _ => None,
    }
}

fn equals(left: &value::Value, right: &value::Value) -> bool {
    compare(left, right) == Some(cmp::Ordering::Equal) || left == right
}

impl Condition {
    /// Whether a field value (or its absence) satisfies the condition.
    pub fn matches(&self, field: Option<&value::Value>) -> bool {
        let field = match (self, field) {
            (Self::Null, field) => return field.is_none(),
            (Self::NotNull, field) => return field.is_some(),
            (_, None) => return false,
            (_, Some(field)) => field,
        };
        match self {
            Self::BeginsWith(prefix) => {
                matches!(field, value::Value::String(text) if text.starts_with(prefix.as_str()))
            }
            Self::Between(low, high) => {
                compare(field, low).is_some_and(cmp::Ordering::is_ge)
                    && compare(field, high).is_some_and(cmp::Ordering::is_le)
            }
            Self::Contains(needle) => match (field, needle) {
                (value::Value::Array(items), needle) => items.iter().any(|item| equals(item, needle)),
                (value::Value::String(text), value::Value::String(needle)) => {
                    text.contains(needle.as_str())
                }
                _ => false,
            },
            Self::Equals(other) => equals(field, other),
            Self::GreaterThan(other) => compare(field, other).is_some_and(cmp::Ordering::is_gt),
            Self::GreaterThanOrEqual(other) => {
                compare(field, other).is_some_and(cmp::Ordering::is_ge)
            }
            Self::In(values) => values.iter().any(|other| equals(field, other)),
            Self::LessThan(other) => compare(field, other).is_some_and(cmp::Ordering::is_lt),
            Self::LessThanOrEqual(other) => compare(field, other).is_some_and(cmp::Ordering::is_le),
            Self::NotEqual(other) => !equals(field, other),
            Self::NotNull | Self::Null => unreachable!("presence conditions return early"),
        }
    }

    fn get_expression(
        &self,
        name_placeholder: &str,
        index: &mut usize,
    ) -> (String, collections::HashMap<String, types::AttributeValue>) {
        let mut expression_attribute_values = collections::HashMap::new();
        let mut placeholder = |value: &value::Value| {
            let value_placeholder = format!(":filter{index}");
            *index += 1;
            expression_attribute_values.insert(value_placeholder.clone(), value.clone().into());
            value_placeholder
        };
        let expression = match self {
            Self::BeginsWith(prefix) => {
                let value_placeholder = placeholder(&value::Value::String(prefix.clone()));
                format!("begins_with({name_placeholder}, {value_placeholder})")
            }
            Self::Between(low, high) => {
                let low = placeholder(low);
                let high = placeholder(high);
                format!("{name_placeholder} BETWEEN {low} AND {high}")
            }
            Self::Contains(value) => {
                format!("contains({name_placeholder}, {})", placeholder(value))
            }
            Self::Equals(value) => format!("{name_placeholder} = {}", placeholder(value)),
            Self::GreaterThan(value) => format!("{name_placeholder} > {}", placeholder(value)),
            Self::GreaterThanOrEqual(value) => {
                format!("{name_placeholder} >= {}", placeholder(value))
            }
            Self::In(values) => {
                let placeholders: Vec<_> = values.iter().map(&mut placeholder).collect();
                format!("{name_placeholder} IN ({})", placeholders.join(", "))
            }
            Self::LessThan(value) => format!("{name_placeholder} < {}", placeholder(value)),
            Self::LessThanOrEqual(value) => {
                format!("{name_placeholder} <= {}", placeholder(value))
            }
            Self::NotEqual(value) => format!("{name_placeholder} <> {}", placeholder(value)),
            Self::NotNull => format!("attribute_exists({name_placeholder})"),
            Self::Null => format!("attribute_not_exists({name_placeholder})"),
        };
        (expression, expression_attribute_values)
    }
}

/// Condition applied to a named field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldCondition {
    /// The condition to apply.
    pub condition: Condition,
    /// The name of the field.
    pub name: String,
}

/// Filters, ordering and limit narrowing a collection read.
///
/// All conditions must hold. Ordering drops documents lacking an ordered field,
/// then the limit keeps the first matches.
///
/// ```rust
/// use document_crud::common::{query, value::Value};
///
/// let query = query::Query::new()
///     .filter("age", query::Condition::GreaterThanOrEqual(Value::from(18)))
///     .order_by("age", query::Direction::Descending)
///     .limit(10);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    /// Conditions every returned document satisfies.
    pub conditions: Vec<FieldCondition>,
    /// Ordering clauses, most significant first.
    pub order_by: Vec<(String, Direction)>,
    /// Maximum number of documents returned.
    pub limit: Option<usize>,
}

impl Query {
    /// A query matching every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition on a field.
    pub fn filter(mut self, name: impl Into<String>, condition: Condition) -> Self {
        self.conditions.push(FieldCondition {
            condition,
            name: name.into(),
        });
        self
    }

    /// Add an ordering clause.
    pub fn order_by(mut self, name: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push((name.into(), direction));
        self
    }

    /// Keep at most `limit` documents.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a document satisfies every condition.
    pub fn matches(&self, fields: &value::Fields) -> bool {
        self.conditions
            .iter()
            .all(|key| key.condition.matches(fields.get(&key.name)))
    }

    /// Filter, order and limit snapshots held in memory.
    pub(crate) fn apply(&self, snapshots: Vec<store::Snapshot>) -> Vec<store::Snapshot> {
        let matching = snapshots
            .into_iter()
            .filter(|snapshot| self.matches(&snapshot.fields))
            .collect();
        self.arrange(matching)
    }

    /// Order and limit snapshots that already satisfy the conditions.
    pub(crate) fn arrange(&self, mut snapshots: Vec<store::Snapshot>) -> Vec<store::Snapshot> {
        if !self.order_by.is_empty() {
            snapshots.retain(|snapshot| {
                self.order_by
                    .iter()
                    .all(|(name, _)| snapshot.fields.contains_key(name))
            });
            snapshots.sort_by(|left, right| {
                for (name, direction) in &self.order_by {
                    let ordering = match (left.fields.get(name), right.fields.get(name)) {
                        (Some(left), Some(right)) => {
                            compare(left, right).unwrap_or(cmp::Ordering::Equal)
                        }
                        _ => cmp::Ordering::Equal,
                    };
                    let ordering = match direction {
                        Direction::Ascending => ordering,
                        Direction::Descending => ordering.reverse(),
                    };
                    if ordering.is_ne() {
                        return ordering;
                    }
                }
                cmp::Ordering::Equal
            });
        }
        if let Some(limit) = self.limit {
            snapshots.truncate(limit);
        }
        snapshots
    }

    /// The conditions rendered as a DynamoDB filter expression.
    pub(crate) fn filter_expression(&self) -> Option<common::ExpressionInput> {
        if self.conditions.is_empty() {
            return None;
        }
        let mut index = 0;
        let operations = self
            .conditions
            .iter()
            .enumerate()
            .map(|(position, key)| {
                let name_placeholder = format!("#filter{position}");
                let (expression, expression_attribute_values) =
                    key.condition.get_expression(&name_placeholder, &mut index);
                common::ExpressionInput {
                    expression,
                    expression_attribute_names: collections::HashMap::from([(
                        name_placeholder,
                        key.name.clone(),
                    )]),
                    expression_attribute_values,
                }
            })
            .collect();
        Some(common::ExpressionInput::merge(" AND ", operations))
    }
}
