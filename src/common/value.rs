use crate::error::{Error, Result};

use aws_sdk_dynamodb::types;
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_dynamo::{from_item, to_attribute_value, to_item};
use std::{collections, fmt};

/// The fields of one document, in insertion order.
pub type Fields = IndexMap<String, Value>;

/// A dynamically typed field value.
///
/// Extraction never panics: the `into_*` methods hand the value back when it
/// holds another type.
///
/// ```rust
/// use document_crud::common::value::{Value, ValueKind};
///
/// let value = Value::from(42);
/// assert_eq!(value.kind(), ValueKind::Integer);
/// assert_eq!(value.into_integer(), Ok(42));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// An explicit null.
    Null,
    /// A boolean.
    Boolean(bool),
    /// A 64-bit signed integer.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// A UTF-8 string.
    String(String),
    /// An instant in time.
    Timestamp(DateTime<Utc>),
    /// An ordered sequence of values.
    Array(Vec<Value>),
    /// A string-keyed mapping of values.
    Map(IndexMap<String, Value>),
}

/// The semantic type of a [`Value`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ValueKind {
    /// [`Value::Null`]
    Null,
    /// [`Value::Boolean`]
    Boolean,
    /// [`Value::Integer`]
    Integer,
    /// [`Value::Float`]
    Float,
    /// [`Value::String`]
    String,
    /// [`Value::Timestamp`]
    Timestamp,
    /// [`Value::Array`]
    Array,
    /// [`Value::Map`]
    Map,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Timestamp => "timestamp",
            Self::Array => "array",
            Self::Map => "map",
        };
        f.write_str(name)
    }
}

impl Value {
    /// The semantic type of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Integer(_) => ValueKind::Integer,
            Self::Float(_) => ValueKind::Float,
            Self::String(_) => ValueKind::String,
            Self::Timestamp(_) => ValueKind::Timestamp,
            Self::Array(_) => ValueKind::Array,
            Self::Map(_) => ValueKind::Map,
        }
    }

    /// Whether this value is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Extract a string.
    pub fn into_string(self) -> Result<String, Self> {
        match self {
            Self::String(value) => Ok(value),
            other => Err(other),
        }
    }

    /// Extract an integer.
    pub fn into_integer(self) -> Result<i64, Self> {
        match self {
            Self::Integer(value) => Ok(value),
            other => Err(other),
        }
    }

    /// Extract a boolean.
    pub fn into_boolean(self) -> Result<bool, Self> {
        match self {
            Self::Boolean(value) => Ok(value),
            other => Err(other),
        }
    }

    /// Extract an array.
    pub fn into_array(self) -> Result<Vec<Value>, Self> {
        match self {
            Self::Array(value) => Ok(value),
            other => Err(other),
        }
    }

    /// Extract a map.
    pub fn into_map(self) -> Result<IndexMap<String, Value>, Self> {
        match self {
            Self::Map(value) => Ok(value),
            other => Err(other),
        }
    }

    /// Extract an instant.
    ///
    /// Stores without a native timestamp type persist instants as RFC 3339
    /// strings, so a string that parses as one is accepted too.
    pub fn into_timestamp(self) -> Result<DateTime<Utc>, Self> {
        match self {
            Self::Timestamp(value) => Ok(value),
            Self::String(value) => match DateTime::parse_from_rfc3339(&value) {
                Ok(parsed) => Ok(parsed.with_timezone(&Utc)),
                Err(_) => Err(Self::String(value)),
            },
            other => Err(other),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::Array(value)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(value: IndexMap<String, Value>) -> Self {
        Self::Map(value)
    }
}

fn parse_number(number: String) -> Result<Value> {
    if let Ok(integer) = number.parse::<i64>() {
        return Ok(Value::Integer(integer));
    }
    match number.parse::<f64>() {
        Ok(float) => Ok(Value::Float(float)),
        Err(_) => Err(Error::UnsupportedValue(format!("number `{number}`"))),
    }
}

impl From<Value> for types::AttributeValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null(true),
            Value::Boolean(value) => Self::Bool(value),
            Value::Integer(value) => Self::N(value.to_string()),
            Value::Float(value) => Self::N(value.to_string()),
            Value::String(value) => Self::S(value),
            Value::Timestamp(value) => Self::S(value.to_rfc3339_opts(SecondsFormat::Nanos, true)),
            Value::Array(values) => Self::L(values.into_iter().map(Self::from).collect()),
            Value::Map(map) => Self::M(
                map.into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl TryFrom<types::AttributeValue> for Value {
    type Error = Error;

    fn try_from(attribute_value: types::AttributeValue) -> Result<Self> {
        let value = match attribute_value {
            types::AttributeValue::Null(_) => Self::Null,
            types::AttributeValue::Bool(value) => Self::Boolean(value),
            types::AttributeValue::N(number) => parse_number(number)?,
            types::AttributeValue::S(value) => Self::String(value),
            types::AttributeValue::L(values) => Self::Array(
                values
                    .into_iter()
                    .map(Self::try_from)
                    .collect::<Result<_>>()?,
            ),
            types::AttributeValue::M(map) => Self::Map(attributes_to_fields(map)?),
            types::AttributeValue::Ss(values) => {
                Self::Array(values.into_iter().map(Self::String).collect())
            }
            types::AttributeValue::Ns(numbers) => Self::Array(
                numbers
                    .into_iter()
                    .map(parse_number)
                    .collect::<Result<_>>()?,
            ),
            other => return Err(Error::UnsupportedValue(format!("{other:?}"))),
        };
        Ok(value)
    }
}

/// Fail on NaN or infinite floats, nested ones included.
pub(crate) fn ensure_finite(value: &Value) -> Result<()> {
    match value {
        Value::Float(number) if !number.is_finite() => Err(Error::UnsupportedValue(format!(
            "non-finite number `{number}`"
        ))),
        Value::Array(values) => values.iter().try_for_each(ensure_finite),
        Value::Map(map) => map.values().try_for_each(ensure_finite),
        _ => Ok(()),
    }
}

pub(crate) fn attributes_to_fields(
    attributes: collections::HashMap<String, types::AttributeValue>,
) -> Result<Fields> {
    let mut fields: Fields = attributes
        .into_iter()
        .map(|(name, value)| Ok((name, Value::try_from(value)?)))
        .collect::<Result<_>>()?;
    fields.sort_keys();
    Ok(fields)
}

pub(crate) fn fields_to_attributes(
    fields: Fields,
) -> collections::HashMap<String, types::AttributeValue> {
    fields
        .into_iter()
        .map(|(name, value)| (name, value.into()))
        .collect()
}

/// Encode an application value into document fields.
pub(crate) fn to_fields<T: Serialize>(value: &T) -> Result<Fields> {
    let item: collections::HashMap<String, types::AttributeValue> = to_item(value)?;
    attributes_to_fields(item)
}

/// Decode document fields into an application value.
pub(crate) fn from_fields<T: DeserializeOwned>(fields: Fields) -> Result<T> {
    let value = from_item(fields_to_attributes(fields))?;
    Ok(value)
}

/// Encode an application value into a single field value.
pub(crate) fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    let attribute_value: types::AttributeValue = to_attribute_value(value)?;
    attribute_value.try_into()
}
