//! Common building blocks shared by documents, collections and stores.
//!
//! This module provides the dynamic value model, document references and the
//! queries used to narrow collection reads.

/// Filters, ordering and limits for collection reads.
pub mod query;

/// References identifying collections and documents.
pub mod reference;

/// Dynamically typed field values and the document codec.
pub mod value;

use aws_sdk_dynamodb::types;
use std::collections;

fn get_expression(left: String, operator: &str, right: String) -> String {
    if left.is_empty() {
        right
    } else if right.is_empty() {
        left
    } else {
        format!("{left}{operator}{right}")
    }
}

/// A DynamoDB expression together with its name and value placeholders.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ExpressionInput {
    pub(crate) expression: String,
    pub(crate) expression_attribute_names: collections::HashMap<String, String>,
    pub(crate) expression_attribute_values: collections::HashMap<String, types::AttributeValue>,
}

impl ExpressionInput {
    pub(crate) fn merge(operator: &str, items: Vec<Self>) -> Self {
        let mut operation = Self::default();
        for item in items {
            operation
                .expression_attribute_names
                .extend(item.expression_attribute_names);
            operation
                .expression_attribute_values
                .extend(item.expression_attribute_values);
            operation.expression = get_expression(operation.expression, operator, item.expression);
        }
        operation
    }

    /// Names and values wrapped the way the SDK builders expect them.
    pub(crate) fn placeholders(
        &self,
    ) -> (
        Option<collections::HashMap<String, String>>,
        Option<collections::HashMap<String, types::AttributeValue>>,
    ) {
        let names = (!self.expression_attribute_names.is_empty())
            .then(|| self.expression_attribute_names.clone());
        let values = (!self.expression_attribute_values.is_empty())
            .then(|| self.expression_attribute_values.clone());
        (names, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    fn input(expression: &str, name: &str) -> ExpressionInput {
        ExpressionInput {
            expression: expression.to_string(),
            expression_attribute_names: collections::HashMap::from([(
                format!("#{name}"),
                name.to_string(),
            )]),
            ..Default::default()
        }
    }

    #[rstest]
    #[case::empty(vec![], "")]
    #[case::single(vec![input("#a = :a", "a")], "#a = :a")]
    #[case::many(
        vec![
            input("#a = :a", "a"),
            input("#b = :b", "b"),
        ],
        "#a = :a AND #b = :b"
    )]
    fn test_merge(#[case] items: Vec<ExpressionInput>, #[case] expected: &str) {
        let count = items.len();
        let merged = ExpressionInput::merge(" AND ", items);
        assert_eq!(merged.expression, expected);
        assert_eq!(merged.expression_attribute_names.len(), count);
    }

    #[test]
    fn test_placeholders_skip_empty_maps() {
        let (names, values) = input("#a", "a").placeholders();
        assert!(names.is_some());
        assert!(values.is_none());
    }
}
