//! Ordering specifications.
//!
//! An [`OrderSpec`] is a list of terms, each either an already-built
//! [`OrderByField`] or a column name with an optional `-` prefix for
//! descending order. Names are resolved against the filtered model only;
//! relation paths are not followed.
//!
//! ```rust
//! use sift_query::OrderSpec;
//! use sift_query::types::SortOrder;
//! use sift_schema::{ModelBuilder, ScalarType};
//!
//! let user = ModelBuilder::new("User", "users")
//!     .column("first_name", ScalarType::String)
//!     .column("last_name", ScalarType::String)
//!     .build();
//!
//! let terms = OrderSpec::parse("first_name, -last_name").resolve(&user).unwrap();
//! assert_eq!(terms[0].column, "users.first_name");
//! assert_eq!(terms[1].order, SortOrder::Desc);
//! ```

use serde_json::Value;
use sift_schema::Model;

use crate::error::{QueryError, QueryResult};
use crate::types::{OrderByField, SortOrder};

/// One ordering term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderTerm {
    /// A pre-built expression, used as is.
    Expr(OrderByField),
    /// A column name, optionally prefixed with `-`.
    Name(String),
}

/// An ordered list of ordering terms. Later terms break ties of earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderSpec(Vec<OrderTerm>);

impl OrderSpec {
    /// Parse a comma separated list of names.
    pub fn parse(spec: &str) -> Self {
        Self(
            spec.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| OrderTerm::Name(name.to_string()))
                .collect(),
        )
    }

    /// Read an ordering from input: a string or a list of strings.
    ///
    /// Null reads as no ordering at all.
    pub fn from_json(value: &Value) -> QueryResult<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(Self::parse(s))),
            Value::Array(items) => {
                let mut terms = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => terms.extend(Self::parse(s).0),
                        other => {
                            return Err(QueryError::invalid_order_spec(format!(
                                "order_by entries must be strings, got {}",
                                other
                            )));
                        }
                    }
                }
                Ok(Some(Self(terms)))
            }
            other => Err(QueryError::invalid_order_spec(format!(
                "order_by must be a string or a list of strings, got {}",
                other
            ))),
        }
    }

    /// Check if there are no terms.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The terms in order.
    pub fn terms(&self) -> &[OrderTerm] {
        &self.0
    }

    /// Resolve every term against `model`.
    ///
    /// Fails on the first name that is not a column of `model`, before the
    /// caller touches any query.
    pub fn resolve(&self, model: &Model) -> QueryResult<Vec<OrderByField>> {
        let mut fields = Vec::with_capacity(self.0.len());
        for term in &self.0 {
            match term {
                OrderTerm::Expr(field) => fields.push(field.clone()),
                OrderTerm::Name(name) => {
                    let name = name.trim();
                    if name.is_empty() {
                        continue;
                    }
                    let (order, column) = SortOrder::split_prefix(name);
                    if model.column(column).is_none() {
                        return Err(QueryError::unknown_order_field(model.name(), column));
                    }
                    fields.push(OrderByField::new(
                        format!("{}.{}", model.table(), column),
                        order,
                    ));
                }
            }
        }
        Ok(fields)
    }
}

impl From<&str> for OrderSpec {
    fn from(spec: &str) -> Self {
        Self::parse(spec)
    }
}

impl From<Vec<&str>> for OrderSpec {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().flat_map(|n| Self::parse(n).0).collect())
    }
}

impl From<OrderByField> for OrderSpec {
    fn from(field: OrderByField) -> Self {
        Self(vec![OrderTerm::Expr(field)])
    }
}

impl From<Vec<OrderByField>> for OrderSpec {
    fn from(fields: Vec<OrderByField>) -> Self {
        Self(fields.into_iter().map(OrderTerm::Expr).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::test_support::schema;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_string() {
        let spec = OrderSpec::parse(" first_name , -last_name,, ");
        assert_eq!(
            spec.terms(),
            &[
                OrderTerm::Name("first_name".into()),
                OrderTerm::Name("-last_name".into())
            ]
        );
    }

    #[test]
    fn test_resolve_directions() {
        let schema = schema();
        let user = schema.model("User").unwrap();

        let fields = OrderSpec::parse("first_name, -last_name").resolve(user).unwrap();
        assert_eq!(
            fields,
            vec![
                OrderByField::asc("users.first_name"),
                OrderByField::desc("users.last_name"),
            ]
        );
    }

    #[test]
    fn test_unknown_field() {
        let schema = schema();
        let user = schema.model("User").unwrap();

        let err = OrderSpec::parse("first_name, -nickname").resolve(user).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownOrderField);
        assert_eq!(
            err.message,
            "User does not have a field called 'nickname' to use in an ORDER BY clause."
        );
    }

    #[test]
    fn test_expression_terms_pass_through() {
        let schema = schema();
        let user = schema.model("User").unwrap();

        let spec = OrderSpec::from(vec![OrderByField::desc("LOWER(users.email)")]);
        assert_eq!(
            spec.resolve(user).unwrap(),
            vec![OrderByField::desc("LOWER(users.email)")]
        );
    }

    #[test]
    fn test_from_json() {
        assert_eq!(OrderSpec::from_json(&json!(null)).unwrap(), None);
        assert_eq!(
            OrderSpec::from_json(&json!(["-age", "email"])).unwrap(),
            Some(OrderSpec::from(vec!["-age", "email"]))
        );
        let err = OrderSpec::from_json(&json!(5)).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidOrderSpec);
        assert!(OrderSpec::from_json(&json!([1])).is_err());
    }
}
