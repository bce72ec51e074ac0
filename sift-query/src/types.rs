//! Sort primitives shared by ordering and query rendering.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    /// Ascending order (A-Z, 0-9, oldest first).
    #[default]
    Asc,
    /// Descending order (Z-A, 9-0, newest first).
    Desc,
}

impl SortOrder {
    /// Get the SQL keyword for this sort order.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Read a leading `-` as descending and strip it.
    ///
    /// Only one sign is consumed, so `--x` is the descending term `-x`.
    pub fn split_prefix(name: &str) -> (Self, &str) {
        match name.strip_prefix('-') {
            Some(rest) => (Self::Desc, rest),
            None => (Self::Asc, name),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Null placement in sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NullsOrder {
    /// Nulls appear first in the results.
    First,
    /// Nulls appear last in the results.
    Last,
}

impl NullsOrder {
    /// Get the SQL clause for this null order.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::First => "NULLS FIRST",
            Self::Last => "NULLS LAST",
        }
    }
}

/// A single ordering expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByField {
    /// Column or expression to order by.
    pub column: Cow<'static, str>,
    /// Sort direction.
    pub order: SortOrder,
    /// Null placement, if any.
    pub nulls: Option<NullsOrder>,
}

impl OrderByField {
    /// Create a new order by field.
    pub fn new(column: impl Into<Cow<'static, str>>, order: SortOrder) -> Self {
        Self {
            column: column.into(),
            order,
            nulls: None,
        }
    }

    /// Set null placement.
    pub fn nulls(mut self, nulls: NullsOrder) -> Self {
        self.nulls = Some(nulls);
        self
    }

    /// Create an ascending order.
    pub fn asc(column: impl Into<Cow<'static, str>>) -> Self {
        Self::new(column, SortOrder::Asc)
    }

    /// Create a descending order.
    pub fn desc(column: impl Into<Cow<'static, str>>) -> Self {
        Self::new(column, SortOrder::Desc)
    }

    /// Generate the SQL for this term.
    pub fn to_sql(&self) -> String {
        let mut sql = String::with_capacity(self.column.len() + 17);
        self.write_sql(&mut sql);
        sql
    }

    /// Write the SQL directly to a buffer.
    ///
    /// ```rust
    /// use sift_query::types::OrderByField;
    ///
    /// let field = OrderByField::desc("users.last_name");
    /// let mut buffer = String::from("ORDER BY ");
    /// field.write_sql(&mut buffer);
    /// assert_eq!(buffer, "ORDER BY users.last_name DESC");
    /// ```
    pub fn write_sql(&self, buffer: &mut String) {
        buffer.push_str(&self.column);
        buffer.push(' ');
        buffer.push_str(self.order.as_sql());
        if let Some(nulls) = self.nulls {
            buffer.push(' ');
            buffer.push_str(nulls.as_sql());
        }
    }
}

/// An ordered list of order terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBy(Vec<OrderByField>);

impl OrderBy {
    /// Create an empty ordering.
    pub fn none() -> Self {
        Self::default()
    }

    /// Check if there is nothing to order by.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a term.
    pub fn then(mut self, field: OrderByField) -> Self {
        self.0.push(field);
        self
    }

    /// Append a term in place.
    pub fn push(&mut self, field: OrderByField) {
        self.0.push(field);
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the terms.
    pub fn iter(&self) -> std::slice::Iter<'_, OrderByField> {
        self.0.iter()
    }

    /// Generate the clause body (without the `ORDER BY` keyword).
    pub fn to_sql(&self) -> String {
        let mut sql = String::new();
        self.write_sql(&mut sql);
        sql
    }

    /// Write the clause body directly to a buffer.
    pub fn write_sql(&self, buffer: &mut String) {
        for (i, field) in self.0.iter().enumerate() {
            if i > 0 {
                buffer.push_str(", ");
            }
            field.write_sql(buffer);
        }
    }
}

impl From<OrderByField> for OrderBy {
    fn from(field: OrderByField) -> Self {
        Self(vec![field])
    }
}

impl From<Vec<OrderByField>> for OrderBy {
    fn from(fields: Vec<OrderByField>) -> Self {
        Self(fields)
    }
}

impl FromIterator<OrderByField> for OrderBy {
    fn from_iter<I: IntoIterator<Item = OrderByField>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sort_prefix() {
        assert_eq!(SortOrder::split_prefix("-last_name"), (SortOrder::Desc, "last_name"));
        assert_eq!(SortOrder::split_prefix("first_name"), (SortOrder::Asc, "first_name"));
        assert_eq!(SortOrder::split_prefix("--x"), (SortOrder::Desc, "-x"));
    }

    #[test]
    fn test_order_by_field_sql() {
        assert_eq!(OrderByField::asc("id").to_sql(), "id ASC");
        assert_eq!(
            OrderByField::desc("created_at").nulls(NullsOrder::Last).to_sql(),
            "created_at DESC NULLS LAST"
        );
    }

    #[test]
    fn test_order_by_sql() {
        let order = OrderBy::none()
            .then(OrderByField::asc("users.first_name"))
            .then(OrderByField::desc("users.last_name"));
        assert_eq!(order.len(), 2);
        assert_eq!(order.to_sql(), "users.first_name ASC, users.last_name DESC");
        assert!(OrderBy::none().is_empty());
        assert_eq!(OrderBy::none().to_sql(), "");
    }
}
