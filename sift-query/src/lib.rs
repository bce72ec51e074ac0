//! # sift-query
//!
//! Declarative, validated filtering for relational query builders.
//!
//! This crate provides:
//! - Typed filter fields that coerce raw request input (`Field`)
//! - A pluggable operator registry (`operator`)
//! - Filter sets with relation paths, nested groups and method fields
//! - Whole-input validation with every failure reported at once
//! - Ordering from `"name, -other"` strings
//! - Page-based pagination
//!
//! ## Filter Sets
//!
//! A filter set is declared once against a schema and shared. Each request
//! composes its input into a predicate and applies it to a query:
//!
//! ```rust,ignore
//! let users = FilterSet::builder("UserFilter", "User")
//!     .field("email", Field::string().operator(OperatorId::ICONTAINS))
//!     .field("company", Field::string().target("company.name"))
//!     .order_by("-created_at")
//!     .build(&schema)?;
//!
//! let rows = users.composer(input).session(session).apply_all()?;
//! ```
//!
//! ## Validation
//!
//! Field failures are collected, never short-circuited:
//!
//! ```rust
//! use sift_query::{FieldError, FilterValidationError};
//!
//! let err = FilterValidationError::new(vec![
//!     FieldError::new("age", "Expected to be of type int"),
//!     FieldError::new("birthday", "time data 'x' does not match format '%Y-%m-%d'"),
//! ]);
//! assert_eq!(err.len(), 2);
//! assert_eq!(err.message_for("age"), Some("Expected to be of type int"));
//! ```
//!
//! ## Predicates
//!
//! ```rust
//! use sift_query::{Filter, FilterValue};
//!
//! let filter = Filter::and([
//!     Filter::Equals("users.is_active".into(), FilterValue::Bool(true)),
//!     Filter::Gte("users.age".into(), FilterValue::Int(18)),
//! ]);
//! let (sql, params) = filter.to_sql(0);
//! assert_eq!(sql, "(users.is_active = $1 AND users.age >= $2)");
//! assert_eq!(params.len(), 2);
//! ```

pub mod composer;
pub mod error;
pub mod field;
pub mod filter;
pub mod filter_set;
pub mod join;
pub mod logging;
pub mod method;
pub mod nested;
pub mod operator;
pub mod ordering;
pub mod pagination;
pub mod query;
pub mod traits;
pub mod types;

#[cfg(test)]
mod test_support;

/// Raw request input: a JSON object.
pub type Data = serde_json::Map<String, serde_json::Value>;

pub use composer::{FilterComposer, Predicate};
pub use error::{
    ErrorCode, ErrorCollector, FieldError, FieldValidationError, FilterError, FilterResult,
    FilterValidationError, QueryError, QueryResult,
};
pub use field::{CustomTarget, Field, FieldKind};
pub use filter::{Filter, FilterValue};
pub use filter_set::{BoundField, BoundMethod, FilterSet, FilterSetBuilder};
pub use join::{Join, JoinSet};
pub use method::{MethodContext, MethodField};
pub use nested::NestedFilter;
pub use operator::{Arity, Combinator, FnOperator, Operator, OperatorId, OperatorRegistry};
pub use ordering::{OrderSpec, OrderTerm};
pub use pagination::{PageInfo, Pagination, Paginator};
pub use query::SelectQuery;
pub use traits::{FilterQuery, InputValidator, QueryEngine, Session};
pub use types::{NullsOrder, OrderBy, OrderByField, SortOrder};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::Data;
    pub use crate::composer::FilterComposer;
    pub use crate::error::{FilterError, FilterResult, FilterValidationError, QueryError, QueryResult};
    pub use crate::field::Field;
    pub use crate::filter::{Filter, FilterValue};
    pub use crate::filter_set::FilterSet;
    pub use crate::method::MethodField;
    pub use crate::nested::NestedFilter;
    pub use crate::operator::{Combinator, OperatorId};
    pub use crate::pagination::Paginator;
    pub use crate::query::SelectQuery;
    pub use crate::traits::{FilterQuery, QueryEngine, Session};
    pub use crate::types::{OrderByField, SortOrder};
}
