//! Seams between filters and the query layer they drive.
//!
//! Filters never talk to a database themselves. They hand predicates, joins
//! and ordering to a [`FilterQuery`], which may be the bundled
//! [`SelectQuery`](crate::query::SelectQuery) or any builder that implements
//! the trait.

use sift_schema::Model;

use crate::Data;
use crate::error::{FilterValidationError, QueryResult};
use crate::filter::{Filter, FilterValue};
use crate::join::Join;
use crate::types::OrderByField;

/// A query builder filters can refine.
///
/// Every method takes `self` and returns the refined query, so a base query
/// can be cloned and reused.
pub trait FilterQuery: Clone {
    /// Row type produced by [`FilterQuery::all`].
    type Row;

    /// AND a predicate into the query.
    fn filter(self, filter: Filter) -> Self;

    /// Add an inner join.
    fn join(self, join: &Join) -> Self;

    /// Check whether `alias` already names a table in the query.
    fn has_join(&self, alias: &str) -> bool;

    /// Append an ordering term.
    fn order_by(self, field: OrderByField) -> Self;

    /// Limit the number of rows.
    fn limit(self, limit: u64) -> Self;

    /// Skip a number of rows.
    fn offset(self, offset: u64) -> Self;

    /// Count the matching rows.
    fn count(&self) -> QueryResult<u64>;

    /// Fetch the matching rows.
    fn all(&self) -> QueryResult<Vec<Self::Row>>;
}

/// A source of base queries for a model.
pub trait Session<Q>: Send + Sync {
    /// Create a fresh query selecting from `model`.
    fn query(&self, model: &Model) -> Q;
}

impl<Q, F> Session<Q> for F
where
    F: Fn(&Model) -> Q + Send + Sync,
{
    fn query(&self, model: &Model) -> Q {
        self(model)
    }
}

/// Executes rendered SQL.
///
/// Implemented by drivers, or by an in-memory mock in tests.
pub trait QueryEngine: Clone {
    /// Row type returned by the engine.
    type Row;

    /// Run a query and return all rows.
    fn query_many(&self, sql: &str, params: Vec<FilterValue>) -> QueryResult<Vec<Self::Row>>;

    /// Run a `SELECT COUNT(*)` query.
    fn count(&self, sql: &str, params: Vec<FilterValue>) -> QueryResult<u64>;
}

/// A whole-input validation hook run before any field is read.
///
/// Its output replaces the input. Errors are merged into the field errors of
/// the same run.
pub trait InputValidator: Send + Sync {
    /// Validate and possibly rewrite the input.
    fn validate(&self, data: &Data) -> Result<Data, FilterValidationError>;
}

impl<F> InputValidator for F
where
    F: Fn(&Data) -> Result<Data, FilterValidationError> + Send + Sync,
{
    fn validate(&self, data: &Data) -> Result<Data, FilterValidationError> {
        self(data)
    }
}
