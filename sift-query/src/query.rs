//! A SQL `SELECT` builder driven by filters.
//!
//! [`SelectQuery`] is the bundled [`FilterQuery`] implementation. It renders
//! PostgreSQL-style `$n` placeholders and hands the SQL to a [`QueryEngine`].
//!
//! ```rust,ignore
//! let query = SelectQuery::for_model(engine, schema.model("User")?)
//!     .filter(Filter::Gte("users.age".into(), 18.into()))
//!     .order_by(OrderByField::desc("users.created_at"))
//!     .limit(20);
//!
//! let (sql, params) = query.build_sql();
//! // SELECT users.* FROM users WHERE users.age >= $1 ORDER BY users.created_at DESC LIMIT 20
//! ```

use sift_schema::Model;

use crate::error::QueryResult;
use crate::filter::{Filter, FilterValue};
use crate::join::Join;
use crate::pagination::Pagination;
use crate::traits::{FilterQuery, QueryEngine};
use crate::types::{OrderBy, OrderByField};

/// A `SELECT` over one table with joins, a predicate, ordering and a slice.
#[derive(Debug, Clone)]
pub struct SelectQuery<E> {
    engine: E,
    table: String,
    joins: Vec<Join>,
    filter: Filter,
    order_by: OrderBy,
    pagination: Pagination,
}

impl<E> SelectQuery<E> {
    /// Create a query over `table`.
    pub fn new(engine: E, table: impl Into<String>) -> Self {
        Self {
            engine,
            table: table.into(),
            joins: Vec::new(),
            filter: Filter::None,
            order_by: OrderBy::none(),
            pagination: Pagination::new(),
        }
    }

    /// Create a query over a model's table.
    pub fn for_model(engine: E, model: &Model) -> Self {
        Self::new(engine, model.table())
    }

    /// The engine the query runs on.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The current predicate.
    pub fn current_filter(&self) -> &Filter {
        &self.filter
    }

    /// The joins in the order they were added.
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// The current ordering.
    pub fn ordering(&self) -> &OrderBy {
        &self.order_by
    }

    /// The current slice.
    pub fn slice(&self) -> Pagination {
        self.pagination
    }

    fn write_from(&self, sql: &mut String) {
        sql.push_str(" FROM ");
        sql.push_str(&self.table);
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.to_sql());
        }
    }

    fn where_clause(&self) -> (String, Vec<FilterValue>) {
        if self.filter.is_none() {
            return (String::new(), Vec::new());
        }
        let (where_sql, params) = self.filter.to_sql(0);
        (format!(" WHERE {}", where_sql), params)
    }

    /// Build the row query.
    pub fn build_sql(&self) -> (String, Vec<FilterValue>) {
        let mut sql = String::with_capacity(64);

        sql.push_str("SELECT ");
        sql.push_str(&self.table);
        sql.push_str(".*");
        self.write_from(&mut sql);

        let (where_sql, params) = self.where_clause();
        sql.push_str(&where_sql);

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            self.order_by.write_sql(&mut sql);
        }

        if !self.pagination.is_empty() {
            sql.push(' ');
            self.pagination.write_sql(&mut sql);
        }

        (sql, params)
    }

    /// Build the count query. Ordering and slicing are ignored.
    pub fn build_count_sql(&self) -> (String, Vec<FilterValue>) {
        let mut sql = String::from("SELECT COUNT(*)");
        self.write_from(&mut sql);

        let (where_sql, params) = self.where_clause();
        sql.push_str(&where_sql);

        (sql, params)
    }
}

impl<E: QueryEngine> FilterQuery for SelectQuery<E> {
    type Row = E::Row;

    fn filter(mut self, filter: Filter) -> Self {
        self.filter = self.filter.and_then(filter);
        self
    }

    fn join(mut self, join: &Join) -> Self {
        if !self.has_join(&join.alias) {
            self.joins.push(join.clone());
        }
        self
    }

    fn has_join(&self, alias: &str) -> bool {
        self.table == alias || self.joins.iter().any(|j| j.alias == alias)
    }

    fn order_by(mut self, field: OrderByField) -> Self {
        self.order_by.push(field);
        self
    }

    fn limit(mut self, limit: u64) -> Self {
        self.pagination = self.pagination.take(limit);
        self
    }

    fn offset(mut self, offset: u64) -> Self {
        self.pagination = self.pagination.skip(offset);
        self
    }

    fn count(&self) -> QueryResult<u64> {
        let (sql, params) = self.build_count_sql();
        tracing::debug!(sql = %sql, "executing count");
        self.engine.count(&sql, params)
    }

    fn all(&self) -> QueryResult<Vec<Self::Row>> {
        let (sql, params) = self.build_sql();
        tracing::debug!(sql = %sql, "executing select");
        self.engine.query_many(&sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockEngine;
    use pretty_assertions::assert_eq;

    fn query() -> SelectQuery<MockEngine> {
        SelectQuery::new(MockEngine::with_count(3), "articles")
    }

    #[test]
    fn test_plain_select() {
        let (sql, params) = query().build_sql();
        assert_eq!(sql, "SELECT articles.* FROM articles");
        assert!(params.is_empty());
    }

    #[test]
    fn test_full_select() {
        let join = Join::new("category", "categories", "articles.category_id = category.id");
        let q = query()
            .join(&join)
            .filter(Filter::Equals("category.name".into(), "rust".into()))
            .filter(Filter::Gt("articles.id".into(), 10.into()))
            .order_by(OrderByField::desc("articles.id"))
            .limit(20)
            .offset(40);

        let (sql, params) = q.build_sql();
        insta::assert_snapshot!(sql, @"SELECT articles.* FROM articles INNER JOIN categories AS category ON articles.category_id = category.id WHERE (category.name = $1 AND articles.id > $2) ORDER BY articles.id DESC LIMIT 20 OFFSET 40");
        assert_eq!(params, vec![FilterValue::from("rust"), FilterValue::Int(10)]);

        let (count_sql, count_params) = q.build_count_sql();
        insta::assert_snapshot!(count_sql, @"SELECT COUNT(*) FROM articles INNER JOIN categories AS category ON articles.category_id = category.id WHERE (category.name = $1 AND articles.id > $2)");
        assert_eq!(count_params.len(), 2);
    }

    #[test]
    fn test_join_skipped_when_present() {
        let join = Join::new("category", "categories", "articles.category_id = category.id");
        let q = query().join(&join).join(&join);
        assert_eq!(q.joins().len(), 1);
        assert!(q.has_join("category"));
        assert!(q.has_join("articles"));
        assert!(!q.has_join("categories"));

        let editor = Join::new("editor", "users", "articles.editor_id = editor.id");
        let author = Join::new("author", "users", "articles.author_id = author.id");
        let q = q.join(&author).join(&editor);
        assert_eq!(q.joins().len(), 3);
    }

    #[test]
    fn test_execution_goes_through_engine() {
        let engine = MockEngine::with_count(3);
        let q = SelectQuery::new(engine.clone(), "users")
            .filter(Filter::Equals("users.email".into(), "a@b.c".into()));

        assert_eq!(q.count().unwrap(), 3);
        let _ = q.all().unwrap();

        let executed = engine.executed();
        assert_eq!(executed.len(), 2);
        assert_eq!(executed[0], "SELECT COUNT(*) FROM users WHERE users.email = $1");
        assert_eq!(executed[1], "SELECT users.* FROM users WHERE users.email = $1");
    }
}
