//! Shared fixtures for unit tests.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use sift_schema::{ModelBuilder, ScalarType, Schema};

use crate::error::QueryResult;
use crate::filter::FilterValue;
use crate::query::SelectQuery;
use crate::traits::QueryEngine;

/// Records executed SQL and answers with fixed results.
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    executed: Arc<Mutex<Vec<String>>>,
    count: u64,
    rows: Vec<Value>,
}

impl MockEngine {
    pub fn with_count(count: u64) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    pub fn count_calls(&self) -> usize {
        self.executed
            .lock()
            .iter()
            .filter(|sql| sql.starts_with("SELECT COUNT(*)"))
            .count()
    }
}

impl QueryEngine for MockEngine {
    type Row = Value;

    fn query_many(&self, sql: &str, _params: Vec<FilterValue>) -> QueryResult<Vec<Value>> {
        self.executed.lock().push(sql.to_string());
        Ok(self.rows.clone())
    }

    fn count(&self, sql: &str, _params: Vec<FilterValue>) -> QueryResult<u64> {
        self.executed.lock().push(sql.to_string());
        Ok(self.count)
    }
}

pub type TestQuery = SelectQuery<MockEngine>;

/// Companies, users, categories and articles.
pub fn schema() -> Schema {
    Schema::new()
        .with_model(
            ModelBuilder::new("Company", "companies")
                .primary_key("id", ScalarType::Int)
                .column("name", ScalarType::String)
                .build(),
        )
        .with_model(
            ModelBuilder::new("User", "users")
                .primary_key("id", ScalarType::Int)
                .column("first_name", ScalarType::String)
                .nullable("last_name", ScalarType::String)
                .column("email", ScalarType::String)
                .nullable("age", ScalarType::Int)
                .column("is_active", ScalarType::Boolean)
                .column("balance", ScalarType::Decimal)
                .nullable("birthday", ScalarType::Date)
                .column("created_at", ScalarType::DateTime)
                .nullable("last_login_time", ScalarType::Time)
                .nullable("company_id", ScalarType::Int)
                .nullable("manager_id", ScalarType::Int)
                .many_to_one("company", "Company", "company_id", "id")
                .many_to_one("manager", "User", "manager_id", "id")
                .build(),
        )
        .with_model(
            ModelBuilder::new("Category", "categories")
                .primary_key("id", ScalarType::Int)
                .column("name", ScalarType::String)
                .build(),
        )
        .with_model(
            ModelBuilder::new("Article", "articles")
                .primary_key("id", ScalarType::Int)
                .column("title", ScalarType::String)
                .column("author_id", ScalarType::Int)
                .column("category_id", ScalarType::Int)
                .nullable("editor_id", ScalarType::Int)
                .nullable("published_at", ScalarType::DateTime)
                .many_to_one("author", "User", "author_id", "id")
                .many_to_one("editor", "User", "editor_id", "id")
                .many_to_one("category", "Category", "category_id", "id")
                .build(),
        )
}
