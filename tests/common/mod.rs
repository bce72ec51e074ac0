//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;

use serde_json::Value;
use sift::prelude::*;

/// Records every statement it is asked to run.
#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    log: Arc<Mutex<Vec<(String, Vec<FilterValue>)>>>,
    count: u64,
}

impl RecordingEngine {
    pub fn with_count(count: u64) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.lock().iter().map(|(sql, _)| sql.clone()).collect()
    }

    pub fn last_params(&self) -> Vec<FilterValue> {
        self.log
            .lock()
            .last()
            .map(|(_, params)| params.clone())
            .unwrap_or_default()
    }
}

impl QueryEngine for RecordingEngine {
    type Row = Value;

    fn query_many(&self, sql: &str, params: Vec<FilterValue>) -> QueryResult<Vec<Value>> {
        self.log.lock().push((sql.to_string(), params));
        Ok(Vec::new())
    }

    fn count(&self, sql: &str, params: Vec<FilterValue>) -> QueryResult<u64> {
        self.log.lock().push((sql.to_string(), params));
        Ok(self.count)
    }
}

pub type Query = SelectQuery<RecordingEngine>;

/// Turn a `json!` object into filter input.
pub fn input(value: Value) -> Data {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

/// Companies, users and articles.
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
            ModelBuilder::new("Article", "articles")
                .primary_key("id", ScalarType::Int)
                .column("title", ScalarType::String)
                .column("author_id", ScalarType::Int)
                .nullable("editor_id", ScalarType::Int)
                .nullable("published_at", ScalarType::DateTime)
                .many_to_one("author", "User", "author_id", "id")
                .many_to_one("editor", "User", "editor_id", "id")
                .build(),
        )
}
