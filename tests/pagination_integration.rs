//! Integration tests for paging filtered queries.

mod common;

use common::{Query, RecordingEngine, input, schema};
use pretty_assertions::assert_eq;
use serde_json::json;
use sift::prelude::*;
use sift::query::ErrorCode;

fn filter(config: &SiftConfig) -> std::sync::Arc<FilterSet<Query>> {
    FilterSet::builder("UserFilter", "User")
        .field("is_active", Field::boolean())
        .order_by("id")
        .config(config)
        .build(&schema())
        .unwrap()
}

#[test]
fn test_page_walk() {
    let engine = RecordingEngine::with_count(95);
    let config = SiftConfig::from_str("[pagination]\ndefault_page_size = 20\n").unwrap();
    let set = filter(&config);

    let page = set
        .composer(input(json!({"is_active": true})))
        .query(SelectQuery::new(engine.clone(), "users"))
        .paginate()
        .unwrap();

    assert_eq!(page.count(), 95);
    assert_eq!(page.num_pages(), 5);
    assert!(page.has_next_page());
    assert!(!page.has_previous_page());

    let last = page.next_page().unwrap().next_page().unwrap().next_page().unwrap().next_page().unwrap();
    assert_eq!(last.page(), 5);
    assert!(!last.has_next_page());
    assert!(last.next_page().is_err());

    last.get_objects().unwrap();
    let statements = engine.statements();
    assert_eq!(
        statements.iter().filter(|sql| sql.starts_with("SELECT COUNT(*)")).count(),
        1
    );
    insta::assert_snapshot!(
        statements.last().unwrap(),
        @"SELECT users.* FROM users WHERE users.is_active = $1 ORDER BY users.id ASC LIMIT 20 OFFSET 80"
    );
    assert_eq!(engine.last_params(), vec![FilterValue::Bool(true)]);

    assert_eq!(
        last.to_json(),
        json!({
            "count": 95,
            "page_size": 20,
            "page": 5,
            "num_pages": 5,
            "has_next_page": false,
            "has_prev_page": true
        })
    );
}

#[test]
fn test_page_size_from_input_is_capped() {
    let config = SiftConfig::from_str(
        r#"
        [pagination]
        default_page_size = 20
        max_page_size = 50
        page_param = "p"
        page_size_param = "per_page"
        "#,
    )
    .unwrap();
    let set = filter(&config);
    let base = SelectQuery::new(RecordingEngine::with_count(95), "users");

    let page = set
        .composer(input(json!({"p": 2, "per_page": "50"})))
        .query(base.clone())
        .paginate()
        .unwrap();
    assert_eq!(page.page_size(), Some(50));
    assert_eq!(page.num_pages(), 2);

    let err = set
        .composer(input(json!({"per_page": 51, "is_active": "maybe"})))
        .query(base.clone())
        .paginate()
        .unwrap_err();
    let errors = err.validation().unwrap();
    assert_eq!(
        errors.message_for("per_page"),
        Some("Ensure this value is less than or equal to 50.")
    );
    assert_eq!(errors.message_for("is_active"), Some("Expected to be of type bool"));

    let err = set
        .composer(input(json!({"p": 9})))
        .query(base)
        .paginate()
        .unwrap_err();
    assert_eq!(err.query().map(|e| e.code), Some(ErrorCode::PageOutOfRange));
}

#[test]
fn test_unsized_pages() {
    let set = filter(&SiftConfig::default());
    let page = set
        .composer(Data::new())
        .query(SelectQuery::new(RecordingEngine::with_count(7), "users"))
        .paginate()
        .unwrap();

    assert_eq!(page.page_size(), None);
    assert_eq!(page.num_pages(), 1);
    let (sql, _) = page.sliced_query().build_sql();
    assert_eq!(sql, "SELECT users.* FROM users ORDER BY users.id ASC");
}
