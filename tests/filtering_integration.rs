//! Integration tests for declaring filter sets and filtering queries.

mod common;

use common::{Query, RecordingEngine, input, schema};
use pretty_assertions::assert_eq;
use serde_json::json;
use sift::prelude::*;
use sift::query::{ErrorCode, FnOperator, FilterValue as Value};

fn users() -> Query {
    SelectQuery::new(RecordingEngine::default(), "users")
}

#[test]
fn test_typed_fields_and_operators() {
    let set = FilterSet::<Query>::builder("UserFilter", "User")
        .field("email", Field::string().operator(OperatorId::ICONTAINS))
        .field("min_age", Field::integer().target("age").operator(OperatorId::GTE))
        .field("active", Field::boolean().target("is_active"))
        .field("born", Field::date().target("birthday").format("%d/%m/%Y"))
        .field("ids", Field::integer().target("id").operator(OperatorId::IN))
        .build(&schema())
        .unwrap();

    let query = set
        .composer(input(json!({
            "email": "example",
            "min_age": "21",
            "active": "true",
            "born": "09/12/1815",
            "ids": [1, "2", 3]
        })))
        .query(users())
        .apply()
        .unwrap();

    let (sql, params) = query.build_sql();
    insta::assert_snapshot!(sql, @"SELECT users.* FROM users WHERE (LOWER(users.email) LIKE LOWER($1) AND users.age >= $2 AND users.is_active = $3 AND users.birthday = $4 AND users.id IN ($5, $6, $7))");
    assert_eq!(params[1], Value::Int(21));
    assert_eq!(params[2], Value::Bool(true));
    assert_eq!(
        params[3],
        Value::Date(chrono::NaiveDate::from_ymd_opt(1815, 12, 9).unwrap())
    );
    assert_eq!(params.len(), 7);
}

#[test]
fn test_every_failure_is_reported() {
    let set = FilterSet::<Query>::builder("UserFilter", "User")
        .field("age", Field::integer())
        .field("birthday", Field::date())
        .field("email", Field::string())
        .field("is_active", Field::boolean())
        .build(&schema())
        .unwrap();

    let err = set
        .composer(input(json!({
            "age": "twelve",
            "birthday": "yesterday",
            "email": "fine@example.com",
            "is_active": "perhaps"
        })))
        .query(users())
        .apply()
        .unwrap_err();

    let errors = err.validation().expect("validation error");
    assert_eq!(
        errors.to_json(),
        json!([
            {"age": "Expected to be of type int"},
            {"birthday": "time data 'yesterday' does not match format '%Y-%m-%d'"},
            {"is_active": "Expected to be of type bool"}
        ])
    );
}

#[test]
fn test_null_handling() {
    let set = FilterSet::<Query>::builder("UserFilter", "User")
        .field("email", Field::string())
        .field("last_name", Field::string().allow_none(true))
        .field("no_age", Field::new().target("age").operator(OperatorId::IS_NULL))
        .build(&schema())
        .unwrap();

    let predicate = set
        .composer(input(json!({"email": null, "last_name": null, "no_age": true})))
        .predicate()
        .unwrap();

    assert_eq!(
        predicate.filter,
        Filter::And(vec![
            Filter::IsNull("users.last_name".into()),
            Filter::IsNull("users.age".into()),
        ])
    );
}

#[test]
fn test_source_key_and_target() {
    let set = FilterSet::<Query>::builder("UserFilter", "User")
        .field("email", Field::string().source_key("q"))
        .field("company", Field::string().target("company.name").source_key("employer"))
        .build(&schema())
        .unwrap();

    let predicate = set
        .composer(input(json!({"email": "ignored", "q": "a@b.c", "employer": "Pegasus"})))
        .predicate()
        .unwrap();

    assert_eq!(
        predicate.filter,
        Filter::And(vec![
            Filter::Equals("users.email".into(), "a@b.c".into()),
            Filter::Equals("company.name".into(), "Pegasus".into()),
        ])
    );
    assert_eq!(predicate.joins.len(), 1);
    assert_eq!(predicate.joins[0].path, "company");
}

#[test]
fn test_multi_hop_paths_share_joins() {
    let set = FilterSet::<Query>::builder("ArticleFilter", "Article")
        .field("author", Field::string().target("author.email"))
        .field("author_name", Field::string().target("author.first_name"))
        .field("company", Field::string().target("author.company.name"))
        .build(&schema())
        .unwrap();

    let query = set
        .composer(input(json!({"author": "a@b.c", "author_name": "Ada", "company": "Pegasus"})))
        .query(SelectQuery::new(RecordingEngine::default(), "articles"))
        .apply()
        .unwrap();

    let (sql, _) = query.build_sql();
    insta::assert_snapshot!(sql, @"SELECT articles.* FROM articles INNER JOIN users AS author ON articles.author_id = author.id INNER JOIN companies AS author__company ON author.company_id = author__company.id WHERE (author.email = $1 AND author.first_name = $2 AND author__company.name = $3)");
}

#[test]
fn test_relations_sharing_a_table_filter_their_own_rows() {
    let managers = FilterSet::<Query>::builder("UserFilter", "User")
        .field("manager_name", Field::string().target("manager.first_name"))
        .field("first_name", Field::string())
        .build(&schema())
        .unwrap();

    let query = managers
        .composer(input(json!({"manager_name": "Ada", "first_name": "Grace"})))
        .query(users())
        .apply()
        .unwrap();
    let (sql, _) = query.build_sql();
    insta::assert_snapshot!(sql, @"SELECT users.* FROM users INNER JOIN users AS manager ON users.manager_id = manager.id WHERE (manager.first_name = $1 AND users.first_name = $2)");

    let articles = FilterSet::<Query>::builder("ArticleFilter", "Article")
        .field("author", Field::string().target("author.email"))
        .field("editor", Field::string().target("editor.email"))
        .field("editor_company", Field::string().target("editor.company.name"))
        .build(&schema())
        .unwrap();

    let query = articles
        .composer(input(json!({"author": "a@b.c", "editor": "e@b.c", "editor_company": "Pegasus"})))
        .query(SelectQuery::new(RecordingEngine::default(), "articles"))
        .apply()
        .unwrap();
    let (sql, _) = query.build_sql();
    insta::assert_snapshot!(sql, @"SELECT articles.* FROM articles INNER JOIN users AS author ON articles.author_id = author.id INNER JOIN users AS editor ON articles.editor_id = editor.id INNER JOIN companies AS editor__company ON editor.company_id = editor__company.id WHERE (author.email = $1 AND editor.email = $2 AND editor__company.name = $3)");
}

#[test]
fn test_single_value_operators_reject_bad_shapes() {
    let set = FilterSet::<Query>::builder("UserFilter", "User")
        .field("age", Field::integer())
        .field("min_age", Field::integer().target("age").operator(OperatorId::GTE))
        .build(&schema())
        .unwrap();

    let err = set
        .composer(input(json!({"age": [1, 2], "min_age": 1e300})))
        .predicate()
        .unwrap_err();
    let errors = err.validation().unwrap();
    assert_eq!(
        errors.to_json(),
        json!([
            {"age": "Expected a single value"},
            {"min_age": "Expected to be of type int"}
        ])
    );
}

#[test]
fn test_definition_errors() {
    let schema = schema();

    let err = FilterSet::<Query>::builder("UserFilter", "User")
        .field("nickname", Field::string())
        .build(&schema)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::UnknownField);
    assert_eq!(
        err.message,
        "Error defining filter UserFilter: User model has not attribute called 'nickname'"
    );

    let err = FilterSet::<Query>::builder("UserFilter", "User")
        .fields(["email", "last_login_time"])
        .build(&schema)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::UnmappableType);
    assert!(err.message.contains("could not map type 'TIME' for field 'last_login_time'"));

    let err = FilterSet::<Query>::builder("UserFilter", "User")
        .method_field("adult", MethodField::named("filter_adult"))
        .build(&schema)
        .unwrap_err();
    assert_eq!(err.message, "UserFilter has not method filter_adult");
}

#[test]
fn test_allow_list_and_inheritance() {
    let schema = schema();
    let base = FilterSet::<Query>::builder("BaseFilter", "User")
        .field("email", Field::string().operator(OperatorId::ICONTAINS))
        .order_by("-created_at")
        .page_size(10)
        .build(&schema)
        .unwrap();

    let child = FilterSet::<Query>::builder("ChildFilter", "User")
        .inherit(&base)
        .fields(["email", "age", "is_active"])
        .build(&schema)
        .unwrap();

    assert_eq!(child.field_names(), vec!["email", "age", "is_active"]);
    assert_eq!(child.page_size(), Some(10));
    assert_eq!(
        child.field("email").unwrap().field.operator_id(),
        &OperatorId::ICONTAINS
    );

    let query = child
        .composer(input(json!({"age": 30, "is_active": false})))
        .query(users())
        .apply()
        .unwrap();
    let (sql, _) = query.build_sql();
    assert_eq!(
        sql,
        "SELECT users.* FROM users WHERE (users.age = $1 AND users.is_active = $2) ORDER BY users.created_at DESC"
    );
}

#[test]
fn test_custom_operator() {
    sift::query::operator::register(
        FnOperator::new("starts_digit", sift::query::Arity::Unary, |column, mut params| {
            let prefix = params.pop().unwrap_or(FilterValue::Null);
            Filter::StartsWith(column, prefix)
        })
        .symbol("STARTS"),
    );

    let set = FilterSet::<Query>::builder("UserFilter", "User")
        .field("email", Field::string().operator("starts_digit"))
        .build(&schema())
        .unwrap();

    let predicate = set.composer(input(json!({"email": "7"}))).predicate().unwrap();
    assert_eq!(
        predicate.filter,
        Filter::StartsWith("users.email".into(), "7".into())
    );
}

#[test]
fn test_rows_are_fetched_through_the_engine() {
    let engine = RecordingEngine::default();
    let set = FilterSet::builder("UserFilter", "User")
        .field("email", Field::string())
        .session(move |model: &Model| SelectQuery::for_model(engine.clone(), model))
        .build(&schema())
        .unwrap();

    let rows = set.composer(input(json!({"email": "a@b.c"}))).apply_all().unwrap();
    assert!(rows.is_empty());

    let err = FilterSet::<Query>::builder("UserFilter", "User")
        .build(&schema())
        .unwrap()
        .composer(Data::new())
        .apply()
        .unwrap_err();
    assert_eq!(err.query().map(|e| e.code), Some(ErrorCode::MissingSession));
}
