//! Per-request filter composition.
//!
//! A [`FilterComposer`] runs one input mapping through a [`FilterSet`]:
//!
//! 1. the input hook, if any, validates and rewrites the mapping
//! 2. every reachable field is read, coerced and turned into a predicate,
//!    collecting every failure instead of stopping at the first
//! 3. nested sets recurse into their slice of the input and contribute one
//!    grouped predicate each, then method fields add theirs
//! 4. the combined predicate, the joins it needs and the ordering are
//!    attached to the base query
//!
//! A composer is cheap and single-use. Build a new one per request.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::Data;
use crate::error::{
    ErrorCollector, FieldError, FieldValidationError, FilterResult, FilterValidationError,
    QueryError, QueryResult,
};
use crate::field::{build_predicate, integral};
use crate::filter::Filter;
use crate::filter_set::FilterSet;
use crate::join::{Join, JoinSet};
use crate::method;
use crate::operator::Combinator;
use crate::ordering::OrderSpec;
use crate::pagination::Paginator;
use crate::traits::{FilterQuery, InputValidator, Session};
use crate::types::OrderByField;

/// The output of composition without a query attached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    /// Combined predicate. [`Filter::None`] if nothing applied.
    pub filter: Filter,
    /// Joins the predicate needs, deduplicated, in first-use order.
    pub joins: Vec<Join>,
}

/// One request against a [`FilterSet`].
pub struct FilterComposer<Q> {
    set: Arc<FilterSet<Q>>,
    data: Data,
    query: Option<Q>,
    session: Option<Arc<dyn Session<Q>>>,
    combinator: Option<Combinator>,
    validator: Option<Arc<dyn InputValidator>>,
}

impl<Q> fmt::Debug for FilterComposer<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterComposer")
            .field("filter", &self.set.name())
            .field("data", &self.data)
            .field("query", &self.query.is_some())
            .field("combinator", &self.combinator)
            .finish()
    }
}

/// Settings that apply to one level of a composition.
struct Level<'a, Q> {
    set: &'a FilterSet<Q>,
    combinator: Combinator,
    hook: Option<&'a Arc<dyn InputValidator>>,
    prefix: String,
}

impl<Q> FilterComposer<Q> {
    pub(crate) fn new(set: Arc<FilterSet<Q>>, data: Data) -> Self {
        Self {
            set,
            data,
            query: None,
            session: None,
            combinator: None,
            validator: None,
        }
    }

    /// Filter this query instead of one from a session.
    pub fn query(mut self, query: Q) -> Self {
        self.query = Some(query);
        self
    }

    /// Use this session instead of the filter set's.
    pub fn session(mut self, session: impl Session<Q> + 'static) -> Self {
        self.session = Some(Arc::new(session));
        self
    }

    /// Override the filter set's combinator for this request.
    pub fn combinator(mut self, combinator: Combinator) -> Self {
        self.combinator = Some(combinator);
        self
    }

    /// Override the filter set's input hook for this request.
    pub fn validator(mut self, validator: impl InputValidator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// The raw input.
    pub fn data(&self) -> &Data {
        &self.data
    }

    /// The filter set.
    pub fn filter_set(&self) -> &Arc<FilterSet<Q>> {
        &self.set
    }

    /// Validate the whole input and report every failure.
    pub fn validate(&self) -> Result<(), FilterValidationError> {
        let mut errors = ErrorCollector::new();
        let mut joins = JoinSet::new();
        self.compose(&mut errors, &mut joins);
        errors.finish()
    }

    /// Build the predicate tree and its joins without touching a query.
    pub fn predicate(&self) -> FilterResult<Predicate> {
        self.predicate_with(ErrorCollector::new())
    }

    fn predicate_with(&self, mut errors: ErrorCollector) -> FilterResult<Predicate> {
        let mut joins = JoinSet::new();
        let filter = self.compose(&mut errors, &mut joins);
        errors.finish()?;
        Ok(Predicate {
            filter,
            joins: joins.into_vec(),
        })
    }

    fn compose(&self, errors: &mut ErrorCollector, joins: &mut JoinSet) -> Filter {
        let level = Level {
            set: &self.set,
            combinator: self.combinator.unwrap_or(self.set.combinator()),
            hook: self.validator.as_ref().or(self.set.validator()),
            prefix: String::new(),
        };
        debug!(filter = %self.set.name(), combinator = %level.combinator, "composing filter");
        crate::sift_debug!(filter = %self.set.name(), data = ?self.data, "filter input");
        let filter = compose_level(&level, &self.data, errors, joins);
        debug!(
            filter = %self.set.name(),
            predicates = filter.leaf_count(),
            joins = joins.len(),
            errors = errors.len(),
            "composed filter"
        );
        filter
    }

    /// Resolve the ordering for this request.
    ///
    /// An order key in the input replaces the configured ordering. Unknown
    /// columns fail here, before any query is touched.
    pub fn ordering(&self) -> QueryResult<Vec<OrderByField>> {
        let from_input = match self.data.get(self.set.order_by_param()) {
            Some(value) => OrderSpec::from_json(value)?,
            None => None,
        };
        match from_input.as_ref().or(self.set.order_by()) {
            Some(spec) => spec.resolve(self.set.model()),
            None => Ok(Vec::new()),
        }
    }

    fn base_query(&self) -> QueryResult<Q>
    where
        Q: Clone,
    {
        if let Some(query) = &self.query {
            return Ok(query.clone());
        }
        self.session
            .as_ref()
            .or(self.set.session())
            .map(|session| session.query(self.set.model()))
            .ok_or_else(|| QueryError::missing_session(self.set.name()))
    }
}

impl<Q: FilterQuery> FilterComposer<Q> {
    /// Validate the input and return the filtered, ordered query.
    pub fn apply(&self) -> FilterResult<Q> {
        self.apply_with(ErrorCollector::new())
    }

    fn apply_with(&self, errors: ErrorCollector) -> FilterResult<Q> {
        let mut query = self.base_query()?;
        let predicate = self.predicate_with(errors)?;
        let ordering = self.ordering()?;

        for join in &predicate.joins {
            if !query.has_join(&join.alias) {
                query = query.join(join);
            }
        }
        if !predicate.filter.is_none() {
            query = query.filter(predicate.filter);
        }
        for term in ordering {
            query = query.order_by(term);
        }
        Ok(query)
    }

    /// [`apply`](Self::apply), then fetch the rows.
    pub fn apply_all(&self) -> FilterResult<Vec<Q::Row>> {
        Ok(self.apply()?.all()?)
    }

    /// [`apply`](Self::apply), then page the result.
    ///
    /// The page and page size are read from the input. Invalid values are
    /// reported together with any field failures.
    pub fn paginate(&self) -> FilterResult<Paginator<Q>> {
        let config = self.set.pagination_config();
        let mut errors = ErrorCollector::new();

        let page = read_positive(&self.data, &config.page_param, &mut errors).unwrap_or(1);
        let requested = read_positive(&self.data, &config.page_size_param, &mut errors);
        if let (Some(size), Some(max)) = (requested, config.max_page_size) {
            if size > max {
                errors.push(
                    config.page_size_param.as_str(),
                    FieldValidationError::new(format!(
                        "Ensure this value is less than or equal to {}.",
                        max
                    )),
                );
            }
        }

        let query = self.apply_with(errors)?;
        let page_size = requested
            .or(self.set.page_size())
            .or(config.default_page_size);
        Ok(Paginator::new(query, page, page_size)?)
    }
}

fn read_positive(data: &Data, key: &str, errors: &mut ErrorCollector) -> Option<u64> {
    let value = match data.get(key) {
        None | Some(Value::Null) => return None,
        Some(value) => value,
    };
    let parsed = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().and_then(integral).and_then(|i| u64::try_from(i).ok())),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) if n > 0 => Some(n),
        _ => {
            errors.push(key, FieldValidationError::new("Expected a positive integer."));
            None
        }
    }
}

fn compose_level<Q>(
    level: &Level<'_, Q>,
    raw: &Data,
    errors: &mut ErrorCollector,
    joins: &mut JoinSet,
) -> Filter {
    let set = level.set;

    let validated;
    let data = match level.hook {
        Some(hook) => match hook.validate(raw) {
            Ok(data) => {
                validated = data;
                &validated
            }
            Err(failed) => {
                debug!(filter = %set.name(), errors = failed.len(), "input hook rejected data");
                errors.extend(prefixed(&level.prefix, failed));
                return Filter::None;
            }
        },
        None => raw,
    };

    let mut predicates = Vec::new();
    for (name, bound) in set.fields() {
        let key = bound.field.get_source_key(name);
        let value = data.get(key);
        if bound.field.should_skip(value) {
            continue;
        }
        let value = value.unwrap_or(&Value::Null);

        let built = bound
            .field
            .validate(value)
            .and_then(|v| build_predicate(bound.operator.as_ref(), &bound.target, v));
        match built {
            Ok(filter) => {
                crate::sift_trace!(filter = %set.name(), field = %name, predicate = ?filter, "field applied");
                joins.extend(bound.joins.iter().cloned());
                predicates.push(filter);
            }
            Err(e) => errors.push(format!("{}{}", level.prefix, key), e),
        }
    }
    let mut combined = level.combinator.combine_all(predicates);

    for (name, nested) in set.nested() {
        let key = nested.get_source_key(name);
        let sub = match nested.get_data(name, data) {
            Ok(Some(sub)) => sub,
            Ok(None) => continue,
            Err(e) => {
                errors.push(format!("{}{}", level.prefix, key), e);
                continue;
            }
        };

        let child = Level {
            set: nested.filter_set(),
            combinator: nested.inner_combinator(),
            hook: nested.input_validator().or(level.hook),
            prefix: if nested.is_flat() {
                level.prefix.clone()
            } else {
                format!("{}{}.", level.prefix, key)
            },
        };
        let group = compose_level(&child, &sub, errors, joins);
        let outer = nested.outer_combinator().unwrap_or(level.combinator);
        combined = outer.combine(combined, group);
    }

    let ctx = set.method_context(data);
    for (name, bound) in set.method_fields() {
        let key = bound.field.get_source_key(name);
        let value = data.get(key);
        if method::should_skip(value) {
            continue;
        }
        match (bound.call)(&ctx, value.unwrap_or(&Value::Null)) {
            Ok(filter) => {
                crate::sift_trace!(filter = %set.name(), field = %name, predicate = ?filter, "method applied");
                combined = level.combinator.combine(combined, filter);
            }
            Err(e) => errors.push(format!("{}{}", level.prefix, key), e),
        }
    }

    combined
}

fn prefixed(prefix: &str, errors: FilterValidationError) -> FilterValidationError {
    if prefix.is_empty() {
        return errors;
    }
    FilterValidationError::new(
        errors
            .iter()
            .map(|e| FieldError::new(format!("{}{}", prefix, e.field), e.message.clone()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, FilterError};
    use crate::field::Field;
    use crate::filter::FilterValue;
    use crate::method::MethodField;
    use crate::nested::NestedFilter;
    use crate::operator::OperatorId;
    use crate::query::SelectQuery;
    use crate::test_support::{MockEngine, TestQuery, schema};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use sift_schema::Model;

    fn data(value: Value) -> Data {
        match value {
            Value::Object(map) => map,
            _ => Data::new(),
        }
    }

    fn base() -> TestQuery {
        SelectQuery::new(MockEngine::with_count(0), "users")
    }

    fn user_filter() -> Arc<FilterSet<TestQuery>> {
        FilterSet::builder("UserFilter", "User")
            .field("email", Field::string())
            .field("age", Field::integer())
            .field("last_name", Field::string().allow_none(true))
            .build(&schema())
            .unwrap()
    }

    #[test]
    fn test_empty_input_leaves_query_unfiltered() {
        let query = user_filter().composer(Data::new()).query(base()).apply().unwrap();
        assert_eq!(query.current_filter(), &Filter::None);
        assert!(query.joins().is_empty());
    }

    #[test]
    fn test_fields_are_anded() {
        let query = user_filter()
            .composer(data(json!({"email": "a@b.c", "age": "30"})))
            .query(base())
            .apply()
            .unwrap();
        assert_eq!(
            query.current_filter(),
            &Filter::And(vec![
                Filter::Equals("users.email".into(), "a@b.c".into()),
                Filter::Equals("users.age".into(), 30.into()),
            ])
        );
    }

    #[test]
    fn test_combinator_override() {
        let predicate = user_filter()
            .composer(data(json!({"email": "a@b.c", "age": 30})))
            .combinator(Combinator::Or)
            .predicate()
            .unwrap();
        assert!(matches!(predicate.filter, Filter::Or(ref v) if v.len() == 2));
    }

    #[test]
    fn test_allow_none() {
        let predicate = user_filter()
            .composer(data(json!({"email": null, "last_name": null})))
            .predicate()
            .unwrap();
        assert_eq!(predicate.filter, Filter::IsNull("users.last_name".into()));
    }

    #[test]
    fn test_errors_accumulate() {
        let err = user_filter()
            .composer(data(json!({"age": "old", "email": ["x", {}]})))
            .query(base())
            .apply()
            .unwrap_err();

        let errors = err.validation().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.message_for("age"), Some("Expected to be of type int"));
        assert_eq!(errors.message_for("email"), Some("Expected to be of type str"));
    }

    #[test]
    fn test_validate_only() {
        let composer = user_filter().composer(data(json!({"age": "x"})));
        assert_eq!(composer.validate().unwrap_err().len(), 1);
        assert!(user_filter().composer(data(json!({"age": 3}))).validate().is_ok());
    }

    #[test]
    fn test_missing_session() {
        let err = user_filter().composer(Data::new()).apply().unwrap_err();
        let err = err.query().unwrap();
        assert_eq!(err.code, ErrorCode::MissingSession);
        assert!(err.message.starts_with("Can not find session for filter 'UserFilter'"));
    }

    #[test]
    fn test_session_builds_base_query() {
        let engine = MockEngine::with_count(0);
        let set = FilterSet::builder("UserFilter", "User")
            .field("email", Field::string())
            .session(move |model: &Model| SelectQuery::for_model(engine.clone(), model))
            .build(&schema())
            .unwrap();

        let (sql, params) = set
            .composer(data(json!({"email": "a@b.c"})))
            .apply()
            .unwrap()
            .build_sql();
        assert_eq!(sql, "SELECT users.* FROM users WHERE users.email = $1");
        assert_eq!(params, vec![FilterValue::from("a@b.c")]);
    }

    #[test]
    fn test_relation_fields_join_once() {
        let set = FilterSet::builder("ArticleFilter", "Article")
            .field("email", Field::string().target("author.email"))
            .field("first_name", Field::string().target("author.first_name"))
            .field("category", Field::string().target("category.name"))
            .build(&schema())
            .unwrap();

        let query = set
            .composer(data(json!({"email": "a@b.c", "first_name": "Ada"})))
            .query(SelectQuery::new(MockEngine::default(), "articles"))
            .apply()
            .unwrap();

        assert_eq!(query.joins().len(), 1);
        assert_eq!(query.joins()[0].table, "users");
    }

    #[test]
    fn test_self_referencing_relation_is_joined() {
        let set = FilterSet::<TestQuery>::builder("UserFilter", "User")
            .field("manager_name", Field::string().target("manager.first_name"))
            .build(&schema())
            .unwrap();

        let query = set
            .composer(data(json!({"manager_name": "Ada"})))
            .query(SelectQuery::new(MockEngine::default(), "users"))
            .apply()
            .unwrap();

        let (sql, _) = query.build_sql();
        insta::assert_snapshot!(sql, @"SELECT users.* FROM users INNER JOIN users AS manager ON users.manager_id = manager.id WHERE manager.first_name = $1");
    }

    #[test]
    fn test_relations_to_the_same_table_join_separately() {
        let set = FilterSet::<TestQuery>::builder("ArticleFilter", "Article")
            .field("author", Field::string().target("author.email"))
            .field("editor", Field::string().target("editor.email"))
            .build(&schema())
            .unwrap();

        let query = set
            .composer(data(json!({"author": "a@b.c", "editor": "e@b.c"})))
            .query(SelectQuery::new(MockEngine::default(), "articles"))
            .apply()
            .unwrap();

        let (sql, _) = query.build_sql();
        insta::assert_snapshot!(sql, @"SELECT articles.* FROM articles INNER JOIN users AS author ON articles.author_id = author.id INNER JOIN users AS editor ON articles.editor_id = editor.id WHERE (author.email = $1 AND editor.email = $2)");
    }

    #[test]
    fn test_unary_operator_rejects_a_list() {
        let set = FilterSet::<TestQuery>::builder("UserFilter", "User")
            .field("age", Field::integer())
            .field("ids", Field::integer().target("id").operator(OperatorId::IN))
            .build(&schema())
            .unwrap();

        let err = set
            .composer(data(json!({"age": [1, 2], "ids": [1, 2]})))
            .predicate()
            .unwrap_err();
        let errors = err.validation().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.message_for("age"), Some("Expected a single value"));
    }

    #[test]
    fn test_nested_groups() {
        let schema = schema();
        let names = FilterSet::<TestQuery>::builder("NameFilter", "User")
            .field("first_name", Field::string())
            .field("last_name", Field::string())
            .build(&schema)
            .unwrap();
        let set = FilterSet::builder("UserFilter", "User")
            .field("email", Field::string())
            .field("age", Field::integer())
            .nested("names", NestedFilter::new(names).inner(Combinator::Or))
            .build(&schema)
            .unwrap();

        let predicate = set
            .composer(data(json!({
                "email": "a@b.c",
                "age": 3,
                "names": {"first_name": "Ada", "last_name": "Lovelace"}
            })))
            .predicate()
            .unwrap();

        let (sql, _) = predicate.filter.to_sql(0);
        assert_eq!(
            sql,
            "((users.email = $1 AND users.age = $2) AND (users.first_name = $3 OR users.last_name = $4))"
        );
    }

    #[test]
    fn test_nested_errors_are_prefixed() {
        let schema = schema();
        let ages = FilterSet::<TestQuery>::builder("AgeFilter", "User")
            .field("age", Field::integer())
            .build(&schema)
            .unwrap();
        let set = FilterSet::builder("UserFilter", "User")
            .field("email", Field::integer())
            .nested("range", NestedFilter::new(Arc::clone(&ages)))
            .nested("bad", NestedFilter::new(ages))
            .build(&schema)
            .unwrap();

        let err = set
            .composer(data(json!({"email": "x", "range": {"age": "y"}, "bad": "z"})))
            .predicate()
            .unwrap_err();
        let errors = err.validation().unwrap();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "range.age", "bad"]);
    }

    #[test]
    fn test_method_fields() {
        let set = FilterSet::<TestQuery>::builder("UserFilter", "User")
            .field("age", Field::integer())
            .method_field("adult", MethodField::named("filter_adult"))
            .method_field(
                "domain",
                MethodField::callable(|v| match v.as_str() {
                    Some(d) => Ok(Filter::EndsWith("users.email".into(), format!("@{d}").into())),
                    None => Err(FieldValidationError::new("domain must be a string")),
                }),
            )
            .method("filter_adult", |ctx, v| {
                Ok(match v.as_bool() {
                    Some(true) => Filter::Gte(ctx.column("age"), 18.into()),
                    _ => Filter::None,
                })
            })
            .build(&schema())
            .unwrap();

        let predicate = set
            .composer(data(json!({"age": 30, "adult": true, "domain": "example.com"})))
            .predicate()
            .unwrap();
        assert_eq!(
            predicate.filter,
            Filter::And(vec![
                Filter::And(vec![
                    Filter::Equals("users.age".into(), 30.into()),
                    Filter::Gte("users.age".into(), 18.into()),
                ]),
                Filter::EndsWith("users.email".into(), "@example.com".into()),
            ])
        );

        let predicate = set.composer(data(json!({"adult": false}))).predicate().unwrap();
        assert_eq!(predicate.filter, Filter::None);

        let err = set.composer(data(json!({"domain": 1}))).predicate().unwrap_err();
        assert_eq!(
            err.validation().unwrap().message_for("domain"),
            Some("domain must be a string")
        );
    }

    #[test]
    fn test_input_hook() {
        let set = FilterSet::<TestQuery>::builder("UserFilter", "User")
            .field("email", Field::string())
            .validator(|data: &Data| -> Result<Data, FilterValidationError> {
                let mut data = data.clone();
                if let Some(Value::String(email)) = data.get("email") {
                    let lowered = email.to_lowercase();
                    data.insert("email".into(), Value::String(lowered));
                }
                Ok(data)
            })
            .build(&schema())
            .unwrap();

        let predicate = set.composer(data(json!({"email": "A@B.C"}))).predicate().unwrap();
        assert_eq!(predicate.filter, Filter::Equals("users.email".into(), "a@b.c".into()));

        let err = set
            .composer(data(json!({"email": "A@B.C"})))
            .validator(|_: &Data| -> Result<Data, FilterValidationError> {
                Err(FilterValidationError::single("email", "rejected"))
            })
            .predicate()
            .unwrap_err();
        assert_eq!(err.validation().unwrap().message_for("email"), Some("rejected"));
    }

    #[test]
    fn test_ordering_from_input() {
        let set = FilterSet::builder("UserFilter", "User")
            .order_by("-created_at")
            .build(&schema())
            .unwrap();

        let query = set.composer(Data::new()).query(base()).apply().unwrap();
        assert_eq!(query.ordering().to_sql(), "users.created_at DESC");

        let query = set
            .composer(data(json!({"order_by": "first_name, -last_name"})))
            .query(base())
            .apply()
            .unwrap();
        assert_eq!(query.ordering().to_sql(), "users.first_name ASC, users.last_name DESC");

        let err = set
            .composer(data(json!({"order_by": "nickname"})))
            .query(base())
            .apply()
            .unwrap_err();
        assert!(matches!(err, FilterError::Query(ref e) if e.code == ErrorCode::UnknownOrderField));
    }

    #[test]
    fn test_paginate() {
        let set = FilterSet::builder("UserFilter", "User")
            .field("email", Field::string())
            .page_size(20)
            .build(&schema())
            .unwrap();
        let query = SelectQuery::new(MockEngine::with_count(95), "users");

        let paginator = set
            .composer(data(json!({"page": "3"})))
            .query(query.clone())
            .paginate()
            .unwrap();
        assert_eq!(paginator.num_pages(), 5);
        let (sql, _) = paginator.sliced_query().build_sql();
        assert_eq!(sql, "SELECT users.* FROM users LIMIT 20 OFFSET 40");

        let paginator = set
            .composer(data(json!({"page_size": 50})))
            .query(query.clone())
            .paginate()
            .unwrap();
        assert_eq!(paginator.num_pages(), 2);

        let paginator = set
            .composer(data(json!({"page": 2.0, "page_size": 50.0})))
            .query(query.clone())
            .paginate()
            .unwrap();
        assert_eq!(paginator.page(), 2);
        assert_eq!(paginator.page_size(), Some(50));

        let err = set
            .composer(data(json!({"page": 1.5})))
            .query(query.clone())
            .paginate()
            .unwrap_err();
        assert_eq!(
            err.validation().unwrap().message_for("page"),
            Some("Expected a positive integer.")
        );

        let err = set
            .composer(data(json!({"page": 0, "email": {}})))
            .query(query)
            .paginate()
            .unwrap_err();
        assert_eq!(err.validation().unwrap().len(), 2);
    }
}
