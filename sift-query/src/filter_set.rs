//! Filter set definitions.
//!
//! A [`FilterSet`] is the declared shape of a filter: which input keys map to
//! which model attributes, through which operators, plus nested sets, method
//! fields, ordering and paging defaults. It is built once, checked against the
//! schema, and shared behind an `Arc`. Each request then gets its own
//! [`FilterComposer`].
//!
//! ```rust
//! use serde_json::json;
//! use sift_query::{Field, FilterSet, SelectQuery};
//! use sift_query::operator::OperatorId;
//! use sift_schema::{ModelBuilder, ScalarType, Schema};
//!
//! # #[derive(Clone)] struct NoEngine;
//! # impl sift_query::QueryEngine for NoEngine {
//! #     type Row = ();
//! #     fn query_many(&self, _: &str, _: Vec<sift_query::FilterValue>) -> sift_query::QueryResult<Vec<()>> { Ok(vec![]) }
//! #     fn count(&self, _: &str, _: Vec<sift_query::FilterValue>) -> sift_query::QueryResult<u64> { Ok(0) }
//! # }
//! let schema = Schema::new().with_model(
//!     ModelBuilder::new("User", "users")
//!         .primary_key("id", ScalarType::Int)
//!         .column("email", ScalarType::String)
//!         .column("age", ScalarType::Int)
//!         .build(),
//! );
//!
//! let users = FilterSet::<SelectQuery<NoEngine>>::builder("UserFilter", "User")
//!     .field("email", Field::string().operator(OperatorId::ICONTAINS))
//!     .field("min_age", Field::integer().target("age").operator(OperatorId::GTE))
//!     .order_by("-age")
//!     .build(&schema)
//!     .unwrap();
//!
//! let data = json!({"email": "example.com", "min_age": "18"});
//! let query = users
//!     .composer(data.as_object().unwrap().clone())
//!     .query(SelectQuery::new(NoEngine, "users"))
//!     .apply()
//!     .unwrap();
//!
//! let (sql, _) = query.build_sql();
//! assert_eq!(
//!     sql,
//!     "SELECT users.* FROM users WHERE (LOWER(users.email) LIKE LOWER($1) AND users.age >= $2) \
//!      ORDER BY users.age DESC"
//! );
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use sift_schema::{Model, PaginationConfig, Schema, SiftConfig};
use smol_str::SmolStr;
use tracing::{debug, warn};

use crate::Data;
use crate::composer::FilterComposer;
use crate::error::{FieldValidationError, QueryError, QueryResult};
use crate::field::Field;
use crate::filter::Filter;
use crate::join::{Join, JoinSet};
use crate::method::{MethodContext, MethodField, MethodFn, MethodRef};
use crate::nested::NestedFilter;
use crate::operator::{self, Combinator, Operator};
use crate::ordering::OrderSpec;
use crate::traits::{InputValidator, Session};

/// A field checked against the schema, with its operator and target resolved.
#[derive(Clone)]
pub struct BoundField {
    /// The declaration.
    pub field: Field,
    /// Resolved operator.
    pub operator: Arc<dyn Operator>,
    /// Expression the operator acts on.
    pub target: String,
    /// Joins needed to reach the target.
    pub joins: Vec<Join>,
}

impl fmt::Debug for BoundField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundField")
            .field("field", &self.field)
            .field("operator", &self.operator.id())
            .field("target", &self.target)
            .field("joins", &self.joins)
            .finish()
    }
}

/// A method field with its function resolved.
#[derive(Clone)]
pub struct BoundMethod {
    /// The declaration.
    pub field: MethodField,
    /// Function to call.
    pub call: MethodFn,
}

impl fmt::Debug for BoundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundMethod").field("field", &self.field).finish()
    }
}

/// A built, immutable filter definition.
pub struct FilterSet<Q> {
    name: SmolStr,
    model: Model,
    fields: IndexMap<SmolStr, BoundField>,
    nested: IndexMap<SmolStr, NestedFilter<Q>>,
    method_fields: IndexMap<SmolStr, BoundMethod>,
    methods: IndexMap<SmolStr, MethodFn>,
    order_by: Option<OrderSpec>,
    page_size: Option<u64>,
    combinator: Combinator,
    validator: Option<Arc<dyn InputValidator>>,
    session: Option<Arc<dyn Session<Q>>>,
    pagination: PaginationConfig,
    order_by_param: String,
}

impl<Q> fmt::Debug for FilterSet<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterSet")
            .field("name", &self.name)
            .field("model", &self.model.name())
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("nested", &self.nested.keys().collect::<Vec<_>>())
            .field("method_fields", &self.method_fields.keys().collect::<Vec<_>>())
            .field("order_by", &self.order_by)
            .field("page_size", &self.page_size)
            .field("combinator", &self.combinator)
            .finish()
    }
}

impl<Q> FilterSet<Q> {
    /// Start defining a filter set for the model named `model`.
    pub fn builder(name: impl Into<SmolStr>, model: impl Into<SmolStr>) -> FilterSetBuilder<Q> {
        FilterSetBuilder::new(name, model)
    }

    /// Filter set name, used in error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The filtered model.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Reachable fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &BoundField)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look up a field.
    pub fn field(&self, name: &str) -> Option<&BoundField> {
        self.fields.get(name)
    }

    /// Reachable nested filters in declaration order.
    pub fn nested(&self) -> impl Iterator<Item = (&str, &NestedFilter<Q>)> {
        self.nested.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Reachable method fields in declaration order.
    pub fn method_fields(&self) -> impl Iterator<Item = (&str, &BoundMethod)> {
        self.method_fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Every reachable name: fields, then nested filters, then method fields.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields
            .keys()
            .chain(self.nested.keys())
            .chain(self.method_fields.keys())
            .map(SmolStr::as_str)
            .collect()
    }

    /// Every join any reachable field may need, including nested ones.
    pub fn joins(&self) -> JoinSet {
        let mut joins = JoinSet::new();
        for bound in self.fields.values() {
            joins.extend(bound.joins.iter().cloned());
        }
        for nested in self.nested.values() {
            joins.extend(nested.filter_set().joins().into_vec());
        }
        joins
    }

    /// Configured ordering.
    pub fn order_by(&self) -> Option<&OrderSpec> {
        self.order_by.as_ref()
    }

    /// Configured page size.
    pub fn page_size(&self) -> Option<u64> {
        self.page_size
    }

    /// Default combinator.
    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    /// Input hook.
    pub fn validator(&self) -> Option<&Arc<dyn InputValidator>> {
        self.validator.as_ref()
    }

    /// Session producing base queries.
    pub fn session(&self) -> Option<&Arc<dyn Session<Q>>> {
        self.session.as_ref()
    }

    /// Paging settings.
    pub fn pagination_config(&self) -> &PaginationConfig {
        &self.pagination
    }

    /// Input key that overrides the ordering.
    pub fn order_by_param(&self) -> &str {
        &self.order_by_param
    }

    /// Start a request against this definition.
    pub fn composer(self: &Arc<Self>, data: Data) -> FilterComposer<Q> {
        FilterComposer::new(Arc::clone(self), data)
    }

    pub(crate) fn method_context<'a>(&'a self, data: &'a Data) -> MethodContext<'a> {
        MethodContext {
            data,
            model: &self.model,
            filter: &self.name,
        }
    }
}

/// Builder for [`FilterSet`].
pub struct FilterSetBuilder<Q> {
    name: SmolStr,
    model: SmolStr,
    fields: IndexMap<SmolStr, Field>,
    nested: IndexMap<SmolStr, NestedFilter<Q>>,
    method_fields: IndexMap<SmolStr, MethodField>,
    methods: IndexMap<SmolStr, MethodFn>,
    allow_list: Vec<SmolStr>,
    parents: Vec<(SmolStr, SmolStr)>,
    order_by: Option<OrderSpec>,
    page_size: Option<u64>,
    combinator: Option<Combinator>,
    validator: Option<Arc<dyn InputValidator>>,
    session: Option<Arc<dyn Session<Q>>>,
    config: Option<SiftConfig>,
}

impl<Q> FilterSetBuilder<Q> {
    fn new(name: impl Into<SmolStr>, model: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            fields: IndexMap::new(),
            nested: IndexMap::new(),
            method_fields: IndexMap::new(),
            methods: IndexMap::new(),
            allow_list: Vec::new(),
            parents: Vec::new(),
            order_by: None,
            page_size: None,
            combinator: None,
            validator: None,
            session: None,
            config: None,
        }
    }

    /// Declare a field. Redeclaring a name replaces it in place.
    pub fn field(mut self, name: impl Into<SmolStr>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Declare a method field.
    pub fn method_field(mut self, name: impl Into<SmolStr>, field: MethodField) -> Self {
        self.method_fields.insert(name.into(), field);
        self
    }

    /// Register a method method fields can refer to by name.
    pub fn method<F>(mut self, name: impl Into<SmolStr>, f: F) -> Self
    where
        F: Fn(&MethodContext<'_>, &Value) -> Result<Filter, FieldValidationError>
            + Send
            + Sync
            + 'static,
    {
        self.methods.insert(name.into(), Arc::new(f));
        self
    }

    /// Declare a nested filter.
    pub fn nested(mut self, name: impl Into<SmolStr>, nested: NestedFilter<Q>) -> Self {
        self.nested.insert(name.into(), nested);
        self
    }

    /// Restrict the set to these names.
    ///
    /// Names that are not declared get a default field derived from the
    /// model column type. Declared names not listed become unreachable.
    pub fn fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.allow_list = names.into_iter().map(Into::into).collect();
        self
    }

    /// Default ordering.
    pub fn order_by(mut self, spec: impl Into<OrderSpec>) -> Self {
        self.order_by = Some(spec.into());
        self
    }

    /// Default page size.
    pub fn page_size(mut self, size: u64) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Default combinator for sibling predicates.
    pub fn combinator(mut self, combinator: Combinator) -> Self {
        self.combinator = Some(combinator);
        self
    }

    /// Whole-input validation hook.
    pub fn validator(mut self, validator: impl InputValidator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Session producing base queries.
    pub fn session(mut self, session: impl Session<Q> + 'static) -> Self {
        self.session = Some(Arc::new(session));
        self
    }

    /// Take defaults from configuration. Explicit builder settings win.
    pub fn config(mut self, config: &SiftConfig) -> Self {
        self.config = Some(config.clone());
        self
    }

    /// Start from another set's fields, nested filters and methods.
    ///
    /// Names already declared here are kept. Both sets must target the same
    /// model.
    pub fn inherit(mut self, parent: &FilterSet<Q>) -> Self {
        self.parents
            .push((parent.name.clone(), SmolStr::new(parent.model.name())));

        for (name, bound) in &parent.fields {
            self.fields
                .entry(name.clone())
                .or_insert_with(|| bound.field.clone());
        }
        for (name, nested) in &parent.nested {
            self.nested.entry(name.clone()).or_insert_with(|| nested.clone());
        }
        for (name, bound) in &parent.method_fields {
            self.method_fields
                .entry(name.clone())
                .or_insert_with(|| bound.field.clone());
        }
        for (name, method) in &parent.methods {
            self.methods
                .entry(name.clone())
                .or_insert_with(|| Arc::clone(method));
        }
        if self.order_by.is_none() {
            self.order_by = parent.order_by.clone();
        }
        if self.page_size.is_none() {
            self.page_size = parent.page_size;
        }
        self
    }

    /// Check everything against `schema` and freeze the definition.
    pub fn build(self, schema: &Schema) -> QueryResult<Arc<FilterSet<Q>>> {
        let name = self.name;
        let model = schema
            .get_model(&self.model)
            .ok_or_else(|| QueryError::unknown_model(self.model.as_str()).in_filter(name.as_str()))?;

        for (parent, parent_model) in &self.parents {
            if parent_model != model.name() {
                return Err(QueryError::not_compatible(
                    name.as_str(),
                    model.name(),
                    parent.as_str(),
                    parent_model.as_str(),
                ));
            }
        }
        for nested in self.nested.values() {
            let other = nested.filter_set();
            if other.model().name() != model.name() {
                return Err(QueryError::not_compatible(
                    name.as_str(),
                    model.name(),
                    other.name(),
                    other.model().name(),
                ));
            }
        }

        let mut fields = self.fields;
        let mut nested = self.nested;
        let method_fields = self.method_fields;

        for field_name in &self.allow_list {
            if fields.contains_key(field_name)
                || nested.contains_key(field_name)
                || method_fields.contains_key(field_name)
            {
                continue;
            }
            let column = model.column(field_name).ok_or_else(|| {
                QueryError::unknown_attribute(model.name(), field_name.as_str()).in_filter(name.as_str())
            })?;
            let field = Field::for_scalar(column.scalar_type).ok_or_else(|| {
                QueryError::unmappable_type(column.scalar_type.sql_name(), field_name.as_str())
                    .in_filter(name.as_str())
            })?;
            debug!(filter = %name, field = %field_name, "derived field from column type");
            fields.insert(field_name.clone(), field);
        }

        let mut bound_fields = IndexMap::with_capacity(fields.len());
        for (field_name, field) in fields {
            let operator = operator::resolve(field.operator_id())
                .map_err(|e| e.with_field(field_name.as_str()).in_filter(name.as_str()))?;
            let mut joins = JoinSet::new();
            let target = field
                .resolve_target(&field_name, schema, model, &mut joins)
                .map_err(|e| e.in_filter(name.as_str()))?;
            bound_fields.insert(
                field_name,
                BoundField {
                    field,
                    operator,
                    target,
                    joins: joins.into_vec(),
                },
            );
        }

        let mut bound_methods = IndexMap::with_capacity(method_fields.len());
        for (field_name, field) in method_fields {
            let call = field.resolve(&self.methods).ok_or_else(|| {
                let method = match field.method() {
                    MethodRef::Named(m) => m.to_string(),
                    MethodRef::Callable(_) => field_name.to_string(),
                };
                QueryError::method_not_found(name.as_str(), method)
            })?;
            bound_methods.insert(field_name, BoundMethod { field, call });
        }

        if !self.allow_list.is_empty() {
            let keep = |n: &SmolStr| self.allow_list.contains(n);
            for dropped in bound_fields
                .keys()
                .chain(nested.keys())
                .chain(bound_methods.keys())
                .filter(|n| !keep(*n))
            {
                warn!(filter = %name, field = %dropped, "field not in allow-list, dropping");
            }
            bound_fields.retain(|n, _| keep(n));
            nested.retain(|n, _| keep(n));
            bound_methods.retain(|n, _| keep(n));
        }

        let config = self.config.unwrap_or_default();
        let combinator = self
            .combinator
            .unwrap_or_else(|| config.filtering.default_combinator.into());

        debug!(
            filter = %name,
            model = %model.name(),
            fields = bound_fields.len(),
            nested = nested.len(),
            methods = bound_methods.len(),
            "built filter set"
        );

        Ok(Arc::new(FilterSet {
            name,
            model: model.clone(),
            fields: bound_fields,
            nested,
            method_fields: bound_methods,
            methods: self.methods,
            order_by: self.order_by,
            page_size: self.page_size,
            combinator,
            validator: self.validator,
            session: self.session,
            pagination: config.pagination,
            order_by_param: config.filtering.order_by_param,
        }))
    }
}
