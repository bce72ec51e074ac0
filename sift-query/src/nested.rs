//! Nested filters: a whole filter set used as one field of another.
//!
//! The nested set runs its own validation and composition against a slice of
//! the parent input, combines its predicates under its inner combinator, and
//! hands the resulting group to the parent as a single node.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::Data;
use crate::error::FieldValidationError;
use crate::filter_set::FilterSet;
use crate::operator::Combinator;
use crate::traits::InputValidator;

/// A filter set embedded as a field.
pub struct NestedFilter<Q> {
    filter_set: Arc<FilterSet<Q>>,
    inner: Combinator,
    outer: Option<Combinator>,
    flat: bool,
    source_key: Option<String>,
    validator: Option<Arc<dyn InputValidator>>,
}

impl<Q> Clone for NestedFilter<Q> {
    fn clone(&self) -> Self {
        Self {
            filter_set: Arc::clone(&self.filter_set),
            inner: self.inner,
            outer: self.outer,
            flat: self.flat,
            source_key: self.source_key.clone(),
            validator: self.validator.clone(),
        }
    }
}

impl<Q> fmt::Debug for NestedFilter<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NestedFilter")
            .field("filter_set", &self.filter_set.name())
            .field("inner", &self.inner)
            .field("outer", &self.outer)
            .field("flat", &self.flat)
            .field("source_key", &self.source_key)
            .finish()
    }
}

impl<Q> NestedFilter<Q> {
    /// Embed `filter_set`, reading its input from the nested key.
    pub fn new(filter_set: Arc<FilterSet<Q>>) -> Self {
        Self {
            filter_set,
            inner: Combinator::And,
            outer: None,
            flat: false,
            source_key: None,
            validator: None,
        }
    }

    /// Combinator joining the nested set's own predicates.
    pub fn inner(mut self, combinator: Combinator) -> Self {
        self.inner = combinator;
        self
    }

    /// Combinator joining the nested group to the parent's predicates.
    ///
    /// Defaults to the parent's combinator.
    pub fn outer(mut self, combinator: Combinator) -> Self {
        self.outer = Some(combinator);
        self
    }

    /// Read the nested set's input from the parent's top level.
    pub fn flat(mut self, flat: bool) -> Self {
        self.flat = flat;
        self
    }

    /// Read the nested input from `key` instead of the declared name.
    pub fn source_key(mut self, key: impl Into<String>) -> Self {
        self.source_key = Some(key.into());
        self
    }

    /// Input hook for the nested level. Defaults to the parent's hook.
    pub fn validator(mut self, validator: impl InputValidator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// The embedded filter set.
    pub fn filter_set(&self) -> &Arc<FilterSet<Q>> {
        &self.filter_set
    }

    /// Inner combinator.
    pub fn inner_combinator(&self) -> Combinator {
        self.inner
    }

    /// Outer combinator, if set.
    pub fn outer_combinator(&self) -> Option<Combinator> {
        self.outer
    }

    /// Input hook, if set.
    pub fn input_validator(&self) -> Option<&Arc<dyn InputValidator>> {
        self.validator.as_ref()
    }

    /// Whether the nested input is the parent input.
    pub fn is_flat(&self) -> bool {
        self.flat
    }

    /// Input key for a nested filter declared as `name`.
    pub fn get_source_key<'a>(&'a self, name: &'a str) -> &'a str {
        self.source_key.as_deref().unwrap_or(name)
    }

    /// Select the nested input from the parent input.
    ///
    /// Returns `None` when there is nothing to filter on. A non-flat key
    /// holding something other than an object is an error, unless the value
    /// is empty or false.
    pub fn get_data(&self, name: &str, parent: &Data) -> Result<Option<Data>, FieldValidationError> {
        if self.flat {
            return Ok((!parent.is_empty()).then(|| parent.clone()));
        }

        let key = self.get_source_key(name);
        match parent.get(key) {
            Some(Value::Object(data)) if !data.is_empty() => Ok(Some(data.clone())),
            Some(value) if is_truthy(value) => Err(FieldValidationError::new(format!(
                "The value of the key {} is expected to be an object since flat is false, but {} found.",
                key,
                type_name(value)
            ))),
            _ => Ok(None),
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
