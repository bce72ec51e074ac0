//! Method fields: filtering logic delegated to a function.
//!
//! A [`MethodField`] reads its input key like any other field but skips
//! coercion entirely. The function it points at receives the raw value and
//! returns a predicate, or [`Filter::None`] to contribute nothing.
//!
//! Two kinds of function are supported:
//! - a plain callable that only sees the raw value
//! - a method registered by name on the filter set, which also sees the
//!   whole input mapping through a [`MethodContext`]

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use sift_schema::Model;
use smol_str::SmolStr;

use crate::Data;
use crate::error::FieldValidationError;
use crate::filter::Filter;

/// A method taking the raw value only.
pub type CallableFn = Arc<dyn Fn(&Value) -> Result<Filter, FieldValidationError> + Send + Sync>;

/// A method registered on a filter set.
pub type MethodFn =
    Arc<dyn Fn(&MethodContext<'_>, &Value) -> Result<Filter, FieldValidationError> + Send + Sync>;

/// What a method sees of the running filter.
#[derive(Debug, Clone, Copy)]
pub struct MethodContext<'a> {
    /// Input mapping of the current level.
    pub data: &'a Data,
    /// Model the filter set targets.
    pub model: &'a Model,
    /// Filter set name.
    pub filter: &'a str,
}

impl MethodContext<'_> {
    /// Qualify a column of the filtered model.
    pub fn column(&self, name: &str) -> String {
        format!("{}.{}", self.model.table(), name)
    }

    /// Read another input key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

/// Which function a method field calls.
#[derive(Clone)]
pub enum MethodRef {
    /// A standalone function.
    Callable(CallableFn),
    /// A method registered on the filter set under this name.
    Named(SmolStr),
}

impl fmt::Debug for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callable(_) => f.write_str("Callable(..)"),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

/// A field whose predicate comes from a function.
#[derive(Debug, Clone)]
pub struct MethodField {
    method: MethodRef,
    source_key: Option<String>,
}

impl MethodField {
    /// Call a standalone function with the raw value.
    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<Filter, FieldValidationError> + Send + Sync + 'static,
    {
        Self {
            method: MethodRef::Callable(Arc::new(f)),
            source_key: None,
        }
    }

    /// Call the filter set's method registered as `name`.
    pub fn named(name: impl Into<SmolStr>) -> Self {
        Self {
            method: MethodRef::Named(name.into()),
            source_key: None,
        }
    }

    /// Read the value from `key` instead of the declared name.
    pub fn source_key(mut self, key: impl Into<String>) -> Self {
        self.source_key = Some(key.into());
        self
    }

    /// Input key for a method field declared as `name`.
    pub fn get_source_key<'a>(&'a self, name: &'a str) -> &'a str {
        self.source_key.as_deref().unwrap_or(name)
    }

    /// The function reference.
    pub fn method(&self) -> &MethodRef {
        &self.method
    }

    /// Turn the reference into a callable, looking named methods up in
    /// `methods`. Returns `None` if the name is not registered.
    pub fn resolve(&self, methods: &IndexMap<SmolStr, MethodFn>) -> Option<MethodFn> {
        match &self.method {
            MethodRef::Callable(f) => {
                let f = Arc::clone(f);
                Some(Arc::new(move |_: &MethodContext<'_>, value: &Value| f(value)))
            }
            MethodRef::Named(name) => methods.get(name).cloned(),
        }
    }
}

/// Whether a method field's raw value contributes nothing.
pub fn should_skip(raw: Option<&Value>) -> bool {
    matches!(raw, None | Some(Value::Null))
}
