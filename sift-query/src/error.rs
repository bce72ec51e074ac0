//! Error types for filter definition, validation, ordering and pagination.
//!
//! Two kinds of failure surface from a filter run:
//! - [`FilterValidationError`]: every field-level problem found in the input,
//!   collected across all fields (nested ones included) before being returned
//! - [`QueryError`]: structural problems (unresolvable paths, unknown operators,
//!   bad ordering fields, out-of-range pages, missing sessions)
//!
//! [`FilterError`] wraps both for the composer entry points.
//!
//! # Error Codes
//!
//! Error codes follow a pattern: S{category}{number}
//! - 1xxx: Filter definition and configuration errors
//! - 2xxx: Ordering errors
//! - 3xxx: Pagination errors
//! - 5xxx: Execution errors
//!
//! ```rust
//! use sift_query::{ErrorCode, QueryError};
//!
//! let err = QueryError::unknown_operator("regex");
//! assert_eq!(err.code, ErrorCode::UnknownOperator);
//! assert_eq!(err.code.code(), "S1004");
//! ```
//!
//! # Validation Errors
//!
//! ```rust
//! use sift_query::{FieldError, FilterValidationError};
//!
//! let err = FilterValidationError::new(vec![
//!     FieldError::new("age", "Expected to be of type int"),
//!     FieldError::new("last_name", "Expected to be of type str"),
//! ]);
//! assert_eq!(
//!     err.to_json(),
//!     serde_json::json!([
//!         {"age": "Expected to be of type int"},
//!         {"last_name": "Expected to be of type str"},
//!     ])
//! );
//! ```

use std::fmt;

use sift_schema::SchemaError;
use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Result type for composer operations.
pub type FilterResult<T> = Result<T, FilterError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Definition / configuration errors (1xxx)
    /// Filter targets a model missing from the schema (S1001).
    UnknownModel = 1001,
    /// Declared path or allow-listed name does not resolve (S1002).
    UnknownField = 1002,
    /// Allow-listed column has no default field kind (S1003).
    UnmappableType = 1003,
    /// Operator id is not registered (S1004).
    UnknownOperator = 1004,
    /// Method field names a method that is not registered (S1005).
    MethodNotFound = 1005,
    /// Nested or parent filter set targets another model (S1006).
    FilterNotCompatible = 1006,
    /// No query, session or default session at apply time (S1007).
    MissingSession = 1007,
    /// Invalid configuration (S1008).
    InvalidConfiguration = 1008,

    // Ordering errors (2xxx)
    /// Order-by field is not a column of the model (S2001).
    UnknownOrderField = 2001,
    /// Order-by input has an unsupported shape (S2002).
    InvalidOrderSpec = 2002,

    // Pagination errors (3xxx)
    /// Requested page does not exist (S3001).
    PageOutOfRange = 3001,
    /// Page size is zero (S3002).
    InvalidPageSize = 3002,

    // Execution errors (5xxx)
    /// The query backend failed (S5001).
    DatabaseError = 5001,
    /// Internal error (S5999).
    Internal = 5999,
}

impl ErrorCode {
    /// Get the error code string (e.g., "S1001").
    pub fn code(&self) -> String {
        format!("S{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::UnknownModel => "Unknown model",
            Self::UnknownField => "Unknown field",
            Self::UnmappableType => "Column type has no default field",
            Self::UnknownOperator => "Unknown operator",
            Self::MethodNotFound => "Filter method not found",
            Self::FilterNotCompatible => "Filter set targets another model",
            Self::MissingSession => "No query or session available",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::UnknownOrderField => "Unknown order-by field",
            Self::InvalidOrderSpec => "Invalid order-by specification",
            Self::PageOutOfRange => "Page out of range",
            Self::InvalidPageSize => "Invalid page size",
            Self::DatabaseError => "Database error",
            Self::Internal => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Suggestion for fixing an error.
#[derive(Debug, Clone)]
pub struct Suggestion {
    /// The suggestion text.
    pub text: String,
    /// Optional code example.
    pub code: Option<String>,
}

impl Suggestion {
    /// Create a new suggestion.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            code: None,
        }
    }

    /// Add a code example.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The filter set involved.
    pub filter: Option<String>,
    /// The model involved.
    pub model: Option<String>,
    /// The field involved.
    pub field: Option<String>,
    /// The SQL query (if available).
    pub sql: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<Suggestion>,
    /// Help text.
    pub help: Option<String>,
}

/// Structural errors raised while defining or running a filter.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(Suggestion::new(suggestion));
        self
    }

    /// Add a code suggestion.
    pub fn with_code_suggestion(mut self, text: impl Into<String>, code: impl Into<String>) -> Self {
        self.context.suggestions.push(Suggestion::new(text).with_code(code));
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.context.model = Some(model.into());
        self
    }

    /// Set the field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.context.field = Some(field.into());
        self
    }

    /// Set the SQL query.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.context.sql = Some(sql.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Attribute a definition error to the filter set being built.
    pub fn in_filter(mut self, filter: impl Into<String>) -> Self {
        let filter = filter.into();
        if self.context.filter.is_none() {
            self.message = format!("Error defining filter {}: {}", filter, self.message);
            self.context.filter = Some(filter);
        }
        self
    }

    // ============== Constructor Functions ==============

    /// Create an unknown model error.
    pub fn unknown_model(model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(ErrorCode::UnknownModel, format!("model `{}` is not part of the schema", model))
            .with_model(&model)
            .with_suggestion("Register the model in the Schema before building filters for it")
    }

    /// Create an unknown attribute error.
    pub fn unknown_attribute(model: impl Into<String>, attribute: impl Into<String>) -> Self {
        let model = model.into();
        let attribute = attribute.into();
        Self::new(
            ErrorCode::UnknownField,
            format!("{} model has not attribute called '{}'", model, attribute),
        )
        .with_model(&model)
        .with_field(&attribute)
    }

    /// Create an unmappable column type error.
    pub fn unmappable_type(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(
            ErrorCode::UnmappableType,
            format!(
                "could not map type '{}' for field '{}'. Please define it as a field in the \
                 filter class or remove it from the declared fields.",
                type_name.into(),
                field
            ),
        )
        .with_field(&field)
    }

    /// Create an unknown operator error.
    pub fn unknown_operator(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(ErrorCode::UnknownOperator, format!("operator `{}` is not registered", id))
            .with_code_suggestion(
                "Register the operator before building the filter set",
                "sift_query::operator::register(MyOperator)",
            )
    }

    /// Create a missing method error.
    pub fn method_not_found(filter: impl Into<String>, method: impl Into<String>) -> Self {
        let method = method.into();
        Self::new(
            ErrorCode::MethodNotFound,
            format!("{} has not method {}", filter.into(), method),
        )
        .with_field(&method)
        .with_suggestion("Register the method with FilterSetBuilder::method")
    }

    /// Create an incompatible filter set error.
    pub fn not_compatible(
        filter: impl Into<String>,
        model: impl Into<String>,
        other: impl Into<String>,
        other_model: impl Into<String>,
    ) -> Self {
        let model = model.into();
        Self::new(
            ErrorCode::FilterNotCompatible,
            format!(
                "filter `{}` targets `{}` but `{}` targets `{}`",
                filter.into(),
                model,
                other.into(),
                other_model.into()
            ),
        )
        .with_model(&model)
    }

    /// Create a missing session error.
    pub fn missing_session(filter: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::MissingSession,
            format!(
                "Can not find session for filter '{}'. Please either define a session on the \
                 filter set, at instantiation level or provide a query.",
                filter.into()
            ),
        )
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message)
    }

    /// Create an unknown order-by field error.
    pub fn unknown_order_field(model: impl Into<String>, field: impl Into<String>) -> Self {
        let model = model.into();
        let field = field.into();
        Self::new(
            ErrorCode::UnknownOrderField,
            format!(
                "{} does not have a field called '{}' to use in an ORDER BY clause.",
                model, field
            ),
        )
        .with_model(&model)
        .with_field(&field)
    }

    /// Create an invalid order specification error.
    pub fn invalid_order_spec(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidOrderSpec, message)
            .with_help("Use a comma separated string or a list of strings, prefix with '-' for descending")
    }

    /// Create a page out of range error.
    pub fn page_out_of_range(page: u64, num_pages: u64) -> Self {
        Self::new(
            ErrorCode::PageOutOfRange,
            format!("page {} is out of range (1..={})", page, num_pages),
        )
        .with_suggestion("Check has_next_page()/has_previous_page() before moving")
    }

    /// Create an invalid page size error.
    pub fn invalid_page_size(size: u64) -> Self {
        Self::new(ErrorCode::InvalidPageSize, format!("page size must be positive, got {}", size))
    }

    /// Create a general database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, format!("Internal error: {}", message.into()))
    }

    // ============== Error Checks ==============

    /// Check if this is a definition or configuration error.
    pub fn is_configuration_error(&self) -> bool {
        (self.code as u16) / 1000 == 1
    }

    /// Check if this is an ordering error.
    pub fn is_ordering_error(&self) -> bool {
        (self.code as u16) / 1000 == 2
    }

    /// Check if this is a pagination error.
    pub fn is_pagination_error(&self) -> bool {
        (self.code as u16) / 1000 == 3
    }

    // ============== Display Functions ==============

    /// Display the full error with all context and suggestions.
    pub fn display_full(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error [{}]: {}\n", self.code.code(), self.message));

        if let Some(ref op) = self.context.operation {
            output.push_str(&format!("  → While: {}\n", op));
        }
        if let Some(ref filter) = self.context.filter {
            output.push_str(&format!("  → Filter: {}\n", filter));
        }
        if let Some(ref model) = self.context.model {
            output.push_str(&format!("  → Model: {}\n", model));
        }
        if let Some(ref field) = self.context.field {
            output.push_str(&format!("  → Field: {}\n", field));
        }
        if let Some(ref sql) = self.context.sql {
            output.push_str(&format!("  → SQL: {}\n", sql));
        }

        if !self.context.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion.text));
                if let Some(ref code) = suggestion.code {
                    output.push_str(&format!("     ```\n     {}\n     ```\n", code.replace('\n', "\n     ")));
                }
            }
        }

        if let Some(ref help) = self.context.help {
            output.push_str(&format!("\nHelp: {}\n", help));
        }

        output
    }
}

impl From<SchemaError> for QueryError {
    fn from(err: SchemaError) -> Self {
        let code = match err {
            SchemaError::UnknownModel { .. } => ErrorCode::UnknownModel,
            SchemaError::UnknownColumn { .. } | SchemaError::UnknownRelation { .. } => {
                ErrorCode::UnknownField
            }
            _ => ErrorCode::InvalidConfiguration,
        };
        Self::new(code, err.to_string()).with_source(err)
    }
}

/// Helper for creating errors with context.
#[macro_export]
macro_rules! query_error {
    ($code:expr, $msg:expr) => {
        $crate::error::QueryError::new($code, $msg)
    };
    ($code:expr, $msg:expr, $($key:ident = $value:expr),+ $(,)?) => {{
        let mut err = $crate::error::QueryError::new($code, $msg);
        $(
            err = err.$key($value);
        )+
        err
    }};
}

/// A single field failed validation.
///
/// Returned by field validators, operators and method fields. The composer
/// attaches the field identifier when it records the failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FieldValidationError {
    /// Human readable message.
    pub message: String,
}

impl FieldValidationError {
    /// Message used when none is given.
    pub const DEFAULT_MESSAGE: &'static str = "error validating this field.";

    /// Create a new validation error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// `Expected to be of type <type>`.
    pub fn expected_type(type_name: &str) -> Self {
        Self::new(format!("Expected to be of type {}", type_name))
    }
}

impl Default for FieldValidationError {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MESSAGE)
    }
}

/// A validation failure attributed to a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Field identifier (the input key).
    pub field: String,
    /// Human readable message.
    pub message: String,
}

impl FieldError {
    /// Create a new field error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// `{"<field>": "<message>"}`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::with_capacity(1);
        map.insert(self.field.clone(), serde_json::Value::String(self.message.clone()));
        serde_json::Value::Object(map)
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every field validation failure from one filter run.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterValidationError {
    /// Failures in the order fields were visited.
    pub errors: Vec<FieldError>,
}

impl FilterValidationError {
    /// Create from a list of field errors.
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    /// Create with a single entry.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(vec![FieldError::new(field, message)])
    }

    /// Number of failures.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Check if there are no failures.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterate over the failures.
    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.errors.iter()
    }

    /// Get the message recorded for `field`, if any.
    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// `[{"<field>": "<message>"}, ...]`, suitable for an API response body.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.errors.iter().map(FieldError::to_json).collect())
    }
}

impl fmt::Display for FilterValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "filter validation failed with {} error(s)", self.errors.len())?;
        for err in &self.errors {
            write!(f, "\n  - {}", err)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a FilterValidationError {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

/// What the composer entry points return on failure.
#[derive(Error, Debug)]
pub enum FilterError {
    /// Input failed validation.
    #[error(transparent)]
    Validation(#[from] FilterValidationError),

    /// Definition, configuration, ordering, pagination or execution failure.
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl FilterError {
    /// Check if this is a validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Get the validation failures, if this is one.
    pub fn validation(&self) -> Option<&FilterValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Query(_) => None,
        }
    }

    /// Get the structural error, if this is one.
    pub fn query(&self) -> Option<&QueryError> {
        match self {
            Self::Validation(_) => None,
            Self::Query(err) => Some(err),
        }
    }
}

impl From<SchemaError> for FilterError {
    fn from(err: SchemaError) -> Self {
        Self::Query(err.into())
    }
}

/// Accumulates field failures across a whole run.
///
/// Recording never short-circuits; [`ErrorCollector::finish`] reports
/// everything at once.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<FieldError>,
}

impl ErrorCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `field`.
    pub fn push(&mut self, field: impl Into<String>, error: FieldValidationError) {
        self.errors.push(FieldError::new(field, error.message));
    }

    /// Record every entry of an aggregate failure.
    pub fn extend(&mut self, errors: FilterValidationError) {
        self.errors.extend(errors.errors);
    }

    /// Number of failures recorded so far.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Check if nothing has failed.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` if nothing failed, otherwise the aggregate.
    pub fn finish(self) -> Result<(), FilterValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(FilterValidationError::new(self.errors))
        }
    }
}
