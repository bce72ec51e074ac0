//! Declared filter fields.
//!
//! A [`Field`] binds one input key to a model attribute and an operator.
//! Fields are declared once when a [`FilterSet`](crate::FilterSet) is built
//! and are read-only afterwards.
//!
//! ```rust
//! use serde_json::json;
//! use sift_query::{Field, FilterValue};
//! use sift_query::operator::OperatorId;
//!
//! let field = Field::integer().operator(OperatorId::GTE);
//! assert_eq!(field.validate(&json!("42")).unwrap(), FilterValue::Int(42));
//! assert_eq!(
//!     field.validate(&json!("x")).unwrap_err().message,
//!     "Expected to be of type int"
//! );
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sift_schema::{Model, ScalarType, Schema};

use crate::error::{FieldValidationError, QueryError, QueryResult};
use crate::filter::{Filter, FilterValue};
use crate::join::{Join, JoinSet, alias_for};
use crate::operator::{Arity, Operator, OperatorId};

/// Default `strftime` format for date and datetime fields.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// A custom validation function replacing the field's own coercion.
pub type ValidateFn = Arc<dyn Fn(&Value) -> Result<FilterValue, FieldValidationError> + Send + Sync>;

/// How a field coerces its raw input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// No coercion.
    Plain,
    /// Text.
    String,
    /// Whole number.
    Integer,
    /// Floating point number.
    Float,
    /// Exact decimal.
    Decimal,
    /// Boolean.
    Boolean,
    /// Calendar date parsed with `format`, or from epoch seconds.
    Date {
        /// `strftime` format.
        format: String,
        /// Read the input as seconds since the epoch.
        timestamp: bool,
    },
    /// UTC datetime parsed with `format`, or from epoch seconds.
    DateTime {
        /// `strftime` format.
        format: String,
        /// Read the input as seconds since the epoch.
        timestamp: bool,
    },
}

impl FieldKind {
    /// Name used in type errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Plain => "any",
            Self::String => "str",
            Self::Integer => "int",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Boolean => "bool",
            Self::Date { timestamp: true, .. } | Self::DateTime { timestamp: true, .. } => "float",
            Self::Date { .. } => "date",
            Self::DateTime { .. } => "datetime",
        }
    }

    /// Coerce a single non-null value.
    pub fn coerce(&self, value: &Value) -> Result<FilterValue, FieldValidationError> {
        let type_error = || FieldValidationError::expected_type(self.type_name());

        match self {
            Self::Plain => Ok(FilterValue::from_json(value)),
            Self::String => match value {
                Value::String(s) => Ok(FilterValue::String(s.clone())),
                Value::Number(n) => Ok(FilterValue::String(n.to_string())),
                Value::Bool(b) => Ok(FilterValue::String(if *b { "True" } else { "False" }.into())),
                _ => Err(type_error()),
            },
            Self::Integer => as_int(value).map(FilterValue::Int).ok_or_else(type_error),
            Self::Float => as_float(value).map(FilterValue::Float).ok_or_else(type_error),
            Self::Decimal => as_decimal(value).map(FilterValue::Decimal).ok_or_else(type_error),
            Self::Boolean => as_bool(value).map(FilterValue::Bool).ok_or_else(type_error),
            Self::Date { timestamp: true, .. } => from_timestamp(value)
                .map(|dt| FilterValue::Date(dt.date_naive()))
                .ok_or_else(type_error),
            Self::DateTime { timestamp: true, .. } => {
                from_timestamp(value).map(FilterValue::DateTime).ok_or_else(type_error)
            }
            Self::Date { format, .. } => {
                let text = as_text(value);
                parse_date(&text, format)
                    .map(FilterValue::Date)
                    .ok_or_else(|| format_error(&text, format))
            }
            Self::DateTime { format, .. } => {
                let text = as_text(value);
                parse_datetime(&text, format)
                    .map(FilterValue::DateTime)
                    .ok_or_else(|| format_error(&text, format))
            }
        }
    }
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// A float with no fractional part that fits in `i64`.
pub(crate) fn integral(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is already out of range.
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    text.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(&text).ok())
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn from_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let seconds = as_float(value)?;
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

fn parse_date(text: &str, format: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, format)
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(text, format).ok().map(|dt| dt.date()))
}

fn parse_datetime(text: &str, format: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(text, format)
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

fn format_error(text: &str, format: &str) -> FieldValidationError {
    FieldValidationError::new(format!(
        "time data '{}' does not match format '{}'",
        text, format
    ))
}

/// An explicit expression overriding dotted-path resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomTarget {
    /// A column of any table, rendered as `table.name` without schema lookup.
    Column {
        /// Table or alias qualifying the column.
        table: String,
        /// Column name.
        name: String,
    },
    /// A column name resolved against the root model.
    Attribute(String),
    /// A pre-built SQL expression, used verbatim.
    Expression(String),
}

/// A declared filter field.
#[derive(Clone)]
pub struct Field {
    source_key: Option<String>,
    target_path: Option<String>,
    operator: OperatorId,
    custom_target: Option<CustomTarget>,
    allow_none: bool,
    kind: FieldKind,
    validator: Option<ValidateFn>,
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("source_key", &self.source_key)
            .field("target_path", &self.target_path)
            .field("operator", &self.operator)
            .field("custom_target", &self.custom_target)
            .field("allow_none", &self.allow_none)
            .field("kind", &self.kind)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl Default for Field {
    fn default() -> Self {
        Self::with_kind(FieldKind::Plain)
    }
}

impl Field {
    fn with_kind(kind: FieldKind) -> Self {
        Self {
            source_key: None,
            target_path: None,
            operator: OperatorId::EQ,
            custom_target: None,
            allow_none: false,
            kind,
            validator: None,
        }
    }

    /// A field that passes values through unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// A text field.
    pub fn string() -> Self {
        Self::with_kind(FieldKind::String)
    }

    /// A whole-number field.
    pub fn integer() -> Self {
        Self::with_kind(FieldKind::Integer)
    }

    /// A floating point field.
    pub fn float() -> Self {
        Self::with_kind(FieldKind::Float)
    }

    /// An exact decimal field.
    pub fn decimal() -> Self {
        Self::with_kind(FieldKind::Decimal)
    }

    /// A boolean field.
    pub fn boolean() -> Self {
        Self::with_kind(FieldKind::Boolean)
    }

    /// A date field using [`DEFAULT_DATE_FORMAT`].
    pub fn date() -> Self {
        Self::with_kind(FieldKind::Date {
            format: DEFAULT_DATE_FORMAT.to_string(),
            timestamp: false,
        })
    }

    /// A UTC datetime field using [`DEFAULT_DATE_FORMAT`].
    pub fn datetime() -> Self {
        Self::with_kind(FieldKind::DateTime {
            format: DEFAULT_DATE_FORMAT.to_string(),
            timestamp: false,
        })
    }

    /// A UTC datetime field read from seconds since the epoch.
    pub fn timestamp() -> Self {
        Self::datetime().as_timestamp()
    }

    /// The default field for a column type, if there is one.
    pub fn for_scalar(scalar_type: ScalarType) -> Option<Self> {
        match scalar_type {
            ScalarType::String => Some(Self::string()),
            ScalarType::Int | ScalarType::BigInt => Some(Self::integer()),
            ScalarType::Float => Some(Self::float()),
            ScalarType::Decimal => Some(Self::decimal()),
            ScalarType::Date => Some(Self::date()),
            ScalarType::DateTime => Some(Self::datetime()),
            ScalarType::Boolean => Some(Self::boolean()),
            _ => None,
        }
    }

    /// Read the value from `key` instead of the declared name.
    pub fn source_key(mut self, key: impl Into<String>) -> Self {
        self.source_key = Some(key.into());
        self
    }

    /// Filter on this dotted attribute path instead of the declared name.
    pub fn target(mut self, path: impl Into<String>) -> Self {
        self.target_path = Some(path.into());
        self
    }

    /// Use a different operator.
    pub fn operator(mut self, operator: impl Into<OperatorId>) -> Self {
        self.operator = operator.into();
        self
    }

    /// Filter on an explicit expression instead of a resolved path.
    pub fn custom_target(mut self, target: CustomTarget) -> Self {
        self.custom_target = Some(target);
        self
    }

    /// Treat an explicit null as a value rather than as absent.
    pub fn allow_none(mut self, allow: bool) -> Self {
        self.allow_none = allow;
        self
    }

    /// Set the parse format of a date or datetime field.
    pub fn format(mut self, fmt: impl Into<String>) -> Self {
        match &mut self.kind {
            FieldKind::Date { format, .. } | FieldKind::DateTime { format, .. } => {
                *format = fmt.into();
            }
            _ => tracing::warn!(kind = ?self.kind, "format ignored on a non-temporal field"),
        }
        self
    }

    /// Read a date or datetime field from seconds since the epoch.
    pub fn as_timestamp(mut self) -> Self {
        match &mut self.kind {
            FieldKind::Date { timestamp, .. } | FieldKind::DateTime { timestamp, .. } => {
                *timestamp = true;
            }
            _ => tracing::warn!(kind = ?self.kind, "timestamp mode ignored on a non-temporal field"),
        }
        self
    }

    /// Replace the field's coercion with a custom function.
    pub fn validate_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Result<FilterValue, FieldValidationError> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(f));
        self
    }

    /// Input key for a field declared as `name`.
    pub fn get_source_key<'a>(&'a self, name: &'a str) -> &'a str {
        self.source_key.as_deref().unwrap_or(name)
    }

    /// Attribute path for a field declared as `name`.
    pub fn get_target_path<'a>(&'a self, name: &'a str) -> &'a str {
        self.target_path.as_deref().unwrap_or(name)
    }

    /// Operator id.
    pub fn operator_id(&self) -> &OperatorId {
        &self.operator
    }

    /// Coercion kind.
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Whether null is a filterable value.
    pub fn allows_none(&self) -> bool {
        self.allow_none
    }

    /// Whether the raw value contributes nothing.
    ///
    /// A missing key is always skipped; a null is skipped unless
    /// [`Field::allow_none`] is set.
    pub fn should_skip(&self, raw: Option<&Value>) -> bool {
        match raw {
            None => true,
            Some(Value::Null) => !self.allow_none,
            Some(_) => false,
        }
    }

    /// Coerce a raw input value.
    ///
    /// Lists are coerced element by element. A null passes through untouched.
    pub fn validate(&self, raw: &Value) -> Result<FilterValue, FieldValidationError> {
        if raw.is_null() {
            return Ok(FilterValue::Null);
        }
        if let Some(validator) = &self.validator {
            return validator(raw);
        }
        match raw {
            Value::Array(items) => items
                .iter()
                .map(|item| self.kind.coerce(item))
                .collect::<Result<Vec<_>, _>>()
                .map(FilterValue::List),
            value => self.kind.coerce(value),
        }
    }

    /// Resolve the expression this field filters on.
    ///
    /// Every relation hop of a dotted path adds a join to `joins`.
    pub fn resolve_target(
        &self,
        name: &str,
        schema: &Schema,
        model: &Model,
        joins: &mut JoinSet,
    ) -> QueryResult<String> {
        match &self.custom_target {
            Some(CustomTarget::Column { table, name }) => Ok(format!("{}.{}", table, name)),
            Some(CustomTarget::Expression(expr)) => Ok(expr.clone()),
            Some(CustomTarget::Attribute(attr)) => {
                if model.column(attr).is_none() {
                    return Err(QueryError::unknown_attribute(model.name(), attr.as_str()));
                }
                Ok(format!("{}.{}", model.table(), attr))
            }
            None => resolve_path(self.get_target_path(name), schema, model, joins),
        }
    }

    /// Build the predicate for a validated value.
    pub fn build_predicate(
        &self,
        operator: &dyn Operator,
        target: &str,
        value: FilterValue,
    ) -> Result<Filter, FieldValidationError> {
        build_predicate(operator, target, value)
    }
}

/// Walk a dotted path from `model`, recording one join per relation hop.
///
/// Each hop is referenced through its path alias, so a relation back to the
/// root table or a second relation to an already joined table still filters
/// the related rows.
pub fn resolve_path(
    path: &str,
    schema: &Schema,
    model: &Model,
    joins: &mut JoinSet,
) -> QueryResult<String> {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, hops) = match segments.split_last() {
        Some(split) => split,
        None => return Err(QueryError::unknown_attribute(model.name(), path)),
    };

    let mut current = model;
    let mut qualifier = model.table().to_string();
    for (i, hop) in hops.iter().enumerate() {
        let relation = current
            .relation(hop)
            .ok_or_else(|| QueryError::unknown_attribute(current.name(), *hop))?;
        let target = schema.model(&relation.target)?;
        let hop_path = segments[..=i].join(".");

        let alias = match joins.get(&hop_path) {
            Some(join) => join.alias.clone(),
            None => {
                let join = Join::new(
                    hop_path.as_str(),
                    target.table(),
                    format!(
                        "{}.{} = {}.{}",
                        qualifier,
                        relation.local_column,
                        alias_for(&hop_path),
                        relation.remote_column
                    ),
                );
                if join.alias == model.table() {
                    return Err(QueryError::config(format!(
                        "relation path '{}' cannot be joined: its alias clashes with the table '{}'",
                        hop_path,
                        model.table()
                    ))
                    .with_model(model.name()));
                }
                let alias = join.alias.clone();
                joins.insert(join);
                alias
            }
        };
        qualifier = alias;
        current = target;
    }

    if current.column(last).is_none() {
        return Err(QueryError::unknown_attribute(current.name(), *last));
    }
    Ok(format!("{}.{}", qualifier, last))
}

/// Feed a validated value to an operator.
///
/// Binary and variadic operators need a list, unary operators a single
/// value. Null is only accepted by operators that render it as a null test.
pub fn build_predicate(
    operator: &dyn Operator,
    target: &str,
    value: FilterValue,
) -> Result<Filter, FieldValidationError> {
    if value.is_null() && !operator.accepts_null() {
        return Err(FieldValidationError::new(format!(
            "{} does not accept null values",
            operator.id()
        )));
    }

    let params = match (operator.arity(), value) {
        (Arity::Nullary, _) => Vec::new(),
        (arity, FilterValue::List(items)) if arity.takes_list() => items,
        (arity, _) if arity.takes_list() => {
            return Err(FieldValidationError::new("Expected a list of values"));
        }
        (Arity::Unary, FilterValue::List(_)) => {
            return Err(FieldValidationError::new("Expected a single value"));
        }
        (_, value) => vec![value],
    };

    operator.apply(target, params)
}
