//! Predicate expression tree and its SQL rendering.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// A value bound into a predicate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Exact decimal value.
    Decimal(Decimal),
    /// String value.
    String(String),
    /// Calendar date.
    Date(NaiveDate),
    /// Point in time (UTC).
    DateTime(DateTime<Utc>),
    /// JSON value.
    Json(serde_json::Value),
    /// List of values.
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Convert an untyped input value without coercion.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map_or_else(|| Self::Json(value.clone()), Self::Float),
            },
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            Value::Object(_) => Self::Json(value.clone()),
        }
    }

    fn map_string(&self, f: impl FnOnce(&str) -> String) -> Self {
        match self {
            Self::String(s) => Self::String(f(s)),
            other => other.clone(),
        }
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Decimal> for FilterValue {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<NaiveDate> for FilterValue {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

/// A predicate expression tree.
///
/// Leaves hold a target expression (usually a table-qualified column) and
/// their operands; `And`/`Or`/`Not` are the internal nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// No filter (always true).
    #[default]
    None,

    /// Equals comparison.
    Equals(String, FilterValue),
    /// Not equals comparison.
    NotEquals(String, FilterValue),

    /// Less than comparison.
    Lt(String, FilterValue),
    /// Less than or equal comparison.
    Lte(String, FilterValue),
    /// Greater than comparison.
    Gt(String, FilterValue),
    /// Greater than or equal comparison.
    Gte(String, FilterValue),

    /// In a list of values.
    In(String, Vec<FilterValue>),
    /// Not in a list of values.
    NotIn(String, Vec<FilterValue>),
    /// Inclusive range.
    Between(String, FilterValue, FilterValue),

    /// Contains (LIKE %value%).
    Contains(String, FilterValue),
    /// Case-insensitive contains.
    IContains(String, FilterValue),
    /// Starts with (LIKE value%).
    StartsWith(String, FilterValue),
    /// Case-insensitive starts with.
    IStartsWith(String, FilterValue),
    /// Ends with (LIKE %value).
    EndsWith(String, FilterValue),
    /// Case-insensitive ends with.
    IEndsWith(String, FilterValue),

    /// `IS` comparison.
    Is(String, FilterValue),
    /// `IS NOT` comparison.
    IsNot(String, FilterValue),
    /// Is null check.
    IsNull(String),
    /// Is not null check.
    IsNotNull(String),

    /// Raw SQL fragment with `?` markers replaced by numbered placeholders.
    Raw(String, Vec<FilterValue>),

    /// Logical AND of multiple filters.
    And(Vec<Filter>),
    /// Logical OR of multiple filters.
    Or(Vec<Filter>),
    /// Logical NOT of a filter.
    Not(Box<Filter>),
}

impl Filter {
    /// Create an empty filter (matches everything).
    pub fn none() -> Self {
        Self::None
    }

    /// Check if this filter is empty.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Create an AND filter.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut filters: Vec<_> = filters.into_iter().filter(|f| !f.is_none()).collect();
        match filters.len() {
            0 => Self::None,
            1 => filters.swap_remove(0),
            _ => Self::And(filters),
        }
    }

    /// Create an OR filter.
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut filters: Vec<_> = filters.into_iter().filter(|f| !f.is_none()).collect();
        match filters.len() {
            0 => Self::None,
            1 => filters.swap_remove(0),
            _ => Self::Or(filters),
        }
    }

    /// Create a NOT filter.
    pub fn not(filter: Filter) -> Self {
        if filter.is_none() {
            return Self::None;
        }
        Self::Not(Box::new(filter))
    }

    /// Create a raw SQL filter.
    pub fn raw(sql: impl Into<String>, params: impl IntoIterator<Item = FilterValue>) -> Self {
        Self::Raw(sql.into(), params.into_iter().collect())
    }

    /// Combine with another filter using AND, flattening into an existing AND.
    pub fn and_then(self, other: Filter) -> Self {
        if self.is_none() {
            return other;
        }
        if other.is_none() {
            return self;
        }
        match self {
            Self::And(mut filters) => {
                filters.push(other);
                Self::And(filters)
            }
            _ => Self::And(vec![self, other]),
        }
    }

    /// Combine with another filter using OR, flattening into an existing OR.
    pub fn or_else(self, other: Filter) -> Self {
        if self.is_none() {
            return other;
        }
        if other.is_none() {
            return self;
        }
        match self {
            Self::Or(mut filters) => {
                filters.push(other);
                Self::Or(filters)
            }
            _ => Self::Or(vec![self, other]),
        }
    }

    /// Count the leaf predicates in this tree.
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::None => 0,
            Self::And(filters) | Self::Or(filters) => filters.iter().map(Self::leaf_count).sum(),
            Self::Not(filter) => filter.leaf_count(),
            _ => 1,
        }
    }

    /// Generate SQL for this filter with parameter placeholders.
    ///
    /// Placeholders are numbered from `param_offset + 1`.
    /// Returns (sql, params) where params are the values to bind.
    pub fn to_sql(&self, param_offset: usize) -> (String, Vec<FilterValue>) {
        let mut params = Vec::new();
        let sql = self.to_sql_with_params(param_offset, &mut params);
        (sql, params)
    }

    fn to_sql_with_params(&self, offset: usize, params: &mut Vec<FilterValue>) -> String {
        let bind = |value: FilterValue, params: &mut Vec<FilterValue>| {
            params.push(value);
            format!("${}", offset + params.len())
        };

        match self {
            Self::None => "TRUE".to_string(),

            Self::Equals(col, val) => {
                if val.is_null() {
                    format!("{} IS NULL", col)
                } else {
                    format!("{} = {}", col, bind(val.clone(), params))
                }
            }
            Self::NotEquals(col, val) => {
                if val.is_null() {
                    format!("{} IS NOT NULL", col)
                } else {
                    format!("{} != {}", col, bind(val.clone(), params))
                }
            }

            Self::Lt(col, val) => format!("{} < {}", col, bind(val.clone(), params)),
            Self::Lte(col, val) => format!("{} <= {}", col, bind(val.clone(), params)),
            Self::Gt(col, val) => format!("{} > {}", col, bind(val.clone(), params)),
            Self::Gte(col, val) => format!("{} >= {}", col, bind(val.clone(), params)),

            Self::In(col, values) => {
                if values.is_empty() {
                    return "FALSE".to_string();
                }
                let placeholders: Vec<_> = values.iter().map(|v| bind(v.clone(), params)).collect();
                format!("{} IN ({})", col, placeholders.join(", "))
            }
            Self::NotIn(col, values) => {
                if values.is_empty() {
                    return "TRUE".to_string();
                }
                let placeholders: Vec<_> = values.iter().map(|v| bind(v.clone(), params)).collect();
                format!("{} NOT IN ({})", col, placeholders.join(", "))
            }
            Self::Between(col, low, high) => {
                let low = bind(low.clone(), params);
                let high = bind(high.clone(), params);
                format!("{} BETWEEN {} AND {}", col, low, high)
            }

            Self::Contains(col, val) => {
                let p = bind(val.map_string(|s| format!("%{}%", s)), params);
                format!("{} LIKE {}", col, p)
            }
            Self::IContains(col, val) => {
                let p = bind(val.map_string(|s| format!("%{}%", s)), params);
                format!("LOWER({}) LIKE LOWER({})", col, p)
            }
            Self::StartsWith(col, val) => {
                let p = bind(val.map_string(|s| format!("{}%", s)), params);
                format!("{} LIKE {}", col, p)
            }
            Self::IStartsWith(col, val) => {
                let p = bind(val.map_string(|s| format!("{}%", s)), params);
                format!("LOWER({}) LIKE LOWER({})", col, p)
            }
            Self::EndsWith(col, val) => {
                let p = bind(val.map_string(|s| format!("%{}", s)), params);
                format!("{} LIKE {}", col, p)
            }
            Self::IEndsWith(col, val) => {
                let p = bind(val.map_string(|s| format!("%{}", s)), params);
                format!("LOWER({}) LIKE LOWER({})", col, p)
            }

            Self::Is(col, val) => match val {
                FilterValue::Null => format!("{} IS NULL", col),
                FilterValue::Bool(true) => format!("{} IS TRUE", col),
                FilterValue::Bool(false) => format!("{} IS FALSE", col),
                other => format!("{} IS {}", col, bind(other.clone(), params)),
            },
            Self::IsNot(col, val) => match val {
                FilterValue::Null => format!("{} IS NOT NULL", col),
                FilterValue::Bool(true) => format!("{} IS NOT TRUE", col),
                FilterValue::Bool(false) => format!("{} IS NOT FALSE", col),
                other => format!("{} IS NOT {}", col, bind(other.clone(), params)),
            },
            Self::IsNull(col) => format!("{} IS NULL", col),
            Self::IsNotNull(col) => format!("{} IS NOT NULL", col),

            Self::Raw(sql, values) => {
                let mut out = String::with_capacity(sql.len());
                let mut values = values.iter();
                for ch in sql.chars() {
                    if ch == '?' {
                        if let Some(v) = values.next() {
                            out.push_str(&bind(v.clone(), params));
                            continue;
                        }
                    }
                    out.push(ch);
                }
                out
            }

            Self::And(filters) => {
                if filters.is_empty() {
                    return "TRUE".to_string();
                }
                let parts: Vec<_> = filters
                    .iter()
                    .map(|f| f.to_sql_with_params(offset, params))
                    .collect();
                format!("({})", parts.join(" AND "))
            }
            Self::Or(filters) => {
                if filters.is_empty() {
                    return "FALSE".to_string();
                }
                let parts: Vec<_> = filters
                    .iter()
                    .map(|f| f.to_sql_with_params(offset, params))
                    .collect();
                format!("({})", parts.join(" OR "))
            }
            Self::Not(filter) => {
                let inner = filter.to_sql_with_params(offset, params);
                format!("NOT ({})", inner)
            }
        }
    }
}
