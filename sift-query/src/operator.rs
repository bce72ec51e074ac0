//! Operators and the process-wide operator registry.
//!
//! An [`Operator`] turns a target expression and its operands into a
//! [`Filter`]. Operators are looked up by [`OperatorId`] through the registry,
//! which comes pre-populated with the built-ins and accepts new operators at
//! startup.
//!
//! ```rust
//! use sift_query::operator::{self, OperatorId};
//! use sift_query::{Filter, FilterValue};
//!
//! let op = operator::resolve(&OperatorId::BETWEEN).unwrap();
//! let filter = op.apply("users.age", vec![18.into(), 30.into()]).unwrap();
//! assert_eq!(filter, Filter::Between("users.age".into(), 18.into(), 30.into()));
//!
//! // reverse lookup by SQL symbol
//! let op = operator::resolve_symbol(">=").unwrap();
//! assert_eq!(op.id(), OperatorId::GTE);
//! ```

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use parking_lot::RwLock;
use sift_schema::CombinatorKind;

use crate::error::{FieldValidationError, QueryError, QueryResult};
use crate::filter::{Filter, FilterValue};

/// Identity of an operator in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperatorId(Cow<'static, str>);

impl OperatorId {
    /// `=`
    pub const EQ: Self = Self::from_static("eq");
    /// `!=`
    pub const NE: Self = Self::from_static("ne");
    /// `>`
    pub const GT: Self = Self::from_static("gt");
    /// `>=`
    pub const GTE: Self = Self::from_static("gte");
    /// `<`
    pub const LT: Self = Self::from_static("lt");
    /// `<=`
    pub const LTE: Self = Self::from_static("lte");
    /// `LIKE %v%`
    pub const CONTAINS: Self = Self::from_static("contains");
    /// `LOWER(c) LIKE LOWER(%v%)`
    pub const ICONTAINS: Self = Self::from_static("icontains");
    /// `LIKE v%`
    pub const STARTSWITH: Self = Self::from_static("startswith");
    /// `LOWER(c) LIKE LOWER(v%)`
    pub const ISTARTSWITH: Self = Self::from_static("istartswith");
    /// `LIKE %v`
    pub const ENDSWITH: Self = Self::from_static("endswith");
    /// `LOWER(c) LIKE LOWER(%v)`
    pub const IENDSWITH: Self = Self::from_static("iendswith");
    /// `IN (...)`
    pub const IN: Self = Self::from_static("in");
    /// `NOT IN (...)`
    pub const NOT_IN: Self = Self::from_static("not_in");
    /// `BETWEEN a AND b`
    pub const BETWEEN: Self = Self::from_static("between");
    /// `IS`
    pub const IS: Self = Self::from_static("is");
    /// `IS NOT`
    pub const IS_NOT: Self = Self::from_static("is_not");
    /// `IS NULL`
    pub const IS_NULL: Self = Self::from_static("is_null");
    /// `IS NOT NULL`
    pub const IS_NOT_NULL: Self = Self::from_static("is_not_null");

    /// Create an id from a static string.
    pub const fn from_static(id: &'static str) -> Self {
        Self(Cow::Borrowed(id))
    }

    /// Create an id.
    pub fn new(id: impl Into<Cow<'static, str>>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OperatorId {
    fn default() -> Self {
        Self::EQ
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for OperatorId {
    fn from(id: &'static str) -> Self {
        Self::from_static(id)
    }
}

impl From<String> for OperatorId {
    fn from(id: String) -> Self {
        Self(Cow::Owned(id))
    }
}

/// How many operands an operator takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// No operands; any supplied value is ignored.
    Nullary,
    /// Exactly one operand.
    Unary,
    /// Exactly two operands.
    Binary,
    /// Any number of operands, supplied as a list.
    Variadic,
}

impl Arity {
    /// Whether the input value must be a list.
    pub fn takes_list(&self) -> bool {
        matches!(self, Self::Binary | Self::Variadic)
    }

    /// Check an operand count.
    pub fn check(&self, id: &OperatorId, count: usize) -> Result<(), FieldValidationError> {
        match self {
            Self::Nullary | Self::Variadic => Ok(()),
            Self::Unary if count == 1 => Ok(()),
            Self::Binary if count == 2 => Ok(()),
            Self::Unary => Err(FieldValidationError::new(format!(
                "{} expects a single value, got {}.",
                id, count
            ))),
            Self::Binary => Err(FieldValidationError::new(format!(
                "{} should have exactly 2 values, got {}.",
                id, count
            ))),
        }
    }
}

/// A predicate-construction strategy.
///
/// Implementations must be pure: the same target and operands always build
/// the same filter.
pub trait Operator: Send + Sync + fmt::Debug {
    /// Registry identity.
    fn id(&self) -> OperatorId;

    /// Operand count.
    fn arity(&self) -> Arity;

    /// SQL symbol used for reverse lookup.
    fn sql_symbol(&self) -> Option<&'static str> {
        None
    }

    /// Whether a null operand is meaningful (renders as a null test).
    fn accepts_null(&self) -> bool {
        false
    }

    /// Build the filter. Operands have already passed the arity check.
    fn build(&self, target: &str, params: Vec<FilterValue>) -> Filter;

    /// Check the operands, then build the filter.
    fn apply(&self, target: &str, params: Vec<FilterValue>) -> Result<Filter, FieldValidationError> {
        let params = match self.arity() {
            Arity::Nullary => Vec::new(),
            _ => params,
        };
        self.arity().check(&self.id(), params.len())?;
        Ok(self.build(target, params))
    }
}

type BuildFn = fn(String, Vec<FilterValue>) -> Filter;

/// An operator backed by a plain function.
#[derive(Clone)]
pub struct FnOperator {
    id: OperatorId,
    arity: Arity,
    symbol: Option<&'static str>,
    accepts_null: bool,
    build: BuildFn,
}

impl FnOperator {
    /// Create a new function operator.
    pub fn new(id: impl Into<OperatorId>, arity: Arity, build: BuildFn) -> Self {
        Self {
            id: id.into(),
            arity,
            symbol: None,
            accepts_null: false,
            build,
        }
    }

    /// Set the SQL symbol used for reverse lookup.
    pub fn symbol(mut self, symbol: &'static str) -> Self {
        self.symbol = Some(symbol);
        self
    }

    /// Allow null operands.
    pub fn null_aware(mut self) -> Self {
        self.accepts_null = true;
        self
    }
}

impl fmt::Debug for FnOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOperator")
            .field("id", &self.id)
            .field("arity", &self.arity)
            .field("symbol", &self.symbol)
            .finish()
    }
}

impl Operator for FnOperator {
    fn id(&self) -> OperatorId {
        self.id.clone()
    }

    fn arity(&self) -> Arity {
        self.arity
    }

    fn sql_symbol(&self) -> Option<&'static str> {
        self.symbol
    }

    fn accepts_null(&self) -> bool {
        self.accepts_null
    }

    fn build(&self, target: &str, params: Vec<FilterValue>) -> Filter {
        (self.build)(target.to_string(), params)
    }
}

fn first(params: Vec<FilterValue>) -> FilterValue {
    params.into_iter().next().unwrap_or(FilterValue::Null)
}

fn pair(params: Vec<FilterValue>) -> (FilterValue, FilterValue) {
    let mut it = params.into_iter();
    let low = it.next().unwrap_or(FilterValue::Null);
    let high = it.next().unwrap_or(FilterValue::Null);
    (low, high)
}

fn builtins() -> Vec<FnOperator> {
    use Arity::*;

    vec![
        FnOperator::new(OperatorId::EQ, Unary, |c, p| match first(p) {
            FilterValue::Null => Filter::IsNull(c),
            v => Filter::Equals(c, v),
        })
        .symbol("=")
        .null_aware(),
        FnOperator::new(OperatorId::NE, Unary, |c, p| match first(p) {
            FilterValue::Null => Filter::IsNotNull(c),
            v => Filter::NotEquals(c, v),
        })
        .symbol("!=")
        .null_aware(),
        FnOperator::new(OperatorId::GT, Unary, |c, p| Filter::Gt(c, first(p))).symbol(">"),
        FnOperator::new(OperatorId::GTE, Unary, |c, p| Filter::Gte(c, first(p))).symbol(">="),
        FnOperator::new(OperatorId::LT, Unary, |c, p| Filter::Lt(c, first(p))).symbol("<"),
        FnOperator::new(OperatorId::LTE, Unary, |c, p| Filter::Lte(c, first(p))).symbol("<="),
        FnOperator::new(OperatorId::CONTAINS, Unary, |c, p| Filter::Contains(c, first(p)))
            .symbol("LIKE"),
        FnOperator::new(OperatorId::ICONTAINS, Unary, |c, p| Filter::IContains(c, first(p)))
            .symbol("ILIKE"),
        FnOperator::new(OperatorId::STARTSWITH, Unary, |c, p| Filter::StartsWith(c, first(p))),
        FnOperator::new(OperatorId::ISTARTSWITH, Unary, |c, p| Filter::IStartsWith(c, first(p))),
        FnOperator::new(OperatorId::ENDSWITH, Unary, |c, p| Filter::EndsWith(c, first(p))),
        FnOperator::new(OperatorId::IENDSWITH, Unary, |c, p| Filter::IEndsWith(c, first(p))),
        FnOperator::new(OperatorId::IN, Variadic, Filter::In).symbol("IN"),
        FnOperator::new(OperatorId::NOT_IN, Variadic, Filter::NotIn).symbol("NOT IN"),
        FnOperator::new(OperatorId::BETWEEN, Binary, |c, p| {
            let (low, high) = pair(p);
            Filter::Between(c, low, high)
        })
        .symbol("BETWEEN"),
        FnOperator::new(OperatorId::IS, Unary, |c, p| Filter::Is(c, first(p)))
            .symbol("IS")
            .null_aware(),
        FnOperator::new(OperatorId::IS_NOT, Unary, |c, p| Filter::IsNot(c, first(p)))
            .symbol("IS NOT")
            .null_aware(),
        FnOperator::new(OperatorId::IS_NULL, Nullary, |c, _| Filter::IsNull(c))
            .symbol("IS NULL")
            .null_aware(),
        FnOperator::new(OperatorId::IS_NOT_NULL, Nullary, |c, _| Filter::IsNotNull(c))
            .symbol("IS NOT NULL")
            .null_aware(),
    ]
}

/// Operators keyed by id, with a symbol index for reverse lookup.
#[derive(Default)]
pub struct OperatorRegistry {
    by_id: IndexMap<OperatorId, Arc<dyn Operator>>,
    by_symbol: HashMap<&'static str, OperatorId>,
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("operators", &self.by_id.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl OperatorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in operators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for op in builtins() {
            registry.register(op);
        }
        registry
    }

    /// Register an operator, replacing any operator with the same id.
    pub fn register(&mut self, operator: impl Operator + 'static) {
        let id = operator.id();
        if let Some(symbol) = operator.sql_symbol() {
            self.by_symbol.insert(symbol, id.clone());
        }
        if self.by_id.insert(id.clone(), Arc::new(operator)).is_some() {
            tracing::debug!(operator = %id, "replaced registered operator");
        }
    }

    /// Look up an operator by id.
    pub fn get(&self, id: &OperatorId) -> Option<Arc<dyn Operator>> {
        self.by_id.get(id).cloned()
    }

    /// Look up an operator by id, failing on unknown ids.
    pub fn resolve(&self, id: &OperatorId) -> QueryResult<Arc<dyn Operator>> {
        self.get(id)
            .ok_or_else(|| QueryError::unknown_operator(id.as_str()))
    }

    /// Look up an operator by SQL symbol (case-insensitive).
    pub fn resolve_symbol(&self, symbol: &str) -> Option<Arc<dyn Operator>> {
        let symbol = symbol.trim().to_uppercase();
        self.by_symbol
            .get(symbol.as_str())
            .and_then(|id| self.get(id))
    }

    /// Check whether an id is registered.
    pub fn contains(&self, id: &OperatorId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &OperatorId> {
        self.by_id.keys()
    }
}

static REGISTRY: LazyLock<RwLock<OperatorRegistry>> =
    LazyLock::new(|| RwLock::new(OperatorRegistry::with_builtins()));

/// Register an operator in the process-wide registry.
pub fn register(operator: impl Operator + 'static) {
    REGISTRY.write().register(operator);
}

/// Resolve an operator from the process-wide registry.
pub fn resolve(id: &OperatorId) -> QueryResult<Arc<dyn Operator>> {
    REGISTRY.read().resolve(id)
}

/// Resolve an operator by SQL symbol from the process-wide registry.
pub fn resolve_symbol(symbol: &str) -> Option<Arc<dyn Operator>> {
    REGISTRY.read().resolve_symbol(symbol)
}

/// Check whether the process-wide registry knows `id`.
pub fn is_registered(id: &OperatorId) -> bool {
    REGISTRY.read().contains(id)
}

/// Boolean combinator for sibling predicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Combinator {
    /// Logical AND.
    #[default]
    And,
    /// Logical OR.
    Or,
}

impl Combinator {
    /// Get the SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    /// Combine any number of predicates; empty ones are dropped.
    pub fn combine_all(&self, filters: impl IntoIterator<Item = Filter>) -> Filter {
        match self {
            Self::And => Filter::and(filters),
            Self::Or => Filter::or(filters),
        }
    }

    /// Join two predicates as one node, keeping each side grouped.
    pub fn combine(&self, left: Filter, right: Filter) -> Filter {
        match (left.is_none(), right.is_none()) {
            (true, _) => right,
            (_, true) => left,
            _ => match self {
                Self::And => Filter::And(vec![left, right]),
                Self::Or => Filter::Or(vec![left, right]),
            },
        }
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl From<CombinatorKind> for Combinator {
    fn from(kind: CombinatorKind) -> Self {
        match kind {
            CombinatorKind::And => Self::And,
            CombinatorKind::Or => Self::Or,
        }
    }
}
