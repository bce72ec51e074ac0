//! Column definitions.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::ScalarType;

/// A typed column on a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name (also the attribute name used by filters).
    pub name: SmolStr,
    /// Scalar type of the column.
    pub scalar_type: ScalarType,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Whether the column is (part of) the primary key.
    pub primary_key: bool,
}

impl Column {
    /// Create a new non-null column.
    pub fn new(name: impl Into<SmolStr>, scalar_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar_type,
            nullable: false,
            primary_key: false,
        }
    }

    /// Mark the column as nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark the column as a primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Get the column name as a string.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }
}
