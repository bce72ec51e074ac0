//! Schema validation.
//!
//! Checks a schema before filters are defined against it:
//! - Table names are unique
//! - Every relation targets a registered model
//! - Relation join columns exist on both sides

use std::collections::HashSet;

use crate::ast::*;
use crate::error::{SchemaError, SchemaResult};

/// Schema validator.
#[derive(Debug)]
pub struct Validator {
    /// Collected validation errors.
    errors: Vec<SchemaError>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// Create a new validator.
    pub fn new() -> Self {
        Self { errors: vec![] }
    }

    /// Validate a schema and return it back or every problem found.
    pub fn validate(&mut self, schema: Schema) -> SchemaResult<Schema> {
        self.errors.clear();

        self.check_duplicates(&schema);

        for model in schema.models.values() {
            self.validate_model(model, &schema);
        }

        if self.errors.is_empty() {
            Ok(schema)
        } else {
            Err(SchemaError::ValidationFailed {
                count: self.errors.len(),
                errors: std::mem::take(&mut self.errors),
            })
        }
    }

    /// Check for tables shared by two models and names used twice on one model.
    fn check_duplicates(&mut self, schema: &Schema) {
        let mut tables = HashSet::new();
        for model in schema.models.values() {
            if !tables.insert(model.table()) {
                self.errors.push(SchemaError::duplicate("table", model.table()));
            }

            for name in model.relations.keys() {
                if model.columns.contains_key(name) {
                    self.errors.push(SchemaError::duplicate(
                        "attribute",
                        format!("{}.{}", model.name(), name),
                    ));
                }
            }
        }
    }

    fn validate_model(&mut self, model: &Model, schema: &Schema) {
        for relation in model.relations.values() {
            self.validate_relation(model, relation, schema);
        }
    }

    fn validate_relation(&mut self, model: &Model, relation: &Relation, schema: &Schema) {
        if model.column(&relation.local_column).is_none() {
            self.errors.push(SchemaError::invalid_relation(
                model.name(),
                relation.name(),
                format!("missing local column `{}`", relation.local_column),
            ));
        }

        let Some(target) = schema.get_model(&relation.target) else {
            self.errors.push(SchemaError::invalid_relation(
                model.name(),
                relation.name(),
                format!("target model `{}` does not exist", relation.target),
            ));
            return;
        };

        if target.column(&relation.remote_column).is_none() {
            self.errors.push(SchemaError::invalid_relation(
                model.name(),
                relation.name(),
                format!(
                    "missing column `{}` on `{}`",
                    relation.remote_column,
                    target.name()
                ),
            ));
        }
    }
}

/// Validate a schema with a fresh [`Validator`].
pub fn validate_schema(schema: Schema) -> SchemaResult<Schema> {
    Validator::new().validate(schema)
}
