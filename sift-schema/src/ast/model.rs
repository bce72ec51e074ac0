//! Model definitions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{Column, Relation, RelationType, ScalarType};

/// A model (maps to a database table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Model name.
    pub name: SmolStr,
    /// Database table name.
    pub table: SmolStr,
    /// Columns in declaration order.
    pub columns: IndexMap<SmolStr, Column>,
    /// Relations in declaration order.
    pub relations: IndexMap<SmolStr, Relation>,
}

impl Model {
    /// Create a new model with no columns.
    pub fn new(name: impl Into<SmolStr>, table: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: IndexMap::new(),
            relations: IndexMap::new(),
        }
    }

    /// Get the model name as a string.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Get the database table name.
    pub fn table(&self) -> &str {
        self.table.as_str()
    }

    /// Add a column to the model.
    pub fn add_column(&mut self, column: Column) {
        self.columns.insert(column.name.clone(), column);
    }

    /// Add a relation to the model.
    pub fn add_relation(&mut self, relation: Relation) {
        self.relations.insert(relation.name.clone(), relation);
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Get a relation by name.
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    /// Check whether `name` is a column or a relation on this model.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.columns.contains_key(name) || self.relations.contains_key(name)
    }

    /// Get the primary key columns.
    pub fn primary_key(&self) -> Vec<&Column> {
        self.columns.values().filter(|c| c.primary_key).collect()
    }

    /// Get all column names.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|s| s.as_str())
    }
}

/// Builder for [`Model`].
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    model: Model,
}

impl ModelBuilder {
    /// Start a model named `name` stored in `table`.
    pub fn new(name: impl Into<SmolStr>, table: impl Into<SmolStr>) -> Self {
        Self {
            model: Model::new(name, table),
        }
    }

    /// Add a primary key column.
    pub fn primary_key(mut self, name: impl Into<SmolStr>, scalar_type: ScalarType) -> Self {
        self.model
            .add_column(Column::new(name, scalar_type).primary_key());
        self
    }

    /// Add a non-null column.
    pub fn column(mut self, name: impl Into<SmolStr>, scalar_type: ScalarType) -> Self {
        self.model.add_column(Column::new(name, scalar_type));
        self
    }

    /// Add a nullable column.
    pub fn nullable(mut self, name: impl Into<SmolStr>, scalar_type: ScalarType) -> Self {
        self.model.add_column(Column::new(name, scalar_type).nullable());
        self
    }

    /// Add a many-to-one relation (this model holds the foreign key).
    pub fn many_to_one(
        self,
        name: impl Into<SmolStr>,
        target: impl Into<SmolStr>,
        local_column: impl Into<SmolStr>,
        remote_column: impl Into<SmolStr>,
    ) -> Self {
        self.relation(Relation::new(
            name,
            RelationType::ManyToOne,
            target,
            local_column,
            remote_column,
        ))
    }

    /// Add a one-to-many relation (the target holds the foreign key).
    pub fn one_to_many(
        self,
        name: impl Into<SmolStr>,
        target: impl Into<SmolStr>,
        local_column: impl Into<SmolStr>,
        remote_column: impl Into<SmolStr>,
    ) -> Self {
        self.relation(Relation::new(
            name,
            RelationType::OneToMany,
            target,
            local_column,
            remote_column,
        ))
    }

    /// Add an arbitrary relation.
    pub fn relation(mut self, relation: Relation) -> Self {
        self.model.add_relation(relation);
        self
    }

    /// Finish building.
    pub fn build(self) -> Model {
        self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Model {
        ModelBuilder::new("User", "users")
            .primary_key("id", ScalarType::Int)
            .column("first_name", ScalarType::String)
            .nullable("last_login_time", ScalarType::Time)
            .one_to_many("articles", "Article", "id", "user_id")
            .build()
    }

    #[test]
    fn test_model_lookup() {
        let model = user();
        assert_eq!(model.name(), "User");
        assert_eq!(model.table(), "users");
        assert!(model.column("first_name").is_some());
        assert!(model.column("articles").is_none());
        assert!(model.relation("articles").is_some());
    }

    #[test]
    fn test_has_attribute() {
        let model = user();
        assert!(model.has_attribute("id"));
        assert!(model.has_attribute("articles"));
        assert!(!model.has_attribute("password"));
    }

    #[test]
    fn test_column_order_preserved() {
        let model = user();
        let names: Vec<_> = model.column_names().collect();
        assert_eq!(names, vec!["id", "first_name", "last_login_time"]);
        assert_eq!(model.primary_key().len(), 1);
    }
}
