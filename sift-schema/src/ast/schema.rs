//! The model registry.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{Model, Relation};
use crate::error::{SchemaError, SchemaResult};

/// A set of models that filters can be defined against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// All models, keyed by name.
    pub models: IndexMap<SmolStr, Model>,
}

impl Schema {
    /// Create a new empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model to the schema.
    pub fn add_model(&mut self, model: Model) {
        self.models.insert(model.name.clone(), model);
    }

    /// Builder-style [`Schema::add_model`].
    pub fn with_model(mut self, model: Model) -> Self {
        self.add_model(model);
        self
    }

    /// Get a model by name.
    pub fn get_model(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    /// Get a model by name, failing with [`SchemaError::UnknownModel`].
    pub fn model(&self, name: &str) -> SchemaResult<&Model> {
        self.get_model(name)
            .ok_or_else(|| SchemaError::unknown_model(name))
    }

    /// Resolve `relation` on `model` to the relation and its target model.
    pub fn relation_target(&self, model: &str, relation: &str) -> SchemaResult<(&Relation, &Model)> {
        let owner = self.model(model)?;
        let rel = owner
            .relation(relation)
            .ok_or_else(|| SchemaError::unknown_relation(model, relation))?;
        let target = self.model(&rel.target)?;
        Ok((rel, target))
    }

    /// Get all model names.
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(|s| s.as_str())
    }

    /// Merge another schema into this one.
    pub fn merge(&mut self, other: Schema) {
        self.models.extend(other.models);
    }
}
