//! Error types for model metadata and configuration.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while looking up or validating model metadata.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    /// Error reading a file.
    #[error("failed to read file: {path}")]
    #[diagnostic(code(sift::schema::io_error))]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A model name that is not registered.
    #[error("unknown model `{name}`")]
    #[diagnostic(code(sift::schema::unknown_model))]
    UnknownModel { name: String },

    /// A column that does not exist on a model.
    #[error("{model} model has not attribute called '{column}'")]
    #[diagnostic(code(sift::schema::unknown_column))]
    UnknownColumn { model: String, column: String },

    /// A relation that does not exist on a model.
    #[error("{model} model has no relation called '{relation}'")]
    #[diagnostic(code(sift::schema::unknown_relation))]
    UnknownRelation { model: String, relation: String },

    /// Invalid relation definition.
    #[error("invalid relation `{model}.{relation}`: {message}")]
    #[diagnostic(code(sift::schema::invalid_relation))]
    InvalidRelation {
        model: String,
        relation: String,
        message: String,
    },

    /// Duplicate definition.
    #[error("duplicate {kind} `{name}`")]
    #[diagnostic(code(sift::schema::duplicate))]
    Duplicate { kind: String, name: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    #[diagnostic(code(sift::schema::config_error))]
    ConfigError { message: String },

    /// TOML parsing error.
    #[error("failed to parse TOML")]
    #[diagnostic(code(sift::schema::toml_error))]
    TomlError {
        #[source]
        source: toml::de::Error,
    },

    /// Validation error with multiple issues.
    #[error("schema validation failed with {count} error(s)")]
    #[diagnostic(code(sift::schema::validation_failed))]
    ValidationFailed {
        count: usize,
        #[related]
        errors: Vec<SchemaError>,
    },
}

impl SchemaError {
    /// Create an unknown model error.
    pub fn unknown_model(name: impl Into<String>) -> Self {
        Self::UnknownModel { name: name.into() }
    }

    /// Create an unknown column error.
    pub fn unknown_column(model: impl Into<String>, column: impl Into<String>) -> Self {
        Self::UnknownColumn {
            model: model.into(),
            column: column.into(),
        }
    }

    /// Create an unknown relation error.
    pub fn unknown_relation(model: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::UnknownRelation {
            model: model.into(),
            relation: relation.into(),
        }
    }

    /// Create an invalid relation error.
    pub fn invalid_relation(
        model: impl Into<String>,
        relation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidRelation {
            model: model.into(),
            relation: relation.into(),
            message: message.into(),
        }
    }

    /// Create a duplicate definition error.
    pub fn duplicate(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Duplicate {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}
