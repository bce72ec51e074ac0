//! # sift-schema
//!
//! Model metadata and configuration for the Sift filtering layer.
//!
//! This crate provides:
//! - Model, column and relation metadata used to resolve filter paths
//! - A [`Schema`] registry that answers column/relation lookups by name
//! - Schema validation (relations point at real models and columns)
//! - Configuration parsing for `sift.toml` files
//!
//! ## Example
//!
//! ```rust
//! use sift_schema::{ModelBuilder, ScalarType, Schema, validate_schema};
//!
//! let mut schema = Schema::new();
//! schema.add_model(
//!     ModelBuilder::new("User", "users")
//!         .primary_key("id", ScalarType::Int)
//!         .column("email", ScalarType::String)
//!         .build(),
//! );
//! schema.add_model(
//!     ModelBuilder::new("Article", "articles")
//!         .primary_key("id", ScalarType::Int)
//!         .column("user_id", ScalarType::Int)
//!         .many_to_one("user", "User", "user_id", "id")
//!         .build(),
//! );
//!
//! let schema = validate_schema(schema).unwrap();
//! let article = schema.get_model("Article").unwrap();
//! assert!(article.relation("user").is_some());
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod validator;

pub use ast::*;
pub use config::{CombinatorKind, FilteringConfig, PaginationConfig, SiftConfig};
pub use error::{SchemaError, SchemaResult};
pub use validator::{Validator, validate_schema};
