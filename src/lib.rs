//! # Sift
//!
//! Declarative, validated filtering, ordering and pagination for relational
//! query builders.
//!
//! Sift provides:
//! - Model metadata used to resolve dotted relation paths into joins
//! - Typed fields that coerce raw request input and report every failure
//! - A pluggable operator registry
//! - Nested filter groups, method fields and whole-input validation hooks
//! - `sift.toml` configuration for paging and combinator defaults
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use sift::prelude::*;
//!
//! # #[derive(Clone)] struct Db;
//! # impl QueryEngine for Db {
//! #     type Row = ();
//! #     fn query_many(&self, _: &str, _: Vec<FilterValue>) -> QueryResult<Vec<()>> { Ok(vec![]) }
//! #     fn count(&self, _: &str, _: Vec<FilterValue>) -> QueryResult<u64> { Ok(0) }
//! # }
//! let schema = Schema::new()
//!     .with_model(
//!         ModelBuilder::new("Company", "companies")
//!             .primary_key("id", ScalarType::Int)
//!             .column("name", ScalarType::String)
//!             .build(),
//!     )
//!     .with_model(
//!         ModelBuilder::new("User", "users")
//!             .primary_key("id", ScalarType::Int)
//!             .column("email", ScalarType::String)
//!             .column("company_id", ScalarType::Int)
//!             .many_to_one("company", "Company", "company_id", "id")
//!             .build(),
//!     );
//!
//! let users = FilterSet::builder("UserFilter", "User")
//!     .field("company", Field::string().target("company.name"))
//!     .session(|model: &Model| SelectQuery::for_model(Db, model))
//!     .build(&schema)?;
//!
//! let input = json!({"company": "Pegasus"});
//! let query = users.composer(input.as_object().cloned().unwrap_or_default()).apply()?;
//!
//! let (sql, _) = query.build_sql();
//! assert_eq!(
//!     sql,
//!     "SELECT users.* FROM users INNER JOIN companies AS company ON users.company_id = company.id \
//!      WHERE company.name = $1"
//! );
//! # Ok::<(), sift::FilterError>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Model metadata and configuration.
pub mod schema {
    pub use sift_schema::*;
}

/// Filter sets, composition, ordering and pagination.
pub mod query {
    pub use sift_query::*;
}

pub use sift_query::logging;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::schema::{Model, ModelBuilder, ScalarType, Schema, SiftConfig};
    pub use sift_query::prelude::*;
}

// Re-export key types at the crate root
pub use sift_query::{
    Data, Field, Filter, FilterComposer, FilterError, FilterSet, FilterValidationError,
    FilterValue, QueryError,
};
pub use sift_schema::{Schema, SiftConfig};
