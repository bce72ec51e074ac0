//! Metadata types describing the models a filter can target.
//!
//! This module contains the types that represent models, their typed
//! columns, and the relations between them.

mod column;
mod model;
mod relation;
mod schema;
mod types;

pub use column::*;
pub use model::*;
pub use relation::*;
pub use schema::*;
pub use types::*;
