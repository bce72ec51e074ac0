//! Relations between models.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// The type of relation between two models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationType {
    /// One-to-one relation.
    OneToOne,
    /// One-to-many relation.
    OneToMany,
    /// Many-to-one relation (inverse of one-to-many).
    ManyToOne,
}

impl RelationType {
    /// Check if this is a "to-one" relation.
    pub fn is_to_one(&self) -> bool {
        matches!(self, Self::OneToOne | Self::ManyToOne)
    }

    /// Check if this is a "to-many" relation.
    pub fn is_to_many(&self) -> bool {
        matches!(self, Self::OneToMany)
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OneToOne => write!(f, "1:1"),
            Self::OneToMany => write!(f, "1:n"),
            Self::ManyToOne => write!(f, "n:1"),
        }
    }
}

/// A named relation from one model to another.
///
/// The join condition is `<owner table>.<local_column> = <target table>.<remote_column>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Relation (attribute) name on the owning model.
    pub name: SmolStr,
    /// The type of relation.
    pub kind: RelationType,
    /// Name of the target model.
    pub target: SmolStr,
    /// Column on the owning model.
    pub local_column: SmolStr,
    /// Column on the target model.
    pub remote_column: SmolStr,
}

impl Relation {
    /// Create a new relation.
    pub fn new(
        name: impl Into<SmolStr>,
        kind: RelationType,
        target: impl Into<SmolStr>,
        local_column: impl Into<SmolStr>,
        remote_column: impl Into<SmolStr>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            local_column: local_column.into(),
            remote_column: remote_column.into(),
        }
    }

    /// Get the relation name as a string.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }
}
