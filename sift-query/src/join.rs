//! Joins implied by dotted relation paths.
//!
//! Resolving `category.name` against `Article` walks the `category` relation
//! and records one [`Join`] per hop. Joins are keyed by their relation path,
//! so two fields that walk the same path share a single join.
//!
//! Every join is aliased after its path (`author.company` becomes
//! `author__company`). Two relations to the same table, or a relation back
//! to the root table, therefore get distinct names in the `FROM` clause.

use std::fmt;

use indexmap::IndexMap;

/// An inner join to a related table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// Relation path from the root model, e.g. `category` or `author.company`.
    pub path: String,
    /// Joined table name.
    pub table: String,
    /// Name the joined table is referenced by.
    pub alias: String,
    /// Join condition, e.g. `articles.category_id = category.id`.
    pub on: String,
}

impl Join {
    /// Create a join aliased after its relation path.
    pub fn new(path: impl Into<String>, table: impl Into<String>, on: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            alias: alias_for(&path),
            path,
            table: table.into(),
            on: on.into(),
        }
    }

    /// Reference the joined table by a different name.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Qualify a column with this join's alias.
    pub fn column(&self, name: &str) -> String {
        format!("{}.{}", self.alias, name)
    }

    /// Generate the SQL for this join.
    pub fn to_sql(&self) -> String {
        if self.alias == self.table {
            format!("INNER JOIN {} ON {}", self.table, self.on)
        } else {
            format!("INNER JOIN {} AS {} ON {}", self.table, self.alias, self.on)
        }
    }
}

/// Alias for a relation path: `author.company` becomes `author__company`.
pub fn alias_for(path: &str) -> String {
    path.replace('.', "__")
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// Insertion-ordered, path-deduplicated joins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinSet {
    joins: IndexMap<String, Join>,
}

impl JoinSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The join recorded for a relation path.
    pub fn get(&self, path: &str) -> Option<&Join> {
        self.joins.get(path)
    }

    /// Add a join. Returns `false` if the path was already present.
    pub fn insert(&mut self, join: Join) -> bool {
        if self.joins.contains_key(&join.path) {
            return false;
        }
        self.joins.insert(join.path.clone(), join);
        true
    }

    /// Add every join from an iterator.
    pub fn extend(&mut self, joins: impl IntoIterator<Item = Join>) {
        for join in joins {
            self.insert(join);
        }
    }

    /// Iterate over the joins in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Join> {
        self.joins.values()
    }

    /// Number of distinct joins.
    pub fn len(&self) -> usize {
        self.joins.len()
    }

    /// Check if there are no joins.
    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Take the joins out in insertion order.
    pub fn into_vec(self) -> Vec<Join> {
        self.joins.into_values().collect()
    }
}

impl FromIterator<Join> for JoinSet {
    fn from_iter<I: IntoIterator<Item = Join>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn category() -> Join {
        Join::new("category", "categories", "articles.category_id = category.id")
    }

    #[test]
    fn test_join_sql() {
        assert_eq!(
            category().to_sql(),
            "INNER JOIN categories AS category ON articles.category_id = category.id"
        );
        assert_eq!(category().column("name"), "category.name");

        let plain = Join::new("category", "categories", "articles.category_id = categories.id")
            .with_alias("categories");
        assert_eq!(
            plain.to_sql(),
            "INNER JOIN categories ON articles.category_id = categories.id"
        );
    }

    #[test]
    fn test_alias_from_path() {
        let join = Join::new("author.company", "companies", "author.company_id = author__company.id");
        assert_eq!(join.alias, "author__company");
        assert_eq!(
            join.to_sql(),
            "INNER JOIN companies AS author__company ON author.company_id = author__company.id"
        );
    }

    #[test]
    fn test_dedup_by_path() {
        let mut set = JoinSet::new();
        assert!(set.insert(category()));
        assert!(!set.insert(category()));
        set.extend([
            Join::new("author", "users", "articles.author_id = author.id"),
            category(),
        ]);

        assert_eq!(set.len(), 2);
        let paths: Vec<_> = set.iter().map(|j| j.path.as_str()).collect();
        assert_eq!(paths, vec!["category", "author"]);
        assert_eq!(set.get("author").map(|j| j.alias.as_str()), Some("author"));
        assert!(set.get("editor").is_none());
    }
}
