//! Metadata filter expressions.
//!
//! A [`Filter`] is a conjunction of metadata equality tests. The only
//! way the rest of the crate (and the application crate) scopes a read,
//! a delete, or a similarity query to an owner is [`build_filter`].
//!
//! Equality never matches a missing key: a chunk saved without a
//! category is invisible to `category == ""` and to
//! `category == "anything"`.

use std::fmt;

use serde_json::{json, Value};

use crate::models::{Metadata, CATEGORY_KEY, OWNER_KEY};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `metadata[key] == value`; false when the key is absent.
    Eq { key: String, value: String },
    /// All sub-filters hold. An empty conjunction matches everything.
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(key: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Eq {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Evaluate the filter against a metadata map.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Filter::Eq { key, value } => metadata.get(key) == Some(value),
            Filter::And(filters) => filters.iter().all(|f| f.matches(metadata)),
        }
    }

    /// Flatten into `(key, value)` equality pairs, in order.
    pub fn equalities(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        self.collect_equalities(&mut out);
        out
    }

    fn collect_equalities<'a>(&'a self, out: &mut Vec<(&'a str, &'a str)>) {
        match self {
            Filter::Eq { key, value } => out.push((key, value)),
            Filter::And(filters) => {
                for f in filters {
                    f.collect_equalities(out);
                }
            }
        }
    }

    /// Chroma-style JSON rendering, used for logs and diagnostics.
    pub fn to_json(&self) -> Value {
        match self {
            Filter::Eq { key, value } => {
                let mut map = serde_json::Map::new();
                map.insert(key.clone(), json!({ "$eq": value }));
                Value::Object(map)
            }
            Filter::And(filters) => {
                json!({ "$and": filters.iter().map(Filter::to_json).collect::<Vec<_>>() })
            }
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// Identity filter for an `(owner, category)` scope.
///
/// - `category = None` ⇒ `owner == owner` (every category of the owner,
///   including uncategorized content).
/// - `category = Some(c)` ⇒ `owner == owner AND category == c`.
pub fn build_filter(owner: &str, category: Option<&str>) -> Filter {
    match category {
        None => Filter::eq(OWNER_KEY, owner),
        Some(category) => Filter::And(vec![
            Filter::eq(OWNER_KEY, owner),
            Filter::eq(CATEGORY_KEY, category),
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::scope_metadata;

    #[test]
    fn test_owner_only_shape() {
        assert_eq!(build_filter("u1", None), Filter::eq("owner", "u1"));
    }

    #[test]
    fn test_owner_and_category_shape() {
        let f = build_filter("u1", Some("notes"));
        assert_eq!(
            f,
            Filter::And(vec![Filter::eq("owner", "u1"), Filter::eq("category", "notes")])
        );
        assert_eq!(f.equalities(), vec![("owner", "u1"), ("category", "notes")]);
    }

    #[test]
    fn test_owner_only_matches_all_categories() {
        let f = build_filter("u1", None);
        assert!(f.matches(&scope_metadata("u1", None)));
        assert!(f.matches(&scope_metadata("u1", Some("a"))));
        assert!(f.matches(&scope_metadata("u1", Some(""))));
        assert!(!f.matches(&scope_metadata("u2", None)));
    }

    #[test]
    fn test_absent_category_never_matches_empty_string() {
        let uncategorized = scope_metadata("u1", None);
        assert!(!build_filter("u1", Some("")).matches(&uncategorized));
        assert!(!build_filter("u1", Some("anything")).matches(&uncategorized));

        let empty = scope_metadata("u1", Some(""));
        assert!(build_filter("u1", Some("")).matches(&empty));
    }

    #[test]
    fn test_json_rendering() {
        let f = build_filter("u1", Some("notes"));
        assert_eq!(
            f.to_json(),
            json!({ "$and": [ { "owner": { "$eq": "u1" } }, { "category": { "$eq": "notes" } } ] })
        );
    }
}
