//! Predicate language shared by every storage collaborator.
//!
//! A `Filter` can be evaluated against an in-memory entry or translated
//! into a MongoDB query document. Both paths must agree.

use mongodb::bson::{Bson, Document, doc};

use super::models::{CacheEntry, NEVER_EXPIRES};

/// Boolean predicate over `_id`, `tags` and `expire`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Matches every entry.
    Everything,
    Id(String),
    IdIn(Vec<String>),
    /// Entry carries the tag.
    HasTag(String),
    /// Entry does not carry the tag.
    LacksTag(String),
    ExpireEq(i64),
    ExpireNe(i64),
    ExpireGt(i64),
    ExpireLt(i64),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    /// None of the inner filters match.
    Nor(Vec<Filter>),
}

impl Filter {
    /// Entries readable at `now`: immortal or expiring after `now`.
    pub fn live_at(now: i64) -> Self {
        Self::Or(vec![Self::ExpireEq(NEVER_EXPIRES), Self::ExpireGt(now)])
    }

    /// Entries with a finite expiry strictly before `now`.
    pub fn expired_before(now: i64) -> Self {
        Self::And(vec![Self::ExpireNe(NEVER_EXPIRES), Self::ExpireLt(now)])
    }

    /// Conjunction of `self` and `other`, flattening nested `And`s.
    #[must_use]
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Self::Everything, f) | (f, Self::Everything) => f,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), f) => {
                left.push(f);
                Self::And(left)
            }
            (f, Self::And(mut right)) => {
                right.insert(0, f);
                Self::And(right)
            }
            (left, right) => Self::And(vec![left, right]),
        }
    }

    /// The single id this filter is pinned to, if any.
    pub fn target_id(&self) -> Option<&str> {
        match self {
            Self::Id(id) => Some(id.as_str()),
            Self::And(filters) => filters.iter().find_map(Filter::target_id),
            _ => None,
        }
    }

    /// Evaluate against an entry.
    pub fn matches(&self, entry: &CacheEntry) -> bool {
        match self {
            Self::Everything => true,
            Self::Id(id) => entry.id == *id,
            Self::IdIn(ids) => ids.iter().any(|id| *id == entry.id),
            Self::HasTag(tag) => entry.has_tag(tag),
            Self::LacksTag(tag) => !entry.has_tag(tag),
            Self::ExpireEq(v) => entry.expire == *v,
            Self::ExpireNe(v) => entry.expire != *v,
            Self::ExpireGt(v) => entry.expire > *v,
            Self::ExpireLt(v) => entry.expire < *v,
            Self::And(filters) => filters.iter().all(|f| f.matches(entry)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(entry)),
            Self::Nor(filters) => !filters.iter().any(|f| f.matches(entry)),
        }
    }

    /// Translate into a MongoDB query document.
    ///
    /// MongoDB rejects empty `$and`/`$or`/`$nor` arrays, so empty
    /// combinators are rewritten to their identity: empty `And`/`Nor`
    /// match everything, empty `Or` matches nothing.
    pub fn to_document(&self) -> Document {
        match self {
            Self::Everything => Document::new(),
            Self::Id(id) => doc! { "_id": id.as_str() },
            Self::IdIn(ids) => doc! { "_id": { "$in": ids.clone() } },
            Self::HasTag(tag) => doc! { "tags": tag.as_str() },
            Self::LacksTag(tag) => doc! { "tags": { "$ne": tag.as_str() } },
            Self::ExpireEq(v) => doc! { "expire": *v },
            Self::ExpireNe(v) => doc! { "expire": { "$ne": *v } },
            Self::ExpireGt(v) => doc! { "expire": { "$gt": *v } },
            Self::ExpireLt(v) => doc! { "expire": { "$lt": *v } },
            Self::And(filters) => match filters.as_slice() {
                [] => Document::new(),
                [single] => single.to_document(),
                _ => doc! { "$and": Self::documents(filters) },
            },
            Self::Or(filters) => match filters.as_slice() {
                [] => doc! { "_id": { "$in": Bson::Array(Vec::new()) } },
                [single] => single.to_document(),
                _ => doc! { "$or": Self::documents(filters) },
            },
            Self::Nor(filters) => {
                if filters.is_empty() {
                    Document::new()
                } else {
                    doc! { "$nor": Self::documents(filters) }
                }
            }
        }
    }

    fn documents(filters: &[Filter]) -> Vec<Document> {
        filters.iter().map(Filter::to_document).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, tags: &[&str], expire: i64) -> CacheEntry {
        CacheEntry::new(
            id,
            Vec::new(),
            tags.iter().map(|t| t.to_string()).collect(),
            0,
            expire,
        )
    }

    #[test]
    fn test_live_at_document() {
        assert_eq!(
            Filter::live_at(100).to_document(),
            doc! { "$or": [ { "expire": 0_i64 }, { "expire": { "$gt": 100_i64 } } ] }
        );
    }

    #[test]
    fn test_expired_before_skips_immortal() {
        let filter = Filter::expired_before(100);

        assert!(filter.matches(&entry("old", &[], 50)));
        assert!(!filter.matches(&entry("immortal", &[], NEVER_EXPIRES)));
        assert!(!filter.matches(&entry("fresh", &[], 150)));
        assert_eq!(
            filter.to_document(),
            doc! { "$and": [ { "expire": { "$ne": 0_i64 } }, { "expire": { "$lt": 100_i64 } } ] }
        );
    }

    #[test]
    fn test_nor_matches_entries_without_any_tag() {
        let filter = Filter::Nor(vec![Filter::HasTag("a".into()), Filter::HasTag("b".into())]);

        assert!(filter.matches(&entry("1", &["c"], 0)));
        assert!(filter.matches(&entry("2", &[], 0)));
        assert!(!filter.matches(&entry("3", &["b", "c"], 0)));
        assert_eq!(
            filter.to_document(),
            doc! { "$nor": [ { "tags": "a" }, { "tags": "b" } ] }
        );
    }

    #[test]
    fn test_single_element_combinators_collapse() {
        let filter = Filter::Or(vec![Filter::HasTag("a".into())]);
        assert_eq!(filter.to_document(), doc! { "tags": "a" });

        let filter = Filter::LacksTag("a".into());
        assert_eq!(filter.to_document(), doc! { "tags": { "$ne": "a" } });
    }

    #[test]
    fn test_empty_combinators() {
        let e = entry("x", &["a"], 0);

        assert!(Filter::And(vec![]).matches(&e));
        assert!(!Filter::Or(vec![]).matches(&e));
        assert!(Filter::Nor(vec![]).matches(&e));
        assert_eq!(Filter::And(vec![]).to_document(), Document::new());
    }

    #[test]
    fn test_and_flattens() {
        let filter = Filter::HasTag("a".into())
            .and(Filter::Everything)
            .and(Filter::live_at(5))
            .and(Filter::And(vec![Filter::HasTag("b".into())]));

        assert_eq!(
            filter,
            Filter::And(vec![
                Filter::HasTag("a".into()),
                Filter::live_at(5),
                Filter::HasTag("b".into()),
            ])
        );
    }

    #[test]
    fn test_target_id() {
        let filter = Filter::Id("k".into()).and(Filter::live_at(1));
        assert_eq!(filter.target_id(), Some("k"));
        assert_eq!(Filter::HasTag("k".into()).target_id(), None);
    }

    #[test]
    fn test_id_in() {
        let filter = Filter::IdIn(vec!["a".into(), "b".into()]);

        assert!(filter.matches(&entry("b", &[], 0)));
        assert!(!filter.matches(&entry("c", &[], 0)));
        assert_eq!(filter.to_document(), doc! { "_id": { "$in": ["a", "b"] } });
    }
}
