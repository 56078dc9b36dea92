//! Tag sets and allow/ignore filtering

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeSet;

/// Prefix accepted in front of an allow pattern
const REGEXP_PREFIX: &str = "regexp:";

/// Deduplicated, lexically ordered set of tag names
///
/// Empty names never enter the set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if tag.is_empty() {
            return false;
        }
        self.0.insert(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tags in ascending lexical order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.0.retain(|tag| keep(tag));
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Allow pattern plus ignore list applied to listed tags
///
/// A tag survives when it matches the allow regex (if one is set) and no
/// ignore entry. Ignore entries are globs, so a plain tag name excludes
/// exactly that tag and `*-rc*` excludes every release candidate.
#[derive(Debug, Clone, Default)]
pub struct TagFilter {
    allow: Option<Regex>,
    ignore: Vec<glob::Pattern>,
}

impl TagFilter {
    /// Build a filter; an empty `allow_pattern` admits every tag
    pub fn new(allow_pattern: &str, ignore: &[String]) -> Result<Self> {
        let pattern = allow_pattern.trim();
        let pattern = pattern.strip_prefix(REGEXP_PREFIX).unwrap_or(pattern);

        let allow = if pattern.is_empty() {
            None
        } else {
            let re = Regex::new(pattern)
                .with_context(|| format!("invalid allow pattern {:?}", pattern))?;
            Some(re)
        };

        let ignore = ignore
            .iter()
            .map(|entry| entry.trim())
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                glob::Pattern::new(entry)
                    .with_context(|| format!("invalid ignore pattern {:?}", entry))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { allow, ignore })
    }

    pub fn admits(&self, tag: &str) -> bool {
        let allowed = self.allow.as_ref().is_none_or(|re| re.is_match(tag));
        allowed && !self.ignore.iter().any(|pattern| pattern.matches(tag))
    }

    /// Drop every tag the filter does not admit
    pub fn apply(&self, mut tags: TagSet) -> TagSet {
        tags.retain(|tag| self.admits(tag));
        tags
    }
}
