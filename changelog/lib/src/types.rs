//! Core types shared by the changelog pipeline.
//!
//! Snapshots are fetched once and never mutated afterwards. Entries are
//! produced by the classifier and only read from then on.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Pull request number on the issue tracker.
pub type PrNumber = u64;

/// Canonical categories in the order they are rendered.
///
/// The same list is used to normalize the free-form category text of a
/// pull request description.
pub const CATEGORIES_PREFERRED_ORDER: [&str; 7] = [
    "Backward Incompatible Change",
    "New Feature",
    "Performance Improvement",
    "Improvement",
    "Bug Fix",
    "Build/Testing/Packaging Improvement",
    "Other",
];

/// Pull requests explicitly marked as not worth a changelog line.
pub const NOT_FOR_CHANGELOG: &str = "NOT FOR CHANGELOG / INSIGNIFICANT";

/// Pull requests whose description has no category.
pub const NO_CL_CATEGORY: &str = "NO CL CATEGORY";

/// Pull requests whose description has no entry text.
pub const NO_CL_ENTRY: &str = "NO CL ENTRY";

/// A search hit: the minimum needed to schedule a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: PrNumber,
    pub updated_at: DateTime<Utc>,
}

/// The account that opened a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub login: String,
    /// Display name from the user profile, if one is set.
    pub name: Option<String>,
    pub html_url: String,
}

impl Author {
    /// Display name, falling back to the login.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.login,
        }
    }
}

/// Immutable record of a pull request as fetched from the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrSnapshot {
    pub number: PrNumber,
    pub author: Author,
    pub html_url: String,
    pub title: String,
    pub body: Option<String>,
    pub merge_commit_sha: Option<String>,
    /// Name of the source branch (`head.ref`).
    pub head_ref: String,
    pub updated_at: DateTime<Utc>,
}

/// A classified changelog line.
///
/// `category` is already normalized: a canonical name, one of the sentinel
/// categories, or the raw text when nothing matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub number: PrNumber,
    pub author: String,
    pub author_url: String,
    pub pr_url: String,
    pub text: String,
    pub category: String,
}

/// Commit hashes reachable in the release range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSet {
    hashes: HashSet<String>,
}

impl CommitSet {
    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for CommitSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            hashes: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// The resolved release range.
///
/// Built once by the ref resolver and passed down explicitly; nothing in the
/// pipeline keeps range state of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRange {
    pub from_ref: String,
    pub to_ref: String,
    /// Commit date of `from_ref` minus one day.
    pub from_date: NaiveDate,
    /// Commit date of `to_ref` plus one day.
    pub to_date: NaiveDate,
}
