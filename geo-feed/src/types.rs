//! Core types for the geo feed.
//!
//! This module contains the data model flowing through the pipeline:
//! - [`Candidate`] - A user or organization considered as a repository source
//! - [`RawRepository`] - An unvalidated repository search item
//! - [`RepositoryRecord`] - A validated, feed-worthy repository
//! - [`ContributorSummary`] - A contributor annotation on a record
//! - [`Snapshot`] and [`SnapshotMeta`] - The complete result of one refresh

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of account a candidate or repository owner is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    /// An individual user account.
    User,

    /// An organization account.
    Organization,
}

/// A user or organization account considered as a source of repositories.
///
/// Candidates are ephemeral: they are produced by the location search and
/// consumed only to build the fanned-out repository search queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Account login.
    pub login: String,

    /// Whether the account is a user or an organization.
    pub kind: CandidateKind,
}

/// Owner summary embedded in a [`RepositoryRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoOwner {
    /// Owner login.
    pub login: String,

    /// Avatar image URL.
    pub avatar_url: String,

    /// Profile page URL.
    pub profile_url: String,

    /// Whether the owner is a user or an organization.
    pub kind: CandidateKind,
}

/// An unvalidated repository as returned by the search API.
///
/// Every field the platform may omit is optional; validity is decided by
/// the aggregator via [`RepositoryRecord::from_raw`], not by the platform
/// layer.
#[derive(Debug, Clone, Default)]
pub struct RawRepository {
    /// Repository name.
    pub name: Option<String>,

    /// Canonical repository URL.
    pub url: Option<String>,

    /// Repository description.
    pub description: Option<String>,

    /// Primary language. Absent or empty means the item is invalid.
    pub language: Option<String>,

    /// Timestamp of the last push.
    pub pushed_at: Option<DateTime<Utc>>,

    /// Timestamp of the last update.
    pub updated_at: Option<DateTime<Utc>>,

    /// Star count.
    pub stars: u32,

    /// Fork count.
    pub forks: u32,

    /// Open issue count.
    pub open_issues: u32,

    /// Repository size in kilobytes.
    pub size: u32,

    /// Subscriber (watcher) count.
    pub subscribers: u32,

    /// Owner summary.
    pub owner: Option<RepoOwner>,
}

/// A contributor annotation produced during enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorSummary {
    /// Contributor login.
    pub login: String,

    /// Profile page URL.
    pub profile_url: String,

    /// Number of contributions to the repository.
    pub contributions: u32,
}

/// A validated repository in the canonical feed.
///
/// Invariant: every record carries a non-empty `language`, and within one
/// snapshot each owner login appears at most once (enforced by the
/// aggregator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryRecord {
    /// Repository name.
    pub name: String,

    /// Canonical repository URL.
    pub url: String,

    /// Repository description, if any.
    pub description: Option<String>,

    /// Primary language. Never empty.
    pub language: String,

    /// Timestamp of the last push. The feed sort key.
    pub pushed_at: DateTime<Utc>,

    /// Timestamp of the last update.
    pub updated_at: DateTime<Utc>,

    /// Star count.
    pub stars: u32,

    /// Fork count.
    pub forks: u32,

    /// Open issue count.
    pub open_issues: u32,

    /// Repository size in kilobytes.
    pub size: u32,

    /// Subscriber (watcher) count.
    pub subscribers: u32,

    /// Owner summary. Unique per snapshot.
    pub owner: RepoOwner,

    /// Contributor summaries. Empty when enrichment could not fetch them.
    #[serde(default)]
    pub contributors: Vec<ContributorSummary>,
}

impl RepositoryRecord {
    /// Projects a raw search item into a feed record.
    ///
    /// Returns `None` for invalid items: those with an empty or absent
    /// language, and those missing the fields the feed sorts and
    /// deduplicates on (push timestamp, owner). Other missing optional
    /// fields degrade to `None` or zero.
    pub fn from_raw(raw: RawRepository) -> Option<Self> {
        let language = raw.language.filter(|l| !l.is_empty())?;
        let pushed_at = raw.pushed_at?;
        let owner = raw.owner?;

        Some(Self {
            name: raw.name.unwrap_or_default(),
            url: raw.url.unwrap_or_default(),
            description: raw.description,
            language,
            pushed_at,
            updated_at: raw.updated_at.unwrap_or(pushed_at),
            stars: raw.stars,
            forks: raw.forks,
            open_issues: raw.open_issues,
            size: raw.size,
            subscribers: raw.subscribers,
            owner,
            contributors: Vec::new(),
        })
    }
}

/// Metadata describing one refresh cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// When the snapshot was generated.
    pub generated_at: DateTime<Utc>,

    /// The location filter the feed was built from.
    pub location: String,

    /// Number of repositories in the snapshot.
    pub total_repos: usize,

    /// Schema/API version tag.
    pub api_version: String,

    /// Configured candidate bound at generation time.
    pub max_users: usize,

    /// Configured repository bound at generation time.
    pub max_repos: usize,
}

/// The complete, consistent result of one refresh cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Refresh metadata.
    pub meta: SnapshotMeta,

    /// Ranked repositories, most recently pushed first.
    pub repos: Vec<RepositoryRecord>,
}

impl Snapshot {
    /// The empty snapshot a process starts with before any refresh or
    /// rehydration succeeds.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            meta: SnapshotMeta {
                generated_at: DateTime::UNIX_EPOCH,
                location: String::new(),
                total_repos: 0,
                api_version: String::new(),
                max_users: 0,
                max_repos: 0,
            },
            repos: Vec::new(),
        }
    }

    /// Returns true if the snapshot has never been populated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }
}
