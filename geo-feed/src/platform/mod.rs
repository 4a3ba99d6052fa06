//! Platform collaborator contracts.
//!
//! The pipeline never talks to GitHub directly; it goes through the
//! [`SearchClient`] and [`ContributorClient`] traits so tests can script
//! pages, rate limits, and per-repository failures. [`GithubClient`] is the
//! octocrab-backed implementation.

mod github;

pub use github::GithubClient;

use crate::types::{Candidate, ContributorSummary, RawRepository};
use async_trait::async_trait;
use thiserror::Error;

/// Opaque pagination continuation handle.
///
/// Produced by one page fetch and passed unchanged to the next; callers
/// never interpret it.
pub type PageToken = String;

/// One page of search results plus the continuation for the next page.
#[derive(Debug, Clone)]
pub struct SearchPage<T> {
    /// Items on this page.
    pub items: Vec<T>,

    /// Continuation for the next page, absent on the last page.
    pub next: Option<PageToken>,
}

/// Errors the search collaborator can fail with.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The platform asked the caller to slow down. Retried at the
    /// pagination layer, never surfaced to consumers.
    #[error("rate limited by the platform")]
    RateLimited,

    /// Any other search failure. Aborts the refresh cycle.
    #[error("search API error: {0}")]
    Other(String),
}

/// Errors the contributor-list collaborator can fail with.
#[derive(Debug, Error)]
pub enum ContributorError {
    /// The repository's history is too large for the platform to
    /// enumerate contributors. Expected and handled, not a failure.
    #[error("contributor list too large to enumerate")]
    TooLargeToEnumerate,

    /// Any other contributor-list failure. Logged, never fatal.
    #[error("contributor API error: {0}")]
    Other(String),
}

/// Search over the platform's users and repositories.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Searches for user/organization accounts matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::RateLimited`] when the platform throttles the
    /// caller, or [`SearchError::Other`] for anything else.
    async fn search_users(
        &self,
        query: &str,
        page: Option<PageToken>,
    ) -> Result<SearchPage<Candidate>, SearchError>;

    /// Searches for repositories matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::RateLimited`] when the platform throttles the
    /// caller, or [`SearchError::Other`] for anything else.
    async fn search_repositories(
        &self,
        query: &str,
        page: Option<PageToken>,
    ) -> Result<SearchPage<RawRepository>, SearchError>;
}

/// Contributor listing for a single repository.
#[async_trait]
pub trait ContributorClient: Send + Sync {
    /// Lists contributor summaries for `owner/repo`.
    ///
    /// An empty result means the repository genuinely has no listable
    /// contributors; unfetchable lists are reported as errors instead.
    ///
    /// # Errors
    ///
    /// Returns [`ContributorError::TooLargeToEnumerate`] when the platform
    /// refuses to enumerate an oversized history, or
    /// [`ContributorError::Other`] for anything else.
    async fn list_contributors(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<ContributorSummary>, ContributorError>;
}
