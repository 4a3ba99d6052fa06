//! octocrab-backed implementation of the platform collaborators.
//!
//! Search responses are deserialized into tolerant wire structs of our own
//! rather than full API models: the pipeline must degrade gracefully when
//! fields are absent, so everything optional stays optional here and
//! validity is decided downstream by the aggregator.

use super::{ContributorClient, ContributorError, PageToken, SearchClient, SearchError, SearchPage};
use crate::types::{Candidate, CandidateKind, ContributorSummary, RawRepository, RepoOwner};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Results per page for search requests.
const PER_PAGE: u8 = 100;

/// GitHub search never returns results past this rank, regardless of
/// `total_count`.
const SEARCH_RESULT_CEILING: u64 = 1000;

/// Contributors fetched per repository.
const CONTRIBUTORS_PER_REPO: u8 = 50;

/// GitHub client implementing [`SearchClient`] and [`ContributorClient`].
pub struct GithubClient {
    inner: Octocrab,
}

impl GithubClient {
    /// Builds a client, authenticated when a token is provided.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(token: Option<String>) -> Result<Self, octocrab::Error> {
        let mut builder = Octocrab::builder();
        if let Some(token) = token {
            builder = builder.personal_token(token);
        }
        Ok(Self {
            inner: builder.build()?,
        })
    }

    /// Wraps an already-configured octocrab instance.
    #[must_use]
    pub fn from_client(inner: Octocrab) -> Self {
        Self { inner }
    }
}

/// Query parameters for a search request.
#[derive(Debug, Serialize)]
struct SearchParams<'a> {
    q: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order: Option<&'a str>,
    per_page: u8,
    page: u32,
}

/// Query parameters for a contributor-list request.
#[derive(Debug, Serialize)]
struct ContributorParams {
    per_page: u8,
}

/// Envelope of a search response.
#[derive(Debug, Deserialize)]
struct SearchResults<T> {
    #[serde(default)]
    total_count: u64,
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// A user search item. Only the fields the pipeline needs.
#[derive(Debug, Deserialize)]
struct UserItem {
    login: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Owner summary within a repository search item.
#[derive(Debug, Deserialize)]
struct OwnerItem {
    login: Option<String>,
    avatar_url: Option<String>,
    html_url: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// A repository search item. Every field the API may omit is optional.
#[derive(Debug, Deserialize)]
struct RepoItem {
    name: Option<String>,
    html_url: Option<String>,
    description: Option<String>,
    language: Option<String>,
    pushed_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    stargazers_count: Option<u32>,
    forks_count: Option<u32>,
    open_issues_count: Option<u32>,
    size: Option<u32>,
    watchers_count: Option<u32>,
    owner: Option<OwnerItem>,
}

/// A contributor-list item.
#[derive(Debug, Deserialize)]
struct ContributorItem {
    login: Option<String>,
    html_url: Option<String>,
    contributions: Option<u32>,
}

fn kind_from_api(kind: Option<&str>) -> CandidateKind {
    match kind {
        Some("Organization") => CandidateKind::Organization,
        _ => CandidateKind::User,
    }
}

impl From<UserItem> for Candidate {
    fn from(item: UserItem) -> Self {
        Self {
            login: item.login.unwrap_or_default(),
            kind: kind_from_api(item.kind.as_deref()),
        }
    }
}

impl From<RepoItem> for RawRepository {
    fn from(item: RepoItem) -> Self {
        Self {
            name: item.name,
            url: item.html_url,
            description: item.description,
            language: item.language,
            pushed_at: item.pushed_at,
            updated_at: item.updated_at,
            stars: item.stargazers_count.unwrap_or_default(),
            forks: item.forks_count.unwrap_or_default(),
            open_issues: item.open_issues_count.unwrap_or_default(),
            size: item.size.unwrap_or_default(),
            subscribers: item.watchers_count.unwrap_or_default(),
            owner: item.owner.map(|owner| RepoOwner {
                login: owner.login.unwrap_or_default(),
                avatar_url: owner.avatar_url.unwrap_or_default(),
                profile_url: owner.html_url.unwrap_or_default(),
                kind: kind_from_api(owner.kind.as_deref()),
            }),
        }
    }
}

/// Parses the opaque continuation back into a page number.
fn page_number(token: Option<PageToken>) -> Result<u32, SearchError> {
    match token {
        None => Ok(1),
        Some(token) => token
            .parse()
            .map_err(|_| SearchError::Other(format!("invalid page token '{token}'"))),
    }
}

/// Computes the continuation for the next page, if one exists.
///
/// GitHub's search responses carry no explicit cursor; the next page exists
/// while this one was full and the result window (capped at 1000) has not
/// been exhausted.
fn next_token(page: u32, fetched_on_page: usize, total_count: u64) -> Option<PageToken> {
    if fetched_on_page < usize::from(PER_PAGE) {
        return None;
    }
    let seen = u64::from(page) * u64::from(PER_PAGE);
    (seen < total_count.min(SEARCH_RESULT_CEILING)).then(|| (page + 1).to_string())
}

/// Maps an octocrab failure onto the search error taxonomy.
///
/// GitHub signals both primary and secondary rate limits with 403 (newer
/// endpoints use 429); everything else is a hard error.
fn map_search_error(err: octocrab::Error) -> SearchError {
    if let octocrab::Error::GitHub { ref source, .. } = err {
        let status = source.status_code.as_u16();
        if status == 403 || status == 429 {
            return SearchError::RateLimited;
        }
    }
    SearchError::Other(err.to_string())
}

/// Checks for GitHub's "history or contributor list is too large" refusal.
fn is_too_large_to_enumerate(err: &octocrab::Error) -> bool {
    if let octocrab::Error::GitHub { source, .. } = err {
        return source.message.to_lowercase().contains("too large");
    }
    false
}

/// Checks whether a failure is the empty-body response of an empty
/// repository (the API answers 204 with no JSON payload).
fn is_empty_body(err: &octocrab::Error) -> bool {
    let msg = err.to_string();
    msg.contains("EOF") || msg.contains("empty")
}

#[async_trait]
impl SearchClient for GithubClient {
    async fn search_users(
        &self,
        query: &str,
        page: Option<PageToken>,
    ) -> Result<SearchPage<Candidate>, SearchError> {
        let page = page_number(page)?;
        debug!(query = %query, page, "searching users");

        let results: SearchResults<UserItem> = self
            .inner
            .get(
                "/search/users",
                Some(&SearchParams {
                    q: query,
                    sort: None,
                    order: None,
                    per_page: PER_PAGE,
                    page,
                }),
            )
            .await
            .map_err(map_search_error)?;

        let next = next_token(page, results.items.len(), results.total_count);
        Ok(SearchPage {
            items: results.items.into_iter().map(Candidate::from).collect(),
            next,
        })
    }

    async fn search_repositories(
        &self,
        query: &str,
        page: Option<PageToken>,
    ) -> Result<SearchPage<RawRepository>, SearchError> {
        let page = page_number(page)?;
        debug!(query = %query, page, "searching repositories");

        let results: SearchResults<RepoItem> = self
            .inner
            .get(
                "/search/repositories",
                Some(&SearchParams {
                    q: query,
                    sort: Some("updated"),
                    order: Some("desc"),
                    per_page: PER_PAGE,
                    page,
                }),
            )
            .await
            .map_err(map_search_error)?;

        let next = next_token(page, results.items.len(), results.total_count);
        Ok(SearchPage {
            items: results.items.into_iter().map(RawRepository::from).collect(),
            next,
        })
    }
}

#[async_trait]
impl ContributorClient for GithubClient {
    async fn list_contributors(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<ContributorSummary>, ContributorError> {
        let route = format!("/repos/{owner}/{repo}/contributors");
        let result: Result<Vec<ContributorItem>, octocrab::Error> = self
            .inner
            .get(
                &route,
                Some(&ContributorParams {
                    per_page: CONTRIBUTORS_PER_REPO,
                }),
            )
            .await;

        match result {
            Ok(items) => Ok(items
                .into_iter()
                .filter_map(|item| {
                    Some(ContributorSummary {
                        login: item.login?,
                        profile_url: item.html_url.unwrap_or_default(),
                        contributions: item.contributions.unwrap_or_default(),
                    })
                })
                .collect()),
            Err(err) if is_too_large_to_enumerate(&err) => {
                Err(ContributorError::TooLargeToEnumerate)
            }
            Err(err) if is_empty_body(&err) => {
                debug!(owner, repo, "repository has no contributors");
                Ok(Vec::new())
            }
            Err(err) => Err(ContributorError::Other(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_page_has_no_continuation_when_partial() {
        assert_eq!(next_token(1, 40, 40), None);
    }

    #[test]
    fn full_page_continues_while_results_remain() {
        assert_eq!(next_token(1, 100, 250), Some("2".to_string()));
        assert_eq!(next_token(2, 100, 250), Some("3".to_string()));
        assert_eq!(next_token(3, 50, 250), None);
    }

    #[test]
    fn continuation_stops_at_the_result_ceiling() {
        assert_eq!(next_token(10, 100, 5000), None);
        assert_eq!(next_token(9, 100, 5000), Some("10".to_string()));
    }

    #[test]
    fn page_number_parses_tokens() {
        assert_eq!(page_number(None).unwrap(), 1);
        assert_eq!(page_number(Some("7".to_string())).unwrap(), 7);
        assert!(page_number(Some("not-a-page".to_string())).is_err());
    }

    #[test]
    fn user_item_maps_kind() {
        let user = UserItem {
            login: Some("octocat".to_string()),
            kind: Some("User".to_string()),
        };
        assert_eq!(Candidate::from(user).kind, CandidateKind::User);

        let org = UserItem {
            login: Some("rust-lang".to_string()),
            kind: Some("Organization".to_string()),
        };
        assert_eq!(Candidate::from(org).kind, CandidateKind::Organization);
    }

    #[test]
    fn repo_item_with_absent_fields_degrades_to_defaults() {
        let item = RepoItem {
            name: Some("thing".to_string()),
            html_url: None,
            description: None,
            language: None,
            pushed_at: None,
            updated_at: None,
            stargazers_count: None,
            forks_count: None,
            open_issues_count: None,
            size: None,
            watchers_count: None,
            owner: None,
        };
        let raw = RawRepository::from(item);
        assert_eq!(raw.stars, 0);
        assert!(raw.language.is_none());
        assert!(raw.owner.is_none());
    }
}
