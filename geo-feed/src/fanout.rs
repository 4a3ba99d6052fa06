//! Fan-out of repository searches across candidate groups.
//!
//! GitHub caps query length and result windows, so the candidate set is
//! split into bounded groups and one repository search is issued per group,
//! concurrently. Candidates are shuffled first so group composition is not
//! biased by the API's default ordering across repeated refreshes.

use crate::fetch::{fetch_all, RetryPolicy};
use crate::platform::{SearchClient, SearchError};
use crate::types::{Candidate, CandidateKind, RawRepository};
use chrono::{DateTime, Months, NaiveDate, Utc};
use futures::future::try_join_all;
use rand::seq::SliceRandom;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during fan-out.
#[derive(Debug, Error)]
pub enum FanOutError {
    /// The configured group size cannot partition anything.
    #[error("invalid candidate group size: {0}")]
    InvalidGroupSize(usize),

    /// A group's repository search failed hard. No partial fan-out result
    /// is accepted.
    #[error(transparent)]
    Search(#[from] SearchError),
}

/// Parameters shared by every group search in one fan-out.
#[derive(Debug, Clone)]
pub struct FanOutParams {
    /// Maximum candidates per group.
    pub group_size: usize,

    /// Item limit per group search.
    pub limit: usize,

    /// Minimum star count in the base filter.
    pub star_limit: u32,

    /// The refresh's single notion of "now"; the pushed-since cutoff is
    /// three months before it.
    pub now: DateTime<Utc>,

    /// Rate-limit retry behaviour for each group's pagination.
    pub retry: RetryPolicy,
}

/// Issues one paginated repository search per candidate group and joins the
/// results.
///
/// Group result order follows group order; items keep their in-group order.
/// Fails fast: a non-rate-limit error in any group fails the whole fan-out.
///
/// # Errors
///
/// Returns [`FanOutError::InvalidGroupSize`] if `group_size` is zero, or
/// the first hard [`SearchError`] any group propagates.
pub async fn fan_out(
    search: &dyn SearchClient,
    candidates: Vec<Candidate>,
    params: &FanOutParams,
) -> Result<Vec<Vec<RawRepository>>, FanOutError> {
    let cutoff = pushed_cutoff(params.now);
    let groups = partition(candidates, params.group_size)?;
    debug!(groups = groups.len(), "fanning out repository searches");

    let searches = groups.iter().map(|group| {
        let query = build_repo_query(params.star_limit, cutoff, group);
        async move {
            debug!(query = %query, "searching repositories for candidate group");
            fetch_all(
                |page| search.search_repositories(&query, page),
                params.limit,
                &params.retry,
            )
            .await
        }
    });

    Ok(try_join_all(searches).await?)
}

/// The pushed-since date of the base filter: three months before `now`.
fn pushed_cutoff(now: DateTime<Utc>) -> NaiveDate {
    let today = now.date_naive();
    today.checked_sub_months(Months::new(3)).unwrap_or(today)
}

/// Shuffles candidates and partitions them into contiguous groups of at
/// most `group_size`; the last group may be smaller.
fn partition(
    mut candidates: Vec<Candidate>,
    group_size: usize,
) -> Result<Vec<Vec<Candidate>>, FanOutError> {
    if group_size == 0 {
        return Err(FanOutError::InvalidGroupSize(group_size));
    }
    candidates.shuffle(&mut rand::rng());
    Ok(candidates
        .chunks(group_size)
        .map(<[Candidate]>::to_vec)
        .collect())
}

/// Builds the repository search query for one candidate group.
///
/// Composes the base filter (minimum stars, forks included, pushed within
/// the last three months) with one `user:"login"` / `org:"login"` qualifier
/// per candidate. Logins containing a quote character are excluded so a
/// crafted account name cannot break out of the quoted qualifier.
fn build_repo_query(star_limit: u32, cutoff: NaiveDate, group: &[Candidate]) -> String {
    let mut parts = vec![
        format!("stars:>={star_limit}"),
        "fork:true".to_string(),
        format!("pushed:>{}", cutoff.format("%Y-%m-%d")),
    ];

    for candidate in group {
        if candidate.login.is_empty() || candidate.login.contains('"') {
            continue;
        }
        let qualifier = match candidate.kind {
            CandidateKind::User => "user",
            CandidateKind::Organization => "org",
        };
        parts.push(format!("{qualifier}:\"{}\"", candidate.login));
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{PageToken, SearchPage};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn user(login: &str) -> Candidate {
        Candidate {
            login: login.to_string(),
            kind: CandidateKind::User,
        }
    }

    fn cutoff() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
    }

    fn params() -> FanOutParams {
        FanOutParams {
            group_size: 2,
            limit: 50,
            star_limit: 1,
            now: DateTime::parse_from_rfc3339("2020-04-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            retry: RetryPolicy::default(),
        }
    }

    struct StubSearch {
        queries: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl StubSearch {
        fn new() -> Self {
            Self {
                queries: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl SearchClient for StubSearch {
        async fn search_users(
            &self,
            _query: &str,
            _page: Option<PageToken>,
        ) -> Result<SearchPage<Candidate>, SearchError> {
            unreachable!("fan-out never searches users")
        }

        async fn search_repositories(
            &self,
            query: &str,
            _page: Option<PageToken>,
        ) -> Result<SearchPage<RawRepository>, SearchError> {
            if let Some(marker) = self.fail_on {
                if query.contains(marker) {
                    return Err(SearchError::Other("group search failed".to_string()));
                }
            }
            self.queries.lock().unwrap().push(query.to_string());
            Ok(SearchPage {
                items: vec![RawRepository::default()],
                next: None,
            })
        }
    }

    #[test]
    fn partition_respects_group_size() {
        let candidates: Vec<_> = ["a", "b", "c", "d", "e", "f", "g"]
            .iter()
            .map(|l| user(l))
            .collect();
        let groups = partition(candidates, 3).unwrap();
        let sizes: Vec<_> = groups.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn partition_covers_every_candidate_exactly_once() {
        let candidates: Vec<_> = (0..25).map(|i| user(&format!("user{i}"))).collect();
        let groups = partition(candidates, 4).unwrap();
        let logins: Vec<_> = groups
            .iter()
            .flatten()
            .map(|c| c.login.clone())
            .collect();
        let unique: HashSet<_> = logins.iter().cloned().collect();
        assert_eq!(logins.len(), 25);
        assert_eq!(unique.len(), 25);
    }

    #[test]
    fn zero_group_size_fails_fast() {
        let err = partition(vec![user("a")], 0).unwrap_err();
        assert!(matches!(err, FanOutError::InvalidGroupSize(0)));
    }

    #[test]
    fn query_carries_base_filter_and_qualifiers() {
        let group = vec![
            user("alice"),
            Candidate {
                login: "acme".to_string(),
                kind: CandidateKind::Organization,
            },
        ];
        let query = build_repo_query(5, cutoff(), &group);
        assert!(query.starts_with("stars:>=5 fork:true pushed:>2020-01-01"));
        assert!(query.contains("user:\"alice\""));
        assert!(query.contains("org:\"acme\""));
    }

    #[test]
    fn query_excludes_injection_prone_and_empty_logins() {
        let group = vec![user("good"), user("bad\"name"), user("")];
        let query = build_repo_query(1, cutoff(), &group);
        assert!(query.contains("user:\"good\""));
        assert!(!query.contains("bad"));
        assert_eq!(query.matches("user:").count(), 1);
    }

    #[test]
    fn pushed_cutoff_subtracts_three_months() {
        let now = DateTime::parse_from_rfc3339("2020-04-15T08:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            pushed_cutoff(now),
            NaiveDate::from_ymd_opt(2020, 1, 15).unwrap()
        );
    }

    #[tokio::test]
    async fn one_search_per_group_covering_all_candidates() {
        let search = StubSearch::new();
        let candidates: Vec<_> = (0..5).map(|i| user(&format!("user{i}"))).collect();

        let groups = fan_out(&search, candidates, &params()).await.unwrap();
        assert_eq!(groups.len(), 3);

        let queries = search.queries.lock().unwrap();
        assert_eq!(queries.len(), 3);
        for i in 0..5 {
            let login = format!("user{i}");
            assert_eq!(
                queries.iter().filter(|q| q.contains(&login)).count(),
                1,
                "candidate {login} must appear in exactly one group query"
            );
        }
    }

    #[tokio::test]
    async fn any_hard_group_failure_fails_the_fan_out() {
        let search = StubSearch {
            queries: Mutex::new(Vec::new()),
            fail_on: Some("user2"),
        };
        let candidates: Vec<_> = (0..5).map(|i| user(&format!("user{i}"))).collect();

        let err = fan_out(&search, candidates, &params()).await.unwrap_err();
        assert!(matches!(err, FanOutError::Search(SearchError::Other(_))));
    }

    #[tokio::test]
    async fn empty_candidate_set_yields_no_groups() {
        let search = StubSearch::new();
        let groups = fan_out(&search, Vec::new(), &params()).await.unwrap();
        assert!(groups.is_empty());
    }
}
