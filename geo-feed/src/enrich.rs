//! Contributor enrichment of the aggregated feed.

use crate::platform::{ContributorClient, ContributorError};
use crate::types::RepositoryRecord;
use futures::future::join_all;
use std::time::Duration;
use tracing::{debug, warn};

/// Annotates every repository with contributor summaries.
///
/// One contributor-list request is issued per repository, all concurrently;
/// the stage resolves once every request has settled and always returns the
/// full set in its original order. Per-repository failures never fail the
/// batch: an oversized history, an empty page, an error, or a request that
/// outlives `request_timeout` all leave that repository with an empty
/// contributor list.
///
/// Returns the annotated records together with the number of repositories
/// whose fetch failed outright (excluding the expected too-large refusal).
pub async fn enrich(
    contributors: &dyn ContributorClient,
    repos: Vec<RepositoryRecord>,
    request_timeout: Duration,
) -> (Vec<RepositoryRecord>, usize) {
    let annotated = join_all(repos.into_iter().map(|mut repo| async move {
        let request = contributors.list_contributors(&repo.owner.login, &repo.name);
        match tokio::time::timeout(request_timeout, request).await {
            Ok(Ok(list)) => {
                if list.is_empty() {
                    debug!(repo = %repo.name, owner = %repo.owner.login, "no contributors listed");
                }
                repo.contributors = list;
                (repo, false)
            }
            Ok(Err(ContributorError::TooLargeToEnumerate)) => {
                debug!(
                    repo = %repo.name,
                    owner = %repo.owner.login,
                    "contributor list too large to enumerate"
                );
                (repo, false)
            }
            Ok(Err(err)) => {
                warn!(
                    repo = %repo.name,
                    owner = %repo.owner.login,
                    error = %err,
                    "failed to fetch contributors"
                );
                (repo, true)
            }
            Err(_) => {
                warn!(
                    repo = %repo.name,
                    owner = %repo.owner.login,
                    timeout_secs = request_timeout.as_secs(),
                    "contributor request timed out"
                );
                (repo, true)
            }
        }
    }))
    .await;

    let failures = annotated.iter().filter(|(_, failed)| *failed).count();
    let repos = annotated.into_iter().map(|(repo, _)| repo).collect();
    (repos, failures)
}
