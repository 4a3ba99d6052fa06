//! Orchestrates refresh cycles end-to-end.

use crate::clock::Clock;
use crate::enrich::enrich;
use crate::fanout::{fan_out, FanOutError, FanOutParams};
use crate::fetch::{fetch_all, RetryPolicy};
use crate::platform::{ContributorClient, SearchClient, SearchError};
use crate::snapshot::{SnapshotCache, SnapshotStore};
use crate::types::{Candidate, Snapshot, SnapshotMeta};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, info_span, Instrument};

/// Schema/API version tag recorded in every snapshot.
const API_VERSION: &str = "v3";

/// Configuration for a feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Location filter for the candidate search.
    location: String,
    /// Maximum candidates fetched per candidate search.
    max_users: usize,
    /// Maximum repositories in the final feed (and per group search).
    max_repos: usize,
    /// Maximum candidates per fan-out group.
    group_size: usize,
    /// Minimum star count in the repository base filter.
    star_limit: u32,
    /// Whether to also search for organization accounts.
    search_orgs: bool,
    /// Rate-limit retry behaviour for every paginated search.
    retry: RetryPolicy,
    /// Per-repository contributor request timeout.
    contributor_timeout: Duration,
}

impl FeedConfig {
    /// Creates a configuration with the conventional defaults: groups of
    /// 20 candidates, a one-star minimum, user accounts only, a 60 second
    /// uncapped rate-limit retry, and a 30 second contributor timeout.
    pub fn new(location: impl Into<String>, max_users: usize, max_repos: usize) -> Self {
        Self {
            location: location.into(),
            max_users,
            max_repos,
            group_size: 20,
            star_limit: 1,
            search_orgs: false,
            retry: RetryPolicy::default(),
            contributor_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the fan-out group size.
    #[must_use]
    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size;
        self
    }

    /// Sets the minimum star count.
    #[must_use]
    pub fn with_star_limit(mut self, star_limit: u32) -> Self {
        self.star_limit = star_limit;
        self
    }

    /// Enables or disables the organization candidate search.
    #[must_use]
    pub fn with_search_orgs(mut self, search_orgs: bool) -> Self {
        self.search_orgs = search_orgs;
        self
    }

    /// Sets the rate-limit retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-repository contributor request timeout.
    #[must_use]
    pub fn with_contributor_timeout(mut self, timeout: Duration) -> Self {
        self.contributor_timeout = timeout;
        self
    }

    /// Returns the configured location filter.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Returns the candidate bound.
    pub fn max_users(&self) -> usize {
        self.max_users
    }

    /// Returns the repository bound.
    pub fn max_repos(&self) -> usize {
        self.max_repos
    }
}

/// Errors that can abort a refresh cycle.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The candidate search failed hard.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// The fanned-out repository search failed hard.
    #[error(transparent)]
    FanOut(#[from] FanOutError),
}

/// Outcome of one `update` call.
#[derive(Debug, Clone, Default)]
pub struct RefreshSummary {
    /// Candidate users found.
    pub users_found: usize,

    /// Candidate organizations found.
    pub orgs_found: usize,

    /// Repositories in the refreshed feed.
    pub repos_aggregated: usize,

    /// Repositories whose contributor fetch failed outright.
    pub contributor_failures: usize,

    /// Wall-clock duration of the refresh.
    pub duration: Duration,

    /// True when this call found another refresh in flight and did nothing.
    pub coalesced: bool,
}

impl RefreshSummary {
    fn in_flight() -> Self {
        Self {
            coalesced: true,
            ..Default::default()
        }
    }
}

/// A location-scoped feed of active open-source repositories.
///
/// Owns its snapshot state, so multiple feeds for different locations can
/// coexist in one process.
pub struct Feed {
    config: FeedConfig,
    search: Arc<dyn SearchClient>,
    contributors: Arc<dyn ContributorClient>,
    clock: Arc<dyn Clock>,
    store: SnapshotStore,
    refresh_guard: Mutex<()>,
}

impl Feed {
    /// Builds a feed from its collaborators.
    pub fn new(
        config: FeedConfig,
        search: Arc<dyn SearchClient>,
        contributors: Arc<dyn ContributorClient>,
        cache: Arc<dyn SnapshotCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = SnapshotStore::new(cache, Arc::clone(&clock));
        Self {
            config,
            search,
            contributors,
            clock,
            store,
            refresh_guard: Mutex::new(()),
        }
    }

    /// Restores the last persisted snapshot, if any.
    ///
    /// Call once at startup, before the first [`update`](Self::update)
    /// completes, so consumers are served the previous feed in the
    /// meantime.
    pub async fn rehydrate(&self) {
        self.store.rehydrate().await;
    }

    /// Runs one full refresh cycle and atomically replaces the snapshot.
    ///
    /// Overlapping calls are coalesced: if a refresh is already in flight,
    /// this returns immediately with a summary marked
    /// [`coalesced`](RefreshSummary::coalesced) instead of racing the
    /// snapshot store.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] when a search fails hard; the previous
    /// snapshot remains authoritative and consumers never observe the
    /// failure.
    pub async fn update(&self) -> Result<RefreshSummary, FeedError> {
        let Ok(_guard) = self.refresh_guard.try_lock() else {
            info!("refresh already in flight, coalescing");
            return Ok(RefreshSummary::in_flight());
        };

        let span = info_span!("refresh", location = %self.config.location);
        self.refresh().instrument(span).await
    }

    async fn refresh(&self) -> Result<RefreshSummary, FeedError> {
        let started = Instant::now();
        info!("starting feed refresh");

        let user_query = format!("location:{}", self.config.location);
        let mut candidates = self.fetch_candidates(&user_query).await?;
        let users_found = candidates.len();
        info!(count = users_found, "found candidate users");

        let mut orgs_found = 0;
        if self.config.search_orgs {
            let org_query = format!("location:{} type:org", self.config.location);
            let orgs = self.fetch_candidates(&org_query).await?;
            orgs_found = orgs.len();
            info!(count = orgs_found, "found candidate organizations");
            candidates.extend(orgs);
        }

        let now = self.clock.now();
        let groups = fan_out(
            self.search.as_ref(),
            candidates,
            &FanOutParams {
                group_size: self.config.group_size,
                limit: self.config.max_repos,
                star_limit: self.config.star_limit,
                now,
                retry: self.config.retry.clone(),
            },
        )
        .await?;

        let records = crate::aggregate::aggregate(groups, self.config.max_repos);
        let (records, contributor_failures) = enrich(
            self.contributors.as_ref(),
            records,
            self.config.contributor_timeout,
        )
        .await;

        let snapshot = Snapshot {
            meta: SnapshotMeta {
                generated_at: now,
                location: self.config.location.clone(),
                total_repos: records.len(),
                api_version: API_VERSION.to_string(),
                max_users: self.config.max_users,
                max_repos: self.config.max_repos,
            },
            repos: records,
        };
        let repos_aggregated = snapshot.repos.len();
        self.store.replace(snapshot).await;

        let summary = RefreshSummary {
            users_found,
            orgs_found,
            repos_aggregated,
            contributor_failures,
            duration: started.elapsed(),
            coalesced: false,
        };
        info!(
            repos = summary.repos_aggregated,
            contributor_failures = summary.contributor_failures,
            elapsed_ms = summary.duration.as_millis() as u64,
            "feed refresh complete"
        );
        Ok(summary)
    }

    async fn fetch_candidates(&self, query: &str) -> Result<Vec<Candidate>, SearchError> {
        fetch_all(
            |page| self.search.search_users(query, page),
            self.config.max_users,
            &self.config.retry,
        )
        .await
    }

    /// A bounded read of the full feed: its meta plus the first `count`
    /// repositories.
    pub async fn get(&self, count: usize) -> Snapshot {
        self.store.get(count).await
    }

    /// The full feed snapshot.
    pub async fn feed(&self) -> Arc<Snapshot> {
        self.store.feed().await
    }

    /// The same-calendar-day view.
    pub async fn today(&self) -> Arc<Snapshot> {
        self.store.today().await
    }

    /// The last-hour view.
    pub async fn hour(&self) -> Arc<Snapshot> {
        self.store.hour().await
    }
}
