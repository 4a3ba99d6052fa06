//! Snapshot state: the current feed plus its time-windowed views.
//!
//! The store owns the canonical full snapshot and the derived "today" and
//! "last hour" views with replace-on-write discipline: the whole view set
//! is swapped at once, so readers always observe either the previous or the
//! new complete state, never a mixture.

mod cache;

pub use cache::{CacheError, JsonFileCache, SnapshotCache};

use crate::clock::Clock;
use crate::types::Snapshot;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// The three views derived from one refresh, swapped as a unit.
struct SnapshotViews {
    feed: Arc<Snapshot>,
    today: Arc<Snapshot>,
    hour: Arc<Snapshot>,
}

impl SnapshotViews {
    fn empty() -> Self {
        let empty = Arc::new(Snapshot::empty());
        Self {
            feed: Arc::clone(&empty),
            today: Arc::clone(&empty),
            hour: empty,
        }
    }
}

/// Holds the current feed and persists it across restarts.
pub struct SnapshotStore {
    cache: Arc<dyn SnapshotCache>,
    clock: Arc<dyn Clock>,
    views: RwLock<SnapshotViews>,
}

impl SnapshotStore {
    /// Creates an empty store.
    pub fn new(cache: Arc<dyn SnapshotCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache,
            clock,
            views: RwLock::new(SnapshotViews::empty()),
        }
    }

    /// Attempts to restore the last persisted snapshot.
    ///
    /// Intended to run once at startup so the feed is populated before the
    /// first live refresh completes. An absent or malformed cache leaves
    /// the store at its empty initial state without raising an error.
    pub async fn rehydrate(&self) {
        match self.cache.load().await {
            Some(snapshot) => {
                info!(
                    count = snapshot.repos.len(),
                    location = %snapshot.meta.location,
                    "restored persisted snapshot"
                );
                self.install(snapshot).await;
            }
            None => debug!("no usable persisted snapshot, starting empty"),
        }
    }

    /// Replaces the current snapshot with the result of a completed refresh.
    ///
    /// The snapshot is persisted best-effort first; a persistence failure
    /// is logged and does not roll back the in-memory replacement.
    pub async fn replace(&self, snapshot: Snapshot) {
        if let Err(err) = self.cache.save(&snapshot).await {
            warn!(error = %err, "failed to persist snapshot, keeping in-memory copy");
        }
        self.install(snapshot).await;
    }

    // The day view is anchored to the snapshot's generation time, so a
    // rehydrated snapshot reproduces the day view it was generated with;
    // the hour view tracks the wall clock.
    async fn install(&self, snapshot: Snapshot) {
        let now = self.clock.now();
        let feed = Arc::new(snapshot);
        let today = Arc::new(derive_today(&feed, feed.meta.generated_at));
        let hour = Arc::new(derive_hour(&feed, now));
        *self.views.write().await = SnapshotViews { feed, today, hour };
    }

    /// The full feed.
    pub async fn feed(&self) -> Arc<Snapshot> {
        Arc::clone(&self.views.read().await.feed)
    }

    /// Repositories pushed on the same calendar day as the snapshot's
    /// generation time.
    pub async fn today(&self) -> Arc<Snapshot> {
        Arc::clone(&self.views.read().await.today)
    }

    /// Repositories pushed within the last hour as of the last view
    /// derivation.
    pub async fn hour(&self) -> Arc<Snapshot> {
        Arc::clone(&self.views.read().await.hour)
    }

    /// A bounded copy of the full feed: its meta plus the first `count`
    /// repositories.
    pub async fn get(&self, count: usize) -> Snapshot {
        let feed = self.feed().await;
        Snapshot {
            meta: feed.meta.clone(),
            repos: feed.repos.iter().take(count).cloned().collect(),
        }
    }
}

/// Filters a snapshot to repositories pushed on the same calendar day as
/// `now`: the whole-day difference between `now` and the push timestamp is
/// zero. A single `now` is used for the entire computation.
#[must_use]
pub fn derive_today(snapshot: &Snapshot, now: DateTime<Utc>) -> Snapshot {
    filter_view(snapshot, |pushed| (now - pushed).num_days() == 0)
}

/// Filters a snapshot to repositories pushed strictly after `now` minus
/// sixty minutes.
#[must_use]
pub fn derive_hour(snapshot: &Snapshot, now: DateTime<Utc>) -> Snapshot {
    let floor = now - Duration::minutes(60);
    filter_view(snapshot, |pushed| pushed > floor)
}

fn filter_view(snapshot: &Snapshot, keep: impl Fn(DateTime<Utc>) -> bool) -> Snapshot {
    let repos: Vec<_> = snapshot
        .repos
        .iter()
        .filter(|repo| keep(repo.pushed_at))
        .cloned()
        .collect();
    let mut meta = snapshot.meta.clone();
    meta.total_repos = repos.len();
    Snapshot { meta, repos }
}
