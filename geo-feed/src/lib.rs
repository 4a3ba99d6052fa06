#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

pub mod aggregate;
pub mod clock;
pub mod enrich;
pub mod fanout;
pub mod feed;
pub mod fetch;
pub mod platform;
pub mod snapshot;
pub mod types;

pub use aggregate::aggregate;
pub use clock::{Clock, SystemClock};
pub use enrich::enrich;
pub use fanout::{fan_out, FanOutError, FanOutParams};
pub use feed::{Feed, FeedConfig, FeedError, RefreshSummary};
pub use fetch::{fetch_all, RetryPolicy};
pub use platform::{
    ContributorClient, ContributorError, GithubClient, PageToken, SearchClient, SearchError,
    SearchPage,
};
pub use snapshot::{
    derive_hour, derive_today, CacheError, JsonFileCache, SnapshotCache, SnapshotStore,
};
pub use types::{
    Candidate, CandidateKind, ContributorSummary, RawRepository, RepoOwner, RepositoryRecord,
    Snapshot, SnapshotMeta,
};
