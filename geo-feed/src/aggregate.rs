//! Aggregation of fanned-out search results into the canonical feed.

use crate::types::{RawRepository, RepositoryRecord};
use std::collections::HashSet;
use tracing::debug;

/// Merges group result sets into the ranked, deduplicated feed.
///
/// Steps, in fixed order:
/// 1. Flatten the groups, preserving in-group and group order.
/// 2. Drop items with an empty or absent language and project the rest
///    into [`RepositoryRecord`]s.
/// 3. Stable-sort descending by push timestamp, so equal timestamps keep
///    their pre-sort relative order.
/// 4. Deduplicate by owner login, keeping the first (most recently pushed)
///    occurrence.
/// 5. Truncate to `max_repos`.
///
/// Empty input or `max_repos == 0` yields an empty feed, not an error.
#[must_use]
pub fn aggregate(groups: Vec<Vec<RawRepository>>, max_repos: usize) -> Vec<RepositoryRecord> {
    let candidates = groups.iter().map(Vec::len).sum::<usize>();

    let mut records: Vec<RepositoryRecord> = groups
        .into_iter()
        .flatten()
        .filter_map(RepositoryRecord::from_raw)
        .collect();

    records.sort_by(|a, b| b.pushed_at.cmp(&a.pushed_at));

    let mut seen_owners = HashSet::new();
    records.retain(|record| seen_owners.insert(record.owner.login.clone()));
    records.truncate(max_repos);

    debug!(
        candidates,
        kept = records.len(),
        "aggregated fan-out results"
    );
    records
}
