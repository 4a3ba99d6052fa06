//! Paginated fetching with rate-limit backoff.
//!
//! Drives a single search query to completion: follows continuation tokens
//! page by page, accumulates up to a caller-supplied limit, and retries the
//! same request after a fixed delay whenever the platform rate-limits it.

use crate::platform::{PageToken, SearchError, SearchPage};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Rate-limit retry behaviour for a paginated fetch.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Fixed delay between rate-limited attempts.
    pub delay: Duration,

    /// Maximum number of consecutive rate-limited retries before giving up.
    /// `None` retries until the process shuts down, matching the behaviour
    /// of a background refresh job.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(60),
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Sets the delay between rate-limited attempts.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Caps the number of consecutive rate-limited retries.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

/// Fetches up to `limit` items from a paginated search operation.
///
/// `fetch_page` is invoked with `None` for the first page and with the
/// continuation token of the previous page afterwards. Pages are requested
/// strictly sequentially. The fetch completes as soon as `limit` items have
/// accumulated or the operation reports no further page; fewer than `limit`
/// items is a valid, complete result.
///
/// A [`SearchError::RateLimited`] failure is retried with identical
/// arguments and continuation state after the policy's fixed delay.
///
/// # Errors
///
/// Propagates any non-rate-limit [`SearchError`] unchanged, and surfaces
/// [`SearchError::RateLimited`] only once a configured retry ceiling is
/// exhausted.
pub async fn fetch_all<T, F, Fut>(
    mut fetch_page: F,
    limit: usize,
    retry: &RetryPolicy,
) -> Result<Vec<T>, SearchError>
where
    F: FnMut(Option<PageToken>) -> Fut,
    Fut: Future<Output = Result<SearchPage<T>, SearchError>>,
{
    let mut items: Vec<T> = Vec::new();
    if limit == 0 {
        return Ok(items);
    }

    let mut token: Option<PageToken> = None;
    let mut rate_limited_attempts: u32 = 0;

    loop {
        match fetch_page(token.clone()).await {
            Ok(page) => {
                rate_limited_attempts = 0;
                let remaining = limit - items.len();
                items.extend(page.items.into_iter().take(remaining));

                if items.len() >= limit || page.next.is_none() {
                    debug!(count = items.len(), "paginated fetch complete");
                    return Ok(items);
                }
                token = page.next;
            }
            Err(SearchError::RateLimited) => {
                rate_limited_attempts += 1;
                if let Some(max) = retry.max_attempts {
                    if rate_limited_attempts > max {
                        warn!(attempts = rate_limited_attempts, "retry ceiling exhausted");
                        return Err(SearchError::RateLimited);
                    }
                }
                warn!(
                    delay_secs = retry.delay.as_secs(),
                    attempt = rate_limited_attempts,
                    "rate limited, waiting before retrying"
                );
                tokio::time::sleep(retry.delay).await;
                info!("retrying rate-limited request");
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn page(items: Vec<u32>, next: Option<&str>) -> Result<SearchPage<u32>, SearchError> {
        Ok(SearchPage {
            items,
            next: next.map(str::to_string),
        })
    }

    fn quick_retry() -> RetryPolicy {
        RetryPolicy::default().with_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn stops_at_limit_without_requesting_further_pages() {
        let calls = AtomicUsize::new(0);
        let fetch = |_token: Option<PageToken>| {
            let n = calls.fetch_add(1, Ordering::SeqCst) as u32;
            async move {
                let start = n * 10;
                let next = (n + 2).to_string();
                page((start..start + 10).collect(), Some(next.as_str()))
            }
        };

        let items = fetch_all(fetch, 25, &RetryPolicy::default()).await.unwrap();
        assert_eq!(items.len(), 25);
        assert_eq!(items[24], 24);
        // Three pages of ten satisfy a limit of 25; a fourth is never requested.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn partial_results_are_valid_when_pages_run_out() {
        let responses = Mutex::new(VecDeque::from(vec![
            page(vec![1, 2, 3], Some("2")),
            page(vec![4], None),
        ]));
        let fetch = |_token: Option<PageToken>| {
            let next = responses.lock().unwrap().pop_front().unwrap();
            async move { next }
        };

        let items = fetch_all(fetch, 25, &RetryPolicy::default()).await.unwrap();
        assert_eq!(items, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn continuation_token_is_threaded_between_pages() {
        let seen = Mutex::new(Vec::new());
        let fetch = |token: Option<PageToken>| {
            seen.lock().unwrap().push(token.clone());
            async move {
                match token.as_deref() {
                    None => page(vec![1], Some("second")),
                    Some("second") => page(vec![2], None),
                    other => panic!("unexpected token {other:?}"),
                }
            }
        };

        let items = fetch_all(fetch, 10, &RetryPolicy::default()).await.unwrap();
        assert_eq!(items, vec![1, 2]);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![None, Some("second".to_string())]
        );
    }

    #[tokio::test]
    async fn rate_limit_is_retried_with_the_same_token() {
        let responses = Mutex::new(VecDeque::from(vec![
            Err(SearchError::RateLimited),
            page(vec![7, 8], None),
        ]));
        let tokens = Mutex::new(Vec::new());
        let fetch = |token: Option<PageToken>| {
            tokens.lock().unwrap().push(token);
            let next = responses.lock().unwrap().pop_front().unwrap();
            async move { next }
        };

        let items = fetch_all(fetch, 10, &quick_retry()).await.unwrap();
        assert_eq!(items, vec![7, 8]);
        // Both attempts asked for the first page.
        assert_eq!(*tokens.lock().unwrap(), vec![None, None]);
    }

    #[tokio::test]
    async fn retry_ceiling_surfaces_rate_limit() {
        let calls = AtomicUsize::new(0);
        let fetch = |_token: Option<PageToken>| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err::<SearchPage<u32>, _>(SearchError::RateLimited) }
        };

        let retry = quick_retry().with_max_attempts(2);
        let err = fetch_all(fetch, 10, &retry).await.unwrap_err();
        assert!(matches!(err, SearchError::RateLimited));
        // Initial attempt plus two retries.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn hard_errors_propagate_without_retry() {
        let calls = AtomicUsize::new(0);
        let fetch = |_token: Option<PageToken>| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err::<SearchPage<u32>, _>(SearchError::Other("boom".to_string())) }
        };

        let err = fetch_all(fetch, 10, &RetryPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Other(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_limit_short_circuits() {
        let fetch = |_token: Option<PageToken>| async move { page(vec![1], None) };
        let items = fetch_all(fetch, 0, &RetryPolicy::default()).await.unwrap();
        assert!(items.is_empty());
    }
}
