//! Execution primitives for attribute updates.
//!
//! Updates that the provider rate-limits go through a [`SerialQueue`], which
//! starts each call only after the previous one settled and stops at the
//! first failure. Unthrottled updates are awaited as a group with
//! [`run_concurrently`].

use std::time::Duration;

use futures::future::{BoxFuture, try_join_all};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Ordering between a resource's primary and secondary update groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOrdering {
    /// The primary group completes before the secondary group starts.
    #[default]
    PrimaryThenSecondary,
    /// Both groups are in flight at the same time.
    Concurrent,
}

impl std::fmt::Display for UpdateOrdering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PrimaryThenSecondary => "primary_then_secondary",
            Self::Concurrent => "concurrent",
        };
        write!(f, "{s}")
    }
}

/// Runs operations one at a time, in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialQueue {
    min_interval: Duration,
}

impl SerialQueue {
    /// Creates a queue without spacing between calls.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min_interval: Duration::ZERO,
        }
    }

    /// Waits at least `interval` between the end of one call and the start of the next.
    #[must_use]
    pub const fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Runs `operations` sequentially and collects their results in order.
    ///
    /// An operation is not polled until every operation before it has
    /// succeeded.
    ///
    /// # Errors
    ///
    /// Returns the first error. Remaining operations are dropped without running.
    pub async fn run<'a, T: Send + 'a>(
        &self,
        operations: Vec<BoxFuture<'a, Result<T>>>,
    ) -> Result<Vec<T>> {
        let total = operations.len();
        let mut results = Vec::with_capacity(total);

        for (index, operation) in operations.into_iter().enumerate() {
            if index > 0 && !self.min_interval.is_zero() {
                tokio::time::sleep(self.min_interval).await;
            }

            match operation.await {
                Ok(value) => results.push(value),
                Err(e) => {
                    warn!(
                        failed = index,
                        skipped = total - index - 1,
                        "Sequential update aborted: {}",
                        e
                    );
                    return Err(e);
                }
            }
        }

        debug!(count = total, "Sequential updates completed");
        Ok(results)
    }
}

/// Runs `operations` concurrently and collects their results in order.
///
/// # Errors
///
/// Returns the first error to occur; the other operations are dropped.
pub async fn run_concurrently<'a, T: Send + 'a>(
    operations: Vec<BoxFuture<'a, Result<T>>>,
) -> Result<Vec<T>> {
    try_join_all(operations).await
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use futures::FutureExt;

    use super::*;
    use crate::error::{CanopyError, ProviderError};

    fn recorder(
        log: &Arc<Mutex<Vec<String>>>,
        name: &'static str,
        delay_ms: u64,
        fail: bool,
    ) -> BoxFuture<'static, Result<&'static str>> {
        let log = Arc::clone(log);
        async move {
            log.lock().unwrap().push(format!("start {name}"));
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            log.lock().unwrap().push(format!("end {name}"));
            if fail {
                Err(ProviderError::api_error(400, format!("{name} rejected")).into())
            } else {
                Ok(name)
            }
        }
        .boxed()
    }

    #[tokio::test]
    async fn test_operations_never_overlap() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let operations = vec![
            recorder(&log, "a", 20, false),
            recorder(&log, "b", 1, false),
            recorder(&log, "c", 5, false),
        ];

        let results = SerialQueue::new().run(operations).await.unwrap();

        assert_eq!(results, vec!["a", "b", "c"]);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["start a", "end a", "start b", "end b", "start c", "end c"]
        );
    }

    #[tokio::test]
    async fn test_first_failure_aborts_remaining() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let operations = vec![
            recorder(&log, "a", 0, false),
            recorder(&log, "b", 0, true),
            recorder(&log, "c", 0, false),
        ];

        let err = SerialQueue::new().run(operations).await.unwrap_err();

        assert!(matches!(
            err,
            CanopyError::Provider(ProviderError::ApiRequestFailed { status: 400, .. })
        ));
        assert!(!log.lock().unwrap().iter().any(|entry| entry.ends_with('c')));
    }

    #[tokio::test]
    async fn test_min_interval_spaces_calls() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let operations = vec![
            recorder(&log, "a", 0, false),
            recorder(&log, "b", 0, false),
            recorder(&log, "c", 0, false),
        ];

        let started = Instant::now();
        SerialQueue::new()
            .with_min_interval(Duration::from_millis(15))
            .run(operations)
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let results: Vec<()> = SerialQueue::new().run(Vec::new()).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_group_overlaps() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let operations = vec![recorder(&log, "a", 20, false), recorder(&log, "b", 1, false)];

        let results = run_concurrently(operations).await.unwrap();

        assert_eq!(results, vec!["a", "b"]);
        let log = log.lock().unwrap();
        assert_eq!(&log[..2], &["start a", "start b"]);
    }

    #[test]
    fn test_ordering_from_config() {
        let ordering: UpdateOrdering = serde_yaml::from_str("concurrent").unwrap();
        assert_eq!(ordering, UpdateOrdering::Concurrent);
        assert_eq!(UpdateOrdering::default().to_string(), "primary_then_secondary");
    }
}
