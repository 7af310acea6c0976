/// Call-site retry with exponential backoff.
///
/// The resolver never retries on its own. Callers that want retries wrap it
/// here and decide which outcomes are worth another attempt.
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::catalog::Category;
use crate::resolver::{IntentResult, SemanticResolver};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_millis(5_000),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_retries = std::env::var("RESOLVE_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(defaults.max_retries);

        let initial_backoff = std::env::var("RESOLVE_RETRY_INITIAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.initial_backoff);

        let max_backoff = std::env::var("RESOLVE_RETRY_MAX_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_backoff);

        Self {
            max_retries,
            initial_backoff,
            max_backoff,
        }
    }
}

/// Run `f` until `should_retry` rejects its output, the retry budget is spent,
/// or `cancel` fires during a backoff. The last output is returned either way.
pub async fn retry_with_backoff<T, Fut, F, P>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut f: F,
    should_retry: P,
) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = T>,
    P: Fn(&T) -> bool,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let output = f().await;
        if attempt > policy.max_retries || !should_retry(&output) {
            return output;
        }
        let delay = backoff_delay(policy.initial_backoff, policy.max_backoff, attempt - 1);
        warn!(
            attempt,
            delay_ms = delay.as_millis(),
            "attempt failed transiently, retrying"
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(attempt, "backoff cancelled");
                return output;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Resolve, retrying only transient failure classes (timeouts, network, 5xx).
/// Cancellation stops both the in-flight attempt and any pending backoff.
pub async fn resolve_with_retry(
    resolver: &SemanticResolver,
    policy: &RetryPolicy,
    query: &str,
    catalog: &[Category],
    cancel: &CancellationToken,
) -> IntentResult {
    retry_with_backoff(
        policy,
        cancel,
        || resolver.resolve_with_cancel(query, catalog, cancel),
        |result: &IntentResult| {
            !cancel.is_cancelled() && result.failure_class().is_some_and(|c| c.is_transient())
        },
    )
    .await
}

pub(crate) fn backoff_delay(initial: Duration, max: Duration, exponent: u32) -> Duration {
    let mult = 1u128.checked_shl(exponent).unwrap_or(u128::MAX);
    let base_ms = initial.as_millis().saturating_mul(mult);
    let capped_ms = std::cmp::min(base_ms, max.as_millis()) as u64;
    let jitter_cap = std::cmp::max(1, capped_ms / 4);
    let jitter_ms = pseudo_jitter_ms(jitter_cap);
    Duration::from_millis(capped_ms.saturating_add(jitter_ms))
}

fn pseudo_jitter_ms(max_inclusive: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let nanos = now.subsec_nanos() as u64;
    nanos % (max_inclusive + 1)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use reqwest::StatusCode;

    use super::*;
    use crate::error::FailureClass;
    use crate::reasoning::{ReasoningError, ReasoningRequest, ReasoningService};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let initial = Duration::from_millis(100);
        let max = Duration::from_millis(1_000);
        let first = backoff_delay(initial, max, 0);
        assert!(first >= initial && first <= Duration::from_millis(125));
        let third = backoff_delay(initial, max, 2);
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(500));
        let huge = backoff_delay(initial, max, 200);
        assert!(huge >= max && huge <= Duration::from_millis(1_250));
    }

    #[tokio::test]
    async fn stops_when_predicate_rejects() {
        let calls = AtomicUsize::new(0);
        let out = retry_with_backoff(
            &fast(),
            &CancellationToken::new(),
            || async { calls.fetch_add(1, Ordering::SeqCst) + 1 },
            |n: &usize| *n < 2,
        )
        .await;
        assert_eq!(out, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let calls = AtomicUsize::new(0);
        let out = retry_with_backoff(
            &fast(),
            &CancellationToken::new(),
            || async { calls.fetch_add(1, Ordering::SeqCst) },
            |_: &usize| true,
        )
        .await;
        assert_eq!(out, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    struct Flaky {
        calls: AtomicUsize,
        failures: usize,
        status: StatusCode,
    }

    #[async_trait]
    impl ReasoningService for Flaky {
        async fn complete(&self, _request: &ReasoningRequest) -> Result<String, ReasoningError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(ReasoningError::Upstream {
                    status: self.status,
                    message: "try later".to_string(),
                });
            }
            Ok(r#"{"intent": "x", "reasoning": "y",
                "topMatch": {"category": "Surveillance", "confidence": 80},
                "closeMatches": []}"#
                .to_string())
        }
    }

    fn catalog() -> Vec<Category> {
        vec![Category::new("1", "Surveillance", None)]
    }

    #[tokio::test]
    async fn retries_server_errors() {
        let flaky = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
            failures: 2,
            status: StatusCode::SERVICE_UNAVAILABLE,
        });
        let resolver = SemanticResolver::new(Some(flaky.clone()));
        let cancel = CancellationToken::new();
        let result = resolve_with_retry(&resolver, &fast(), "q", &catalog(), &cancel).await;
        assert!(result.top_match.is_some());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn never_retries_client_errors() {
        let flaky = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
            failures: 5,
            status: StatusCode::UNAUTHORIZED,
        });
        let resolver = SemanticResolver::new(Some(flaky.clone()));
        let cancel = CancellationToken::new();
        let result = resolve_with_retry(&resolver, &fast(), "q", &catalog(), &cancel).await;
        assert!(result.top_match.is_none());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_retry_policy_makes_one_attempt() {
        let flaky = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
            failures: 5,
            status: StatusCode::BAD_GATEWAY,
        });
        let resolver = SemanticResolver::new(Some(flaky.clone()));
        let cancel = CancellationToken::new();
        resolve_with_retry(&resolver, &RetryPolicy::none(), "q", &catalog(), &cancel).await;
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_during_backoff_returns_promptly() {
        let flaky = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
            failures: 5,
            status: StatusCode::SERVICE_UNAVAILABLE,
        });
        let resolver = SemanticResolver::new(Some(flaky.clone()));
        let slow = RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(30),
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            resolve_with_retry(&resolver, &slow, "q", &catalog(), &cancel),
        )
        .await
        .expect("backoff should stop on cancellation");

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.failure_class(), Some(FailureClass::UpstreamStatus(503)));
    }

    #[tokio::test]
    async fn pre_cancelled_token_skips_the_backoff() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out = retry_with_backoff(
            &RetryPolicy {
                max_retries: 3,
                initial_backoff: Duration::from_secs(30),
                max_backoff: Duration::from_secs(30),
            },
            &cancel,
            || async { calls.fetch_add(1, Ordering::SeqCst) },
            |_: &usize| true,
        )
        .await;
        assert_eq!(out, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
