use std::future::Future;
use std::time::Duration;

use reposnap_core::CloneError;

/// Retry shape applied independently to each activity invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRetryPolicy {
    /// Total attempts, including the first. Treated as at least 1.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub per_attempt_timeout: Duration,
    pub backoff_coefficient: f64,
    pub max_backoff: Duration,
}

impl Default for ActivityRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            per_attempt_timeout: Duration::from_secs(5 * 60),
            backoff_coefficient: 2.0,
            max_backoff: Duration::from_secs(200),
        }
    }
}

impl ActivityRetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): exponential, capped.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff_coefficient.max(1.0).powi(exp);
        let secs = self.initial_backoff.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }
        Duration::from_secs_f64(secs)
    }
}

/// Final outcome of a retried activity plus how many attempts it took.
#[derive(Debug)]
pub struct Attempted<T> {
    pub outcome: Result<T, CloneError>,
    pub attempts: u32,
}

/// Run `op` under `policy`. Each attempt gets its own timeout; a missing ref
/// short-circuits, everything else is retried until attempts run out.
pub async fn run_with_retry<T, F, Fut>(
    activity: &str,
    policy: &ActivityRetryPolicy,
    mut op: F,
) -> Attempted<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, CloneError>>,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = match tokio::time::timeout(policy.per_attempt_timeout, op(attempt)).await {
            Ok(result) => result,
            Err(_) => Err(CloneError::ActivityTimeout {
                activity: activity.to_string(),
                timeout_ms: policy.per_attempt_timeout.as_millis() as u64,
            }),
        };
        let err = match result {
            Ok(value) => {
                return Attempted {
                    outcome: Ok(value),
                    attempts: attempt,
                }
            }
            Err(e) => e,
        };
        if !err.is_retryable() || attempt >= max {
            if err.is_retryable() {
                tracing::warn!(activity, attempt, error = %err, "activity failed, attempts exhausted");
            }
            return Attempted {
                outcome: Err(err),
                attempts: attempt,
            };
        }
        let delay = policy.backoff_for(attempt);
        tracing::warn!(activity, attempt, max, ?delay, error = %err, "activity failed, retrying");
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reposnap_core::ProcessError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> CloneError {
        ProcessError::exit("git", Some(128), String::new(), "fatal: early EOF".into()).into()
    }

    #[test]
    fn default_policy_values() {
        let p = ActivityRetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.initial_backoff, Duration::from_secs(2));
        assert_eq!(p.per_attempt_timeout, Duration::from_secs(300));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let p = ActivityRetryPolicy::default();
        assert_eq!(p.backoff_for(1), Duration::from_secs(2));
        assert_eq!(p.backoff_for(2), Duration::from_secs(4));
        assert_eq!(p.backoff_for(3), Duration::from_secs(8));
        assert_eq!(p.backoff_for(20), Duration::from_secs(200));
        assert_eq!(p.backoff_for(u32::MAX), Duration::from_secs(200));
    }

    #[test]
    fn coefficient_below_one_is_constant() {
        let p = ActivityRetryPolicy {
            backoff_coefficient: 0.5,
            ..Default::default()
        };
        assert_eq!(p.backoff_for(4), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_then_success() {
        let calls = AtomicU32::new(0);
        let done = run_with_retry("resolve_commit", &ActivityRetryPolicy::default(), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(transient())
                } else {
                    Ok("ok")
                }
            }
        })
        .await;
        assert_eq!(done.outcome.unwrap(), "ok");
        assert_eq!(done.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let done: Attempted<()> =
            run_with_retry("fetch_snapshot", &ActivityRetryPolicy::default(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await;
        assert!(matches!(done.outcome, Err(CloneError::Process(_))));
        assert_eq!(done.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn ref_not_found_is_not_retried() {
        let calls = AtomicU32::new(0);
        let done: Attempted<()> =
            run_with_retry("resolve_commit", &ActivityRetryPolicy::default(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CloneError::ref_not_found("feature/x")) }
            })
            .await;
        assert_eq!(done.outcome.unwrap_err(), CloneError::ref_not_found("feature/x"));
        assert_eq!(done.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_times_out_and_retries() {
        let policy = ActivityRetryPolicy {
            max_attempts: 2,
            per_attempt_timeout: Duration::from_secs(1),
            ..Default::default()
        };
        let done = run_with_retry("fetch_snapshot", &policy, |attempt| async move {
            if attempt == 1 {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(attempt)
        })
        .await;
        assert_eq!(done.outcome.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_error_names_activity() {
        let policy = ActivityRetryPolicy {
            max_attempts: 1,
            per_attempt_timeout: Duration::from_millis(10),
            ..Default::default()
        };
        let done: Attempted<()> = run_with_retry("fetch_snapshot", &policy, |_| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        assert_eq!(
            done.outcome.unwrap_err(),
            CloneError::ActivityTimeout {
                activity: "fetch_snapshot".into(),
                timeout_ms: 10
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_runs_once() {
        let policy = ActivityRetryPolicy {
            max_attempts: 0,
            ..Default::default()
        };
        let done: Attempted<()> = run_with_retry("resolve_commit", &policy, |_| async {
            Err(transient())
        })
        .await;
        assert_eq!(done.attempts, 1);
    }
}
