use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::WalletError;

/// Bounded exponential-backoff retrier for DB transactions: min 1s, max
/// 20s, max jitter 250ms, up to 10 attempts. Not applied to RPC calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub min: Duration,
    pub max: Duration,
    pub max_jitter: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(1),
            max: Duration::from_secs(20),
            max_jitter: Duration::from_millis(250),
            max_attempts: 10,
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.min.as_millis().saturating_mul(1u128 << attempt.min(16));
        let capped = exp.min(self.max.as_millis());
        let jitter: u64 = rand::thread_rng().gen_range(0..=self.max_jitter.as_millis() as u64);
        Duration::from_millis(capped as u64 + jitter)
    }
}

/// Runs `op` under the bounded retry policy. Only errors for which
/// [`WalletError::is_transient_db`] is true are retried; anything else
/// returns immediately. After `max_attempts` the last error is wrapped as
/// a shutdown cause — retry exhaustion on a DB transaction is treated as
/// critical, surfaced only once there is nothing left to try.
pub async fn with_db_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, WalletError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WalletError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient_db() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(attempt, ?delay, error = %e, "retrying db transaction");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) if e.is_transient_db() => {
                return Err(WalletError::Shutdown(format!(
                    "db transaction exhausted {} attempts: {e}",
                    policy.max_attempts
                )));
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_is_bounded_by_max_plus_jitter() {
        let policy = RetryPolicy::default();
        for attempt in 0..20 {
            let d = policy.delay_for(attempt);
            assert!(d <= policy.max + policy.max_jitter);
            assert!(d >= policy.min || attempt == 0 && policy.min.as_millis() == 0);
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry() {
        let policy = RetryPolicy::default();
        let result: Result<i32, WalletError> = with_db_retry(policy, || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn non_transient_error_returns_immediately() {
        let policy = RetryPolicy::default();
        let calls = std::sync::atomic::AtomicU32::new(0);
        let result: Result<i32, WalletError> = with_db_retry(policy, || {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async { Err(WalletError::Rpc("nope".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_and_returns_shutdown() {
        let policy = RetryPolicy {
            min: Duration::from_millis(1),
            max: Duration::from_millis(2),
            max_jitter: Duration::from_millis(1),
            max_attempts: 3,
        };
        let calls = std::sync::Mutex::new(0u32);
        let result: Result<i32, WalletError> = with_db_retry(policy, || {
            let mut c = calls.lock().unwrap();
            *c += 1;
            async { Err(WalletError::Database(sqlx::Error::PoolClosed)) }
        })
        .await;
        assert!(matches!(result, Err(WalletError::Shutdown(_))));
        assert_eq!(*calls.lock().unwrap(), 3);
    }
}
