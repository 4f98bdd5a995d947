// Bounded retry with exponential backoff for notification delivery

use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, error, warn};

use super::types::DispatchError;
use crate::config::NotificationConfig;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl From<&NotificationConfig> for RetryConfig {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryRetryHandler {
    config: RetryConfig,
}

impl Default for DeliveryRetryHandler {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl DeliveryRetryHandler {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Delays between attempts: base*2, base*4, ... capped at `max_delay`.
    fn delays(&self) -> Vec<Duration> {
        let factor = (self.config.base_delay.as_millis() as u64).max(1);
        let retries = self.config.max_attempts.saturating_sub(1) as usize;
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.config.max_delay)
            .take(retries)
            .map(|d| if self.config.jitter { jitter(d) } else { d })
            .collect()
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is spent. The last error is returned.
    pub async fn execute_with_retry<F, Fut, R>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<R, DispatchError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<R, DispatchError>>,
    {
        let operation_id = uuid::Uuid::new_v4();
        debug!(
            operation = operation_name,
            %operation_id,
            max_attempts = self.config.max_attempts,
            "Starting retryable operation"
        );

        let mut attempt = 0u32;
        let result = RetryIf::spawn(
            self.delays(),
            || {
                attempt += 1;
                operation()
            },
            |e: &DispatchError| {
                if e.is_retryable() {
                    warn!(operation = operation_name, %operation_id, error = %e, "Attempt failed (retryable)");
                    true
                } else {
                    false
                }
            },
        )
        .await;

        if let Err(e) = &result {
            error!(
                operation = operation_name,
                %operation_id,
                attempts = attempt,
                error = %e,
                "Operation failed, giving up"
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast(max_attempts: u32) -> DeliveryRetryHandler {
        DeliveryRetryHandler::new(RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: false,
        })
    }

    #[test]
    fn test_delay_schedule_is_bounded() {
        let handler = DeliveryRetryHandler::new(RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            jitter: false,
        });
        let delays = handler.delays();
        assert_eq!(delays.len(), 4);
        assert_eq!(delays[0], Duration::from_millis(200));
        assert_eq!(delays[1], Duration::from_millis(400));
        assert!(delays.iter().all(|d| *d <= Duration::from_millis(500)));
    }

    #[tokio::test]
    async fn test_retry_success_after_failure() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = fast(3)
            .execute_with_retry("deliver", || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(DispatchError::Delivery {
                            recipient: crate::dossier::UserId::new("u"),
                            reason: "smtp timeout".to_string(),
                        })
                    } else {
                        Ok("sent")
                    }
                }
            })
            .await;

        assert_eq!(tokio_test::assert_ok!(result), "sent");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<(), _> = fast(3)
            .execute_with_retry("deliver", || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(DispatchError::Audience("directory offline".to_string())) }
            })
            .await;

        tokio_test::assert_err!(result);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<(), _> = fast(5)
            .execute_with_retry("deliver", || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(DispatchError::Permanent("recipient unknown".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(DispatchError::Permanent(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
