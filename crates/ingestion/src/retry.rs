//! Bounded retry for transient adapter faults.

use std::time::Duration;

use tracing::trace;

use crate::error::IngestionError;

/// Retry policy: `attempts` tries in total, `backoff` between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    /// 3 attempts, 10 ms apart (register reads)
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(10),
        }
    }
}

/// Successful value plus how many attempts it took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// No retries at all
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Run `op` until it succeeds or the attempts run out.
    ///
    /// `op` itself is a short synchronous transfer (one register, one
    /// file); only the backoff between attempts suspends.
    pub async fn run<T, E, F>(
        &self,
        operation: &str,
        mut op: F,
    ) -> Result<Attempted<T>, IngestionError>
    where
        E: std::fmt::Display,
        F: FnMut() -> Result<T, E>,
    {
        let attempts = self.attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match op() {
                Ok(value) => {
                    return Ok(Attempted {
                        value,
                        attempts: attempt,
                    })
                }
                Err(e) => {
                    trace!(operation, attempt, error = %e, "Attempt failed");
                    last_error = e.to_string();
                }
            }
            if attempt < attempts && !self.backoff.is_zero() {
                tokio::time::sleep(self.backoff).await;
            }
        }

        Err(IngestionError::RetriesExhausted {
            operation: operation.to_string(),
            attempts,
            last_error,
        })
    }
}
