//! Retry with exponential backoff, as an explicit state machine.
//!
//! ## States
//!
//! ```text
//!            success
//! Attempting ───────▶ Succeeded
//!   │    ▲
//!   │    │ wait elapsed, attempt < retries
//!   │    │
//!   ▼    │ transient fault
//! Waiting ──────────────▶ Exhausted   (wait elapsed, attempt == retries)
//!
//! Attempting ──fatal fault──▶ Aborted
//! ```
//!
//! A wait follows every transient fault, including the last one, and the
//! delay doubles after each wait with no cap and no jitter. With the default
//! 10 s initial delay and 5 attempts the sequence is 10 s → 20 s → 40 s →
//! 80 s → 160 s, so the worst-case stall is `initial_delay * (2^retries - 1)`.
//!
//! [`RetryMachine`] is pure and holds no clock; [`with_backoff`] drives it
//! with `tokio::time::sleep`, which lets tests run on a paused clock.

use crate::error::ExtractionFault;
use crate::progress::ProgressCallback;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Classified result of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    TransientFault,
    FatalFault,
}

/// Attempt budget and the first wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub retries: u32,
    pub initial_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            initial_delay: Duration::from_secs(10),
        }
    }
}

impl BackoffPolicy {
    pub fn new(retries: u32, initial_delay: Duration) -> Self {
        Self {
            retries,
            initial_delay,
        }
    }

    /// Wait taken after the `failures`-th consecutive failure (1-indexed).
    pub fn delay_after(&self, failures: u32) -> Duration {
        let factor = 2u32.checked_pow(failures.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }

    /// Sum of every wait when all attempts fail.
    pub fn worst_case_stall(&self) -> Duration {
        (1..=self.retries)
            .map(|n| self.delay_after(n))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// About to make attempt number `attempt` (1-indexed).
    Attempting { attempt: u32 },
    /// Attempt `attempt` failed; sleeping `delay` before deciding what next.
    Waiting { attempt: u32, delay: Duration },
    Succeeded,
    /// Every attempt failed with a transient fault.
    Exhausted { attempts: u32 },
    /// A fatal fault ended the sequence early.
    Aborted { attempt: u32 },
}

impl RetryState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RetryState::Succeeded | RetryState::Exhausted { .. } | RetryState::Aborted { .. }
        )
    }
}

/// Pure transition function over [`RetryState`].
#[derive(Debug, Clone)]
pub struct RetryMachine {
    policy: BackoffPolicy,
    state: RetryState,
}

impl RetryMachine {
    pub fn new(policy: BackoffPolicy) -> Self {
        let state = if policy.retries == 0 {
            RetryState::Exhausted { attempts: 0 }
        } else {
            RetryState::Attempting { attempt: 1 }
        };
        Self { policy, state }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Feed the outcome of the current attempt. Ignored outside `Attempting`.
    pub fn on_outcome(&mut self, outcome: Outcome) -> RetryState {
        if let RetryState::Attempting { attempt } = self.state {
            self.state = match outcome {
                Outcome::Success => RetryState::Succeeded,
                Outcome::TransientFault => RetryState::Waiting {
                    attempt,
                    delay: self.policy.delay_after(attempt),
                },
                Outcome::FatalFault => RetryState::Aborted { attempt },
            };
        }
        self.state
    }

    /// Signal that the current wait is over. Ignored outside `Waiting`.
    pub fn on_wait_elapsed(&mut self) -> RetryState {
        if let RetryState::Waiting { attempt, .. } = self.state {
            self.state = if attempt >= self.policy.retries {
                RetryState::Exhausted { attempts: attempt }
            } else {
                RetryState::Attempting {
                    attempt: attempt + 1,
                }
            };
        }
        self.state
    }
}

/// Why [`with_backoff`] gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    Exhausted {
        attempts: u32,
        last: Option<ExtractionFault>,
    },
    Aborted(ExtractionFault),
}

/// Run `op` under `policy` until it succeeds, hits a fatal fault, or the
/// attempt budget is spent.
///
/// `label` only feeds log lines. Each wait is reported to `progress`.
pub async fn with_backoff<T, F, Fut>(
    policy: BackoffPolicy,
    label: &str,
    progress: Option<&ProgressCallback>,
    mut op: F,
) -> Result<T, RetryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ExtractionFault>>,
{
    let mut machine = RetryMachine::new(policy);
    let mut last_fault: Option<ExtractionFault> = None;
    let mut value: Option<T> = None;

    loop {
        match machine.state() {
            RetryState::Attempting { attempt } => {
                let outcome = match op(attempt).await {
                    Ok(v) => {
                        debug!("{}: attempt {} succeeded", label, attempt);
                        value = Some(v);
                        Outcome::Success
                    }
                    Err(fault) => {
                        let outcome = fault.outcome();
                        last_fault = Some(fault);
                        outcome
                    }
                };
                machine.on_outcome(outcome);
            }
            RetryState::Waiting { attempt, delay } => {
                let reason = last_fault
                    .as_ref()
                    .map(|f| f.to_string())
                    .unwrap_or_default();
                warn!(
                    "{}: attempt {}/{} failed ({}). Retrying in {}s",
                    label,
                    attempt,
                    policy.retries,
                    reason,
                    delay.as_secs_f64()
                );
                if let Some(cb) = progress {
                    cb.on_retry(attempt, policy.retries, delay, &reason);
                }
                tokio::time::sleep(delay).await;
                machine.on_wait_elapsed();
            }
            RetryState::Succeeded => {
                // `value` is always set on the transition into Succeeded.
                if let Some(v) = value.take() {
                    return Ok(v);
                }
                return Err(RetryError::Exhausted {
                    attempts: 0,
                    last: last_fault,
                });
            }
            RetryState::Exhausted { attempts } => {
                return Err(RetryError::Exhausted {
                    attempts,
                    last: last_fault,
                });
            }
            RetryState::Aborted { attempt } => {
                warn!("{}: attempt {} hit a non-retryable fault", label, attempt);
                let fault = last_fault.unwrap_or(ExtractionFault::Fatal {
                    detail: "unknown fatal fault".into(),
                });
                return Err(RetryError::Aborted(fault));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn delays_double_from_initial() {
        let p = BackoffPolicy::new(5, secs(10));
        let delays: Vec<_> = (1..=5).map(|n| p.delay_after(n).as_secs()).collect();
        assert_eq!(delays, vec![10, 20, 40, 80, 160]);
        assert_eq!(p.worst_case_stall(), secs(10 * (2u64.pow(5) - 1)));
    }

    #[test]
    fn machine_walks_transient_faults_to_exhaustion() {
        let mut m = RetryMachine::new(BackoffPolicy::new(3, secs(1)));
        assert_eq!(m.state(), RetryState::Attempting { attempt: 1 });
        assert_eq!(
            m.on_outcome(Outcome::TransientFault),
            RetryState::Waiting { attempt: 1, delay: secs(1) }
        );
        assert_eq!(m.on_wait_elapsed(), RetryState::Attempting { attempt: 2 });
        m.on_outcome(Outcome::TransientFault);
        assert_eq!(m.on_wait_elapsed(), RetryState::Attempting { attempt: 3 });
        assert_eq!(
            m.on_outcome(Outcome::TransientFault),
            RetryState::Waiting { attempt: 3, delay: secs(4) }
        );
        assert_eq!(m.on_wait_elapsed(), RetryState::Exhausted { attempts: 3 });
        assert!(m.state().is_terminal());
    }

    #[test]
    fn machine_success_and_fatal_are_terminal() {
        let mut m = RetryMachine::new(BackoffPolicy::new(3, secs(1)));
        m.on_outcome(Outcome::TransientFault);
        m.on_wait_elapsed();
        assert_eq!(m.on_outcome(Outcome::Success), RetryState::Succeeded);
        // Further input is ignored.
        assert_eq!(m.on_outcome(Outcome::FatalFault), RetryState::Succeeded);

        let mut m = RetryMachine::new(BackoffPolicy::new(3, secs(1)));
        assert_eq!(m.on_outcome(Outcome::FatalFault), RetryState::Aborted { attempt: 1 });
        assert_eq!(m.on_wait_elapsed(), RetryState::Aborted { attempt: 1 });
    }

    #[test]
    fn zero_retries_is_immediately_exhausted() {
        let m = RetryMachine::new(BackoffPolicy::new(0, secs(1)));
        assert_eq!(m.state(), RetryState::Exhausted { attempts: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn driver_fatal_fault_stops_without_waiting() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        let result: Result<(), _> = with_backoff(BackoffPolicy::new(5, secs(10)), "test", None, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ExtractionFault::classify("401 Unauthorized")) }
        })
        .await;
        assert!(matches!(result, Err(RetryError::Aborted(ExtractionFault::Fatal { .. }))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
