//! Bounded retry around a single file arrival.
//!
//! A new file may still be open in the producer when the notification
//! arrives. The guard waits a settle delay, then attempts processing; a
//! retryable failure is repeated after a fixed delay until the attempt
//! ceiling is reached. Fatal failures stop immediately.

use crate::config::IngressConfig;
use crate::error::{Disposition, ProcessError};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Fixed retry policy. No backoff growth, no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait between attempts.
    pub retry_delay: Duration,
    /// Wait after the notification before the first attempt.
    pub settle_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            retry_delay: Duration::from_millis(500),
            settle_delay: Duration::from_millis(500),
        }
    }
}

impl From<&IngressConfig> for RetryPolicy {
    fn from(config: &IngressConfig) -> Self {
        Self {
            max_attempts: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
        }
    }
}

/// Why a file was given up on without a definite failure.
#[derive(Debug)]
pub enum AbandonReason {
    RetriesExhausted(ProcessError),
    Cancelled,
}

/// Terminal state of one guarded file.
#[derive(Debug)]
pub enum Outcome<T> {
    Done { attempts: u32, value: T },
    Failed { attempts: u32, error: ProcessError },
    Abandoned { attempts: u32, reason: AbandonReason },
}

impl<T> Outcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Outcome::Done { attempts, .. }
            | Outcome::Failed { attempts, .. }
            | Outcome::Abandoned { attempts, .. } => *attempts,
        }
    }
}

enum State {
    Notified,
    Attempting(u32),
    Retrying { attempts: u32, error: ProcessError },
}

/// Drives one file through settle, attempt and retry states.
pub struct IngressGuard {
    policy: RetryPolicy,
    cancel: watch::Receiver<bool>,
}

impl IngressGuard {
    pub fn new(policy: RetryPolicy, cancel: watch::Receiver<bool>) -> Self {
        Self { policy, cancel }
    }

    /// Run `attempt` until it succeeds, fails fatally, runs out of
    /// attempts, or cancellation is signalled.
    pub async fn run<T, F, Fut>(&mut self, path: &Path, mut attempt: F) -> Outcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProcessError>>,
    {
        let mut state = State::Notified;

        loop {
            state = match state {
                State::Notified => {
                    if !self.wait(self.policy.settle_delay).await {
                        return self.cancelled(path, 0);
                    }
                    State::Attempting(1)
                }
                State::Attempting(attempts) => {
                    debug!("Attempt {} for {}", attempts, path.display());
                    match attempt().await {
                        Ok(value) => {
                            info!("Processed {} after {} attempt(s)", path.display(), attempts);
                            return Outcome::Done { attempts, value };
                        }
                        Err(error) => match error.disposition() {
                            Disposition::Fatal => {
                                error!("Error processing {}: {}", path.display(), error);
                                return Outcome::Failed { attempts, error };
                            }
                            Disposition::Retryable => {
                                warn!("Retry {} - {}: {}", attempts, path.display(), error);
                                State::Retrying { attempts, error }
                            }
                        },
                    }
                }
                State::Retrying { attempts, error } => {
                    if attempts >= self.policy.max_attempts {
                        error!(
                            "File '{}' is still in use after {} attempts. Skipping.",
                            path.display(),
                            attempts
                        );
                        return Outcome::Abandoned {
                            attempts,
                            reason: AbandonReason::RetriesExhausted(error),
                        };
                    }
                    if !self.wait(self.policy.retry_delay).await {
                        return self.cancelled(path, attempts);
                    }
                    State::Attempting(attempts + 1)
                }
            };
        }
    }

    fn cancelled<T>(&self, path: &Path, attempts: u32) -> Outcome<T> {
        warn!("Cancelled while waiting on {}", path.display());
        Outcome::Abandoned {
            attempts,
            reason: AbandonReason::Cancelled,
        }
    }

    /// Sleep for `delay`. Returns `false` if cancelled first.
    async fn wait(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            if *self.cancel.borrow_and_update() {
                return false;
            }
            tokio::select! {
                _ = &mut sleep => return true,
                changed = self.cancel.changed() => {
                    if changed.is_err() {
                        // Sender gone: nothing can cancel any more.
                        (&mut sleep).await;
                        return true;
                    }
                }
            }
        }
    }
}
