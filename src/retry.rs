use std::{future::Future, time::Duration};

use reqwest::{RequestBuilder, Response};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Bounded retry around a single HTTP exchange
///
/// Only transport failures (connect, timeout, DNS) consume a backoff slot.
/// A response with any status, 4xx and 5xx included, is handed back as-is for
/// the caller to classify.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    schedule: Vec<Duration>,
}

impl RetryExecutor {
    /// An empty schedule still makes a single attempt
    #[must_use]
    pub const fn new(schedule: Vec<Duration>) -> Self {
        Self { schedule }
    }

    #[must_use]
    pub fn schedule(&self) -> &[Duration] {
        &self.schedule
    }

    /// Sends the request produced by `request`, rebuilding it for every attempt
    ///
    /// The wait after a failed attempt is taken even when it was the last one,
    /// so exhausting the schedule blocks for its full sum.
    ///
    /// # Errors
    /// - [`Error::Cancelled`] when `ct` fires mid-request or mid-wait
    /// - [`Error::Transport`] holding the last failure once the schedule is exhausted
    pub async fn execute<F>(&self, ct: &CancellationToken, request: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let sent = tokio::select! {
                biased;
                () = ct.cancelled() => return Err(Error::Cancelled),
                res = request().send() => res,
            };

            let err = match sent {
                Ok(res) => {
                    debug!(attempt, status = %res.status(), "Request completed");
                    return Ok(res);
                }
                Err(e) => Error::from(e),
            };

            if !err.is_retryable() {
                return Err(err);
            }
            let Some(&backoff) = self.schedule.get(attempt - 1) else {
                return Err(err);
            };

            warn!(
                attempt,
                max = self.schedule.len(),
                backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "Request error, retrying"
            );
            tokio::select! {
                biased;
                () = ct.cancelled() => return Err(Error::Cancelled),
                () = tokio::time::sleep(backoff) => {}
            }

            if attempt >= self.schedule.len() {
                return Err(err);
            }
        }
    }
}

/// Awaits `fut` unless `ct` fires first
///
/// Used for response body reads, which outlive the executor's own race against `send()`.
///
/// # Errors
/// [`Error::Cancelled`] when `ct` fires before `fut` completes
pub async fn cancellable<F: Future>(ct: &CancellationToken, fut: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        () = ct.cancelled() => Err(Error::Cancelled),
        out = fut => Ok(out),
    }
}
