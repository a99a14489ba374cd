//! Opt-in retry with exponential backoff.
//!
//! The transport never retries on its own. Wrapping a requester in
//! [`Retrying`] repeats retryable failures (429, >= 500, send errors),
//! honouring the server's `Retry-After` hint when present.

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};
use crate::http::HttpMethod;
use crate::transport::{Requester, Response};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Upper bound for any single wait, including `Retry-After`.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `attempt` (0-based) after `error`.
    pub fn delay_for(&self, attempt: u32, error: &Error) -> Duration {
        let backoff = error.retry_after().unwrap_or_else(|| {
            self.base_delay
                .checked_mul(2_u32.saturating_pow(attempt))
                .unwrap_or(self.max_delay)
        });
        backoff.min(self.max_delay)
    }
}

/// A [`Requester`] that retries the wrapped one according to a policy.
#[derive(Debug, Clone)]
pub struct Retrying<R> {
    inner: R,
    policy: RetryPolicy,
}

impl<R: Requester> Retrying<R> {
    pub fn new(inner: R, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<R: Requester> Requester for Retrying<R> {
    fn request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        body: Option<Vec<u8>>,
        headers: &[(String, String)],
    ) -> Result<Response> {
        let mut attempt = 0;
        loop {
            match self.inner.request(method, endpoint, body.clone(), headers) {
                Err(err) if err.is_retryable() && attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt, &err);
                    attempt += 1;
                    warn!(
                        endpoint,
                        attempt,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "request failed, retrying"
                    );
                    thread::sleep(delay);
                }
                result => return result,
            }
        }
    }
}
