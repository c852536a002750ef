//! Bounded retries with exponential backoff.
//!
//! What this module provides
//! - A stage that re-issues a request on transient failures, up to
//!   `max_retries` additional attempts
//! - Classification: responses with status 429/500/502/503/504 and
//!   transport-level errors are retryable; every other status terminates
//!   immediately, and cancellation is propagated without counting against
//!   the budget
//! - Backoff: `initial_delay * 2^n` before retry `n`, capped at `max_delay`
//!
//! Implementation strategy
//! - Each attempt gets a fresh request from [`Request::try_clone`]; a
//!   one-shot streaming body combined with a positive retry budget is
//!   reported as [`InterceptError::BodyNotReplayable`] instead of quietly
//!   degrading to a single attempt
//! - Before a retry, the abandoned response body is drained so a half-read
//!   stream cannot leak
//! - After the budget is spent, the last response (or error) is returned
//!   as-is rather than being wrapped in a synthetic error
//! - Sleeps use `tokio::time::sleep`; dropping the in-flight future during
//!   the wait abandons the call without issuing another attempt

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use http::StatusCode;
use tokio::time::sleep;
use tower::{BoxError, Layer, Service, ServiceExt};
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::InterceptError;
use crate::message::{Request, Response};

/// Status codes that indicate a transient server-side condition.
pub const RETRYABLE_STATUSES: [StatusCode; 5] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

pub fn is_retryable_status(status: StatusCode) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Delay schedule: `initial * 2^attempt`, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.initial
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max)
    }
}

/// Layer that retries transient failures of the wrapped sender.
#[derive(Debug, Clone)]
pub struct RetryLayer {
    config: RetryConfig,
}

impl RetryLayer {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

#[derive(Debug, Clone)]
pub struct Retry<S> {
    inner: S,
    config: RetryConfig,
}

impl<S> Layer<S> for RetryLayer {
    type Service = Retry<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Retry {
            inner,
            config: self.config.clone(),
        }
    }
}

impl<S> Service<Request> for Retry<S>
where
    S: Service<Request, Response = Response, Error = BoxError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Response, BoxError>> + Send>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        // Readiness of the moved-in clone is driven inside the future.
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let config = self.config.clone();

        Box::pin(async move {
            if config.max_retries == 0 {
                return inner.ready().await?.call(req).await;
            }
            if !req.body().is_replayable() {
                return Err(InterceptError::BodyNotReplayable.into());
            }

            let backoff = Backoff::new(config.initial_delay, config.max_delay);
            let template = req;
            let mut attempt: u32 = 0;
            loop {
                let attempt_req = template
                    .try_clone()
                    .ok_or(InterceptError::BodyNotReplayable)?;
                let give_up = attempt >= config.max_retries;

                match inner.ready().await?.call(attempt_req).await {
                    Ok(response) if !is_retryable_status(response.status()) => {
                        return Ok(response);
                    }
                    // Budget spent: hand back the last response untouched.
                    Ok(response) if give_up => return Ok(response),
                    Ok(response) => {
                        let status = response.status();
                        response.into_body().drain().await;
                        debug!(status = status.as_u16(), attempt, "retrying after retryable status");
                    }
                    Err(error) if InterceptError::is_cancellation(&error) => return Err(error),
                    Err(error) if give_up => return Err(error),
                    Err(error) => {
                        warn!(error = %error, attempt, "retrying after transport error");
                    }
                }

                let delay = backoff.delay_for_attempt(attempt);
                attempt += 1;
                sleep(delay).await;
            }
        })
    }
}
