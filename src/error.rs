//! Error types for the pipeline stages and the pager.

use std::time::Duration;

use thiserror::Error;
use tower::BoxError;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, InterceptError>;

/// Main error type for pipeline construction and dispatch.
///
/// Stage `Service` impls speak [`tower::BoxError`] so arbitrary senders can
/// sit at the bottom of the stack; the typed variants here are recovered by
/// downcast where classification matters (see [`InterceptError::from_boxed`]).
#[derive(Debug, Error)]
pub enum InterceptError {
    /// The per-call deadline elapsed before the inner sender finished.
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// The sender failed before producing any response.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// Retries were requested for a request whose body can only be read once.
    #[error("request body cannot be replayed for retries")]
    BodyNotReplayable,

    /// Pipeline construction was given an unusable option value.
    #[error("invalid pipeline configuration: {0}")]
    Config(String),
}

impl InterceptError {
    /// Recover a typed error from a boxed stage error, wrapping anything
    /// unrecognized as a transport failure.
    pub fn from_boxed(err: BoxError) -> Self {
        match err.downcast::<InterceptError>() {
            Ok(typed) => *typed,
            Err(other) => InterceptError::Transport(other),
        }
    }

    /// Cancellation propagates immediately: it is never retried and never
    /// counted against a retry budget.
    pub fn is_cancellation(err: &BoxError) -> bool {
        matches!(
            err.downcast_ref::<InterceptError>(),
            Some(InterceptError::DeadlineExceeded(_))
        )
    }
}
